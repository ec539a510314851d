//! Small per-field merges for the primitive sub-structures of a workload:
//! environment variables, ports, volumes and volume mounts.
//!
//! Ports and mounts use a field-fill merge on a name match. Volumes replace
//! wholesale on a name match instead; this asymmetry is long-standing
//! observed behavior that downstream deployments rely on, so it is kept
//! as-is pending product-owner review.

use k8s_openapi::api::core::v1::{ContainerPort, EnvVar, ServicePort, Volume, VolumeMount};
use tracing::debug;

/// Overrides `baseline` variables with same-named `overwrite` variables.
///
/// Baseline-only variables keep their original position, overwrite-only
/// variables are appended in their original order.
pub fn env_override(baseline: &[EnvVar], overwrite: &[EnvVar]) -> Vec<EnvVar> {
    let mut merged: Vec<EnvVar> = baseline
        .iter()
        .map(|base| {
            overwrite
                .iter()
                .find(|var| var.name == base.name)
                .unwrap_or(base)
                .clone()
        })
        .collect();
    merged.extend(
        overwrite
            .iter()
            .filter(|var| !baseline.iter().any(|base| base.name == var.name))
            .cloned(),
    );
    merged
}

/// Field-fill merge of two container port lists, keyed by port name.
pub fn merge_container_ports(
    baseline: &[ContainerPort],
    overwrite: &[ContainerPort],
) -> Vec<ContainerPort> {
    let mut merged: Vec<ContainerPort> = baseline
        .iter()
        .map(|base| match overwrite.iter().find(|port| port.name == base.name) {
            Some(found) => fill_container_port(base, found),
            None => base.clone(),
        })
        .collect();
    merged.extend(
        overwrite
            .iter()
            .filter(|port| !baseline.iter().any(|base| base.name == port.name))
            .cloned(),
    );
    merged
}

fn fill_container_port(base: &ContainerPort, over: &ContainerPort) -> ContainerPort {
    ContainerPort {
        container_port: if over.container_port == 0 {
            base.container_port
        } else {
            over.container_port
        },
        host_ip: over.host_ip.clone().or_else(|| base.host_ip.clone()),
        host_port: over.host_port.or(base.host_port),
        name: over.name.clone().or_else(|| base.name.clone()),
        protocol: over.protocol.clone().or_else(|| base.protocol.clone()),
    }
}

/// Field-fill merge of two service port lists, keyed by port name. A zero
/// port number counts as unset so a partial override keeps the baseline
/// port number.
pub fn merge_service_ports(baseline: &[ServicePort], overwrite: &[ServicePort]) -> Vec<ServicePort> {
    if overwrite.is_empty() {
        return baseline.to_vec();
    }
    if baseline.is_empty() {
        return overwrite.to_vec();
    }
    let mut merged: Vec<ServicePort> = baseline
        .iter()
        .map(|base| match overwrite.iter().find(|port| port.name == base.name) {
            Some(found) => fill_service_port(base, found),
            None => base.clone(),
        })
        .collect();
    merged.extend(
        overwrite
            .iter()
            .filter(|port| !baseline.iter().any(|base| base.name == port.name))
            .cloned(),
    );
    merged
}

fn fill_service_port(base: &ServicePort, over: &ServicePort) -> ServicePort {
    ServicePort {
        app_protocol: over.app_protocol.clone().or_else(|| base.app_protocol.clone()),
        name: over.name.clone().or_else(|| base.name.clone()),
        node_port: over.node_port.or(base.node_port),
        port: if over.port == 0 { base.port } else { over.port },
        protocol: over.protocol.clone().or_else(|| base.protocol.clone()),
        target_port: over.target_port.clone().or_else(|| base.target_port.clone()),
    }
}

/// Merges two volume lists, keyed by volume name.
///
/// A matched overwrite volume replaces the baseline volume entirely. Unlike
/// the port and mount merges, no field-level fill happens here: a volume's
/// source variants are mutually exclusive, and filling across them would
/// fabricate hybrid volumes.
pub fn merge_volumes(baseline: &[Volume], overwrite: &[Volume]) -> Vec<Volume> {
    let mut merged: Vec<Volume> = baseline
        .iter()
        .map(|base| match overwrite.iter().find(|volume| volume.name == base.name) {
            Some(found) => {
                debug!(name = %base.name, "replacing baseline volume with overwrite volume");
                found.clone()
            }
            None => base.clone(),
        })
        .collect();
    merged.extend(
        overwrite
            .iter()
            .filter(|volume| !baseline.iter().any(|base| base.name == volume.name))
            .cloned(),
    );
    merged
}

/// Field-fill merge of two volume mount lists, keyed by mount name.
pub fn merge_volume_mounts(baseline: &[VolumeMount], overwrite: &[VolumeMount]) -> Vec<VolumeMount> {
    let mut merged: Vec<VolumeMount> = baseline
        .iter()
        .map(|base| match overwrite.iter().find(|mount| mount.name == base.name) {
            Some(found) => fill_volume_mount(base, found),
            None => base.clone(),
        })
        .collect();
    merged.extend(
        overwrite
            .iter()
            .filter(|mount| !baseline.iter().any(|base| base.name == mount.name))
            .cloned(),
    );
    merged
}

fn fill_volume_mount(base: &VolumeMount, over: &VolumeMount) -> VolumeMount {
    VolumeMount {
        mount_path: if over.mount_path.is_empty() {
            base.mount_path.clone()
        } else {
            over.mount_path.clone()
        },
        mount_propagation: over
            .mount_propagation
            .clone()
            .or_else(|| base.mount_propagation.clone()),
        name: base.name.clone(),
        read_only: over.read_only.or(base.read_only),
        recursive_read_only: over
            .recursive_read_only
            .clone()
            .or_else(|| base.recursive_read_only.clone()),
        sub_path: over.sub_path.clone().or_else(|| base.sub_path.clone()),
        sub_path_expr: over
            .sub_path_expr
            .clone()
            .or_else(|| base.sub_path_expr.clone()),
    }
}
