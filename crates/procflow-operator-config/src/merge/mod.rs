//! The layered merge engine.
//!
//! A [`crate::crd::Environment`] is resolved in layers: a version-specific
//! baseline rendered from the shipped configuration bundles, overwritten by
//! the operator-computed layer, overwritten by the user's layer. Every layer
//! boundary goes through [`merge_environment`], which walks the component
//! lists pairwise and merges each resource collection by record name.
//!
//! The merge is a field-fill: an explicitly-set overwrite field wins, an
//! unset one keeps the baseline value. Record-level exceptions (wholesale
//! volume replacement, trigger matching, the single-container limit) live in
//! the submodules.

use k8s_openapi::{DeepMerge, api::core::v1::Service};
use snafu::Snafu;
use tracing::debug;

use crate::crd::{CustomObject, Environment};

pub mod build;
pub mod fields;
pub mod named;
pub mod workload;

pub use named::NamedResource;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "cannot merge component lists of different lengths, baseline has {baseline} entries, overwrite has {overwrite}"
    ))]
    IncompatibleLengths { baseline: usize, overwrite: usize },

    #[snafu(display(
        "cannot merge pod specs with more than one container, baseline has {baseline}, overwrite has {overwrite}"
    ))]
    MultipleContainers { baseline: usize, overwrite: usize },
}

/// Merges a complete environment: the singleton components pairwise, the
/// `others` and `servers` lists element by element.
pub fn merge_environment(baseline: &Environment, overwrite: &Environment) -> Result<Environment> {
    Ok(Environment {
        console: merge_custom_object(&baseline.console, &overwrite.console)?,
        router: merge_custom_object(&baseline.router, &overwrite.router)?,
        dashboard: merge_custom_object(&baseline.dashboard, &overwrite.dashboard)?,
        others: merge_custom_objects(&baseline.others, &overwrite.others)?,
        servers: merge_custom_objects(&baseline.servers, &overwrite.servers)?,
    })
}

/// Merges two component lists index by index. The lists describe the same
/// components in the same order, so differing lengths mean the layers were
/// rendered from different environments and the merge is refused.
pub fn merge_custom_objects(
    baseline: &[CustomObject],
    overwrite: &[CustomObject],
) -> Result<Vec<CustomObject>> {
    if overwrite.is_empty() {
        return Ok(baseline.to_vec());
    }
    if baseline.is_empty() {
        return Ok(overwrite.to_vec());
    }
    snafu::ensure!(
        baseline.len() == overwrite.len(),
        IncompatibleLengthsSnafu {
            baseline: baseline.len(),
            overwrite: overwrite.len(),
        }
    );

    baseline
        .iter()
        .zip(overwrite)
        .map(|(base, over)| merge_custom_object(base, over))
        .collect()
}

/// Merges one component: every resource collection by record name, with the
/// kind-specific pair merges where plain field-fill is not enough.
pub fn merge_custom_object(
    baseline: &CustomObject,
    overwrite: &CustomObject,
) -> Result<CustomObject> {
    let name = if overwrite.name.is_empty() {
        baseline.name.clone()
    } else {
        overwrite.name.clone()
    };
    debug!(component = %name, "merging component");

    Ok(CustomObject {
        name,
        omit: overwrite.omit,
        persistent_volume_claims: merge_simple(
            &baseline.persistent_volume_claims,
            &overwrite.persistent_volume_claims,
        )?,
        service_accounts: merge_simple(&baseline.service_accounts, &overwrite.service_accounts)?,
        secrets: merge_simple(&baseline.secrets, &overwrite.secrets)?,
        roles: merge_simple(&baseline.roles, &overwrite.roles)?,
        role_bindings: merge_simple(&baseline.role_bindings, &overwrite.role_bindings)?,
        deployment_configs: named::merge_collection(
            &baseline.deployment_configs,
            &overwrite.deployment_configs,
            |base, over| {
                let spec = workload::merge_deployment_config_spec(&base.spec, &over.spec)?;
                let mut merged = base.clone();
                let mut over = over.clone();
                merged.spec = spec.clone();
                over.spec = spec;
                merged.merge_from(over);
                Ok(merged)
            },
        )?,
        stateful_sets: named::merge_collection(
            &baseline.stateful_sets,
            &overwrite.stateful_sets,
            |base, over| {
                let spec = match (&base.spec, &over.spec) {
                    (Some(base_spec), Some(over_spec)) => {
                        Some(workload::merge_stateful_set_spec(base_spec, over_spec)?)
                    }
                    (spec, None) | (None, spec) => spec.clone(),
                };
                let mut merged = base.clone();
                let mut over = over.clone();
                merged.spec = spec.clone();
                over.spec = spec;
                merged.merge_from(over);
                Ok(merged)
            },
        )?,
        image_streams: merge_simple(&baseline.image_streams, &overwrite.image_streams)?,
        build_configs: named::merge_collection(
            &baseline.build_configs,
            &overwrite.build_configs,
            |base, over| {
                let spec = build::merge_build_config_spec(&base.spec, &over.spec)?;
                let mut merged = base.clone();
                let mut over = over.clone();
                merged.spec = spec.clone();
                over.spec = spec;
                merged.merge_from(over);
                Ok(merged)
            },
        )?,
        services: named::merge_collection(&baseline.services, &overwrite.services, merge_service)?,
        routes: merge_simple(&baseline.routes, &overwrite.routes)?,
        config_maps: merge_simple(&baseline.config_maps, &overwrite.config_maps)?,
    })
}

fn merge_simple<T>(baseline: &[T], overwrite: &[T]) -> Result<Vec<T>>
where
    T: NamedResource + Clone + DeepMerge,
{
    named::merge_collection(baseline, overwrite, |base, over| {
        Ok(named::deep_fill(base, over))
    })
}

/// Services need their port lists merged by port name before the generic
/// fill; otherwise a partial port override would drop the baseline ports.
fn merge_service(base: &Service, over: &Service) -> Result<Service> {
    let ports = fields::merge_service_ports(
        base.spec
            .as_ref()
            .and_then(|spec| spec.ports.as_deref())
            .unwrap_or_default(),
        over.spec
            .as_ref()
            .and_then(|spec| spec.ports.as_deref())
            .unwrap_or_default(),
    );

    let mut merged = named::deep_fill(base, over);
    if !ports.is_empty() {
        merged.spec.get_or_insert_with(Default::default).ports = Some(ports);
    }
    Ok(merged)
}
