//! Deep merges for workload specifications: deployment-config and
//! stateful-set specs, the pod template they share, and the
//! deployment-trigger policy lists.

use k8s_openapi::{
    DeepMerge,
    api::apps::v1::StatefulSetSpec,
    api::core::v1::{Container, PodSpec, PodTemplateSpec},
};
use tracing::debug;

use super::{MultipleContainersSnafu, Result, fields};
use crate::crd::{DeploymentConfigSpec, DeploymentTriggerPolicy, DeploymentTriggerType};

/// Merges two deployment-config specs. The template and the trigger list get
/// their dedicated merges; every remaining field falls back to the
/// overwrite-wins-when-set fill.
pub fn merge_deployment_config_spec(
    baseline: &DeploymentConfigSpec,
    overwrite: &DeploymentConfigSpec,
) -> Result<DeploymentConfigSpec> {
    let template = merge_template(baseline.template.as_ref(), overwrite.template.as_ref())?;
    let triggers = merge_deployment_triggers(&baseline.triggers, &overwrite.triggers);

    let mut merged = baseline.clone();
    let mut overwrite = overwrite.clone();
    merged.template = template.clone();
    overwrite.template = template;
    merged.triggers = triggers.clone();
    overwrite.triggers = triggers;
    merged.merge_from(overwrite);
    Ok(merged)
}

/// Merges two stateful-set specs around their shared pod template.
pub fn merge_stateful_set_spec(
    baseline: &StatefulSetSpec,
    overwrite: &StatefulSetSpec,
) -> Result<StatefulSetSpec> {
    let template = merge_template(Some(&baseline.template), Some(&overwrite.template))?
        .unwrap_or_default();

    let mut merged = baseline.clone();
    let mut overwrite = overwrite.clone();
    merged.template = template.clone();
    overwrite.template = template;
    merged.merge_from(overwrite);
    Ok(merged)
}

/// Merges two pod templates. An absent overwrite template keeps the baseline
/// one untouched.
pub fn merge_template(
    baseline: Option<&PodTemplateSpec>,
    overwrite: Option<&PodTemplateSpec>,
) -> Result<Option<PodTemplateSpec>> {
    let (baseline, overwrite) = match (baseline, overwrite) {
        (_, None) => return Ok(baseline.cloned()),
        (None, Some(overwrite)) => return Ok(Some(overwrite.clone())),
        (Some(baseline), Some(overwrite)) => (baseline, overwrite),
    };

    let mut metadata = baseline.metadata.clone();
    metadata.merge_from(overwrite.metadata.clone());

    let spec = merge_pod_specs(baseline.spec.as_ref(), overwrite.spec.as_ref())?;
    Ok(Some(PodTemplateSpec { metadata, spec }))
}

/// Merges two pod specs: containers and volumes through their dedicated
/// merges, everything else through the generic fill.
pub fn merge_pod_specs(
    baseline: Option<&PodSpec>,
    overwrite: Option<&PodSpec>,
) -> Result<Option<PodSpec>> {
    let (baseline, overwrite) = match (baseline, overwrite) {
        (_, None) => return Ok(baseline.cloned()),
        (None, Some(overwrite)) => return Ok(Some(overwrite.clone())),
        (Some(baseline), Some(overwrite)) => (baseline, overwrite),
    };

    let containers = merge_containers(&baseline.containers, &overwrite.containers)?;
    let volumes = fields::merge_volumes(
        baseline.volumes.as_deref().unwrap_or_default(),
        overwrite.volumes.as_deref().unwrap_or_default(),
    );
    let volumes = (!volumes.is_empty()).then_some(volumes);

    let mut merged = baseline.clone();
    let mut overwrite = overwrite.clone();
    merged.containers = containers.clone();
    overwrite.containers = containers;
    merged.volumes = volumes.clone();
    overwrite.volumes = volumes;
    merged.merge_from(overwrite);
    Ok(Some(merged))
}

/// Merges two container lists. At most one container per side is supported;
/// anything else is an unsupported configuration rather than a silent
/// approximation.
pub fn merge_containers(baseline: &[Container], overwrite: &[Container]) -> Result<Vec<Container>> {
    if overwrite.is_empty() {
        return Ok(baseline.to_vec());
    }
    if baseline.is_empty() {
        return Ok(overwrite.to_vec());
    }
    snafu::ensure!(
        baseline.len() == 1 && overwrite.len() == 1,
        MultipleContainersSnafu {
            baseline: baseline.len(),
            overwrite: overwrite.len(),
        }
    );

    let base = &baseline[0];
    let mut overwrite = overwrite[0].clone();

    let env = fields::env_override(
        base.env.as_deref().unwrap_or_default(),
        overwrite.env.as_deref().unwrap_or_default(),
    );
    let ports = fields::merge_container_ports(
        base.ports.as_deref().unwrap_or_default(),
        overwrite.ports.as_deref().unwrap_or_default(),
    );
    let mounts = fields::merge_volume_mounts(
        base.volume_mounts.as_deref().unwrap_or_default(),
        overwrite.volume_mounts.as_deref().unwrap_or_default(),
    );

    let mut merged = base.clone();
    merged.env = Some(env);
    overwrite.env = merged.env.clone();
    merged.ports = (!ports.is_empty()).then_some(ports);
    overwrite.ports = merged.ports.clone();
    merged.volume_mounts = (!mounts.is_empty()).then_some(mounts);
    overwrite.volume_mounts = merged.volume_mounts.clone();
    merged.merge_from(overwrite);
    Ok(vec![merged])
}

/// Merges two deployment-trigger lists, matched by trigger type.
///
/// Two `ImageChange` triggers only match when both carry non-empty
/// change parameters; otherwise they are unrelated and both survive. On a
/// match, baseline parameters are kept when the overwrite side has none,
/// then the overwrite trigger field-fills onto the baseline one.
pub fn merge_deployment_triggers(
    baseline: &[DeploymentTriggerPolicy],
    overwrite: &[DeploymentTriggerPolicy],
) -> Vec<DeploymentTriggerPolicy> {
    let mut merged = Vec::new();
    for base in baseline {
        match find_deployment_trigger(base, overwrite) {
            None => {
                debug!(trigger = ?base.type_, "keeping baseline trigger without counterpart");
                merged.push(base.clone());
            }
            Some(found) => {
                let mut found = found.clone();
                if base.image_change_params.is_some() && found.image_change_params.is_none() {
                    found.image_change_params = base.image_change_params.clone();
                }
                let mut pair = base.clone();
                pair.merge_from(found);
                merged.push(pair);
            }
        }
    }
    for over in overwrite {
        if find_deployment_trigger(over, &merged).is_none() {
            debug!(trigger = ?over.type_, "appending overwrite-only trigger");
            merged.push(over.clone());
        }
    }
    merged
}

fn find_deployment_trigger<'a>(
    needle: &DeploymentTriggerPolicy,
    haystack: &'a [DeploymentTriggerPolicy],
) -> Option<&'a DeploymentTriggerPolicy> {
    haystack.iter().find(|candidate| {
        candidate.type_ == needle.type_
            && (needle.type_ != DeploymentTriggerType::ImageChange
                || (needle.has_change_params() && candidate.has_change_params()))
    })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{EnvVar, ObjectReference};

    use super::*;
    use crate::crd::DeploymentTriggerImageChangeParams;
    use crate::merge::Error;

    fn container(name: &str, image: &str) -> Container {
        Container {
            name: name.to_owned(),
            image: Some(image.to_owned()),
            ..Default::default()
        }
    }

    fn image_change_trigger(image: &str) -> DeploymentTriggerPolicy {
        DeploymentTriggerPolicy {
            type_: DeploymentTriggerType::ImageChange,
            image_change_params: Some(DeploymentTriggerImageChangeParams {
                automatic: Some(true),
                container_names: vec!["server".to_owned()],
                from: Some(ObjectReference {
                    name: Some(image.to_owned()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn multiple_containers_are_rejected() {
        let baseline = vec![container("a", "x"), container("b", "y")];
        let overwrite = vec![container("a", "z")];
        let err = merge_containers(&baseline, &overwrite).expect_err("two containers must fail");
        assert!(matches!(err, Error::MultipleContainers { baseline: 2, overwrite: 1 }));
    }

    #[test]
    fn single_container_pair_is_field_filled() {
        let mut base = container("server", "procflow/server:7.11.0");
        base.env = Some(vec![EnvVar {
            name: "JAVA_OPTS".to_owned(),
            value: Some("-Xmx2g".to_owned()),
            ..Default::default()
        }]);
        let mut over = container("server", "procflow/server:7.12.1");
        over.env = Some(vec![EnvVar {
            name: "EXTRA".to_owned(),
            value: Some("1".to_owned()),
            ..Default::default()
        }]);

        let merged = merge_containers(&[base], &[over]).expect("single pair merges");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].image.as_deref(), Some("procflow/server:7.12.1"));
        let env = merged[0].env.as_ref().expect("env is set");
        assert_eq!(env.len(), 2);
        assert_eq!(env[0].name, "JAVA_OPTS");
        assert_eq!(env[1].name, "EXTRA");
    }

    #[test]
    fn absent_overwrite_template_keeps_baseline() {
        let baseline = PodTemplateSpec {
            spec: Some(PodSpec {
                containers: vec![container("server", "procflow/server:7.11.0")],
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge_template(Some(&baseline), None).expect("merge succeeds");
        assert_eq!(merged, Some(baseline));
    }

    #[test]
    fn image_change_triggers_without_params_stay_unrelated() {
        let baseline = vec![image_change_trigger("procflow-server:7.11.0")];
        let overwrite = vec![DeploymentTriggerPolicy {
            type_: DeploymentTriggerType::ImageChange,
            image_change_params: None,
        }];

        let merged = merge_deployment_triggers(&baseline, &overwrite);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn matched_image_change_triggers_field_fill() {
        let baseline = vec![image_change_trigger("procflow-server:7.11.0")];
        let mut overwrite = image_change_trigger("procflow-server:7.12.1");
        overwrite
            .image_change_params
            .as_mut()
            .expect("params are set")
            .automatic = None;

        let merged = merge_deployment_triggers(&baseline, &[overwrite]);
        assert_eq!(merged.len(), 1);
        let params = merged[0].image_change_params.as_ref().expect("params survive");
        assert_eq!(params.automatic, Some(true));
        assert_eq!(
            params.from.as_ref().and_then(|from| from.name.as_deref()),
            Some("procflow-server:7.12.1")
        );
    }

    #[test]
    fn config_change_triggers_match_by_type() {
        let baseline = vec![DeploymentTriggerPolicy::default()];
        let overwrite = vec![DeploymentTriggerPolicy::default()];
        assert_eq!(merge_deployment_triggers(&baseline, &overwrite).len(), 1);
    }
}
