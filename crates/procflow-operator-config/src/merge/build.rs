//! Deep merges for build-config specs and their trigger lists.

use k8s_openapi::DeepMerge;
use tracing::debug;

use super::{Result, fields};
use crate::crd::{BuildConfigSpec, BuildTriggerPolicy};

/// Merges two build-config specs. Triggers merge by trigger type, the
/// source-strategy environment merges by variable name, and the remaining
/// fields field-fill.
pub fn merge_build_config_spec(
    baseline: &BuildConfigSpec,
    overwrite: &BuildConfigSpec,
) -> Result<BuildConfigSpec> {
    let triggers = merge_build_triggers(&baseline.triggers, &overwrite.triggers);

    let mut merged = baseline.clone();
    let mut overwrite = overwrite.clone();

    let baseline_env = merged
        .strategy
        .source_strategy
        .as_ref()
        .map(|strategy| strategy.env.clone())
        .unwrap_or_default();
    if let Some(strategy) = overwrite.strategy.source_strategy.as_mut() {
        strategy.env = fields::env_override(&baseline_env, &strategy.env);
    }

    merged.triggers = triggers.clone();
    overwrite.triggers = triggers;
    merged.merge_from(overwrite);
    Ok(merged)
}

/// Merges two build-trigger lists, matched purely by trigger type. Matched
/// pairs field-fill, unmatched triggers from either side survive.
pub fn merge_build_triggers(
    baseline: &[BuildTriggerPolicy],
    overwrite: &[BuildTriggerPolicy],
) -> Vec<BuildTriggerPolicy> {
    let mut merged = Vec::new();
    for base in baseline {
        match overwrite.iter().find(|over| over.type_ == base.type_) {
            None => merged.push(base.clone()),
            Some(found) => {
                let mut pair = base.clone();
                pair.merge_from(found.clone());
                merged.push(pair);
            }
        }
    }
    for over in overwrite {
        if !merged.iter().any(|trigger| trigger.type_ == over.type_) {
            debug!(trigger = ?over.type_, "appending overwrite-only build trigger");
            merged.push(over.clone());
        }
    }
    merged
}
