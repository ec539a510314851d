//! OpenShift `DeploymentConfig` and its trigger policies, reduced to the
//! fields the ProcFlow templates actually populate.

use std::collections::BTreeMap;

use k8s_openapi::{
    DeepMerge,
    api::core::v1::{ObjectReference, PodTemplateSpec},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentConfigSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DeploymentStrategy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<DeploymentTriggerPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStrategy {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerPolicy {
    #[serde(default, rename = "type")]
    pub type_: DeploymentTriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change_params: Option<DeploymentTriggerImageChangeParams>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub enum DeploymentTriggerType {
    #[default]
    ConfigChange,
    ImageChange,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerImageChangeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_image: Option<String>,
}

impl DeploymentTriggerPolicy {
    /// Whether this trigger carries image-change parameters with any content.
    /// An `ImageChange` trigger without parameters is treated as unrelated to
    /// one that has them.
    pub fn has_change_params(&self) -> bool {
        self.image_change_params
            .as_ref()
            .is_some_and(|params| *params != DeploymentTriggerImageChangeParams::default())
    }
}

impl DeepMerge for DeploymentConfig {
    fn merge_from(&mut self, other: Self) {
        self.metadata.merge_from(other.metadata);
        self.spec.merge_from(other.spec);
    }
}

impl DeepMerge for DeploymentConfigSpec {
    fn merge_from(&mut self, other: Self) {
        self.replicas.merge_from(other.replicas);
        if !other.selector.is_empty() {
            self.selector = other.selector;
        }
        self.strategy.merge_from(other.strategy);
        if !other.triggers.is_empty() {
            self.triggers = other.triggers;
        }
        self.template.merge_from(other.template);
    }
}

impl DeepMerge for DeploymentStrategy {
    fn merge_from(&mut self, other: Self) {
        self.type_.merge_from(other.type_);
    }
}

impl DeepMerge for DeploymentTriggerPolicy {
    fn merge_from(&mut self, other: Self) {
        self.type_ = other.type_;
        self.image_change_params.merge_from(other.image_change_params);
    }
}

impl DeepMerge for DeploymentTriggerImageChangeParams {
    fn merge_from(&mut self, other: Self) {
        self.automatic.merge_from(other.automatic);
        if !other.container_names.is_empty() {
            self.container_names = other.container_names;
        }
        self.from.merge_from(other.from);
        self.last_triggered_image.merge_from(other.last_triggered_image);
    }
}
