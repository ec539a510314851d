//! OpenShift `BuildConfig` and its trigger policies.

use k8s_openapi::{
    DeepMerge,
    api::core::v1::{EnvVar, ObjectReference},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BuildConfigSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<BuildTriggerPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BuildSource>,
    #[serde(default)]
    pub strategy: BuildStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<BuildOutput>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTriggerPolicy {
    #[serde(default, rename = "type")]
    pub type_: BuildTriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<WebHookTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<WebHookTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change: Option<ImageChangeTrigger>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub enum BuildTriggerType {
    #[default]
    ConfigChange,
    ImageChange,
    GitHub,
    Generic,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebHookTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChangeTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitBuildSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitBuildSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStrategy {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_strategy: Option<SourceBuildStrategy>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBuildStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ObjectReference>,
}

impl DeepMerge for BuildConfig {
    fn merge_from(&mut self, other: Self) {
        self.metadata.merge_from(other.metadata);
        self.spec.merge_from(other.spec);
    }
}

impl DeepMerge for BuildConfigSpec {
    fn merge_from(&mut self, other: Self) {
        if !other.triggers.is_empty() {
            self.triggers = other.triggers;
        }
        self.source.merge_from(other.source);
        self.strategy.merge_from(other.strategy);
        self.output.merge_from(other.output);
    }
}

impl DeepMerge for BuildTriggerPolicy {
    fn merge_from(&mut self, other: Self) {
        self.type_ = other.type_;
        self.github.merge_from(other.github);
        self.generic.merge_from(other.generic);
        self.image_change.merge_from(other.image_change);
    }
}

impl DeepMerge for WebHookTrigger {
    fn merge_from(&mut self, other: Self) {
        self.secret.merge_from(other.secret);
    }
}

impl DeepMerge for ImageChangeTrigger {
    fn merge_from(&mut self, other: Self) {
        self.last_triggered_image_id
            .merge_from(other.last_triggered_image_id);
        self.from.merge_from(other.from);
    }
}

impl DeepMerge for BuildSource {
    fn merge_from(&mut self, other: Self) {
        self.git.merge_from(other.git);
        self.context_dir.merge_from(other.context_dir);
    }
}

impl DeepMerge for GitBuildSource {
    fn merge_from(&mut self, other: Self) {
        self.uri.merge_from(other.uri);
        self.ref_.merge_from(other.ref_);
    }
}

impl DeepMerge for BuildStrategy {
    fn merge_from(&mut self, other: Self) {
        self.type_.merge_from(other.type_);
        self.source_strategy.merge_from(other.source_strategy);
    }
}

impl DeepMerge for SourceBuildStrategy {
    fn merge_from(&mut self, other: Self) {
        self.from.merge_from(other.from);
        if !other.env.is_empty() {
            self.env = other.env;
        }
        self.incremental.merge_from(other.incremental);
    }
}

impl DeepMerge for BuildOutput {
    fn merge_from(&mut self, other: Self) {
        self.to.merge_from(other.to);
    }
}
