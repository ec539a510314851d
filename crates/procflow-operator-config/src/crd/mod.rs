//! The in-memory resource model the operator resolves configuration over.
//!
//! An [`Environment`] is built twice per reconciliation pass: once from the
//! deployment-profile defaults (the baseline) and once from the user's
//! overrides (the overwrite layer). Both are handed to
//! [`crate::merge::merge_environment`] which produces the effective
//! environment the apply stage works from.
//!
//! Upstream Kubernetes kinds come straight from [`k8s_openapi`]; the
//! OpenShift-only kinds the product templates use (deployment configs,
//! build configs, image streams, routes) are modeled here with hand-written
//! [`k8s_openapi::DeepMerge`] implementations so they take part in the same
//! generic merge machinery.

use k8s_openapi::api::{
    apps::v1::StatefulSet,
    core::v1::{ConfigMap, PersistentVolumeClaim, Secret, Service, ServiceAccount},
    rbac::v1::{Role, RoleBinding},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod build;
pub mod image;
pub mod route;
pub mod workload;

pub use build::{
    BuildConfig, BuildConfigSpec, BuildOutput, BuildSource, BuildStrategy, BuildTriggerPolicy,
    BuildTriggerType, GitBuildSource, ImageChangeTrigger, SourceBuildStrategy, WebHookTrigger,
};
pub use image::{ImageStream, ImageStreamSpec, TagReference};
pub use route::{Route, RouteSpec};
pub use workload::{
    DeploymentConfig, DeploymentConfigSpec, DeploymentTriggerImageChangeParams,
    DeploymentTriggerPolicy, DeploymentTriggerType,
};

/// Everything the operator wants to exist on the cluster for one deployment.
///
/// The console, router and dashboard slots hold at most one component each;
/// an empty [`CustomObject`] stands for "absent". `others` and `servers` may
/// repeat and are correlated between baseline and overwrite purely by index,
/// so both layers must agree on their lengths.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default)]
    pub console: CustomObject,
    #[serde(default)]
    pub router: CustomObject,
    #[serde(default)]
    pub dashboard: CustomObject,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub others: Vec<CustomObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<CustomObject>,
}

/// The bundle of resource collections belonging to one logical component.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomObject {
    #[serde(default)]
    pub name: String,

    /// When the overwrite layer sets this, the component is left out of the
    /// deployment entirely. The baseline value is ignored.
    #[serde(default)]
    pub omit: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<ServiceAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Secret>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_bindings: Vec<RoleBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployment_configs: Vec<DeploymentConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stateful_sets: Vec<StatefulSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_streams: Vec<ImageStream>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_configs: Vec<BuildConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_maps: Vec<ConfigMap>,
}
