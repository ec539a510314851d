//! OpenShift `Route`.

use k8s_openapi::{
    DeepMerge, apimachinery::pkg::apis::meta::v1::ObjectMeta,
    apimachinery::pkg::util::intstr::IntOrString,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RouteSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<RouteTargetReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<IntOrString>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
}

impl DeepMerge for Route {
    fn merge_from(&mut self, other: Self) {
        self.metadata.merge_from(other.metadata);
        self.spec.merge_from(other.spec);
    }
}

impl DeepMerge for RouteSpec {
    fn merge_from(&mut self, other: Self) {
        self.host.merge_from(other.host);
        self.to.merge_from(other.to);
        self.port.merge_from(other.port);
        self.tls.merge_from(other.tls);
    }
}

impl DeepMerge for RouteTargetReference {
    fn merge_from(&mut self, other: Self) {
        self.kind.merge_from(other.kind);
        self.name.merge_from(other.name);
        self.weight.merge_from(other.weight);
    }
}

impl DeepMerge for RoutePort {
    fn merge_from(&mut self, other: Self) {
        self.target_port.merge_from(other.target_port);
    }
}

impl DeepMerge for TlsConfig {
    fn merge_from(&mut self, other: Self) {
        self.termination.merge_from(other.termination);
        self.insecure_edge_termination_policy
            .merge_from(other.insecure_edge_termination_policy);
    }
}
