//! The upgrade-safety gate.
//!
//! Before the operator moves a deployment from one product version to the
//! next it has to know whether the deployed configuration bundles were
//! edited by hand. The gate compares two sets of diffs: what the shipped
//! bundles changed between the two versions, and what changed between the
//! bundles actually deployed on the cluster and the target version's shipped
//! bundles. When both sets are equal, every difference is explained by the
//! product upgrade itself and the upgrade may proceed. Any extra difference
//! means a manual edit that the upgrade would silently revert, so the gate
//! refuses.

use std::collections::BTreeMap;

use async_trait::async_trait;
use json_patch::Patch;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use serde_json::json;
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use crate::constants::SUPPORTED_VERSIONS;

/// The payload of one configuration bundle, keyed by file name.
pub type BundleData = BTreeMap<String, String>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("version {version:?} is not supported, supported versions are {supported:?}"))]
    VersionNotSupported {
        version: String,
        supported: &'static [&'static str],
    },

    #[snafu(display("failed to fetch deployed config bundle {name:?}"))]
    FetchDeployedBundle {
        source: kube::Error,
        name: String,
    },

    #[snafu(display(
        "deployed config bundles for version {from_version} carry manual edits, refusing to upgrade over them"
    ))]
    UpgradeConflict { from_version: String },
}

/// Whether `version` is one of the product versions this operator ships
/// configuration bundles for.
pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// Splits a version string into its major, minor and micro segments,
/// padding missing segments with `"0"`.
pub fn major_minor_micro(version: &str) -> (String, String, String) {
    let mut segments = version.split('.');
    let mut next = || segments.next().unwrap_or("0").to_owned();
    (next(), next(), next())
}

/// The major and minor segments concatenated, the form image tags use.
pub fn minor_image_version(version: &str) -> String {
    let (major, minor, _) = major_minor_micro(version);
    format!("{major}{minor}")
}

/// A source of the configuration bundles shipped with the operator.
///
/// Bundle names are physical: `<prefix>-<version>-<suffix>`. The default
/// implementation on a plain map is what production uses, with the map
/// rendered from the embedded bundle files at startup.
pub trait ConfigBundleStore {
    /// Whether any bundle for `version` exists in the store.
    fn has_version(&self, version: &str) -> bool;

    /// All bundles of `version`, keyed by their physical name.
    fn bundles(&self, version: &str) -> BTreeMap<String, BundleData>;
}

impl ConfigBundleStore for BTreeMap<String, BundleData> {
    fn has_version(&self, version: &str) -> bool {
        self.keys().any(|name| version_segment(name) == Some(version))
    }

    fn bundles(&self, version: &str) -> BTreeMap<String, BundleData> {
        self.iter()
            .filter(|(name, _)| version_segment(name) == Some(version))
            .map(|(name, data)| (name.clone(), data.clone()))
            .collect()
    }
}

/// A source of the configuration bundles currently deployed on a cluster.
/// Injectable so the gate can be exercised without a live apiserver.
#[async_trait]
pub trait DeployedConfigSource {
    async fn deployed_bundle(&self, namespace: &str, name: &str) -> Result<BundleData>;
}

/// Reads deployed bundles from the cluster's config maps.
#[derive(Clone)]
pub struct ClusterConfigSource {
    client: Client,
}

impl ClusterConfigSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeployedConfigSource for ClusterConfigSource {
    async fn deployed_bundle(&self, namespace: &str, name: &str) -> Result<BundleData> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = config_maps
            .get(name)
            .await
            .context(FetchDeployedBundleSnafu { name })?;
        Ok(config_map.data.unwrap_or_default())
    }
}

/// The version segment of a physical bundle name, the second `-`-separated
/// segment: `procflowconfigs-7.12.1-console` carries version `7.12.1`.
fn version_segment(name: &str) -> Option<&str> {
    name.split('-').nth(1)
}

/// Strips the version segment out of a physical bundle name, yielding the
/// version-independent logical name.
fn logical_name(physical: &str) -> String {
    let mut segments = physical.split('-');
    let prefix = segments.next().unwrap_or_default();
    let suffix: Vec<&str> = segments.skip(1).collect();
    if suffix.is_empty() {
        prefix.to_owned()
    } else {
        format!("{prefix}-{}", suffix.join("-"))
    }
}

/// Splices `version` back into a logical bundle name, yielding the physical
/// name a deployment of that version uses.
fn physical_name(logical: &str, version: &str) -> String {
    match logical.split_once('-') {
        Some((prefix, suffix)) => format!("{prefix}-{version}-{suffix}"),
        None => format!("{logical}-{version}"),
    }
}

/// Per-bundle JSON patches between `from` and `to`, covering only bundle
/// names present in both snapshots. A bundle dropped by or new to the target
/// version has nothing to compare against, so it never gates the upgrade.
/// Bundles whose payloads are equal produce no entry.
///
/// The patch is oriented from `to` back to `from`, so the `from` side's
/// actual file contents appear as patch values. Two diffs against the same
/// target are then equal exactly when their sources are, which is what the
/// gate's comparison relies on.
pub fn config_diffs(
    from: &BTreeMap<String, BundleData>,
    to: &BTreeMap<String, BundleData>,
) -> BTreeMap<String, Patch> {
    from.iter()
        .filter_map(|(name, before)| {
            let after = to.get(name)?;
            let patch = json_patch::diff(&json!(after), &json!(before));
            (!patch.0.is_empty()).then(|| (name.clone(), patch))
        })
        .collect()
}

fn logical_bundles(bundles: BTreeMap<String, BundleData>) -> BTreeMap<String, BundleData> {
    bundles
        .into_iter()
        .map(|(name, data)| (logical_name(&name), data))
        .collect()
}

/// Decides whether an upgrade from `from_version` to `to_version` is safe.
///
/// Passing no deployed-config source skips the cluster lookup and compares
/// the shipped bundles against themselves, which always approves; this is
/// the path taken when the gate runs before anything was deployed.
pub async fn check_upgrade(
    from_version: &str,
    to_version: &str,
    store: &dyn ConfigBundleStore,
    deployed: Option<&dyn DeployedConfigSource>,
    namespace: &str,
) -> Result<()> {
    for version in [from_version, to_version] {
        ensure!(
            is_supported_version(version),
            VersionNotSupportedSnafu {
                version,
                supported: SUPPORTED_VERSIONS,
            }
        );
    }

    if !store.has_version(from_version) || !store.has_version(to_version) {
        debug!(
            from_version,
            to_version, "store ships no bundles for at least one version, nothing to compare"
        );
        return Ok(());
    }

    let from_bundles = logical_bundles(store.bundles(from_version));
    let to_bundles = logical_bundles(store.bundles(to_version));
    let default_diffs = config_diffs(&from_bundles, &to_bundles);

    let actual_diffs = match deployed {
        None => default_diffs.clone(),
        Some(source) => {
            let mut deployed_bundles = BTreeMap::new();
            for logical in from_bundles.keys() {
                let name = physical_name(logical, from_version);
                let data = source.deployed_bundle(namespace, &name).await?;
                deployed_bundles.insert(logical.clone(), data);
            }
            config_diffs(&deployed_bundles, &to_bundles)
        }
    };

    debug!(
        from_version,
        to_version,
        expected = default_diffs.len(),
        actual = actual_diffs.len(),
        "comparing upgrade diffs"
    );
    ensure!(
        default_diffs == actual_diffs,
        UpgradeConflictSnafu { from_version }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::constants::{CONFIG_BUNDLE_PREFIX, CURRENT_VERSION};

    struct StaticSource {
        bundles: BTreeMap<String, BundleData>,
    }

    #[async_trait]
    impl DeployedConfigSource for StaticSource {
        async fn deployed_bundle(&self, _namespace: &str, name: &str) -> Result<BundleData> {
            Ok(self.bundles.get(name).cloned().unwrap_or_default())
        }
    }

    fn bundle(files: &[(&str, &str)]) -> BundleData {
        files
            .iter()
            .map(|(name, content)| ((*name).to_owned(), (*content).to_owned()))
            .collect()
    }

    fn store() -> BTreeMap<String, BundleData> {
        [
            (
                format!("{CONFIG_BUNDLE_PREFIX}-7.11.0-console"),
                bundle(&[("common.yaml", "replicas: 1\n"), ("console.yaml", "heap: 1g\n")]),
            ),
            (
                format!("{CONFIG_BUNDLE_PREFIX}-7.12.1-console"),
                bundle(&[("common.yaml", "replicas: 2\n"), ("console.yaml", "heap: 1g\n")]),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[rstest]
    #[case("7.12.1", ("7", "12", "1"))]
    #[case("1.2", ("1", "2", "0"))]
    #[case("1", ("1", "0", "0"))]
    fn version_segments_are_padded(#[case] version: &str, #[case] expected: (&str, &str, &str)) {
        let (major, minor, micro) = major_minor_micro(version);
        assert_eq!(
            (major.as_str(), minor.as_str(), micro.as_str()),
            expected
        );
    }

    #[test]
    fn minor_image_version_concatenates() {
        assert_eq!(minor_image_version(CURRENT_VERSION), "712");
    }

    #[test]
    fn physical_and_logical_names_round_trip() {
        let physical = format!("{CONFIG_BUNDLE_PREFIX}-7.11.0-console-extra");
        let logical = logical_name(&physical);
        assert_eq!(logical, format!("{CONFIG_BUNDLE_PREFIX}-console-extra"));
        assert_eq!(physical_name(&logical, "7.11.0"), physical);
    }

    #[tokio::test]
    async fn unsupported_version_is_refused() {
        let err = check_upgrade("6.0.0", CURRENT_VERSION, &store(), None, "default")
            .await
            .expect_err("unsupported version must fail");
        assert!(matches!(err, Error::VersionNotSupported { .. }));
    }

    #[tokio::test]
    async fn pristine_deployment_is_approved() {
        let deployed = StaticSource {
            bundles: [(
                format!("{CONFIG_BUNDLE_PREFIX}-7.11.0-console"),
                bundle(&[("common.yaml", "replicas: 1\n"), ("console.yaml", "heap: 1g\n")]),
            )]
            .into_iter()
            .collect(),
        };

        check_upgrade("7.11.0", "7.12.1", &store(), Some(&deployed), "default")
            .await
            .expect("pristine bundles must pass the gate");
    }

    #[tokio::test]
    async fn manually_edited_deployment_is_refused() {
        let deployed = StaticSource {
            bundles: [(
                format!("{CONFIG_BUNDLE_PREFIX}-7.11.0-console"),
                bundle(&[("common.yaml", "replicas: 5\n"), ("console.yaml", "heap: 1g\n")]),
            )]
            .into_iter()
            .collect(),
        };

        let err = check_upgrade("7.11.0", "7.12.1", &store(), Some(&deployed), "default")
            .await
            .expect_err("edited bundles must be refused");
        assert!(matches!(err, Error::UpgradeConflict { .. }));
    }

    #[tokio::test]
    async fn no_deployed_source_approves() {
        check_upgrade("7.11.0", "7.12.1", &store(), None, "default")
            .await
            .expect("gate without cluster lookup approves");
    }

    #[tokio::test]
    async fn bundle_dropped_by_target_version_never_gates() {
        let mut store = store();
        store.insert(
            format!("{CONFIG_BUNDLE_PREFIX}-7.11.0-legacy"),
            bundle(&[("legacy.yaml", "enabled: true\n")]),
        );
        let deployed = StaticSource {
            bundles: [
                (
                    format!("{CONFIG_BUNDLE_PREFIX}-7.11.0-console"),
                    bundle(&[("common.yaml", "replicas: 1\n"), ("console.yaml", "heap: 1g\n")]),
                ),
                (
                    format!("{CONFIG_BUNDLE_PREFIX}-7.11.0-legacy"),
                    bundle(&[("legacy.yaml", "enabled: false\n")]),
                ),
            ]
            .into_iter()
            .collect(),
        };

        check_upgrade("7.11.0", "7.12.1", &store, Some(&deployed), "default")
            .await
            .expect("edits to a bundle the target version dropped must not gate");
    }

    #[tokio::test]
    async fn store_without_bundles_for_a_version_approves() {
        let store = store();
        assert!(!store.has_version("7.12.0"));
        check_upgrade("7.12.0", "7.12.1", &store, None, "default")
            .await
            .expect("a version without shipped bundles has nothing to compare");
    }

    #[test]
    fn equal_payloads_produce_no_diff() {
        let bundles = logical_bundles(store().bundles("7.11.0"));
        assert!(config_diffs(&bundles, &bundles).is_empty());
    }

    #[test]
    fn diff_is_restricted_to_shared_bundle_names() {
        let from = [
            ("a".to_owned(), bundle(&[("f.yaml", "x: 1\n")])),
            ("dropped".to_owned(), bundle(&[("f.yaml", "x: 1\n")])),
        ]
        .into_iter()
        .collect();
        let to = [
            ("a".to_owned(), bundle(&[("f.yaml", "x: 2\n")])),
            ("added".to_owned(), bundle(&[("f.yaml", "x: 1\n")])),
        ]
        .into_iter()
        .collect();

        let diffs = config_diffs(&from, &to);
        assert_eq!(diffs.keys().collect::<Vec<_>>(), ["a"]);
    }
}
