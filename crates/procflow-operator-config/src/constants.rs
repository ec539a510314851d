//! Product-wide constants shared by the merge engine and the upgrade gate.

pub const PRODUCT_NAME: &str = "procflow";

/// The version new deployments are created with.
pub const CURRENT_VERSION: &str = "7.12.1";

/// Versions the operator ships default configuration bundles for.
/// Ordered newest first.
pub const SUPPORTED_VERSIONS: &[&str] = &["7.12.1", "7.12.0", "7.11.0"];

/// First name segment of every default configuration bundle. Physical bundle
/// names follow `<prefix>-<version>-<suffix...>`, e.g.
/// `procflowconfigs-7.12.1-envs.yaml`.
pub const CONFIG_BUNDLE_PREFIX: &str = "procflowconfigs";

/// Annotation key a user sets to `"true"` on an overwrite record to suppress
/// the corresponding baseline record from the merged result.
pub const DELETE_ANNOTATION: &str = "delete";
