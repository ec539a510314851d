//! Configuration resolution for the ProcFlow operator.
//!
//! Two concerns live here. The [`merge`] module resolves a deployment's
//! effective configuration by layering environments on top of each other,
//! and the [`upgrade`] module gates version upgrades on the deployed
//! configuration bundles being free of manual edits.

pub mod constants;
pub mod crd;
pub mod merge;
pub mod upgrade;

pub use k8s_openapi;
pub use kube;
pub use schemars;
