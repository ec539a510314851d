//! Identity-based record matching and the generic collection merge every
//! resource kind shares.

use std::collections::BTreeMap;

use k8s_openapi::{DeepMerge, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use tracing::debug;

use super::Result;
use crate::constants::DELETE_ANNOTATION;

/// The minimal capability a resource record needs to take part in a merge:
/// a name to match by and an annotation map to carry the deletion marker.
///
/// Matching is name-only. Two records with identical specs but different
/// names never merge; two records with the same name always attempt one.
pub trait NamedResource {
    fn metadata(&self) -> &ObjectMeta;

    fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().annotations.as_ref()
    }

    /// Whether the overwrite layer flagged this record for deletion.
    fn marked_for_deletion(&self) -> bool {
        self.annotations()
            .is_some_and(|annotations| annotations.get(DELETE_ANNOTATION).map(String::as_str) == Some("true"))
    }
}

macro_rules! named_resource {
    ($($kind:ty),+ $(,)?) => {
        $(impl NamedResource for $kind {
            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }
        })+
    };
}

named_resource!(
    k8s_openapi::api::core::v1::ConfigMap,
    k8s_openapi::api::core::v1::PersistentVolumeClaim,
    k8s_openapi::api::core::v1::Secret,
    k8s_openapi::api::core::v1::Service,
    k8s_openapi::api::core::v1::ServiceAccount,
    k8s_openapi::api::apps::v1::StatefulSet,
    k8s_openapi::api::rbac::v1::Role,
    k8s_openapi::api::rbac::v1::RoleBinding,
    crate::crd::BuildConfig,
    crate::crd::DeploymentConfig,
    crate::crd::ImageStream,
    crate::crd::Route,
);

/// Finds the first record in `haystack` whose name equals `needle`'s name.
pub fn find_named<'a, T, N>(needle: &N, haystack: &'a [T]) -> Option<(usize, &'a T)>
where
    T: NamedResource,
    N: NamedResource + ?Sized,
{
    haystack
        .iter()
        .enumerate()
        .find(|(_, candidate)| candidate.name() == needle.name())
}

/// The number of records a merged collection will hold: every baseline
/// record, plus overwrite records without a baseline counterpart, minus
/// baseline records the overwrite layer marked for deletion.
pub fn combined_size<T: NamedResource>(baseline: &[T], overwrite: &[T]) -> usize {
    let mut count = baseline.len();
    for record in overwrite {
        let found = find_named(record, baseline).is_some();
        if !found && !record.marked_for_deletion() {
            count += 1;
        } else if found && record.marked_for_deletion() {
            count -= 1;
        }
    }
    count
}

/// Merges two same-kind collections.
///
/// Records are emitted in baseline order: unmatched baseline records as-is,
/// matched pairs through `merge_pair` (unless the overwrite counterpart is
/// deletion-marked, in which case nothing is emitted), followed by the
/// overwrite-only records in their original order. A deletion-marked record
/// without a baseline counterpart is never materialized.
pub fn merge_collection<T, F>(baseline: &[T], overwrite: &[T], mut merge_pair: F) -> Result<Vec<T>>
where
    T: NamedResource + Clone,
    F: FnMut(&T, &T) -> Result<T>,
{
    if overwrite.is_empty() {
        return Ok(baseline.to_vec());
    }
    if baseline.is_empty() {
        return Ok(overwrite.to_vec());
    }

    let mut merged = Vec::with_capacity(combined_size(baseline, overwrite));
    for record in baseline {
        match find_named(record, overwrite) {
            None => merged.push(record.clone()),
            Some((_, counterpart)) if counterpart.marked_for_deletion() => {
                debug!(name = record.name(), "suppressing deletion-marked record");
            }
            Some((_, counterpart)) => merged.push(merge_pair(record, counterpart)?),
        }
    }
    for record in overwrite {
        if !record.marked_for_deletion() && find_named(record, baseline).is_none() {
            debug!(name = record.name(), "appending overwrite-only record");
            merged.push(record.clone());
        }
    }

    debug_assert_eq!(merged.len(), combined_size(baseline, overwrite));
    Ok(merged)
}

/// Default pair merge: the overwrite record's explicitly-set fields win,
/// baseline supplies everything the overwrite layer left unset.
pub fn deep_fill<T: Clone + DeepMerge>(baseline: &T, overwrite: &T) -> T {
    let mut merged = baseline.clone();
    merged.merge_from(overwrite.clone());
    merged
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;

    use super::*;

    fn secret(name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn deletion_marked(name: &str) -> Secret {
        let mut secret = secret(name);
        secret.metadata.annotations = Some(
            [(DELETE_ANNOTATION.to_owned(), "true".to_owned())]
                .into_iter()
                .collect(),
        );
        secret
    }

    #[test]
    fn find_named_matches_by_name_only() {
        let haystack = vec![secret("a"), secret("b")];
        let (index, found) = find_named(&secret("b"), &haystack).expect("b is present");
        assert_eq!(index, 1);
        assert_eq!(found.name(), "b");
        assert!(find_named(&secret("c"), &haystack).is_none());
    }

    #[test]
    fn empty_sides_are_identities() {
        let baseline = vec![secret("a"), secret("b")];
        let merged = merge_collection(&baseline, &[], |b, o| Ok(deep_fill(b, o)))
            .expect("merge with empty overwrite succeeds");
        assert_eq!(merged, baseline);

        let overwrite = vec![secret("c")];
        let merged = merge_collection(&[], &overwrite, |b, o| Ok(deep_fill(b, o)))
            .expect("merge with empty baseline succeeds");
        assert_eq!(merged, overwrite);
    }

    #[test]
    fn combined_size_matches_emitted_length() {
        let baseline = vec![secret("a"), secret("b"), secret("c")];
        let overwrite = vec![deletion_marked("b"), secret("d"), deletion_marked("ghost")];
        let merged = merge_collection(&baseline, &overwrite, |b, o| Ok(deep_fill(b, o)))
            .expect("merge succeeds");
        assert_eq!(merged.len(), combined_size(&baseline, &overwrite));
        assert_eq!(
            merged.iter().map(NamedResource::name).collect::<Vec<_>>(),
            ["a", "c", "d"]
        );
    }

    #[test]
    fn deletion_marker_suppresses_baseline_counterpart() {
        let baseline = vec![secret("a")];
        let overwrite = vec![deletion_marked("a")];
        let merged = merge_collection(&baseline, &overwrite, |b, o| Ok(deep_fill(b, o)))
            .expect("merge succeeds");
        assert!(merged.is_empty());
    }

    #[test]
    fn deletion_marker_without_counterpart_never_materializes() {
        let baseline = vec![secret("a")];
        let overwrite = vec![deletion_marked("phantom")];
        let merged = merge_collection(&baseline, &overwrite, |b, o| Ok(deep_fill(b, o)))
            .expect("merge succeeds");
        assert_eq!(merged.iter().map(NamedResource::name).collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn matched_pair_is_field_filled() {
        let mut baseline = secret("a");
        baseline.string_data = Some(
            [
                ("kept".to_owned(), "baseline".to_owned()),
                ("overridden".to_owned(), "baseline".to_owned()),
            ]
            .into_iter()
            .collect(),
        );
        let mut overwrite = secret("a");
        overwrite.string_data = Some(
            [("overridden".to_owned(), "overwrite".to_owned())]
                .into_iter()
                .collect(),
        );

        let merged = merge_collection(&[baseline], &[overwrite], |b, o| Ok(deep_fill(b, o)))
            .expect("merge succeeds");
        let string_data = merged[0].string_data.as_ref().expect("data is set");
        assert_eq!(string_data["kept"], "baseline");
        assert_eq!(string_data["overridden"], "overwrite");
    }
}
