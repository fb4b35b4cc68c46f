//! Live-transaction read overlay.
//!
//! Merges a backend result with the pending buffer so the read looks as if
//! the buffer were already committed. The merge applies adds, then edits,
//! then deletes, the same order a commit uses, so an edit of a buffered add
//! or a delete of a buffered add resolves the same way on read and on commit.
//!
//! One rule for every query family: a buffered add or edit joins the result
//! iff it satisfies that family's predicate (`matches`). Deletes and edits
//! that no longer match remove the backend row with the same id.

use indexmap::IndexMap;

use crate::feature::Feature;
use crate::transaction::TransactionBuffer;

use super::errors::EngineResult;

/// Merge `backend` with `buffer`.
///
/// `prepare` shapes a buffered feature like a backend row of the same
/// request (column projection, combinators). An edit that matches keeps the
/// backend row's position; new rows are appended in buffered order.
pub fn merge<M, P>(
    backend: Vec<Feature>,
    buffer: &TransactionBuffer,
    mut matches: M,
    prepare: P,
) -> EngineResult<Vec<Feature>>
where
    M: FnMut(&Feature) -> EngineResult<bool>,
    P: Fn(&Feature) -> Feature,
{
    let mut rows: IndexMap<String, Feature> = IndexMap::with_capacity(backend.len());
    for feature in backend {
        rows.entry(feature.id().to_string()).or_insert(feature);
    }

    for added in buffer.adds() {
        if matches(added)? {
            // A backend row with the same id makes the add fail at commit.
            rows.entry(added.id().to_string())
                .or_insert_with(|| prepare(added));
        }
    }

    for edited in buffer.edits() {
        if matches(edited)? {
            rows.insert(edited.id().to_string(), prepare(edited));
        } else {
            rows.shift_remove(edited.id());
        }
    }

    for id in buffer.deletes() {
        rows.shift_remove(id);
    }

    Ok(rows.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;

    fn feature(id: &str, x: i32) -> Feature {
        Feature::new(id, format!("POINT({} 0)", x)).with_column("x", x.to_string())
    }

    fn x_of(f: &Feature) -> i32 {
        f.column("x").and_then(|v| v.parse().ok()).unwrap_or(i32::MIN)
    }

    fn ids(features: &[Feature]) -> Vec<&str> {
        features.iter().map(|f| f.id()).collect()
    }

    fn positive(f: &Feature) -> EngineResult<bool> {
        Ok(x_of(f) > 0)
    }

    #[test]
    fn test_empty_buffer_is_identity() {
        let backend = vec![feature("a", 1), feature("b", 2)];
        let merged = merge(backend.clone(), &TransactionBuffer::new(), positive, Feature::clone)
            .unwrap();
        assert_eq!(merged, backend);
    }

    #[test]
    fn test_matching_add_appended_and_non_matching_skipped() {
        let mut buffer = TransactionBuffer::new();
        buffer.add_feature(feature("new", 5));
        buffer.add_feature(feature("neg", -5));
        let merged = merge(vec![feature("a", 1)], &buffer, positive, Feature::clone).unwrap();
        assert_eq!(ids(&merged), vec!["a", "new"]);
    }

    #[test]
    fn test_edit_replaces_in_place_or_removes() {
        let mut buffer = TransactionBuffer::new();
        buffer.edit_feature(feature("a", 10));
        buffer.edit_feature(feature("b", -1));
        let backend = vec![feature("a", 1), feature("b", 2), feature("c", 3)];
        let merged = merge(backend, &buffer, positive, Feature::clone).unwrap();
        assert_eq!(ids(&merged), vec!["a", "c"]);
        assert_eq!(x_of(&merged[0]), 10);
    }

    #[test]
    fn test_edit_moving_into_result_is_appended() {
        let mut buffer = TransactionBuffer::new();
        buffer.edit_feature(feature("outside", 7));
        let merged = merge(vec![feature("a", 1)], &buffer, positive, Feature::clone).unwrap();
        assert_eq!(ids(&merged), vec!["a", "outside"]);
    }

    #[test]
    fn test_delete_removes_backend_and_added_rows() {
        let mut buffer = TransactionBuffer::new();
        buffer.add_feature(feature("tmp", 3));
        buffer.delete_feature("tmp");
        buffer.delete_feature("a");
        let merged = merge(vec![feature("a", 1), feature("b", 2)], &buffer, positive, Feature::clone)
            .unwrap();
        assert_eq!(ids(&merged), vec!["b"]);
    }

    #[test]
    fn test_prepare_applies_only_to_buffered_rows() {
        let mut buffer = TransactionBuffer::new();
        buffer.add_feature(feature("new", 4));
        let merged = merge(vec![feature("a", 1)], &buffer, positive, |f| {
            f.projected(&[])
        })
        .unwrap();
        assert_eq!(merged[0].columns().len(), 1);
        assert!(merged[1].columns().is_empty());
    }

    #[test]
    fn test_predicate_error_propagates() {
        let mut buffer = TransactionBuffer::new();
        buffer.add_feature(feature("new", 4));
        let result = merge(
            Vec::new(),
            &buffer,
            |_| Err(EngineError::geometry_failed("bad")),
            Feature::clone,
        );
        assert!(result.is_err());
    }
}
