//! Pending edits held between begin and commit/rollback.

use indexmap::{IndexMap, IndexSet};

use crate::feature::Feature;

/// Buffered adds, edits and deletes of one transaction.
///
/// Insertion order is preserved so commits apply operations deterministically.
/// The buffer performs no cross-validation: an id may sit in both the add and
/// delete sets, and the backend resolves that at commit.
#[derive(Debug, Clone, Default)]
pub struct TransactionBuffer {
    adds: IndexMap<String, Feature>,
    edits: IndexMap<String, Feature>,
    deletes: IndexSet<String>,
}

impl TransactionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an add under the feature's id, replacing a prior add of that id.
    pub fn add_feature(&mut self, feature: Feature) {
        self.adds.insert(feature.id().to_string(), feature);
    }

    /// Buffer an edit; the last edit for an id wins.
    pub fn edit_feature(&mut self, feature: Feature) {
        self.edits.insert(feature.id().to_string(), feature);
    }

    pub fn delete_feature(&mut self, id: impl Into<String>) {
        self.deletes.insert(id.into());
    }

    /// Empty all three collections at once.
    pub fn clear(&mut self) {
        self.adds.clear();
        self.edits.clear();
        self.deletes.clear();
    }

    pub fn adds(&self) -> impl Iterator<Item = &Feature> {
        self.adds.values()
    }

    pub fn edits(&self) -> impl Iterator<Item = &Feature> {
        self.edits.values()
    }

    pub fn deletes(&self) -> impl Iterator<Item = &str> {
        self.deletes.iter().map(String::as_str)
    }

    pub fn added(&self, id: &str) -> Option<&Feature> {
        self.adds.get(id)
    }

    pub fn edited(&self, id: &str) -> Option<&Feature> {
        self.edits.get(id)
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.deletes.contains(id)
    }

    /// Number of buffered operations across all three collections.
    pub fn len(&self) -> usize {
        self.adds.len() + self.edits.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of buffered operations that can remove a backend row from a
    /// result (edits and deletes).
    pub fn displacing_len(&self) -> usize {
        self.edits.len() + self.deletes.len()
    }
}
