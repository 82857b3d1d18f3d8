//! Merge tree loading and normalization.
//!
//! The external clustering library hands us a flat sequence of binary merge
//! events. This module normalizes them into the two lookup structures the
//! rest of the engine works from: parent -> children and child -> parent.
//!
//! The input is not verified upstream, so loading is defensive: a record
//! that would assign a second parent to an already-parented child is a
//! data-integrity violation. The record is logged and skipped, and assembly
//! continues with the remaining well-formed records. Only an input in which
//! every record is malformed aborts the run.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::error::{HierarchyError, Result};
use crate::snapshot::{MergeRecord, TopicId};

/// Normalized merge tree: one or more rooted binary trees over topic ids.
#[derive(Debug, Clone, Default)]
pub struct MergeTree {
    /// Parent id -> exactly two child ids, in record order.
    parent_to_children: HashMap<TopicId, Vec<TopicId>>,
    /// Child id -> its unique parent.
    child_to_parent: HashMap<TopicId, TopicId>,
    /// Every id mentioned by an accepted record, as parent or child.
    all_ids: HashSet<TopicId>,
    /// Count of malformed records that were skipped during loading.
    skipped_records: usize,
}

impl MergeTree {
    /// Normalize a sequence of merge records. Empty input is valid and
    /// yields empty structures (the caller falls back to a flat tree).
    pub fn from_records(records: &[MergeRecord]) -> Result<Self> {
        let mut tree = MergeTree::default();

        for record in records {
            if let Err(e) = tree.insert(record) {
                warn!("skipping merge record: {}", e);
                tree.skipped_records += 1;
            }
        }

        if !records.is_empty() && tree.parent_to_children.is_empty() {
            return Err(HierarchyError::MergeTreeUnusable {
                record_count: records.len(),
            });
        }

        Ok(tree)
    }

    fn insert(&mut self, record: &MergeRecord) -> Result<()> {
        let MergeRecord {
            parent_id,
            left_child_id,
            right_child_id,
            ..
        } = *record;

        if left_child_id == right_child_id {
            // A binary merge of a node with itself would parent it twice.
            return Err(HierarchyError::MalformedMergeTree {
                child_id: left_child_id,
                existing_parent: parent_id,
                new_parent: parent_id,
            });
        }
        if let Some(&existing) = self.child_to_parent.get(&left_child_id) {
            return Err(HierarchyError::MalformedMergeTree {
                child_id: left_child_id,
                existing_parent: existing,
                new_parent: parent_id,
            });
        }
        if let Some(&existing) = self.child_to_parent.get(&right_child_id) {
            return Err(HierarchyError::MalformedMergeTree {
                child_id: right_child_id,
                existing_parent: existing,
                new_parent: parent_id,
            });
        }
        if self.parent_to_children.contains_key(&parent_id) {
            // Re-merging an already-merged parent would silently overwrite
            // its children; treat it like a duplicate-parent assignment.
            return Err(HierarchyError::MalformedMergeTree {
                child_id: parent_id,
                existing_parent: parent_id,
                new_parent: parent_id,
            });
        }

        self.parent_to_children
            .insert(parent_id, vec![left_child_id, right_child_id]);
        self.child_to_parent.insert(left_child_id, parent_id);
        self.child_to_parent.insert(right_child_id, parent_id);
        self.all_ids.extend([parent_id, left_child_id, right_child_id]);

        Ok(())
    }

    /// Ids that appear as a parent in some record but never as a child.
    /// Sorted for deterministic iteration.
    pub fn roots(&self) -> Vec<TopicId> {
        let mut roots: Vec<TopicId> = self
            .parent_to_children
            .keys()
            .copied()
            .filter(|id| !self.child_to_parent.contains_key(id))
            .collect();
        roots.sort_unstable();
        roots
    }

    pub fn children_of(&self, id: TopicId) -> &[TopicId] {
        self.parent_to_children
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, id: TopicId) -> Option<TopicId> {
        self.child_to_parent.get(&id).copied()
    }

    pub fn has_children(&self, id: TopicId) -> bool {
        self.parent_to_children.contains_key(&id)
    }

    pub fn contains(&self, id: TopicId) -> bool {
        self.all_ids.contains(&id)
    }

    /// All ids mentioned by accepted records, sorted.
    pub fn all_ids(&self) -> Vec<TopicId> {
        let mut ids: Vec<TopicId> = self.all_ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.parent_to_children.is_empty()
    }

    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }
}
