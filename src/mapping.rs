//! Topic identity resolution across the two cluster granularities.
//!
//! The merge tree is built over pre-reduction cluster ids; the assembled
//! tree's leaves are post-reduction ("final") cluster ids. An original id
//! resolves to its final id through the partial topic mapping, or survives
//! unchanged if it is itself a final cluster id, or has no surviving
//! representation at all.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::snapshot::TopicId;

/// Resolves pre-reduction ids to their post-reduction representation.
#[derive(Debug, Clone, Copy)]
pub struct TopicMapper<'a> {
    mapping: &'a HashMap<TopicId, TopicId>,
    final_set: &'a HashSet<TopicId>,
}

impl<'a> TopicMapper<'a> {
    pub fn new(mapping: &'a HashMap<TopicId, TopicId>, final_set: &'a HashSet<TopicId>) -> Self {
        Self { mapping, final_set }
    }

    /// Resolve an original cluster id to its final cluster id.
    ///
    /// Returns `None` when the id was merged away without leaving a direct
    /// descendant leaf at this level (unresolved).
    pub fn resolve(&self, original_id: TopicId) -> Option<TopicId> {
        if let Some(&final_id) = self.mapping.get(&original_id) {
            return Some(final_id);
        }
        if self.final_set.contains(&original_id) {
            return Some(original_id);
        }
        None
    }
}

/// Fold an observed depth into a per-final-id depth map, keeping the
/// minimum across collisions.
///
/// When multiple original topics collapse onto one final topic, the
/// shallower occurrence is the semantically more general one and wins.
pub fn fold_min_depth(depths: &mut BTreeMap<TopicId, u32>, final_id: TopicId, depth: u32) {
    depths
        .entry(final_id)
        .and_modify(|d| *d = (*d).min(depth))
        .or_insert(depth);
}
