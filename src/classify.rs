//! Partitioning of merge-tree ids into leaf and synthetic nodes.
//!
//! Leaves are ids that are members of the final cluster set (outlier
//! sentinel excluded). Synthetic nodes are internal merge ids that exist
//! only to group leaves into broader categories; a synthetic candidate with
//! no recorded children is an orphaned artifact of the external library and
//! is dropped, not treated as a valid node.

use std::collections::{BTreeSet, HashSet};

use log::warn;

use crate::error::HierarchyError;
use crate::mapping::TopicMapper;
use crate::merge_tree::MergeTree;
use crate::snapshot::TopicId;

/// Result of classifying every id the merge tree mentions.
#[derive(Debug, Default)]
pub struct NodePartition {
    /// Merge-tree ids that are themselves final cluster ids.
    pub leaf_ids: BTreeSet<TopicId>,
    /// Internal merge ids with recorded children.
    pub synthetic_ids: BTreeSet<TopicId>,
    /// Childless ids that resolve to a final cluster through the topic
    /// mapping; they contribute content to that leaf but are not nodes.
    pub mapped_leaf_ids: BTreeSet<TopicId>,
    /// Synthetic candidates dropped for having no recorded children.
    pub dropped_orphans: Vec<TopicId>,
}

/// Partition all merge-tree ids against the final cluster id set.
pub fn classify_nodes(
    tree: &MergeTree,
    mapper: TopicMapper<'_>,
    final_set: &HashSet<TopicId>,
) -> NodePartition {
    let mut partition = NodePartition::default();

    for id in tree.all_ids() {
        if final_set.contains(&id) {
            partition.leaf_ids.insert(id);
            continue;
        }
        if tree.has_children(id) {
            partition.synthetic_ids.insert(id);
            continue;
        }
        // Childless and not final: either it remaps onto a surviving leaf,
        // or it is a dangling leaf-position id (reported as UnresolvedLeaf
        // during aggregation), or an orphaned synthetic artifact.
        if mapper.resolve(id).is_some() {
            partition.mapped_leaf_ids.insert(id);
        } else if tree.parent_of(id).is_none() {
            warn!(
                "{}",
                HierarchyError::OrphanedSyntheticNode { node_id: id }
            );
            partition.dropped_orphans.push(id);
        }
    }

    partition
}
