//! Error taxonomy for tree assembly.
//!
//! Most kinds are per-record or per-node and degrade gracefully: they are
//! logged where they occur and assembly continues. Only a fully malformed
//! merge tree or a missing final cluster set abort a run.

use thiserror::Error;

use crate::snapshot::TopicId;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HierarchyError {
    /// A merge record tried to assign a second parent to a child that
    /// already has one. Per-record this is skipped; if every record in a
    /// non-empty input is malformed the whole run aborts.
    #[error("malformed merge tree: child {child_id} already has parent {existing_parent}, record assigns {new_parent}")]
    MalformedMergeTree {
        child_id: TopicId,
        existing_parent: TopicId,
        new_parent: TopicId,
    },

    /// Every record in the merge input was malformed.
    #[error("malformed merge tree: all {record_count} merge records were rejected")]
    MergeTreeUnusable { record_count: usize },

    /// Defensive check tripped during depth ascent. The merge tree is
    /// externally supplied and not verified upstream.
    #[error("cycle detected in merge tree while ascending from node {node_id}")]
    CycleDetected { node_id: TopicId },

    /// A leaf-position id with no mapping to a final cluster id. Excluded
    /// from aggregation, non-fatal.
    #[error("leaf {original_id} has no final cluster representation")]
    UnresolvedLeaf { original_id: TopicId },

    /// A synthetic id with no recorded children, typically an artifact of
    /// a skipped malformed record. Dropped, non-fatal.
    #[error("synthetic node {node_id} has no recorded children")]
    OrphanedSyntheticNode { node_id: TopicId },

    /// Merge-tree input was empty or absent. The run falls back to a flat
    /// tree of depth-0 leaves.
    #[error("no merge tree available, falling back to flat topic list")]
    NoHierarchyAvailable,

    /// Label service failed for one node after retries. The node degrades
    /// to its deterministic fallback label.
    #[error("label synthesis failed for node {node_id}: {reason}")]
    LabelSynthesisFailure { node_id: TopicId, reason: String },

    /// The snapshot carried no final cluster ids at all. Run-aborting.
    #[error("final cluster id set is empty")]
    MissingFinalClusters,
}

pub type Result<T> = std::result::Result<T, HierarchyError>;
