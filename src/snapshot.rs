//! Immutable input snapshot from the external clustering step.
//!
//! All components take a [`ClusteringSnapshot`] explicitly; nothing reaches
//! into ambient state. The snapshot is built once per pipeline run, held in
//! memory for the duration of tree assembly, then discarded.

use std::collections::{HashMap, HashSet};

/// Cluster / merge-node identifier. Merge-tree internal nodes share the same
/// id space as clusters (the external library numbers internal nodes above
/// the cluster range).
pub type TopicId = i64;

/// Reserved cluster id for unclustered/noise documents. Excluded from the
/// hierarchy everywhere.
pub const OUTLIER_TOPIC_ID: TopicId = -1;

/// One binary merge event from agglomerative clustering.
///
/// `distance` is the merge cost at which the two children combined. It is
/// monotonically non-decreasing across the input sequence and used only for
/// diagnostics, never for correctness.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRecord {
    pub parent_id: TopicId,
    pub left_child_id: TopicId,
    pub right_child_id: TopicId,
    pub distance: f64,
}

impl MergeRecord {
    pub fn new(
        parent_id: TopicId,
        left_child_id: TopicId,
        right_child_id: TopicId,
        distance: f64,
    ) -> Self {
        Self {
            parent_id,
            left_child_id,
            right_child_id,
            distance,
        }
    }
}

/// Per-cluster content statistics for a final (reduced) cluster.
#[derive(Debug, Clone, Default)]
pub struct LeafTopic {
    /// Number of documents directly assigned to this cluster.
    pub document_count: usize,
    /// Bounded, ordered sample of member documents.
    pub sample_documents: Vec<String>,
    /// Keyword -> score from the clustering step. Insertion order is
    /// irrelevant; aggregation re-sorts.
    pub keyword_weights: HashMap<String, f64>,
}

/// Everything the engine needs from the external clustering collaborator,
/// captured as one immutable value.
#[derive(Debug, Clone, Default)]
pub struct ClusteringSnapshot {
    /// Ordered binary merge events over the pre-reduction cluster id space.
    pub merge_records: Vec<MergeRecord>,
    /// Partial mapping original cluster id -> final cluster id. Ids absent
    /// from the map either survived reduction unchanged or were merged away.
    pub topic_mapping: HashMap<TopicId, TopicId>,
    /// The final (post-reduction) cluster id set, possibly still containing
    /// the outlier sentinel.
    pub final_clusters: HashSet<TopicId>,
    /// Content statistics keyed by final cluster id.
    pub leaf_topics: HashMap<TopicId, LeafTopic>,
}

impl ClusteringSnapshot {
    /// Final cluster ids with the outlier sentinel removed. This is the
    /// leaf-id universe for the assembled tree.
    pub fn final_clusters_without_outlier(&self) -> HashSet<TopicId> {
        self.final_clusters
            .iter()
            .copied()
            .filter(|id| *id != OUTLIER_TOPIC_ID)
            .collect()
    }

    pub fn leaf(&self, final_id: TopicId) -> Option<&LeafTopic> {
        self.leaf_topics.get(&final_id)
    }
}
