//! Tree assembly: drives the full pipeline from a clustering snapshot to
//! a labeled topic tree.
//!
//! The assembler owns the stage progression (load, depths, classify,
//! aggregate, label) and the degradation rules: a missing hierarchy falls
//! back to a flat tree, and any label failure falls back to a
//! deterministic document-derived title. Given the same snapshot and an
//! idempotent synthesizer, output is byte-identical across runs.

use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::aggregate::ContentAggregator;
use crate::classify::classify_nodes;
use crate::depth::{max_depth_over, DepthCalculator, DepthMemo};
use crate::error::{HierarchyError, Result};
use crate::label::{
    fallback_label, synthesize_with_retry, LabelRequest, LabelSynthesizer, RetryPolicy,
};
use crate::mapping::{fold_min_depth, TopicMapper};
use crate::merge_tree::MergeTree;
use crate::snapshot::{ClusteringSnapshot, TopicId};

/// Pipeline stage, in execution order. Each stage consumes the previous
/// stage's output only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    LoadingMergeTree,
    ComputingDepths,
    ClassifyingNodes,
    AggregatingContent,
    SynthesizingLabels,
    Assembled,
}

/// One node of the assembled tree. Leaf nodes carry a final cluster id;
/// synthetic nodes carry a merge-tree internal id.
#[derive(Debug, Clone, Serialize)]
pub struct TopicNode {
    pub id: TopicId,
    pub title: String,
    pub parent_topic_id: Option<TopicId>,
    pub depth: u32,
    pub is_synthetic: bool,
    pub document_count: usize,
    /// Top aggregated keywords, highest mass first.
    pub keywords: Vec<String>,
    /// Child node ids, ascending.
    pub child_topics: Vec<TopicId>,
}

/// The assembled, labeled topic tree.
#[derive(Debug, Clone, Serialize)]
pub struct TopicTree {
    /// All nodes keyed by id; iteration order is ascending id.
    pub nodes: BTreeMap<TopicId, TopicNode>,
    /// Ids of parentless nodes, ascending.
    pub roots: Vec<TopicId>,
    pub max_depth: u32,
}

impl TopicTree {
    pub fn get(&self, id: TopicId) -> Option<&TopicNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nested JSON view: each node with its children inlined, children
    /// ordered by document count descending so the heaviest branches come
    /// first at every level.
    pub fn to_hierarchy_json(&self) -> serde_json::Value {
        let mut roots = self.roots.clone();
        self.sort_by_weight(&mut roots);
        serde_json::Value::Array(roots.iter().map(|&id| self.node_json(id)).collect())
    }

    fn node_json(&self, id: TopicId) -> serde_json::Value {
        let node = &self.nodes[&id];
        let mut children = node.child_topics.clone();
        self.sort_by_weight(&mut children);
        serde_json::json!({
            "topic_id": node.id,
            "title": node.title,
            "is_synthetic": node.is_synthetic,
            "depth": node.depth,
            "document_count": node.document_count,
            "keywords": node.keywords,
            "children": children.iter().map(|&c| self.node_json(c)).collect::<Vec<_>>(),
        })
    }

    fn sort_by_weight(&self, ids: &mut [TopicId]) {
        ids.sort_by(|a, b| {
            let wa = self.nodes.get(a).map(|n| n.document_count).unwrap_or(0);
            let wb = self.nodes.get(b).map(|n| n.document_count).unwrap_or(0);
            wb.cmp(&wa).then_with(|| a.cmp(b))
        });
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum sibling groups labeled concurrently.
    pub label_concurrency: usize,
    /// Wall-clock bound on one node's label call including retries.
    pub label_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            label_concurrency: 4,
            label_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

/// A node with everything decided except its title.
struct PendingNode {
    parent: Option<TopicId>,
    depth: u32,
    is_synthetic: bool,
    documents: Vec<String>,
    keywords: Vec<String>,
    document_count: usize,
}

pub struct TreeAssembler<S: LabelSynthesizer> {
    synthesizer: Arc<S>,
    config: AssemblerConfig,
}

impl<S: LabelSynthesizer> TreeAssembler<S> {
    pub fn new(synthesizer: Arc<S>, config: AssemblerConfig) -> Self {
        Self {
            synthesizer,
            config,
        }
    }

    /// Run the full pipeline over one snapshot.
    pub async fn assemble(&self, snapshot: &ClusteringSnapshot) -> Result<TopicTree> {
        let final_set = snapshot.final_clusters_without_outlier();
        if final_set.is_empty() {
            return Err(HierarchyError::MissingFinalClusters);
        }

        let mut stage = AssemblyStage::LoadingMergeTree;
        debug!("assembly stage: {:?}", stage);
        let tree = MergeTree::from_records(&snapshot.merge_records)?;

        if tree.is_empty() {
            warn!("{}", HierarchyError::NoHierarchyAvailable);
            let pending = self.flat_pending(snapshot, &final_set);
            return self.label_and_finalize(pending, 0).await;
        }

        stage = AssemblyStage::ComputingDepths;
        debug!("assembly stage: {:?}", stage);
        let calculator = DepthCalculator::new(&tree);
        let mut memo = DepthMemo::new();
        let defects = calculator.compute_all(&mut memo);
        if !defects.is_empty() {
            warn!("{} ids degraded to depth 0 during depth computation", defects.len());
        }

        stage = AssemblyStage::ClassifyingNodes;
        debug!("assembly stage: {:?}", stage);
        let partition = classify_nodes(
            &tree,
            TopicMapper::new(&snapshot.topic_mapping, &final_set),
            &final_set,
        );

        // Every final cluster gets exactly one node. Its depth is the
        // minimum over contributing tree positions, and its parent is the
        // parent of the shallowest contributor (lowest id on ties).
        let mapper = TopicMapper::new(&snapshot.topic_mapping, &final_set);
        let mut leaf_depths: BTreeMap<TopicId, u32> = BTreeMap::new();
        let mut leaf_parents: HashMap<TopicId, (u32, Option<TopicId>)> = HashMap::new();
        let contributors: BTreeSet<TopicId> = partition
            .leaf_ids
            .iter()
            .chain(partition.mapped_leaf_ids.iter())
            .copied()
            .collect();
        for &id in &contributors {
            let final_id = if final_set.contains(&id) {
                id
            } else {
                match mapper.resolve(id) {
                    Some(f) => f,
                    None => continue,
                }
            };
            let depth = memo.get(id).unwrap_or(0);
            fold_min_depth(&mut leaf_depths, final_id, depth);
            let candidate = (depth, tree.parent_of(id));
            leaf_parents
                .entry(final_id)
                .and_modify(|best| {
                    if depth < best.0 {
                        *best = candidate;
                    }
                })
                .or_insert(candidate);
        }

        // Tree depth counts only ids that survive into the output; an
        // unresolved merge chain deeper than any real node must not widen
        // the sampling thresholds or the labeling bound.
        let max_depth = max_depth_over(partition.synthetic_ids.iter().copied(), &memo)
            .max(leaf_depths.values().copied().max().unwrap_or(0));

        stage = AssemblyStage::AggregatingContent;
        debug!("assembly stage: {:?}", stage);
        let aggregator = ContentAggregator::new(
            &tree,
            snapshot,
            TopicMapper::new(&snapshot.topic_mapping, &final_set),
            &memo,
            max_depth,
        );

        let mut pending: BTreeMap<TopicId, PendingNode> = BTreeMap::new();

        for &id in &partition.synthetic_ids {
            let content = aggregator.aggregate(id);
            let descendant_leaves: BTreeSet<TopicId> =
                aggregator.collect_descendant_leaves(id).into_iter().collect();
            let document_count = descendant_leaves
                .iter()
                .filter_map(|f| snapshot.leaf(*f))
                .map(|l| l.document_count)
                .sum();
            pending.insert(
                id,
                PendingNode {
                    parent: tree.parent_of(id),
                    depth: memo.get(id).unwrap_or(0),
                    is_synthetic: true,
                    documents: content.documents,
                    keywords: content.keywords.into_iter().map(|(w, _)| w).collect(),
                    document_count,
                },
            );
        }

        let mut finals: Vec<TopicId> = final_set.iter().copied().collect();
        finals.sort_unstable();
        for final_id in finals {
            let depth = leaf_depths.get(&final_id).copied().unwrap_or(0);
            // Parent must itself be a node; a dropped orphan cannot be one.
            let parent = leaf_parents
                .get(&final_id)
                .and_then(|(_, p)| *p)
                .filter(|p| partition.synthetic_ids.contains(p) || final_set.contains(p));
            let leaf = snapshot.leaf(final_id);
            let documents = leaf.map(|l| l.sample_documents.clone()).unwrap_or_default();
            let keywords = leaf
                .map(|l| {
                    crate::aggregate::merge_keywords(std::iter::once(l), depth, max_depth)
                        .into_iter()
                        .map(|(w, _)| w)
                        .collect()
                })
                .unwrap_or_default();
            pending.insert(
                final_id,
                PendingNode {
                    parent,
                    depth,
                    is_synthetic: false,
                    documents,
                    keywords,
                    document_count: leaf.map(|l| l.document_count).unwrap_or(0),
                },
            );
        }

        stage = AssemblyStage::SynthesizingLabels;
        debug!("assembly stage: {:?}", stage);
        let assembled = self.label_and_finalize(pending, max_depth).await?;

        stage = AssemblyStage::Assembled;
        debug!("assembly stage: {:?}", stage);
        Ok(assembled)
    }

    /// Flat degraded form: every final cluster is a root at depth 0.
    fn flat_pending(
        &self,
        snapshot: &ClusteringSnapshot,
        final_set: &std::collections::HashSet<TopicId>,
    ) -> BTreeMap<TopicId, PendingNode> {
        let mut finals: Vec<TopicId> = final_set.iter().copied().collect();
        finals.sort_unstable();
        finals
            .into_iter()
            .map(|final_id| {
                let leaf = snapshot.leaf(final_id);
                (
                    final_id,
                    PendingNode {
                        parent: None,
                        depth: 0,
                        is_synthetic: false,
                        documents: leaf.map(|l| l.sample_documents.clone()).unwrap_or_default(),
                        keywords: leaf
                            .map(|l| {
                                crate::aggregate::merge_keywords(std::iter::once(l), 0, 0)
                                    .into_iter()
                                    .map(|(w, _)| w)
                                    .collect()
                            })
                            .unwrap_or_default(),
                        document_count: leaf.map(|l| l.document_count).unwrap_or(0),
                    },
                )
            })
            .collect()
    }

    /// Label every pending node and produce the final tree.
    ///
    /// Sibling groups run concurrently under a semaphore; within a group
    /// nodes are labeled serially in ascending id order so each call sees
    /// the labels its earlier siblings received.
    async fn label_and_finalize(
        &self,
        pending: BTreeMap<TopicId, PendingNode>,
        max_depth: u32,
    ) -> Result<TopicTree> {
        let mut groups: BTreeMap<Option<TopicId>, Vec<TopicId>> = BTreeMap::new();
        for (&id, node) in &pending {
            groups.entry(node.parent).or_default().push(id);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.label_concurrency.max(1)));
        let pending_ref = &pending;
        let group_futures = groups.values().map(|ids| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await;
                let mut labeled = Vec::with_capacity(ids.len());
                let mut sibling_labels: Vec<String> = Vec::new();
                for &id in ids {
                    let node = &pending_ref[&id];
                    let request = LabelRequest {
                        node_id: id,
                        documents: node.documents.clone(),
                        keywords: node.keywords.clone(),
                        depth: node.depth,
                        max_depth,
                        sibling_labels: sibling_labels.clone(),
                    };
                    let title = match timeout(
                        self.config.label_timeout,
                        synthesize_with_retry(
                            self.synthesizer.as_ref(),
                            &request,
                            &self.config.retry,
                        ),
                    )
                    .await
                    {
                        Ok(Ok(label)) => label,
                        Ok(Err(e)) => {
                            warn!(
                                "{}",
                                HierarchyError::LabelSynthesisFailure {
                                    node_id: id,
                                    reason: e.to_string(),
                                }
                            );
                            fallback_label(id, &node.documents)
                        }
                        Err(_) => {
                            warn!(
                                "{}",
                                HierarchyError::LabelSynthesisFailure {
                                    node_id: id,
                                    reason: "timed out".to_string(),
                                }
                            );
                            fallback_label(id, &node.documents)
                        }
                    };
                    sibling_labels.push(title.clone());
                    labeled.push((id, title));
                }
                labeled
            }
        });
        let titles: BTreeMap<TopicId, String> = futures::future::join_all(group_futures)
            .await
            .into_iter()
            .flatten()
            .collect();

        // Invert parent links into child lists; ordering falls out of the
        // ascending iteration.
        let mut children: BTreeMap<TopicId, Vec<TopicId>> = BTreeMap::new();
        let mut roots = Vec::new();
        for (&id, node) in &pending {
            match node.parent {
                Some(p) => children.entry(p).or_default().push(id),
                None => roots.push(id),
            }
        }

        let nodes: BTreeMap<TopicId, TopicNode> = pending
            .into_iter()
            .map(|(id, node)| {
                let title = titles
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| fallback_label(id, &node.documents));
                (
                    id,
                    TopicNode {
                        id,
                        title,
                        parent_topic_id: node.parent,
                        depth: node.depth,
                        is_synthetic: node.is_synthetic,
                        document_count: node.document_count,
                        keywords: node.keywords,
                        child_topics: children.remove(&id).unwrap_or_default(),
                    },
                )
            })
            .collect();

        Ok(TopicTree {
            nodes,
            roots,
            max_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::LabelError;
    use crate::snapshot::{LeafTopic, MergeRecord, OUTLIER_TOPIC_ID};
    use async_trait::async_trait;
    use std::result::Result;
    use std::sync::Mutex;

    /// Labels every node "Topic <id>@d<depth>" and records each request.
    struct RecordingSynthesizer {
        requests: Mutex<Vec<LabelRequest>>,
    }

    impl RecordingSynthesizer {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LabelSynthesizer for RecordingSynthesizer {
        async fn synthesize(&self, request: &LabelRequest) -> Result<String, LabelError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(format!("Topic {}@d{}", request.node_id, request.depth))
        }
    }

    struct AlwaysFailing;

    #[async_trait]
    impl LabelSynthesizer for AlwaysFailing {
        async fn synthesize(&self, _request: &LabelRequest) -> Result<String, LabelError> {
            Err(LabelError::Permanent("service unavailable".to_string()))
        }
    }

    /// Fails exactly one node, labels everything else normally.
    struct FailOne {
        failing_id: TopicId,
    }

    #[async_trait]
    impl LabelSynthesizer for FailOne {
        async fn synthesize(&self, request: &LabelRequest) -> Result<String, LabelError> {
            if request.node_id == self.failing_id {
                Err(LabelError::Permanent("service unavailable".to_string()))
            } else {
                Ok(format!("Topic {}@d{}", request.node_id, request.depth))
            }
        }
    }

    fn leaf(count: usize, docs: &[&str], keywords: &[(&str, f64)]) -> LeafTopic {
        LeafTopic {
            document_count: count,
            sample_documents: docs.iter().map(|d| d.to_string()).collect(),
            keyword_weights: keywords
                .iter()
                .map(|(w, s)| (w.to_string(), *s))
                .collect(),
        }
    }

    /// Two merges over three final clusters:
    ///
    ///         101
    ///        /   \
    ///      100    2
    ///     /   \
    ///    0     1
    fn two_level_snapshot() -> ClusteringSnapshot {
        let mut snapshot = ClusteringSnapshot::default();
        snapshot.merge_records = vec![
            MergeRecord::new(100, 0, 1, 0.3),
            MergeRecord::new(101, 100, 2, 0.7),
        ];
        snapshot.final_clusters = [0, 1, 2].into_iter().collect();
        snapshot.leaf_topics = [
            (0, leaf(10, &["rust lifetimes", "borrow checker"], &[("rust", 0.9)])),
            (1, leaf(5, &["tokio tasks"], &[("async", 0.8)])),
            (2, leaf(20, &["pandas groupby"], &[("python", 0.7)])),
        ]
        .into_iter()
        .collect();
        snapshot
    }

    fn assembler<S: LabelSynthesizer>(synthesizer: S) -> TreeAssembler<S> {
        TreeAssembler::new(
            Arc::new(synthesizer),
            AssemblerConfig {
                retry: RetryPolicy::no_retry(),
                ..AssemblerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn assembles_two_level_tree_with_labels() {
        let tree = assembler(RecordingSynthesizer::new())
            .assemble(&two_level_snapshot())
            .await
            .unwrap();

        assert_eq!(tree.len(), 5);
        assert_eq!(tree.roots, vec![101]);
        assert_eq!(tree.max_depth, 2);

        let root = tree.get(101).unwrap();
        assert!(root.is_synthetic);
        assert_eq!(root.depth, 0);
        assert_eq!(root.child_topics, vec![2, 100]);
        assert_eq!(root.document_count, 35);
        assert_eq!(root.title, "Topic 101@d0");

        let mid = tree.get(100).unwrap();
        assert!(mid.is_synthetic);
        assert_eq!(mid.depth, 1);
        assert_eq!(mid.parent_topic_id, Some(101));
        assert_eq!(mid.child_topics, vec![0, 1]);
        assert_eq!(mid.document_count, 15);

        let deep_leaf = tree.get(0).unwrap();
        assert!(!deep_leaf.is_synthetic);
        assert_eq!(deep_leaf.depth, 2);
        assert_eq!(deep_leaf.parent_topic_id, Some(100));
        assert_eq!(deep_leaf.document_count, 10);
        assert_eq!(deep_leaf.keywords, vec!["rust".to_string()]);

        let shallow_leaf = tree.get(2).unwrap();
        assert_eq!(shallow_leaf.depth, 1);
        assert_eq!(shallow_leaf.parent_topic_id, Some(101));
    }

    #[tokio::test]
    async fn sibling_labels_accumulate_within_a_group() {
        let synthesizer = Arc::new(RecordingSynthesizer::new());
        let assembler = TreeAssembler::new(
            Arc::clone(&synthesizer),
            AssemblerConfig {
                retry: RetryPolicy::no_retry(),
                ..AssemblerConfig::default()
            },
        );
        assembler.assemble(&two_level_snapshot()).await.unwrap();

        let requests = synthesizer.requests.lock().unwrap();
        // Group under 100 is labeled in id order: 0 then 1.
        let for_1 = requests.iter().find(|r| r.node_id == 1).unwrap();
        assert_eq!(for_1.sibling_labels, vec!["Topic 0@d2".to_string()]);
        let for_0 = requests.iter().find(|r| r.node_id == 0).unwrap();
        assert!(for_0.sibling_labels.is_empty());
    }

    #[tokio::test]
    async fn label_failure_degrades_to_document_fallback() {
        let tree = assembler(AlwaysFailing)
            .assemble(&two_level_snapshot())
            .await
            .unwrap();

        let leaf = tree.get(0).unwrap();
        assert_eq!(leaf.title, "rust lifetimes | borrow checker");
        // Structure is unaffected by label failures.
        assert_eq!(tree.roots, vec![101]);
        assert_eq!(tree.len(), 5);
    }

    #[tokio::test]
    async fn single_node_failure_leaves_other_labels_intact() {
        let tree = assembler(FailOne { failing_id: 101 })
            .assemble(&two_level_snapshot())
            .await
            .unwrap();

        // Only the root degrades to its document fallback.
        assert_eq!(tree.get(101).unwrap().title, "rust lifetimes | tokio tasks");
        assert_eq!(tree.get(100).unwrap().title, "Topic 100@d1");
        assert_eq!(tree.get(0).unwrap().title, "Topic 0@d2");
        assert_eq!(tree.get(1).unwrap().title, "Topic 1@d2");
        assert_eq!(tree.get(2).unwrap().title, "Topic 2@d1");
    }

    #[tokio::test]
    async fn unresolved_leaf_is_skipped_without_aborting() {
        // Id 3 sits in the merge tree but is neither final nor mapped.
        let mut snapshot = two_level_snapshot();
        snapshot.merge_records.push(MergeRecord::new(102, 101, 3, 0.9));

        let tree = assembler(RecordingSynthesizer::new())
            .assemble(&snapshot)
            .await
            .unwrap();

        assert!(tree.get(3).is_none());
        assert!(tree.get(102).is_some());
        assert_eq!(tree.roots, vec![102]);
        // All three final clusters still surface as leaves.
        for id in [0, 1, 2] {
            assert!(tree.get(id).is_some(), "missing leaf {}", id);
        }
    }

    #[tokio::test]
    async fn mapped_original_ids_collapse_onto_final_clusters() {
        // Originals 0 and 1 were reduced into final cluster 7.
        let mut snapshot = ClusteringSnapshot::default();
        snapshot.merge_records = vec![
            MergeRecord::new(100, 0, 1, 0.2),
            MergeRecord::new(101, 100, 2, 0.6),
        ];
        snapshot.topic_mapping = [(0, 7), (1, 7)].into_iter().collect();
        snapshot.final_clusters = [7, 2].into_iter().collect();
        snapshot.leaf_topics = [
            (7, leaf(12, &["merged topic"], &[])),
            (2, leaf(4, &["survivor"], &[])),
        ]
        .into_iter()
        .collect();

        let tree = assembler(RecordingSynthesizer::new())
            .assemble(&snapshot)
            .await
            .unwrap();

        // One node for 7, none for the pre-reduction ids.
        assert!(tree.get(0).is_none());
        assert!(tree.get(1).is_none());
        let merged = tree.get(7).unwrap();
        assert_eq!(merged.depth, 2);
        assert_eq!(merged.parent_topic_id, Some(100));
        assert_eq!(tree.get(100).unwrap().document_count, 12);
    }

    #[tokio::test]
    async fn max_depth_ignores_unresolved_merge_positions() {
        // Leaves 1 and 2 have no final representation; the deepest real
        // node is leaf 3 at depth 1. Cluster 42 is final but sits outside
        // the merge tree entirely.
        let mut snapshot = ClusteringSnapshot::default();
        snapshot.merge_records = vec![
            MergeRecord::new(100, 1, 2, 0.2),
            MergeRecord::new(101, 100, 3, 0.5),
        ];
        snapshot.final_clusters = [3, 42].into_iter().collect();
        snapshot.leaf_topics = [
            (3, leaf(6, &["survivor"], &[])),
            (42, leaf(2, &["stray"], &[])),
        ]
        .into_iter()
        .collect();

        let synthesizer = Arc::new(RecordingSynthesizer::new());
        let assembler = TreeAssembler::new(
            Arc::clone(&synthesizer),
            AssemblerConfig {
                retry: RetryPolicy::no_retry(),
                ..AssemblerConfig::default()
            },
        );
        let tree = assembler.assemble(&snapshot).await.unwrap();

        let deepest = tree.nodes.values().map(|n| n.depth).max();
        assert_eq!(deepest, Some(1));
        assert_eq!(tree.max_depth, 1);
        assert_eq!(tree.get(42).unwrap().depth, 0);
        // Label prompts see the same bound the output reports.
        let requests = synthesizer.requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.max_depth == 1));
    }

    #[tokio::test]
    async fn empty_merge_input_falls_back_to_flat_tree() {
        let mut snapshot = two_level_snapshot();
        snapshot.merge_records.clear();
        snapshot
            .leaf_topics
            .insert(0, leaf(10, &["rust lifetimes"], &[("borrow-checker", 0.9), ("rust", 0.4)]));

        let tree = assembler(RecordingSynthesizer::new())
            .assemble(&snapshot)
            .await
            .unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.roots, vec![0, 1, 2]);
        assert_eq!(tree.max_depth, 0);
        for node in tree.nodes.values() {
            assert_eq!(node.depth, 0);
            assert!(node.parent_topic_id.is_none());
            assert!(!node.is_synthetic);
        }
        // Degraded leaves keep their specific compound keywords.
        assert_eq!(
            tree.get(0).unwrap().keywords,
            vec!["borrow-checker".to_string(), "rust".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_final_cluster_set_is_fatal() {
        let mut snapshot = two_level_snapshot();
        snapshot.final_clusters = [OUTLIER_TOPIC_ID].into_iter().collect();

        let err = assembler(RecordingSynthesizer::new())
            .assemble(&snapshot)
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::MissingFinalClusters));
    }

    #[tokio::test]
    async fn repeated_assembly_is_byte_identical() {
        let assembler = assembler(RecordingSynthesizer::new());
        let snapshot = two_level_snapshot();

        let first = assembler.assemble(&snapshot).await.unwrap();
        let second = assembler.assemble(&snapshot).await.unwrap();

        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn hierarchy_json_orders_children_by_weight() {
        let tree = assembler(RecordingSynthesizer::new())
            .assemble(&two_level_snapshot())
            .await
            .unwrap();

        let json = tree.to_hierarchy_json();
        let roots = json.as_array().unwrap();
        assert_eq!(roots.len(), 1);
        let root = &roots[0];
        assert_eq!(root["topic_id"], 101);
        let children = root["children"].as_array().unwrap();
        // Leaf 2 (20 docs) outweighs synthetic 100 (15 docs).
        assert_eq!(children[0]["topic_id"], 2);
        assert_eq!(children[1]["topic_id"], 100);
        assert_eq!(children[1]["children"].as_array().unwrap().len(), 2);
    }
}
