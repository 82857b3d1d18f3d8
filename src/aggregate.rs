//! Content aggregation for synthetic nodes.
//!
//! A synthetic node holds no documents of its own; everything it shows is
//! gathered from descendant leaves. The sampling policy is depth-aware:
//! near the root the sample biases toward breadth (a little from many
//! leaves, so the label reflects the whole subtree), near the bottom it
//! biases toward specificity (a lot from few leaves). Keyword mass is
//! summed per word across contributing leaves, which makes aggregation
//! commutative in leaf visitation order.

use std::collections::{BTreeMap, HashSet};

use log::warn;

use crate::depth::DepthMemo;
use crate::error::HierarchyError;
use crate::mapping::TopicMapper;
use crate::merge_tree::MergeTree;
use crate::snapshot::{ClusteringSnapshot, LeafTopic, TopicId};

/// Sampling policy constants.
pub mod constants {
    /// Total document cap when sampling for breadth (shallow nodes).
    pub const BREADTH_DOCUMENT_CAP: usize = 15;

    /// Documents taken per direct child when sampling for specificity
    /// (nodes at `max_depth - 1` and below).
    pub const DEPTH_DOCS_PER_CHILD: usize = 8;

    /// Final keyword list length after merging and truncation.
    pub const TOP_KEYWORDS: usize = 15;

    /// Hard cap on traversal recursion; the merge tree is externally
    /// supplied and a runaway chain must not blow the stack.
    pub const MAX_TRAVERSAL_DEPTH: usize = 64;

    /// Score multiplier for compound/long words at maximum depth.
    pub const SPECIFICITY_BOOST: f64 = 1.5;

    /// Words longer than this count as "long" for the specificity boost.
    pub const LONG_WORD_LEN: usize = 12;
}

/// Documents and keyword mass gathered from a node's descendant leaves.
#[derive(Debug, Clone, Default)]
pub struct AggregatedContent {
    /// Deduplicated sample documents, in traversal order.
    pub documents: Vec<String>,
    /// Keyword -> summed score, sorted by score descending (word ascending
    /// on ties), truncated to [`constants::TOP_KEYWORDS`].
    pub keywords: Vec<(String, f64)>,
}

/// Gathers representative content for any node in the merge tree.
pub struct ContentAggregator<'a> {
    tree: &'a MergeTree,
    snapshot: &'a ClusteringSnapshot,
    mapper: TopicMapper<'a>,
    memo: &'a DepthMemo,
    max_depth: u32,
}

impl<'a> ContentAggregator<'a> {
    pub fn new(
        tree: &'a MergeTree,
        snapshot: &'a ClusteringSnapshot,
        mapper: TopicMapper<'a>,
        memo: &'a DepthMemo,
        max_depth: u32,
    ) -> Self {
        Self {
            tree,
            snapshot,
            mapper,
            memo,
            max_depth,
        }
    }

    /// Aggregate documents and keywords for one node.
    pub fn aggregate(&self, node_id: TopicId) -> AggregatedContent {
        let depth = self.memo.get(node_id).unwrap_or(0);

        let documents = if self.max_depth > 0 && depth + 1 >= self.max_depth {
            self.gather_documents_deep(node_id)
        } else {
            self.gather_documents_broad(node_id, depth)
        };

        let leaves = self.collect_descendant_leaves(node_id);
        let leaf_stats: Vec<&LeafTopic> = leaves
            .iter()
            .filter_map(|id| self.snapshot.leaf(*id))
            .collect();
        let keywords = merge_keywords(leaf_stats, depth, self.max_depth);

        AggregatedContent {
            documents,
            keywords,
        }
    }

    /// Specificity sampling: direct children only, up to
    /// [`constants::DEPTH_DOCS_PER_CHILD`] documents per resolvable child.
    fn gather_documents_deep(&self, node_id: TopicId) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut documents = Vec::new();

        for &child in self.tree.children_of(node_id) {
            let Some(leaf) = self.resolve_leaf(child) else {
                continue;
            };
            for doc in leaf
                .sample_documents
                .iter()
                .take(constants::DEPTH_DOCS_PER_CHILD)
            {
                if seen.insert(doc.as_str()) {
                    documents.push(doc.clone());
                }
            }
        }

        documents
    }

    /// Breadth sampling: a per-leaf quota interpolated from the node's
    /// depth, a total cap, and a per-branch budget that halves at each
    /// additional hop of indirection.
    fn gather_documents_broad(&self, node_id: TopicId, depth: u32) -> Vec<String> {
        let per_leaf = per_leaf_quota(depth, self.max_depth);
        let mut seen: HashSet<String> = HashSet::new();
        let mut documents = Vec::new();
        let mut visited = HashSet::new();

        self.gather_branch(
            node_id,
            constants::BREADTH_DOCUMENT_CAP,
            per_leaf,
            0,
            &mut visited,
            &mut seen,
            &mut documents,
        );

        documents
    }

    fn gather_branch(
        &self,
        node_id: TopicId,
        branch_budget: usize,
        per_leaf: usize,
        hops: usize,
        visited: &mut HashSet<TopicId>,
        seen: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        if branch_budget == 0
            || hops > constants::MAX_TRAVERSAL_DEPTH
            || out.len() >= constants::BREADTH_DOCUMENT_CAP
            || !visited.insert(node_id)
        {
            return;
        }

        if !self.tree.has_children(node_id) {
            if let Some(leaf) = self.resolve_leaf(node_id) {
                let quota = per_leaf.min(branch_budget);
                for doc in leaf.sample_documents.iter().take(quota) {
                    if out.len() >= constants::BREADTH_DOCUMENT_CAP {
                        return;
                    }
                    if seen.insert(doc.clone()) {
                        out.push(doc.clone());
                    }
                }
            }
            return;
        }

        // Each hop of indirection halves what a branch may contribute.
        let child_budget = (branch_budget / 2).max(1);
        for &child in self.tree.children_of(node_id) {
            self.gather_branch(child, child_budget, per_leaf, hops + 1, visited, seen, out);
        }
    }

    /// Every final cluster id reachable from this node, deduplicated and
    /// in traversal order. Cycle-guarded and depth-capped.
    pub fn collect_descendant_leaves(&self, node_id: TopicId) -> Vec<TopicId> {
        let mut visited = HashSet::new();
        let mut found = HashSet::new();
        let mut leaves = Vec::new();
        self.walk_leaves(node_id, 0, &mut visited, &mut found, &mut leaves);
        leaves
    }

    fn walk_leaves(
        &self,
        node_id: TopicId,
        hops: usize,
        visited: &mut HashSet<TopicId>,
        found: &mut HashSet<TopicId>,
        leaves: &mut Vec<TopicId>,
    ) {
        if hops > constants::MAX_TRAVERSAL_DEPTH || !visited.insert(node_id) {
            return;
        }
        if !self.tree.has_children(node_id) {
            match self.mapper.resolve(node_id) {
                Some(final_id) => {
                    if found.insert(final_id) {
                        leaves.push(final_id);
                    }
                }
                None => warn!(
                    "{}",
                    HierarchyError::UnresolvedLeaf {
                        original_id: node_id
                    }
                ),
            }
            return;
        }
        for &child in self.tree.children_of(node_id) {
            self.walk_leaves(child, hops + 1, visited, found, leaves);
        }
    }

    /// Resolve a childless id to its leaf stats. Unresolved leaves are
    /// logged and skipped, never fatal.
    fn resolve_leaf(&self, node_id: TopicId) -> Option<&LeafTopic> {
        match self.mapper.resolve(node_id) {
            Some(final_id) => self.snapshot.leaf(final_id),
            None => {
                warn!(
                    "{}",
                    HierarchyError::UnresolvedLeaf {
                        original_id: node_id
                    }
                );
                None
            }
        }
    }
}

/// Per-leaf document quota, interpolated linearly from 1 at the root to
/// [`constants::DEPTH_DOCS_PER_CHILD`] just above the deepest level.
fn per_leaf_quota(depth: u32, max_depth: u32) -> usize {
    if max_depth <= 1 {
        return 1;
    }
    let span = (constants::DEPTH_DOCS_PER_CHILD - 1) as u32;
    let quota = 1 + (span * depth) / (max_depth - 1);
    quota as usize
}

/// Merge keyword/score pairs from contributing leaves by summing scores
/// per word, with the depth-dependent adjustments:
///
/// - depth 0 discards hyphen/underscore compounds so root labels stay
///   general (skipped in a flat tree, where depth 0 is also the deepest
///   level and no broader node exists);
/// - maximum depth boosts compound and long words to favor specificity.
///
/// Summation into an ordered map plus a (score desc, word asc) sort makes
/// the result independent of leaf visitation order.
pub fn merge_keywords<'a, I>(leaves: I, depth: u32, max_depth: u32) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = &'a LeafTopic>,
{
    let mut mass: BTreeMap<&str, f64> = BTreeMap::new();

    for leaf in leaves {
        for (word, score) in &leaf.keyword_weights {
            if depth == 0 && max_depth > 0 && is_compound(word) {
                continue;
            }
            *mass.entry(word.as_str()).or_insert(0.0) += score;
        }
    }

    let mut merged: Vec<(String, f64)> = mass
        .into_iter()
        .map(|(word, mut score)| {
            if depth == max_depth && (is_compound(word) || word.len() > constants::LONG_WORD_LEN) {
                score *= constants::SPECIFICITY_BOOST;
            }
            (word.to_string(), score)
        })
        .collect();

    merged.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    merged.truncate(constants::TOP_KEYWORDS);
    merged
}

/// Overly specific word filter: hyphen/underscore-joined compounds.
fn is_compound(word: &str) -> bool {
    word.contains('-') || word.contains('_')
}
