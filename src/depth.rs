//! Depth computation over the merge tree.
//!
//! Depth is the number of parent hops from a root: `depth(root) = 0` and
//! `depth(child) = depth(parent) + 1`. Computation is a memoized ascent
//! with an explicit per-run memo arena; there is no process-wide cache.
//!
//! The merge tree is externally supplied and not verified upstream, so the
//! ascent defends against cycles even though the acyclic invariant should
//! hold: each call chain tracks the ids it is visiting and reports
//! `CycleDetected` on a revisit. The affected chain falls back to depth 0
//! rather than poisoning the run.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::error::{HierarchyError, Result};
use crate::merge_tree::MergeTree;
use crate::snapshot::TopicId;

/// Per-run memo arena for computed depths, owned by the calculator and
/// passed by reference into recursive helpers.
#[derive(Debug, Default)]
pub struct DepthMemo {
    depths: HashMap<TopicId, u32>,
}

impl DepthMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TopicId) -> Option<u32> {
        self.depths.get(&id).copied()
    }

    fn set(&mut self, id: TopicId, depth: u32) {
        self.depths.insert(id, depth);
    }
}

/// Computes node depths against one merge tree.
#[derive(Debug, Clone, Copy)]
pub struct DepthCalculator<'a> {
    tree: &'a MergeTree,
}

impl<'a> DepthCalculator<'a> {
    pub fn new(tree: &'a MergeTree) -> Self {
        Self { tree }
    }

    /// Depth of one id, memoizing every id finalized along the ascent.
    ///
    /// Orphan ids (mentioned nowhere in the tree) get depth 0 as an
    /// explicit fallback, not an error.
    pub fn depth_of(&self, id: TopicId, memo: &mut DepthMemo) -> Result<u32> {
        if let Some(depth) = memo.get(id) {
            return Ok(depth);
        }

        // Iterative ascent: collect the unmemoized chain up to a root or a
        // memoized ancestor, then unwind assigning depths.
        let mut chain: Vec<TopicId> = Vec::new();
        let mut visiting: HashSet<TopicId> = HashSet::new();
        let mut current = id;

        let base_depth = loop {
            if let Some(depth) = memo.get(current) {
                break depth;
            }
            if !visiting.insert(current) {
                // Defuse the whole affected chain at depth 0 so descendants
                // ascending into it later still terminate.
                for &node in &chain {
                    memo.set(node, 0);
                }
                return Err(HierarchyError::CycleDetected { node_id: current });
            }
            chain.push(current);
            match self.tree.parent_of(current) {
                Some(parent) => current = parent,
                None => {
                    // Root, or an orphan absent from both lookup maps.
                    let root = chain.pop().expect("chain has the root");
                    memo.set(root, 0);
                    break 0;
                }
            }
        };

        // chain runs child-most first; unwind from the ancestor down.
        let mut depth = base_depth;
        for &node in chain.iter().rev() {
            depth += 1;
            memo.set(node, depth);
        }

        memo.get(id)
            .ok_or(HierarchyError::CycleDetected { node_id: id })
    }

    /// Compute depths for every id in the tree. A detected cycle aborts
    /// only the affected chain: its ids fall back to depth 0 with a
    /// warning, and computation continues elsewhere.
    pub fn compute_all(&self, memo: &mut DepthMemo) -> Vec<HierarchyError> {
        let mut defects = Vec::new();

        for id in self.tree.all_ids() {
            if let Err(e) = self.depth_of(id, memo) {
                warn!("{}; assigning depth 0 to node {}", e, id);
                memo.set(id, 0);
                defects.push(e);
            }
        }

        defects
    }
}

/// Maximum depth over the given ids, per the memo. Ids the memo never saw
/// (orphans outside the tree) count as depth 0.
pub fn max_depth_over<I: IntoIterator<Item = TopicId>>(ids: I, memo: &DepthMemo) -> u32 {
    ids.into_iter()
        .map(|id| memo.get(id).unwrap_or(0))
        .max()
        .unwrap_or(0)
}
