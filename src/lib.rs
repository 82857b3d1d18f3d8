//! Hierarchical topic tree synthesis.
//!
//! Turns the raw artifacts of a clustering run (binary merge records, a
//! topic id reduction mapping, per-cluster content statistics) into a
//! navigable, labeled topic tree. Structure comes from the merge records;
//! titles come from a pluggable [`label::LabelSynthesizer`], with a
//! deterministic document-derived fallback when the service fails.
//!
//! ```no_run
//! use std::sync::Arc;
//! use canopy::{
//!     AnthropicLabeler, AnthropicLabelerConfig, AssemblerConfig, ClusteringSnapshot,
//!     TreeAssembler,
//! };
//!
//! # async fn run(snapshot: ClusteringSnapshot) -> canopy::Result<()> {
//! let labeler = AnthropicLabeler::new(AnthropicLabelerConfig::new("api-key"));
//! let assembler = TreeAssembler::new(Arc::new(labeler), AssemblerConfig::default());
//! let tree = assembler.assemble(&snapshot).await?;
//! println!("{}", tree.to_hierarchy_json());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod ai_labeler;
pub mod assemble;
pub mod classify;
pub mod depth;
pub mod error;
pub mod label;
pub mod mapping;
pub mod merge_tree;
pub mod snapshot;

pub use ai_labeler::{AnthropicLabeler, AnthropicLabelerConfig};
pub use assemble::{AssemblerConfig, AssemblyStage, TopicNode, TopicTree, TreeAssembler};
pub use error::{HierarchyError, Result};
pub use label::{LabelError, LabelRequest, LabelSynthesizer, RetryPolicy};
pub use merge_tree::MergeTree;
pub use snapshot::{ClusteringSnapshot, LeafTopic, MergeRecord, TopicId, OUTLIER_TOPIC_ID};
