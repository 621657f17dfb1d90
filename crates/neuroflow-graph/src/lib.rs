//! Knowledge graph for neuroflow.
//!
//! The [`HeatModel`] owns the live weighted graph shared by every session:
//! intents boost their mapped node, observers receive single-node heat
//! deltas, and topology snapshots can be capped or focused on the nodes a
//! piece of context mentions. The [`KnowledgeHarvester`] grows the graph in
//! the background from finished exchanges.
//!
//! # Main types
//!
//! - [`HeatModel`]: In-memory weighted graph with atomic boosts.
//! - [`HeatConfig`]: Seed nodes, boost step, clamp and intent mapping.
//! - [`KnowledgeHarvester`]: Applies extracted candidates under the graph invariants.
//! - [`CandidateExtractor`]: Capability that proposes nodes and edges from an exchange.

/// Candidate extraction and harvesting.
pub mod harvest;
/// Heat model and topology snapshots.
pub mod heat;

pub use harvest::{
    CandidateEdge, CandidateExtractor, CandidateNode, Candidates, HarvestReport,
    KnowledgeHarvester,
};
pub use heat::{HeatConfig, HeatModel};
