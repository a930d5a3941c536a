//! Route planning.
//!
//! This module answers "how do I get from here to there, leaving at this
//! time?" over a graph snapshot and the current realtime overlays.
//!
//! A query runs a multi-criteria label-setting search, re-runs it with
//! penalized edges to collect diverse alternatives, then prices each route,
//! scores its reliability and orders the results.

mod alternatives;
mod config;
mod engine;
mod evaluator;
mod fares;
mod path;
mod rank;
mod router;

pub use alternatives::{AlternativeGenerator, AlternativesOutcome, Candidate, overlap};
pub use config::{AlternativeConfig, EngineConfig, Epsilon, RerankConfig, TransferPenalties};
pub use engine::{Engine, PlanError, PlanOutcome, PlanRequest};
pub use evaluator::{EdgeEvaluator, Evaluation, Traversal};
pub use fares::{FareCalculator, FareQuote, FareSummary, PassOption, SnapshotFares, aggregate};
pub use path::assemble;
pub use rank::{
    NoReliability, RankedRoute, ReliabilitySource, RouteWarning, StaticReliability,
    route_reliability, rerank,
};
pub use router::{
    CancelFlag, EdgePenalties, FoundPath, Router, SearchBudget, SearchOutcome, SearchQuery,
    SearchStats, Step,
};
