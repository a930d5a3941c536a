//! Time-dependent multimodal route planning engine.
//!
//! Answers: "what are the best ways to get from here to there, leaving at
//! this time?" over walking, cycling, rideshare and scheduled transit,
//! taking live delays and cancellations into account.

pub mod cache;
pub mod domain;
pub mod graph;
pub mod planner;
pub mod realtime;
