//! Threshold aggregation over a measurement tree
//!
//! [`AggregationEngine`] walks the tree for one threshold `k`;
//! [`AggregationState`] is the mergeable result.

pub mod engine;
pub mod state;

pub use engine::{AggregationEngine, AggregationError};
pub use state::AggregationState;
