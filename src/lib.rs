//! Nested STAR threshold-aggregation simulator.
//!
//! Measurements are ordered attribute sequences inserted into a counting
//! prefix tree. For a threshold `k` the aggregation engine determines which
//! measurements an aggregator fully recovers, which it recovers only down to
//! some prefix, and which are lost.

pub mod aggregation;
pub mod config;
pub mod ingest;
pub mod observability;
pub mod report;
pub mod simulator;
pub mod tree;
pub mod workload;

pub use aggregation::{AggregationEngine, AggregationError, AggregationState};
pub use config::{ConfigError, SimConfig};
pub use ingest::{IngestError, IngestPipeline, Record, RecordFormat, RecordParser};
pub use report::{OutputFormat, ThresholdReport};
pub use simulator::NestedStar;
pub use tree::{MeasurementTree, TreeError};
pub use workload::{WorkloadConfig, WorkloadGenerator};
