//! Threshold Aggregation Engine
//!
//! Walks a [`MeasurementTree`] under a k-anonymity threshold and classifies
//! every measurement as full, partial (resolved to some depth) or lost.
//!
//! For each value entry at depth `d`:
//! - `count < k`: skipped, its measurements are lost at this depth
//! - `d == max_depth`: `count` measurements fully resolve
//! - otherwise the child subtree is aggregated first, and whatever the
//!   subtree did not resolve further is attributed to depth `d`
//!
//! Sibling subtrees are independent. [`run_parallel`](AggregationEngine::run_parallel)
//! hands the entries of every interior node to a rayon pool and folds the
//! per-entry states back with [`AggregationState::augment`], so a single
//! dominant root value still spreads its subtree over all workers.
//!
//! When several measurements are incomplete, the error names the
//! lexicographically smallest path, whatever order the map yields entries in.

use super::state::AggregationState;
use crate::tree::{MeasurementTree, Node, ValueEntry};
use rayon::prelude::*;
use tracing::{debug, error};

const ROOT_DEPTH: usize = 1;

/// Error returned when an aggregation run cannot produce trustworthy numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Threshold must be at least 1
    InvalidThreshold,
    /// Maximum depth must be at least 1
    InvalidDepth,
    /// A value entry cleared the threshold before the last attribute but has
    /// no child node
    IncompleteMeasurement { path: Vec<String>, depth: usize },
    /// The partial-length distribution does not sum to the partial count
    PartialMismatch { partial: u64, summed: u64 },
    /// The worker pool could not be started
    ThreadPool(String),
}

impl AggregationError {
    /// Offending path, for errors raised while walking the tree
    pub fn path(&self) -> Option<&[String]> {
        match self {
            AggregationError::IncompleteMeasurement { path, .. } => Some(path.as_slice()),
            _ => None,
        }
    }

    /// Of two walk errors, the one with the smaller path
    fn earliest(self, other: AggregationError) -> AggregationError {
        if other.path() < self.path() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::InvalidThreshold => write!(f, "Threshold k must be at least 1"),
            AggregationError::InvalidDepth => {
                write!(f, "Number of attributes must be at least 1")
            }
            AggregationError::IncompleteMeasurement { path, depth } => write!(
                f,
                "Encountered incomplete measurement at depth {}: {:?}",
                depth, path
            ),
            AggregationError::PartialMismatch { partial, summed } => write!(
                f,
                "Number of partial measurements don't add up: {} partial, {} by length",
                partial, summed
            ),
            AggregationError::ThreadPool(msg) => {
                write!(f, "Failed to start aggregation workers: {}", msg)
            }
        }
    }
}

impl std::error::Error for AggregationError {}

/// Fold two per-entry results; errors win, and among errors the smaller path
fn merge(
    acc: Result<AggregationState, AggregationError>,
    next: Result<AggregationState, AggregationError>,
) -> Result<AggregationState, AggregationError> {
    match (acc, next) {
        (Ok(mut state), Ok(other)) => {
            state.augment(&other);
            Ok(state)
        }
        (Err(a), Err(b)) => Err(a.earliest(b)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}

/// Aggregation parameters for one threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationEngine {
    max_depth: usize,
    k: u64,
}

impl AggregationEngine {
    /// `max_depth` is the fixed number of attributes per measurement.
    pub fn new(max_depth: usize, k: u64) -> Result<Self, AggregationError> {
        if k == 0 {
            return Err(AggregationError::InvalidThreshold);
        }
        if max_depth == 0 {
            return Err(AggregationError::InvalidDepth);
        }
        Ok(AggregationEngine { max_depth, k })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn k(&self) -> u64 {
        self.k
    }

    /// Aggregate the whole tree on the calling thread
    pub fn run(&self, tree: &MeasurementTree) -> Result<AggregationState, AggregationError> {
        let mut path = Vec::with_capacity(self.max_depth);
        let state = self.aggregate(tree.root(), &mut path, false)?;
        self.verify(state)
    }

    /// Aggregate the tree on a rayon pool of `workers` threads. Produces the
    /// same state, and the same error, as [`run`](Self::run).
    pub fn run_parallel(
        &self,
        tree: &MeasurementTree,
        workers: usize,
    ) -> Result<AggregationState, AggregationError> {
        if workers <= 1 {
            return self.run(tree);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("nstar-agg-{}", i))
            .build()
            .map_err(|e| AggregationError::ThreadPool(e.to_string()))?;

        let state = pool.install(|| {
            let mut path = Vec::with_capacity(self.max_depth);
            self.aggregate(tree.root(), &mut path, true)
        })?;
        self.verify(state)
    }

    fn aggregate<'a>(
        &self,
        node: &'a Node,
        path: &mut Vec<&'a str>,
        parallel: bool,
    ) -> Result<AggregationState, AggregationError> {
        // Entries of the last level only add their counts; not worth a task.
        if parallel && node.len() > 1 && path.len() + 1 < self.max_depth {
            let entries: Vec<(&'a str, &'a ValueEntry)> = node.entries().collect();
            let prefix: &[&'a str] = path;
            return entries
                .par_iter()
                .map(|&(value, entry)| -> Result<AggregationState, AggregationError> {
                    let mut path = prefix.to_vec();
                    let mut state = AggregationState::new();
                    self.visit(value, entry, &mut path, &mut state, parallel)?;
                    Ok(state)
                })
                .reduce(|| Ok(AggregationState::new()), merge);
        }

        let mut state = AggregationState::new();
        let mut failure: Option<AggregationError> = None;
        for (value, entry) in node.entries() {
            if let Err(e) = self.visit(value, entry, path, &mut state, parallel) {
                failure = Some(match failure {
                    Some(prev) => prev.earliest(e),
                    None => e,
                });
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(state),
        }
    }

    fn visit<'a>(
        &self,
        value: &'a str,
        entry: &'a ValueEntry,
        path: &mut Vec<&'a str>,
        state: &mut AggregationState,
        parallel: bool,
    ) -> Result<(), AggregationError> {
        let depth = path.len() + 1;
        let count = entry.count();

        // Not enough measurements share this value to reveal it.
        if count < self.k {
            return Ok(());
        }

        // Last attribute: the whole chain is unlocked.
        if depth == self.max_depth {
            state.add_full(count);
            state.add_len_partial(depth, count);
            return Ok(());
        }

        let Some(child) = entry.child() else {
            return Err(AggregationError::IncompleteMeasurement {
                path: owned_path(path, value),
                depth,
            });
        };

        path.push(value);
        let sub_state = self.aggregate(child, path, parallel);
        path.pop();
        let sub_state = sub_state?;
        state.augment(&sub_state);

        // Child counts partition a subset of this entry's measurements.
        let resolved_below = sub_state.full_count() + sub_state.already_counted();
        debug_assert!(resolved_below <= count, "subtree resolved more than {}", count);
        let newly_unlocked = count - resolved_below;
        state.add_len_partial(depth, newly_unlocked);
        state.add_already_counted(newly_unlocked);

        // Partial only means something relative to the whole measurement.
        if depth == ROOT_DEPTH {
            state.add_partial(count - sub_state.full_count());
        }
        Ok(())
    }

    fn verify(&self, state: AggregationState) -> Result<AggregationState, AggregationError> {
        if !state.adds_up(self.max_depth) {
            let summed = state.partial_sum(self.max_depth);
            error!(
                k = self.k,
                partial = state.partial_count(),
                summed,
                "Number of partial measurements don't add up"
            );
            return Err(AggregationError::PartialMismatch {
                partial: state.partial_count(),
                summed,
            });
        }

        debug!(
            k = self.k,
            full = state.full_count(),
            partial = state.partial_count(),
            "Aggregation complete"
        );
        Ok(state)
    }
}

fn owned_path(path: &[&str], value: &str) -> Vec<String> {
    path.iter()
        .copied()
        .chain(std::iter::once(value))
        .map(str::to_owned)
        .collect()
}
