//! Nested STAR Simulator
//!
//! Simulates the nesting behaviour of Nested STAR over multi-attribute
//! measurements. Nothing here is cryptographic: the tree stands in for the
//! nested secret-sharing layers and the threshold check for share recovery,
//! which is enough to measure how much information each `k` gives up.

use crate::aggregation::{AggregationEngine, AggregationError};
use crate::ingest::{IngestError, PipelineStats, Record};
use crate::observability::DiagnosticSink;
use crate::report::ThresholdReport;
use crate::tree::MeasurementTree;
use tracing::info;

/// Measurement tree plus the fixed arity of its measurements
#[derive(Debug)]
pub struct NestedStar {
    tree: MeasurementTree,
    num_attrs: usize,
    workers: usize,
}

impl NestedStar {
    /// `num_attrs` is the number of attributes every measurement carries.
    pub fn new(num_attrs: usize) -> Self {
        NestedStar {
            tree: MeasurementTree::new(),
            num_attrs,
            workers: 1,
        }
    }

    /// Aggregate on a pool of `workers` threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn num_attrs(&self) -> usize {
        self.num_attrs
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn num_measurements(&self) -> u64 {
        self.tree.total_count()
    }

    pub fn tree(&self) -> &MeasurementTree {
        &self.tree
    }

    pub fn num_tags(&self) -> usize {
        self.tree.tag_count()
    }

    pub fn num_leaf_tags(&self) -> usize {
        self.tree.leaf_tag_count()
    }

    pub fn num_nodes(&self) -> usize {
        self.tree.node_count()
    }

    /// Insert one measurement; its length must equal `num_attrs`.
    pub fn add_measurement<S: AsRef<str>>(&mut self, msmt: &[S]) -> Result<(), IngestError> {
        if msmt.len() != self.num_attrs {
            return Err(IngestError::Arity {
                expected: self.num_attrs,
                got: msmt.len(),
            });
        }
        self.tree.insert(msmt)?;
        Ok(())
    }

    /// Insert the prepared form of every record. Rejected records are
    /// reported to `sink` with their 1-based position in the batch and
    /// skipped; the rest of the batch is still inserted.
    pub fn add_records<'a, R, I>(&mut self, records: I, sink: &dyn DiagnosticSink) -> PipelineStats
    where
        R: Record + ?Sized + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut stats = PipelineStats::default();
        for (idx, record) in records.into_iter().enumerate() {
            match self.add_measurement(&record.prepare()) {
                Ok(()) => stats.inserted += 1,
                Err(e) => {
                    stats.rejected += 1;
                    sink.record_skipped(idx as u64 + 1, &e.to_string());
                }
            }
        }
        stats
    }

    /// Aggregate all measurements under threshold `k`
    pub fn aggregate(&self, k: u64) -> Result<ThresholdReport, AggregationError> {
        let engine = AggregationEngine::new(self.num_attrs, k)?;
        let state = if self.workers > 1 {
            engine.run_parallel(&self.tree, self.workers)?
        } else {
            engine.run(&self.tree)?
        };

        let report = ThresholdReport::new(k, self.num_attrs, &self.tree, &state);
        info!(k, "{}", report.summary());
        Ok(report)
    }

    /// Aggregate once per threshold, in order, over the same tree
    pub fn sweep(&self, thresholds: &[u64]) -> Result<Vec<ThresholdReport>, AggregationError> {
        thresholds
            .iter()
            .map(|&k| {
                info!("Aggregating for k={}.", k);
                self.aggregate(k)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::AttributeRecord;
    use crate::observability::RecordingSink;

    #[test]
    fn test_arity_enforced() {
        let mut star = NestedStar::new(3);
        assert!(star.add_measurement(&["US", "release", "windows"]).is_ok());
        assert!(matches!(
            star.add_measurement(&["US", "release"]),
            Err(IngestError::Arity { expected: 3, got: 2 })
        ));
        assert_eq!(star.num_measurements(), 1);
    }

    #[test]
    fn test_add_records() {
        let records = vec![
            AttributeRecord::parse(&["US", "release"], 2).unwrap(),
            AttributeRecord::parse(&["US", "beta"], 2).unwrap(),
        ];
        let mut star = NestedStar::new(2);
        let sink = RecordingSink::new();
        let stats = star.add_records(&records, &sink);
        assert_eq!(stats, PipelineStats { inserted: 2, rejected: 0 });
        assert_eq!(star.num_measurements(), 2);
        assert_eq!(star.num_tags(), 3);
    }

    #[test]
    fn test_add_records_skips_bad_record_mid_batch() {
        let records: Vec<Vec<String>> = vec![
            vec!["US".to_string(), "release".to_string()],
            vec!["US".to_string()],
            vec!["CA".to_string(), "beta".to_string()],
        ];
        let mut star = NestedStar::new(2);
        let sink = RecordingSink::new();

        let stats = star.add_records(&records, &sink);
        assert_eq!(stats, PipelineStats { inserted: 2, rejected: 1 });
        assert_eq!(star.num_measurements(), 2);
        assert_eq!(star.tree().root().get("CA").unwrap().count(), 1);

        let skipped = sink.skipped();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].line, 2);
        assert_eq!(skipped[0].reason, "expected 2 but got 1 attributes");
    }

    #[test]
    fn test_aggregate_report() {
        let mut star = NestedStar::new(2);
        for _ in 0..3 {
            star.add_measurement(&["US", "release"]).unwrap();
        }
        star.add_measurement(&["US", "beta"]).unwrap();
        star.add_measurement(&["CA", "release"]).unwrap();

        let report = star.aggregate(2).unwrap();
        assert_eq!(report.total, 5);
        assert_eq!(report.full, 3);
        assert_eq!(report.partial, 1);
        assert_eq!(report.lost, 1);
        assert_eq!(report.len_partial(1), 1);
        assert_eq!(report.len_partial(2), 3);
    }

    #[test]
    fn test_sweep_rejects_zero_threshold() {
        let mut star = NestedStar::new(1);
        star.add_measurement(&["US"]).unwrap();
        assert_eq!(
            star.sweep(&[1, 0]).unwrap_err(),
            AggregationError::InvalidThreshold
        );
    }

    #[test]
    fn test_workers_match_single_thread() {
        let mut star = NestedStar::new(2);
        for (country, n) in [("US", 7), ("CA", 4), ("MX", 2), ("DE", 9)] {
            for i in 0..n {
                let channel = if i % 3 == 0 { "beta" } else { "release" };
                star.add_measurement(&[country, channel]).unwrap();
            }
        }

        let single = star.sweep(&[1, 2, 3, 5]).unwrap();
        let star = star.with_workers(4);
        assert_eq!(star.sweep(&[1, 2, 3, 5]).unwrap(), single);
    }
}
