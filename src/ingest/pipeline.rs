//! Ingestion Pipeline
//!
//! Single-writer ingestion: the [`NestedStar`] is moved into one writer
//! thread that drains a bounded channel. Any number of producers hold a
//! [`MeasurementSender`]; the tree itself is never shared.
//!
//! ```text
//! ┌──────────┐
//! │ reader 1 │──┐
//! └──────────┘  │   bounded    ┌──────────────┐
//! ┌──────────┐  ├──channel───▶│ writer thread │ (owns NestedStar)
//! │ reader 2 │──┘              └──────────────┘
//! └──────────┘
//! ```

use super::IngestError;
use crate::observability::SharedSink;
use crate::simulator::NestedStar;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::debug;

/// Outcome counters of the writer thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Measurements inserted into the tree
    pub inserted: u64,
    /// Measurements the simulator refused (wrong arity, empty)
    pub rejected: u64,
}

/// Producer handle; clone one per producer
#[derive(Clone)]
pub struct MeasurementSender {
    sender: Sender<Vec<String>>,
}

impl MeasurementSender {
    /// Queue a measurement, blocking while the channel is full
    pub fn send(&self, msmt: Vec<String>) -> Result<(), IngestError> {
        self.sender
            .send(msmt)
            .map_err(|_| IngestError::WriterClosed)
    }
}

/// Bounded queue in front of the single tree writer
pub struct IngestPipeline {
    sender: Sender<Vec<String>>,
    writer: JoinHandle<(NestedStar, PipelineStats)>,
}

impl IngestPipeline {
    /// Move `star` into a new writer thread fed by a channel holding at most
    /// `capacity` measurements
    pub fn spawn(star: NestedStar, capacity: usize, sink: SharedSink) -> Result<Self, IngestError> {
        let (sender, receiver) = bounded(capacity.max(1));
        let writer = std::thread::Builder::new()
            .name("nstar-writer".to_string())
            .spawn(move || run_writer(star, receiver, sink))?;

        Ok(IngestPipeline { sender, writer })
    }

    /// New producer handle
    pub fn sender(&self) -> MeasurementSender {
        MeasurementSender {
            sender: self.sender.clone(),
        }
    }

    pub fn submit(&self, msmt: Vec<String>) -> Result<(), IngestError> {
        self.sender
            .send(msmt)
            .map_err(|_| IngestError::WriterClosed)
    }

    /// Close the queue and wait for the writer to drain it.
    ///
    /// Blocks until every [`MeasurementSender`] handed out has been dropped.
    pub fn finish(self) -> Result<(NestedStar, PipelineStats), IngestError> {
        let IngestPipeline { sender, writer } = self;
        drop(sender);
        writer.join().map_err(|_| IngestError::WriterPanicked)
    }
}

fn run_writer(
    mut star: NestedStar,
    receiver: Receiver<Vec<String>>,
    sink: SharedSink,
) -> (NestedStar, PipelineStats) {
    let mut stats = PipelineStats::default();

    for msmt in receiver.iter() {
        match star.add_measurement(&msmt) {
            Ok(()) => stats.inserted += 1,
            Err(e) => {
                stats.rejected += 1;
                sink.record_skipped(0, &e.to_string());
            }
        }
    }

    debug!(
        inserted = stats.inserted,
        rejected = stats.rejected,
        "Tree writer drained"
    );
    (star, stats)
}
