//! Record Ingestion
//!
//! Reads CSV rows (RFC 4180 quoting, no header), turns each into an ordered attribute sequence and hands it
//! to a callback (usually an [`IngestPipeline`] sender). Malformed rows are
//! reported to the [`DiagnosticSink`] and skipped; only I/O failures on the
//! underlying reader abort ingestion.
//!
//! Lines are numbered from 1 and blank lines keep their number.

pub mod pipeline;
pub mod records;

pub use pipeline::{IngestPipeline, MeasurementSender, PipelineStats};
pub use records::{AttributeRecord, LatLon, LocationRecord, Record, RecordFormat};

use crate::observability::DiagnosticSink;
use crate::tree::TreeError;
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Error type for ingestion operations
#[derive(Debug)]
pub enum IngestError {
    /// Reading the input failed
    Io(std::io::Error),
    /// Row could not be decoded as CSV (e.g. invalid UTF-8)
    Csv(csv::Error),
    /// Row has the wrong number of CSV fields
    FieldCount { expected: usize, got: usize },
    /// A `lat;lon` field could not be parsed
    LatLon(String),
    /// Measurement length differs from the configured number of attributes
    Arity { expected: usize, got: usize },
    /// Measurement was rejected by the tree
    Tree(TreeError),
    /// Tree writer is no longer receiving
    WriterClosed,
    /// Tree writer thread panicked
    WriterPanicked,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Io(e) => write!(f, "I/O error: {}", e),
            IngestError::Csv(e) => write!(f, "Error reading line: {}", e),
            IngestError::FieldCount { expected, got } => {
                write!(f, "expected {} but got {} CSV fields", expected, got)
            }
            IngestError::LatLon(msg) => write!(f, "{}", msg),
            IngestError::Arity { expected, got } => {
                write!(f, "expected {} but got {} attributes", expected, got)
            }
            IngestError::Tree(e) => write!(f, "{}", e),
            IngestError::WriterClosed => write!(f, "Tree writer channel disconnected"),
            IngestError::WriterPanicked => write!(f, "Tree writer thread panicked"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Io(e) => Some(e),
            IngestError::Csv(e) => Some(e),
            IngestError::Tree(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e)
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            IngestError::Io(e.into())
        } else {
            IngestError::Csv(e)
        }
    }
}

impl From<TreeError> for IngestError {
    fn from(e: TreeError) -> Self {
        IngestError::Tree(e)
    }
}

/// Turns CSV lines into measurements of a fixed arity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordParser {
    format: RecordFormat,
    num_attrs: usize,
}

impl RecordParser {
    pub fn new(format: RecordFormat, num_attrs: usize) -> Self {
        RecordParser { format, num_attrs }
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    pub fn num_attrs(&self) -> usize {
        self.num_attrs
    }

    /// Parse a single CSV row
    pub fn parse_line(&self, line: &str) -> Result<Vec<String>, IngestError> {
        let mut record = StringRecord::new();
        if !csv_reader(line.as_bytes()).read_record(&mut record)? {
            return Err(IngestError::FieldCount {
                expected: self.format.field_count(self.num_attrs),
                got: 0,
            });
        }
        self.parse_record(&record)
    }

    pub fn parse_record(&self, record: &StringRecord) -> Result<Vec<String>, IngestError> {
        let fields: Vec<&str> = record.iter().collect();
        let prepared = match self.format {
            RecordFormat::Location => LocationRecord::parse(&fields, self.num_attrs)?.prepare(),
            RecordFormat::Attributes => AttributeRecord::parse(&fields, self.num_attrs)?.prepare(),
        };
        Ok(prepared)
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

/// Counters for one pass over an input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-empty lines seen
    pub lines: u64,
    /// Lines that produced a measurement
    pub valid: u64,
    /// Lines that were skipped
    pub skipped: u64,
}

/// Parse every row of `reader` and pass each measurement to `on_measurement`.
///
/// Blank lines are ignored. Rows that fail to parse, and rows that are not
/// valid UTF-8, are reported to `sink` and skipped. An error returned by
/// `on_measurement`, or an I/O error, stops ingestion.
pub fn read_records<R, F>(
    reader: R,
    parser: &RecordParser,
    sink: &dyn DiagnosticSink,
    mut on_measurement: F,
) -> Result<IngestStats, IngestError>
where
    R: Read,
    F: FnMut(Vec<String>) -> Result<(), IngestError>,
{
    let mut reader = csv_reader(reader);
    let mut record = StringRecord::new();
    let mut stats = IngestStats::default();

    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                stats.lines += 1;
                stats.skipped += 1;
                let line_no = e.position().map_or(0, |pos| pos.line());
                sink.record_skipped(line_no, &IngestError::Csv(e).to_string());
                continue;
            }
        }
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        stats.lines += 1;

        match parser.parse_record(&record) {
            Ok(msmt) => {
                on_measurement(msmt)?;
                stats.valid += 1;
                sink.record_progress(stats.valid);
            }
            Err(e) => {
                stats.skipped += 1;
                let line_no = record.position().map_or(0, |pos| pos.line());
                sink.record_skipped(line_no, &e.to_string());
            }
        }
    }

    Ok(stats)
}

/// Open `path` and run [`read_records`] over it
pub fn read_file<P, F>(
    path: P,
    parser: &RecordParser,
    sink: &dyn DiagnosticSink,
    on_measurement: F,
) -> Result<IngestStats, IngestError>
where
    P: AsRef<Path>,
    F: FnMut(Vec<String>) -> Result<(), IngestError>,
{
    let path = path.as_ref();
    info!("Opening {:?} for processing.", path);
    let file = File::open(path)?;

    let stats = read_records(file, parser, sink, on_measurement)?;
    info!(
        valid = stats.valid,
        skipped = stats.skipped,
        "Parsed {} valid records.",
        stats.valid
    );
    Ok(stats)
}
