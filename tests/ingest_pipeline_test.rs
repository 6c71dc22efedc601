//! File ingestion tests
//!
//! Writes CSV inputs to temporary files and pushes them through the reader
//! and the single-writer pipeline, the same way the binary does.

use nstar_sim::ingest::{read_file, IngestError, IngestPipeline, RecordFormat, RecordParser};
use nstar_sim::observability::{recording_sink, DiagnosticSink, SharedSink};
use nstar_sim::NestedStar;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

fn ingest(
    file: &NamedTempFile,
    format: RecordFormat,
    num_attrs: usize,
    sink: SharedSink,
) -> NestedStar {
    let pipeline = IngestPipeline::spawn(NestedStar::new(num_attrs), 2, sink.clone()).unwrap();
    let parser = RecordParser::new(format, num_attrs);
    let stats = read_file(file.path(), &parser, &*sink, |msmt| pipeline.submit(msmt)).unwrap();
    println!("{:?}", stats);

    let (star, _) = pipeline.finish().unwrap();
    star
}

#[test]
fn test_attribute_file() {
    let file = write_csv(&[
        "US,release,windows",
        "US,release,windows",
        "US,beta,linux",
        "",
        "CA,release",
        "CA,release,macos",
    ]);
    let sink = recording_sink();
    let star = ingest(&file, RecordFormat::Attributes, 3, sink.clone());

    assert_eq!(star.num_measurements(), 4);
    assert_eq!(star.tree().root().get("US").unwrap().count(), 3);
    assert_eq!(sink.skipped_count(), 1);
    assert_eq!(sink.skipped()[0].line, 5);

    let report = star.aggregate(2).unwrap();
    assert_eq!(report.full, 2);
    assert_eq!(report.partial, 1);
    assert_eq!(report.lost, 1);
}

#[test]
fn test_location_file() {
    let file = write_csv(&[
        "TR,41.0082;28.9784,41.01;28.98,41.;28.,x",
        "TR,41.0082;28.9784,41.01;28.98,41.;28.,y",
        "TR,39.9334;32.8597,39.93;32.86,39.;32.,z",
        "TR,bogus,41.01;28.98,41.;28.,x",
        "TR,41.0082;28.9784,41.01;28.98",
    ]);
    let sink = recording_sink();
    let star = ingest(&file, RecordFormat::Location, 3, sink.clone());

    assert_eq!(star.num_measurements(), 3);
    assert_eq!(sink.skipped_count(), 2);
    assert_eq!(sink.skipped()[1].reason, "expected 5 but got 4 CSV fields");

    let root = star.tree().root();
    assert_eq!(root.len(), 2);
    let mut counts: Vec<u64> = root.entries().map(|(_, entry)| entry.count()).collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2]);

    let report = star.aggregate(2).unwrap();
    assert_eq!(report.full, 2);
    assert_eq!(report.lost, 1);
}

#[test]
fn test_trailing_period_granularity() {
    let file = write_csv(&["DE,52.;13.,52.;13.,x"]);
    let star = ingest(&file, RecordFormat::Location, 2, recording_sink());

    let first = star.tree().root().get("52.000000;13.000000").unwrap();
    assert_eq!(first.count(), 1);
    assert!(first.child().unwrap().get("52.000000;13.000000").is_some());
}

#[test]
fn test_missing_file() {
    let parser = RecordParser::new(RecordFormat::Attributes, 1);
    let sink: Arc<dyn DiagnosticSink> = recording_sink();
    let result = read_file("/nonexistent/nstar/input.csv", &parser, &*sink, |_| Ok(()));
    assert!(matches!(result, Err(IngestError::Io(_))));
}
