//! Observability
//!
//! - Structured logging through `tracing`, initialised once by the binary
//! - [`DiagnosticSink`] for ingestion diagnostics, injected into the reader
//!   and the ingestion pipeline instead of a process-wide logger
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | `info` | Log filter directives |

pub mod sink;

pub use sink::{
    noop_sink, recording_sink, tracing_sink, DiagnosticEvent, DiagnosticSink, NoopSink,
    RecordingSink, SharedSink, TracingSink,
};

use tracing_subscriber::EnvFilter;

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr so stdout stays reserved for the report. With
/// `json` set, every event is emitted as one JSON object per line.
pub fn init_tracing(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}
