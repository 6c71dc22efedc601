//! Simulation Configuration
//!
//! Loaded from TOML; every field has a default so a file only needs to name
//! what it changes. Command-line flags are applied on top by the binary.
//!
//! ```toml
//! input = "checkins.csv"
//! format = "location"
//! num_attrs = 7
//! thresholds = [5, 10, 25, 50, 100]
//! workers = 4
//! output = "json"
//! ```

use crate::ingest::RecordFormat;
use crate::report::OutputFormat;
use crate::workload::WorkloadConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of location granularities in a check-in record
pub const DEFAULT_NUM_ATTRS: usize = 7;

/// Error returned when a configuration cannot be loaded
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io(std::io::Error),
    /// Config file is not valid TOML for [`SimConfig`]
    Parse(toml::de::Error),
    /// Values are present but unusable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Thresholds swept when none are configured: 2, 4, 8, ..., 65536
pub fn default_thresholds() -> Vec<u64> {
    (1..=16).map(|exp| 1u64 << exp).collect()
}

/// Everything one simulation run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// CSV file to ingest; ignored when `synthetic` is set
    pub input: Option<PathBuf>,
    /// How input rows are interpreted
    pub format: RecordFormat,
    /// Attributes per measurement
    pub num_attrs: usize,
    /// Thresholds to aggregate for, in report order
    pub thresholds: Vec<u64>,
    /// Aggregation worker threads (1 = aggregate on the calling thread)
    pub workers: usize,
    /// Measurements buffered between reader and tree writer
    pub queue_capacity: usize,
    /// Report rendering
    pub output: OutputFormat,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Generate measurements instead of reading `input`
    pub synthetic: Option<WorkloadConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            input: None,
            format: RecordFormat::Location,
            num_attrs: DEFAULT_NUM_ATTRS,
            thresholds: default_thresholds(),
            workers: 1,
            queue_capacity: 1024,
            output: OutputFormat::Csv,
            log_json: false,
            synthetic: None,
        }
    }
}

impl SimConfig {
    /// Config for plain attribute rows of the given arity
    pub fn attributes(num_attrs: usize) -> Self {
        SimConfig {
            format: RecordFormat::Attributes,
            num_attrs,
            ..Default::default()
        }
    }

    /// Config for a synthetic run; arity follows the workload
    pub fn synthetic(workload: WorkloadConfig) -> Self {
        SimConfig {
            num_attrs: workload.num_attrs,
            synthetic: Some(workload),
            ..Default::default()
        }
    }

    /// Parse without validating; command-line overrides may still fill gaps
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn with_input<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<u64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_attrs == 0 {
            return Err(ConfigError::Invalid("num_attrs must be at least 1".to_string()));
        }
        if self.thresholds.is_empty() {
            return Err(ConfigError::Invalid("no thresholds configured".to_string()));
        }
        if self.thresholds.contains(&0) {
            return Err(ConfigError::Invalid("thresholds must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_string()));
        }
        if let Some(workload) = &self.synthetic {
            if workload.num_attrs != self.num_attrs {
                return Err(ConfigError::Invalid(format!(
                    "synthetic workload has {} attributes but num_attrs is {}",
                    workload.num_attrs, self.num_attrs
                )));
            }
        } else if self.input.is_none() {
            return Err(ConfigError::Invalid("no input file configured".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let ks = default_thresholds();
        assert_eq!(ks.len(), 16);
        assert_eq!(ks[0], 2);
        assert_eq!(ks[15], 65536);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SimConfig::from_toml_str(
            r#"
            input = "data.csv"
            format = "attributes"
            num_attrs = 3
            thresholds = [5, 10]
            output = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.input, Some(PathBuf::from("data.csv")));
        assert_eq!(config.format, RecordFormat::Attributes);
        assert_eq!(config.num_attrs, 3);
        assert_eq!(config.thresholds, vec![5, 10]);
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.workers, 1);
        assert_eq!(config.queue_capacity, 1024);
    }

    #[test]
    fn test_synthetic_section() {
        let config = SimConfig::from_toml_str(
            r#"
            num_attrs = 4
            [synthetic]
            seed = 9
            num_attrs = 4
            num_measurements = 1000
            "#,
        )
        .unwrap();

        let workload = config.synthetic.unwrap();
        assert_eq!(workload.seed, 9);
        assert_eq!(workload.num_measurements, 1000);
        assert_eq!(workload.values_per_attr, 50);
    }

    #[test]
    fn test_invalid_configs() {
        let parse_and_validate = |s: &str| SimConfig::from_toml_str(s)?.validate();

        assert!(matches!(
            parse_and_validate("input = \"a.csv\"\nthresholds = []"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_and_validate("input = \"a.csv\"\nthresholds = [0, 5]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_and_validate("thresholds = [5]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(parse_and_validate("input = \"a.csv\"").is_ok());
        assert!(matches!(
            SimConfig::from_toml_str("num_attrs = \"seven\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_synthetic_arity_mismatch() {
        let config = SimConfig {
            num_attrs: 2,
            ..SimConfig::synthetic(WorkloadConfig::new(1).with_attrs(3))
        };
        assert!(config.validate().is_err());
        assert!(SimConfig::synthetic(WorkloadConfig::new(1)).validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = SimConfig::attributes(3)
            .with_input("x.csv")
            .with_thresholds(vec![1, 2])
            .with_workers(4)
            .with_output(OutputFormat::Json);
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, 4);
    }
}
