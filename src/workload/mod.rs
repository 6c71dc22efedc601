//! Synthetic Workload Generator
//!
//! Deterministic, skewed measurements for demos, tests and benchmarks. Each
//! attribute value is drawn independently from a Zipf-like distribution, so a
//! few values dominate every position and the long tail falls below any
//! interesting threshold. Same seed, same measurements.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Shape of a synthetic dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of measurements to generate
    pub num_measurements: u64,
    /// Attributes per measurement
    pub num_attrs: usize,
    /// Distinct values available at each attribute position
    pub values_per_attr: usize,
    /// Zipf exponent; higher is more skewed
    pub skew: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            seed: 0,
            num_measurements: 100_000,
            num_attrs: 3,
            values_per_attr: 50,
            skew: 1.2,
        }
    }
}

impl WorkloadConfig {
    pub fn new(seed: u64) -> Self {
        WorkloadConfig {
            seed,
            ..Default::default()
        }
    }

    pub fn with_measurements(mut self, count: u64) -> Self {
        self.num_measurements = count;
        self
    }

    pub fn with_attrs(mut self, num_attrs: usize) -> Self {
        self.num_attrs = num_attrs;
        self
    }

    pub fn with_values_per_attr(mut self, count: usize) -> Self {
        self.values_per_attr = count;
        self
    }

    pub fn with_skew(mut self, skew: f64) -> Self {
        self.skew = skew;
        self
    }

    /// Preset: mostly-unique tail, most measurements only partially survive
    pub fn long_tail(seed: u64) -> Self {
        WorkloadConfig {
            seed,
            values_per_attr: 1_000,
            skew: 0.8,
            ..Default::default()
        }
    }

    /// Preset: heavy head, most measurements fully survive moderate thresholds
    pub fn concentrated(seed: u64) -> Self {
        WorkloadConfig {
            seed,
            values_per_attr: 10,
            skew: 2.0,
            ..Default::default()
        }
    }
}

/// Iterator over synthetic measurements
pub struct WorkloadGenerator {
    config: WorkloadConfig,
    rng: ChaCha8Rng,
    generated: u64,
}

impl WorkloadGenerator {
    pub fn new(config: WorkloadConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        WorkloadGenerator {
            config,
            rng,
            generated: 0,
        }
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Value index in `[0, values_per_attr)`; lower indices are much more
    /// frequent. Inverse transform sampling of a Pareto tail, clamped.
    fn zipf_index(&mut self) -> usize {
        let n = self.config.values_per_attr.max(1);
        let skew = self.config.skew.max(f64::EPSILON);
        let u: f64 = self.rng.gen();
        let k = ((1.0 - u).powf(-1.0 / skew) - 1.0).floor();
        if k.is_finite() && k >= 0.0 {
            (k as usize).min(n - 1)
        } else {
            n - 1
        }
    }

    fn next_measurement(&mut self) -> Vec<String> {
        (0..self.config.num_attrs)
            .map(|depth| format!("a{}v{}", depth, self.zipf_index()))
            .collect()
    }
}

impl Iterator for WorkloadGenerator {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.generated >= self.config.num_measurements {
            return None;
        }
        self.generated += 1;
        Some(self.next_measurement())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.config.num_measurements - self.generated) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_deterministic_per_seed() {
        let config = WorkloadConfig::new(42).with_measurements(500);
        let a: Vec<_> = WorkloadGenerator::new(config.clone()).collect();
        let b: Vec<_> = WorkloadGenerator::new(config).collect();
        assert_eq!(a, b);

        let c: Vec<_> = WorkloadGenerator::new(WorkloadConfig::new(43).with_measurements(500)).collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_shape() {
        let config = WorkloadConfig::new(7)
            .with_measurements(200)
            .with_attrs(4)
            .with_values_per_attr(5);
        let msmts: Vec<_> = WorkloadGenerator::new(config).collect();

        assert_eq!(msmts.len(), 200);
        for msmt in &msmts {
            assert_eq!(msmt.len(), 4);
            for (depth, value) in msmt.iter().enumerate() {
                assert!(value.starts_with(&format!("a{}v", depth)));
                let idx: usize = value[format!("a{}v", depth).len()..].parse().unwrap();
                assert!(idx < 5);
            }
        }
    }

    #[test]
    fn test_skewed_towards_head() {
        let config = WorkloadConfig::concentrated(1).with_measurements(5_000);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for msmt in WorkloadGenerator::new(config) {
            *counts.entry(msmt[0].clone()).or_insert(0) += 1;
        }

        let head = counts.get("a0v0").copied().unwrap_or(0);
        assert!(counts.values().all(|&c| c <= head));
    }

    #[test]
    fn test_size_hint() {
        let mut gen = WorkloadGenerator::new(WorkloadConfig::new(1).with_measurements(3));
        assert_eq!(gen.size_hint(), (3, Some(3)));
        gen.next();
        assert_eq!(gen.size_hint(), (2, Some(2)));
    }
}
