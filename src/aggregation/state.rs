use serde::Serialize;
use std::collections::BTreeMap;

/// Mergeable accumulator produced by one aggregation run.
///
/// `full_count` counts measurements whose whole attribute chain cleared the
/// threshold, `partial_count` those that cleared it for a strict prefix only.
/// `len_partial_counts` maps a resolved depth to the number of measurements
/// resolved to exactly that depth; full resolutions are recorded under the
/// last depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationState {
    full_count: u64,
    partial_count: u64,
    #[serde(skip)]
    already_counted: u64,
    len_partial_counts: BTreeMap<usize, u64>,
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn full_count(&self) -> u64 {
        self.full_count
    }

    #[inline]
    pub fn partial_count(&self) -> u64 {
        self.partial_count
    }

    pub fn len_partial_counts(&self) -> &BTreeMap<usize, u64> {
        &self.len_partial_counts
    }

    /// Count recorded for `depth`, zero when absent
    pub fn len_partial(&self, depth: usize) -> u64 {
        self.len_partial_counts.get(&depth).copied().unwrap_or(0)
    }

    #[inline]
    pub(crate) fn already_counted(&self) -> u64 {
        self.already_counted
    }

    pub(crate) fn add_full(&mut self, num: u64) {
        self.full_count += num;
    }

    pub(crate) fn add_partial(&mut self, num: u64) {
        self.partial_count += num;
    }

    pub(crate) fn add_already_counted(&mut self, num: u64) {
        self.already_counted += num;
    }

    pub(crate) fn add_len_partial(&mut self, depth: usize, num: u64) {
        if num == 0 {
            return;
        }
        *self.len_partial_counts.entry(depth).or_insert(0) += num;
    }

    /// Merge `other` into `self`: scalar counters are summed and the depth
    /// distribution is summed key by key.
    pub fn augment(&mut self, other: &AggregationState) {
        self.full_count += other.full_count;
        self.partial_count += other.partial_count;
        self.already_counted += other.already_counted;
        for (&depth, &num) in &other.len_partial_counts {
            self.add_len_partial(depth, num);
        }
    }

    /// Sum of the depth distribution over depths strictly below `max_depth`
    pub fn partial_sum(&self, max_depth: usize) -> u64 {
        self.len_partial_counts
            .range(..max_depth)
            .map(|(_, &num)| num)
            .sum()
    }

    /// Whether the partial-length distribution reconciles with
    /// `partial_count`. Anything else is an accounting defect.
    pub fn adds_up(&self, max_depth: usize) -> bool {
        self.partial_sum(max_depth) == self.partial_count
    }
}

impl std::fmt::Display for AggregationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} full, {} partial msmts.",
            self.full_count, self.partial_count
        )
    }
}
