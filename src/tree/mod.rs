//! Measurement Tree
//!
//! Trie over ordered attribute values. Every value entry counts how many
//! measurements share the path leading to it and exclusively owns the node
//! for the next attribute position, if any measurement continued past it.
//!
//! ```text
//! root ─┬─ "US" (11) ─┬─ "release" (9) ─┬─ "windows" (6)
//!       │             │                 └─ "linux"   (2) ...
//!       │             └─ "nightly" (1) ─── "windows" (1)
//!       └─ "CA" (5)  ...
//! ```
//!
//! The tree is insert-only: counts never decrease and entries are never
//! removed. It has a single writer; aggregation only reads it.

use ahash::AHashMap;

/// Error returned when a measurement cannot be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Measurement has no attributes
    EmptyMeasurement,
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::EmptyMeasurement => write!(f, "Measurement has no attributes"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Count and continuation for one attribute value at one depth
#[derive(Debug, Default)]
pub struct ValueEntry {
    count: u64,
    child: Option<Box<Node>>,
}

impl ValueEntry {
    /// Number of measurements whose path up to here ends in this value
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Node holding the next attribute position, if any measurement got there
    #[inline]
    pub fn child(&self) -> Option<&Node> {
        self.child.as_deref()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.child.is_none()
    }
}

/// One attribute position in the tree
#[derive(Debug, Default)]
pub struct Node {
    // E.g. "US" -> ValueEntry { count: 11, .. }
    values: AHashMap<String, ValueEntry>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, value: &str) -> Option<&ValueEntry> {
        self.values.get(value)
    }

    /// Iterate over `(value, entry)` pairs in arbitrary order; the map is
    /// randomly seeded, so the order differs between processes
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ValueEntry)> {
        self.values.iter().map(|(value, entry)| (value.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert<S: AsRef<str>>(&mut self, msmt: &[S]) {
        let Some((first, rest)) = msmt.split_first() else {
            return;
        };
        let entry = self.values.entry(first.as_ref().to_owned()).or_default();
        entry.count += 1;
        if !rest.is_empty() {
            entry.child.get_or_insert_with(Box::default).insert(rest);
        }
    }

    /// Number of nodes in this subtree, this one included
    pub fn node_count(&self) -> usize {
        1 + self
            .values
            .values()
            .filter_map(ValueEntry::child)
            .map(Node::node_count)
            .sum::<usize>()
    }

    /// Number of value entries in this subtree, not deduplicated across branches
    pub fn tag_count(&self) -> usize {
        self.values.len()
            + self
                .values
                .values()
                .filter_map(ValueEntry::child)
                .map(Node::tag_count)
                .sum::<usize>()
    }

    /// Number of value entries in this subtree that have no child node
    pub fn leaf_tag_count(&self) -> usize {
        self.values
            .values()
            .map(|entry| match entry.child() {
                Some(child) => child.leaf_tag_count(),
                None => 1,
            })
            .sum()
    }

    /// Sum of the counts of this node's entries
    pub fn total_count(&self) -> u64 {
        self.values.values().map(ValueEntry::count).sum()
    }
}

/// Insert-only trie of measurements
#[derive(Debug, Default)]
pub struct MeasurementTree {
    root: Node,
}

impl MeasurementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one measurement, consuming one attribute per depth.
    ///
    /// Every value along the path has its count incremented; missing entries
    /// and child nodes are created on the way down.
    pub fn insert<S: AsRef<str>>(&mut self, msmt: &[S]) -> Result<(), TreeError> {
        if msmt.is_empty() {
            return Err(TreeError::EmptyMeasurement);
        }
        self.root.insert(msmt);
        Ok(())
    }

    /// Depth-0 node
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn tag_count(&self) -> usize {
        self.root.tag_count()
    }

    pub fn leaf_tag_count(&self) -> usize {
        self.root.leaf_tag_count()
    }

    /// Number of inserted measurements
    pub fn total_count(&self) -> u64 {
        self.root.total_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}
