//! Timing tree and custom timing aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Custom timings of a node, keyed by category (e.g. `"sql"`, `"redis"`).
pub type CustomTimings = BTreeMap<String, Vec<CustomTiming>>;

/// A sub-measurement attached to a [`Timing`], such as one database command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTiming {
    /// Command text (SQL statement, cache key, URL, ...).
    #[serde(default)]
    pub command: String,
    /// How the command was executed, e.g. `"Reader"` or `"NonQuery"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_type: Option<String>,
    /// Offset from the start of the session in milliseconds.
    #[serde(default)]
    pub start_ms: f64,
    /// Duration in milliseconds.
    pub duration_ms: f64,
}

impl CustomTiming {
    /// Create a custom timing for a command.
    #[must_use]
    pub fn new(command: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            command: command.into(),
            execute_type: None,
            start_ms: 0.0,
            duration_ms,
        }
    }

    /// Set the execute type.
    #[must_use]
    pub fn with_execute_type(mut self, execute_type: impl Into<String>) -> Self {
        self.execute_type = Some(execute_type.into());
        self
    }

    /// Set the start offset.
    #[must_use]
    pub fn starting_at(mut self, start_ms: f64) -> Self {
        self.start_ms = start_ms;
        self
    }
}

/// Aggregated view of one custom timing category on a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomTimingGroup<'a> {
    /// Category name.
    pub category: &'a str,
    /// Members of the category, in recording order.
    pub timings: &'a [CustomTiming],
    /// Sum of member durations in milliseconds.
    pub total_ms: f64,
}

impl<'a> CustomTimingGroup<'a> {
    fn new(category: &'a str, timings: &'a [CustomTiming]) -> Self {
        Self {
            category,
            timings,
            total_ms: timings.iter().map(|t| t.duration_ms).sum(),
        }
    }

    /// Number of commands in the category.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.timings.len()
    }

    /// Unit word for the command count.
    #[must_use]
    pub const fn unit(&self) -> &'static str {
        if self.timings.len() == 1 {
            "cmd"
        } else {
            "cmds"
        }
    }
}

/// One measured operation in a profiling session.
///
/// Nodes own their children exclusively. Depth is not stored: it is the
/// number of ancestors, reported by [`Timing::iter`]. Attaching a subtree is
/// a push, and the depth invariant holds by construction.
///
/// Drop, clone, equality and serialization all walk the tree with an explicit
/// stack, so arbitrarily deep trees never exhaust the thread stack.
#[derive(Debug)]
pub struct Timing {
    name: String,
    duration_ms: f64,
    children: Vec<Timing>,
    custom_timings: Option<CustomTimings>,
}

impl Timing {
    /// Create a root-level timing with no children.
    #[must_use]
    pub fn new(name: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            children: Vec::new(),
            custom_timings: None,
        }
    }

    /// Append a child, consuming and returning `self`.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.add_child(child);
        self
    }

    /// Append a custom timing, consuming and returning `self`.
    #[must_use]
    pub fn with_custom_timing(mut self, category: impl Into<String>, timing: CustomTiming) -> Self {
        self.add_custom_timing(category, timing);
        self
    }

    /// Append a child after the existing ones.
    pub fn add_child(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Record a custom timing under `category`.
    pub fn add_custom_timing(&mut self, category: impl Into<String>, timing: CustomTiming) {
        self.custom_timings
            .get_or_insert_with(BTreeMap::new)
            .entry(category.into())
            .or_default()
            .push(timing);
    }

    /// Operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Duration in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Children in execution order.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// True when at least one custom timing category is present.
    #[must_use]
    pub fn has_custom_timings(&self) -> bool {
        self.custom_timings.as_ref().is_some_and(|map| !map.is_empty())
    }

    /// Raw custom timings, if any were recorded.
    #[must_use]
    pub const fn custom_timings(&self) -> Option<&CustomTimings> {
        self.custom_timings.as_ref()
    }

    /// Per-category totals, in category name order.
    pub fn custom_timing_groups(&self) -> impl Iterator<Item = CustomTimingGroup<'_>> {
        self.custom_timings
            .iter()
            .flatten()
            .map(|(category, timings)| CustomTimingGroup::new(category, timings))
    }

    /// Depth-first pre-order walk over this node and all its descendants,
    /// paired with their depth below `self` (which sits at depth 0).
    #[must_use]
    pub fn iter(&self) -> TimingIter<'_> {
        TimingIter {
            stack: vec![(0, self)],
        }
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Copy of this node without its children.
    fn detached(&self) -> Self {
        Self {
            name: self.name.clone(),
            duration_ms: self.duration_ms,
            children: Vec::new(),
            custom_timings: self.custom_timings.clone(),
        }
    }

    /// Rebuild a tree from its flattened pre-order records.
    pub(crate) fn from_records(records: Vec<TimingRecord>) -> Result<Self> {
        let mut records = records.into_iter();
        let root = match records.next() {
            Some(record) if record.depth == 0 => record.into_timing(),
            Some(record) => {
                return Err(Error::InvalidData(format!(
                    "timing tree root `{}` has depth {}",
                    record.name, record.depth
                )))
            }
            None => return Err(Error::InvalidData("timing tree is empty".to_string())),
        };

        let mut tree = TreeBuilder::new(root);
        for record in records {
            if record.depth == 0 || record.depth > tree.deepest_open() + 1 {
                return Err(Error::InvalidData(format!(
                    "timing `{}` at depth {} has no parent",
                    record.name, record.depth
                )));
            }
            let depth = record.depth;
            tree.push(depth, record.into_timing());
        }
        Ok(tree.finish())
    }

    fn records(&self) -> impl Iterator<Item = TimingRecordRef<'_>> {
        self.iter().map(|(depth, timing)| TimingRecordRef {
            depth,
            name: &timing.name,
            duration_ms: timing.duration_ms,
            custom_timings: timing.custom_timings.as_ref(),
        })
    }
}

impl Drop for Timing {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut timing) = pending.pop() {
            pending.append(&mut timing.children);
        }
    }
}

impl Clone for Timing {
    fn clone(&self) -> Self {
        let mut tree = TreeBuilder::new(self.detached());
        for (depth, timing) in self.iter().skip(1) {
            tree.push(depth, timing.detached());
        }
        tree.finish()
    }
}

impl PartialEq for Timing {
    fn eq(&self, other: &Self) -> bool {
        // Pre-order records with depths determine the tree shape.
        self.records().eq(other.records())
    }
}

impl Serialize for Timing {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records())
    }
}

/// One node of a serialized tree, borrowed from a live [`Timing`].
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimingRecordRef<'a> {
    depth: usize,
    name: &'a str,
    duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_timings: Option<&'a CustomTimings>,
}

/// One node of a serialized tree: its depth below the root and its own data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimingRecord {
    depth: usize,
    name: String,
    duration_ms: f64,
    #[serde(default)]
    custom_timings: Option<CustomTimings>,
}

impl TimingRecord {
    fn into_timing(self) -> Timing {
        Timing {
            name: self.name,
            duration_ms: self.duration_ms,
            children: Vec::new(),
            custom_timings: self.custom_timings,
        }
    }
}

/// Assembles a tree from pre-order `(depth, node)` pairs.
struct TreeBuilder {
    root: Timing,
    /// Nodes on the current path below the root; `path[i]` sits at depth `i + 1`.
    path: Vec<Timing>,
}

impl TreeBuilder {
    fn new(root: Timing) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }

    /// Depth of the deepest node still accepting children.
    fn deepest_open(&self) -> usize {
        self.path.len()
    }

    /// Attach `timing` at `depth`, closing every open node at or below it.
    /// `depth` must lie in `1..=deepest_open() + 1`.
    fn push(&mut self, depth: usize, timing: Timing) {
        self.close_to(depth.saturating_sub(1));
        self.path.push(timing);
    }

    fn close_to(&mut self, len: usize) {
        while self.path.len() > len {
            let Some(child) = self.path.pop() else {
                break;
            };
            self.path
                .last_mut()
                .unwrap_or(&mut self.root)
                .children
                .push(child);
        }
    }

    fn finish(mut self) -> Timing {
        self.close_to(0);
        self.root
    }
}

/// Pre-order iterator over a timing tree, yielding `(depth, timing)`.
///
/// Uses an explicit stack, so memory is bounded by the number of pending
/// siblings rather than by tree depth.
#[derive(Debug, Clone)]
pub struct TimingIter<'a> {
    stack: Vec<(usize, &'a Timing)>,
}

impl<'a> Iterator for TimingIter<'a> {
    type Item = (usize, &'a Timing);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, timing) = self.stack.pop()?;
        // Reversed so the first child is popped next.
        self.stack
            .extend(timing.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, timing))
    }
}
