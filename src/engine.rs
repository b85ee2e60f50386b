//! Join/transform engine.
//!
//! For each batch the engine walks the target columns one at a time and
//! classifies every cell as [`Lookup::Hit`], [`Lookup::Miss`] or
//! [`Lookup::Blank`]. Hits are substituted in place, misses are overwritten
//! with the empty marker, blanks stay empty. A row whose target columns produced
//! any miss or blank lands once in the batch's [`UnmappedIds`].

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{
    batch::Batch,
    columns::ColumnPlan,
    error::RemapResult,
    lookup::{KEY_SEPARATOR, LookupIndex},
};

/// Outcome of probing one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Hit(&'a str),
    Miss,
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedReason {
    Blank,
    Miss,
}

impl UnmappedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            UnmappedReason::Blank => "blank",
            UnmappedReason::Miss => "miss",
        }
    }
}

impl std::fmt::Display for UnmappedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedOccurrence {
    pub id: String,
    pub column: String,
    pub original_value: String,
    pub reason: UnmappedReason,
}

/// Identifier values in first-seen order, each recorded at most once.
#[derive(Debug, Clone, Default)]
pub struct UnmappedIds {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl UnmappedIds {
    /// Returns `false` when the id was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.order.push(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnStats {
    pub hits: u64,
    pub misses: u64,
    pub blanks: u64,
}

impl ColumnStats {
    pub fn merge(&mut self, other: &ColumnStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.blanks += other.blanks;
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub unmapped: UnmappedIds,
    /// Filled only when the engine records occurrences.
    pub occurrences: Vec<UnmappedOccurrence>,
    pub columns: BTreeMap<String, ColumnStats>,
}

pub struct TransformEngine<'a> {
    index: &'a LookupIndex,
    plan: &'a ColumnPlan,
    record_occurrences: bool,
}

impl<'a> TransformEngine<'a> {
    pub fn new(index: &'a LookupIndex, plan: &'a ColumnPlan) -> Self {
        TransformEngine {
            index,
            plan,
            record_occurrences: false,
        }
    }

    /// Keep one [`UnmappedOccurrence`] per failed cell in addition to the id set.
    pub fn with_occurrences(mut self, enabled: bool) -> Self {
        self.record_occurrences = enabled;
        self
    }

    pub fn classify(&self, column: &str, value: &str) -> Lookup<'a> {
        let mut key = String::new();
        self.classify_into(&mut key, column, value)
    }

    fn classify_into(&self, key: &mut String, column: &str, value: &str) -> Lookup<'a> {
        if value.is_empty() {
            return Lookup::Blank;
        }
        key.clear();
        key.push_str(column);
        key.push_str(KEY_SEPARATOR);
        key.push_str(value);
        match self.index.get(key) {
            Some(average) => Lookup::Hit(average),
            None => Lookup::Miss,
        }
    }

    /// Substitutes target values in place and returns the batch's unmapped ids.
    ///
    /// Fails with a schema error, leaving the batch untouched, when the batch
    /// lacks the identifier column. A record too short to carry the identifier
    /// is padded so it is kept under an empty id.
    pub fn transform(&self, batch: &mut Batch) -> RemapResult<BatchOutcome> {
        let bound = self.plan.bind(&batch.headers, batch.index)?;
        for row in batch.rows.iter_mut().filter(|row| row.len() <= bound.id) {
            row.resize(bound.id + 1, String::new());
        }

        let mut outcome = BatchOutcome::default();
        let mut key = String::new();
        for target in &bound.targets {
            let mut stats = ColumnStats::default();
            for row in batch.rows.iter_mut() {
                let lookup = match row.get(target.index) {
                    Some(value) => self.classify_into(&mut key, &target.name, value),
                    None => Lookup::Blank,
                };
                let reason = match lookup {
                    Lookup::Hit(average) => {
                        stats.hits += 1;
                        row[target.index] = average.to_string();
                        continue;
                    }
                    Lookup::Blank => {
                        stats.blanks += 1;
                        UnmappedReason::Blank
                    }
                    Lookup::Miss => {
                        stats.misses += 1;
                        UnmappedReason::Miss
                    }
                };
                let original_value = match reason {
                    UnmappedReason::Miss => std::mem::take(&mut row[target.index]),
                    UnmappedReason::Blank => String::new(),
                };
                let id = &row[bound.id];
                outcome.unmapped.insert(id);
                if self.record_occurrences {
                    outcome.occurrences.push(UnmappedOccurrence {
                        id: id.clone(),
                        column: target.name.clone(),
                        original_value,
                        reason,
                    });
                }
            }
            outcome.columns.insert(target.name.clone(), stats);
        }
        Ok(outcome)
    }
}
