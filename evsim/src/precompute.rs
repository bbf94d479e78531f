use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::Rank;

/// 10 pair ranks times 10 dealer up-cards.
pub const EXPECTED_KEY_COUNT: usize = 100;

#[derive(Debug, Error)]
pub enum PrecomputeError {
    #[error("malformed record on line {line}: {source}")]
    MalformedLine {
        line: usize,
        source: serde_json::Error,
    },
    #[error("malformed table: {0}")]
    MalformedTable(#[from] serde_json::Error),
    #[error("missing {count} keys, first: {first}")]
    MissingKeys { count: usize, first: String },
    #[error("{count} unexpected keys, first: {first}")]
    ExtraKeys { count: usize, first: String },
    #[error("{count} non-finite values, first: {first}")]
    NonFiniteValues { count: usize, first: String },
}

/// One NDJSON line of the incremental precompute output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub k: String,
    pub v: f64,
}

impl SplitRecord {
    /// Builds a record for one pair/up-card cell, rounding the EV the
    /// same way the finished table stores it.
    pub fn new(pair: Rank, up: Rank, ev: f64) -> SplitRecord {
        SplitRecord {
            k: split_key(pair, up),
            v: round_ev(ev),
        }
    }
}

/// Lookup key for a split cell: `"8,8|T"` style.
pub fn split_key(pair: Rank, up: Rank) -> String {
    format!("{},{}|{}", pair, pair, up)
}

/// Every key a complete table must hold, in generation order: pair
/// rank major, dealer up-card minor.
pub fn expected_keys() -> Vec<String> {
    let mut keys = Vec::with_capacity(EXPECTED_KEY_COUNT);
    for pair in Rank::iter() {
        for up in Rank::iter() {
            keys.push(split_key(pair, up));
        }
    }
    keys
}

/// EVs are persisted at 6 decimal places.
pub fn round_ev(ev: f64) -> f64 {
    (ev * 1e6).round() / 1e6
}

pub fn ndjson_file_name(tag: &str) -> String {
    format!("split-ev.{}.ndjson", tag)
}

pub fn table_file_name(tag: &str) -> String {
    format!("split-ev.{}.json", tag)
}

/// A split EV table for one rule tag, keyed by [`split_key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitTable {
    entries: BTreeMap<String, f64>,
}

impl SplitTable {
    /// Folds NDJSON text into a table. Blank lines are skipped. A
    /// single malformed final line is tolerated and dropped, since an
    /// interrupted generator run leaves one behind; anything else is
    /// an error.
    pub fn from_ndjson(text: &str) -> Result<SplitTable, PrecomputeError> {
        let mut entries = BTreeMap::new();
        let mut failure: Option<(usize, serde_json::Error)> = None;
        let mut failures = 0usize;
        let mut line_count = 0usize;

        for (number, line) in text.lines().enumerate() {
            line_count += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SplitRecord>(trimmed) {
                Ok(record) => {
                    entries.insert(record.k, record.v);
                }
                Err(source) => {
                    failures += 1;
                    failure = Some((number + 1, source));
                }
            }
        }

        if let Some((line, source)) = failure {
            if failures == 1 && line == line_count {
                tracing::warn!(line, "ignoring incomplete trailing record");
            } else {
                return Err(PrecomputeError::MalformedLine { line, source });
            }
        }

        Ok(SplitTable { entries })
    }

    /// Loads a finalized JSON object file.
    pub fn from_json_str(text: &str) -> Result<SplitTable, PrecomputeError> {
        let entries: BTreeMap<String, f64> = serde_json::from_str(text)?;
        Ok(SplitTable { entries })
    }

    /// Renders the finalized JSON object file, keys sorted.
    pub fn to_json_string(&self) -> Result<String, PrecomputeError> {
        let mut rendered = serde_json::to_string_pretty(&self.entries)?;
        rendered.push('\n');
        Ok(rendered)
    }

    pub fn insert(&mut self, key: String, ev: f64) {
        self.entries.insert(key, ev);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(key, ev)| (key.as_str(), *ev))
    }

    /// Checks the table is complete: every expected key present with a
    /// finite value and nothing else.
    pub fn validate(&self) -> Result<(), PrecomputeError> {
        let expected = expected_keys();
        let expected_set: BTreeSet<&str> = expected.iter().map(String::as_str).collect();

        let missing: Vec<&String> = expected
            .iter()
            .filter(|key| !self.entries.contains_key(*key))
            .collect();
        if let Some(first) = missing.first() {
            return Err(PrecomputeError::MissingKeys {
                count: missing.len(),
                first: (*first).clone(),
            });
        }

        let extra: Vec<&String> = self
            .entries
            .keys()
            .filter(|key| !expected_set.contains(key.as_str()))
            .collect();
        if let Some(first) = extra.first() {
            return Err(PrecomputeError::ExtraKeys {
                count: extra.len(),
                first: (*first).clone(),
            });
        }

        let non_finite: Vec<&String> = self
            .entries
            .iter()
            .filter(|(_, ev)| !ev.is_finite())
            .map(|(key, _)| key)
            .collect();
        if let Some(first) = non_finite.first() {
            return Err(PrecomputeError::NonFiniteValues {
                count: non_finite.len(),
                first: (*first).clone(),
            });
        }

        Ok(())
    }
}
