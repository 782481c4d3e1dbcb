use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    hash::Hash,
};

use serde::Serialize;

/// Named field errors collected during validation.
///
/// Only the first failure registered for a key is kept, so later checks on an
/// already broken field do not overwrite the more fundamental message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.entry(key.into()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add(key, message);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|m| m.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Records every error of a garde report, keyed by the field path.
    pub fn merge_report(&mut self, report: &garde::Report) {
        for (path, error) in report.iter() {
            let key = path.to_string();
            let key = if key.is_empty() { "value".to_string() } else { key };
            self.add(key, error.message());
        }
    }
}

impl From<garde::Report> for FieldErrors {
    fn from(report: garde::Report) -> Self {
        let mut errors = FieldErrors::new();
        errors.merge_report(&report);
        errors
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (key, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{key}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

pub fn unique<T: Eq + Hash>(items: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().all(|i| seen.insert(i))
}
