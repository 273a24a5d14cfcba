use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Consent state: category name to grant flag.
///
/// A category that is absent is *unknown*, not denied. Lookups return `None`
/// for it so the evaluator can report the misconfiguration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsentState(BTreeMap<String, bool>);

impl ConsentState {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style grant/deny of a single category.
    pub fn with(mut self, category: impl Into<String>, granted: bool) -> Self {
        self.0.insert(category.into(), granted);
        self
    }

    /// Set a category, returning the previous value if it was known.
    pub fn set(&mut self, category: impl Into<String>, granted: bool) -> Option<bool> {
        self.0.insert(category.into(), granted)
    }

    pub fn get(&self, category: &str) -> Option<bool> {
        self.0.get(category).copied()
    }

    /// Categories currently granted, in name order.
    pub fn granted(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, granted)| (name.as_str(), *granted))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another state over this one; `other` wins on conflicts.
    pub fn merge(&mut self, other: &ConsentState) {
        for (name, granted) in other.iter() {
            self.0.insert(name.to_string(), granted);
        }
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for ConsentState {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let granted: Vec<&str> = self.granted().collect();
        write!(f, "[{}]", granted.join(","))
    }
}
