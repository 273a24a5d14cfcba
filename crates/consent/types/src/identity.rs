use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Caller-owned mapping from a script id to its anonymized element identity.
///
/// The loader reads it and fills it lazily. Entries are never rewritten once
/// assigned, so a map restored from storage keeps identities stable across
/// sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityMap(BTreeMap<String, String>);

impl IdentityMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, script_id: &str) -> Option<&str> {
        self.0.get(script_id).map(String::as_str)
    }

    /// Return the identity for `script_id`, assigning it with `generate` on
    /// first use.
    pub fn get_or_assign(
        &mut self,
        script_id: &str,
        generate: impl FnOnce() -> String,
    ) -> &str {
        self.0
            .entry(script_id.to_string())
            .or_insert_with(generate)
            .as_str()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
