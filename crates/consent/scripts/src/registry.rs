use std::collections::BTreeMap;

use consent_types::ElementHandle;

/// Loaded-script table owned by one loader.
///
/// Presence of an id means the script is loaded. The value is the attached
/// element, or `None` for callback-only scripts.
#[derive(Clone, Debug, Default)]
pub struct ScriptRegistry {
    entries: BTreeMap<String, Option<ElementHandle>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Record `id` as loaded, returning the previous entry if one existed.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        element: Option<ElementHandle>,
    ) -> Option<Option<ElementHandle>> {
        self.entries.insert(id.into(), element)
    }

    pub fn remove(&mut self, id: &str) -> Option<Option<ElementHandle>> {
        self.entries.remove(id)
    }

    /// `None` when not loaded; `Some(None)` for a loaded callback-only script.
    pub fn get(&self, id: &str) -> Option<Option<ElementHandle>> {
        self.entries.get(id).copied()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Loaded ids in lexical order.
    pub fn loaded_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Remove every entry, returning them in lexical id order.
    pub fn drain(&mut self) -> Vec<(String, Option<ElementHandle>)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
