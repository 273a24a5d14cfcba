use std::collections::BTreeSet;

use consent_condition::extract_categories;
use consent_types::{ConsentState, IdentityMap};
use tracing::{debug, info};

use crate::document::DocumentEnvironment;
use crate::error::LoaderError;
use crate::loader::{ClearContext, ScriptLoader, UpdateOutcome};
use crate::script::Script;

/// A script set, its consent state and identity map kept together.
///
/// Every change to the script set or to consent re-runs
/// [`ScriptLoader::update_scripts`], which is what an embedding consent store
/// does on each change notification. The categories referenced by any
/// registered script accumulate in [`categories_in_use`](Self::categories_in_use).
pub struct ConsentSession<D: DocumentEnvironment> {
    loader: ScriptLoader<D>,
    scripts: Vec<Script>,
    consents: ConsentState,
    identities: IdentityMap,
    categories: BTreeSet<String>,
}

impl<D: DocumentEnvironment> ConsentSession<D> {
    pub fn new(loader: ScriptLoader<D>, consents: ConsentState) -> Self {
        Self {
            loader,
            scripts: Vec::new(),
            consents,
            identities: IdentityMap::new(),
            categories: BTreeSet::new(),
        }
    }

    pub fn loader(&self) -> &ScriptLoader<D> {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut ScriptLoader<D> {
        &mut self.loader
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn consents(&self) -> &ConsentState {
        &self.consents
    }

    pub fn identities(&self) -> &IdentityMap {
        &self.identities
    }

    /// Every category referenced by a script registered in this session.
    pub fn categories_in_use(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Replace the identity map, e.g. with one restored from storage.
    ///
    /// Only ids not yet assigned in the current map pick up the restored
    /// identities; ids already resolved keep theirs.
    pub fn restore_identities(&mut self, restored: IdentityMap) {
        let mut merged = restored;
        for (id, element_id) in self.identities.iter() {
            merged.get_or_assign(id, || element_id.to_string());
        }
        self.identities = merged;
    }

    /// Replace the script set.
    ///
    /// Loaded scripts missing from the new set, or whose content source
    /// changed, are removed first; changed ones load again from the new
    /// descriptor.
    ///
    /// # Errors
    ///
    /// Any [`LoaderError`] from removal or the following update.
    pub fn set_scripts(&mut self, scripts: Vec<Script>) -> Result<UpdateOutcome, LoaderError> {
        let stale: Vec<Script> = self
            .scripts
            .iter()
            .filter(|old| match scripts.iter().find(|new| new.id == old.id) {
                Some(new) => !same_source(old, new),
                None => true,
            })
            .cloned()
            .collect();
        let mut removed = Vec::new();
        for old in &stale {
            if self.retire(old)? {
                removed.push(old.id.clone());
            }
        }

        self.scripts = scripts;
        self.register_categories();
        self.update_after(removed)
    }

    /// Add scripts, replacing registered descriptors with the same id.
    ///
    /// A loaded script whose replacement changes the content source is
    /// removed and loaded again from the new descriptor. Other replacements
    /// keep the attached element.
    ///
    /// # Errors
    ///
    /// Any [`LoaderError`] from removal or the following update.
    pub fn add_scripts(&mut self, scripts: Vec<Script>) -> Result<UpdateOutcome, LoaderError> {
        let mut removed = Vec::new();
        for script in scripts {
            let Some(existing) = self.scripts.iter_mut().find(|s| s.id == script.id) else {
                self.scripts.push(script);
                continue;
            };
            let old = std::mem::replace(existing, script);
            if !same_source(&old, existing) && self.retire(&old)? {
                removed.push(old.id);
            }
        }
        self.register_categories();
        self.update_after(removed)
    }

    /// Deregister a script and unload it if loaded.
    ///
    /// Returns `false` when no script with `id` was registered.
    ///
    /// # Errors
    ///
    /// Condition and callback errors of the removed script.
    pub fn remove_script(&mut self, id: &str) -> Result<bool, LoaderError> {
        let Some(index) = self.scripts.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        let script = self.scripts.remove(index);
        self.loader
            .remove_script(&script, &self.consents, &mut self.identities)?;
        debug!(script_id = id, "Script deregistered");
        Ok(true)
    }

    /// Grant or revoke one category and apply the change.
    ///
    /// # Errors
    ///
    /// Any [`LoaderError`] from the update.
    pub fn set_consent(
        &mut self,
        category: impl Into<String>,
        granted: bool,
    ) -> Result<UpdateOutcome, LoaderError> {
        let category = category.into();
        let previous = self.consents.set(category.clone(), granted);
        if previous == Some(granted) {
            return Ok(UpdateOutcome::default());
        }
        info!(%category, granted, "Consent changed");
        self.update()
    }

    /// Replace the whole consent state and apply the change.
    ///
    /// # Errors
    ///
    /// Any [`LoaderError`] from the update.
    pub fn set_consents(&mut self, consents: ConsentState) -> Result<UpdateOutcome, LoaderError> {
        self.consents = consents;
        self.update()
    }

    /// Apply a partial consent update; categories absent from `changes` keep
    /// their current value.
    ///
    /// # Errors
    ///
    /// Any [`LoaderError`] from the update.
    pub fn merge_consents(&mut self, changes: &ConsentState) -> Result<UpdateOutcome, LoaderError> {
        self.consents.merge(changes);
        info!(changes = %changes, "Consent merged");
        self.update()
    }

    /// Re-run the loader against the current scripts and consent.
    ///
    /// # Errors
    ///
    /// Any [`LoaderError`] from the loader.
    pub fn update(&mut self) -> Result<UpdateOutcome, LoaderError> {
        self.loader
            .update_scripts(&self.scripts, &self.consents, &mut self.identities)
    }

    /// Reload one registered script.
    ///
    /// # Errors
    ///
    /// See [`ScriptLoader::reload_script`].
    pub fn reload(&mut self, id: &str) -> Result<bool, LoaderError> {
        self.loader
            .reload_script(id, &self.scripts, &self.consents, &mut self.identities)
    }

    /// Clear every loaded script, firing `on_delete` for registered ones.
    ///
    /// # Errors
    ///
    /// See [`ScriptLoader::clear_all_scripts`].
    pub fn teardown(&mut self) -> Result<Vec<String>, LoaderError> {
        self.loader.clear_all_scripts(Some(ClearContext {
            scripts: &self.scripts,
            consents: &self.consents,
            identities: &mut self.identities,
        }))
    }

    /// Force-unload a replaced descriptor, detaching its element even when
    /// it persists after revocation.
    fn retire(&mut self, old: &Script) -> Result<bool, LoaderError> {
        let element = self.loader.registry().get(&old.id).flatten();
        let removed = self
            .loader
            .remove_script(old, &self.consents, &mut self.identities)?;
        if let Some(handle) = element {
            self.loader.document_mut().detach(handle);
        }
        Ok(removed)
    }

    fn update_after(&mut self, mut removed: Vec<String>) -> Result<UpdateOutcome, LoaderError> {
        let mut outcome = self.update()?;
        removed.append(&mut outcome.unloaded);
        outcome.unloaded = removed;
        Ok(outcome)
    }

    fn register_categories(&mut self) {
        for script in &self.scripts {
            self.categories.extend(extract_categories(&script.condition));
        }
    }
}

fn same_source(a: &Script, b: &Script) -> bool {
    a.src == b.src && a.text_content == b.text_content && a.callback_only == b.callback_only
}
