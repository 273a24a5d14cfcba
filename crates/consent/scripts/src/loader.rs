use consent_condition::evaluate;
use consent_types::{ConsentState, ElementHandle, IdentityMap, ScriptCallbackInfo, ScriptTarget};
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::document::{DocumentEnvironment, ScriptElement};
use crate::error::{CallbackError, ConfigError, LoaderError};
use crate::identity::IdentityAnonymizer;
use crate::registry::ScriptRegistry;
use crate::script::{CallbackSlot, Script, ScriptCallback, ScriptSource};

/// Ids that changed state during one [`ScriptLoader::update_scripts`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub loaded: Vec<String>,
    pub unloaded: Vec<String>,
}

impl UpdateOutcome {
    /// True when nothing was loaded or unloaded.
    pub fn is_unchanged(&self) -> bool {
        self.loaded.is_empty() && self.unloaded.is_empty()
    }
}

/// Descriptor context for [`ScriptLoader::clear_all_scripts`].
///
/// Without it clearing detaches every element and fires no callbacks.
pub struct ClearContext<'a> {
    pub scripts: &'a [Script],
    pub consents: &'a ConsentState,
    pub identities: &'a mut IdentityMap,
}

/// Script lifecycle engine.
///
/// Each script id is either unloaded (no registry entry) or loaded (entry
/// present). Every operation runs to completion on the calling thread; the
/// only later work is what the document environment dispatches
/// (deferred inline `on_load`, native completion and failure).
pub struct ScriptLoader<D: DocumentEnvironment> {
    document: D,
    registry: ScriptRegistry,
    anonymizer: IdentityAnonymizer,
    default_target: ScriptTarget,
}

impl<D: DocumentEnvironment> ScriptLoader<D> {
    pub fn new(document: D) -> Self {
        let config = LoaderConfig::default();
        Self {
            document,
            registry: ScriptRegistry::new(),
            anonymizer: IdentityAnonymizer::new(&config.identity),
            default_target: config.default_target,
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when `config` fails validation.
    pub fn with_config(document: D, config: &LoaderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            document,
            registry: ScriptRegistry::new(),
            anonymizer: IdentityAnonymizer::new(&config.identity),
            default_target: config.default_target,
        })
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn anonymizer(&self) -> &IdentityAnonymizer {
        &self.anonymizer
    }

    pub fn is_script_loaded(&self, id: &str) -> bool {
        self.registry.is_loaded(id)
    }

    pub fn loaded_script_ids(&self) -> Vec<String> {
        self.registry.loaded_ids()
    }

    /// Load every script whose condition holds (or that sets `always_load`).
    ///
    /// Already loaded scripts are not attached again; they receive
    /// `on_consent_change` instead. Returns the ids loaded by this call.
    ///
    /// # Errors
    ///
    /// Condition, source and callback errors abort at the offending script.
    pub fn load_scripts(
        &mut self,
        scripts: &[Script],
        consents: &ConsentState,
        identities: &mut IdentityMap,
    ) -> Result<Vec<String>, LoaderError> {
        let mut loaded = Vec::new();
        for script in scripts {
            if self.load_one(script, consents, identities)? {
                loaded.push(script.id.clone());
            }
        }
        Ok(loaded)
    }

    /// Unload every loaded script whose condition no longer holds.
    ///
    /// `always_load` scripts are never unloaded here. Persistent scripts leave
    /// their element attached. Returns the ids unloaded by this call.
    ///
    /// # Errors
    ///
    /// Condition and callback errors abort at the offending script.
    pub fn unload_scripts(
        &mut self,
        scripts: &[Script],
        consents: &ConsentState,
        identities: &mut IdentityMap,
    ) -> Result<Vec<String>, LoaderError> {
        let mut unloaded = Vec::new();
        for script in scripts {
            if self.unload_one(script, consents, identities, false)? {
                unloaded.push(script.id.clone());
            }
        }
        Ok(unloaded)
    }

    /// Unload then load over the whole set.
    ///
    /// # Errors
    ///
    /// See [`unload_scripts`](Self::unload_scripts) and
    /// [`load_scripts`](Self::load_scripts).
    pub fn update_scripts(
        &mut self,
        scripts: &[Script],
        consents: &ConsentState,
        identities: &mut IdentityMap,
    ) -> Result<UpdateOutcome, LoaderError> {
        let unloaded = self.unload_scripts(scripts, consents, identities)?;
        let loaded = self.load_scripts(scripts, consents, identities)?;
        if !loaded.is_empty() || !unloaded.is_empty() {
            info!(
                loaded = loaded.len(),
                unloaded = unloaded.len(),
                consents = %consents,
                "Scripts updated"
            );
        }
        Ok(UpdateOutcome { loaded, unloaded })
    }

    /// Remove the script (if loaded) and load it again when its condition
    /// holds.
    ///
    /// Returns `false` for an unknown id, or when the condition does not hold
    /// and no load was attempted.
    ///
    /// # Errors
    ///
    /// Condition, source and callback errors of the reloaded script.
    pub fn reload_script(
        &mut self,
        id: &str,
        scripts: &[Script],
        consents: &ConsentState,
        identities: &mut IdentityMap,
    ) -> Result<bool, LoaderError> {
        let Some(script) = scripts.iter().find(|s| s.id == id) else {
            debug!(script_id = id, "Reload requested for unknown script");
            return Ok(false);
        };
        let has_consent = evaluate_gate(script, consents)?;

        if self.registry.is_loaded(id) {
            self.unload_one(script, consents, identities, true)?;
        }
        if !has_consent && !script.always_load {
            debug!(script_id = id, "Reload skipped, consent not granted");
            return Ok(false);
        }
        self.load_one(script, consents, identities)?;
        Ok(true)
    }

    /// Unload one script regardless of its condition.
    ///
    /// Returns `false` when the script was not loaded.
    ///
    /// # Errors
    ///
    /// Condition and callback errors of the script.
    pub fn remove_script(
        &mut self,
        script: &Script,
        consents: &ConsentState,
        identities: &mut IdentityMap,
    ) -> Result<bool, LoaderError> {
        self.unload_one(script, consents, identities, true)
    }

    /// Tear down every loaded script and empty the registry.
    ///
    /// With a context, `on_delete` fires for each id whose descriptor is in
    /// `context.scripts` and persistent elements stay attached. Without one,
    /// every element is detached silently. The registry is emptied even when
    /// a condition or callback fails; the first error is returned afterwards.
    ///
    /// # Errors
    ///
    /// The first [`LoaderError::Condition`] or [`LoaderError::Callback`]
    /// raised during teardown.
    pub fn clear_all_scripts(
        &mut self,
        mut context: Option<ClearContext<'_>>,
    ) -> Result<Vec<String>, LoaderError> {
        let mut cleared = Vec::new();
        let mut first_error = None;

        for (id, element) in self.registry.drain() {
            let mut persist = false;
            if let Some(ctx) = context.as_mut() {
                let scripts = ctx.scripts;
                if let Some(script) = scripts.iter().find(|s| s.id == id) {
                    persist = script.persist_after_consent_revoked;
                    let element_id =
                        self.anonymizer
                            .resolve(&script.id, script.anonymize_id, ctx.identities);
                    let has_consent = match evaluate_gate(script, ctx.consents) {
                        Ok(granted) => granted,
                        Err(err) => {
                            first_error.get_or_insert(err);
                            false
                        }
                    };
                    let info = ScriptCallbackInfo::new(
                        &script.id,
                        element_id,
                        has_consent,
                        ctx.consents.clone(),
                    )
                    .with_element(element);
                    if let Err(err) = fire(script, CallbackSlot::OnDelete, &info) {
                        first_error.get_or_insert(err);
                    }
                }
            }
            if !persist {
                if let Some(handle) = element {
                    self.document.detach(handle);
                }
            }
            cleared.push(id);
        }

        info!(cleared = cleared.len(), "Cleared all scripts");
        match first_error {
            Some(err) => Err(err),
            None => Ok(cleared),
        }
    }

    // ── Single-script steps ─────────────────────────────────────────

    fn load_one(
        &mut self,
        script: &Script,
        consents: &ConsentState,
        identities: &mut IdentityMap,
    ) -> Result<bool, LoaderError> {
        let has_consent = evaluate_gate(script, consents)?;

        if let Some(element) = self.registry.get(&script.id) {
            let element_id = self
                .anonymizer
                .resolve(&script.id, script.anonymize_id, identities);
            let info = ScriptCallbackInfo::new(&script.id, element_id, has_consent, consents.clone())
                .with_element(element);
            fire(script, CallbackSlot::OnConsentChange, &info)?;
            return Ok(false);
        }

        if !has_consent && !script.always_load {
            debug!(script_id = %script.id, condition = %script.condition, "Consent not granted, skipping");
            return Ok(false);
        }

        let source = script.source()?;
        let element_id = self
            .anonymizer
            .resolve(&script.id, script.anonymize_id, identities);
        let base = ScriptCallbackInfo::new(&script.id, element_id.clone(), has_consent, consents.clone());

        if source == ScriptSource::CallbackOnly {
            fire(script, CallbackSlot::OnBeforeLoad, &base)?;
            fire(script, CallbackSlot::OnLoad, &base)?;
            self.registry.insert(script.id.clone(), None);
            info!(script_id = %script.id, "Callback-only script loaded");
            return Ok(true);
        }

        if script.persist_after_consent_revoked {
            if let Some(handle) = self.document.find_by_identity(&element_id) {
                let info = base.with_element(Some(handle));
                fire(script, CallbackSlot::OnConsentChange, &info)?;
                fire(script, CallbackSlot::OnLoad, &info)?;
                self.registry.insert(script.id.clone(), Some(handle));
                debug!(script_id = %script.id, %element_id, "Adopted persisted element");
                return Ok(true);
            }
        }

        let (src, text_content) = match source {
            ScriptSource::External(src) => (Some(src.to_string()), None),
            ScriptSource::Inline(text) => (None, Some(text.to_string())),
            ScriptSource::CallbackOnly => (None, None),
        };
        let handle = self.document.create_script(ScriptElement {
            element_id: element_id.clone(),
            src,
            text_content,
            hints: script.hints.clone(),
        });
        let info = base.with_element(Some(handle));
        // Wired after `on_before_load` so a rejected element reports nothing more.
        fire(script, CallbackSlot::OnBeforeLoad, &info)?;
        self.wire_completion(script, source, handle, &info);
        let target = script.target.unwrap_or(self.default_target);
        self.document.attach(handle, target);
        self.registry.insert(script.id.clone(), Some(handle));
        info!(
            script_id = %script.id,
            %element_id,
            %target,
            persist = script.persist_after_consent_revoked,
            "Script loaded"
        );
        Ok(true)
    }

    fn unload_one(
        &mut self,
        script: &Script,
        consents: &ConsentState,
        identities: &mut IdentityMap,
        force: bool,
    ) -> Result<bool, LoaderError> {
        let Some(element) = self.registry.get(&script.id) else {
            return Ok(false);
        };
        let has_consent = evaluate_gate(script, consents)?;
        if !force {
            if script.always_load {
                debug!(script_id = %script.id, "Always-load script kept");
                return Ok(false);
            }
            if has_consent {
                return Ok(false);
            }
        }

        let element_id = self
            .anonymizer
            .resolve(&script.id, script.anonymize_id, identities);
        let info = ScriptCallbackInfo::new(&script.id, element_id, has_consent, consents.clone())
            .with_element(element);
        fire(script, CallbackSlot::OnDelete, &info)?;

        if !script.persist_after_consent_revoked {
            if let Some(handle) = element {
                self.document.detach(handle);
            }
        }
        self.registry.remove(&script.id);
        info!(
            script_id = %script.id,
            persist = script.persist_after_consent_revoked,
            "Script unloaded"
        );
        Ok(true)
    }

    /// Route `on_load` / `on_error` through the environment.
    ///
    /// Inline content has no native completion event, so its `on_load` is
    /// deferred to the next tick.
    fn wire_completion(
        &mut self,
        script: &Script,
        source: ScriptSource<'_>,
        handle: ElementHandle,
        info: &ScriptCallbackInfo,
    ) {
        match source {
            ScriptSource::Inline(_) => {
                if let Some(on_load) = script.callbacks.on_load.clone() {
                    let info = info.clone();
                    self.document
                        .defer(Box::new(move || dispatch(&on_load, CallbackSlot::OnLoad, &info)));
                }
            }
            ScriptSource::External(_) => {
                if let Some(on_load) = script.callbacks.on_load.clone() {
                    let info = info.clone();
                    self.document.on_complete(
                        handle,
                        Box::new(move || dispatch(&on_load, CallbackSlot::OnLoad, &info)),
                    );
                }
                if let Some(on_error) = script.callbacks.on_error.clone() {
                    let info = info.clone();
                    self.document.on_fail(
                        handle,
                        Box::new(move |failure| {
                            warn!(script_id = %info.id, error = %failure, "Script failed to load");
                            let info = info.with_error(failure);
                            dispatch(&on_error, CallbackSlot::OnError, &info)
                        }),
                    );
                }
            }
            ScriptSource::CallbackOnly => {}
        }
    }
}

fn evaluate_gate(script: &Script, consents: &ConsentState) -> Result<bool, LoaderError> {
    evaluate(&script.condition, consents).map_err(|source| {
        warn!(script_id = %script.id, error = %source, "Invalid script condition");
        LoaderError::Condition {
            id: script.id.clone(),
            source,
        }
    })
}

/// Run a descriptor callback synchronously.
fn fire(script: &Script, slot: CallbackSlot, info: &ScriptCallbackInfo) -> Result<(), LoaderError> {
    match script.callbacks.get(slot) {
        Some(callback) => callback(info).map_err(|source| LoaderError::Callback {
            id: script.id.clone(),
            slot,
            source,
        }),
        None => Ok(()),
    }
}

/// Run a callback from an environment listener, naming the script on error.
fn dispatch(
    callback: &ScriptCallback,
    slot: CallbackSlot,
    info: &ScriptCallbackInfo,
) -> Result<(), CallbackError> {
    callback(info).map_err(|source| {
        Box::new(LoaderError::Callback {
            id: info.id.clone(),
            slot,
            source,
        }) as CallbackError
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use consent_types::LoadFailure;

    use super::*;
    use crate::memory::MemoryDocument;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorded(script: Script, log: &Log) -> Script {
        let slots = [
            CallbackSlot::OnBeforeLoad,
            CallbackSlot::OnLoad,
            CallbackSlot::OnError,
            CallbackSlot::OnDelete,
            CallbackSlot::OnConsentChange,
        ];
        slots.into_iter().fold(script, |script, slot| {
            let log = Rc::clone(log);
            script.with_callback(slot, move |info| {
                log.borrow_mut().push(format!("{}:{slot}", info.id));
                Ok(())
            })
        })
    }

    fn consents(marketing: bool) -> ConsentState {
        ConsentState::new()
            .with("necessary", true)
            .with("marketing", marketing)
    }

    fn loader() -> ScriptLoader<MemoryDocument> {
        ScriptLoader::new(MemoryDocument::new())
    }

    #[test]
    fn callback_only_fires_before_load_then_load_without_element() {
        let log: Log = Rc::default();
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let script = recorded(Script::callback_only("sync", "necessary"), &log)
            .on_load(move |info| {
                *s.borrow_mut() = Some(info.clone());
                Ok(())
            });

        let mut loader = loader();
        let mut ids = IdentityMap::new();
        let loaded = loader
            .load_scripts(&[script], &consents(false), &mut ids)
            .unwrap();

        assert_eq!(loaded, vec!["sync"]);
        assert_eq!(log.borrow().as_slice(), ["sync:on_before_load"]);
        let info = seen.borrow().clone().unwrap();
        assert_eq!(info.element, None);
        assert!(info.has_consent);
        assert_eq!(loader.registry().get("sync"), Some(None));
        assert_eq!(loader.document().created_count(), 0);
    }

    #[test]
    fn external_script_reports_load_and_error_through_environment() {
        let log: Log = Rc::default();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&errors);
        let ok = recorded(Script::external("ok", "https://example.test/ok.js", "necessary"), &log);
        let bad = Script::external("bad", "https://example.test/bad.js", "necessary").on_error(
            move |info| {
                e.borrow_mut().push(info.error.clone());
                Ok(())
            },
        );

        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader
            .load_scripts(&[ok, bad], &consents(false), &mut ids)
            .unwrap();
        assert_eq!(log.borrow().as_slice(), ["ok:on_before_load"]);

        let ok_handle = loader.registry().get("ok").flatten().unwrap();
        let bad_handle = loader.registry().get("bad").flatten().unwrap();
        loader.document_mut().complete(ok_handle).unwrap();
        loader
            .document_mut()
            .fail(bad_handle, LoadFailure::new("net::ERR_BLOCKED_BY_CLIENT"))
            .unwrap();

        assert_eq!(log.borrow().as_slice(), ["ok:on_before_load", "ok:on_load"]);
        assert_eq!(
            errors.borrow().as_slice(),
            [Some(LoadFailure::new("net::ERR_BLOCKED_BY_CLIENT"))]
        );
        assert!(loader.is_script_loaded("bad"));
    }

    #[test]
    fn inline_script_defers_on_load() {
        let log: Log = Rc::default();
        let script = recorded(Script::inline("inline", "window.x = 1", "necessary"), &log);

        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader
            .load_scripts(&[script], &consents(false), &mut ids)
            .unwrap();
        assert_eq!(log.borrow().as_slice(), ["inline:on_before_load"]);
        assert_eq!(loader.document().pending_tasks(), 1);

        loader.document_mut().run_deferred().unwrap();
        assert_eq!(log.borrow().as_slice(), ["inline:on_before_load", "inline:on_load"]);
    }

    #[test]
    fn element_carries_identity_and_hints() {
        let script = Script::external("gtm", "https://example.test/gtm.js", "necessary")
            .with_anonymized_id(false)
            .with_target(ScriptTarget::Body)
            .with_hints(crate::script::LoadingHints {
                async_load: true,
                nonce: Some("n0nce".into()),
                ..Default::default()
            })
            .with_attribute("data-layer", "dl");

        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader
            .load_scripts(&[script], &consents(false), &mut ids)
            .unwrap();

        let handle = loader.registry().get("gtm").flatten().unwrap();
        let element = loader.document().element(handle).unwrap();
        assert_eq!(element.element_id, "consent-script-gtm");
        assert!(element.hints.async_load);
        assert_eq!(element.hints.nonce.as_deref(), Some("n0nce"));
        assert_eq!(
            element.hints.attributes.get("data-layer").map(String::as_str),
            Some("dl")
        );
        assert_eq!(loader.document().target_of(handle), Some(ScriptTarget::Body));
        assert!(ids.is_empty());
    }

    #[test]
    fn default_target_comes_from_config() {
        let config = LoaderConfig::from_json(r#"{"defaultTarget":"body"}"#).unwrap();
        let mut loader = ScriptLoader::with_config(MemoryDocument::new(), &config).unwrap();
        let mut ids = IdentityMap::new();
        loader
            .load_scripts(
                &[Script::external("a", "https://example.test/a.js", "necessary")],
                &consents(false),
                &mut ids,
            )
            .unwrap();
        let handle = loader.registry().get("a").flatten().unwrap();
        assert_eq!(loader.document().target_of(handle), Some(ScriptTarget::Body));
    }

    #[test]
    fn always_load_bypasses_gating_and_survives_revocation() {
        let script =
            Script::external("essential", "https://example.test/e.js", "marketing").with_always_load();
        let mut loader = loader();
        let mut ids = IdentityMap::new();

        let outcome = loader
            .update_scripts(std::slice::from_ref(&script), &consents(false), &mut ids)
            .unwrap();
        assert_eq!(outcome.loaded, vec!["essential"]);

        let outcome = loader
            .update_scripts(&[script], &consents(false), &mut ids)
            .unwrap();
        assert!(outcome.is_unchanged());
        assert!(loader.is_script_loaded("essential"));
    }

    #[test]
    fn condition_error_names_script_and_stops_batch() {
        let scripts = [
            Script::external("first", "https://example.test/1.js", "necessary"),
            Script::external("broken", "https://example.test/2.js", "experience"),
            Script::external("never", "https://example.test/3.js", "necessary"),
        ];
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        let err = loader
            .load_scripts(&scripts, &consents(false), &mut ids)
            .unwrap_err();

        assert!(matches!(err, LoaderError::Condition { ref id, .. } if id == "broken"));
        assert!(loader.is_script_loaded("first"));
        assert!(!loader.is_script_loaded("never"));
    }

    #[test]
    fn callback_error_propagates_with_slot() {
        let script = Script::external("a", "https://example.test/a.js", "necessary")
            .on_before_load(|_| Err("rejected".into()));
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        let err = loader
            .load_scripts(&[script], &consents(false), &mut ids)
            .unwrap_err();
        match err {
            LoaderError::Callback { id, slot, source } => {
                assert_eq!(id, "a");
                assert_eq!(slot, CallbackSlot::OnBeforeLoad);
                assert_eq!(source.to_string(), "rejected");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!loader.is_script_loaded("a"));
        assert_eq!(loader.document().attached_count(), 0);
    }

    #[test]
    fn rejected_before_load_never_reports_load() {
        let log: Log = Rc::default();
        let scripts = [
            recorded(Script::inline("inline", "x()", "necessary"), &log)
                .on_before_load(|_| Err("veto".into())),
            recorded(Script::external("ext", "https://example.test/e.js", "necessary"), &log)
                .on_before_load(|_| Err("veto".into())),
        ];
        let mut loader = loader();
        let mut ids = IdentityMap::new();

        for script in &scripts {
            let err = loader
                .load_scripts(std::slice::from_ref(script), &consents(false), &mut ids)
                .unwrap_err();
            assert_eq!(err.script_id(), script.id);
        }
        assert_eq!(loader.document().pending_tasks(), 0);
        assert_eq!(loader.document_mut().run_deferred().unwrap(), 0);

        let ext = ElementHandle(2);
        loader.document_mut().complete(ext).unwrap();
        loader
            .document_mut()
            .fail(ext, LoadFailure::new("late"))
            .unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(loader.document().attached_count(), 0);
        assert!(loader.loaded_script_ids().is_empty());
    }

    #[test]
    fn clear_reports_condition_error_after_teardown() {
        let scripts = [
            Script::callback_only("a", "marketing"),
            Script::external("b", "https://example.test/b.js", "necessary"),
        ];
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader.load_scripts(&scripts, &consents(true), &mut ids).unwrap();

        let partial = ConsentState::new().with("necessary", true);
        let err = loader
            .clear_all_scripts(Some(ClearContext {
                scripts: &scripts,
                consents: &partial,
                identities: &mut ids,
            }))
            .unwrap_err();

        assert!(matches!(err, LoaderError::Condition { ref id, .. } if id == "a"));
        assert!(loader.registry().is_empty());
        assert_eq!(loader.document().attached_count(), 0);
    }

    #[test]
    fn deferred_callback_error_names_script() {
        let script = Script::inline("inline", "x()", "necessary").on_load(|_| Err("boom".into()));
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader
            .load_scripts(&[script], &consents(false), &mut ids)
            .unwrap();
        let err = loader.document_mut().run_deferred().unwrap_err();
        assert!(err.to_string().contains("`inline`"));
        assert!(err.to_string().contains("on_load"));
    }

    #[test]
    fn reload_recreates_granted_script() {
        let log: Log = Rc::default();
        let scripts = [recorded(
            Script::external("a", "https://example.test/a.js", "necessary"),
            &log,
        )];
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader.load_scripts(&scripts, &consents(false), &mut ids).unwrap();
        let first = loader.registry().get("a").flatten().unwrap();

        assert!(loader
            .reload_script("a", &scripts, &consents(false), &mut ids)
            .unwrap());
        let second = loader.registry().get("a").flatten().unwrap();

        assert_ne!(first, second);
        assert!(!loader.document().is_attached(first));
        assert!(loader.document().is_attached(second));
        assert_eq!(
            log.borrow().as_slice(),
            ["a:on_before_load", "a:on_delete", "a:on_before_load"]
        );
    }

    #[test]
    fn reload_of_revoked_script_unloads_and_returns_false() {
        let scripts = [Script::external("pixel", "https://example.test/p.js", "marketing")];
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader.load_scripts(&scripts, &consents(true), &mut ids).unwrap();

        assert!(!loader
            .reload_script("pixel", &scripts, &consents(false), &mut ids)
            .unwrap());
        assert!(!loader.is_script_loaded("pixel"));
        assert_eq!(loader.document().attached_count(), 0);
    }

    #[test]
    fn clear_without_context_detaches_everything_silently() {
        let log: Log = Rc::default();
        let scripts = [
            recorded(
                Script::external("p", "https://example.test/p.js", "necessary")
                    .persist_after_revocation(),
                &log,
            ),
            recorded(Script::callback_only("cb", "necessary"), &log),
        ];
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        loader.load_scripts(&scripts, &consents(false), &mut ids).unwrap();
        log.borrow_mut().clear();

        let cleared = loader.clear_all_scripts(None).unwrap();
        assert_eq!(cleared, vec!["cb", "p"]);
        assert!(log.borrow().is_empty());
        assert_eq!(loader.document().attached_count(), 0);
        assert!(loader.loaded_script_ids().is_empty());
    }

    #[test]
    fn clear_with_context_fires_on_delete_and_keeps_persistent_elements() {
        let log: Log = Rc::default();
        let scripts = [
            recorded(
                Script::external("p", "https://example.test/p.js", "necessary")
                    .persist_after_revocation(),
                &log,
            ),
            recorded(Script::external("n", "https://example.test/n.js", "necessary"), &log),
        ];
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        let state = consents(false);
        loader.load_scripts(&scripts, &state, &mut ids).unwrap();
        let persistent = loader.registry().get("p").flatten().unwrap();
        log.borrow_mut().clear();

        loader
            .clear_all_scripts(Some(ClearContext {
                scripts: &scripts,
                consents: &state,
                identities: &mut ids,
            }))
            .unwrap();

        assert_eq!(log.borrow().as_slice(), ["n:on_delete", "p:on_delete"]);
        assert_eq!(loader.document().attached(), vec![persistent]);
        assert!(loader.registry().is_empty());
    }

    #[test]
    fn clear_empties_registry_even_when_callback_fails() {
        let scripts = [
            Script::callback_only("a", "necessary").on_delete(|_| Err("first".into())),
            Script::callback_only("b", "necessary").on_delete(|_| Err("second".into())),
        ];
        let mut loader = loader();
        let mut ids = IdentityMap::new();
        let state = consents(false);
        loader.load_scripts(&scripts, &state, &mut ids).unwrap();

        let err = loader
            .clear_all_scripts(Some(ClearContext {
                scripts: &scripts,
                consents: &state,
                identities: &mut ids,
            }))
            .unwrap_err();
        assert_eq!(err.script_id(), "a");
        assert!(loader.registry().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = LoaderConfig::default();
        config.identity.token_length = 0;
        assert!(ScriptLoader::with_config(MemoryDocument::new(), &config).is_err());
    }
}
