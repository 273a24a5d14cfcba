use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use consent_condition::ConsentCondition;
use consent_types::{FetchPriority, ScriptCallbackInfo, ScriptTarget};
use serde::{Deserialize, Serialize};

use crate::error::{CallbackResult, LoaderError};

/// Typed handler for one callback slot.
///
/// Handlers run on the caller's thread; an `Err` aborts the operation that
/// fired it and is returned to the caller.
pub type ScriptCallback = Rc<dyn Fn(&ScriptCallbackInfo) -> CallbackResult>;

/// The five callback slots of a script descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackSlot {
    OnBeforeLoad,
    OnLoad,
    OnError,
    OnDelete,
    OnConsentChange,
}

impl fmt::Display for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackSlot::OnBeforeLoad => "on_before_load",
            CallbackSlot::OnLoad => "on_load",
            CallbackSlot::OnError => "on_error",
            CallbackSlot::OnDelete => "on_delete",
            CallbackSlot::OnConsentChange => "on_consent_change",
        };
        write!(f, "{name}")
    }
}

/// Callback handlers attached to a script.
#[derive(Clone, Default)]
pub struct ScriptCallbacks {
    pub on_before_load: Option<ScriptCallback>,
    pub on_load: Option<ScriptCallback>,
    pub on_error: Option<ScriptCallback>,
    pub on_delete: Option<ScriptCallback>,
    pub on_consent_change: Option<ScriptCallback>,
}

impl ScriptCallbacks {
    pub fn get(&self, slot: CallbackSlot) -> Option<&ScriptCallback> {
        match slot {
            CallbackSlot::OnBeforeLoad => self.on_before_load.as_ref(),
            CallbackSlot::OnLoad => self.on_load.as_ref(),
            CallbackSlot::OnError => self.on_error.as_ref(),
            CallbackSlot::OnDelete => self.on_delete.as_ref(),
            CallbackSlot::OnConsentChange => self.on_consent_change.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: CallbackSlot) -> &mut Option<ScriptCallback> {
        match slot {
            CallbackSlot::OnBeforeLoad => &mut self.on_before_load,
            CallbackSlot::OnLoad => &mut self.on_load,
            CallbackSlot::OnError => &mut self.on_error,
            CallbackSlot::OnDelete => &mut self.on_delete,
            CallbackSlot::OnConsentChange => &mut self.on_consent_change,
        }
    }
}

impl fmt::Debug for ScriptCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCallbacks")
            .field("on_before_load", &self.on_before_load.is_some())
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .field("on_consent_change", &self.on_consent_change.is_some())
            .finish()
    }
}

/// Loading hints applied to a created element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadingHints {
    pub fetch_priority: Option<FetchPriority>,
    #[serde(rename = "async")]
    pub async_load: bool,
    pub defer: bool,
    pub nonce: Option<String>,
    pub integrity: Option<String>,
    pub cross_origin: Option<String>,
    /// Extra attributes copied verbatim onto the element.
    pub attributes: BTreeMap<String, String>,
}

/// The validated content source of a script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptSource<'a> {
    External(&'a str),
    Inline(&'a str),
    CallbackOnly,
}

/// A consent-gated script descriptor.
///
/// Exactly one of `src`, `text_content` and `callback_only` must be set. This
/// is checked by [`Script::source`] when the script is loaded, not here.
#[derive(Clone, Debug)]
pub struct Script {
    pub id: String,
    pub src: Option<String>,
    pub text_content: Option<String>,
    pub callback_only: bool,
    pub condition: ConsentCondition,
    /// Use a random element identity instead of the prefixed id.
    pub anonymize_id: bool,
    /// Leave the element attached when consent is revoked.
    pub persist_after_consent_revoked: bool,
    /// Load regardless of the condition, and never unload on revocation.
    pub always_load: bool,
    /// `None` uses the loader's default target.
    pub target: Option<ScriptTarget>,
    pub hints: LoadingHints,
    pub callbacks: ScriptCallbacks,
}

impl Script {
    /// A descriptor with no content source yet.
    pub fn new(id: impl Into<String>, condition: impl Into<ConsentCondition>) -> Self {
        Self {
            id: id.into(),
            src: None,
            text_content: None,
            callback_only: false,
            condition: condition.into(),
            anonymize_id: true,
            persist_after_consent_revoked: false,
            always_load: false,
            target: None,
            hints: LoadingHints::default(),
            callbacks: ScriptCallbacks::default(),
        }
    }

    pub fn external(
        id: impl Into<String>,
        src: impl Into<String>,
        condition: impl Into<ConsentCondition>,
    ) -> Self {
        let mut script = Self::new(id, condition);
        script.src = Some(src.into());
        script
    }

    pub fn inline(
        id: impl Into<String>,
        text_content: impl Into<String>,
        condition: impl Into<ConsentCondition>,
    ) -> Self {
        let mut script = Self::new(id, condition);
        script.text_content = Some(text_content.into());
        script
    }

    pub fn callback_only(id: impl Into<String>, condition: impl Into<ConsentCondition>) -> Self {
        let mut script = Self::new(id, condition);
        script.callback_only = true;
        script
    }

    pub fn with_anonymized_id(mut self, anonymize: bool) -> Self {
        self.anonymize_id = anonymize;
        self
    }

    pub fn persist_after_revocation(mut self) -> Self {
        self.persist_after_consent_revoked = true;
        self
    }

    pub fn with_always_load(mut self) -> Self {
        self.always_load = true;
        self
    }

    pub fn with_target(mut self, target: ScriptTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_hints(mut self, hints: LoadingHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.hints.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_callback(
        mut self,
        slot: CallbackSlot,
        callback: impl Fn(&ScriptCallbackInfo) -> CallbackResult + 'static,
    ) -> Self {
        *self.callbacks.slot_mut(slot) = Some(Rc::new(callback));
        self
    }

    pub fn on_before_load(
        self,
        callback: impl Fn(&ScriptCallbackInfo) -> CallbackResult + 'static,
    ) -> Self {
        self.with_callback(CallbackSlot::OnBeforeLoad, callback)
    }

    pub fn on_load(self, callback: impl Fn(&ScriptCallbackInfo) -> CallbackResult + 'static) -> Self {
        self.with_callback(CallbackSlot::OnLoad, callback)
    }

    pub fn on_error(
        self,
        callback: impl Fn(&ScriptCallbackInfo) -> CallbackResult + 'static,
    ) -> Self {
        self.with_callback(CallbackSlot::OnError, callback)
    }

    pub fn on_delete(
        self,
        callback: impl Fn(&ScriptCallbackInfo) -> CallbackResult + 'static,
    ) -> Self {
        self.with_callback(CallbackSlot::OnDelete, callback)
    }

    pub fn on_consent_change(
        self,
        callback: impl Fn(&ScriptCallbackInfo) -> CallbackResult + 'static,
    ) -> Self {
        self.with_callback(CallbackSlot::OnConsentChange, callback)
    }

    /// Validate and return the content source.
    ///
    /// # Errors
    ///
    /// [`LoaderError::InvalidSource`] when none or more than one source is set.
    pub fn source(&self) -> Result<ScriptSource<'_>, LoaderError> {
        match (
            self.src.as_deref(),
            self.text_content.as_deref(),
            self.callback_only,
        ) {
            (Some(src), None, false) => Ok(ScriptSource::External(src)),
            (None, Some(text), false) => Ok(ScriptSource::Inline(text)),
            (None, None, true) => Ok(ScriptSource::CallbackOnly),
            (None, None, false) => Err(self.invalid_source(
                "one of `src`, `text_content` or `callback_only` must be set",
            )),
            (src, text, callback_only) => {
                let mut set = Vec::new();
                if src.is_some() {
                    set.push("`src`");
                }
                if text.is_some() {
                    set.push("`text_content`");
                }
                if callback_only {
                    set.push("`callback_only`");
                }
                Err(self.invalid_source(&format!(
                    "{} are mutually exclusive",
                    set.join(" and ")
                )))
            }
        }
    }

    fn invalid_source(&self, reason: &str) -> LoaderError {
        LoaderError::InvalidSource {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Declarative, serializable form of a [`Script`] without callbacks.
///
/// Accepts `category` as an alias of `condition`, so the single-category
/// shorthand reads naturally in configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default)]
    pub callback_only: bool,
    #[serde(alias = "category")]
    pub condition: ConsentCondition,
    #[serde(default = "default_anonymize")]
    pub anonymize_id: bool,
    #[serde(default)]
    pub persist_after_consent_revoked: bool,
    #[serde(default)]
    pub always_load: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ScriptTarget>,
    #[serde(flatten)]
    pub hints: LoadingHints,
}

fn default_anonymize() -> bool {
    true
}

impl From<ScriptDefinition> for Script {
    fn from(def: ScriptDefinition) -> Self {
        Self {
            id: def.id,
            src: def.src,
            text_content: def.text_content,
            callback_only: def.callback_only,
            condition: def.condition,
            anonymize_id: def.anonymize_id,
            persist_after_consent_revoked: def.persist_after_consent_revoked,
            always_load: def.always_load,
            target: def.target,
            hints: def.hints,
            callbacks: ScriptCallbacks::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_descriptor_contract() {
        let script = Script::external("gtm", "https://example.test/gtm.js", "measurement");
        assert!(script.anonymize_id);
        assert!(!script.persist_after_consent_revoked);
        assert!(!script.always_load);
        assert_eq!(script.target, None);
        assert_eq!(
            script.source().unwrap(),
            ScriptSource::External("https://example.test/gtm.js")
        );
    }

    #[test]
    fn both_sources_is_rejected_with_id() {
        let mut script = Script::inline("dual", "console.log(1)", "necessary");
        script.src = Some("https://example.test/a.js".into());
        let err = script.source().unwrap_err();
        assert_eq!(err.script_id(), "dual");
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn no_source_is_rejected() {
        let script = Script::new("empty", "necessary");
        let err = script.source().unwrap_err();
        assert!(err.to_string().contains("must be set"));
    }

    #[test]
    fn callback_only_with_text_is_rejected() {
        let mut script = Script::callback_only("cb", "necessary");
        script.text_content = Some("x".into());
        assert!(script.source().is_err());
    }

    #[test]
    fn callbacks_are_stored_per_slot() {
        let script = Script::callback_only("cb", "necessary")
            .on_load(|_| Ok(()))
            .on_delete(|_| Ok(()));
        assert!(script.callbacks.get(CallbackSlot::OnLoad).is_some());
        assert!(script.callbacks.get(CallbackSlot::OnDelete).is_some());
        assert!(script.callbacks.get(CallbackSlot::OnBeforeLoad).is_none());
        assert_eq!(CallbackSlot::OnConsentChange.to_string(), "on_consent_change");
    }

    #[test]
    fn definition_parses_camel_case_with_category_alias() {
        let json = r#"{
            "id": "pixel",
            "src": "https://example.test/pixel.js",
            "category": "marketing",
            "persistAfterConsentRevoked": true,
            "target": "body",
            "async": true,
            "fetchPriority": "low",
            "attributes": { "data-domain": "example.test" }
        }"#;
        let def: ScriptDefinition = serde_json::from_str(json).unwrap();
        let script = Script::from(def);
        assert_eq!(script.id, "pixel");
        assert!(script.anonymize_id);
        assert!(script.persist_after_consent_revoked);
        assert_eq!(script.target, Some(ScriptTarget::Body));
        assert!(script.hints.async_load);
        assert_eq!(script.hints.fetch_priority, Some(FetchPriority::Low));
        assert_eq!(
            script.hints.attributes.get("data-domain").map(String::as_str),
            Some("example.test")
        );
        assert_eq!(script.condition, ConsentCondition::category("marketing"));
    }
}
