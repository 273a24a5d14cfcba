//! # consent-scripts
//!
//! Consent-gated script lifecycle management.
//!
//! A [`ScriptLoader`] owns a [`DocumentEnvironment`] and a [`ScriptRegistry`].
//! Given a set of [`Script`] descriptors and the current
//! [`ConsentState`](consent_types::ConsentState) it attaches the scripts whose
//! condition holds, detaches the ones whose consent was revoked, and fires the
//! descriptor callbacks around every transition.
//!
//! ## Components
//!
//! - **IdentityAnonymizer**: resolves the element identity of a script,
//!   either a prefixed deterministic id or a random token memoized in a
//!   caller-owned [`IdentityMap`](consent_types::IdentityMap)
//! - **ScriptRegistry**: which script ids are currently loaded, and their
//!   element handles
//! - **DocumentEnvironment**: capability interface over the host document;
//!   [`MemoryDocument`] is the in-process implementation
//! - **ScriptLoader**: the lifecycle engine
//! - **ConsentSession**: script set + consent state + identity map kept
//!   together, re-running the loader whenever either side changes
//!
//! ## Callback contract
//!
//! | Transition | Callbacks |
//! |---|---|
//! | new element | `on_before_load` (sync), then `on_load` / `on_error` from the environment |
//! | callback-only | `on_before_load`, `on_load` (both sync) |
//! | adopted persistent element | `on_consent_change`, `on_load` |
//! | already loaded | `on_consent_change` |
//! | unloaded | `on_delete` |

pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod loader;
pub mod memory;
pub mod registry;
pub mod script;
pub mod session;

pub use config::{IdentityConfig, LoaderConfig, DEFAULT_ID_PREFIX, DEFAULT_TOKEN_LENGTH};
pub use document::{
    CompletionListener, DeferredTask, DocumentEnvironment, FailureListener, ScriptElement,
};
pub use error::{CallbackError, CallbackResult, ConfigError, LoaderError};
pub use identity::IdentityAnonymizer;
pub use loader::{ClearContext, ScriptLoader, UpdateOutcome};
pub use memory::MemoryDocument;
pub use registry::ScriptRegistry;
pub use script::{
    CallbackSlot, LoadingHints, Script, ScriptCallback, ScriptCallbacks, ScriptDefinition,
    ScriptSource,
};
pub use session::ConsentSession;
