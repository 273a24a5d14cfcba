//! Core type definitions shared by the consent crates.
//!
//! This crate carries plain data only: the consent state map, the caller-owned
//! identity map, document element handles and the record handed to every
//! script callback.

pub mod callback;
pub mod consent;
pub mod element;
pub mod identity;

// Re-export primary types at crate root for ergonomic use.
pub use callback::ScriptCallbackInfo;
pub use consent::ConsentState;
pub use element::{ElementHandle, FetchPriority, LoadFailure, ScriptTarget};
pub use identity::IdentityMap;
