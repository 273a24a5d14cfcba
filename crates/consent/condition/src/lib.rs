//! Consent condition evaluation.
//!
//! A [`ConsentCondition`] is a boolean expression over consent categories.
//! [`evaluate`] turns it into a grant decision against a
//! [`ConsentState`](consent_types::ConsentState), and [`extract_categories`]
//! lists every category a condition depends on so callers can register the
//! categories a script set uses.
//!
//! ## Wire form
//!
//! Conditions deserialize from the compact JSON form used in script
//! configuration:
//!
//! ```json
//! "marketing"
//! { "and": ["measurement", { "not": "marketing" }] }
//! { "or": "necessary" }
//! ```
//!
//! A bare string is a single category; group children may be one condition or
//! a list.

pub mod condition;
pub mod error;
pub mod eval;

pub use condition::{ConsentCondition, GroupOperator};
pub use error::ConditionError;
pub use eval::{evaluate, extract_categories};
