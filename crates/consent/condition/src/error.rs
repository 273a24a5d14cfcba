use thiserror::Error;

use crate::condition::GroupOperator;

/// Configuration errors found while evaluating a condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("consent category `{0}` is referenced by a condition but missing from the consent state")]
    MissingCategory(String),

    #[error("{operator} condition has no children")]
    EmptyGroup { operator: GroupOperator },
}
