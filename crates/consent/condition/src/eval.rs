use std::collections::BTreeSet;

use consent_types::ConsentState;
use tracing::warn;

use crate::condition::{ConsentCondition, GroupOperator};
use crate::error::ConditionError;

/// Evaluate a condition against the current consent state.
///
/// Groups short-circuit left to right, so a missing category that sits after
/// a deciding child is not reported.
///
/// # Errors
///
/// - [`ConditionError::MissingCategory`] when a visited leaf names a category
///   absent from `consents`.
/// - [`ConditionError::EmptyGroup`] for an `AND` / `OR` without children.
pub fn evaluate(
    condition: &ConsentCondition,
    consents: &ConsentState,
) -> Result<bool, ConditionError> {
    match condition {
        ConsentCondition::Category(name) => consents.get(name).ok_or_else(|| {
            warn!(category = %name, "Condition references unknown consent category");
            ConditionError::MissingCategory(name.clone())
        }),
        ConsentCondition::And(children) => {
            if children.is_empty() {
                return Err(ConditionError::EmptyGroup {
                    operator: GroupOperator::And,
                });
            }
            for child in children {
                if !evaluate(child, consents)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ConsentCondition::Or(children) => {
            if children.is_empty() {
                return Err(ConditionError::EmptyGroup {
                    operator: GroupOperator::Or,
                });
            }
            for child in children {
                if evaluate(child, consents)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ConsentCondition::Not(child) => Ok(!evaluate(child, consents)?),
    }
}

/// Collect every category referenced anywhere in `condition`.
pub fn extract_categories(condition: &ConsentCondition) -> BTreeSet<String> {
    let mut categories = BTreeSet::new();
    collect(condition, &mut categories);
    categories
}

fn collect(condition: &ConsentCondition, into: &mut BTreeSet<String>) {
    match condition {
        ConsentCondition::Category(name) => {
            into.insert(name.clone());
        }
        ConsentCondition::And(children) | ConsentCondition::Or(children) => {
            for child in children {
                collect(child, into);
            }
        }
        ConsentCondition::Not(child) => collect(child, into),
    }
}
