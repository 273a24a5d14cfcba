use std::fmt;

use serde::{Deserialize, Serialize};

/// Boolean expression over consent categories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub enum ConsentCondition {
    /// Granted iff the named category is granted.
    Category(String),
    /// Granted iff every child is granted. Must not be empty.
    And(Vec<ConsentCondition>),
    /// Granted iff any child is granted. Must not be empty.
    Or(Vec<ConsentCondition>),
    /// Granted iff the child is not granted.
    Not(Box<ConsentCondition>),
}

/// Compound operators, used in error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupOperator {
    And,
    Or,
}

impl fmt::Display for GroupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupOperator::And => write!(f, "AND"),
            GroupOperator::Or => write!(f, "OR"),
        }
    }
}

impl ConsentCondition {
    pub fn category(name: impl Into<String>) -> Self {
        ConsentCondition::Category(name.into())
    }

    pub fn and(children: Vec<ConsentCondition>) -> Self {
        ConsentCondition::And(children)
    }

    pub fn or(children: Vec<ConsentCondition>) -> Self {
        ConsentCondition::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: ConsentCondition) -> Self {
        ConsentCondition::Not(Box::new(child))
    }

    /// `AND` over any iterator of conditions or category names.
    pub fn all<I, C>(children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConsentCondition>,
    {
        ConsentCondition::And(children.into_iter().map(Into::into).collect())
    }

    /// `OR` over any iterator of conditions or category names.
    pub fn any<I, C>(children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConsentCondition>,
    {
        ConsentCondition::Or(children.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for ConsentCondition {
    fn from(name: &str) -> Self {
        ConsentCondition::Category(name.to_string())
    }
}

impl From<String> for ConsentCondition {
    fn from(name: String) -> Self {
        ConsentCondition::Category(name)
    }
}

impl fmt::Display for ConsentCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentCondition::Category(name) => write!(f, "{name}"),
            ConsentCondition::Not(child) => write!(f, "NOT {child}"),
            ConsentCondition::And(children) | ConsentCondition::Or(children) => {
                let sep = if matches!(self, ConsentCondition::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{sep}")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ── Wire form ───────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Category(String),
    Expr(RawExpr),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawExpr {
    And(Children),
    Or(Children),
    Not(Box<RawCondition>),
}

/// Group children: a list, or a single condition standing for a list of one.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Children {
    Many(Vec<RawCondition>),
    One(Box<RawCondition>),
}

impl Children {
    fn into_conditions(self) -> Vec<ConsentCondition> {
        match self {
            Children::Many(list) => list.into_iter().map(ConsentCondition::from).collect(),
            Children::One(single) => vec![ConsentCondition::from(*single)],
        }
    }
}

impl From<RawCondition> for ConsentCondition {
    fn from(raw: RawCondition) -> Self {
        match raw {
            RawCondition::Category(name) => ConsentCondition::Category(name),
            RawCondition::Expr(RawExpr::And(children)) => {
                ConsentCondition::And(children.into_conditions())
            }
            RawCondition::Expr(RawExpr::Or(children)) => {
                ConsentCondition::Or(children.into_conditions())
            }
            RawCondition::Expr(RawExpr::Not(child)) => {
                ConsentCondition::Not(Box::new(ConsentCondition::from(*child)))
            }
        }
    }
}

impl From<ConsentCondition> for RawCondition {
    fn from(condition: ConsentCondition) -> Self {
        let many = |children: Vec<ConsentCondition>| {
            Children::Many(children.into_iter().map(RawCondition::from).collect())
        };
        match condition {
            ConsentCondition::Category(name) => RawCondition::Category(name),
            ConsentCondition::And(children) => RawCondition::Expr(RawExpr::And(many(children))),
            ConsentCondition::Or(children) => RawCondition::Expr(RawExpr::Or(many(children))),
            ConsentCondition::Not(child) => {
                RawCondition::Expr(RawExpr::Not(Box::new(RawCondition::from(*child))))
            }
        }
    }
}
