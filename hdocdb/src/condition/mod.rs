//! Boolean filters over document paths.
//!
//! A [Condition] is a tree of `AND`/`OR` nodes over leaves that compare, test existence,
//! check the runtime type, test set membership or match a pattern. Conditions are built
//! with [ConditionBuilder], from JSON-style documents with [Condition::from_document], or
//! directly from the enum.
//!
//! ```ignore
//! let condition = Condition::builder()
//!     .and()
//!     .is("a", CompareOp::Eq, 2)
//!     .or()
//!     .lt("b", 10)
//!     .not_exists("b")
//!     .close()
//!     .close()
//!     .build()?;
//! assert!(condition.evaluate(&doc! { a: 2, b: 3 }));
//! ```

mod builder;
mod evaluate;
mod json;
mod pattern;
mod range;

pub use builder::ConditionBuilder;
pub use pattern::Pattern;
pub use range::*;

use crate::collection::Document;
use crate::common::{Value, ValueType};
use crate::path::FieldPath;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Comparison operators of a [Condition::Compare] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// A filter tree over document paths.
///
/// An empty `And` is always true and an empty `Or` always false.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Compare {
        path: FieldPath,
        op: CompareOp,
        value: Value,
    },
    /// True when the path resolves, even to `null`.
    Exists { path: FieldPath },
    NotExists { path: FieldPath },
    TypeOf {
        path: FieldPath,
        value_type: ValueType,
    },
    NotTypeOf {
        path: FieldPath,
        value_type: ValueType,
    },
    In { path: FieldPath, values: Vec<Value> },
    NotIn { path: FieldPath, values: Vec<Value> },
    /// Regular expression or SQL `LIKE` match against string values.
    Matches { path: FieldPath, pattern: Pattern },
    NotMatches { path: FieldPath, pattern: Pattern },
}

impl Condition {
    pub fn builder() -> ConditionBuilder {
        ConditionBuilder::new()
    }

    /// A condition every document satisfies.
    pub fn all() -> Condition {
        Condition::And(Vec::new())
    }

    pub fn evaluate(&self, doc: &Document) -> bool {
        evaluate::evaluate(self, doc)
    }

    /// Parses a JSON-style condition such as `{"a": 1, "b": {"$gt": 2}}`.
    pub fn from_document(doc: &Document) -> crate::errors::HDocResult<Condition> {
        json::from_document(doc)
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, Condition::And(_) | Condition::Or(_))
    }

    /// The path a leaf reads, or `None` for `And`/`Or`.
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            Condition::And(_) | Condition::Or(_) => None,
            Condition::Compare { path, .. }
            | Condition::Exists { path }
            | Condition::NotExists { path }
            | Condition::TypeOf { path, .. }
            | Condition::NotTypeOf { path, .. }
            | Condition::In { path, .. }
            | Condition::NotIn { path, .. }
            | Condition::Matches { path, .. }
            | Condition::NotMatches { path, .. } => Some(path),
        }
    }

    /// Every path the condition reads, in first-seen order.
    pub fn condition_paths(&self) -> Vec<FieldPath> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths(&self, paths: &mut Vec<FieldPath>) {
        match self {
            Condition::And(children) | Condition::Or(children) => {
                for child in children {
                    child.collect_paths(paths);
                }
            }
            leaf => {
                if let Some(path) = leaf.path() {
                    if !paths.contains(path) {
                        paths.push(path.clone());
                    }
                }
            }
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::And(children) if children.is_empty() => write!(f, "true"),
            Condition::Or(children) if children.is_empty() => write!(f, "false"),
            Condition::And(children) => write!(f, "({})", children.iter().join(" and ")),
            Condition::Or(children) => write!(f, "({})", children.iter().join(" or ")),
            Condition::Compare { path, op, value } => write!(f, "{} {} {}", path, op, value),
            Condition::Exists { path } => write!(f, "{} exists", path),
            Condition::NotExists { path } => write!(f, "{} not exists", path),
            Condition::TypeOf { path, value_type } => write!(f, "{} typeOf {}", path, value_type),
            Condition::NotTypeOf { path, value_type } => {
                write!(f, "{} notTypeOf {}", path, value_type)
            }
            Condition::In { path, values } => {
                write!(f, "{} in [{}]", path, values.iter().join(", "))
            }
            Condition::NotIn { path, values } => {
                write!(f, "{} notIn [{}]", path, values.iter().join(", "))
            }
            Condition::Matches { path, pattern } => write!(f, "{} {}", path, pattern),
            Condition::NotMatches { path, pattern } => write!(f, "{} not {}", path, pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::compile;

    #[test]
    fn display_renders_tree() {
        let condition = Condition::builder()
            .and()
            .is("a", CompareOp::Eq, 2)
            .or()
            .gt("b.c", 1.5)
            .exists("d[]")
            .close()
            .close()
            .build()
            .unwrap();
        assert_eq!(condition.to_string(), "(a = 2 and (b.c > 1.5 or d[] exists))");
    }

    #[test]
    fn condition_paths_are_unique_in_order() {
        let condition = Condition::builder()
            .and()
            .gt("a", 1)
            .lt("a", 5)
            .exists("b")
            .close()
            .build()
            .unwrap();
        assert_eq!(
            condition.condition_paths(),
            vec![compile("a").unwrap(), compile("b").unwrap()]
        );
    }

    #[test]
    fn empty_nodes_have_fixed_truth() {
        let doc = Document::new();
        assert!(Condition::all().evaluate(&doc));
        assert!(!Condition::Or(vec![]).evaluate(&doc));
    }
}
