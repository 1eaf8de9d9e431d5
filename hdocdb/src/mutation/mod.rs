//! Mutation descriptors and the engine that applies them.
//!
//! A [Mutation] is an ordered list of operations. Applying it works on a copy of the target
//! document, so a failing operation leaves the original untouched:
//!
//! ```ignore
//! let mutation = Mutation::new()
//!     .increment("Scores[1]", 3)
//!     .increment("map.byte", 5)
//!     .set_or_replace("status", "seen");
//! let updated = mutation.apply(&doc)?;
//! ```

mod apply;
mod arith;

use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::path::{compile, FieldPath};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// One operation of a [Mutation].
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Store a value; walking through an existing non-container is a conflict.
    Set { path: FieldPath, value: Value },
    /// Store a value, replacing whatever blocks the path.
    SetOrReplace { path: FieldPath, value: Value },
    Delete { path: FieldPath },
    /// Numeric add-in-place, wrapping at the stored width.
    Increment { path: FieldPath, by: Value },
    /// Concatenate onto a string or binary, or add to the end of an array.
    Append { path: FieldPath, value: Value },
    /// Add exactly one element to the end of an array.
    Push { path: FieldPath, value: Value },
    /// Shallow merge of a map's fields into the target map.
    Merge { path: FieldPath, value: Document },
}

impl MutationOp {
    pub fn path(&self) -> &FieldPath {
        match self {
            MutationOp::Set { path, .. }
            | MutationOp::SetOrReplace { path, .. }
            | MutationOp::Delete { path }
            | MutationOp::Increment { path, .. }
            | MutationOp::Append { path, .. }
            | MutationOp::Push { path, .. }
            | MutationOp::Merge { path, .. } => path,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            MutationOp::Set { .. } => "set",
            MutationOp::SetOrReplace { .. } => "setOrReplace",
            MutationOp::Delete { .. } => "delete",
            MutationOp::Increment { .. } => "increment",
            MutationOp::Append { .. } => "append",
            MutationOp::Push { .. } => "push",
            MutationOp::Merge { .. } => "merge",
        }
    }
}

impl Display for MutationOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationOp::Delete { path } => write!(f, "{}({})", self.name(), path),
            MutationOp::Set { path, value }
            | MutationOp::SetOrReplace { path, value }
            | MutationOp::Append { path, value }
            | MutationOp::Push { path, value } => {
                write!(f, "{}({}, {})", self.name(), path, value)
            }
            MutationOp::Increment { path, by } => write!(f, "{}({}, {})", self.name(), path, by),
            MutationOp::Merge { path, value } => write!(f, "{}({}, {})", self.name(), path, value),
        }
    }
}

/// An ordered batch of [MutationOp]s that commits as a unit.
///
/// Path strings are compiled as operations are added. A malformed path does not break the
/// builder chain; it is reported when the mutation is applied.
#[derive(Debug, Clone, Default)]
pub struct Mutation {
    ops: Vec<MutationOp>,
    error: Option<HDocError>,
}

impl Mutation {
    pub fn new() -> Self {
        Mutation::default()
    }

    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.error.is_none()
    }

    pub fn push_op(mut self, op: MutationOp) -> Self {
        self.ops.push(op);
        self
    }

    fn with_path(mut self, path: &str, make: impl FnOnce(FieldPath) -> MutationOp) -> Self {
        match compile(path) {
            Ok(path) => self.ops.push(make(path)),
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
            }
        }
        self
    }

    pub fn set<V: Into<Value>>(self, path: &str, value: V) -> Self {
        let value = value.into();
        self.with_path(path, |path| MutationOp::Set { path, value })
    }

    pub fn set_or_replace<V: Into<Value>>(self, path: &str, value: V) -> Self {
        let value = value.into();
        self.with_path(path, |path| MutationOp::SetOrReplace { path, value })
    }

    pub fn set_null(self, path: &str) -> Self {
        self.set(path, Value::Null)
    }

    pub fn set_or_replace_null(self, path: &str) -> Self {
        self.set_or_replace(path, Value::Null)
    }

    pub fn delete(self, path: &str) -> Self {
        self.with_path(path, |path| MutationOp::Delete { path })
    }

    pub fn increment<V: Into<Value>>(self, path: &str, by: V) -> Self {
        let by = by.into();
        self.with_path(path, |path| MutationOp::Increment { path, by })
    }

    /// Appends to a string, binary or array. An array operand adds all of its elements.
    pub fn append<V: Into<Value>>(self, path: &str, value: V) -> Self {
        let value = value.into();
        self.with_path(path, |path| MutationOp::Append { path, value })
    }

    /// Appends a single element to an array, even when the element is itself an array.
    pub fn push<V: Into<Value>>(self, path: &str, value: V) -> Self {
        let value = value.into();
        self.with_path(path, |path| MutationOp::Push { path, value })
    }

    pub fn merge(self, path: &str, value: Document) -> Self {
        self.with_path(path, |path| MutationOp::Merge { path, value })
    }

    /// Applies every operation, in order, to a copy of `target`.
    ///
    /// Returns the new document, or the first error; `target` itself is never modified.
    pub fn apply(&self, target: &Document) -> HDocResult<Document> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut working = target.clone();
        for op in &self.ops {
            apply::apply_op(&mut working, op)?;
        }
        Ok(working)
    }

    /// Builds a mutation from operator documents such as
    /// `{"$set": {"a.b": 1}, "$inc": {"n": 2}, "$unset": {"old": ""}}`.
    ///
    /// Supported operators: `$set`, `$unset`, `$inc`, `$append`, `$push`, `$pushAll` and
    /// `$merge`. Keys inside each operator document are path strings.
    pub fn from_document(update: &Document) -> HDocResult<Mutation> {
        let mut mutation = Mutation::new();
        for (operator, arguments) in update.iter() {
            let Some(arguments) = arguments.as_map() else {
                return Err(invalid_update(&format!(
                    "Operator {} expects a document of paths",
                    operator
                )));
            };

            for (path, operand) in arguments.iter() {
                let operand = operand.clone();
                mutation = match operator.as_str() {
                    "$set" => mutation.set_or_replace(path, operand),
                    "$unset" => mutation.delete(path),
                    "$inc" => mutation.increment(path, operand),
                    "$append" => mutation.append(path, operand),
                    "$push" => mutation.push(path, operand),
                    "$pushAll" => match operand {
                        Value::Array(_) => mutation.append(path, operand),
                        other => {
                            return Err(invalid_update(&format!(
                                "$pushAll expects an array for {}, found {}",
                                path,
                                other.value_type()
                            )))
                        }
                    },
                    "$merge" => match operand {
                        Value::Map(doc) => mutation.merge(path, doc),
                        other => {
                            return Err(invalid_update(&format!(
                                "$merge expects a document for {}, found {}",
                                path,
                                other.value_type()
                            )))
                        }
                    },
                    unknown => {
                        return Err(invalid_update(&format!("Unknown update operator {}", unknown)))
                    }
                };
            }
        }

        if let Some(err) = mutation.error.take() {
            return Err(err);
        }
        Ok(mutation)
    }
}

fn invalid_update(message: &str) -> HDocError {
    log::error!("{}", message);
    HDocError::new(message, ErrorKind::ValidationError)
}

impl Display for Mutation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.ops.iter().join(", "))
    }
}
