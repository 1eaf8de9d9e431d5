use crate::common::{Value, ValueType};
use crate::condition::{CompareOp, Condition, Pattern};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::path::{compile, FieldPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    And,
    Or,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    children: Vec<Condition>,
}

/// Stack-based builder for [Condition] trees.
///
/// `and()` and `or()` open a scope, `close()` ends the innermost one and `build()` finishes
/// the tree. Without an open scope the builder holds a single leaf. Path or pattern errors
/// do not break the chain; the first one is returned by `build()`.
#[derive(Debug, Default)]
pub struct ConditionBuilder {
    scopes: Vec<Scope>,
    root: Option<Condition>,
    error: Option<HDocError>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        ConditionBuilder::default()
    }

    pub fn and(mut self) -> Self {
        self.scopes.push(Scope {
            kind: ScopeKind::And,
            children: Vec::new(),
        });
        self
    }

    pub fn or(mut self) -> Self {
        self.scopes.push(Scope {
            kind: ScopeKind::Or,
            children: Vec::new(),
        });
        self
    }

    /// Ends the innermost scope. Without an open scope this does nothing.
    pub fn close(mut self) -> Self {
        if let Some(scope) = self.scopes.pop() {
            let node = match scope.kind {
                ScopeKind::And => Condition::And(scope.children),
                ScopeKind::Or => Condition::Or(scope.children),
            };
            self.add(node);
        }
        self
    }

    pub fn build(self) -> HDocResult<Condition> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.scopes.is_empty() {
            return Err(condition_error(&format!(
                "Missing call to close for {} open scope(s)",
                self.scopes.len()
            )));
        }
        Ok(self.root.unwrap_or_else(Condition::all))
    }

    /// Appends an already built condition to the current scope.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.add(condition);
        self
    }

    pub fn is<V: Into<Value>>(self, path: &str, op: CompareOp, value: V) -> Self {
        let value = value.into();
        self.leaf(path, |path| Condition::Compare { path, op, value })
    }

    pub fn eq<V: Into<Value>>(self, path: &str, value: V) -> Self {
        self.is(path, CompareOp::Eq, value)
    }

    pub fn ne<V: Into<Value>>(self, path: &str, value: V) -> Self {
        self.is(path, CompareOp::Ne, value)
    }

    pub fn lt<V: Into<Value>>(self, path: &str, value: V) -> Self {
        self.is(path, CompareOp::Lt, value)
    }

    pub fn le<V: Into<Value>>(self, path: &str, value: V) -> Self {
        self.is(path, CompareOp::Le, value)
    }

    pub fn gt<V: Into<Value>>(self, path: &str, value: V) -> Self {
        self.is(path, CompareOp::Gt, value)
    }

    pub fn ge<V: Into<Value>>(self, path: &str, value: V) -> Self {
        self.is(path, CompareOp::Ge, value)
    }

    pub fn exists(self, path: &str) -> Self {
        self.leaf(path, |path| Condition::Exists { path })
    }

    pub fn not_exists(self, path: &str) -> Self {
        self.leaf(path, |path| Condition::NotExists { path })
    }

    pub fn type_of(self, path: &str, value_type: ValueType) -> Self {
        self.leaf(path, |path| Condition::TypeOf { path, value_type })
    }

    pub fn not_type_of(self, path: &str, value_type: ValueType) -> Self {
        self.leaf(path, |path| Condition::NotTypeOf { path, value_type })
    }

    pub fn is_in<V: Into<Value>>(self, path: &str, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.leaf(path, |path| Condition::In { path, values })
    }

    pub fn not_in<V: Into<Value>>(self, path: &str, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.leaf(path, |path| Condition::NotIn { path, values })
    }

    /// Full-string regular expression match.
    pub fn matches(self, path: &str, regex: &str) -> Self {
        self.pattern(path, Pattern::regex(regex), false)
    }

    pub fn not_matches(self, path: &str, regex: &str) -> Self {
        self.pattern(path, Pattern::regex(regex), true)
    }

    /// SQL `LIKE` match: `%` is any run of characters and `_` any single character.
    pub fn like(self, path: &str, pattern: &str, escape: Option<char>) -> Self {
        self.pattern(path, Pattern::like(pattern, escape), false)
    }

    pub fn not_like(self, path: &str, pattern: &str, escape: Option<char>) -> Self {
        self.pattern(path, Pattern::like(pattern, escape), true)
    }

    fn pattern(mut self, path: &str, pattern: HDocResult<Pattern>, negated: bool) -> Self {
        match pattern {
            Ok(pattern) => self.leaf(path, |path| {
                if negated {
                    Condition::NotMatches { path, pattern }
                } else {
                    Condition::Matches { path, pattern }
                }
            }),
            Err(err) => {
                self.fail(err);
                self
            }
        }
    }

    fn leaf(mut self, path: &str, make: impl FnOnce(FieldPath) -> Condition) -> Self {
        match compile(path) {
            Ok(path) => self.add(make(path)),
            Err(err) => self.fail(err),
        }
        self
    }

    fn add(&mut self, node: Condition) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.children.push(node);
        } else if self.root.is_none() {
            self.root = Some(node);
        } else {
            self.fail(condition_error(
                "A condition already has a root; open and() or or() to combine conditions",
            ));
        }
    }

    fn fail(&mut self, err: HDocError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn condition_error(message: &str) -> HDocError {
    log::error!("{}", message);
    HDocError::new(message, ErrorKind::ConditionError)
}
