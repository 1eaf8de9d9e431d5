use crate::collection::walker;
use crate::collection::Document;
use crate::common::Value;
use crate::condition::{CompareOp, Condition, Pattern};
use crate::path::FieldPath;
use std::borrow::Cow;
use std::cmp::Ordering;

pub(super) fn evaluate(condition: &Condition, doc: &Document) -> bool {
    match condition {
        Condition::And(children) => children.iter().all(|c| evaluate(c, doc)),
        Condition::Or(children) => children.iter().any(|c| evaluate(c, doc)),
        Condition::Exists { path } => resolve(doc, path).is_some(),
        Condition::NotExists { path } => resolve(doc, path).is_none(),
        Condition::Compare { path, op, value } => {
            let whole = matches!(op, CompareOp::Eq | CompareOp::Ne) && value.is_container();
            match op {
                CompareOp::Ne => none_matches(doc, path, whole, |v| v.equivalent(value)),
                _ => any_matches(doc, path, whole, |v| compare(v, *op, value)),
            }
        }
        Condition::TypeOf { path, value_type } => {
            any_matches_or_null(doc, path, true, |v| v.value_type() == *value_type)
        }
        Condition::NotTypeOf { path, value_type } => {
            none_matches_or_null(doc, path, true, |v| v.value_type() == *value_type)
        }
        Condition::In { path, values } => {
            any_matches_or_null(doc, path, false, |v| contains(values, v))
        }
        Condition::NotIn { path, values } => {
            none_matches_or_null(doc, path, false, |v| contains(values, v))
        }
        Condition::Matches { path, pattern } => {
            any_matches(doc, path, false, |v| is_match(pattern, v))
        }
        Condition::NotMatches { path, pattern } => {
            none_matches_or_null(doc, path, false, |v| is_match(pattern, v))
        }
    }
}

// Values a leaf tests. A wildcard path yields the fanned-out elements and an empty fan-out
// counts as absent. A concrete path yields its value, or the elements of the array it holds
// unless the leaf tests the value as a whole.
fn candidates<'a>(doc: &'a Document, path: &FieldPath, whole: bool) -> Option<Vec<Cow<'a, Value>>> {
    let found = resolve(doc, path)?;
    if path.has_wildcard() {
        let elements = match found {
            Cow::Borrowed(Value::Array(items)) => items.iter().map(Cow::Borrowed).collect(),
            Cow::Owned(Value::Array(items)) => items.into_iter().map(Cow::Owned).collect(),
            _ => return None,
        };
        return Some(elements).filter(|e: &Vec<_>| !e.is_empty());
    }
    match found {
        Cow::Borrowed(Value::Array(items)) if !whole && !items.is_empty() => {
            Some(items.iter().map(Cow::Borrowed).collect())
        }
        other => Some(vec![other]),
    }
}

fn resolve<'a>(doc: &'a Document, path: &FieldPath) -> Option<Cow<'a, Value>> {
    let found = walker::get(doc, path)?;
    if path.has_wildcard() && matches!(found.as_ref(), Value::Array(items) if items.is_empty()) {
        return None;
    }
    Some(found)
}

fn any_matches(doc: &Document, path: &FieldPath, whole: bool, test: impl Fn(&Value) -> bool) -> bool {
    candidates(doc, path, whole).is_some_and(|values| values.iter().any(|v| test(&**v)))
}

// `!=` is a comparison and fails closed on absent paths
fn none_matches(doc: &Document, path: &FieldPath, whole: bool, test: impl Fn(&Value) -> bool) -> bool {
    candidates(doc, path, whole).is_some_and(|values| !values.iter().any(|v| test(&**v)))
}

// membership, type and negated pattern leaves read an absent path as null
fn any_matches_or_null(
    doc: &Document,
    path: &FieldPath,
    whole: bool,
    test: impl Fn(&Value) -> bool,
) -> bool {
    match candidates(doc, path, whole) {
        Some(values) => values.iter().any(|v| test(&**v)),
        None => test(&Value::Null),
    }
}

fn none_matches_or_null(
    doc: &Document,
    path: &FieldPath,
    whole: bool,
    test: impl Fn(&Value) -> bool,
) -> bool {
    !any_matches_or_null(doc, path, whole, test)
}

fn compare(actual: &Value, op: CompareOp, literal: &Value) -> bool {
    if op == CompareOp::Eq {
        return actual.equivalent(literal);
    }
    match actual.compare(literal) {
        Some(ordering) => match op {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
        },
        None => false,
    }
}

fn contains(values: &[Value], candidate: &Value) -> bool {
    values.iter().any(|v| v.equivalent(candidate))
}

fn is_match(pattern: &Pattern, value: &Value) -> bool {
    value.as_str().is_some_and(|text| pattern.is_match(text))
}
