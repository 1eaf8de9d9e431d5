//! The single segment walker behind document reads, writes and deletes.

use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::path::{FieldPath, Segment};
use std::borrow::Cow;

/// How a write treats an existing value that blocks the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetMode {
    /// Walking through an existing non-container (null included) is a conflict.
    Strict,
    /// A blocking value is replaced by the container the path needs.
    Replace,
}

pub(crate) fn get<'a>(doc: &'a Document, path: &FieldPath) -> Option<Cow<'a, Value>> {
    match path.segments().split_first() {
        None => Some(Cow::Owned(Value::Map(doc.clone()))),
        Some((Segment::Field(name), rest)) => get_in(doc.field(name)?, rest),
        Some(_) => None,
    }
}

fn get_in<'a>(value: &'a Value, segments: &[Segment]) -> Option<Cow<'a, Value>> {
    match segments.split_first() {
        None => Some(Cow::Borrowed(value)),
        Some((Segment::Field(name), rest)) => get_in(value.as_map()?.field(name)?, rest),
        Some((Segment::Index(index), rest)) => get_in(value.as_array()?.get(*index)?, rest),
        Some((Segment::Wildcard, rest)) => {
            let elements = value.as_array()?;
            if rest.is_empty() {
                return Some(Cow::Borrowed(value));
            }

            // nested fan-outs are flattened into one level
            let flatten = rest.iter().any(|s| matches!(s, Segment::Wildcard));
            let mut matched = Vec::new();
            for element in elements {
                match get_in(element, rest).map(Cow::into_owned) {
                    Some(Value::Array(items)) if flatten => matched.extend(items),
                    Some(found) => matched.push(found),
                    None => {}
                }
            }
            Some(Cow::Owned(Value::Array(matched)))
        }
    }
}

/// Mutable access to the slot `path` addresses, creating whatever is missing on the way.
///
/// A missing terminal slot is created holding `null`; the flag tells whether it existed
/// before the call. Arrays are padded with `null` up to the addressed position.
pub(crate) fn entry<'a>(
    doc: &'a mut Document,
    path: &FieldPath,
    mode: SetMode,
) -> HDocResult<(&'a mut Value, bool)> {
    let segments = path.segments();
    if segments.iter().any(|s| matches!(s, Segment::Wildcard)) {
        log::error!("Cannot write through wildcard path {}", path);
        return Err(HDocError::new(
            &format!("Cannot write through wildcard path {}", path),
            ErrorKind::InvalidOperation,
        ));
    }

    let (first, rest) = match segments.split_first() {
        Some((Segment::Field(name), rest)) => (name, rest),
        _ => {
            log::error!("Path '{}' does not address a document field", path);
            return Err(HDocError::new(
                &format!("Path '{}' does not address a document field", path),
                ErrorKind::InvalidOperation,
            ));
        }
    };

    let (mut current, mut existed) = doc.field_entry(first);
    for (depth, segment) in rest.iter().enumerate() {
        prepare_container(current, segment, existed, mode, path, depth + 1)?;
        let (next, next_existed) = step_mut(current, segment)?;
        current = next;
        existed = next_existed;
    }
    Ok((current, existed))
}

fn prepare_container(
    current: &mut Value,
    next: &Segment,
    existed: bool,
    mode: SetMode,
    path: &FieldPath,
    depth: usize,
) -> HDocResult<()> {
    let fits = match next {
        Segment::Field(_) => matches!(current, Value::Map(_)),
        Segment::Index(_) => matches!(current, Value::Array(_)),
        Segment::Wildcard => false,
    };
    if fits {
        return Ok(());
    }
    if existed && mode == SetMode::Strict {
        let prefix = FieldPath::from_segments(path.segments()[..depth].iter().cloned());
        log::error!(
            "Path {} conflicts with the {} stored at {}",
            path,
            current.value_type(),
            prefix
        );
        return Err(HDocError::new(
            &format!(
                "Path {} conflicts with the {} stored at {}",
                path,
                current.value_type(),
                prefix
            ),
            ErrorKind::PathConflict,
        ));
    }

    *current = match next {
        Segment::Index(_) => Value::Array(Vec::new()),
        _ => Value::Map(Document::new()),
    };
    Ok(())
}

fn step_mut<'a>(current: &'a mut Value, segment: &Segment) -> HDocResult<(&'a mut Value, bool)> {
    match (current, segment) {
        (Value::Map(map), Segment::Field(name)) => Ok(map.field_entry(name)),
        (Value::Array(items), Segment::Index(index)) => {
            let existed = *index < items.len();
            if !existed {
                items.resize(*index + 1, Value::Null);
            }
            Ok((&mut items[*index], existed))
        }
        (other, segment) => {
            log::error!("Cannot step into {} with {:?}", other.value_type(), segment);
            Err(HDocError::new(
                &format!("Cannot step into {} with {:?}", other.value_type(), segment),
                ErrorKind::InternalError,
            ))
        }
    }
}

/// Removes what `path` addresses. Missing steps make this a no-op.
pub(crate) fn delete(doc: &mut Document, path: &FieldPath) -> bool {
    match path.segments().split_first() {
        None => {
            let had_fields = !doc.is_empty();
            doc.clear();
            had_fields
        }
        Some((Segment::Field(name), [])) => doc.remove_field(name).is_some(),
        Some((Segment::Field(name), rest)) => match doc.field_mut(name) {
            Some(child) => delete_in(child, rest),
            None => false,
        },
        Some(_) => false,
    }
}

fn delete_in(value: &mut Value, segments: &[Segment]) -> bool {
    match (value, segments) {
        (_, []) => false,
        (Value::Map(map), [Segment::Field(name)]) => map.remove_field(name).is_some(),
        (Value::Map(map), [Segment::Field(name), rest @ ..]) => match map.field_mut(name) {
            Some(child) => delete_in(child, rest),
            None => false,
        },
        (Value::Array(items), [Segment::Index(index)]) => {
            if *index < items.len() {
                items.remove(*index);
                true
            } else {
                false
            }
        }
        (Value::Array(items), [Segment::Index(index), rest @ ..]) => match items.get_mut(*index) {
            Some(child) => delete_in(child, rest),
            None => false,
        },
        (Value::Array(items), [Segment::Wildcard]) => {
            let had_items = !items.is_empty();
            items.clear();
            had_items
        }
        (Value::Array(items), [Segment::Wildcard, rest @ ..]) => {
            let mut deleted = false;
            for item in items.iter_mut() {
                deleted |= delete_in(item, rest);
            }
            deleted
        }
        _ => false,
    }
}
