use crate::collection::walker::{self, SetMode};
use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::mutation::{arith, MutationOp};
use crate::path::FieldPath;

fn mismatch(message: String) -> HDocError {
    log::error!("{}", message);
    HDocError::new(&message, ErrorKind::TypeMismatch)
}

pub(super) fn apply_op(doc: &mut Document, op: &MutationOp) -> HDocResult<()> {
    if op.path().is_root() {
        return apply_to_root(doc, op);
    }

    match op {
        MutationOp::Set { path, value } => set(doc, path, value.clone(), SetMode::Strict),
        MutationOp::SetOrReplace { path, value } => {
            set(doc, path, value.clone(), SetMode::Replace)
        }
        MutationOp::Delete { path } => {
            walker::delete(doc, path);
            Ok(())
        }
        MutationOp::Increment { path, by } => {
            if !by.is_numeric() {
                return Err(mismatch(format!(
                    "Cannot increment {} by a {} operand",
                    path,
                    by.value_type()
                )));
            }
            let (slot, existed) = walker::entry(doc, path, SetMode::Strict)?;
            *slot = if existed { arith::add(slot, by)? } else { by.clone() };
            Ok(())
        }
        MutationOp::Append { path, value } => {
            let (slot, existed) = walker::entry(doc, path, SetMode::Strict)?;
            append(slot, existed, value, path)
        }
        MutationOp::Push { path, value } => {
            let (slot, existed) = walker::entry(doc, path, SetMode::Strict)?;
            if !existed {
                *slot = Value::Array(vec![value.clone()]);
                return Ok(());
            }
            match slot {
                Value::Array(items) => {
                    items.push(value.clone());
                    Ok(())
                }
                other => Err(mismatch(format!(
                    "Cannot push onto the {} at {}",
                    other.value_type(),
                    path
                ))),
            }
        }
        MutationOp::Merge { path, value } => {
            let (slot, existed) = walker::entry(doc, path, SetMode::Strict)?;
            if !existed {
                *slot = Value::Map(value.clone());
                return Ok(());
            }
            match slot {
                Value::Map(target) => {
                    merge_into(target, value);
                    Ok(())
                }
                other => Err(mismatch(format!(
                    "Cannot merge a document into the {} at {}",
                    other.value_type(),
                    path
                ))),
            }
        }
    }
}

fn set(doc: &mut Document, path: &FieldPath, value: Value, mode: SetMode) -> HDocResult<()> {
    let (slot, _) = walker::entry(doc, path, mode)?;
    *slot = value;
    Ok(())
}

fn append(slot: &mut Value, existed: bool, operand: &Value, path: &FieldPath) -> HDocResult<()> {
    if !existed {
        *slot = match operand {
            Value::String(_) | Value::Binary(_) | Value::Array(_) => operand.clone(),
            scalar => Value::Array(vec![scalar.clone()]),
        };
        return Ok(());
    }

    match (slot, operand) {
        (Value::String(text), Value::String(tail)) => text.push_str(tail),
        (Value::Binary(bytes), Value::Binary(tail)) => bytes.extend_from_slice(tail),
        (Value::Array(items), Value::Array(tail)) => items.extend(tail.iter().cloned()),
        (Value::Array(items), element) => items.push(element.clone()),
        (current, operand) => {
            return Err(mismatch(format!(
                "Cannot append a {} to the {} at {}",
                operand.value_type(),
                current.value_type(),
                path
            )))
        }
    }
    Ok(())
}

// operand fields win; only the first level is merged
fn merge_into(target: &mut Document, operand: &Document) {
    for (key, value) in operand.iter() {
        target.insert_field(key, value.clone());
    }
}

// the empty path addresses the document itself, whose identity survives replacement
fn apply_to_root(doc: &mut Document, op: &MutationOp) -> HDocResult<()> {
    match op {
        MutationOp::Set { value, .. } | MutationOp::SetOrReplace { value, .. } => match value {
            Value::Map(replacement) => {
                let id = doc.id().cloned();
                *doc = replacement.clone();
                if let Some(id) = id {
                    if doc.id().is_none() {
                        doc.set_id(id);
                    }
                }
                Ok(())
            }
            other => Err(mismatch(format!(
                "Cannot replace a document with a {}",
                other.value_type()
            ))),
        },
        MutationOp::Delete { .. } => {
            let id = doc.remove_id();
            doc.clear();
            if let Some(id) = id {
                doc.set_id(id);
            }
            Ok(())
        }
        MutationOp::Merge { value, .. } => {
            merge_into(doc, value);
            Ok(())
        }
        other => Err(mismatch(format!(
            "Cannot apply {} to a whole document",
            other
        ))),
    }
}
