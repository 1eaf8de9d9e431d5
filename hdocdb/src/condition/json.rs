use crate::collection::Document;
use crate::common::{Value, ValueType};
use crate::condition::{CompareOp, Condition, Pattern};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::path::compile;

/// Reads `{"a": 1, "b": {"$gt": 2, "$lt": 9}, "$or": [{..}, {..}]}`. The fields of one
/// document are conjoined.
pub(super) fn from_document(doc: &Document) -> HDocResult<Condition> {
    let mut conjuncts = conjunction(doc)?;
    if conjuncts.len() == 1 {
        return Ok(conjuncts.remove(0));
    }
    Ok(Condition::And(conjuncts))
}

fn conjunction(doc: &Document) -> HDocResult<Vec<Condition>> {
    let mut conjuncts = Vec::new();
    for (key, value) in doc.iter() {
        match key.as_str() {
            "$and" => conjuncts.push(Condition::And(clauses(key, value)?)),
            "$or" => conjuncts.push(Condition::Or(clauses(key, value)?)),
            operator if operator.starts_with('$') => {
                return Err(condition_error(&format!(
                    "Unknown top-level operator {}",
                    operator
                )))
            }
            path => field_conditions(path, value, &mut conjuncts)?,
        }
    }
    Ok(conjuncts)
}

fn clauses(operator: &str, value: &Value) -> HDocResult<Vec<Condition>> {
    let Some(items) = value.as_array() else {
        return Err(condition_error(&format!("{} expects an array of conditions", operator)));
    };
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let Some(clause) = item.as_map() else {
            return Err(condition_error(&format!(
                "{} expects documents, found {}",
                operator,
                item.value_type()
            )));
        };
        result.push(from_document(clause)?);
    }
    Ok(result)
}

fn field_conditions(path: &str, value: &Value, out: &mut Vec<Condition>) -> HDocResult<()> {
    let path = compile(path)?;
    let operators = match value {
        Value::Map(operators) if operators.keys().next().is_some_and(|k| k.starts_with('$')) => operators,
        literal => {
            out.push(Condition::Compare {
                path,
                op: CompareOp::Eq,
                value: literal.clone(),
            });
            return Ok(());
        }
    };

    for (operator, operand) in operators.iter() {
        let path = path.clone();
        let compare = |op| Condition::Compare {
            path: path.clone(),
            op,
            value: operand.clone(),
        };
        let condition = match operator.as_str() {
            "$eq" => compare(CompareOp::Eq),
            "$ne" => compare(CompareOp::Ne),
            "$lt" => compare(CompareOp::Lt),
            "$lte" => compare(CompareOp::Le),
            "$gt" => compare(CompareOp::Gt),
            "$gte" => compare(CompareOp::Ge),
            "$in" => Condition::In {
                path,
                values: values_of(operator, operand)?,
            },
            "$nin" => Condition::NotIn {
                path,
                values: values_of(operator, operand)?,
            },
            "$exists" => match operand.as_bool() {
                Some(true) => Condition::Exists { path },
                Some(false) => Condition::NotExists { path },
                None => return Err(condition_error("$exists expects a boolean")),
            },
            "$type" => {
                let value_type = operand
                    .as_str()
                    .and_then(ValueType::from_name)
                    .ok_or_else(|| condition_error(&format!("Unknown type {}", operand)))?;
                Condition::TypeOf { path, value_type }
            }
            "$regex" => {
                let Some(expression) = operand.as_str() else {
                    return Err(condition_error("$regex expects a string"));
                };
                Condition::Matches {
                    path,
                    pattern: Pattern::regex(expression)?,
                }
            }
            unknown => {
                return Err(condition_error(&format!("Unknown condition operator {}", unknown)))
            }
        };
        out.push(condition);
    }
    Ok(())
}

fn values_of(operator: &str, operand: &Value) -> HDocResult<Vec<Value>> {
    match operand.as_array() {
        Some(values) => Ok(values.clone()),
        None => Err(condition_error(&format!("{} expects an array", operator))),
    }
}

fn condition_error(message: &str) -> HDocError {
    log::error!("{}", message);
    HDocError::new(message, ErrorKind::ConditionError)
}
