use crate::common::Value;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use bigdecimal::BigDecimal;
use std::str::FromStr;

fn mismatch(message: String) -> HDocError {
    log::error!("{}", message);
    HDocError::new(&message, ErrorKind::TypeMismatch)
}

/// Adds `by` to `current`, keeping the kind of `current`.
///
/// Integer kinds add in 64-bit two's complement and truncate back to their own width, so
/// `Byte(127) + 1` is `Byte(-128)`. Binary floats use IEEE addition at their own precision.
pub(crate) fn add(current: &Value, by: &Value) -> HDocResult<Value> {
    if !by.is_numeric() {
        return Err(mismatch(format!(
            "Cannot increment by a {} operand",
            by.value_type()
        )));
    }

    let result = match current {
        Value::Byte(v) => Value::Byte((*v as i64).wrapping_add(integral(by)?) as i8),
        Value::Short(v) => Value::Short((*v as i64).wrapping_add(integral(by)?) as i16),
        Value::Int(v) => Value::Int((*v as i64).wrapping_add(integral(by)?) as i32),
        Value::Long(v) => Value::Long(v.wrapping_add(integral(by)?)),
        Value::Float(v) => Value::Float(*v + floating(by)? as f32),
        Value::Double(v) => Value::Double(*v + floating(by)?),
        Value::Decimal(v) => Value::Decimal(v + decimal(by)?),
        other => {
            return Err(mismatch(format!(
                "Cannot increment a {} value",
                other.value_type()
            )))
        }
    };
    Ok(result)
}

// operand as a wrapping 64-bit integer; fractions are truncated
fn integral(by: &Value) -> HDocResult<i64> {
    match by {
        Value::Float(v) => Ok(*v as i64),
        Value::Double(v) => Ok(*v as i64),
        Value::Decimal(v) => {
            let whole = v.with_scale(0).to_string();
            let wide = i128::from_str(&whole)
                .map_err(|_| mismatch(format!("Decimal {} is too large to add", v)))?;
            Ok(wide as i64)
        }
        other => other
            .as_i64()
            .ok_or_else(|| mismatch(format!("Cannot increment by {}", other))),
    }
}

fn floating(by: &Value) -> HDocResult<f64> {
    match by {
        Value::Decimal(v) => f64::from_str(&v.to_string())
            .map_err(|_| mismatch(format!("Decimal {} is not representable", v))),
        other => other
            .as_f64()
            .ok_or_else(|| mismatch(format!("Cannot increment by {}", other))),
    }
}

fn decimal(by: &Value) -> HDocResult<BigDecimal> {
    match by {
        Value::Decimal(v) => Ok(v.clone()),
        Value::Float(v) if v.is_finite() => BigDecimal::from_str(&v.to_string())
            .map_err(|_| mismatch(format!("Float {} is not representable", v))),
        Value::Double(v) if v.is_finite() => BigDecimal::from_str(&v.to_string())
            .map_err(|_| mismatch(format!("Double {} is not representable", v))),
        other => other
            .as_i64()
            .map(BigDecimal::from)
            .ok_or_else(|| mismatch(format!("Cannot add {} to a decimal", other))),
    }
}
