//! Order-preserving byte encoding of scalar values.
//!
//! Comparing two encodings byte-wise gives the same answer as [Value::compare] on the values
//! they encode, for every pair the latter can order. Each encoding is self-delimiting, so
//! encodings can be concatenated into composite keys. A descending component is written with
//! every byte inverted.

use crate::common::{SortOrder, Value};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use bigdecimal::BigDecimal;
use chrono::{Datelike, Timelike};

const NULL: u8 = 0x05;
const NUMBER_NAN: u8 = 0x10;
const NUMBER_NEG_INFINITY: u8 = 0x11;
const NUMBER_NEGATIVE: u8 = 0x12;
const NUMBER_ZERO: u8 = 0x13;
const NUMBER_POSITIVE: u8 = 0x14;
const NUMBER_POS_INFINITY: u8 = 0x15;
const BOOLEAN: u8 = 0x20;
const STRING: u8 = 0x30;
const BINARY: u8 = 0x40;
const DATE: u8 = 0x50;
const TIME: u8 = 0x60;
const TIMESTAMP: u8 = 0x70;

/// Appends the encoding of `value` to `out`. Containers cannot be encoded.
pub fn encode_value(value: &Value, order: SortOrder, out: &mut Vec<u8>) -> HDocResult<()> {
    let start = out.len();
    match value {
        Value::Null => out.push(NULL),
        Value::Boolean(b) => {
            out.push(BOOLEAN);
            out.push(u8::from(*b));
        }
        Value::String(s) => {
            out.push(STRING);
            encode_bytes(s.as_bytes(), out);
        }
        Value::Binary(bytes) => {
            out.push(BINARY);
            encode_bytes(bytes, out);
        }
        Value::Date(date) => {
            out.push(DATE);
            out.extend_from_slice(&flip_i32(date.num_days_from_ce()));
        }
        Value::Time(time) => {
            out.push(TIME);
            let nanos = time.num_seconds_from_midnight() as u64 * 1_000_000_000
                + time.nanosecond() as u64;
            out.extend_from_slice(&nanos.to_be_bytes());
        }
        Value::Timestamp(ts) => {
            out.push(TIMESTAMP);
            out.extend_from_slice(&flip_i64(ts.timestamp()));
            out.extend_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
        }
        Value::Array(_) | Value::Map(_) => {
            log::error!("Cannot encode a {} as a key", value.value_type());
            return Err(HDocError::new(
                &format!("Cannot encode a {} as a key", value.value_type()),
                ErrorKind::IndexingError,
            ));
        }
        number => encode_number(number, out)?,
    }
    if order.is_descending() {
        for byte in &mut out[start..] {
            *byte = !*byte;
        }
    }
    Ok(())
}

/// Encodes a document identity as a row key.
pub fn encode_id(id: &Value) -> HDocResult<Vec<u8>> {
    if id.is_null() || id.is_container() {
        log::error!("Document id must be a non-null scalar, found {}", id.value_type());
        return Err(HDocError::new(
            &format!("Document id must be a non-null scalar, found {}", id.value_type()),
            ErrorKind::InvalidId,
        ));
    }
    let mut key = Vec::new();
    encode_value(id, SortOrder::Ascending, &mut key)?;
    Ok(key)
}

// 0x00 is escaped as 0x00 0xFF and the end is marked by 0x00 0x01, so a proper prefix sorts
// before any extension of it
fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    for byte in bytes {
        out.push(*byte);
        if *byte == 0x00 {
            out.push(0xFF);
        }
    }
    out.push(0x00);
    out.push(0x01);
}

// Numbers of every width share one scale. A finite non-zero number is written as a sign tag,
// its decimal exponent and its significant digits, with the magnitude bytes inverted for
// negatives.
fn encode_number(value: &Value, out: &mut Vec<u8>) -> HDocResult<()> {
    let special = match value {
        Value::Float(f) => special_float(*f as f64),
        Value::Double(f) => special_float(*f),
        _ => None,
    };
    if let Some(tag) = special {
        out.push(tag);
        return Ok(());
    }

    let decimal = value
        .to_numeric()
        .and_then(|n| n.to_decimal())
        .ok_or_else(|| {
            log::error!("Cannot encode {} as a number", value);
            HDocError::new(
                &format!("Cannot encode {} as a number", value),
                ErrorKind::IndexingError,
            )
        })?;
    encode_decimal(&decimal, out);
    Ok(())
}

fn special_float(f: f64) -> Option<u8> {
    if f.is_nan() {
        Some(NUMBER_NAN)
    } else if f == f64::INFINITY {
        Some(NUMBER_POS_INFINITY)
    } else if f == f64::NEG_INFINITY {
        Some(NUMBER_NEG_INFINITY)
    } else {
        None
    }
}

fn encode_decimal(decimal: &BigDecimal, out: &mut Vec<u8>) {
    let (mantissa, scale) = decimal.normalized().as_bigint_and_exponent();
    let digits = mantissa.magnitude().to_string();
    if digits == "0" {
        out.push(NUMBER_ZERO);
        return;
    }
    let negative = *decimal < BigDecimal::from(0);
    // value = 0.d1d2d3... * 10^exponent
    let exponent = digits.len() as i64 - scale;

    out.push(if negative { NUMBER_NEGATIVE } else { NUMBER_POSITIVE });
    let start = out.len();
    out.extend_from_slice(&flip_i64(exponent));
    out.extend_from_slice(digits.as_bytes());
    out.push(0x00);
    if negative {
        for byte in &mut out[start..] {
            *byte = !*byte;
        }
    }
}

fn flip_i32(v: i32) -> [u8; 4] {
    ((v as u32) ^ 0x8000_0000).to_be_bytes()
}

fn flip_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
}
