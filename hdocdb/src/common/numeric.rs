use bigdecimal::BigDecimal;
use std::cmp::Ordering;
use std::str::FromStr;

/// A numeric value lifted out of its storage width, used to compare numbers of
/// different kinds on one number line.
#[derive(Debug, Clone, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Floating(f64),
    Decimal(BigDecimal),
}

impl Numeric {
    /// Orders two numerics by mathematical value. Returns `None` when either side is NaN.
    pub fn compare(&self, other: &Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => Some(a.cmp(b)),
            (Numeric::Floating(a), Numeric::Floating(b)) => a.partial_cmp(b),
            (Numeric::Integer(a), Numeric::Floating(b)) => compare_int_float(*a, *b),
            (Numeric::Floating(a), Numeric::Integer(b)) => {
                compare_int_float(*b, *a).map(Ordering::reverse)
            }
            (Numeric::Floating(f), Numeric::Decimal(_)) if f.is_nan() => None,
            (Numeric::Decimal(_), Numeric::Floating(f)) if f.is_nan() => None,
            (Numeric::Floating(f), Numeric::Decimal(_)) if f.is_infinite() => {
                Some(if *f > 0.0 { Ordering::Greater } else { Ordering::Less })
            }
            (Numeric::Decimal(_), Numeric::Floating(f)) if f.is_infinite() => {
                Some(if *f > 0.0 { Ordering::Less } else { Ordering::Greater })
            }
            (a, b) => Some(a.to_decimal()?.cmp(&b.to_decimal()?)),
        }
    }

    /// Exact decimal form of a finite numeric.
    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Numeric::Integer(i) => Some(BigDecimal::from(*i)),
            Numeric::Floating(f) if f.is_finite() => BigDecimal::from_str(&f.to_string()).ok(),
            Numeric::Floating(_) => None,
            Numeric::Decimal(d) => Some(d.clone()),
        }
    }
}

// exact comparison of an integer against a float without widening the integer
fn compare_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    // 2^63 is exactly representable; every i64 is below it
    if f >= 9_223_372_036_854_775_808.0 {
        return Some(Ordering::Less);
    }
    if f < -9_223_372_036_854_775_808.0 {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}
