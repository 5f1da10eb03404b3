//! Arbitrary-precision decimal numbers for contract arithmetic.
//!
//! Finite values are `mantissa / 10^scale` with no trailing zeros in the
//! mantissa. NaN and the two infinities are kept as explicit states so that
//! argument validation can tell them apart from real amounts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, Zero};
use serde_json::Value;

use crate::error::VmError;

/// Decimal places kept by [`BigNumber::div`].
pub const DIVISION_PLACES: u32 = 20;

/// Most decimal places a finite value carries; finer digits are truncated.
pub const MAX_SCALE: u32 = 10_000;

/// Results whose mantissa grows past this width become infinite.
const MAX_MANTISSA_BITS: u64 = 1 << 16;

#[derive(Clone, Debug)]
enum Repr {
    Finite { mantissa: BigInt, scale: u32 },
    NaN,
    Infinity { negative: bool },
}

#[derive(Clone, Debug)]
pub struct BigNumber(Repr);

fn pow10(exp: u32) -> BigInt {
    num_traits::pow(BigInt::from(10u8), exp as usize)
}

impl BigNumber {
    pub const NAN: BigNumber = BigNumber(Repr::NaN);
    pub const INFINITY: BigNumber = BigNumber(Repr::Infinity { negative: false });
    pub const NEG_INFINITY: BigNumber = BigNumber(Repr::Infinity { negative: true });

    fn finite(mut mantissa: BigInt, mut scale: u32) -> Self {
        let ten = BigInt::from(10u8);
        while scale > 0 && !mantissa.is_zero() && (&mantissa % &ten).is_zero() {
            mantissa /= &ten;
            scale -= 1;
        }
        if mantissa.is_zero() {
            scale = 0;
        }
        BigNumber(Repr::Finite { mantissa, scale })
    }

    /// Finite result of a product: truncated to [`MAX_SCALE`] places and
    /// widened to infinity past [`MAX_MANTISSA_BITS`].
    fn bounded(mut mantissa: BigInt, scale: u64) -> Self {
        let max = u64::from(MAX_SCALE);
        if scale > max {
            match u32::try_from(scale - max) {
                Ok(excess) if excess <= MAX_SCALE => mantissa /= pow10(excess),
                _ => mantissa = BigInt::zero(),
            }
        }
        let value = Self::finite(mantissa, scale.min(max) as u32);
        match &value.0 {
            Repr::Finite { mantissa, .. } if mantissa.bits() > MAX_MANTISSA_BITS => {
                Self::infinity(mantissa.is_negative())
            }
            _ => value,
        }
    }

    fn infinity(negative: bool) -> Self {
        BigNumber(Repr::Infinity { negative })
    }

    pub fn zero() -> Self {
        Self::finite(BigInt::zero(), 0)
    }

    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            Self::NAN
        } else if value.is_infinite() {
            Self::infinity(value < 0.0)
        } else {
            // Display for f64 never uses exponent notation.
            value
                .to_string()
                .parse()
                .unwrap_or(Self::NAN)
        }
    }

    /// Accepts JSON numbers and numeric strings.
    pub fn from_value(value: &Value) -> Result<Self, VmError> {
        match value {
            Value::Number(n) => n.to_string().parse(),
            Value::String(s) => s.parse(),
            other => Err(VmError::InvalidValue(format!("not a number: {}", other))),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.0, Repr::NaN)
    }

    pub fn is_finite(&self) -> bool {
        matches!(self.0, Repr::Finite { .. })
    }

    pub fn is_negative(&self) -> bool {
        match &self.0 {
            Repr::Finite { mantissa, .. } => mantissa.is_negative(),
            Repr::Infinity { negative } => *negative,
            Repr::NaN => false,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(&self.0, Repr::Finite { mantissa, .. } if mantissa.is_zero())
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.0, Repr::Finite { scale: 0, .. })
    }

    /// The value as an unsigned integer, if it is a finite, non-negative integer.
    pub fn to_biguint(&self) -> Option<BigUint> {
        match &self.0 {
            Repr::Finite { mantissa, scale: 0 } => mantissa.to_biguint(),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match &self.0 {
            Repr::NaN => f64::NAN,
            Repr::Infinity { negative: true } => f64::NEG_INFINITY,
            Repr::Infinity { negative: false } => f64::INFINITY,
            Repr::Finite { .. } => self.to_string().parse().unwrap_or(f64::NAN),
        }
    }

    pub fn negated(&self) -> Self {
        match &self.0 {
            Repr::Finite { mantissa, scale } => Self::finite(-mantissa, *scale),
            Repr::Infinity { negative } => Self::infinity(!negative),
            Repr::NaN => Self::NAN,
        }
    }

    pub fn plus(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (Repr::NaN, _) | (_, Repr::NaN) => Self::NAN,
            (Repr::Infinity { negative: a }, Repr::Infinity { negative: b }) => {
                if a == b {
                    Self::infinity(*a)
                } else {
                    Self::NAN
                }
            }
            (Repr::Infinity { negative }, _) | (_, Repr::Infinity { negative }) => {
                Self::infinity(*negative)
            }
            (
                Repr::Finite { mantissa: ma, scale: sa },
                Repr::Finite { mantissa: mb, scale: sb },
            ) => {
                let scale = (*sa).max(*sb);
                let a = ma * pow10(scale - sa);
                let b = mb * pow10(scale - sb);
                Self::finite(a + b, scale)
            }
        }
    }

    pub fn minus(&self, other: &Self) -> Self {
        self.plus(&other.negated())
    }

    pub fn times(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (Repr::NaN, _) | (_, Repr::NaN) => Self::NAN,
            (Repr::Infinity { .. }, _) | (_, Repr::Infinity { .. }) => {
                if self.is_zero() || other.is_zero() {
                    Self::NAN
                } else {
                    Self::infinity(self.is_negative() != other.is_negative())
                }
            }
            (
                Repr::Finite { mantissa: ma, scale: sa },
                Repr::Finite { mantissa: mb, scale: sb },
            ) => Self::bounded(ma * mb, u64::from(*sa) + u64::from(*sb)),
        }
    }

    /// Division truncated to [`DIVISION_PLACES`] decimal places.
    pub fn div(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (Repr::NaN, _) | (_, Repr::NaN) => Self::NAN,
            (Repr::Infinity { .. }, Repr::Infinity { .. }) => Self::NAN,
            (Repr::Infinity { .. }, _) => {
                Self::infinity(self.is_negative() != other.is_negative())
            }
            (_, Repr::Infinity { .. }) => Self::zero(),
            (
                Repr::Finite { mantissa: ma, scale: sa },
                Repr::Finite { mantissa: mb, scale: sb },
            ) => {
                if mb.is_zero() {
                    if ma.is_zero() {
                        return Self::NAN;
                    }
                    return Self::infinity(ma.is_negative());
                }
                let numerator = ma * pow10(sb + DIVISION_PLACES);
                let denominator = mb * pow10(*sa);
                Self::finite(numerator / denominator, DIVISION_PLACES)
            }
        }
    }

    /// Remainder of truncated division; takes the sign of the dividend.
    pub fn modulo(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (Repr::NaN, _) | (_, Repr::NaN) | (Repr::Infinity { .. }, _) => Self::NAN,
            (Repr::Finite { .. }, Repr::Infinity { .. }) => self.clone(),
            (
                Repr::Finite { mantissa: ma, scale: sa },
                Repr::Finite { mantissa: mb, scale: sb },
            ) => {
                if mb.is_zero() {
                    return Self::NAN;
                }
                let scale = (*sa).max(*sb);
                let a = ma * pow10(scale - sa);
                let b = mb * pow10(scale - sb);
                Self::finite(a % b, scale)
            }
        }
    }

    /// Integer power by repeated squaring; every step is bounded like `times`.
    pub fn pow(&self, exp: u32) -> Self {
        if exp == 0 && !self.is_nan() {
            return Self::finite(BigInt::from(1u8), 0);
        }
        match &self.0 {
            Repr::NaN => Self::NAN,
            Repr::Infinity { negative } => Self::infinity(*negative && exp % 2 == 1),
            Repr::Finite { .. } => {
                let mut result = Self::finite(BigInt::from(1u8), 0);
                let mut base = self.clone();
                let mut exp = exp;
                while exp > 0 {
                    if exp & 1 == 1 {
                        result = result.times(&base);
                    }
                    exp >>= 1;
                    if exp > 0 {
                        base = base.times(&base);
                    }
                }
                result
            }
        }
    }
}

impl PartialEq for BigNumber {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for BigNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (&self.0, &other.0) {
            (Repr::NaN, _) | (_, Repr::NaN) => None,
            (Repr::Infinity { negative: a }, Repr::Infinity { negative: b }) => Some(b.cmp(a)),
            (Repr::Infinity { negative }, _) => Some(if *negative {
                Ordering::Less
            } else {
                Ordering::Greater
            }),
            (_, Repr::Infinity { negative }) => Some(if *negative {
                Ordering::Greater
            } else {
                Ordering::Less
            }),
            (
                Repr::Finite { mantissa: ma, scale: sa },
                Repr::Finite { mantissa: mb, scale: sb },
            ) => {
                let scale = (*sa).max(*sb);
                let a = ma * pow10(scale - sa);
                let b = mb * pow10(scale - sb);
                Some(a.cmp(&b))
            }
        }
    }
}

impl From<u64> for BigNumber {
    fn from(value: u64) -> Self {
        Self::finite(BigInt::from(value), 0)
    }
}

impl From<i64> for BigNumber {
    fn from(value: i64) -> Self {
        Self::finite(BigInt::from(value), 0)
    }
}

impl From<BigUint> for BigNumber {
    fn from(value: BigUint) -> Self {
        Self::finite(BigInt::from_biguint(Sign::Plus, value), 0)
    }
}

impl FromStr for BigNumber {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VmError::InvalidValue(format!("not a number: {:?}", s));
        let trimmed = s.trim();

        match trimmed {
            "NaN" => return Ok(Self::NAN),
            "Infinity" | "+Infinity" => return Ok(Self::INFINITY),
            "-Infinity" => return Ok(Self::NEG_INFINITY),
            _ => {}
        }

        let (negative, body) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (number, exponent) = match body.find(|c| c == 'e' || c == 'E') {
            Some(pos) => {
                let exp: i64 = body[pos + 1..].parse().map_err(|_| invalid())?;
                (&body[..pos], exp)
            }
            None => (body, 0),
        };

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let mut mantissa: BigInt = digits.parse().map_err(|_| invalid())?;
        if negative {
            mantissa = -mantissa;
        }

        let scale = frac_part.len() as i64 - exponent;
        if scale.unsigned_abs() > u64::from(MAX_SCALE) {
            return Err(invalid());
        }
        if scale >= 0 {
            Ok(Self::finite(mantissa, scale as u32))
        } else {
            Ok(Self::finite(mantissa * pow10((-scale) as u32), 0))
        }
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::NaN => write!(f, "NaN"),
            Repr::Infinity { negative: true } => write!(f, "-Infinity"),
            Repr::Infinity { negative: false } => write!(f, "Infinity"),
            Repr::Finite { mantissa, scale } => {
                let digits = mantissa.abs().to_string();
                let sign = if mantissa.is_negative() { "-" } else { "" };
                let scale = *scale as usize;
                if scale == 0 {
                    write!(f, "{}{}", sign, digits)
                } else if digits.len() > scale {
                    let (int, frac) = digits.split_at(digits.len() - scale);
                    write!(f, "{}{}.{}", sign, int, frac)
                } else {
                    write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
                }
            }
        }
    }
}

impl serde::Serialize for BigNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for BigNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        BigNumber::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> BigNumber {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(n("123").to_string(), "123");
        assert_eq!(n("-0.50").to_string(), "-0.5");
        assert_eq!(n("0.000123").to_string(), "0.000123");
        assert_eq!(n("1.5e3").to_string(), "1500");
        assert_eq!(n("25e-3").to_string(), "0.025");
        assert_eq!(n(".5").to_string(), "0.5");
        assert_eq!(n("-0").to_string(), "0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "abc", "1.2.3", "--1", "1e", "."] {
            assert!(bad.parse::<BigNumber>().is_err(), "{:?} parsed", bad);
        }
    }

    #[test]
    fn test_special_values() {
        assert!(n("NaN").is_nan());
        assert!(!n("Infinity").is_finite());
        assert!(n("-Infinity").is_negative());
        assert!(BigNumber::from_f64(f64::NAN).is_nan());
        assert_eq!(BigNumber::from_f64(f64::NEG_INFINITY), BigNumber::NEG_INFINITY);
        assert_ne!(BigNumber::NAN, BigNumber::NAN);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(n("0.1").plus(&n("0.2")), n("0.3"));
        assert_eq!(n("5").minus(&n("7.5")), n("-2.5"));
        assert_eq!(n("1.5").times(&n("-4")), n("-6"));
        assert_eq!(n("1").div(&n("3")).to_string(), "0.33333333333333333333");
        assert_eq!(n("10").div(&n("4")), n("2.5"));
        assert_eq!(n("-7").modulo(&n("3")), n("-1"));
        assert_eq!(n("1.5").pow(2), n("2.25"));
        assert_eq!(n("2").pow(0), n("1"));
        assert_eq!(n("-0.5").pow(3), n("-0.125"));
    }

    #[test]
    fn test_non_finite_arithmetic() {
        assert!(n("Infinity").plus(&n("-Infinity")).is_nan());
        assert!(n("0").times(&n("Infinity")).is_nan());
        assert_eq!(n("1").div(&n("0")), BigNumber::INFINITY);
        assert_eq!(n("-1").div(&n("0")), BigNumber::NEG_INFINITY);
        assert!(n("0").div(&n("0")).is_nan());
        assert!(n("1").modulo(&n("0")).is_nan());
        assert_eq!(n("5").div(&n("Infinity")), n("0"));
    }

    #[test]
    fn test_ordering() {
        assert!(n("-Infinity") < n("-1000000"));
        assert!(n("1.01") > n("1.001"));
        assert!(n("Infinity") > n("1e100"));
        assert_eq!(n("NaN").partial_cmp(&n("1")), None);
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(n("42").to_biguint(), Some(BigUint::from(42u32)));
        assert_eq!(n("4.2e1").to_biguint(), Some(BigUint::from(42u32)));
        assert_eq!(n("4.2").to_biguint(), None);
        assert_eq!(n("-1").to_biguint(), None);
        assert!(n("7").is_integer());
    }

    #[test]
    fn test_from_value() {
        assert_eq!(BigNumber::from_value(&serde_json::json!(12)).unwrap(), n("12"));
        assert_eq!(BigNumber::from_value(&serde_json::json!("0.5")).unwrap(), n("0.5"));
        assert_eq!(BigNumber::from_value(&serde_json::json!(0.25)).unwrap(), n("0.25"));
        assert!(BigNumber::from_value(&serde_json::json!(null)).is_err());
        assert!(BigNumber::from_value(&serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_huge_exponent_stays_bounded() {
        assert!(n("0.01").pow(3_000_000_000).is_zero());
        assert_eq!(n("1.5").pow(3_000_000_000), BigNumber::INFINITY);
        assert_eq!(n("-2").pow(3_000_000_001), BigNumber::NEG_INFINITY);
        assert_eq!(n("1").pow(u32::MAX), n("1"));
        assert_eq!(n("-1").pow(u32::MAX), n("-1"));

        let tiny = n("0.5").pow(20_000);
        assert!(tiny.is_finite() && !tiny.is_zero());
    }

    #[test]
    fn test_product_scale_is_truncated() {
        let smallest = n("1e-10000");
        assert!(smallest.times(&smallest).is_zero());

        let product = n("3e-6000").times(&n("7e-4000"));
        assert_eq!(product, n("21e-10000"));
        assert_eq!(n("1.5e-9999").times(&n("0.3")), n("4e-10000"));
    }
}
