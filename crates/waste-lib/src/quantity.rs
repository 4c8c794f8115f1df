//! Resource quantities
//!
//! Exact representation of Kubernetes resource amounts such as `500m`,
//! `128Mi` or `1e3`. Values are held as an integer count of nano-units so
//! that sums and ratios never pick up floating point drift; a float only
//! appears when a percentage is produced.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

const NANOS_PER_UNIT: u128 = 1_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Largest magnitude accepted on parse, the int64 range Kubernetes scales into
const MAX_NANOS: i128 = i64::MAX as i128 * NANOS_PER_UNIT as i128;

const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

const BINARY_SUFFIXES: &[&str] = &["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// Error returned when a quantity string cannot be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid quantity {input:?}: {reason}")]
pub struct ParseError {
    pub input: String,
    pub reason: &'static str,
}

/// Notation a quantity was written in, kept so it renders the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantityFormat {
    /// Decimal SI suffixes (`500m`, `2k`, `1G`)
    #[default]
    DecimalSi,
    /// Binary SI suffixes (`128Mi`, `1Gi`)
    BinarySi,
    /// Decimal exponent (`1e3`)
    DecimalExponent,
}

#[derive(Debug, Clone, Copy)]
enum Scale {
    Decimal(i32),
    Binary(u32),
}

/// An exact resource amount
///
/// Equality, ordering and hashing look at the numeric value only, so
/// `1000m == 1` regardless of how either side was written.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    nanos: i128,
    format: QuantityFormat,
}

impl Quantity {
    /// The zero quantity, meaning "not requested"
    pub const fn zero() -> Self {
        Self {
            nanos: 0,
            format: QuantityFormat::DecimalSi,
        }
    }

    /// Build a quantity from milli-units (`from_milli(250)` is `250m`)
    pub fn from_milli(milli: i64) -> Self {
        Self {
            nanos: i128::from(milli) * NANOS_PER_MILLI,
            format: QuantityFormat::DecimalSi,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    /// Exact value in nano-units
    pub fn nano_value(&self) -> i128 {
        self.nanos
    }

    /// Value in milli-units, rounded away from zero
    pub fn milli_value(&self) -> i128 {
        let magnitude = self.nanos.unsigned_abs().div_ceil(NANOS_PER_MILLI as u128) as i128;
        if self.nanos < 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Sum of two quantities, `None` on overflow
    ///
    /// Keeps this quantity's notation unless it is zero, in which case the
    /// result takes the notation of `other`.
    pub fn checked_add(&self, other: &Quantity) -> Option<Quantity> {
        let format = if self.is_zero() {
            other.format
        } else {
            self.format
        };
        Some(Quantity {
            nanos: self.nanos.checked_add(other.nanos)?,
            format,
        })
    }

    /// `self / whole * 100`, or `None` when `whole` is zero
    ///
    /// The fraction is reduced before converting to floating point, so any
    /// ratio with an exact binary representation comes out exact.
    pub fn percent_of(&self, whole: &Quantity) -> Option<f64> {
        if whole.is_zero() {
            return None;
        }
        let Some(numerator) = self.nanos.checked_mul(100) else {
            return Some(self.nanos as f64 / whole.nanos as f64 * 100.0);
        };
        let divisor = gcd(numerator.unsigned_abs(), whole.nanos.unsigned_abs());
        let divisor = i128::try_from(divisor).unwrap_or(1);
        Some((numerator / divisor) as f64 / (whole.nanos / divisor) as f64)
    }

    fn binary_parts(&self) -> Option<(u128, &'static str)> {
        let magnitude = self.nanos.unsigned_abs();
        if magnitude % NANOS_PER_UNIT != 0 {
            return None;
        }
        let mut units = magnitude / NANOS_PER_UNIT;
        if units < 1024 {
            return None;
        }
        let mut index = 0;
        while index + 1 < BINARY_SUFFIXES.len() && units % 1024 == 0 {
            units /= 1024;
            index += 1;
        }
        Some((units, BINARY_SUFFIXES[index]))
    }

    fn decimal_parts(&self) -> (u128, i32) {
        let mut mantissa = self.nanos.unsigned_abs();
        let mut exponent = -9;
        while exponent < 18 && mantissa % 1000 == 0 {
            mantissa /= 1000;
            exponent += 3;
        }
        (mantissa, exponent)
    }
}

impl FromStr for Quantity {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let error = |reason| ParseError {
            input: input.to_string(),
            reason,
        };

        if input.is_empty() {
            return Err(error("empty value"));
        }

        let (negative, unsigned) = match input.as_bytes()[0] {
            b'-' => (true, &input[1..]),
            b'+' => (false, &input[1..]),
            _ => (false, input),
        };

        let (integer, rest) = split_digits(unsigned);
        let (fraction, suffix) = match rest.strip_prefix('.') {
            Some(after_point) => split_digits(after_point),
            None => ("", rest),
        };
        if integer.is_empty() && fraction.is_empty() {
            return Err(error("missing digits"));
        }

        let (scale, format) = parse_suffix(suffix).ok_or_else(|| error("unknown suffix"))?;
        let nanos = scale_to_nanos(integer, fraction, scale)
            .filter(|nanos| *nanos <= MAX_NANOS)
            .ok_or_else(|| error("value out of range"))?;

        Ok(Quantity {
            nanos: if negative { -nanos } else { nanos },
            format,
        })
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn parse_suffix(suffix: &str) -> Option<(Scale, QuantityFormat)> {
    if let Some((_, exponent)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((Scale::Decimal(*exponent), QuantityFormat::DecimalSi));
    }
    if let Some(power) = BINARY_SUFFIXES.iter().skip(1).position(|s| *s == suffix) {
        return Some((Scale::Binary(power as u32 + 1), QuantityFormat::BinarySi));
    }
    let exponent = suffix.strip_prefix(['e', 'E'])?;
    let exponent: i32 = exponent.parse().ok()?;
    Some((Scale::Decimal(exponent), QuantityFormat::DecimalExponent))
}

/// Sub-nano remainders round away from zero.
fn scale_to_nanos(integer: &str, fraction: &str, scale: Scale) -> Option<i128> {
    let mut mantissa: i128 = 0;
    for digit in integer.bytes().chain(fraction.bytes()) {
        mantissa = mantissa
            .checked_mul(10)?
            .checked_add(i128::from(digit - b'0'))?;
    }

    let (exponent, binary_power) = match scale {
        Scale::Decimal(exponent) => (exponent, 0),
        Scale::Binary(power) => (0, power),
    };
    let mantissa = mantissa.checked_mul(1024i128.checked_pow(binary_power)?)?;

    let shift = i64::from(exponent) + 9 - fraction.len() as i64;
    if shift >= 0 {
        mantissa.checked_mul(10i128.checked_pow(u32::try_from(shift).ok()?)?)
    } else {
        let divisor = 10i128.checked_pow(u32::try_from(-shift).ok()?)?;
        Some((mantissa as u128).div_ceil(divisor as u128) as i128)
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let sign = if self.nanos < 0 { "-" } else { "" };

        if self.format == QuantityFormat::BinarySi {
            if let Some((units, suffix)) = self.binary_parts() {
                return write!(f, "{sign}{units}{suffix}");
            }
        }

        let (mantissa, exponent) = self.decimal_parts();
        if self.format == QuantityFormat::DecimalExponent {
            if exponent == 0 {
                return write!(f, "{sign}{mantissa}");
            }
            return write!(f, "{sign}{mantissa}e{exponent}");
        }

        let suffix = DECIMAL_SUFFIXES
            .iter()
            .find(|(_, e)| *e == exponent)
            .map(|(s, _)| *s)
            .unwrap_or_default();
        write!(f, "{sign}{mantissa}{suffix}")
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

/// Panics on overflow, like integer addition. Parsed values are capped at
/// `i64::MAX` units, so it takes more than 10^10 of them to get there.
impl Add for Quantity {
    type Output = Quantity;

    fn add(self, other: Quantity) -> Quantity {
        match self.checked_add(&other) {
            Some(sum) => sum,
            None => panic!("quantity overflow adding {other} to {self}"),
        }
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |total, q| total + q)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_decimal_suffixes() {
        assert_eq!(q("500m").milli_value(), 500);
        assert_eq!(q("1").milli_value(), 1000);
        assert_eq!(q("0.5").milli_value(), 500);
        assert_eq!(q("2k").milli_value(), 2_000_000);
        assert_eq!(q("250u").nano_value(), 250_000);
        assert_eq!(q("+3").milli_value(), 3000);
        assert_eq!(q("-1").milli_value(), -1000);
    }

    #[test]
    fn test_parse_binary_suffixes() {
        assert_eq!(q("1Ki").milli_value(), 1024 * 1000);
        assert_eq!(q("128Mi").milli_value(), 128 * 1024 * 1024 * 1000);
        assert_eq!(q("1Gi").format(), QuantityFormat::BinarySi);
    }

    #[test]
    fn test_parse_exponent() {
        assert_eq!(q("1e3"), q("1k"));
        assert_eq!(q("5E-3"), q("5m"));
        assert_eq!(q("1e3").format(), QuantityFormat::DecimalExponent);
        // A bare `E` is the exa suffix, not an exponent
        assert_eq!(q("1E"), q("1e18"));
    }

    #[test]
    fn test_nanocores_round_up_to_milli() {
        // metrics-server reports CPU in nanocores
        let usage = q("123456n");
        assert_eq!(usage.nano_value(), 123_456);
        assert_eq!(usage.milli_value(), 1);
    }

    #[test]
    fn test_sub_nano_fraction_rounds_up() {
        assert_eq!(q("0.1n").nano_value(), 1);
    }

    #[test]
    fn test_parse_errors() {
        for input in ["", "abc", "1x", "1.2.3", ".", "-", "1e", "Mi", "1 Mi"] {
            let err = input.parse::<Quantity>().unwrap_err();
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = "1e60".parse::<Quantity>().unwrap_err();
        assert_eq!(err.reason, "value out of range");
    }

    #[test]
    fn test_equality_ignores_notation() {
        assert_eq!(q("1000m"), q("1"));
        assert_eq!(q("1024"), q("1Ki"));
        assert!(q("500m") < q("1"));
        assert!(q("0").is_zero());
        assert!(Quantity::default().is_zero());
    }

    #[test]
    fn test_canonical_decimal() {
        assert_eq!(q("500m").to_string(), "500m");
        assert_eq!(q("1000m").to_string(), "1");
        assert_eq!(q("1.5").to_string(), "1500m");
        assert_eq!(q("1000").to_string(), "1k");
        assert_eq!(q("128974848").to_string(), "128974848");
        assert_eq!(q("123456n").to_string(), "123456n");
        assert_eq!(q("0").to_string(), "0");
        assert_eq!(q("-250m").to_string(), "-250m");
    }

    #[test]
    fn test_canonical_binary() {
        assert_eq!(q("1024Mi").to_string(), "1Gi");
        assert_eq!(q("1.5Gi").to_string(), "1536Mi");
        // Below 1Ki or fractional bytes fall back to decimal
        assert_eq!(q("0.5Ki").to_string(), "512");
        assert_eq!(q("1.0001Ki").to_string(), "1024102400u");
    }

    #[test]
    fn test_canonical_exponent() {
        assert_eq!(q("1e3").to_string(), "1e3");
        assert_eq!(q("12e2").to_string(), "1200");
    }

    #[test]
    fn test_add_keeps_receiver_format() {
        assert_eq!((q("0.5") + q("0.5")).to_string(), "1");
        assert_eq!((q("128Mi") + q("128Mi")).to_string(), "256Mi");
        assert_eq!((q("1k") + q("1Ki")).to_string(), "2024");
    }

    #[test]
    fn test_add_on_zero_takes_other_format() {
        let total = Quantity::zero() + q("64Mi");
        assert_eq!(total.format(), QuantityFormat::BinarySi);
        assert_eq!(total.to_string(), "64Mi");

        let total = Quantity::zero().checked_add(&q("1Gi")).unwrap();
        assert_eq!(total.to_string(), "1Gi");
    }

    #[test]
    fn test_checked_add_reports_overflow() {
        let near_max = Quantity {
            nanos: i128::MAX - 1,
            format: QuantityFormat::DecimalSi,
        };
        assert_eq!(near_max.checked_add(&q("1n")).map(|q| q.nano_value()), Some(i128::MAX));
        assert!(near_max.checked_add(&q("2n")).is_none());
    }

    #[test]
    fn test_parse_caps_at_int64_units() {
        assert_eq!(q("9223372036854775807").nano_value(), MAX_NANOS);
        assert_eq!(q("-9E").milli_value(), -9_000_000_000_000_000_000_000);

        let err = "9223372036854775808".parse::<Quantity>().unwrap_err();
        assert_eq!(err.reason, "value out of range");
        let err = "8Ei".parse::<Quantity>().unwrap_err();
        assert_eq!(err.reason, "value out of range");
    }

    #[test]
    fn test_sum() {
        let total: Quantity = ["100m", "250m", "650m"].iter().map(|s| q(s)).sum();
        assert_eq!(total, q("1"));
        assert_eq!(total.to_string(), "1");
    }

    #[test]
    fn test_percent_of_is_exact() {
        assert_eq!(q("100m").percent_of(&q("500m")), Some(20.0));
        assert_eq!(q("10m").percent_of(&q("1")), Some(1.0));
        assert_eq!(q("200m").percent_of(&q("1")), Some(20.0));
        assert_eq!(q("0").percent_of(&q("1Gi")), Some(0.0));
        assert_eq!(q("3").percent_of(&q("2")), Some(150.0));
    }

    #[test]
    fn test_percent_of_zero_is_undefined() {
        assert_eq!(q("100m").percent_of(&Quantity::zero()), None);
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let json = serde_json::to_string(&q("1024Mi")).unwrap();
        assert_eq!(json, "\"1Gi\"");

        let parsed: Quantity = serde_json::from_str("\"250m\"").unwrap();
        assert_eq!(parsed, Quantity::from_milli(250));

        assert!(serde_json::from_str::<Quantity>("\"bogus\"").is_err());
    }
}
