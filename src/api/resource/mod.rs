// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resource quantities, following k8s.io/apimachinery/pkg/api/resource.
//!
//! The serialization format is:
//!
//! ```text
//! <quantity>        ::= <signedNumber><suffix>
//! <sign>            ::= "+" | "-"
//! <signedNumber>    ::= <number> | <sign><number>
//! <number>          ::= <digits> | <digits>.<digits> | <digits>. | .<digits>
//! <suffix>          ::= <binarySI> | <decimalExponent> | <decimalSI>
//! <binarySI>        ::= Ki | Mi | Gi | Ti | Pi | Ei
//! <decimalSI>       ::= n | u | m | "" | k | M | G | T | P | E
//! <decimalExponent> ::= "e" <signedNumber> | "E" <signedNumber>
//! ```
//!
//! Values are held as a scaled integer of nano-units. Anything finer than one
//! nano-unit is rounded up. Magnitudes above `i64::MAX` units are rejected.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Exponent of the smallest representable step (1n).
const NANO_EXPONENT: i32 = -9;

/// Largest representable magnitude in nano-units.
const MAX_NANOS: i128 = i64::MAX as i128 * NANOS_PER_UNIT;

/// Characters that may start a suffix.
const SUFFIX_CHARS: &str = "eEinumkKMGTP";

const DECIMAL_SUFFIXES: [(&str, i32); 10] = [
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

/// Binary suffixes keyed by their power of 1024.
const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

/// Errors returned when a quantity string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// The quantity string was empty.
    #[error("quantity must not be empty")]
    Empty,

    /// The quantity string does not follow the quantity grammar.
    #[error(
        "quantities must match the regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$'"
    )]
    Format,

    /// The suffix is not one of the known decimal, binary or exponent suffixes.
    #[error("unable to parse quantity's suffix {0:?}")]
    Suffix(String),

    /// The value does not fit in the representable range.
    #[error("quantity is too large")]
    Overflow,
}

/// Format records the family of suffix a quantity was written with, which
/// decides how it is serialized back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Format {
    /// e.g., 12e6
    DecimalExponent,
    /// e.g., 12Mi (12 * 2^20)
    BinarySI,
    /// e.g., 12M (12 * 10^6)
    DecimalSI,
}

/// Quantity is a fixed-point representation of a number.
///
/// Two quantities are equal when their values are equal, whatever suffix they
/// were written with: `1000m == 1` and `1Gi == 1073741824`.
#[derive(Debug, Clone, Copy)]
pub struct Quantity {
    nanos: i128,
    format: Format,
}

impl Quantity {
    /// Parse a quantity string such as "500m", "1Gi" or "12e6".
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let literal = Literal::split(s)?;
        let (scale, format) = interpret_suffix(literal.suffix)
            .ok_or_else(|| QuantityError::Suffix(literal.suffix.to_string()))?;

        let magnitude = literal.magnitude_nanos(scale)?;
        Ok(Self {
            nanos: if literal.negative { -magnitude } else { magnitude },
            format,
        })
    }

    /// Returns true if the quantity is equal to zero.
    pub fn is_zero(&self) -> bool {
        self.nanos == 0
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

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Writes the canonical form of the quantity.
///
/// Binary quantities keep a binary suffix only when the value is a whole
/// number of at least 1024; everything else is written with the largest
/// decimal exponent that is a multiple of three and keeps the mantissa whole.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0");
        }

        if self.format == Format::BinarySI
            && self.nanos.abs() >= 1024 * NANOS_PER_UNIT
            && self.nanos % NANOS_PER_UNIT == 0
        {
            let (mantissa, power) = remove_factors(self.nanos / NANOS_PER_UNIT, 1024);
            let suffix = BINARY_SUFFIXES
                .iter()
                .find(|(_, p)| *p == power)
                .map_or("", |(s, _)| *s);
            return write!(f, "{}{}", mantissa, suffix);
        }

        let (mut mantissa, times) = remove_factors(self.nanos, 10);
        let mut exponent = NANO_EXPONENT + times as i32;
        match exponent.rem_euclid(3) {
            1 => {
                mantissa *= 10;
                exponent -= 1;
            }
            2 => {
                mantissa *= 100;
                exponent -= 2;
            }
            _ => {}
        }

        match self.format {
            Format::DecimalExponent if exponent == 0 => write!(f, "{}", mantissa),
            Format::DecimalExponent => write!(f, "{}e{}", mantissa, exponent),
            _ => match DECIMAL_SUFFIXES.iter().find(|(_, e)| *e == exponent) {
                Some((suffix, _)) => write!(f, "{}{}", mantissa, suffix),
                None => write!(f, "{}e{}", mantissa, exponent),
            },
        }
    }
}

/// How a suffix scales the written number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    /// Multiply by 10^n.
    Decimal(i32),
    /// Multiply by 1024^n.
    Binary(u32),
}

fn interpret_suffix(suffix: &str) -> Option<(Scale, Format)> {
    if let Some((_, exponent)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((Scale::Decimal(*exponent), Format::DecimalSI));
    }
    if let Some((_, power)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((Scale::Binary(*power), Format::BinarySI));
    }
    if suffix.len() > 1 && (suffix.starts_with('e') || suffix.starts_with('E')) {
        let exponent = suffix[1..].parse::<i32>().ok()?;
        return Some((Scale::Decimal(exponent), Format::DecimalExponent));
    }
    None
}

/// The pieces of a quantity string, before any arithmetic.
#[derive(Debug, PartialEq, Eq)]
struct Literal<'a> {
    negative: bool,
    whole: &'a str,
    fraction: &'a str,
    suffix: &'a str,
}

impl<'a> Literal<'a> {
    fn split(s: &'a str) -> Result<Self, QuantityError> {
        let bytes = s.as_bytes();
        let mut pos = 0;

        let negative = match bytes.first() {
            Some(b'-') => {
                pos += 1;
                true
            }
            Some(b'+') => {
                pos += 1;
                false
            }
            _ => false,
        };

        let whole_start = pos;
        pos += leading_digits(&bytes[pos..]);
        let whole = &s[whole_start..pos];

        let mut fraction = "";
        if bytes.get(pos) == Some(&b'.') {
            pos += 1;
            let fraction_start = pos;
            pos += leading_digits(&bytes[pos..]);
            fraction = &s[fraction_start..pos];
        }

        if whole.is_empty() && fraction.is_empty() {
            return Err(QuantityError::Format);
        }

        let suffix = &s[pos..];
        let rest = suffix.trim_start_matches(|c: char| SUFFIX_CHARS.contains(c));
        let rest = rest.strip_prefix(['+', '-']).unwrap_or(rest);
        if !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QuantityError::Format);
        }

        Ok(Self {
            negative,
            whole,
            fraction,
            suffix,
        })
    }

    /// Absolute value in nano-units, rounded up. Fails above `MAX_NANOS`.
    fn magnitude_nanos(&self, scale: Scale) -> Result<i128, QuantityError> {
        let mut digits: Vec<u8> = self
            .whole
            .bytes()
            .chain(self.fraction.bytes())
            .map(|b| b - b'0')
            .skip_while(|d| *d == 0)
            .collect();
        if digits.is_empty() {
            return Ok(0);
        }

        let mut shift = i64::from(-NANO_EXPONENT) - self.fraction.len() as i64;
        match scale {
            Scale::Decimal(exponent) => shift += i64::from(exponent),
            Scale::Binary(power) => multiply_digits(&mut digits, 1u64 << (10 * power)),
        }

        if shift >= 0 {
            // Any non-zero value with this many digits is far above the cap.
            if digits.len() as i64 + shift > 40 {
                return Err(QuantityError::Overflow);
            }
            digits.resize(digits.len() + shift as usize, 0);
            return digits_to_nanos(&digits);
        }

        let dropped = usize::try_from(shift.unsigned_abs()).unwrap_or(usize::MAX);
        if dropped >= digits.len() {
            // Non-zero amounts below one nano-unit round up to 1n.
            return Ok(1);
        }
        let (kept, rest) = digits.split_at(digits.len() - dropped);
        let nanos = digits_to_nanos(kept)?;
        if rest.iter().any(|d| *d != 0) {
            checked_max(nanos + 1)
        } else {
            Ok(nanos)
        }
    }
}

fn leading_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Multiplies a big-endian decimal digit string in place.
fn multiply_digits(digits: &mut Vec<u8>, factor: u64) {
    let mut carry: u128 = 0;
    for digit in digits.iter_mut().rev() {
        let product = u128::from(*digit) * u128::from(factor) + carry;
        *digit = (product % 10) as u8;
        carry = product / 10;
    }

    let mut head = Vec::new();
    while carry > 0 {
        head.push((carry % 10) as u8);
        carry /= 10;
    }
    head.reverse();
    digits.splice(0..0, head);
}

fn digits_to_nanos(digits: &[u8]) -> Result<i128, QuantityError> {
    digits
        .iter()
        .try_fold(0i128, |acc, d| acc.checked_mul(10)?.checked_add(i128::from(*d)))
        .ok_or(QuantityError::Overflow)
        .and_then(checked_max)
}

fn checked_max(nanos: i128) -> Result<i128, QuantityError> {
    if nanos > MAX_NANOS {
        Err(QuantityError::Overflow)
    } else {
        Ok(nanos)
    }
}

fn remove_factors(mut value: i128, base: i128) -> (i128, u32) {
    let mut times = 0;
    while value != 0 && value % base == 0 {
        value /= base;
        times += 1;
    }
    (value, times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap_or_else(|e| panic!("{:?} should parse: {}", s, e))
    }

    #[test]
    fn test_parse_valid() {
        let cases = [
            ("0", 0),
            ("1", NANOS_PER_UNIT),
            ("+1", NANOS_PER_UNIT),
            ("-1", -NANOS_PER_UNIT),
            ("500m", 500_000_000),
            ("1.5", 1_500_000_000),
            ("1.", NANOS_PER_UNIT),
            (".5", 500_000_000),
            ("007", 7 * NANOS_PER_UNIT),
            ("1n", 1),
            ("1u", 1_000),
            ("1k", 1_000 * NANOS_PER_UNIT),
            ("1M", 1_000_000 * NANOS_PER_UNIT),
            ("1G", 1_000_000_000 * NANOS_PER_UNIT),
            ("1E", 1_000_000_000_000_000_000 * NANOS_PER_UNIT),
            ("1Ki", 1024 * NANOS_PER_UNIT),
            ("1Mi", 1024 * 1024 * NANOS_PER_UNIT),
            ("1Gi", 1024 * 1024 * 1024 * NANOS_PER_UNIT),
            ("1.5Gi", 1_610_612_736 * NANOS_PER_UNIT),
            ("1e3", 1_000 * NANOS_PER_UNIT),
            ("1E3", 1_000 * NANOS_PER_UNIT),
            ("1e+3", 1_000 * NANOS_PER_UNIT),
            ("1e-3", 1_000_000),
            ("12e6", 12_000_000 * NANOS_PER_UNIT),
        ];
        for (input, nanos) in cases {
            assert_eq!(q(input).nanos, nanos, "parsing {:?}", input);
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Quantity::parse(""), Err(QuantityError::Empty));

        let format_errors = [
            " 1", "1 ", "1x", "abc", ".", "-", "--1", "1.1.1", "1e3.5", "Ki", "1KI",
        ];
        for input in format_errors {
            assert_eq!(
                Quantity::parse(input),
                Err(QuantityError::Format),
                "parsing {:?}",
                input
            );
        }

        let suffix_errors = ["1K", "1e", "1Gi5", "1mi", "1ki", "1i"];
        for input in suffix_errors {
            assert!(
                matches!(Quantity::parse(input), Err(QuantityError::Suffix(_))),
                "parsing {:?} gave {:?}",
                input,
                Quantity::parse(input)
            );
        }
    }

    #[test]
    fn test_parse_rounds_up_below_nano() {
        assert_eq!(q("1e-10").nanos, 1);
        assert_eq!(q("0.0000000001").nanos, 1);
        assert_eq!(q("1.0000000001").nanos, NANOS_PER_UNIT + 1);
        assert_eq!(q("-1e-12").nanos, -1);
        assert_eq!(q("0.000000000").nanos, 0);
    }

    #[test]
    fn test_parse_rejects_values_above_range() {
        assert_eq!(q("9223372036854775807").nanos, MAX_NANOS);
        assert_eq!(q("-9223372036854775807").nanos, -MAX_NANOS);
        assert_eq!(q("7Ei").nanos, 7 * (1i128 << 60) * NANOS_PER_UNIT);

        let too_large = [
            "9223372036854775808",
            "9223372036854775807.1",
            "99999999999999999999",
            "1e19",
            "2e19",
            "10E",
            "8Ei",
            "1e100",
            "-1e100",
        ];
        for input in too_large {
            assert_eq!(
                Quantity::parse(input),
                Err(QuantityError::Overflow),
                "parsing {:?}",
                input
            );
        }
    }

    #[test]
    fn test_canonical_string() {
        let cases = [
            ("0", "0"),
            ("-0", "0"),
            ("0Gi", "0"),
            ("1", "1"),
            ("+1", "1"),
            ("2", "2"),
            ("-1", "-1"),
            ("1000m", "1"),
            ("0.5", "500m"),
            ("500m", "500m"),
            ("1.5", "1500m"),
            ("1n", "1n"),
            ("1500n", "1500n"),
            ("1e-10", "1e-9"),
            ("0.0000000001", "1n"),
            ("1000000k", "1G"),
            ("1G", "1G"),
            ("1E", "1E"),
            ("1Ki", "1Ki"),
            ("1024Ki", "1Mi"),
            ("100Mi", "100Mi"),
            ("1Gi", "1Gi"),
            ("2Gi", "2Gi"),
            ("1.5Gi", "1536Mi"),
            ("0.5Ki", "512"),
            ("1.1Gi", "1181116006400m"),
            ("-2Gi", "-2Gi"),
            ("1e3", "1e3"),
            ("12e6", "12e6"),
            ("1.5e3", "1500"),
            ("1e-3", "1e-3"),
            ("9223372036854775807", "9223372036854775807"),
        ];
        for (input, canonical) in cases {
            assert_eq!(q(input).to_string(), canonical, "canonical form of {:?}", input);
        }
    }

    #[test]
    fn test_format_from_suffix() {
        assert_eq!(q("1").format, Format::DecimalSI);
        assert_eq!(q("1m").format, Format::DecimalSI);
        assert_eq!(q("1Mi").format, Format::BinarySI);
        assert_eq!(q("1e6").format, Format::DecimalExponent);
        assert_eq!(q("1E").format, Format::DecimalSI);
    }

    #[test]
    fn test_comparison_ignores_suffix() {
        assert_eq!(q("1000m"), q("1"));
        assert_eq!(q("1Gi"), q("1073741824"));
        assert_eq!(q("1k"), q("1e3"));
        assert_eq!(q("1024Mi").cmp(&q("1Gi")), Ordering::Equal);
        assert!(q("500m") < q("1"));
        assert!(q("2") > q("1"));
        assert!(q("1Gi") > q("1G"));
        assert!(q("-1") < q("0"));
        assert!(q("1n") > q("0"));
    }

    #[test]
    fn test_zero_is_a_value() {
        let zero = q("0");
        assert!(zero.is_zero());
        assert_eq!(zero, q("0m"));
        assert!(!q("1n").is_zero());
    }

    #[test]
    fn test_from_str() {
        let parsed: Quantity = "128Mi".parse().unwrap();
        assert_eq!(parsed, q("134217728"));
        assert!("1x".parse::<Quantity>().is_err());
    }

    fn quantity_literal() -> impl Strategy<Value = String> {
        let suffix = prop::sample::select(vec![
            "", "n", "u", "m", "k", "M", "G", "T", "P", "E", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei",
            "e3", "e-3", "E6", "e0",
        ]);
        (
            prop::sample::select(vec!["", "-", "+"]),
            "[0-9]{1,12}",
            prop::option::of("[0-9]{0,12}"),
            suffix,
        )
            .prop_map(|(sign, whole, fraction, suffix)| match fraction {
                Some(fraction) => format!("{}{}.{}{}", sign, whole, fraction, suffix),
                None => format!("{}{}{}", sign, whole, suffix),
            })
    }

    proptest! {
        #[test]
        fn prop_canonical_form_round_trips(literal in quantity_literal()) {
            let parsed = match Quantity::parse(&literal) {
                Ok(parsed) => parsed,
                Err(err) => {
                    prop_assert_eq!(err, QuantityError::Overflow);
                    return Ok(());
                }
            };
            let reparsed = q(&parsed.to_string());
            prop_assert_eq!(reparsed, parsed);
            prop_assert_eq!(reparsed.to_string(), parsed.to_string());
        }

        #[test]
        fn prop_binary_and_plain_forms_are_equal(value in 0i64..1_000_000, power in 1u32..4) {
            let binary = BINARY_SUFFIXES[(power - 1) as usize].0;
            let plain = i128::from(value) << (10 * power);
            prop_assert_eq!(q(&format!("{}{}", value, binary)), q(&plain.to_string()));
        }

        #[test]
        fn prop_milli_and_unit_forms_are_equal(value in 0i64..1_000_000_000) {
            prop_assert_eq!(q(&format!("{}000m", value)), q(&value.to_string()));
        }
    }
}
