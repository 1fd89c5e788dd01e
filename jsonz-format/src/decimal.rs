//! Exact decimals and their canonical text form
//!
//! Decimals are stored in the string dictionary as text. The canonical text
//! always reads back as a non-integer JSON number (it contains `.` or `e`), so
//! a decimal never collapses into an integer on the way through.

use std::fmt;
use std::str::FromStr;

use crate::error::{JsonzError, Result};

/// Default cap on decimal digits.
pub const DEFAULT_MAX_DIGITS: usize = 65_536;

/// Decimal number with exact representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    /// Sign: false = non-negative, true = negative
    pub negative: bool,
    /// ASCII digits '0'..'9', MSB-first, no leading zeros
    pub digits: Vec<u8>,
    /// Base-10 exponent
    pub exponent: i32,
}

impl Decimal {
    /// Parse from JSON number text
    pub fn from_str_exact(s: &str) -> Result<Self> {
        Self::from_str_with_limit(s, DEFAULT_MAX_DIGITS)
    }

    /// Parse from JSON number text with a digit cap
    pub fn from_str_with_limit(s: &str, max_digits: usize) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid(s));
        }

        let (negative, s) = match s.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, s),
        };

        // Parse scientific notation
        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(e_pos) => {
                let exp_str = &s[e_pos + 1..];
                let exp: i32 = exp_str.parse().map_err(|_| invalid(s))?;
                (&s[..e_pos], exp)
            }
            None => (s, 0),
        };

        let (digits, decimal_places) = Self::parse_mantissa(mantissa)?;
        let exponent = i32::try_from(decimal_places)
            .ok()
            .and_then(|places| exponent.checked_sub(places))
            .ok_or_else(|| invalid(s))?;

        let digits = Self::remove_leading_zeros(digits);

        if digits.len() > max_digits {
            return Err(JsonzError::ResourceLimitExceeded(format!(
                "decimal with {} digits exceeds limit {}",
                digits.len(),
                max_digits
            )));
        }

        Ok(Self {
            negative,
            digits,
            exponent,
        })
    }

    /// Parse mantissa and return (digits, decimal_places)
    fn parse_mantissa(s: &str) -> Result<(Vec<u8>, usize)> {
        let mut digits = Vec::with_capacity(s.len());
        let mut decimal_places = 0;
        let mut found_dot = false;

        for ch in s.bytes() {
            match ch {
                b'0'..=b'9' => {
                    digits.push(ch);
                    if found_dot {
                        decimal_places += 1;
                    }
                }
                b'.' if !found_dot => found_dot = true,
                _ => return Err(invalid(s)),
            }
        }

        if digits.is_empty() {
            return Err(invalid(s));
        }

        Ok((digits, decimal_places))
    }

    /// Remove leading zeros (except for "0" itself)
    fn remove_leading_zeros(digits: Vec<u8>) -> Vec<u8> {
        let first = digits
            .iter()
            .position(|&d| d != b'0')
            .unwrap_or(digits.len() - 1);
        if first == 0 {
            digits
        } else {
            digits[first..].to_vec()
        }
    }

    /// Canonical text form stored in the string dictionary
    pub fn to_canonical_string(&self) -> String {
        let mut result = String::with_capacity(self.digits.len() + 8);
        if self.negative {
            result.push('-');
        }
        let digits = std::str::from_utf8(&self.digits).unwrap_or("0");

        if self.exponent >= 0 || self.exponent < -6 {
            // d.ddd e±x
            let (lead, rest) = digits.split_at(1);
            result.push_str(lead);
            if !rest.is_empty() {
                result.push('.');
                result.push_str(rest);
            }
            let exponent = i64::from(self.exponent) + rest.len() as i64;
            result.push('e');
            result.push_str(&exponent.to_string());
        } else {
            let places = self.exponent.unsigned_abs() as usize;
            if places < digits.len() {
                let (int_part, frac_part) = digits.split_at(digits.len() - places);
                result.push_str(int_part);
                result.push('.');
                result.push_str(frac_part);
            } else {
                result.push_str("0.");
                for _ in 0..(places - digits.len()) {
                    result.push('0');
                }
                result.push_str(digits);
            }
        }

        result
    }

    /// Nearest f64
    pub fn to_f64(&self) -> f64 {
        self.to_canonical_string().parse().unwrap_or(f64::NAN)
    }
}

impl FromStr for Decimal {
    type Err = JsonzError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_exact(s)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

fn invalid(s: &str) -> JsonzError {
    JsonzError::TypeMismatch(format!("'{}' is not a decimal number", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_from_str_basic() {
        let cases = vec![
            ("0.5", false, vec![b'5'], -1),
            ("-0.5", true, vec![b'5'], -1),
            ("1e3", false, vec![b'1'], 3),
            ("-1e3", true, vec![b'1'], 3),
            ("1.5e2", false, vec![b'1', b'5'], 1),
            ("1.50", false, vec![b'1', b'5', b'0'], -2),
            ("0.000", false, vec![b'0'], -3),
        ];

        for (input, expected_sign, expected_digits, expected_exp) in cases {
            let decimal = Decimal::from_str_exact(input).unwrap();
            assert_eq!(decimal.negative, expected_sign, "{input}");
            assert_eq!(decimal.digits, expected_digits, "{input}");
            assert_eq!(decimal.exponent, expected_exp, "{input}");
        }
    }

    #[test]
    fn test_decimal_from_str_invalid() {
        let invalid_cases = vec!["", "abc", "1.2.3", "1e", "e1", "1..2", "-", "."];
        for input in invalid_cases {
            assert!(Decimal::from_str_exact(input).is_err(), "{input}");
        }
    }

    #[test]
    fn test_decimal_canonical_text() {
        let cases = vec![
            ("0.5", "0.5"),
            ("-0.5", "-0.5"),
            ("1e3", "1e3"),
            ("1.5e2", "1.5e2"),
            ("150.0", "150.0"),
            ("0.001", "0.001"),
            ("1e-7", "1e-7"),
            ("-123.456e10", "-1.23456e12"),
            ("0.0", "0.0"),
            ("0e0", "0e0"),
            ("-0.0", "-0.0"),
        ];

        for (input, expected) in cases {
            let decimal = Decimal::from_str_exact(input).unwrap();
            assert_eq!(decimal.to_canonical_string(), expected, "{input}");
        }
    }

    #[test]
    fn test_decimal_canonical_roundtrip() {
        let cases = vec![
            "0.5", "1e300", "1e-300", "-123.456e10", "3.14159", "0.000001", "0.0000001",
            "12345678.9", "1.7976931348623157e308", "-0.0",
        ];

        for input in cases {
            let decimal = Decimal::from_str_exact(input).unwrap();
            let text = decimal.to_canonical_string();
            assert!(text.contains('.') || text.contains('e'), "{text}");
            assert_eq!(Decimal::from_str_exact(&text).unwrap(), decimal, "{input}");
        }
    }

    #[test]
    fn test_decimal_limits() {
        let too_many_digits = format!("{}.0", "1".repeat(65_536));
        assert!(matches!(
            Decimal::from_str_exact(&too_many_digits),
            Err(JsonzError::ResourceLimitExceeded(_))
        ));
        assert!(Decimal::from_str_with_limit("1.25", 2).is_err());
        assert!(Decimal::from_str_with_limit("1.25", 3).is_ok());
    }

    #[test]
    fn test_decimal_from_str_trims_leading_zero() {
        let decimal = Decimal::from_str_exact("0123.5").unwrap();
        assert_eq!(decimal.digits, vec![b'1', b'2', b'3', b'5']);
        assert_eq!(decimal.exponent, -1);
    }

    #[test]
    fn test_decimal_to_f64() {
        assert_eq!(Decimal::from_str_exact("2.5").unwrap().to_f64(), 2.5);
        assert_eq!(Decimal::from_str_exact("-1e3").unwrap().to_f64(), -1000.0);
    }
}
