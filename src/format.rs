//! Display format specs for property values.
//!
//! A record can carry a format spec that `formatted()` applies to the
//! current value, e.g. a HUD timer declared with `D3` renders `7` as
//! `"007"`. Specs are parsed once at registration; writes never touch
//! them.

use crate::error::{PropertyError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed display format.
///
/// Accepted spec strings:
///
/// - `D<width>` — zero-padded decimal integer (`D3` + `7` → `"007"`)
/// - `F<prec>`  — fixed-point with `<prec>` decimals (`F2` + `1.5` → `"1.50"`)
/// - `X<width>` — zero-padded uppercase hex (`X4` + `255` → `"00FF"`)
///
/// The brace-wrapped form `{0:D3}` is also accepted and normalizes to
/// the bare spec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatSpec {
    Decimal { width: usize },
    Fixed { precision: usize },
    Hex { width: usize },
}

impl FormatSpec {
    /// Parse a spec string. Fails with [`PropertyError::InvalidFormat`]
    /// on anything unrecognized.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let bare = trimmed
            .strip_prefix("{0:")
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);

        let mut chars = bare.chars();
        let tag = chars
            .next()
            .ok_or_else(|| PropertyError::InvalidFormat(text.to_string()))?;
        let arg: usize = chars
            .as_str()
            .parse()
            .map_err(|_| PropertyError::InvalidFormat(text.to_string()))?;

        match tag.to_ascii_uppercase() {
            'D' => Ok(FormatSpec::Decimal { width: arg }),
            'F' => Ok(FormatSpec::Fixed { precision: arg }),
            'X' => Ok(FormatSpec::Hex { width: arg }),
            _ => Err(PropertyError::InvalidFormat(text.to_string())),
        }
    }

    /// Render a value through this spec. A spec that does not fit the
    /// value's kind falls back to the natural display form.
    pub fn apply(&self, value: &Value) -> String {
        match (self, value) {
            (FormatSpec::Decimal { width }, Value::Int(i)) => {
                format!("{:0width$}", i, width = *width)
            }
            (FormatSpec::Fixed { precision }, Value::Float(x)) => {
                format!("{:.prec$}", x, prec = *precision)
            }
            (FormatSpec::Fixed { precision }, Value::Int(i)) => {
                format!("{:.prec$}", *i as f64, prec = *precision)
            }
            (FormatSpec::Hex { width }, Value::Int(i)) => {
                format!("{:0width$X}", i, width = *width)
            }
            _ => value.to_display_string(),
        }
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSpec::Decimal { width } => write!(f, "D{}", width),
            FormatSpec::Fixed { precision } => write!(f, "F{}", precision),
            FormatSpec::Hex { width } => write!(f, "X{}", width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padded_decimal() {
        let spec = FormatSpec::parse("D3").unwrap();
        assert_eq!(spec.apply(&Value::Int(7)), "007");
        assert_eq!(spec.apply(&Value::Int(1234)), "1234");
    }

    #[test]
    fn test_csharp_wrapper_form() {
        let spec = FormatSpec::parse("{0:D3}").unwrap();
        assert_eq!(spec, FormatSpec::Decimal { width: 3 });
        assert_eq!(spec.apply(&Value::Int(7)), "007");
    }

    #[test]
    fn test_fixed_point() {
        let spec = FormatSpec::parse("F2").unwrap();
        assert_eq!(spec.apply(&Value::Float(1.5)), "1.50");
        assert_eq!(spec.apply(&Value::Int(3)), "3.00");
    }

    #[test]
    fn test_hex() {
        let spec = FormatSpec::parse("X4").unwrap();
        assert_eq!(spec.apply(&Value::Int(255)), "00FF");
    }

    #[test]
    fn test_mismatched_kind_falls_back() {
        let spec = FormatSpec::parse("D3").unwrap();
        assert_eq!(spec.apply(&Value::Str("seven".into())), "seven");
    }

    #[test]
    fn test_bad_specs_rejected() {
        for bad in ["", "Q3", "D", "Dx", "{0:D3", "3D"] {
            assert!(FormatSpec::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_display_round_trips() {
        for text in ["D3", "F2", "X8"] {
            let spec = FormatSpec::parse(text).unwrap();
            assert_eq!(spec.to_string(), text);
            assert_eq!(FormatSpec::parse(&spec.to_string()).unwrap(), spec);
        }
    }
}
