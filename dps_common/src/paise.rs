use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "INR";

//--------------------------------------        Paise        ---------------------------------------------------------
/// A currency amount held in the minor unit (1/100th of a rupee). Processor amounts use the same unit, so values pass
/// straight through to the payment API.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Paise(i64);

op!(Paise; binary Add::add, Sub::sub);
op!(Paise; assign AddAssign::add_assign, SubAssign::sub_assign);
op!(Paise; unary Neg::neg);
op!(Paise; scale Mul::mul by i64);
op!(Paise; sum);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct PaiseConversionError(String);

impl From<i64> for Paise {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Paise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

/// Parses a rupee amount such as `"500"`, `"500.5"` or `"1250.75"`. At most two decimal places are accepted.
impl FromStr for Paise {
    type Err = PaiseConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        let well_formed = !(whole.is_empty() && frac.is_empty())
            && whole.chars().all(|c| c.is_ascii_digit())
            && frac.chars().all(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(PaiseConversionError(format!("'{s}' is not a number")));
        }
        if frac.len() > 2 {
            return Err(PaiseConversionError(format!("'{s}' has more than two decimal places")));
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|e| PaiseConversionError(e.to_string()))? };
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| PaiseConversionError(e.to_string()))? * 10,
            _ => frac.parse::<i64>().map_err(|e| PaiseConversionError(e.to_string()))?,
        };
        let value = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| PaiseConversionError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Paise {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Converts a JSON-style floating point rupee amount. Values that carry more precision than whole paise are
    /// rejected rather than rounded.
    pub fn try_from_rupees_f64(rupees: f64) -> Result<Self, PaiseConversionError> {
        if !rupees.is_finite() {
            return Err(PaiseConversionError(format!("{rupees} is not a finite number")));
        }
        let scaled = rupees * 100.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return Err(PaiseConversionError(format!("{rupees} has more than two decimal places")));
        }
        if rounded.abs() > (i64::MAX / 2) as f64 {
            return Err(PaiseConversionError(format!("{rupees} is too large")));
        }
        Ok(Self(rounded as i64))
    }
}
