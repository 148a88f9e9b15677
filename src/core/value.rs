// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Field value type system.
//!
//! A [`Value`] holds one raw field value on its way into or out of the codec.
//! Every pair of representations has a defined (possibly lossy) coercion, so a
//! field codec can ask for the representation it needs and fall back to the
//! null sentinel when no sensible coercion exists.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Field name -> value vector (one entry per array element / repeat slot).
pub type ValueMap = HashMap<String, Vec<Value>>;

/// Default number of decimal places carried by a double with no explicit precision.
pub const MAX_DBL_PRECISION: i32 = 15;

/// A single field value.
///
/// `Empty` is the absent value: it is what a sentinel decodes to and what
/// callers pass for a field they have no data for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// No value.
    #[default]
    Empty,
    /// UTF-8 text.
    String(String),
    /// Floating point number with the number of decimal places to render.
    Double { value: f64, precision: i32 },
    /// Signed integer.
    Long(i64),
    /// Boolean.
    Bool(bool),
}

impl Value {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a double carrying the default precision.
    pub fn double(value: f64) -> Self {
        Value::Double {
            value,
            precision: MAX_DBL_PRECISION,
        }
    }

    /// Create a double carrying an explicit precision.
    pub fn double_with_precision(value: f64, precision: i32) -> Self {
        Value::Double { value, precision }
    }

    /// Create a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    /// Replace the contents with a value of the given kind parsed from `raw`.
    ///
    /// Returns false (and leaves `self` untouched) when `raw` cannot be read
    /// as that kind.
    pub fn set(&mut self, kind: ValueKind, raw: &str) -> bool {
        let parsed = Value::String(raw.to_string());
        let next = match kind {
            ValueKind::Empty => Some(Value::Empty),
            ValueKind::String => Some(parsed),
            ValueKind::Double => parsed.as_f64().map(Value::double),
            ValueKind::Long => parsed.as_i64().map(Value::Long),
            ValueKind::Bool => parsed.as_bool().map(Value::Bool),
        };
        match next {
            Some(v) => {
                *self = v;
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Type Checking
    // ========================================================================

    /// Check if this value is absent.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The representation currently held.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Empty => ValueKind::Empty,
            Value::String(_) => ValueKind::String,
            Value::Double { .. } => ValueKind::Double,
            Value::Long(_) => ValueKind::Long,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    /// Precision of a double, `0` for integers and booleans.
    pub fn precision(&self) -> i32 {
        match self {
            Value::Double { precision, .. } => *precision,
            Value::Long(_) | Value::Bool(_) => 0,
            _ => MAX_DBL_PRECISION,
        }
    }

    // ========================================================================
    // Coercions
    // ========================================================================

    /// Coerce to a string.
    ///
    /// Doubles render in fixed notation with their stored precision.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Empty => None,
            Value::String(s) => Some(s.clone()),
            Value::Double { value, precision } => Some(format_fixed(*value, *precision)),
            Value::Long(v) => Some(v.to_string()),
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
        }
    }

    /// Coerce to a double.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Empty => None,
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Double { value, .. } => Some(*value),
            Value::Long(v) => Some(*v as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        }
    }

    /// Coerce to an integer.
    ///
    /// Doubles (and numeric strings) are rounded half-to-even. Strings also
    /// accept `true` / `false`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Empty => None,
            Value::String(s) => {
                let trimmed = s.trim();
                if let Some(b) = parse_bool(trimmed) {
                    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
                        return Some(i64::from(b));
                    }
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite())
                    .map(|d| unbiased_round(d, 0) as i64)
            }
            Value::Double { value, .. } => {
                if value.is_finite() {
                    Some(unbiased_round(*value, 0) as i64)
                } else {
                    None
                }
            }
            Value::Long(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
        }
    }

    /// Coerce to a boolean.
    ///
    /// Strings recognize `true`, `false`, `1` and `0` (case-insensitive).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Empty => None,
            Value::String(s) => parse_bool(s.trim()),
            Value::Double { value, .. } => Some(*value != 0.0),
            Value::Long(v) => Some(*v != 0),
            Value::Bool(b) => Some(*b),
        }
    }

    /// Coerce into `target`, returning whether a coercion existed.
    ///
    /// Never fails loudly: on `false` the target is left untouched so the
    /// caller can keep its default.
    pub fn get<T: FromValue>(&self, target: &mut T) -> bool {
        match T::from_value(self) {
            Some(v) => {
                *target = v;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_string() {
            Some(s) => write!(f, "{s}"),
            None => Ok(()),
        }
    }
}

/// Representation tag for [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Empty,
    String,
    Double,
    Long,
    Bool,
}

impl ValueKind {
    /// Get the name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Empty => "empty",
            ValueKind::String => "string",
            ValueKind::Double => "double",
            ValueKind::Long => "long",
            ValueKind::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types a [`Value`] can be coerced into via [`Value::get`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_string()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

// ============================================================================
// Conversions into Value
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::double(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Empty, Into::into)
    }
}

// ============================================================================
// Numeric helpers
// ============================================================================

/// Round `r` to `dec` decimal places, ties going to the even neighbour.
pub fn unbiased_round(r: f64, dec: i32) -> f64 {
    let ex = 10f64.powi(dec);
    let scaled = r * ex;
    let floor = scaled.floor();
    let rem = scaled - floor;
    let even = (floor as i64) % 2 == 0;
    if rem < 0.5 || (rem == 0.5 && even) {
        floor / ex
    } else {
        (floor + 1.0) / ex
    }
}

/// Render a double in fixed notation with `precision` decimal places.
pub fn format_fixed(value: f64, precision: i32) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if precision >= 0 {
        let p = precision as usize;
        format!("{:.*}", p, unbiased_round_display(value, precision))
    } else {
        format!("{:.0}", unbiased_round(value, precision))
    }
}

fn unbiased_round_display(value: f64, precision: i32) -> f64 {
    // Scaling by more than ~1e15 loses the integer part's exactness.
    if precision < MAX_DBL_PRECISION && value.abs() < 1e15 {
        unbiased_round(value, precision)
    } else {
        value
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
