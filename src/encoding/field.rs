// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Field codecs: one closed variant per field kind.
//!
//! Every variant knows its bit width and how to turn a [`Value`] into bits
//! and back. Numeric, enum and string fields reserve the all-zero pattern as
//! the null sentinel: absent and out-of-range values both encode to it and it
//! decodes to [`Value::Empty`].

use std::fmt::Write as _;

use tracing::trace;

use super::bitset::{ceil_log2, Bitset};
use super::header::HeaderPart;
use crate::core::value::unbiased_round;
use crate::core::{DcclError, FieldKind, Result, Value};

/// Widest integer a single numeric field may occupy.
pub const MAX_NUMERIC_BITS: usize = 64;

/// Bit codec for one field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCodec {
    /// Constant; zero bits on the wire.
    Static { value: String },
    /// One bit, no sentinel.
    Bool,
    /// Bounded integer or float, optionally delta-differenced.
    Numeric(NumericCodec),
    /// Fixed-length NUL-padded string.
    String { max_length: usize },
    /// Fixed number of raw bytes supplied as hex text.
    Hex { num_bytes: usize },
    /// Index into a list of enumerators.
    Enum { values: Vec<String> },
    /// Fixed-width header part.
    Header(HeaderPart),
}

impl FieldCodec {
    /// Field kind tag of this codec.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldCodec::Static { .. } => FieldKind::Static,
            FieldCodec::Bool => FieldKind::Bool,
            FieldCodec::Numeric(n) if n.integer => FieldKind::Int,
            FieldCodec::Numeric(_) => FieldKind::Float,
            FieldCodec::String { .. } => FieldKind::String,
            FieldCodec::Hex { .. } => FieldKind::Hex,
            FieldCodec::Enum { .. } => FieldKind::Enum,
            FieldCodec::Header(part) => part.kind(),
        }
    }

    /// Bit width of a single (key) element.
    pub fn bit_width(&self) -> usize {
        match self {
            FieldCodec::Static { .. } => 0,
            FieldCodec::Bool => 1,
            FieldCodec::Numeric(n) => n.key_width,
            FieldCodec::String { max_length } => max_length * 8,
            FieldCodec::Hex { num_bytes } => num_bytes * 8,
            FieldCodec::Enum { values } => ceil_log2(values.len() as u128 + 1),
            FieldCodec::Header(part) => part.bit_width(),
        }
    }

    /// Bit width of element `index` within one array instance.
    pub fn element_width(&self, index: usize) -> usize {
        match self {
            FieldCodec::Numeric(n) if index > 0 => n.delta_width.unwrap_or(n.key_width),
            _ => self.bit_width(),
        }
    }

    /// Bit width of one array instance of `array_length` elements.
    ///
    /// Saturates at `usize::MAX`; compiled schemas have already been checked
    /// with [`FieldCodec::checked_total_width`].
    pub fn total_width(&self, array_length: usize) -> usize {
        self.checked_total_width(array_length).unwrap_or(usize::MAX)
    }

    /// Bit width of one array instance, or `None` on overflow.
    pub fn checked_total_width(&self, array_length: usize) -> Option<usize> {
        let Some(rest) = array_length.checked_sub(1) else {
            return Some(0);
        };
        rest.checked_mul(self.element_width(1))?
            .checked_add(self.bit_width())
    }

    /// Encode a single value at full (key) width.
    pub fn encode(&self, field: &str, value: &Value) -> Result<Bitset> {
        let width = self.bit_width();
        match self {
            FieldCodec::Static { .. } => Ok(Bitset::new()),
            FieldCodec::Bool => Ok(Bitset::from_u64(
                u64::from(value.as_bool().unwrap_or(false)),
                1,
            )),
            FieldCodec::Numeric(n) => Ok(Bitset::from_u64(n.encode_key(field, value), width)),
            FieldCodec::String { max_length } => {
                let mut bytes = value.as_string().unwrap_or_default().into_bytes();
                bytes.resize(*max_length, 0);
                Ok(Bitset::from_bytes(&bytes))
            }
            FieldCodec::Hex { num_bytes } => encode_hex(field, value, *num_bytes),
            FieldCodec::Enum { values } => {
                let index = value
                    .as_string()
                    .and_then(|s| values.iter().position(|v| *v == s))
                    .map_or(0, |i| i as u64 + 1);
                if index == 0 && !value.is_empty() {
                    trace!(field = field, value = %value, "enumerator not found, encoding sentinel");
                }
                Ok(Bitset::from_u64(index, width))
            }
            FieldCodec::Header(part) => part.encode(field, value),
        }
    }

    /// Decode a single full-width element.
    pub fn decode(&self, bits: &Bitset) -> Value {
        match self {
            FieldCodec::Static { value } => Value::String(value.clone()),
            FieldCodec::Bool => Value::Bool(bits.to_u64() != 0),
            FieldCodec::Numeric(n) => n.decode_key(bits.to_u64()),
            FieldCodec::String { .. } => {
                let bytes = bits.to_bytes();
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                if end == 0 {
                    Value::Empty
                } else {
                    Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
                }
            }
            FieldCodec::Hex { .. } => Value::String(hex::encode(bits.to_bytes())),
            FieldCodec::Enum { values } => match bits.to_u64() {
                0 => Value::Empty,
                t => values
                    .get(t as usize - 1)
                    .map_or(Value::Empty, |v| Value::String(v.clone())),
            },
            FieldCodec::Header(part) => part.decode(bits),
        }
    }

    /// Encode `values` as consecutive instances of `array_length` elements.
    ///
    /// Missing trailing values encode as absent. Delta-differenced numeric
    /// fields encode element 0 of each instance as the key frame.
    pub fn encode_array(
        &self,
        field: &str,
        values: &[Value],
        array_length: usize,
        instances: usize,
    ) -> Result<Bitset> {
        let mut out = Bitset::new();
        let empty = Value::Empty;
        for instance in 0..instances {
            let start = instance * array_length;
            let element = |i: usize| values.get(start + i).unwrap_or(&empty);
            match self {
                FieldCodec::Numeric(n) if n.is_delta() && array_length > 1 => {
                    let key = n.encode_key(field, element(0));
                    out.append(&Bitset::from_u64(key, n.key_width));
                    let delta_width = n.delta_width.unwrap_or(n.key_width);
                    for i in 1..array_length {
                        let t = n.encode_delta(field, element(i), key);
                        out.append(&Bitset::from_u64(t, delta_width));
                    }
                }
                _ => {
                    for i in 0..array_length {
                        out.append(&self.encode(field, element(i))?);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Decode bits produced by [`encode_array`](Self::encode_array).
    pub fn decode_array(&self, bits: &Bitset, array_length: usize, instances: usize) -> Vec<Value> {
        let mut bits = bits.clone();
        let mut out = Vec::with_capacity(array_length * instances);
        for _ in 0..instances {
            match self {
                FieldCodec::Numeric(n) if n.is_delta() && array_length > 1 => {
                    let key = bits.take_front(n.key_width).to_u64();
                    out.push(n.decode_key(key));
                    let delta_width = n.delta_width.unwrap_or(n.key_width);
                    for _ in 1..array_length {
                        let t = bits.take_front(delta_width).to_u64();
                        out.push(n.decode_delta(t, key));
                    }
                }
                _ => {
                    for i in 0..array_length {
                        let element = bits.take_front(self.element_width(i));
                        out.push(self.decode(&element));
                    }
                }
            }
        }
        out
    }

    /// Human-readable, kind-specific detail lines.
    pub fn describe(&self) -> String {
        let mut s = String::new();
        match self {
            FieldCodec::Static { value } => {
                let _ = writeln!(s, "\t\tvalue: {{{value}}}");
            }
            FieldCodec::Bool => {}
            FieldCodec::Numeric(n) => {
                let _ = writeln!(s, "\t\t[min, max] = [{},{}]", n.min, n.max);
                if let Some(d) = n.max_delta {
                    let _ = writeln!(s, "\t\tmax_delta: {{{d}}}");
                }
                let _ = writeln!(s, "\t\tprecision: {{{}}}", n.precision);
            }
            FieldCodec::String { max_length } => {
                let _ = writeln!(s, "\t\tmax_length: {{{max_length}}}");
            }
            FieldCodec::Hex { num_bytes } => {
                let _ = writeln!(s, "\t\tnum_bytes: {{{num_bytes}}}");
            }
            FieldCodec::Enum { values } => {
                let _ = writeln!(s, "\t\tvalues: {{{}}}", values.join(","));
            }
            FieldCodec::Header(part) => {
                let _ = writeln!(s, "\t\theader part: {}", part.name());
            }
        }
        s
    }
}

fn encode_hex(field: &str, value: &Value, num_bytes: usize) -> Result<Bitset> {
    let text = match value {
        Value::Empty => return Ok(Bitset::zeros(num_bytes * 8)),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(DcclError::type_mismatch(
                field,
                "hex string",
                other.kind().as_str(),
            ))
        }
    };
    if text.is_empty() {
        return Ok(Bitset::zeros(num_bytes * 8));
    }
    let bytes = hex::decode(&text).map_err(|e| DcclError::parse(format!("hex field '{field}'"), e.to_string()))?;
    if bytes.len() != num_bytes {
        return Err(DcclError::parse(
            format!("hex field '{field}'"),
            format!("expected {num_bytes} bytes, got {}", bytes.len()),
        ));
    }
    Ok(Bitset::from_bytes(&bytes))
}

// ============================================================================
// Numeric codec
// ============================================================================

/// Bounded numeric codec.
///
/// Legal values are stored as `round((v - min) * 10^precision) + 1`; zero is
/// the sentinel. Delta frames are stored relative to the quantized key value
/// as `round((v - key + max_delta) * 10^precision) + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericCodec {
    pub min: f64,
    pub max: f64,
    pub precision: i32,
    pub integer: bool,
    pub max_delta: Option<f64>,
    key_steps: u64,
    key_width: usize,
    delta_steps: Option<u64>,
    delta_width: Option<usize>,
}

impl NumericCodec {
    /// Build a codec for the given bounds.
    ///
    /// `min <= max` and `max_delta >= 0` must already hold. Fails when the
    /// range needs more than [`MAX_NUMERIC_BITS`] bits.
    pub fn new(
        field: &str,
        min: f64,
        max: f64,
        precision: i32,
        integer: bool,
        max_delta: Option<f64>,
    ) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(DcclError::invalid_schema(
                field,
                "numeric bounds must be finite",
            ));
        }
        let scale = 10f64.powi(precision);
        let key_span = (max - min) * scale;
        let key_steps = steps_for(key_span.round(), field)?;
        let key_width = width_for(key_span, field)?;

        let (delta_steps, delta_width) = match max_delta {
            Some(d) => {
                let delta_span = 2.0 * d * scale;
                let steps = steps_for((delta_span + GRID_EPSILON).floor(), field)?;
                (Some(steps), Some(width_for(delta_span, field)?))
            }
            None => (None, None),
        };

        Ok(Self {
            min,
            max,
            precision,
            integer,
            max_delta,
            key_steps,
            key_width,
            delta_steps,
            delta_width,
        })
    }

    fn scale(&self) -> f64 {
        10f64.powi(self.precision)
    }

    /// Whether delta frames are enabled.
    pub fn is_delta(&self) -> bool {
        self.max_delta.is_some()
    }

    /// Width of a key (or non-delta) element.
    pub fn key_width(&self) -> usize {
        self.key_width
    }

    /// Width of a delta element, if delta frames are enabled.
    pub fn delta_width(&self) -> Option<usize> {
        self.delta_width
    }

    /// Encoded integer for a full-range value; 0 when absent or out of range.
    pub fn encode_key(&self, field: &str, value: &Value) -> u64 {
        let Some(r) = value.as_f64() else {
            return 0;
        };
        if r.is_nan() || r < self.min || r > self.max {
            trace!(field = field, value = r, "out of range, encoding sentinel");
            return 0;
        }
        let steps = unbiased_round((r - self.min) * self.scale(), 0);
        (steps as u64).min(self.key_steps) + 1
    }

    /// Decode a full-range element.
    pub fn decode_key(&self, t: u64) -> Value {
        if t == 0 {
            return Value::Empty;
        }
        let v = (t - 1) as f64 / self.scale() + self.min;
        self.finish(v)
    }

    /// Encoded integer for a delta frame against the encoded key `key`.
    pub fn encode_delta(&self, field: &str, value: &Value, key: u64) -> u64 {
        let (Some(d), Some(max_steps)) = (self.max_delta, self.delta_steps) else {
            return self.encode_key(field, value);
        };
        if key == 0 {
            return 0;
        }
        let Some(r) = value.as_f64() else {
            return 0;
        };
        if r.is_nan() {
            return 0;
        }
        let key_value = (key - 1) as f64 / self.scale() + self.min;
        let steps = unbiased_round((r - key_value + d) * self.scale(), 0);
        if steps < 0.0 || steps > max_steps as f64 {
            trace!(field = field, value = r, key = key_value, "delta out of range, encoding sentinel");
            return 0;
        }
        steps as u64 + 1
    }

    /// Decode a delta frame against the encoded key `key`.
    pub fn decode_delta(&self, t: u64, key: u64) -> Value {
        let Some(d) = self.max_delta else {
            return self.decode_key(t);
        };
        if t == 0 || key == 0 {
            return Value::Empty;
        }
        let key_value = (key - 1) as f64 / self.scale() + self.min;
        let v = (t - 1) as f64 / self.scale() - d + key_value;
        self.finish(v)
    }

    fn finish(&self, v: f64) -> Value {
        if self.integer {
            Value::Long(v as i64)
        } else if (0..crate::core::value::MAX_DBL_PRECISION).contains(&self.precision) {
            Value::double_with_precision(unbiased_round(v, self.precision), self.precision)
        } else {
            Value::double_with_precision(v, self.precision)
        }
    }
}

/// Tolerance for treating a scaled span as lying on the precision grid.
const GRID_EPSILON: f64 = 1e-9;

fn steps_for(steps: f64, field: &str) -> Result<u64> {
    if !(0.0..=u64::MAX as f64 / 2.0).contains(&steps) {
        return Err(DcclError::invalid_schema(
            field,
            format!("numeric range of {steps} steps cannot be encoded"),
        ));
    }
    Ok(steps as u64)
}

/// `ceil(log2(span + 2))` on the unrounded scaled span.
///
/// `2^w` is an integer, so `2^w >= span + 2` holds exactly when
/// `2^w >= ceil(span) + 2`. Spans within [`GRID_EPSILON`] of an integer are
/// snapped to it so `0.1 * 10` style products keep their exact width.
fn width_for(span: f64, field: &str) -> Result<usize> {
    let nearest = span.round();
    let whole = if (span - nearest).abs() <= GRID_EPSILON * nearest.abs().max(1.0) {
        nearest
    } else {
        span.ceil()
    };
    let steps = steps_for(whole, field)?;
    let width = ceil_log2(u128::from(steps) + 2);
    if width > MAX_NUMERIC_BITS {
        return Err(DcclError::invalid_schema(
            field,
            format!("field needs {width} bits, limit is {MAX_NUMERIC_BITS}"),
        ));
    }
    Ok(width)
}
