// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Built-in algorithms.

use super::AlgorithmRegistry;
use crate::core::Value;

/// Register every built-in algorithm.
pub fn register_all(registry: &mut AlgorithmRegistry) {
    registry.register("to_lower", to_lower);
    registry.register("to_upper", to_upper);
    registry.register("angle_0_360", angle_0_360);
    registry.register("angle_-180_180", angle_n180_180);
    registry.register("abs", abs);
    registry.register("power_to_dB", power_to_db);
    registry.register("dB_to_power", db_to_power);
    registry.register("lat2hemisphere_initial", lat_hemisphere);
    registry.register("lon2hemisphere_initial", lon_hemisphere);

    registry.register_with_refs("add", add);
    registry.register_with_refs("subtract", subtract);
    registry.register_with_refs("TSD_to_soundspeed", tsd_to_soundspeed);
}

fn to_lower(v: &mut Value) {
    if let Some(s) = v.as_string() {
        *v = Value::String(s.to_lowercase());
    }
}

fn to_upper(v: &mut Value) {
    if let Some(s) = v.as_string() {
        *v = Value::String(s.to_uppercase());
    }
}

fn map_numeric(v: &mut Value, f: impl Fn(f64) -> f64) {
    if let Some(x) = v.as_f64() {
        *v = Value::double_with_precision(f(x), v.precision());
    }
}

fn angle_0_360(v: &mut Value) {
    map_numeric(v, |a| a.rem_euclid(360.0));
}

fn angle_n180_180(v: &mut Value) {
    map_numeric(v, |a| (a + 180.0).rem_euclid(360.0) - 180.0);
}

fn abs(v: &mut Value) {
    map_numeric(v, f64::abs);
}

fn power_to_db(v: &mut Value) {
    if let Some(x) = v.as_f64() {
        *v = Value::double(10.0 * x.log10());
    }
}

fn db_to_power(v: &mut Value) {
    if let Some(x) = v.as_f64() {
        *v = Value::double(10f64.powf(x / 10.0));
    }
}

fn lat_hemisphere(v: &mut Value) {
    if let Some(lat) = v.as_f64() {
        *v = Value::string(if lat < 0.0 { "S" } else { "N" });
    }
}

fn lon_hemisphere(v: &mut Value) {
    if let Some(lon) = v.as_f64() {
        *v = Value::string(if lon < 0.0 { "W" } else { "E" });
    }
}

fn ref_f64(v: &Value) -> f64 {
    v.as_f64().unwrap_or(f64::NAN)
}

fn add(v: &mut Value, refs: &[Value]) {
    let sum = refs.iter().map(ref_f64).sum::<f64>();
    map_numeric(v, |x| x + sum);
}

fn subtract(v: &mut Value, refs: &[Value]) {
    let sum = refs.iter().map(ref_f64).sum::<f64>();
    map_numeric(v, |x| x - sum);
}

/// Mackenzie (1981) nine-term sound speed; applied to temperature with
/// salinity and depth as references.
fn tsd_to_soundspeed(v: &mut Value, refs: &[Value]) {
    let (Some(t), Some(s), Some(d)) = (
        v.as_f64(),
        refs.first().and_then(Value::as_f64),
        refs.get(1).and_then(Value::as_f64),
    ) else {
        *v = Value::Empty;
        return;
    };
    *v = Value::double_with_precision(mackenzie_soundspeed(t, s, d), 3);
}

/// Speed of sound in m/s for temperature `t` (C), salinity `s` and depth `d` (m).
pub fn mackenzie_soundspeed(t: f64, s: f64, d: f64) -> f64 {
    1448.96 + 4.591 * t - 5.304e-2 * t * t + 2.374e-4 * t * t * t + 1.340 * (s - 35.0)
        + 1.630e-2 * d
        + 1.675e-7 * d * d
        - 1.025e-2 * t * (s - 35.0)
        - 7.139e-13 * t * d * d * d
}
