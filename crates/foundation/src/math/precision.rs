//! Number policies.
//!
//! This module is intentionally small. It provides:
//! - A deterministic float ordering (`stable_total_cmp_f64`) for sorting and keys.
//! - A directional ordering that keeps NaN last either way (`nan_last_cmp_f64`).
//! - Text rendering of numbers the way scene attributes and expression
//!   results print them (`format_number`, `format_coord`).

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Total ordering with numbers ascending or descending and NaN after every
/// number in both directions. NaNs compare equal among themselves.
pub fn nan_last_cmp_f64(a: f64, b: f64, ascending: bool) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = stable_total_cmp_f64(a, b);
            if ascending { ord } else { ord.reverse() }
        }
    }
}

/// Render a number as text: integral values without a fraction, NaN and
/// infinities spelled out, everything else in shortest round-trip form.
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let v = canonical_f64(v);
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    format!("{v}")
}

/// Render a screen coordinate with at most three decimals.
pub fn format_coord(v: f64) -> String {
    format_number((v * 1000.0).round() / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_total_cmp_sorts_deterministically() {
        let mut v = vec![3.0, f64::NAN, -0.0, 0.0, -1.0];
        v.sort_by(|a, b| stable_total_cmp_f64(*a, *b));

        assert_eq!(v[0], -1.0);
        assert_eq!(v[1], 0.0);
        assert_eq!(v[2], 0.0);
        assert_eq!(v[3], 3.0);
        assert!(v[4].is_nan());
    }

    #[test]
    fn nan_sorts_last_in_both_directions() {
        let v = vec![(2.0, 'a'), (f64::NAN, 'b'), (1.0, 'c'), (f64::NAN, 'd'), (3.0, 'e')];

        let mut up = v.clone();
        up.sort_by(|a, b| nan_last_cmp_f64(a.0, b.0, true));
        assert_eq!(up.iter().map(|p| p.1).collect::<String>(), "caebd");

        let mut down = v;
        down.sort_by(|a, b| nan_last_cmp_f64(a.0, b.0, false));
        assert_eq!(down.iter().map(|p| p.1).collect::<String>(), "eacbd");
    }

    #[test]
    fn numbers_print_like_attribute_text() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(10.1), "10.1");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_coord(1.23456), "1.235");
        assert_eq!(format_coord(200.0), "200");
    }
}
