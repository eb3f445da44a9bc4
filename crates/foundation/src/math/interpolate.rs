//! Interpolators and easing used by timeline tweens.

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Element-wise interpolation between two arrays.
///
/// Elements beyond the shorter array are taken from whichever array has them,
/// so interpolating a `[λ, φ, γ]` rotation toward a `[λ, φ]` target keeps `γ`.
pub fn interpolate_array(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    let n = a.len().max(b.len());
    (0..n)
        .map(|i| match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => lerp(*x, *y, t),
            (Some(x), None) => *x,
            (None, Some(y)) => *y,
            (None, None) => 0.0,
        })
        .collect()
}

/// Cubic in-out easing, the default transition curve.
pub fn ease_cubic_in_out(t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let t2 = t * t;
    let t3 = t2 * t;
    4.0 * if t < 0.5 {
        t3
    } else {
        3.0 * (t - t2) + t3 - 0.75
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_interpolation_keeps_extra_elements() {
        let r = interpolate_array(&[0.0, 10.0, 5.0], &[-20.0, 30.0], 0.5);
        assert_eq!(r, vec![-10.0, 20.0, 5.0]);
    }

    #[test]
    fn cubic_easing_is_symmetric() {
        assert_eq!(ease_cubic_in_out(0.0), 0.0);
        assert_eq!(ease_cubic_in_out(1.0), 1.0);
        assert!((ease_cubic_in_out(0.5) - 0.5).abs() < 1e-12);
        let a = ease_cubic_in_out(0.25);
        let b = ease_cubic_in_out(0.75);
        assert!((a + b - 1.0).abs() < 1e-12);
    }
}
