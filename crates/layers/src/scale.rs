//! Color scales used by fills, shapes and legends.

use crate::spec::ScaleConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    /// `colors[i]` where `i` counts breakpoints `<= v`.
    Threshold { domain: Vec<f64>, range: Vec<String> },
    /// Even partition of `[lo, hi]` into `range.len()` buckets.
    Quantize { lo: f64, hi: f64, range: Vec<String> },
}

impl ColorScale {
    pub fn threshold(config: &ScaleConfig) -> Self {
        ColorScale::Threshold {
            domain: config.values.clone(),
            range: config.colors.clone(),
        }
    }

    /// Only the first and last breakpoints matter for a quantized scale.
    pub fn quantize(config: &ScaleConfig) -> Self {
        let lo = config.values.first().copied().unwrap_or(0.0);
        let hi = config.values.last().copied().unwrap_or(1.0);
        ColorScale::Quantize {
            lo,
            hi,
            range: config.colors.clone(),
        }
    }

    /// Color for `v`; `None` for NaN input or a missing range entry.
    pub fn color(&self, v: f64) -> Option<&str> {
        if v.is_nan() {
            return None;
        }
        match self {
            ColorScale::Threshold { domain, range } => {
                let i = domain.partition_point(|b| *b <= v);
                range.get(i).map(String::as_str)
            }
            ColorScale::Quantize { lo, hi, range } => {
                if range.is_empty() {
                    return None;
                }
                let n = range.len();
                let i = ((v - lo) * n as f64 / (hi - lo)).floor();
                let i = if i.is_nan() {
                    0
                } else {
                    i.clamp(0.0, (n - 1) as f64) as usize
                };
                range.get(i).map(String::as_str)
            }
        }
    }
}

pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

pub const CATEGORY20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

pub const CATEGORY20B: [&str; 20] = [
    "#393b79", "#5254a3", "#6b6ecf", "#9c9ede", "#637939", "#8ca252", "#b5cf6b", "#cedb9c",
    "#8c6d31", "#bd9e39", "#e7ba52", "#e7cb94", "#843c39", "#ad494a", "#d6616b", "#e7969c",
    "#7b4173", "#a55194", "#ce6dbd", "#de9ed6",
];

pub const CATEGORY20C: [&str; 20] = [
    "#3182bd", "#6baed6", "#9ecae1", "#c6dbef", "#e6550d", "#fd8d3c", "#fdae6b", "#fdd0a2",
    "#31a354", "#74c476", "#a1d99b", "#c7e9c0", "#756bb1", "#9e9ac8", "#bcbddc", "#dadaeb",
    "#636363", "#969696", "#bdbdbd", "#d9d9d9",
];

/// Named categorical palette; unknown or absent names fall back to
/// `category20`.
pub fn palette(name: Option<&str>) -> &'static [&'static str] {
    match name {
        Some("category10") => &CATEGORY10,
        Some("category20b") => &CATEGORY20B,
        Some("category20c") => &CATEGORY20C,
        _ => &CATEGORY20,
    }
}

/// Palette entry for `v mod 20`.
pub fn categorical(palette: &[&'static str], v: f64) -> Option<&'static str> {
    if !v.is_finite() || palette.is_empty() {
        return None;
    }
    let slot = ((v.trunc() % 20.0) + 20.0) % 20.0;
    palette.get(slot as usize % palette.len()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(values: &[f64], colors: &[&str]) -> ScaleConfig {
        ScaleConfig {
            values: values.to_vec(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn threshold_lower_bounds_are_inclusive() {
        let scale = ColorScale::threshold(&config(&[10.0, 20.0], &["A", "B", "C"]));
        assert_eq!(scale.color(5.0), Some("A"));
        assert_eq!(scale.color(10.0), Some("B"));
        assert_eq!(scale.color(15.0), Some("B"));
        assert_eq!(scale.color(25.0), Some("C"));
        assert_eq!(scale.color(f64::NAN), None);

        let short = ColorScale::threshold(&config(&[10.0, 20.0], &["A"]));
        assert_eq!(short.color(15.0), None);
    }

    #[test]
    fn quantize_partitions_first_to_last() {
        let scale = ColorScale::quantize(&config(&[0.0, 50.0, 100.0], &["lo", "mid", "hi", "top"]));
        assert_eq!(scale.color(-10.0), Some("lo"));
        assert_eq!(scale.color(24.9), Some("lo"));
        assert_eq!(scale.color(25.0), Some("mid"));
        assert_eq!(scale.color(99.0), Some("top"));
        assert_eq!(scale.color(1000.0), Some("top"));
    }

    #[test]
    fn categorical_wraps_modulo_twenty() {
        let p = palette(Some("category10"));
        assert_eq!(categorical(p, 3.0), Some("#d62728"));
        assert_eq!(categorical(p, 13.0), Some("#d62728"));
        assert_eq!(categorical(palette(None), 21.0), Some("#aec7e8"));
        assert_eq!(categorical(palette(Some("category20c")), -1.0), Some("#d9d9d9"));
        assert_eq!(categorical(p, f64::NAN), None);
    }
}
