//! Style resolution per layer kind: flat values from `styles`, per-record
//! colors from `display` expressions and scales.

use std::collections::HashMap;

use expressions::{ExprError, Expression, parse_float, to_number};
use scene::NodeId;
use serde_json::Value;

use crate::context::{ExtraContext, expression_context, lookup_key};
use crate::effects::SceneDocument;
use crate::scale::{ColorScale, categorical, palette};
use crate::spec::{FillDisplay, LayerSpec};

/// What a legend needs from the style pass: the active scale and the
/// elements it colored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleHints {
    pub scale: Option<ColorScale>,
    pub elements: Vec<NodeId>,
}

/// Record bound to a rendered element, unwrapping circle datums.
fn record_of(doc: &SceneDocument, node: NodeId) -> Option<(Value, usize)> {
    let datum = doc.datum(node)?;
    let record = match datum.value.get("d") {
        Some(embedded) if !embedded.is_null() => embedded.clone(),
        _ => datum.value.clone(),
    };
    Some((record, datum.index))
}

pub fn apply_geodata_styles(
    doc: &mut SceneDocument,
    spec: &LayerSpec,
    paths: &[NodeId],
    extra: &ExtraContext,
) -> Result<(), ExprError> {
    if let Some(background) = &spec.styles.background {
        let fill = background
            .fill
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "#fff".to_string());
        for p in paths {
            doc.set_style(*p, "fill", fill.clone());
        }
    }
    if let Some(lines) = &spec.styles.lines {
        let text = |v: &Option<crate::spec::CssValue>, default: &str| {
            v.as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| default.to_string())
        };
        let stroke = text(&lines.stroke, "#fff");
        let width = text(&lines.stroke_width, "0.5px");
        let opacity = text(&lines.stroke_opacity, "0.5");
        for p in paths {
            doc.set_style(*p, "stroke", stroke.clone());
            doc.set_style(*p, "stroke-width", width.clone());
            doc.set_style(*p, "stroke-opacity", opacity.clone());
        }
    }

    let Some(fill) = &spec.display.fill else {
        return Ok(());
    };
    if let Some(cat) = &fill.categorical
        && let (Some(value), Some(name)) = (&cat.value, &cat.name)
    {
        let value = Expression::compile(value)?;
        let colors = palette(Some(name));
        for p in paths {
            let Some((record, i)) = record_of(doc, *p) else {
                continue;
            };
            let v = to_number(&value.evaluate(&expression_context(&record, Some(i), extra))?);
            if let Some(color) = categorical(colors, v) {
                doc.set_style(*p, "fill", color);
            }
        }
    } else if let Some(value) = &fill.value {
        let value = Expression::compile(value)?;
        for p in paths {
            let Some((record, i)) = record_of(doc, *p) else {
                continue;
            };
            match value.evaluate(&expression_context(&record, Some(i), extra))? {
                Value::Null => {}
                other => doc.set_style(*p, "fill", expressions::to_display_string(&other)),
            }
        }
    }
    Ok(())
}

/// Put an overlaid layer's paths back to their own geodata styling.
pub fn reset_geodata_styles(
    doc: &mut SceneDocument,
    spec: &LayerSpec,
    paths: &[NodeId],
    extra: &ExtraContext,
) -> Result<(), ExprError> {
    for p in paths {
        doc.remove_style(*p, "fill");
    }
    apply_geodata_styles(doc, spec, paths, extra)
}

/// Threshold wins over choropleth (quantize).
fn scale_of(threshold: Option<&crate::spec::ScaleConfig>, choropleth: Option<&crate::spec::ScaleConfig>) -> Option<ColorScale> {
    match (threshold, choropleth) {
        (Some(t), _) => Some(ColorScale::threshold(t)),
        (None, Some(c)) => Some(ColorScale::quantize(c)),
        (None, None) => None,
    }
}

/// Flat or value-driven styling of shapes.
pub fn apply_shape_styles(
    doc: &mut SceneDocument,
    spec: &LayerSpec,
    elements: &[NodeId],
    extra: &ExtraContext,
) -> Result<StyleHints, ExprError> {
    let mut hints = StyleHints::default();
    if let Some(lines) = &spec.styles.lines {
        for el in elements {
            if let Some(stroke) = &lines.stroke {
                doc.set_style(*el, "stroke", stroke.to_string());
            }
            if let Some(width) = &lines.stroke_width {
                doc.set_style(*el, "stroke-width", width.to_string());
            }
        }
    }
    let Some(shape) = &spec.display.shape else {
        return Ok(hints);
    };
    if let Some(opacity) = &shape.opacity {
        for el in elements {
            doc.set_style(*el, "opacity", opacity.to_string());
        }
    }
    if let Some(color) = &shape.color {
        for el in elements {
            doc.set_style(*el, "fill", color.to_string());
        }
        return Ok(hints);
    }
    let Some(scale) = scale_of(shape.threshold.as_ref(), shape.choropleth.as_ref()) else {
        return Ok(hints);
    };
    let value = Expression::compile(shape.value.as_deref().unwrap_or(""))?;
    for el in elements {
        let Some((record, i)) = record_of(doc, *el) else {
            continue;
        };
        let v = parse_float(&value.evaluate(&expression_context(&record, Some(i), extra))?);
        if let Some(color) = scale.color(v) {
            doc.set_style(*el, "fill", color);
        }
    }
    hints.scale = Some(scale);
    hints.elements = elements.to_vec();
    Ok(hints)
}

/// Field of an overlaid feature that fill values are joined on.
pub const FEATURE_KEY: &str = "id";

/// Color an overlaid layer's paths from values keyed by feature id.
pub fn apply_fill_styles(
    doc: &mut SceneDocument,
    fill: &FillDisplay,
    paths: &[NodeId],
    values: &HashMap<String, f64>,
) -> StyleHints {
    let Some(scale) = scale_of(fill.threshold.as_ref(), fill.choropleth.as_ref()) else {
        return StyleHints::default();
    };
    for p in paths {
        let v = doc
            .datum(*p)
            .and_then(|d| d.value.get(FEATURE_KEY))
            .and_then(lookup_key)
            .and_then(|k| values.get(&k).copied())
            .unwrap_or(f64::NAN);
        if let Some(color) = scale.color(v) {
            doc.set_style(*p, "fill", color);
        }
    }
    StyleHints {
        scale: Some(scale),
        elements: paths.to_vec(),
    }
}

/// Breakpoints shown by a legend: shape scales first, then fill scales.
pub fn legend_values(spec: &LayerSpec) -> Vec<f64> {
    if let Some(shape) = &spec.display.shape {
        return shape
            .threshold
            .as_ref()
            .or(shape.choropleth.as_ref())
            .map(|s| s.values.clone())
            .unwrap_or_default();
    }
    spec.display
        .fill
        .as_ref()
        .and_then(|f| f.threshold.as_ref().or(f.choropleth.as_ref()))
        .map(|s| s.values.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Categorical, CssValue, Paint, ScaleConfig, ShapeDisplay};
    use pretty_assertions::assert_eq;
    use scene::Datum;
    use serde_json::json;

    fn paths(doc: &mut SceneDocument, records: &[Value]) -> Vec<NodeId> {
        records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let p = doc.append(doc.root(), "path");
                doc.set_datum(p, Datum::new(r.clone(), i));
                p
            })
            .collect()
    }

    fn scale(values: &[f64], colors: &[&str]) -> ScaleConfig {
        ScaleConfig {
            values: values.to_vec(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn geodata_defaults_apply_only_to_present_blocks() {
        let mut doc = SceneDocument::new();
        let ps = paths(&mut doc, &[json!({"id": "FRA"})]);
        let mut spec = LayerSpec::default();
        apply_geodata_styles(&mut doc, &spec, &ps, &ExtraContext::new()).unwrap();
        assert_eq!(doc.style(ps[0], "fill"), None);
        assert_eq!(doc.style(ps[0], "stroke"), None);

        spec.styles.background = Some(Paint::default());
        spec.styles.lines = Some(Paint {
            stroke: Some(CssValue::Text("#333".to_string())),
            ..Default::default()
        });
        apply_geodata_styles(&mut doc, &spec, &ps, &ExtraContext::new()).unwrap();
        assert_eq!(doc.style(ps[0], "fill"), Some("#fff"));
        assert_eq!(doc.style(ps[0], "stroke"), Some("#333"));
        assert_eq!(doc.style(ps[0], "stroke-width"), Some("0.5px"));
        assert_eq!(doc.style(ps[0], "stroke-opacity"), Some("0.5"));
    }

    #[test]
    fn geodata_fill_from_palette_or_expression() {
        let mut doc = SceneDocument::new();
        let ps = paths(&mut doc, &[json!({"id": 3}), json!({"id": 23})]);
        let mut spec = LayerSpec::default();
        spec.display.fill = Some(FillDisplay {
            categorical: Some(Categorical {
                name: Some("category10".to_string()),
                value: Some("d.id".to_string()),
            }),
            ..Default::default()
        });
        apply_geodata_styles(&mut doc, &spec, &ps, &ExtraContext::new()).unwrap();
        assert_eq!(doc.style(ps[0], "fill"), Some("#d62728"));
        assert_eq!(doc.style(ps[1], "fill"), Some("#d62728"));

        spec.display.fill = Some(FillDisplay {
            value: Some("i == 0 ? 'red' : 'blue'".to_string()),
            ..Default::default()
        });
        reset_geodata_styles(&mut doc, &spec, &ps, &ExtraContext::new()).unwrap();
        assert_eq!(doc.style(ps[0], "fill"), Some("red"));
        assert_eq!(doc.style(ps[1], "fill"), Some("blue"));
    }

    #[test]
    fn shape_threshold_reads_embedded_records() {
        let mut doc = SceneDocument::new();
        let ps = paths(
            &mut doc,
            &[json!({"d": {"mag": "5"}}), json!({"d": {"mag": "7.5"}}), json!({"d": {}})],
        );
        let mut spec = LayerSpec::default();
        spec.display.shape = Some(ShapeDisplay {
            value: Some("d.mag".to_string()),
            threshold: Some(scale(&[6.0, 7.0], &["green", "orange", "red"])),
            opacity: Some(CssValue::Number(0.6)),
            ..Default::default()
        });
        let hints = apply_shape_styles(&mut doc, &spec, &ps, &ExtraContext::new()).unwrap();
        assert_eq!(doc.style(ps[0], "fill"), Some("green"));
        assert_eq!(doc.style(ps[1], "fill"), Some("red"));
        assert_eq!(doc.style(ps[2], "fill"), None);
        assert_eq!(doc.style(ps[0], "opacity"), Some("0.6"));
        assert_eq!(hints.elements, ps);
        assert!(matches!(hints.scale, Some(ColorScale::Threshold { .. })));
    }

    #[test]
    fn flat_shape_color_has_no_scale() {
        let mut doc = SceneDocument::new();
        let ps = paths(&mut doc, &[json!({"d": {}})]);
        let mut spec = LayerSpec::default();
        spec.display.shape = Some(ShapeDisplay {
            color: Some(CssValue::Text("steelblue".to_string())),
            threshold: Some(scale(&[1.0], &["a", "b"])),
            ..Default::default()
        });
        let hints = apply_shape_styles(&mut doc, &spec, &ps, &ExtraContext::new()).unwrap();
        assert_eq!(doc.style(ps[0], "fill"), Some("steelblue"));
        assert_eq!(hints, StyleHints::default());
    }

    #[test]
    fn fill_styles_leave_unknown_features_alone() {
        let mut doc = SceneDocument::new();
        let ps = paths(&mut doc, &[json!({"id": "FRA"}), json!({"id": "ESP"})]);
        doc.set_style(ps[1], "fill", "#fff");
        let fill = FillDisplay {
            choropleth: Some(scale(&[0.0, 100.0], &["light", "dark"])),
            ..Default::default()
        };
        let values = HashMap::from([("FRA".to_string(), 80.0)]);
        let hints = apply_fill_styles(&mut doc, &fill, &ps, &values);
        assert_eq!(doc.style(ps[0], "fill"), Some("dark"));
        assert_eq!(doc.style(ps[1], "fill"), Some("#fff"));
        assert_eq!(hints.elements.len(), 2);
    }

    #[test]
    fn legend_values_prefer_shape_scales() {
        let mut spec = LayerSpec::default();
        assert!(legend_values(&spec).is_empty());
        spec.display.fill = Some(FillDisplay {
            threshold: Some(scale(&[1.0, 2.0], &[])),
            ..Default::default()
        });
        assert_eq!(legend_values(&spec), vec![1.0, 2.0]);
        spec.display.shape = Some(ShapeDisplay {
            choropleth: Some(scale(&[5.0], &[])),
            ..Default::default()
        });
        assert_eq!(legend_values(&spec), vec![5.0]);
    }
}
