//! Legends: breakpoint swatches for scaled layers, and the sub-map panel.

use expressions::{ExprError, Expression, to_display_string};
use foundation::math::format_number;
use scene::NodeId;
use serde_json::Value;

use crate::context::{ExtraContext, expression_context};
use crate::effects::{Action, SceneDocument};
use crate::map::MapContext;
use crate::scale::ColorScale;
use crate::spec::{LayerSpec, SubMapLegend};

const PITCH: f64 = 20.0;
const BASELINE: f64 = 500.0;

fn set_attrs(doc: &mut SceneDocument, node: NodeId, attrs: &[(&str, f64)]) {
    for (name, value) in attrs {
        doc.set_attr(node, name, format_number(*value));
    }
}

fn label_text(label: &Expression, ctx: &Value) -> Result<String, ExprError> {
    Ok(match label.evaluate(ctx)? {
        Value::Null => String::new(),
        other => to_display_string(&other),
    })
}

/// Legend container of `layer_id`, wherever it was placed.
pub fn find_legend(doc: &SceneDocument, layer_id: &str) -> Option<NodeId> {
    doc.select_by_class(doc.root(), "legend")
        .into_iter()
        .find(|n| doc.attr(*n, "data-layer") == Some(layer_id))
}

pub fn remove_legend(doc: &mut SceneDocument, layer_id: &str) {
    if let Some(node) = find_legend(doc, layer_id) {
        doc.remove(node);
    }
}

/// Draw one swatch and label per breakpoint under `parent`, stacked
/// bottom-up. Returns the container when the legend is enabled.
pub fn configure_legend(
    doc: &mut SceneDocument,
    parent: NodeId,
    spec: &LayerSpec,
    scale: &ColorScale,
    values: &[f64],
    extra: &ExtraContext,
) -> Result<Option<NodeId>, ExprError> {
    let Some(legend) = spec.display.legend.as_ref().filter(|l| l.enabled) else {
        return Ok(None);
    };
    let label = Expression::compile(legend.label.as_deref().unwrap_or("d"))?;

    remove_legend(doc, &spec.id);
    let container = doc.append(parent, "g");
    doc.set_attr(container, "class", "legend");
    doc.set_attr(container, "data-layer", spec.id.clone());

    let background = doc.append(container, "rect");
    set_attrs(
        doc,
        background,
        &[("x", 10.0), ("y", 350.0), ("width", 100.0), ("height", 150.0)],
    );
    doc.set_style(background, "fill", "#fff");
    doc.set_style(background, "opacity", "0.7");

    for (i, v) in values.iter().enumerate() {
        let offset = PITCH * i as f64;
        let item = doc.append(container, "g");
        doc.set_attr(item, "class", "legend-item");

        let swatch = doc.append(item, "rect");
        set_attrs(
            doc,
            swatch,
            &[
                ("x", 20.0),
                ("y", BASELINE - offset - 40.0),
                ("width", 20.0),
                ("height", 20.0),
            ],
        );
        if let Some(color) = scale.color(*v) {
            doc.set_style(swatch, "fill", color);
        }
        doc.set_style(swatch, "opacity", "0.8");

        let text = doc.append(item, "text");
        set_attrs(doc, text, &[("x", 50.0), ("y", BASELINE - offset - 24.0)]);
        let ctx = expression_context(&Value::from(*v), Some(i), extra);
        doc.set_text(text, Some(label_text(&label, &ctx)?));
    }
    Ok(Some(container))
}

/// Label, close button and animation readout of the drill-down map.
pub fn configure_sub_map_legend(
    doc: &mut SceneDocument,
    map: &MapContext,
    legend: &SubMapLegend,
    extra: &ExtraContext,
) -> Result<NodeId, ExprError> {
    let label = Expression::compile(legend.label.as_deref().unwrap_or("''"))?;
    let container = doc.append(map.root, "g");
    doc.set_attr(container, "class", "sub-map-legend");

    let panel = doc.append(container, "rect");
    set_attrs(
        doc,
        panel,
        &[("x", 10.0), ("y", 10.0), ("width", 150.0), ("height", 60.0)],
    );
    doc.set_style(panel, "fill", "grey");
    doc.set_style(panel, "opacity", "0.7");

    let title = doc.append(container, "text");
    set_attrs(doc, title, &[("x", 75.0), ("y", 35.0)]);
    doc.set_attr(title, "text-anchor", "middle");
    let ctx = expression_context(&Value::Null, None, extra);
    doc.set_text(title, Some(label_text(&label, &ctx)?));

    let close = doc.append(container, "text");
    set_attrs(doc, close, &[("x", 75.0), ("y", 55.0)]);
    doc.set_attr(close, "text-anchor", "middle");
    doc.set_attr(close, "class", "close");
    doc.set_text(close, Some("close".to_string()));
    doc.on(close, "click", Action::CloseSubMap);

    let animation_panel = doc.append(container, "rect");
    set_attrs(
        doc,
        animation_panel,
        &[("x", 10.0), ("y", 75.0), ("width", 150.0), ("height", 60.0)],
    );
    doc.set_style(animation_panel, "fill", "grey");
    doc.set_style(animation_panel, "opacity", "0.7");

    let readout = doc.append(container, "text");
    doc.set_attr(readout, "id", format!("{}-animation", map.id));
    set_attrs(doc, readout, &[("x", 75.0), ("y", 100.0)]);
    doc.set_attr(readout, "text-anchor", "middle");
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapProperties;
    use crate::spec::{LegendDisplay, ScaleConfig};
    use foundation::math::Projection;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn legend_layer(label: &str) -> LayerSpec {
        let mut spec = LayerSpec {
            id: "quakes".to_string(),
            ..Default::default()
        };
        spec.display.legend = Some(LegendDisplay {
            enabled: true,
            label: Some(label.to_string()),
        });
        spec
    }

    fn scale() -> ColorScale {
        ColorScale::threshold(&ScaleConfig {
            values: vec![10.0, 20.0],
            colors: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        })
    }

    #[test]
    fn swatches_stack_bottom_up() {
        let mut doc = SceneDocument::new();
        let group = doc.append(doc.root(), "g");
        let spec = legend_layer("'>= ' + d");
        let legend = configure_legend(
            &mut doc,
            group,
            &spec,
            &scale(),
            &[10.0, 20.0],
            &ExtraContext::new(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(find_legend(&doc, "quakes"), Some(legend));
        let items = doc.select_by_class(legend, "legend-item");
        assert_eq!(items.len(), 2);

        let second = doc.children(items[1]).to_vec();
        assert_eq!(doc.attr(second[0], "y"), Some("440"));
        assert_eq!(doc.style(second[0], "fill"), Some("C"));
        assert_eq!(doc.attr(second[1], "y"), Some("456"));
        assert_eq!(doc.text(second[1]), Some(">= 20"));

        let rects = doc.descendants_by_tag(legend, "rect");
        assert_eq!(doc.attr(rects[0], "height"), Some("150"));
    }

    #[test]
    fn replaces_and_removes_by_layer() {
        let mut doc = SceneDocument::new();
        let group = doc.append(doc.root(), "g");
        let spec = legend_layer("d");
        for _ in 0..2 {
            configure_legend(&mut doc, group, &spec, &scale(), &[10.0], &ExtraContext::new())
                .unwrap();
        }
        assert_eq!(doc.children(group).len(), 1);
        remove_legend(&mut doc, "quakes");
        assert!(doc.children(group).is_empty());

        let mut disabled = spec.clone();
        disabled.display.legend = None;
        let none =
            configure_legend(&mut doc, group, &disabled, &scale(), &[10.0], &ExtraContext::new())
                .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn sub_map_panel_closes_and_reads_out() {
        let mut doc = SceneDocument::new();
        let svg = doc.append(doc.root(), "svg");
        let map = MapContext::attach(
            &mut doc,
            svg,
            "map2",
            Projection::orthographic(),
            960.0,
            500.0,
            MapProperties {
                center: [0.0, 0.0],
                scale: 250.0,
            },
        );
        let mut extra = ExtraContext::new();
        extra.insert("shape".to_string(), json!({"id": "FRA"}));
        let legend = SubMapLegend {
            label: Some("'Detail of ' + shape.id".to_string()),
        };
        let container = configure_sub_map_legend(&mut doc, &map, &legend, &extra).unwrap();

        let texts = doc.descendants_by_tag(container, "text");
        assert_eq!(doc.text(texts[0]), Some("Detail of FRA"));
        assert_eq!(doc.handlers_for(texts[1], "click"), vec![&Action::CloseSubMap]);
        assert_eq!(doc.get_by_element_id("map2-animation"), Some(texts[2]));
    }
}
