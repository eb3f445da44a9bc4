//! Text labels next to circle objects.

use expressions::{ExprError, Expression, to_display_string};
use foundation::math::{LonLat, format_coord, format_number};
use scene::NodeId;
use serde_json::Value;

use crate::context::{ExtraContext, expression_context};
use crate::effects::SceneDocument;
use crate::map::MapContext;
use crate::spec::ShapeLabel;

/// A record to label and the geographic point it hangs off.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelAnchor<'a> {
    pub origin: LonLat,
    pub record: &'a Value,
    pub index: usize,
}

/// One `text` per anchor at its projected origin, shifted by the label
/// position. Anchors outside the visible hemisphere get no label.
pub fn render_labels(
    doc: &mut SceneDocument,
    map: &MapContext,
    parent: NodeId,
    label: &ShapeLabel,
    anchors: &[LabelAnchor<'_>],
    extra: &ExtraContext,
) -> Result<Vec<NodeId>, ExprError> {
    let text = Expression::compile(label.text.as_deref().unwrap_or("''"))?;
    let (dx, dy) = label
        .position
        .as_ref()
        .map(|p| (p.x.unwrap_or(0.0), p.y.unwrap_or(0.0)))
        .unwrap_or((0.0, 0.0));

    let mut out = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        let Some([x, y]) = map.projection.project(anchor.origin) else {
            continue;
        };
        let node = doc.append(parent, "text");
        doc.set_attr(node, "class", "label");
        doc.set_attr(node, "x", format_coord(x));
        doc.set_attr(node, "y", format_coord(y));
        doc.set_attr(node, "dx", format_number(dx));
        doc.set_attr(node, "dy", format_number(dy));
        let ctx = expression_context(anchor.record, Some(anchor.index), extra);
        let content = match text.evaluate(&ctx)? {
            Value::Null => String::new(),
            other => to_display_string(&other),
        };
        doc.set_text(node, Some(content));
        out.push(node);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapProperties;
    use crate::spec::LabelOffset;
    use foundation::math::Projection;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn labels_sit_at_projected_origins() {
        let mut doc = SceneDocument::new();
        let svg = doc.append(doc.root(), "svg");
        let map = MapContext::attach(
            &mut doc,
            svg,
            "map1",
            Projection::orthographic()
                .with_scale(100.0)
                .with_translate([480.0, 250.0])
                .with_clip_angle(90.0),
            960.0,
            500.0,
            MapProperties {
                center: [0.0, 0.0],
                scale: 100.0,
            },
        );
        let paris = json!({"name": "Paris"});
        let antipode = json!({"name": "Nowhere"});
        let label = ShapeLabel {
            text: Some("d.name".to_string()),
            position: Some(LabelOffset {
                x: Some(5.0),
                y: None,
            }),
        };
        let anchors = [
            LabelAnchor {
                origin: [0.0, 0.0],
                record: &paris,
                index: 0,
            },
            LabelAnchor {
                origin: [180.0, 0.0],
                record: &antipode,
                index: 1,
            },
        ];
        let nodes =
            render_labels(&mut doc, &map, map.layers, &label, &anchors, &ExtraContext::new())
                .unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.attr(nodes[0], "x"), Some("480"));
        assert_eq!(doc.attr(nodes[0], "y"), Some("250"));
        assert_eq!(doc.attr(nodes[0], "dx"), Some("5"));
        assert_eq!(doc.attr(nodes[0], "dy"), Some("0"));
        assert_eq!(doc.text(nodes[0]), Some("Paris"));
    }
}
