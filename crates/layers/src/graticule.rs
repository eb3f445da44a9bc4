//! Grid lines, plus the globe outline used as background and border.

use foundation::math::{Geometry, graticule};
use serde_json::Value;

use crate::layer::{Layer, LayerKind, RenderCx, RenderError, layer_element};
use crate::spec::{CssValue, Paint};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GraticuleLayer;

fn paint_value(
    paint: Option<&Paint>,
    pick: impl Fn(&Paint) -> Option<&CssValue>,
    default: &str,
) -> String {
    paint
        .and_then(pick)
        .map(ToString::to_string)
        .unwrap_or_else(|| default.to_string())
}

impl Layer for GraticuleLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Graticule
    }

    fn render(&self, cx: &mut RenderCx<'_>, _data: &Value) -> Result<(), RenderError> {
        let element = layer_element(cx.doc, cx.map, cx.spec);
        let display = &cx.spec.display;
        let styles = &cx.spec.styles;

        if display.background || display.border {
            let defs = cx.doc.append(element, "defs");
            let sphere = cx.doc.append(defs, "path");
            cx.doc.set_attr(sphere, "id", "sphere");
            cx.map.draw(cx.doc, sphere, Geometry::Sphere);
        }
        if display.border {
            let border = cx.doc.append(element, "use");
            cx.doc.set_attr(border, "class", "stroke");
            cx.doc.set_attr(border, "xlink:href", "#sphere");
            let paint = styles.border.as_ref();
            cx.doc
                .set_style(border, "stroke", paint_value(paint, |p| p.stroke.as_ref(), "#000"));
            cx.doc.set_style(
                border,
                "stroke-width",
                paint_value(paint, |p| p.stroke_width.as_ref(), "1px"),
            );
            cx.doc.set_style(border, "fill", "none");
        }
        if display.background {
            let background = cx.doc.append(element, "use");
            cx.doc.set_attr(background, "class", "fill");
            cx.doc.set_attr(background, "xlink:href", "#sphere");
            cx.doc.set_style(
                background,
                "fill",
                paint_value(styles.background.as_ref(), |p| p.fill.as_ref(), "#000"),
            );
        }
        if display.lines {
            let grid = cx.doc.append(element, "path");
            let id = if cx.spec.id.is_empty() {
                "graticuleLayer"
            } else {
                cx.spec.id.as_str()
            };
            cx.doc.set_attr(grid, "id", id);
            cx.doc.set_attr(grid, "class", "graticule");
            let paint = styles.lines.as_ref();
            cx.doc.set_style(grid, "fill", "none");
            cx.doc
                .set_style(grid, "stroke", paint_value(paint, |p| p.stroke.as_ref(), "#777"));
            cx.doc.set_style(
                grid,
                "stroke-width",
                paint_value(paint, |p| p.stroke_width.as_ref(), "0.5px"),
            );
            cx.doc.set_style(
                grid,
                "stroke-opacity",
                paint_value(paint, |p| p.stroke_opacity.as_ref(), "0.5"),
            );
            cx.map.draw(cx.doc, grid, graticule());
        }
        Ok(())
    }
}
