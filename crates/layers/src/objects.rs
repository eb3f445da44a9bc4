//! Objects data layers: circles, lines, polygons and images built from
//! plain records.

use std::collections::HashMap;

use expressions::{ExprError, Expression, parse_float};
use foundation::math::{Geometry, LonLat, circle, format_coord, format_number};
use runtime::TransitionSpec;
use scene::{Datum, NodeId};
use serde_json::{Value, json};
use tracing::warn;

use crate::animation::{AnimationPlan, AnimationRun, Ticker};
use crate::context::{ExtraContext, expression_context, lookup_key};
use crate::effects::{Hook, Motion};
use crate::labels::{LabelAnchor, render_labels};
use crate::layer::{Layer, LayerKind, RenderCx, RenderError, layer_element};
use crate::legend::configure_legend;
use crate::symbology::{apply_shape_styles, legend_values};
use crate::spec::{AnimationConfig, LayerSpec, ShapeDisplay};
use crate::tooltip::{self, Lookup};

/// Angular precision of circle outlines, in degrees.
const CIRCLE_PRECISION: f64 = 6.0;
const IMAGE_SIZE: [f64; 2] = [29.0, 19.0];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ObjectsLayer;

/// `[lon, lat]` from an array value, each part read with `parseFloat`.
fn lonlat(value: &Value) -> Option<LonLat> {
    let parts = value.as_array()?;
    let (lon, lat) = (parse_float(parts.first()?), parse_float(parts.get(1)?));
    (lon.is_finite() && lat.is_finite()).then_some([lon, lat])
}

fn compile(source: Option<&str>) -> Result<Expression, ExprError> {
    Expression::compile(source.unwrap_or(""))
}

/// Records as a sequence; anything else renders nothing.
fn records(data: &Value) -> &[Value] {
    data.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn styles_and_legend(
    cx: &mut RenderCx<'_>,
    element: NodeId,
    shapes: &[NodeId],
) -> Result<(), RenderError> {
    let hints = apply_shape_styles(cx.doc, cx.spec, shapes, cx.extra)?;
    if let Some(scale) = &hints.scale {
        configure_legend(
            cx.doc,
            element,
            cx.spec,
            scale,
            &legend_values(cx.spec),
            cx.extra,
        )?;
    }
    Ok(())
}

fn lookup(spec: &LayerSpec, data: &[Value]) -> Lookup {
    let key_field = spec.data.as_ref().map(|d| d.id_field()).unwrap_or("id");
    let values: HashMap<String, Value> = data
        .iter()
        .filter_map(|r| Some((r.get(key_field).and_then(lookup_key)?, r.clone())))
        .collect();
    Lookup {
        values,
        key_field: key_field.to_string(),
    }
}

struct Circles<'a> {
    origin: Expression,
    radius: Expression,
    extra: &'a ExtraContext,
}

impl Circles<'_> {
    fn place(&self, record: &Value, i: usize) -> Result<Option<(LonLat, f64)>, ExprError> {
        let ctx = expression_context(record, Some(i), self.extra);
        let Some(origin) = lonlat(&self.origin.evaluate(&ctx)?) else {
            return Ok(None);
        };
        let radius = parse_float(&self.radius.evaluate(&ctx)?);
        Ok(radius.is_finite().then_some((origin, radius)))
    }

    fn draw(
        &self,
        cx: &mut RenderCx<'_>,
        element: NodeId,
        record: &Value,
        i: usize,
    ) -> Result<Option<(NodeId, LonLat)>, ExprError> {
        let Some((origin, radius)) = self.place(record, i)? else {
            return Ok(None);
        };
        let path = cx.doc.append(element, "path");
        if let Some(name) = record.get("name").and_then(lookup_key) {
            cx.doc.set_attr(path, "id", name);
        }
        cx.doc.set_attr(path, "class", "point");
        cx.map.draw(cx.doc, path, circle(origin, radius, CIRCLE_PRECISION));
        cx.doc.set_datum(path, Datum::new(json!({ "d": record }), i));
        Ok(Some((path, origin)))
    }
}

fn render_circles(
    cx: &mut RenderCx<'_>,
    shape: &ShapeDisplay,
    data: &[Value],
) -> Result<(), RenderError> {
    let spec = cx.spec;
    let element = layer_element(cx.doc, cx.map, spec);
    let circles = Circles {
        origin: compile(shape.origin.as_deref())?,
        radius: compile(shape.radius.as_deref())?,
        extra: cx.extra,
    };

    let mut shapes = Vec::new();
    if let Some(animation) = &spec.behavior.animation {
        let Some(plan) = AnimationPlan::build(data, animation, cx.extra)? else {
            return Ok(());
        };
        for (i, animated) in plan.records.iter().enumerate() {
            if let Some((path, _)) = circles.draw(cx, element, &animated.record, i)? {
                cx.doc.set_style(path, "fill-opacity", "0");
                shapes.push((path, animated.value));
            }
        }
        let nodes: Vec<NodeId> = shapes.iter().map(|(n, _)| *n).collect();
        styles_and_legend(cx, element, &nodes)?;
        let by_id = lookup(spec, data);
        tooltip::configure(cx.doc, spec, &nodes, Some(by_id), cx.extra, cx.effects)?;
        schedule_animation(cx, animation, &plan, &shapes)?;
    } else {
        let mut anchors = Vec::new();
        for (i, record) in data.iter().enumerate() {
            if let Some((path, origin)) = circles.draw(cx, element, record, i)? {
                shapes.push((path, 0.0));
                anchors.push(LabelAnchor {
                    origin,
                    record,
                    index: i,
                });
            }
        }
        if let Some(label) = &shape.label {
            render_labels(cx.doc, cx.map, element, label, &anchors, cx.extra)?;
        }
        let nodes: Vec<NodeId> = shapes.iter().map(|(n, _)| *n).collect();
        styles_and_legend(cx, element, &nodes)?;
        let by_id = lookup(spec, data);
        tooltip::configure(cx.doc, spec, &nodes, Some(by_id), cx.extra, cx.effects)?;
    }
    Ok(())
}

/// One flash per record, delayed by its value, plus the counter ticking in
/// the map's animation readout.
fn schedule_animation(
    cx: &mut RenderCx<'_>,
    config: &AnimationConfig,
    plan: &AnimationPlan,
    shapes: &[(NodeId, f64)],
) -> Result<(), ExprError> {
    let owner = cx.map.layer_key(&cx.spec.id);
    for (node, value) in shapes {
        let motion = Motion::owned_by(owner.clone())
            .on_start(Hook::SetStyle {
                node: *node,
                name: "fill-opacity".to_string(),
                value: "1".to_string(),
            })
            .on_end(Hook::SetStyle {
                node: *node,
                name: "fill-opacity".to_string(),
                value: "0".to_string(),
            })
            .on_end(Hook::RecordFaded { run: owner.clone() });
        let spec = TransitionSpec::new(plan.delay(*value), plan.interval);
        cx.effects.motions.push((spec, motion));
    }

    let label = config
        .label
        .as_deref()
        .map(Expression::compile)
        .transpose()?;
    cx.effects.tickers.push((
        plan.interval,
        Ticker {
            owner: owner.clone(),
            target: format!("{}-animation", cx.map.id),
            current: plan.min,
            max: plan.max,
            label,
            extra: cx.extra.clone(),
        },
    ));
    cx.effects.animations.push((
        owner,
        AnimationRun {
            remaining: shapes.len(),
            show_all_at_end: config.show_all_at_end,
            elements: shapes.iter().map(|(n, _)| *n).collect(),
        },
    ));
    Ok(())
}

/// Points of a line or polygon: `value` yields the point list, `pointValue`
/// turns each point into `[lon, lat]`.
fn point_list(
    value: &Expression,
    point_value: &Expression,
    record: &Value,
    i: usize,
    extra: &ExtraContext,
) -> Result<Vec<LonLat>, ExprError> {
    let points = value.evaluate(&expression_context(record, Some(i), extra))?;
    let mut coordinates = Vec::new();
    for (j, point) in points.as_array().map(Vec::as_slice).unwrap_or(&[]).iter().enumerate() {
        if let Some(p) = lonlat(&point_value.evaluate(&expression_context(point, Some(j), extra))?)
        {
            coordinates.push(p);
        }
    }
    Ok(coordinates)
}

/// Close a ring whose first two points differ in both coordinates.
fn close_polygon(coordinates: &mut Vec<LonLat>) {
    if coordinates.len() > 2 {
        let (a, b) = (coordinates[0], coordinates[1]);
        if a[0] != b[0] && a[1] != b[1] {
            coordinates.push(a);
        }
    }
}

fn render_lines(
    cx: &mut RenderCx<'_>,
    shape: &ShapeDisplay,
    data: &[Value],
    closed: bool,
) -> Result<(), RenderError> {
    let spec = cx.spec;
    let element = layer_element(cx.doc, cx.map, spec);
    let value = compile(shape.value.as_deref())?;
    let point_value = compile(shape.point_value.as_deref())?;
    let lines = spec.styles.lines.as_ref();
    let fill = if closed {
        spec.styles
            .background
            .as_ref()
            .and_then(|b| b.fill.as_ref())
            .map(ToString::to_string)
    } else {
        Some("none".to_string())
    };

    let mut nodes = Vec::with_capacity(data.len());
    for (i, record) in data.iter().enumerate() {
        let mut coordinates = point_list(&value, &point_value, record, i, cx.extra)?;
        if closed {
            close_polygon(&mut coordinates);
        }
        let path = cx.doc.append(element, "path");
        cx.doc
            .set_attr(path, "class", if closed { "polygon" } else { "line" });
        cx.map.draw(cx.doc, path, Geometry::LineString(coordinates));
        cx.doc.set_datum(path, Datum::new(json!({ "d": record }), i));
        if let Some(fill) = &fill {
            cx.doc.set_style(path, "fill", fill.clone());
        }
        if let Some(stroke) = lines.and_then(|l| l.stroke.as_ref()) {
            cx.doc.set_style(path, "stroke", stroke.to_string());
        }
        if let Some(width) = lines.and_then(|l| l.stroke_width.as_ref()) {
            cx.doc.set_style(path, "stroke-width", width.to_string());
        }
        nodes.push(path);
    }
    let by_id = lookup(spec, data);
    tooltip::configure(cx.doc, spec, &nodes, Some(by_id), cx.extra, cx.effects)?;
    Ok(())
}

fn render_images(
    cx: &mut RenderCx<'_>,
    shape: &ShapeDisplay,
    data: &[Value],
) -> Result<(), RenderError> {
    let element = layer_element(cx.doc, cx.map, cx.spec);
    let origin = compile(shape.origin.as_deref())?;
    let [w, h] = IMAGE_SIZE;
    for (i, record) in data.iter().enumerate() {
        let ctx = expression_context(record, Some(i), cx.extra);
        let Some(at) = lonlat(&origin.evaluate(&ctx)?) else {
            continue;
        };
        let path = cx.doc.append(element, "path");
        cx.doc.set_attr(path, "class", "point");
        cx.map.draw(cx.doc, path, Geometry::Point(at));
        cx.doc.set_datum(path, Datum::new(json!({ "d": record }), i));

        let image = cx.doc.append(path, "image");
        if let Some(href) = &shape.href {
            cx.doc.set_attr(image, "xlink:href", href.clone());
        }
        cx.doc.set_attr(image, "width", format_number(w));
        cx.doc.set_attr(image, "height", format_number(h));
        if let Some([x, y]) = cx.map.projection.project(at) {
            cx.doc.set_attr(image, "x", format_coord(x - w / 2.0));
            cx.doc.set_attr(image, "y", format_coord(y - h / 2.0));
        }
    }
    Ok(())
}

impl Layer for ObjectsLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Objects
    }

    fn render(&self, cx: &mut RenderCx<'_>, data: &Value) -> Result<(), RenderError> {
        let spec = cx.spec;
        let Some(shape) = spec.display.shape.as_ref() else {
            return Err(RenderError::Missing("display.shape"));
        };
        let data = records(data);
        match shape.shape_type.as_deref() {
            Some("circle") => render_circles(cx, shape, data),
            Some("line") => render_lines(cx, shape, data, false),
            Some("polygon") => render_lines(cx, shape, data, true),
            Some("image") => render_images(cx, shape, data),
            other => {
                warn!(layer = %spec.id, shape = ?other, "Unsupported object shape");
                Ok(())
            }
        }
    }
}
