//! Geodata layers: one path per GeoJSON feature, or a single border mesh
//! from a TopoJSON object.

use formats::geojson::{feature_geometry, features};
use formats::topojson::Topology;
use scene::{Datum, NodeId};
use serde_json::Value;
use tracing::debug;

use crate::context::lookup_key;
use crate::interaction::wire_behaviors;
use crate::layer::{Layer, LayerKind, RenderCx, RenderError, layer_element};
use crate::symbology::apply_geodata_styles;
use crate::tooltip;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GeoDataLayer;

/// Features to draw, or the mesh geometry when interior borders are asked
/// for.
enum Shapes {
    Features(Vec<Value>),
    Mesh(foundation::math::Geometry),
}

fn shapes(cx: &RenderCx<'_>, data: &Value) -> Result<Shapes, RenderError> {
    let descriptor = cx.spec.data.as_ref();
    let root_object = descriptor.and_then(|d| d.root_object.as_deref());
    let Some(name) = root_object else {
        return Ok(Shapes::Features(features(data)));
    };
    let topology = Topology::parse(data)?;
    let object = topology.object(name)?;
    if descriptor.is_some_and(|d| d.mesh) {
        let mesh = topology.mesh(object, |a, b| a.get("id") != b.get("id"))?;
        return Ok(Shapes::Mesh(mesh));
    }
    Ok(Shapes::Features(features(&topology.feature(object)?)))
}

impl Layer for GeoDataLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::GeoData
    }

    fn render(&self, cx: &mut RenderCx<'_>, data: &Value) -> Result<(), RenderError> {
        let shapes = shapes(cx, data)?;
        let element = layer_element(cx.doc, cx.map, cx.spec);

        let mut paths: Vec<NodeId> = Vec::new();
        match shapes {
            Shapes::Mesh(mesh) => {
                let path = cx.doc.append(element, "path");
                cx.doc.set_attr(path, "class", "mesh");
                cx.map.draw(cx.doc, path, mesh);
                // A mesh has no per-feature datum to point at.
                apply_geodata_styles(cx.doc, cx.spec, &[path], cx.extra)?;
                return Ok(());
            }
            Shapes::Features(features) => {
                debug!(layer = %cx.spec.id, count = features.len(), "Drawing features");
                for (i, feature) in features.into_iter().enumerate() {
                    let path = cx.doc.append(element, "path");
                    if let Some(id) = feature.get("id").and_then(lookup_key) {
                        cx.doc.set_attr(path, "id", id);
                    }
                    cx.doc.set_attr(path, "class", "feature");
                    if let Some(geometry) = feature_geometry(&feature) {
                        cx.map.draw(cx.doc, path, geometry);
                    }
                    cx.doc.set_datum(path, Datum::new(feature, i));
                    paths.push(path);
                }
            }
        }

        apply_geodata_styles(cx.doc, cx.spec, &paths, cx.extra)?;
        tooltip::configure(cx.doc, cx.spec, &paths, None, cx.extra, cx.effects)?;
        wire_behaviors(cx.doc, cx.spec, &paths);
        Ok(())
    }
}
