//! Click behaviors: rotating the globe to a feature, and drilling down into
//! a sub-map built around it.

use foundation::math::{Geometry, Projection, centroid};
use runtime::TransitionSpec;
use scene::{Datum, NodeId};
use serde_json::{Value, json};
use tracing::debug;

use crate::context::{ExtraContext, lookup_key};
use crate::effects::{Action, Hook, Motion, Redraw, SceneDocument, Transform2, Tween};
use crate::map::{
    MapContext, MapContexts, MapProperties, PRIMARY_MAP_ID, SUB_MAP_ID, selection_bounds,
};
use crate::spec::{LayerSpec, SubMapDisplay};

pub const DELAY_MS: f64 = 100.0;
pub const DURATION_MS: f64 = 750.0;
/// Projection scale the sub-map zooms to.
pub const SUB_MAP_SCALE: f64 = 1000.0;
/// Where the primary map shrinks to while a sub-map is open.
pub const THUMBNAIL: Transform2 = Transform2 {
    translate: [750.0, 40.0],
    scale: [0.2083333283662796, 0.2083333283662796],
};

const ZOOM_NAMESPACE: &str = "zoom";
const SUB_MAP_NAMESPACE: &str = "submap";

/// Bind click behaviors. Zoom-to-selection wins over drill-down.
pub fn wire_behaviors(doc: &mut SceneDocument, spec: &LayerSpec, elements: &[NodeId]) {
    if spec.behavior.zoom_bounding_box.is_some() {
        for el in elements {
            doc.on(*el, &format!("click.{ZOOM_NAMESPACE}"), Action::ZoomToSelection);
        }
        return;
    }
    let drills = spec
        .display
        .sub_map
        .as_ref()
        .and_then(|s| s.events.as_ref())
        .and_then(|e| e.display.as_deref())
        == Some("click");
    if drills {
        for el in elements {
            doc.on(
                *el,
                &format!("click.{SUB_MAP_NAMESPACE}"),
                Action::OpenSubMap {
                    layer: spec.id.clone(),
                },
            );
        }
    }
}

fn transition(key: impl Into<String>) -> TransitionSpec {
    TransitionSpec::new(DELAY_MS, DURATION_MS).keyed(key)
}

fn facing(geometry: &Geometry) -> Option<Vec<f64>> {
    let c = centroid(geometry)?;
    Some(vec![-c[0], -c[1]])
}

/// Rotate `map` so the centroid of `geometry` faces the viewer.
pub fn zoom_motion(map: &MapContext, geometry: &Geometry) -> Option<(TransitionSpec, Motion)> {
    if !map.projection.rotatable() {
        return None;
    }
    let to = facing(geometry)?;
    let motion = Motion::default().tween(Tween::Rotate {
        map: map.id.clone(),
        from: None,
        to,
        redraw: Redraw::Map,
    });
    Some((transition(format!("zoom-{}", map.id)), motion))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DrillPhase {
    Spawning,
    AnimatingIn,
    ShowingSublayers,
    AnimatingOut,
    Closed,
}

/// One drill-down from a clicked feature into the sub-map.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillDown {
    pub phase: DrillPhase,
    /// Layer whose feature was clicked.
    pub layer: String,
    pub sub_map: SubMapDisplay,
    /// Copy of the clicked feature drawn in the sub-map.
    pub clone: NodeId,
    /// `{shape, bounds}` handed to sub-layer expressions.
    pub extra: ExtraContext,
}

fn sub_map_projection(primary: &MapContext) -> Projection {
    let props = primary.properties;
    Projection::orthographic()
        .with_scale(props.scale)
        .with_clip_angle(90.0)
        .with_rotate(&props.center)
        .with_translate(primary.projection.translate)
}

impl DrillDown {
    /// Build the sub-map around `target` and make it current. `None` when the
    /// layer has no sub-map or the target has no geometry with a centroid.
    pub fn spawn(
        doc: &mut SceneDocument,
        maps: &mut MapContexts,
        svg: NodeId,
        spec: &LayerSpec,
        target: NodeId,
    ) -> Option<Self> {
        let sub_map = spec.display.sub_map.clone()?;
        let geometry = doc.geometry(target)?.clone();
        if facing(&geometry).is_none() {
            debug!(layer = %spec.id, "Selection has no centroid to zoom onto");
            return None;
        }
        let shape = doc.datum(target).map(|d| d.value.clone()).unwrap_or(Value::Null);
        let primary = maps.get(PRIMARY_MAP_ID)?.clone();

        let map = MapContext::attach(
            doc,
            svg,
            SUB_MAP_ID,
            sub_map_projection(&primary),
            primary.width,
            primary.height,
            MapProperties {
                center: primary.properties.center,
                scale: primary.properties.scale,
            },
        );
        let background = doc.append(map.root, "rect");
        doc.set_attr(background, "width", foundation::math::format_number(map.width));
        doc.set_attr(background, "height", foundation::math::format_number(map.height));
        doc.set_style(background, "fill", "white");
        doc.set_style(background, "opacity", "0.75");
        // Keep the background below the layers.
        doc.append_child(map.root, map.layers);

        let root = doc.append(map.layers, "g");
        doc.set_attr(root, "id", "root");
        let clone = doc.append(root, "path");
        if let Some(id) = shape.get("id").and_then(lookup_key) {
            doc.set_attr(clone, "id", format!("cloned{id}"));
        }
        doc.set_style(clone, "fill", "grey");
        doc.set_style(clone, "stroke", "#fff");
        doc.set_style(clone, "stroke-width", "1px");
        doc.set_style(clone, "stroke-opacity", "1");
        map.draw(doc, clone, geometry.clone());
        doc.set_datum(clone, Datum::new(shape.clone(), 0));

        let bounds = selection_bounds(&geometry, map.width, map.height);
        let mut extra = ExtraContext::new();
        extra.insert("shape".to_string(), shape);
        extra.insert("bounds".to_string(), json!(bounds.bounds));

        maps.insert(map);
        maps.set_current(SUB_MAP_ID);
        debug!(layer = %spec.id, "Spawned sub-map");
        Some(Self {
            phase: DrillPhase::Spawning,
            layer: spec.id.clone(),
            sub_map,
            clone,
            extra,
        })
    }

    pub fn is_active(&self) -> bool {
        self.phase != DrillPhase::Closed
    }

    /// Zoom the sub-map onto the clone while the primary map shrinks.
    pub fn animate_in(
        &mut self,
        doc: &SceneDocument,
        maps: &MapContexts,
    ) -> Vec<(TransitionSpec, Motion)> {
        let mut out = Vec::new();
        let Some(geometry) = doc.geometry(self.clone) else {
            return out;
        };
        let Some(to) = facing(geometry) else {
            return out;
        };
        let redraw = Redraw::Nodes(vec![self.clone]);
        let zoom = Motion::default()
            .tween(Tween::Rotate {
                map: SUB_MAP_ID.to_string(),
                from: None,
                to,
                redraw: redraw.clone(),
            })
            .tween(Tween::Scale {
                map: SUB_MAP_ID.to_string(),
                from: None,
                to: SUB_MAP_SCALE,
                redraw,
            })
            .on_end(Hook::SubMapShown);
        out.push((transition(SUB_MAP_ID), zoom));
        if let Some(primary) = maps.get(PRIMARY_MAP_ID) {
            out.push((transition(PRIMARY_MAP_ID), shrink(primary, THUMBNAIL)));
        }
        self.phase = DrillPhase::AnimatingIn;
        out
    }

    /// The zoom finished: sub-layers may render now.
    pub fn shown(&mut self) -> bool {
        if self.phase != DrillPhase::AnimatingIn {
            return false;
        }
        self.phase = DrillPhase::ShowingSublayers;
        true
    }

    /// Reverse the zoom and restore the primary map. Only an open sub-map
    /// can close.
    pub fn animate_out(&mut self, maps: &mut MapContexts) -> Vec<(TransitionSpec, Motion)> {
        if self.phase != DrillPhase::ShowingSublayers {
            return Vec::new();
        }
        let Some(primary) = maps.get(PRIMARY_MAP_ID).cloned() else {
            return Vec::new();
        };
        let redraw = Redraw::Nodes(vec![self.clone]);
        let props = primary.properties;
        let zoom = Motion::default()
            .tween(Tween::Rotate {
                map: SUB_MAP_ID.to_string(),
                from: None,
                to: props.center.to_vec(),
                redraw: redraw.clone(),
            })
            .tween(Tween::Scale {
                map: SUB_MAP_ID.to_string(),
                from: None,
                to: props.scale,
                redraw,
            })
            .on_end(Hook::SubMapClosed);
        maps.set_current(PRIMARY_MAP_ID);
        self.phase = DrillPhase::AnimatingOut;
        vec![
            (transition(SUB_MAP_ID), zoom),
            (transition(PRIMARY_MAP_ID), shrink(&primary, Transform2::IDENTITY)),
        ]
    }

    /// Drop the sub-map scene once the reverse zoom ended.
    pub fn finish(&mut self, doc: &mut SceneDocument, maps: &mut MapContexts) {
        if let Some(map) = maps.remove(SUB_MAP_ID) {
            doc.remove(map.root);
        }
        self.phase = DrillPhase::Closed;
    }
}

fn shrink(primary: &MapContext, to: Transform2) -> Motion {
    Motion::default().tween(Tween::Transform {
        node: primary.root,
        from: None,
        to,
    })
}
