use std::fmt;

use expressions::ExprError;
use formats::FormatError;
use scene::NodeId;
use serde_json::Value;

use crate::context::ExtraContext;
use crate::effects::{Effects, SceneDocument};
use crate::fill::FillLayer;
use crate::graticule::GraticuleLayer;
use crate::map::MapContext;
use crate::objects::ObjectsLayer;
use crate::spec::LayerSpec;
use crate::vector::GeoDataLayer;

#[derive(Debug)]
pub enum RenderError {
    Expression(ExprError),
    Format(FormatError),
    /// A required part of the configuration or scene is absent.
    Missing(&'static str),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Expression(e) => write!(f, "expression failed: {e}"),
            RenderError::Format(e) => write!(f, "undecodable layer data: {e}"),
            RenderError::Missing(what) => write!(f, "missing {what}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Expression(e) => Some(e),
            RenderError::Format(e) => Some(e),
            RenderError::Missing(_) => None,
        }
    }
}

impl From<ExprError> for RenderError {
    fn from(e: ExprError) -> Self {
        RenderError::Expression(e)
    }
}

impl From<FormatError> for RenderError {
    fn from(e: FormatError) -> Self {
        RenderError::Format(e)
    }
}

/// Everything a renderer may touch. Effects are collected here and only
/// installed once the render succeeded.
pub struct RenderCx<'a> {
    pub doc: &'a mut SceneDocument,
    /// The map the layer renders into.
    pub map: &'a MapContext,
    pub spec: &'a LayerSpec,
    pub extra: &'a ExtraContext,
    pub effects: &'a mut Effects,
}

pub trait Layer {
    fn kind(&self) -> LayerKind;
    fn render(&self, cx: &mut RenderCx<'_>, data: &Value) -> Result<(), RenderError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Graticule,
    GeoData,
    Objects,
    Fill,
}

impl LayerKind {
    /// `None` when the type/mode pair names no renderer.
    pub fn of(spec: &LayerSpec) -> Option<Self> {
        match (spec.layer_type.as_deref(), spec.mode.as_deref()) {
            (Some("graticule"), _) => Some(LayerKind::Graticule),
            (Some("geodata"), _) => Some(LayerKind::GeoData),
            (Some("data"), Some("fill")) => Some(LayerKind::Fill),
            (Some("data"), Some("objects") | None) => Some(LayerKind::Objects),
            _ => None,
        }
    }

    pub fn needs_data(self) -> bool {
        !matches!(self, LayerKind::Graticule)
    }

    pub fn renderer(self) -> &'static dyn Layer {
        match self {
            LayerKind::Graticule => &GraticuleLayer,
            LayerKind::GeoData => &GeoDataLayer,
            LayerKind::Objects => &ObjectsLayer,
            LayerKind::Fill => &FillLayer,
        }
    }
}

/// The keyed `g#<mapId>-<layerId>` group of a layer, created on first use
/// under the group of the layer it applies on, or under the map's layers.
pub fn layer_element(doc: &mut SceneDocument, map: &MapContext, spec: &LayerSpec) -> NodeId {
    let key = map.layer_key(&spec.id);
    if let Some(existing) = doc.get_by_element_id(&key) {
        return existing;
    }
    let parent = spec
        .apply_on
        .as_deref()
        .and_then(|target| doc.get_by_element_id(&map.layer_key(target)))
        .unwrap_or(map.layers);
    let group = doc.append(parent, "g");
    doc.set_attr(group, "id", key);
    doc.set_attr(group, "class", "layer");
    group
}
