//! Declarative map and layer configuration, deserialized from JSON.
//!
//! Every nested block is optional; an absent block switches the matching
//! aspect off. Unknown keys are ignored.

use std::fmt;

use foundation::math::{Projection, ProjectionKind, format_number};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    UnknownProjection(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "invalid map configuration: {e}"),
            ConfigError::UnknownProjection(name) => write!(f, "unknown projection `{name}`"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(e) => Some(e),
            ConfigError::UnknownProjection(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// A style value written either as text (`"0.5px"`) or as a bare number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CssValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for CssValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CssValue::Text(s) => f.write_str(s),
            CssValue::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

fn default_width() -> f64 {
    960.0
}

fn default_height() -> f64 {
    500.0
}

impl MapConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The primary projection: rotated to the configured center, translated
    /// to the middle of the map unless a translate is given.
    pub fn primary_projection(&self) -> Result<Projection, ConfigError> {
        let p = &self.projection;
        let kind = ProjectionKind::from_name(&p.kind)
            .ok_or_else(|| ConfigError::UnknownProjection(p.kind.clone()))?;
        let translate = p
            .translate
            .unwrap_or([self.width / 2.0, self.height / 2.0]);
        let mut projection = Projection::new(kind)
            .with_scale(p.scale)
            .with_translate(translate)
            .with_rotate(&[p.center.lon, p.center.lat]);
        let clip = match (p.clip_angle, kind) {
            (Some(angle), _) => Some(angle),
            (None, ProjectionKind::Orthographic) => Some(90.0),
            (None, _) => None,
        };
        if let Some(angle) = clip {
            projection = projection.with_clip_angle(angle);
        }
        Ok(projection)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionConfig {
    #[serde(default = "default_projection_kind")]
    pub kind: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub center: Center,
    pub translate: Option<[f64; 2]>,
    pub clip_angle: Option<f64>,
}

fn default_projection_kind() -> String {
    "orthographic".to_string()
}

fn default_scale() -> f64 {
    250.0
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            kind: default_projection_kind(),
            scale: default_scale(),
            center: Center::default(),
            translate: None,
            clip_angle: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Center {
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub lat: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSpec {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub layer_type: Option<String>,
    pub mode: Option<String>,
    #[serde(default)]
    pub rank: i64,
    pub apply_on: Option<String>,
    pub data: Option<DataDescriptor>,
    #[serde(default)]
    pub display: Display,
    #[serde(default)]
    pub styles: Styles,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default)]
    pub applied: bool,
}

impl LayerSpec {
    pub fn is_fill_mode(&self) -> bool {
        self.layer_type.as_deref() == Some("data") && self.mode.as_deref() == Some("fill")
    }
}

/// Where a layer's records come from: preloaded content, an inline
/// expression or value, or a remote location with a format.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDescriptor {
    #[serde(default)]
    pub loaded: bool,
    pub content: Option<Value>,
    pub inline: Option<Value>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub format: Option<String>,
    #[serde(rename = "where")]
    pub filter: Option<String>,
    pub order: Option<Order>,
    pub id: Option<String>,
    pub root_object: Option<String>,
    #[serde(default)]
    pub mesh: bool,
}

impl DataDescriptor {
    pub fn id_field(&self) -> &str {
        self.id.as_deref().unwrap_or("id")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    pub field: Option<String>,
    #[serde(default = "default_true")]
    pub ascending: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    // graticule aspects
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub border: bool,
    #[serde(default)]
    pub lines: bool,

    pub fill: Option<FillDisplay>,
    pub shape: Option<ShapeDisplay>,
    pub tooltip: Option<TooltipDisplay>,
    pub legend: Option<LegendDisplay>,
    pub sub_map: Option<SubMapDisplay>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FillDisplay {
    pub value: Option<String>,
    pub categorical: Option<Categorical>,
    pub threshold: Option<ScaleConfig>,
    pub choropleth: Option<ScaleConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Categorical {
    pub name: Option<String>,
    pub value: Option<String>,
}

/// Breakpoints and the colors between them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScaleConfig {
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default)]
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDisplay {
    #[serde(rename = "type")]
    pub shape_type: Option<String>,
    pub origin: Option<String>,
    pub radius: Option<String>,
    pub value: Option<String>,
    pub point_value: Option<String>,
    pub color: Option<CssValue>,
    pub opacity: Option<CssValue>,
    pub threshold: Option<ScaleConfig>,
    pub choropleth: Option<ScaleConfig>,
    pub label: Option<ShapeLabel>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShapeLabel {
    pub text: Option<String>,
    pub position: Option<LabelOffset>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LabelOffset {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Events {
    pub display: Option<String>,
    pub hide: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TooltipDisplay {
    #[serde(default)]
    pub enabled: bool,
    pub text: Option<String>,
    pub events: Option<Events>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegendDisplay {
    #[serde(default)]
    pub enabled: bool,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubMapDisplay {
    #[serde(default)]
    pub layers: Vec<String>,
    pub legend: Option<SubMapLegend>,
    pub events: Option<Events>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubMapLegend {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Styles {
    pub background: Option<Paint>,
    pub border: Option<Paint>,
    pub lines: Option<Paint>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paint {
    pub fill: Option<CssValue>,
    pub stroke: Option<CssValue>,
    pub stroke_width: Option<CssValue>,
    pub stroke_opacity: Option<CssValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behavior {
    /// Presence switches click-to-zoom on; the content is not inspected.
    pub zoom_bounding_box: Option<Value>,
    pub animation: Option<AnimationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationConfig {
    pub value: Option<String>,
    pub start_value: Option<f64>,
    pub interval: Option<f64>,
    pub label: Option<String>,
    #[serde(default)]
    pub show_all_at_end: bool,
}
