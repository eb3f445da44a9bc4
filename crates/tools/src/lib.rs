//! Headless driving of the layer engine: render a configuration to SVG,
//! optionally replaying clicks, and describe what a configuration contains.

use std::fmt;
use std::sync::Arc;

use layers::{ConfigError, LayerEngine, LayerKind, MapConfig, PointerEvent};
use runtime::Frame;
use serde::Serialize;
use streaming::DataSource;
use tracing::{debug, info};

#[derive(Debug)]
pub enum ToolError {
    Config(ConfigError),
    Io(std::io::Error),
    /// A click names an element id that is not in the scene.
    UnknownElement(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Config(e) => write!(f, "config: {e}"),
            ToolError::Io(e) => write!(f, "io: {e}"),
            ToolError::UnknownElement(id) => write!(f, "no element with id `{id}`"),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::Config(e) => Some(e),
            ToolError::Io(e) => Some(e),
            ToolError::UnknownElement(_) => None,
        }
    }
}

impl From<ConfigError> for ToolError {
    fn from(e: ConfigError) -> Self {
        ToolError::Config(e)
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Io(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Simulated time played after the initial render and after each click.
    pub simulate_ms: f64,
    pub dt_ms: f64,
    /// Element ids clicked in order.
    pub clicks: Vec<String>,
    /// Layers hidden before the scene is written.
    pub hidden: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            simulate_ms: 1000.0,
            dt_ms: Frame::DEFAULT_DT_MS,
            clicks: Vec::new(),
            hidden: Vec::new(),
        }
    }
}

async fn play(engine: &mut LayerEngine, duration_ms: f64, dt_ms: f64) {
    let frames = Frame::count_for(duration_ms, dt_ms);
    let mut frame = Frame::new(0, dt_ms);
    for _ in 0..frames {
        engine.advance(frame.dt_ms).await;
        frame = frame.next();
    }
    debug!(frames, time_ms = frame.time.millis(), "Played frames");
}

/// Render every applied layer, replay the clicks and return the SVG.
pub async fn render(
    config: MapConfig,
    source: Arc<dyn DataSource>,
    options: &RenderOptions,
) -> Result<String, ToolError> {
    let mut engine = LayerEngine::new(config, source)?;
    engine.apply_configured().await;
    play(&mut engine, options.simulate_ms, options.dt_ms).await;

    for id in &options.clicks {
        let target = engine
            .document()
            .get_by_element_id(id)
            .ok_or_else(|| ToolError::UnknownElement(id.clone()))?;
        info!(element = %id, "Clicking");
        engine.dispatch(&PointerEvent::click(target));
        play(&mut engine, options.simulate_ms, options.dt_ms).await;
    }
    for id in &options.hidden {
        engine.toggle_layer_visibility(id);
    }
    Ok(engine.to_svg())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub id: String,
    /// Resolved renderer, `None` when the type/mode pair is unknown.
    pub kind: Option<String>,
    pub rank: i64,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_on: Option<String>,
}

pub fn summarize(config: &MapConfig) -> Vec<LayerSummary> {
    config
        .layers
        .iter()
        .map(|l| LayerSummary {
            id: l.id.clone(),
            kind: LayerKind::of(l).map(|k| format!("{k:?}")),
            rank: l.rank,
            applied: l.applied,
            apply_on: l.apply_on.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use streaming::MemorySource;

    const CONFIG: &str = r#"{
        "projection": {"kind": "orthographic", "scale": 200, "center": {"lon": 10, "lat": 20}},
        "layers": [
            {"id": "grid", "type": "graticule", "rank": 0, "applied": true,
             "display": {"lines": true, "border": true}},
            {"id": "countries", "type": "geodata", "rank": 1, "applied": true,
             "data": {"url": "countries.json", "type": "json"},
             "behavior": {"zoomBoundingBox": {}}},
            {"id": "odd", "type": "data", "mode": "sparkles", "rank": 2, "applyOn": "countries"}
        ]
    }"#;

    const COUNTRIES: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "id": "ITA", "properties": {},
         "geometry": {"type": "Polygon", "coordinates": [[
             [7, 37], [18, 37], [18, 46], [7, 46], [7, 37]]]}}
    ]}"#;

    fn source() -> Arc<dyn DataSource> {
        Arc::new(MemorySource::new().with("countries.json", COUNTRIES))
    }

    #[tokio::test]
    async fn renders_applied_layers_to_svg() {
        let config = MapConfig::from_json(CONFIG).unwrap();
        let svg = render(config, source(), &RenderOptions::default()).await.unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("id=\"map1-grid\""));
        assert!(svg.contains("id=\"ITA\""));
    }

    #[tokio::test]
    async fn clicks_rotate_towards_the_feature() {
        let config = MapConfig::from_json(CONFIG).unwrap();
        let before = render(config.clone(), source(), &RenderOptions::default())
            .await
            .unwrap();
        let options = RenderOptions {
            clicks: vec!["ITA".to_string()],
            hidden: vec!["grid".to_string()],
            ..Default::default()
        };
        let after = render(config, source(), &options).await.unwrap();
        assert!(after.contains("visibility:hidden"));
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn unknown_click_targets_fail() {
        let config = MapConfig::from_json(CONFIG).unwrap();
        let options = RenderOptions {
            clicks: vec!["atlantis".to_string()],
            ..Default::default()
        };
        let err = render(config, source(), &options).await.unwrap_err();
        assert_eq!(err.to_string(), "no element with id `atlantis`");
    }

    #[test]
    fn summaries_name_resolved_kinds() {
        let config = MapConfig::from_json(CONFIG).unwrap();
        let summary = summarize(&config);
        assert_eq!(summary[0].kind.as_deref(), Some("Graticule"));
        assert_eq!(summary[1].kind.as_deref(), Some("GeoData"));
        assert_eq!(summary[2].kind, None);
        assert_eq!(summary[2].apply_on.as_deref(), Some("countries"));
        let json = serde_json::to_value(&summary[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "grid", "kind": "Graticule", "rank": 0, "applied": true})
        );
    }
}
