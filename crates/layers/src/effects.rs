//! Everything that happens after a layer is drawn: pointer actions bound to
//! nodes, and the cues the timeline plays back.

use std::fmt;

use foundation::math::{format_number, interpolate_array, lerp};
use runtime::TransitionSpec;
use scene::{Document, NodeId};

use crate::animation::{AnimationRun, Ticker};
use crate::map::MapContexts;
use crate::tooltip::TooltipBinding;

/// Declarative handler stored on scene nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ShowTooltip { layer: String },
    HideTooltip { layer: String },
    ZoomToSelection,
    OpenSubMap { layer: String },
    CloseSubMap,
}

pub type SceneDocument = Document<Action>;

/// What a map tween redraws on every frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Redraw {
    Map,
    Nodes(Vec<NodeId>),
}

/// `translate(x,y)scale(sx,sy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2 {
    pub translate: [f64; 2],
    pub scale: [f64; 2],
}

impl Transform2 {
    pub const IDENTITY: Transform2 = Transform2 {
        translate: [0.0, 0.0],
        scale: [1.0, 1.0],
    };

    /// Parse the `translate(..)scale(..)` form; anything else is identity.
    pub fn parse(text: &str) -> Self {
        let mut out = Self::IDENTITY;
        for (name, target) in [("translate(", 0), ("scale(", 1)] {
            let Some(start) = text.find(name) else {
                continue;
            };
            let rest = &text[start + name.len()..];
            let Some(end) = rest.find(')') else {
                continue;
            };
            let nums: Vec<f64> = rest[..end]
                .split([',', ' '])
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            let pair = match nums.as_slice() {
                [a, b, ..] => [*a, *b],
                [a] if target == 1 => [*a, *a],
                [a] => [*a, 0.0],
                [] => continue,
            };
            if target == 0 {
                out.translate = pair;
            } else {
                out.scale = pair;
            }
        }
        out
    }

    pub fn lerp(&self, to: &Transform2, t: f64) -> Transform2 {
        Transform2 {
            translate: [
                lerp(self.translate[0], to.translate[0], t),
                lerp(self.translate[1], to.translate[1], t),
            ],
            scale: [
                lerp(self.scale[0], to.scale[0], t),
                lerp(self.scale[1], to.scale[1], t),
            ],
        }
    }
}

impl fmt::Display for Transform2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "translate({},{})scale({},{})",
            format_number(self.translate[0]),
            format_number(self.translate[1]),
            format_number(self.scale[0]),
            format_number(self.scale[1])
        )
    }
}

/// One interpolated property. A `None` start is read from the scene when
/// the transition starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Tween {
    Rotate {
        map: String,
        from: Option<Vec<f64>>,
        to: Vec<f64>,
        redraw: Redraw,
    },
    Scale {
        map: String,
        from: Option<f64>,
        to: f64,
        redraw: Redraw,
    },
    Style {
        node: NodeId,
        name: String,
        from: Option<f64>,
        to: f64,
    },
    Transform {
        node: NodeId,
        from: Option<Transform2>,
        to: Transform2,
    },
}

impl Tween {
    fn capture(&mut self, doc: &SceneDocument, maps: &MapContexts) {
        match self {
            Tween::Rotate { map, from, .. } if from.is_none() => {
                *from = maps.get(map).map(|m| m.projection.rotate.to_vec());
            }
            Tween::Scale { map, from, .. } if from.is_none() => {
                *from = maps.get(map).map(|m| m.projection.scale);
            }
            Tween::Style {
                node, name, from, ..
            } if from.is_none() => {
                let current = doc
                    .style(*node, name)
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .unwrap_or(1.0);
                *from = Some(current);
            }
            Tween::Transform { node, from, .. } if from.is_none() => {
                *from = Some(
                    doc.attr(*node, "transform")
                        .map(Transform2::parse)
                        .unwrap_or(Transform2::IDENTITY),
                );
            }
            _ => {}
        }
    }

    fn apply(&self, t: f64, doc: &mut SceneDocument, maps: &mut MapContexts) {
        match self {
            Tween::Rotate {
                map,
                from,
                to,
                redraw,
            } => {
                let Some(ctx) = maps.get_mut(map) else {
                    return;
                };
                let from = from.clone().unwrap_or_else(|| ctx.projection.rotate.to_vec());
                ctx.projection.set_rotate(&interpolate_array(&from, to, t));
                redraw_map(doc, maps, map, redraw);
            }
            Tween::Scale {
                map,
                from,
                to,
                redraw,
            } => {
                let Some(ctx) = maps.get_mut(map) else {
                    return;
                };
                let from = from.unwrap_or(ctx.projection.scale);
                ctx.projection.scale = lerp(from, *to, t);
                redraw_map(doc, maps, map, redraw);
            }
            Tween::Style {
                node,
                name,
                from,
                to,
            } => {
                let value = lerp(from.unwrap_or(1.0), *to, t);
                doc.set_style(*node, name, format_number(value));
            }
            Tween::Transform { node, from, to } => {
                let value = from.unwrap_or(Transform2::IDENTITY).lerp(to, t);
                doc.set_attr(*node, "transform", value.to_string());
            }
        }
    }
}

fn redraw_map(doc: &mut SceneDocument, maps: &MapContexts, map: &str, redraw: &Redraw) {
    let Some(ctx) = maps.get(map) else {
        return;
    };
    match redraw {
        Redraw::Map => ctx.redraw(doc),
        Redraw::Nodes(nodes) => ctx.redraw_nodes(doc, nodes),
    }
}

/// Work run when a transition starts or ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Hook {
    SetStyle {
        node: NodeId,
        name: String,
        value: String,
    },
    /// One animated record finished fading out.
    RecordFaded { run: String },
    SubMapShown,
    SubMapClosed,
}

/// A transition's payload: tweens applied on every tick, hooks on its edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Motion {
    /// Layer key whose deletion cancels this motion.
    pub owner: Option<String>,
    pub tweens: Vec<Tween>,
    pub on_start: Vec<Hook>,
    pub on_end: Vec<Hook>,
}

impl Motion {
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Default::default()
        }
    }

    pub fn tween(mut self, tween: Tween) -> Self {
        self.tweens.push(tween);
        self
    }

    pub fn on_start(mut self, hook: Hook) -> Self {
        self.on_start.push(hook);
        self
    }

    pub fn on_end(mut self, hook: Hook) -> Self {
        self.on_end.push(hook);
        self
    }

    /// Fill in tween start values from the current scene.
    pub fn capture(&mut self, doc: &SceneDocument, maps: &MapContexts) {
        for tween in &mut self.tweens {
            tween.capture(doc, maps);
        }
    }

    pub fn apply(&self, t: f64, doc: &mut SceneDocument, maps: &mut MapContexts) {
        for tween in &self.tweens {
            tween.apply(t, doc, maps);
        }
    }
}

/// Timeline payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Cue {
    Motion(Motion),
    Ticker(Ticker),
}

impl Cue {
    pub fn owner(&self) -> Option<&str> {
        match self {
            Cue::Motion(m) => m.owner.as_deref(),
            Cue::Ticker(t) => Some(&t.owner),
        }
    }
}

/// Side effects collected while a layer renders, installed by the engine
/// once rendering succeeds.
#[derive(Debug, Default)]
pub struct Effects {
    pub motions: Vec<(TransitionSpec, Motion)>,
    pub tickers: Vec<(f64, Ticker)>,
    pub tooltips: Vec<TooltipBinding>,
    pub animations: Vec<(String, AnimationRun)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{MapContext, MapProperties};
    use foundation::math::{Geometry, Projection};
    use pretty_assertions::assert_eq;

    #[test]
    fn transforms_parse_and_print() {
        let t = Transform2::parse("translate(750,40)scale(0.2083333283662796,0.2083333283662796)");
        assert_eq!(t.translate, [750.0, 40.0]);
        assert_eq!(
            t.to_string(),
            "translate(750,40)scale(0.2083333283662796,0.2083333283662796)"
        );
        assert_eq!(Transform2::parse(""), Transform2::IDENTITY);
        assert_eq!(Transform2::parse("scale(2)").scale, [2.0, 2.0]);
        assert_eq!(
            Transform2::IDENTITY.to_string(),
            "translate(0,0)scale(1,1)"
        );
    }

    #[test]
    fn motions_capture_start_values_and_redraw() {
        let mut doc = SceneDocument::new();
        let svg = doc.append(doc.root(), "svg");
        let map = MapContext::attach(
            &mut doc,
            svg,
            "map1",
            Projection::orthographic().with_scale(100.0).with_translate([0.0, 0.0]),
            960.0,
            500.0,
            MapProperties {
                center: [0.0, 0.0],
                scale: 100.0,
            },
        );
        let path = doc.append(map.layers, "path");
        map.draw(&mut doc, path, Geometry::Point([0.0, 0.0]));
        let mut maps = MapContexts::new(map);

        let mut motion = Motion::default()
            .tween(Tween::Rotate {
                map: "map1".to_string(),
                from: None,
                to: vec![-90.0, 0.0],
                redraw: Redraw::Map,
            })
            .tween(Tween::Scale {
                map: "map1".to_string(),
                from: None,
                to: 200.0,
                redraw: Redraw::Nodes(vec![path]),
            })
            .tween(Tween::Style {
                node: path,
                name: "opacity".to_string(),
                from: None,
                to: 0.0,
            });
        motion.capture(&doc, &maps);
        assert_eq!(
            motion.tweens[0],
            Tween::Rotate {
                map: "map1".to_string(),
                from: Some(vec![0.0, 0.0, 0.0]),
                to: vec![-90.0, 0.0],
                redraw: Redraw::Map,
            }
        );

        motion.apply(0.5, &mut doc, &mut maps);
        let projection = &maps.get("map1").unwrap().projection;
        assert_eq!(projection.rotate, [-45.0, 0.0, 0.0]);
        assert_eq!(projection.scale, 150.0);
        assert_eq!(doc.style(path, "opacity"), Some("0.5"));

        motion.apply(1.0, &mut doc, &mut maps);
        // The point rotated onto the clip edge of an unclipped orthographic.
        assert!(doc.attr(path, "d").unwrap().starts_with("M-200,0"));
        assert_eq!(doc.style(path, "opacity"), Some("0"));
    }
}
