//! The layer composition engine: owns the scene, the map contexts and the
//! timeline, and drives layers through create, delete and interaction.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use foundation::math::format_number;
use foundation::time::Time;
use runtime::{Step, TimerId, Timeline, TransitionId, TransitionSpec};
use scene::NodeId;
use serde_json::Value;
use streaming::DataSource;
use tracing::{debug, info, warn};

use crate::acquisition::{Acquirer, LoadRegistry};
use crate::animation::AnimationRun;
use crate::context::ExtraContext;
use crate::effects::{Action, Cue, Effects, Hook, Motion, SceneDocument};
use crate::interaction::{DrillDown, DrillPhase, zoom_motion};
use crate::layer::{LayerKind, RenderCx};
use crate::legend::{configure_sub_map_legend, remove_legend};
use crate::map::{MapContext, MapContexts, MapProperties, PRIMARY_MAP_ID, SUB_MAP_ID};
use crate::spec::{ConfigError, LayerSpec, MapConfig};
use crate::symbology::reset_geodata_styles;
use crate::tooltip::{self, TooltipBinding};

type LocalFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a>>;

/// A pointer event delivered to a scene node.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub target: NodeId,
    /// `click`, `mouseover`, `mouseout`.
    pub kind: String,
    /// Pointer position in page coordinates.
    pub page: [f64; 2],
}

impl PointerEvent {
    pub fn click(target: NodeId) -> Self {
        Self {
            target,
            kind: "click".to_string(),
            page: [0.0, 0.0],
        }
    }
}

/// A timeline step with transition payloads left in place.
enum Pending {
    Start(TransitionId),
    Tick(TransitionId, f64),
    End(TransitionId, Time),
    Fire(TimerId),
}

pub struct LayerEngine {
    layers: Vec<LayerSpec>,
    doc: SceneDocument,
    svg: NodeId,
    maps: MapContexts,
    acquirer: Acquirer,
    loads: LoadRegistry,
    timeline: Timeline<Cue>,
    tooltips: HashMap<String, TooltipBinding>,
    animations: HashMap<String, AnimationRun>,
    drill: Option<DrillDown>,
}

impl LayerEngine {
    /// Build `body > svg > g#map1` for `config`. Nothing is rendered until a
    /// layer is created.
    pub fn new(config: MapConfig, source: Arc<dyn DataSource>) -> Result<Self, ConfigError> {
        let projection = config.primary_projection()?;
        let mut doc = SceneDocument::new();
        let svg = doc.append(doc.root(), "svg");
        doc.set_attr(svg, "width", format_number(config.width));
        doc.set_attr(svg, "height", format_number(config.height));
        let center = config.projection.center;
        let map = MapContext::attach(
            &mut doc,
            svg,
            PRIMARY_MAP_ID,
            projection,
            config.width,
            config.height,
            MapProperties {
                center: [center.lon, center.lat],
                scale: config.projection.scale,
            },
        );
        Ok(Self {
            layers: config.layers,
            doc,
            svg,
            maps: MapContexts::new(map),
            acquirer: Acquirer::new(source),
            loads: LoadRegistry::new(),
            timeline: Timeline::new(),
            tooltips: HashMap::new(),
            animations: HashMap::new(),
            drill: None,
        })
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn document(&self) -> &SceneDocument {
        &self.doc
    }

    pub fn maps(&self) -> &MapContexts {
        &self.maps
    }

    pub fn load_registry(&self) -> &LoadRegistry {
        &self.loads
    }

    pub fn drill_phase(&self) -> Option<DrillPhase> {
        self.drill.as_ref().map(|d| d.phase)
    }

    /// True when no transition or timer is left to play.
    pub fn is_idle(&self) -> bool {
        self.timeline.is_idle()
    }

    pub fn to_svg(&self) -> String {
        self.doc.to_svg(self.svg)
    }

    fn layer_mut(&mut self, id: &str) -> Option<&mut LayerSpec> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    fn current_map(&self) -> Option<MapContext> {
        self.maps.current().cloned()
    }

    /// Create every configured layer marked applied. Layers applying on
    /// another layer come with it.
    pub async fn apply_configured(&mut self) {
        let roots: Vec<String> = self
            .layers
            .iter()
            .filter(|l| l.applied)
            .filter(|l| match &l.apply_on {
                Some(target) => self.layer(target).is_none(),
                None => true,
            })
            .map(|l| l.id.clone())
            .collect();
        for id in roots {
            self.create_layer(&id).await;
        }
        self.sort_layers();
    }

    /// Render a layer into the current map, then every layer applying on it.
    pub async fn create_layer(&mut self, id: &str) {
        self.create_in(id.to_string(), ExtraContext::new(), true).await;
    }

    fn create_in(&mut self, id: String, extra: ExtraContext, mark: bool) -> LocalFuture<'_> {
        Box::pin(async move {
            let Some(spec) = self.layer(&id).cloned() else {
                debug!(layer = %id, "No layer with this id");
                return;
            };
            let Some(map_id) = self.maps.current().map(|m| m.id.clone()) else {
                return;
            };
            info!(layer = %id, kind = ?spec.layer_type, map = %map_id, "Creating layer");
            if mark && let Some(layer) = self.layer_mut(&id) {
                layer.applied = true;
            }

            match LayerKind::of(&spec) {
                Some(kind) => {
                    let key = format!("{map_id}-{id}");
                    let ticket = self.loads.begin(&key);
                    let data = match (&spec.data, kind.needs_data()) {
                        (Some(descriptor), true) => {
                            let acquirer = self.acquirer.clone();
                            match acquirer.load(descriptor, &extra).await {
                                Ok(data) => Some(data),
                                Err(e) => {
                                    warn!(layer = %id, error = %e, "Failed to load layer data");
                                    None
                                }
                            }
                        }
                        _ => Some(Value::Null),
                    };
                    if !self.loads.is_current(&ticket) {
                        debug!(layer = %id, "Dropping stale layer data");
                        return;
                    }
                    if let Some(data) = data {
                        self.render(&map_id, kind, &spec, &data, &extra);
                    }
                }
                None => warn!(layer = %id, kind = ?spec.layer_type, mode = ?spec.mode, "Unresolvable layer kind"),
            }

            let dependents: Vec<String> = self
                .layers
                .iter()
                .filter(|l| l.apply_on.as_deref() == Some(id.as_str()))
                .map(|l| l.id.clone())
                .collect();
            for dependent in dependents {
                self.create_in(dependent, extra.clone(), mark).await;
            }
        })
    }

    fn render(
        &mut self,
        map_id: &str,
        kind: LayerKind,
        spec: &LayerSpec,
        data: &Value,
        extra: &ExtraContext,
    ) {
        let Some(map) = self.maps.get(map_id).cloned() else {
            return;
        };
        let mut effects = Effects::default();
        let mut cx = RenderCx {
            doc: &mut self.doc,
            map: &map,
            spec,
            extra,
            effects: &mut effects,
        };
        match kind.renderer().render(&mut cx, data) {
            Ok(()) => {
                debug!(layer = %spec.id, ?kind, "Rendered layer");
                self.install(effects);
            }
            Err(e) => warn!(layer = %spec.id, error = %e, "Failed to render layer"),
        }
    }

    fn install(&mut self, effects: Effects) {
        for (spec, motion) in effects.motions {
            self.timeline.start(spec, Cue::Motion(motion));
        }
        for (period, ticker) in effects.tickers {
            self.timeline.set_interval(period, Cue::Ticker(ticker));
        }
        for binding in effects.tooltips {
            self.tooltips.insert(binding.layer.clone(), binding);
        }
        self.animations.extend(effects.animations);
    }

    /// Stop everything still pending for a layer key.
    fn forget(&mut self, key: &str) {
        self.loads.cancel(key);
        let dropped = self.timeline.cancel_where(|cue| cue.owner() == Some(key));
        if dropped > 0 {
            debug!(key, dropped, "Cancelled layer transitions");
        }
        self.animations.remove(key);
    }

    /// Remove a layer's content and clear its applied flag. Applied layers
    /// applying on it go with it.
    pub fn delete_layer(&mut self, id: &str) {
        let Some(spec) = self.layer(id).cloned() else {
            return;
        };
        if !spec.applied {
            debug!(layer = %id, "Layer is not applied");
            return;
        }
        let Some(map) = self.current_map() else {
            return;
        };
        info!(layer = %id, kind = ?spec.layer_type, "Deleting layer");

        let dependents: Vec<String> = self
            .layers
            .iter()
            .filter(|l| l.applied && l.apply_on.as_deref() == Some(id))
            .map(|l| l.id.clone())
            .collect();
        for dependent in dependents {
            self.delete_layer(&dependent);
        }

        let key = map.layer_key(id);
        self.forget(&key);
        if spec.is_fill_mode() {
            self.revert_fill(&map, &spec);
        } else if let Some(group) = self.doc.get_by_element_id(&key) {
            self.doc.clear_children(group);
        }
        self.remove_overlays(id);
        if let Some(layer) = self.layer_mut(id) {
            layer.applied = false;
        }
    }

    /// Give the overlaid layer its own styles back and unbind the fill
    /// layer's tooltip handlers.
    fn revert_fill(&mut self, map: &MapContext, spec: &LayerSpec) {
        let Some(target) = spec.apply_on.as_deref().and_then(|t| self.layer(t)).cloned() else {
            return;
        };
        let Some(group) = self.doc.get_by_element_id(&map.layer_key(&target.id)) else {
            return;
        };
        let paths: Vec<NodeId> = self
            .doc
            .children(group)
            .iter()
            .copied()
            .filter(|c| self.doc.tag(*c) == Some("path"))
            .collect();
        if let Err(e) = reset_geodata_styles(&mut self.doc, &target, &paths, &ExtraContext::new()) {
            warn!(layer = %target.id, error = %e, "Failed to restore layer styles");
        }
        let ns = format!(".{}", tooltip::namespace(&spec.id));
        for path in paths {
            self.doc.off(path, &ns);
        }
    }

    fn remove_overlays(&mut self, id: &str) {
        remove_legend(&mut self.doc, id);
        if let Some(panel) = self.doc.get_by_element_id(&tooltip::panel_id(id)) {
            self.doc.remove(panel);
        }
        self.tooltips.remove(id);
    }

    /// Delete then create again. Layers that are not applied stay as they
    /// are.
    pub async fn refresh_layer_applying(&mut self, id: &str) {
        if !self.layer(id).is_some_and(|l| l.applied) {
            return;
        }
        self.delete_layer(id);
        self.create_layer(id).await;
    }

    pub async fn toggle_layer_applying(&mut self, id: &str) {
        match self.layer(id).map(|l| l.applied) {
            Some(true) => self.delete_layer(id),
            Some(false) => self.create_layer(id).await,
            None => {}
        }
    }

    /// Flip the `visibility` style of a layer's group. A group without the
    /// style counts as visible.
    pub fn toggle_layer_visibility(&mut self, id: &str) {
        let Some(map) = self.maps.current() else {
            return;
        };
        let Some(group) = self.doc.get_by_element_id(&map.layer_key(id)) else {
            return;
        };
        if self.doc.style(group, "visibility") == Some("hidden") {
            info!(layer = %id, "Displayed layer with id");
            self.doc.set_style(group, "visibility", "visible");
        } else {
            info!(layer = %id, "Hidden layer with id");
            self.doc.set_style(group, "visibility", "hidden");
        }
    }

    /// Order the current map's layer groups by ascending rank. Groups of
    /// unknown layers go last, keeping their relative order.
    pub fn sort_layers(&mut self) {
        let Some(map) = self.current_map() else {
            return;
        };
        let ranks: HashMap<String, i64> = self
            .layers
            .iter()
            .map(|l| (map.layer_key(&l.id), l.rank))
            .collect();
        self.doc.sort_children_by_key(map.layers, |doc, node| {
            match doc.attr(node, "id").and_then(|id| ranks.get(id)) {
                Some(rank) => (false, *rank),
                None => (true, 0),
            }
        });
    }

    /// Run the handlers bound to the event's target.
    pub fn dispatch(&mut self, event: &PointerEvent) {
        let actions: Vec<Action> = self
            .doc
            .handlers_for(event.target, &event.kind)
            .into_iter()
            .cloned()
            .collect();
        for action in actions {
            debug!(?action, kind = %event.kind, "Dispatching");
            match action {
                Action::ShowTooltip { layer } => self.show_tooltip(&layer, event),
                Action::HideTooltip { layer } => {
                    if let Some(binding) = self.tooltips.get(&layer) {
                        let (spec, motion) = tooltip::hide(binding);
                        self.timeline.start(spec, Cue::Motion(motion));
                    }
                }
                Action::ZoomToSelection => self.zoom_to(event.target),
                Action::OpenSubMap { layer } => self.open_sub_map(&layer, event.target),
                Action::CloseSubMap => self.close_sub_map(),
            }
        }
    }

    fn show_tooltip(&mut self, layer: &str, event: &PointerEvent) {
        let Some(binding) = self.tooltips.get(layer) else {
            return;
        };
        let Some(datum) = self.doc.datum(event.target).cloned() else {
            return;
        };
        match tooltip::show(&mut self.doc, binding, &datum, event.page) {
            Ok((spec, motion)) => {
                self.timeline.start(spec, Cue::Motion(motion));
            }
            Err(e) => warn!(layer, error = %e, "Failed to fill tooltip"),
        }
    }

    fn zoom_to(&mut self, target: NodeId) {
        let Some(map) = self.maps.current() else {
            return;
        };
        let Some(geometry) = self.doc.geometry(target) else {
            return;
        };
        if let Some((spec, motion)) = zoom_motion(map, geometry) {
            self.timeline.start(spec, Cue::Motion(motion));
        }
    }

    fn open_sub_map(&mut self, layer: &str, target: NodeId) {
        if self.drill.as_ref().is_some_and(DrillDown::is_active) {
            debug!(layer, "A sub-map is already open");
            return;
        }
        let Some(spec) = self.layer(layer).cloned() else {
            return;
        };
        let Some(mut drill) =
            DrillDown::spawn(&mut self.doc, &mut self.maps, self.svg, &spec, target)
        else {
            return;
        };
        let motions = drill.animate_in(&self.doc, &self.maps);
        if motions.is_empty() {
            debug!(layer, "Sub-map has nothing to zoom onto");
            drill.finish(&mut self.doc, &mut self.maps);
            return;
        }
        info!(layer, "Opening sub-map");
        self.start_all(motions);
        self.drill = Some(drill);
    }

    fn close_sub_map(&mut self) {
        let Some(mut drill) = self.drill.take() else {
            return;
        };
        let motions = drill.animate_out(&mut self.maps);
        if !motions.is_empty() {
            info!(layer = %drill.layer, "Closing sub-map");
            for id in &drill.sub_map.layers {
                let key = format!("{SUB_MAP_ID}-{id}");
                self.forget(&key);
                if let Some(group) = self.doc.get_by_element_id(&key) {
                    self.doc.remove(group);
                }
            }
            self.start_all(motions);
        }
        self.drill = Some(drill);
    }

    fn start_all(&mut self, motions: Vec<(TransitionSpec, Motion)>) {
        for (spec, motion) in motions {
            self.timeline.start(spec, Cue::Motion(motion));
        }
    }

    /// Move the clock forward by `dt_ms` and play what happened, in order.
    /// Work started by an ending transition is scheduled from the time it
    /// ended and played within the same advance when already due.
    pub async fn advance(&mut self, dt_ms: f64) {
        let now = self.timeline.now().after(dt_ms.max(0.0));
        loop {
            self.play_until(now).await;
            if !self.timeline.has_due() {
                break;
            }
        }
    }

    async fn play_until(&mut self, now: Time) {
        let mut ended: HashMap<TransitionId, Cue> = HashMap::new();
        let pending: Vec<Pending> = self
            .timeline
            .advance(now)
            .into_iter()
            .map(|step| match step {
                Step::Start(id) => Pending::Start(id),
                Step::Tick(id, t) => Pending::Tick(id, t),
                Step::End(id, at, cue) => {
                    ended.insert(id, cue);
                    Pending::End(id, at)
                }
                Step::Fire(id) => Pending::Fire(id),
            })
            .collect();

        for step in pending {
            match step {
                Pending::Start(id) => {
                    // A transition shorter than the step has already ended.
                    let cue = match self.timeline.payload_mut(id) {
                        Some(cue) => Some(cue),
                        None => ended.get_mut(&id),
                    };
                    let Some(Cue::Motion(motion)) = cue else {
                        continue;
                    };
                    motion.capture(&self.doc, &self.maps);
                    let hooks = motion.on_start.clone();
                    self.run_hooks(hooks).await;
                }
                Pending::Tick(id, t) => {
                    if let Some(Cue::Motion(motion)) = self.timeline.payload(id) {
                        motion.apply(t, &mut self.doc, &mut self.maps);
                    }
                }
                Pending::End(id, at) => {
                    let Some(Cue::Motion(motion)) = ended.remove(&id) else {
                        continue;
                    };
                    motion.apply(1.0, &mut self.doc, &mut self.maps);
                    self.timeline.schedule_from(at);
                    self.run_hooks(motion.on_end).await;
                    self.timeline.schedule_from_now();
                }
                Pending::Fire(id) => self.fire(id),
            }
        }
    }

    fn fire(&mut self, id: TimerId) {
        let Some(Cue::Ticker(ticker)) = self.timeline.timer_payload_mut(id) else {
            return;
        };
        let target = ticker.target.clone();
        let (text, finished) = match ticker.fire() {
            Ok(tick) => (tick.text, tick.finished),
            Err(e) => {
                warn!(owner = %ticker.owner, error = %e, "Animation label failed");
                (String::new(), true)
            }
        };
        if let Some(node) = self.doc.get_by_element_id(&target) {
            self.doc.set_text(node, Some(text));
        }
        if finished {
            self.timeline.cancel_timer(id);
        }
    }

    async fn run_hooks(&mut self, hooks: Vec<Hook>) {
        for hook in hooks {
            match hook {
                Hook::SetStyle { node, name, value } => self.doc.set_style(node, &name, value),
                Hook::RecordFaded { run } => {
                    let Some(animation) = self.animations.get_mut(&run) else {
                        continue;
                    };
                    if animation.record_faded() {
                        for el in &animation.elements {
                            self.doc.set_style(*el, "fill-opacity", "1");
                        }
                    }
                    if animation.remaining == 0 {
                        self.animations.remove(&run);
                    }
                }
                Hook::SubMapShown => self.show_sublayers().await,
                Hook::SubMapClosed => {
                    if let Some(mut drill) = self.drill.take() {
                        drill.finish(&mut self.doc, &mut self.maps);
                        info!(layer = %drill.layer, "Closed sub-map");
                    }
                }
            }
        }
    }

    async fn show_sublayers(&mut self) {
        let Some(drill) = self.drill.as_mut() else {
            return;
        };
        if !drill.shown() {
            return;
        }
        let layers = drill.sub_map.layers.clone();
        let legend = drill.sub_map.legend.clone();
        let extra = drill.extra.clone();
        for id in layers {
            self.create_in(id, extra.clone(), false).await;
        }
        let (Some(legend), Some(map)) = (legend, self.maps.get(SUB_MAP_ID)) else {
            return;
        };
        if let Err(e) = configure_sub_map_legend(&mut self.doc, map, &legend, &extra) {
            warn!(error = %e, "Failed to build the sub-map legend");
        }
    }
}
