//! Hover/click tooltips: one panel per layer under the document body.

use std::collections::HashMap;

use expressions::{ExprError, Expression, to_display_string};
use foundation::math::format_number;
use runtime::TransitionSpec;
use scene::{Datum, NodeId};
use serde_json::Value;

use crate::context::{ExtraContext, expression_context, lookup_key, with_value};
use crate::effects::{Action, Effects, Motion, SceneDocument, Tween};
use crate::spec::LayerSpec;

pub const FADE_MS: f64 = 300.0;

/// Records addressable by id, exposed to tooltip text as `value`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lookup {
    pub values: HashMap<String, Value>,
    /// Field of the hovered record holding its id.
    pub key_field: String,
}

impl Lookup {
    pub fn get(&self, record: &Value) -> Value {
        record
            .get(&self.key_field)
            .and_then(lookup_key)
            .and_then(|k| self.values.get(&k))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipBinding {
    pub layer: String,
    pub panel: NodeId,
    pub text: Expression,
    pub lookup: Option<Lookup>,
    pub extra: ExtraContext,
}

impl TooltipBinding {
    /// Tooltip text for a node's datum. Circle datums embed their record as
    /// `d`; anything else is the record itself.
    pub fn content(&self, datum: &Datum) -> Result<String, ExprError> {
        let record = match datum.value.get("d") {
            Some(embedded) if !embedded.is_null() => embedded,
            _ => &datum.value,
        };
        let mut ctx = expression_context(record, Some(datum.index), &self.extra);
        if let Some(lookup) = &self.lookup {
            ctx = with_value(ctx, lookup.get(record));
        }
        Ok(match self.text.evaluate(&ctx)? {
            Value::Null => String::new(),
            other => to_display_string(&other),
        })
    }
}

pub fn panel_id(layer_id: &str) -> String {
    format!("tooltip-{layer_id}")
}

/// Event namespace of a layer's tooltip handlers.
pub fn namespace(layer_id: &str) -> String {
    format!("tooltip-{layer_id}")
}

/// Wire tooltips for `elements` when the layer enables them.
pub fn configure(
    doc: &mut SceneDocument,
    spec: &LayerSpec,
    elements: &[NodeId],
    lookup: Option<Lookup>,
    extra: &ExtraContext,
    effects: &mut Effects,
) -> Result<(), ExprError> {
    let Some(tooltip) = spec.display.tooltip.as_ref().filter(|t| t.enabled) else {
        return Ok(());
    };
    let text = Expression::compile(tooltip.text.as_deref().unwrap_or("''"))?;

    let id = panel_id(&spec.id);
    if let Some(existing) = doc.get_by_element_id(&id) {
        doc.remove(existing);
    }
    let panel = doc.append(doc.root(), "div");
    doc.set_attr(panel, "id", id);
    doc.set_attr(panel, "class", "tooltip");
    doc.set_style(panel, "opacity", "0");

    let ns = namespace(&spec.id);
    if let Some(events) = &tooltip.events {
        let show = events.display.as_deref().filter(|e| matches!(*e, "click" | "mouseover"));
        let hide = events.hide.as_deref().filter(|e| *e == "mouseout");
        for el in elements {
            if let Some(event) = show {
                doc.on(
                    *el,
                    &format!("{event}.{ns}"),
                    Action::ShowTooltip {
                        layer: spec.id.clone(),
                    },
                );
            }
            if let Some(event) = hide {
                doc.on(
                    *el,
                    &format!("{event}.{ns}"),
                    Action::HideTooltip {
                        layer: spec.id.clone(),
                    },
                );
            }
        }
    }

    effects.tooltips.push(TooltipBinding {
        layer: spec.id.clone(),
        panel,
        text,
        lookup,
        extra: extra.clone(),
    });
    Ok(())
}

/// Fill the panel, move it next to the pointer and fade it in.
pub fn show(
    doc: &mut SceneDocument,
    binding: &TooltipBinding,
    datum: &Datum,
    page: [f64; 2],
) -> Result<(TransitionSpec, Motion), ExprError> {
    let text = binding.content(datum)?;
    doc.set_text(binding.panel, Some(text));
    doc.set_style(binding.panel, "left", format!("{}px", format_number(page[0])));
    doc.set_style(binding.panel, "top", format!("{}px", format_number(page[1] - 30.0)));
    Ok(fade(binding, 1.0))
}

pub fn hide(binding: &TooltipBinding) -> (TransitionSpec, Motion) {
    fade(binding, 0.0)
}

/// A fade interrupts any fade still running on the same panel.
fn fade(binding: &TooltipBinding, to: f64) -> (TransitionSpec, Motion) {
    let spec = TransitionSpec::new(0.0, FADE_MS).keyed(panel_id(&binding.layer));
    let motion = Motion::default().tween(Tween::Style {
        node: binding.panel,
        name: "opacity".to_string(),
        from: None,
        to,
    });
    (spec, motion)
}
