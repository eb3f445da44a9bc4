//! Fill-mode data layers recolor the paths of the geodata layer they apply
//! on instead of drawing anything of their own.

use std::collections::HashMap;

use expressions::{Expression, number_value, to_number};
use scene::NodeId;
use serde_json::Value;

use crate::context::{expression_context, lookup_key};
use crate::layer::{Layer, LayerKind, RenderCx, RenderError};
use crate::legend::configure_legend;
use crate::symbology::{FEATURE_KEY, apply_fill_styles, legend_values};
use crate::tooltip::{self, Lookup};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FillLayer;

/// Paths drawn directly by the overlaid layer.
pub fn overlaid_paths(cx: &RenderCx<'_>, group: NodeId) -> Vec<NodeId> {
    cx.doc
        .children(group)
        .iter()
        .copied()
        .filter(|c| cx.doc.tag(*c) == Some("path"))
        .collect()
}

impl Layer for FillLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Fill
    }

    fn render(&self, cx: &mut RenderCx<'_>, data: &Value) -> Result<(), RenderError> {
        let target = cx.spec.apply_on.as_deref().ok_or(RenderError::Missing("applyOn"))?;
        let fill = cx
            .spec
            .display
            .fill
            .as_ref()
            .ok_or(RenderError::Missing("display.fill"))?;
        let group = cx
            .doc
            .get_by_element_id(&cx.map.layer_key(target))
            .ok_or(RenderError::Missing("overlaid layer"))?;
        let value = Expression::compile(fill.value.as_deref().unwrap_or(""))?;
        let id_field = cx.spec.data.as_ref().map(|d| d.id_field()).unwrap_or("id");

        let records = data.as_array().map(Vec::as_slice).unwrap_or(&[]);
        let mut values = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            let Some(key) = record.get(id_field).and_then(lookup_key) else {
                continue;
            };
            let v = to_number(&value.evaluate(&expression_context(record, Some(i), cx.extra))?);
            values.insert(key, v);
        }

        let paths = overlaid_paths(cx, group);
        let hints = apply_fill_styles(cx.doc, fill, &paths, &values);
        if let Some(scale) = &hints.scale {
            configure_legend(
                cx.doc,
                group,
                cx.spec,
                scale,
                &legend_values(cx.spec),
                cx.extra,
            )?;
        }
        let lookup = Lookup {
            values: values
                .iter()
                .map(|(k, v)| (k.clone(), number_value(*v)))
                .collect(),
            key_field: FEATURE_KEY.to_string(),
        };
        tooltip::configure(cx.doc, cx.spec, &paths, Some(lookup), cx.extra, cx.effects)?;
        Ok(())
    }
}
