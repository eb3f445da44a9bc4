//! Map contexts: the primary map and the drill-down sub-map.

use foundation::math::{Geometry, LonLat, Projection, bounds, path_data};
use scene::{Document, NodeId};

pub const PRIMARY_MAP_ID: &str = "map1";
pub const SUB_MAP_ID: &str = "map2";

/// Where the primary projection returns to when a drill-down closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapProperties {
    pub center: LonLat,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapContext {
    pub id: String,
    /// `g#<id>`, the node transformed when the map is shrunk.
    pub root: NodeId,
    /// `g#<id>-layers`, parent of layer groups.
    pub layers: NodeId,
    pub projection: Projection,
    pub width: f64,
    pub height: f64,
    pub properties: MapProperties,
}

impl MapContext {
    /// Build `g#<id>` and `g#<id>-layers` under `parent`.
    pub fn attach<H>(
        doc: &mut Document<H>,
        parent: NodeId,
        id: &str,
        projection: Projection,
        width: f64,
        height: f64,
        properties: MapProperties,
    ) -> Self {
        let root = doc.append(parent, "g");
        doc.set_attr(root, "id", id);
        let layers = doc.append(root, "g");
        doc.set_attr(layers, "id", format!("{id}-layers"));
        Self {
            id: id.to_string(),
            root,
            layers,
            projection,
            width,
            height,
            properties,
        }
    }

    /// Element id of a layer's group in this map.
    pub fn layer_key(&self, layer_id: &str) -> String {
        format!("{}-{}", self.id, layer_id)
    }

    /// Attach `geometry` to `node` and draw it.
    pub fn draw<H>(&self, doc: &mut Document<H>, node: NodeId, geometry: Geometry) {
        let d = path_data(&self.projection, &geometry);
        doc.set_geometry(node, geometry);
        doc.set_attr(node, "d", d);
    }

    /// Redraw every geometry-carrying node of this map.
    pub fn redraw<H>(&self, doc: &mut Document<H>) {
        let nodes = doc.descendants(self.root);
        self.redraw_nodes(doc, &nodes);
    }

    pub fn redraw_nodes<H>(&self, doc: &mut Document<H>, nodes: &[NodeId]) {
        for node in nodes {
            let d = doc.geometry(*node).map(|g| path_data(&self.projection, g));
            if let Some(d) = d {
                doc.set_attr(*node, "d", d);
            }
        }
    }
}

/// All live maps plus which one is current. Renderers always target the
/// current map.
#[derive(Debug, Clone)]
pub struct MapContexts {
    maps: Vec<MapContext>,
    current: String,
}

impl MapContexts {
    pub fn new(primary: MapContext) -> Self {
        let current = primary.id.clone();
        Self {
            maps: vec![primary],
            current,
        }
    }

    pub fn current_id(&self) -> &str {
        &self.current
    }

    pub fn current(&self) -> Option<&MapContext> {
        self.get(&self.current)
    }

    pub fn get(&self, id: &str) -> Option<&MapContext> {
        self.maps.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MapContext> {
        self.maps.iter_mut().find(|m| m.id == id)
    }

    /// Add or replace a map. The current map is unchanged.
    pub fn insert(&mut self, map: MapContext) {
        self.maps.retain(|m| m.id != map.id);
        self.maps.push(map);
    }

    /// Removing the current map makes the primary map current again.
    pub fn remove(&mut self, id: &str) -> Option<MapContext> {
        let pos = self.maps.iter().position(|m| m.id == id)?;
        if self.current == id {
            self.current = PRIMARY_MAP_ID.to_string();
        }
        Some(self.maps.remove(pos))
    }

    /// Switch the current map. Unknown ids are refused.
    pub fn set_current(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.current = id.to_string();
        true
    }
}

/// Geographic bounds of a selection plus the scale and translate that fit it
/// into a `width` x `height` viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionBounds {
    pub bounds: [LonLat; 2],
    pub scale: f64,
    pub translate: [f64; 2],
}

pub fn selection_bounds(geometry: &Geometry, width: f64, height: f64) -> SelectionBounds {
    let b = bounds(geometry);
    let (dx, dy) = (b.width(), b.height());
    let [x, y] = b.center();
    let scale = 0.9 / (dx / width).max(dy / height);
    SelectionBounds {
        bounds: [b.min, b.max],
        scale,
        translate: [width / 2.0 - scale * x, height / 2.0 - scale * y],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn primary(doc: &mut Document<()>) -> MapContext {
        let svg = doc.append(doc.root(), "svg");
        MapContext::attach(
            doc,
            svg,
            PRIMARY_MAP_ID,
            Projection::equirectangular().with_scale(1.0).with_translate([0.0, 0.0]),
            960.0,
            500.0,
            MapProperties {
                center: [0.0, 0.0],
                scale: 1.0,
            },
        )
    }

    #[test]
    fn attaches_keyed_groups_and_redraws_paths() {
        let mut doc = Document::new();
        let mut map = primary(&mut doc);
        assert_eq!(doc.get_by_element_id("map1"), Some(map.root));
        assert_eq!(doc.get_by_element_id("map1-layers"), Some(map.layers));
        assert_eq!(map.layer_key("countries"), "map1-countries");

        let path = doc.append(map.layers, "path");
        map.draw(&mut doc, path, Geometry::Point([0.0, 0.0]));
        let before = doc.attr(path, "d").map(str::to_string);

        map.projection.translate = [10.0, 0.0];
        map.redraw(&mut doc);
        assert!(doc.attr(path, "d").unwrap().starts_with("M10,0"));
        assert_ne!(doc.attr(path, "d").map(str::to_string), before);
    }

    #[test]
    fn switching_requires_a_known_map() {
        let mut doc = Document::new();
        let first = primary(&mut doc);
        let mut maps = MapContexts::new(first.clone());
        assert!(!maps.set_current(SUB_MAP_ID));

        let mut second = first;
        second.id = SUB_MAP_ID.to_string();
        maps.insert(second);
        assert!(maps.set_current(SUB_MAP_ID));
        assert_eq!(maps.current().unwrap().id, SUB_MAP_ID);

        maps.remove(SUB_MAP_ID);
        assert!(maps.current().is_none());
        assert!(maps.set_current(PRIMARY_MAP_ID));
    }

    #[test]
    fn selection_bounds_fit_the_viewport() {
        let square = Geometry::Polygon(vec![vec![
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 5.0],
            [0.0, 5.0],
            [0.0, 0.0],
        ]]);
        let b = selection_bounds(&square, 100.0, 100.0);
        assert_eq!(b.bounds, [[0.0, 0.0], [10.0, 5.0]]);
        assert_eq!(b.scale, 9.0);
        assert_eq!(b.translate, [5.0, 27.5]);
    }
}
