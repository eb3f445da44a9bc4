//! TopoJSON decoding: features from topology objects and shared-border meshes.

use std::collections::BTreeMap;

use foundation::math::{Geometry, LonLat};
use serde_json::Value;

use crate::FormatError;
use crate::geojson::feature as make_feature;

/// Decoded arcs of a topology plus its point transform.
pub struct Topology<'a> {
    value: &'a Value,
    arcs: Vec<Vec<LonLat>>,
    transform: Option<([f64; 2], [f64; 2])>,
}

impl<'a> Topology<'a> {
    pub fn parse(value: &'a Value) -> Result<Self, FormatError> {
        if value.get("type").and_then(Value::as_str) != Some("Topology") {
            return Err(FormatError::Invalid("expected a Topology".to_string()));
        }
        let transform = match value.get("transform") {
            Some(t) => Some((pair(t.get("scale"))?, pair(t.get("translate"))?)),
            None => None,
        };

        let raw_arcs = value
            .get("arcs")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut arcs = Vec::with_capacity(raw_arcs.len());
        for (i, arc) in raw_arcs.iter().enumerate() {
            let positions = arc
                .as_array()
                .ok_or_else(|| FormatError::Invalid(format!("arc {i} is not an array")))?;
            let mut out = Vec::with_capacity(positions.len());
            let (mut x, mut y) = (0.0, 0.0);
            for p in positions {
                let [px, py] = pair(Some(p))?;
                let point = match transform {
                    // Quantized arcs are delta-encoded.
                    Some(([sx, sy], [tx, ty])) => {
                        x += px;
                        y += py;
                        [x * sx + tx, y * sy + ty]
                    }
                    None => [px, py],
                };
                out.push(point);
            }
            arcs.push(out);
        }

        Ok(Self {
            value,
            arcs,
            transform,
        })
    }

    pub fn object(&self, name: &str) -> Result<&'a Value, FormatError> {
        self.value
            .get("objects")
            .and_then(|o| o.get(name))
            .ok_or_else(|| FormatError::Invalid(format!("topology has no object `{name}`")))
    }

    fn point(&self, p: &Value) -> Result<LonLat, FormatError> {
        let [x, y] = pair(Some(p))?;
        Ok(match self.transform {
            Some(([sx, sy], [tx, ty])) => [x * sx + tx, y * sy + ty],
            None => [x, y],
        })
    }

    fn arc_points(&self, index: i64) -> Result<Vec<LonLat>, FormatError> {
        // Negative indices are one's complement references to reversed arcs.
        let (i, reversed) = if index < 0 {
            ((!index) as usize, true)
        } else {
            (index as usize, false)
        };
        let mut points = self
            .arcs
            .get(i)
            .cloned()
            .ok_or_else(|| FormatError::Invalid(format!("arc index {index} out of range")))?;
        if reversed {
            points.reverse();
        }
        Ok(points)
    }

    /// Stitch a list of arc references into one line.
    fn line(&self, refs: &Value) -> Result<Vec<LonLat>, FormatError> {
        let refs = arc_refs(refs)?;
        let mut out: Vec<LonLat> = Vec::new();
        for r in refs {
            let points = self.arc_points(r)?;
            let skip = usize::from(!out.is_empty());
            out.extend(points.into_iter().skip(skip));
        }
        Ok(out)
    }

    fn ring(&self, refs: &Value) -> Result<Vec<LonLat>, FormatError> {
        let mut ring = self.line(refs)?;
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied())
            && first != last
        {
            ring.push(first);
        }
        Ok(ring)
    }

    fn lines(&self, refs: &Value, ring: bool) -> Result<Vec<Vec<LonLat>>, FormatError> {
        as_array(refs)?
            .iter()
            .map(|r| if ring { self.ring(r) } else { self.line(r) })
            .collect()
    }

    /// Geometry of a topology geometry object; `None` for null geometry.
    pub fn geometry(&self, object: &Value) -> Result<Option<Geometry>, FormatError> {
        let ty = object.get("type").and_then(Value::as_str);
        let arcs = object.get("arcs").unwrap_or(&Value::Null);
        let coords = object.get("coordinates").unwrap_or(&Value::Null);
        let geometry = match ty {
            None | Some("null") => return Ok(None),
            Some("Point") => Geometry::Point(self.point(coords)?),
            Some("MultiPoint") => Geometry::MultiPoint(
                as_array(coords)?
                    .iter()
                    .map(|p| self.point(p))
                    .collect::<Result<_, _>>()?,
            ),
            Some("LineString") => Geometry::LineString(self.line(arcs)?),
            Some("MultiLineString") => Geometry::MultiLineString(self.lines(arcs, false)?),
            Some("Polygon") => Geometry::Polygon(self.lines(arcs, true)?),
            Some("MultiPolygon") => Geometry::MultiPolygon(
                as_array(arcs)?
                    .iter()
                    .map(|p| self.lines(p, true))
                    .collect::<Result<_, _>>()?,
            ),
            Some("GeometryCollection") => {
                let mut out = Vec::new();
                for g in geometries(object)? {
                    if let Some(g) = self.geometry(g)? {
                        out.push(g);
                    }
                }
                Geometry::Collection(out)
            }
            Some(other) => {
                return Err(FormatError::Invalid(format!(
                    "unsupported topology geometry `{other}`"
                )));
            }
        };
        Ok(Some(geometry))
    }

    /// GeoJSON for `object`: a FeatureCollection for geometry collections,
    /// otherwise a single Feature.
    pub fn feature(&self, object: &Value) -> Result<Value, FormatError> {
        if object.get("type").and_then(Value::as_str) == Some("GeometryCollection") {
            let mut features = Vec::new();
            for g in geometries(object)? {
                features.push(self.single_feature(g)?);
            }
            return Ok(serde_json::json!({
                "type": "FeatureCollection",
                "features": features,
            }));
        }
        self.single_feature(object)
    }

    fn single_feature(&self, object: &Value) -> Result<Value, FormatError> {
        let geometry = self.geometry(object)?;
        Ok(make_feature(
            object.get("id").cloned(),
            object.get("properties").cloned(),
            geometry.as_ref(),
        ))
    }

    /// Arcs of `object` whose bordering geometries pass `filter`, merged into
    /// a MultiLineString.
    ///
    /// Each arc is offered once, with the first and last geometries that
    /// reference it; an arc used by a single geometry passes it as both sides.
    pub fn mesh(
        &self,
        object: &Value,
        filter: impl Fn(&Value, &Value) -> bool,
    ) -> Result<Geometry, FormatError> {
        // arc index -> (first geometry, last geometry)
        let mut owners: BTreeMap<usize, (&Value, &Value)> = BTreeMap::new();
        collect_arc_owners(object, object, &mut owners)?;

        let mut lines = Vec::new();
        for (arc, (a, b)) in owners {
            if filter(a, b) {
                lines.push(self.arc_points(arc as i64)?);
            }
        }
        Ok(Geometry::MultiLineString(lines))
    }
}

fn collect_arc_owners<'v>(
    object: &'v Value,
    owner: &'v Value,
    owners: &mut BTreeMap<usize, (&'v Value, &'v Value)>,
) -> Result<(), FormatError> {
    match object.get("type").and_then(Value::as_str) {
        Some("GeometryCollection") => {
            for g in geometries(object)? {
                collect_arc_owners(g, g, owners)?;
            }
        }
        Some("LineString" | "MultiLineString" | "Polygon" | "MultiPolygon") => {
            let mut refs = Vec::new();
            flatten_refs(object.get("arcs").unwrap_or(&Value::Null), &mut refs);
            for r in refs {
                let i = if r < 0 { (!r) as usize } else { r as usize };
                owners
                    .entry(i)
                    .and_modify(|e| e.1 = owner)
                    .or_insert((owner, owner));
            }
        }
        _ => {}
    }
    Ok(())
}

fn flatten_refs(v: &Value, out: &mut Vec<i64>) {
    match v {
        Value::Array(items) => items.iter().for_each(|i| flatten_refs(i, out)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push(i);
            }
        }
        _ => {}
    }
}

fn geometries(object: &Value) -> Result<&[Value], FormatError> {
    object
        .get("geometries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| FormatError::Invalid("GeometryCollection missing geometries".to_string()))
}

fn as_array(v: &Value) -> Result<&[Value], FormatError> {
    v.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| FormatError::Invalid("expected an array".to_string()))
}

fn arc_refs(v: &Value) -> Result<Vec<i64>, FormatError> {
    as_array(v)?
        .iter()
        .map(|r| {
            r.as_i64()
                .ok_or_else(|| FormatError::Invalid("arc reference must be an integer".to_string()))
        })
        .collect()
}

fn pair(v: Option<&Value>) -> Result<[f64; 2], FormatError> {
    let arr = v
        .and_then(Value::as_array)
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| FormatError::Invalid("expected a [x, y] pair".to_string()))?;
    match (arr[0].as_f64(), arr[1].as_f64()) {
        (Some(x), Some(y)) => Ok([x, y]),
        _ => Err(FormatError::Invalid("pair members must be numbers".to_string())),
    }
}
