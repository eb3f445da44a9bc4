use foundation::math::{Geometry, LonLat};
use serde_json::{Map, Value};

#[derive(Debug)]
pub enum GeoJsonError {
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

/// The features of a collection, a single feature as a one-element list, or
/// the items of a plain array.
pub fn features(value: &Value) -> Vec<Value> {
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => value
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Some("Feature") => vec![value.clone()],
        _ => value.as_array().cloned().unwrap_or_default(),
    }
}

/// Validate a FeatureCollection, returning its features.
pub fn parse_feature_collection(value: &Value) -> Result<Vec<Value>, GeoJsonError> {
    let obj = value
        .as_object()
        .ok_or(GeoJsonError::NotAFeatureCollection)?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(GeoJsonError::NotAFeatureCollection)?;
    if ty != "FeatureCollection" {
        return Err(GeoJsonError::NotAFeatureCollection);
    }
    let features_val = obj
        .get("features")
        .and_then(|v| v.as_array())
        .ok_or(GeoJsonError::NotAFeatureCollection)?;

    for (index, feat_val) in features_val.iter().enumerate() {
        let feat_type = feat_val.get("type").and_then(|v| v.as_str()).ok_or(
            GeoJsonError::InvalidFeature {
                index,
                reason: "feature missing type".to_string(),
            },
        )?;
        if feat_type != "Feature" {
            return Err(GeoJsonError::InvalidFeature {
                index,
                reason: format!("unexpected feature type: {feat_type}"),
            });
        }
        if let Some(g) = feat_val.get("geometry").filter(|g| !g.is_null()) {
            geometry_from_value(g)
                .map_err(|reason| GeoJsonError::InvalidFeature { index, reason })?;
        }
    }
    Ok(features_val.clone())
}

/// Geometry of a Feature, FeatureCollection or bare geometry object.
/// Null or malformed geometry yields `None`.
pub fn feature_geometry(value: &Value) -> Option<Geometry> {
    match value.get("type").and_then(Value::as_str)? {
        "Feature" => geometry_from_value(value.get("geometry")?).ok(),
        "FeatureCollection" => Some(Geometry::Collection(
            features(value).iter().filter_map(feature_geometry).collect(),
        )),
        _ => geometry_from_value(value).ok(),
    }
}

/// Build a GeoJSON Feature object.
pub fn feature(id: Option<Value>, properties: Option<Value>, geometry: Option<&Geometry>) -> Value {
    let mut fobj = Map::new();
    fobj.insert("type".to_string(), Value::String("Feature".to_string()));
    if let Some(id) = id {
        fobj.insert("id".to_string(), id);
    }
    fobj.insert(
        "properties".to_string(),
        properties
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new())),
    );
    fobj.insert(
        "geometry".to_string(),
        geometry.map(geometry_to_value).unwrap_or(Value::Null),
    );
    Value::Object(fobj)
}

pub fn geometry_to_value(geom: &Geometry) -> Value {
    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::String(geom.type_name().to_string()),
    );
    match geom {
        Geometry::Point(p) => {
            obj.insert("coordinates".to_string(), point_coords(p));
        }
        Geometry::MultiPoint(ps) | Geometry::LineString(ps) => {
            obj.insert(
                "coordinates".to_string(),
                Value::Array(ps.iter().map(point_coords).collect()),
            );
        }
        Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
            let coords = lines
                .iter()
                .map(|line| Value::Array(line.iter().map(point_coords).collect()))
                .collect();
            obj.insert("coordinates".to_string(), Value::Array(coords));
        }
        Geometry::MultiPolygon(polys) => {
            let coords = polys
                .iter()
                .map(|poly| {
                    let rings = poly
                        .iter()
                        .map(|ring| Value::Array(ring.iter().map(point_coords).collect()))
                        .collect();
                    Value::Array(rings)
                })
                .collect();
            obj.insert("coordinates".to_string(), Value::Array(coords));
        }
        Geometry::Sphere => {}
        Geometry::Collection(gs) => {
            obj.insert(
                "geometries".to_string(),
                Value::Array(gs.iter().map(geometry_to_value).collect()),
            );
        }
    }
    Value::Object(obj)
}

fn point_coords(p: &LonLat) -> Value {
    Value::Array(vec![Value::from(p[0]), Value::from(p[1])])
}

pub fn geometry_from_value(value: &Value) -> Result<Geometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    match ty {
        "Sphere" => return Ok(Geometry::Sphere),
        "GeometryCollection" => {
            let items = obj
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or("GeometryCollection missing geometries".to_string())?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(geometry_from_value(item)?);
            }
            return Ok(Geometry::Collection(out));
        }
        _ => {}
    }

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(Geometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_lines(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_lines(coords)?)),
        "MultiPolygon" => Ok(Geometry::MultiPolygon(parse_multi_polygon(coords)?)),
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

pub fn parse_point(coords: &Value) -> Result<LonLat, String> {
    let arr = coords
        .as_array()
        .ok_or("Point coordinates must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("Point coordinates must have [lon, lat]".to_string());
    }
    let lon = arr[0]
        .as_f64()
        .ok_or("Point lon must be a number".to_string())?;
    let lat = arr[1]
        .as_f64()
        .ok_or("Point lat must be a number".to_string())?;
    Ok([lon, lat])
}

fn parse_points(coords: &Value) -> Result<Vec<LonLat>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    arr.iter().map(parse_point).collect()
}

fn parse_lines(coords: &Value) -> Result<Vec<Vec<LonLat>>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of lines".to_string())?;
    arr.iter().map(parse_points).collect()
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<Vec<Vec<LonLat>>>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    polys.iter().map(parse_lines).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cities() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "PAR", "properties": {"name": "Paris"},
                 "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        })
    }

    #[test]
    fn parses_collections() {
        let fc = cities();
        assert_eq!(parse_feature_collection(&fc).unwrap().len(), 3);
        assert_eq!(features(&fc).len(), 3);
        assert_eq!(
            feature_geometry(&features(&fc)[0]),
            Some(Geometry::Point([2.35, 48.85]))
        );
        assert_eq!(feature_geometry(&features(&fc)[2]), None);
        let Some(Geometry::Collection(all)) = feature_geometry(&fc) else {
            panic!("expected collection");
        };
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn rejects_non_collections() {
        assert!(matches!(
            parse_feature_collection(&json!({"type": "Feature"})),
            Err(GeoJsonError::NotAFeatureCollection)
        ));
        let bad = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1]}}
        ]});
        assert!(matches!(
            parse_feature_collection(&bad),
            Err(GeoJsonError::InvalidFeature { index: 0, .. })
        ));
    }

    #[test]
    fn geometry_values_round_trip() {
        let poly = Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]);
        let value = geometry_to_value(&poly);
        assert_eq!(value["type"], "Polygon");
        assert_eq!(geometry_from_value(&value).unwrap(), poly);
        assert_eq!(
            geometry_from_value(&json!({"type": "Sphere"})).unwrap(),
            Geometry::Sphere
        );
    }

    #[test]
    fn builds_features() {
        let f = feature(Some(json!(250)), None, Some(&Geometry::Point([1.0, 2.0])));
        assert_eq!(
            f,
            json!({"type": "Feature", "id": 250, "properties": {},
                   "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}})
        );
    }
}
