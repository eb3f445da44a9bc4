//! Spherical geometry in `[lon, lat]` degrees.

use crate::bounds::Aabb2;

use super::vec::Vec3;

/// `[longitude, latitude]` in degrees.
pub type LonLat = [f64; 2];

/// Geometry model shared by the format decoders and the path generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(LonLat),
    MultiPoint(Vec<LonLat>),
    LineString(Vec<LonLat>),
    MultiLineString(Vec<Vec<LonLat>>),
    Polygon(Vec<Vec<LonLat>>),
    MultiPolygon(Vec<Vec<Vec<LonLat>>>),
    /// The whole globe outline.
    Sphere,
    Collection(Vec<Geometry>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::Sphere => "Sphere",
            Geometry::Collection(_) => "GeometryCollection",
        }
    }

    /// Visit every vertex. Closing vertices of polygon rings are skipped.
    pub fn for_each_vertex(&self, f: &mut impl FnMut(LonLat)) {
        fn ring(r: &[LonLat], f: &mut impl FnMut(LonLat)) {
            let n = if r.len() > 1 && r.first() == r.last() {
                r.len() - 1
            } else {
                r.len()
            };
            r[..n].iter().for_each(|p| f(*p));
        }
        match self {
            Geometry::Point(p) => f(*p),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.iter().for_each(|p| f(*p)),
            Geometry::MultiLineString(lines) => lines.iter().flatten().for_each(|p| f(*p)),
            Geometry::Polygon(rings) => rings.iter().for_each(|r| ring(r, f)),
            Geometry::MultiPolygon(polys) => polys.iter().flatten().for_each(|r| ring(r, f)),
            Geometry::Sphere => {}
            Geometry::Collection(gs) => gs.iter().for_each(|g| g.for_each_vertex(f)),
        }
    }
}

/// Geographic bounding box. Antimeridian crossings are not unwrapped.
pub fn bounds(geometry: &Geometry) -> Aabb2 {
    if contains_sphere(geometry) {
        return Aabb2::new([-180.0, -90.0], [180.0, 90.0]);
    }
    let mut b = Aabb2::empty();
    geometry.for_each_vertex(&mut |p| b.extend(p));
    b
}

fn contains_sphere(geometry: &Geometry) -> bool {
    match geometry {
        Geometry::Sphere => true,
        Geometry::Collection(gs) => gs.iter().any(contains_sphere),
        _ => false,
    }
}

/// Spherical centroid as the normalized mean of vertex unit vectors.
///
/// Returns `None` for empty geometry, the sphere, or antipodal sets that
/// cancel out.
pub fn centroid(geometry: &Geometry) -> Option<LonLat> {
    let mut sum = Vec3::ZERO;
    let mut count = 0usize;
    geometry.for_each_vertex(&mut |p| {
        if p[0].is_finite() && p[1].is_finite() {
            sum = sum + Vec3::from_lonlat(p);
            count += 1;
        }
    });
    if count == 0 {
        return None;
    }
    sum.to_lonlat()
}

/// Closed ring of points at `angle` degrees great-circle distance around
/// `origin`, one vertex every `precision` degrees of bearing.
pub fn circle(origin: LonLat, angle: f64, precision: f64) -> Geometry {
    let steps = (360.0 / precision.max(0.1)).ceil().max(3.0) as usize;
    let (lon1, lat1) = (origin[0].to_radians(), origin[1].to_radians());
    let delta = angle.to_radians();
    let (sin_lat1, cos_lat1) = lat1.sin_cos();
    let (sin_d, cos_d) = delta.sin_cos();

    let mut ring = Vec::with_capacity(steps + 1);
    for k in 0..steps {
        // Clockwise so the ring encloses the small cap.
        let theta = -(k as f64) * std::f64::consts::TAU / steps as f64;
        let lat2 = (sin_lat1 * cos_d + cos_lat1 * sin_d * theta.cos())
            .clamp(-1.0, 1.0)
            .asin();
        let lon2 =
            lon1 + (theta.sin() * sin_d * cos_lat1).atan2(cos_d - sin_lat1 * lat2.sin());
        ring.push([wrap_lon(lon2.to_degrees()), lat2.to_degrees()]);
    }
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    Geometry::Polygon(vec![ring])
}

pub fn wrap_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Standard 10° graticule.
///
/// Meridians every 10° span ±80° latitude, except multiples of 90° which
/// reach the poles. Parallels every 10° from -80° to 80°.
pub fn graticule() -> Geometry {
    const STEP: f64 = 10.0;
    const SAMPLE: f64 = 2.5;
    let mut lines = Vec::new();

    let mut lon: f64 = -180.0;
    while lon < 180.0 {
        let extent = if (lon % 90.0).abs() < 1e-9 { 90.0 } else { 80.0 };
        let mut line = Vec::new();
        let mut lat = -extent;
        while lat <= extent + 1e-9 {
            line.push([lon, lat]);
            lat += SAMPLE;
        }
        lines.push(line);
        lon += STEP;
    }

    let mut lat = -80.0;
    while lat <= 80.0 + 1e-9 {
        let mut line = Vec::new();
        let mut lon = -180.0;
        while lon <= 180.0 + 1e-9 {
            line.push([lon, lat]);
            lon += SAMPLE;
        }
        lines.push(line);
        lat += STEP;
    }

    Geometry::MultiLineString(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::Polygon(vec![vec![
            [-10.0, -10.0],
            [10.0, -10.0],
            [10.0, 10.0],
            [-10.0, 10.0],
            [-10.0, -10.0],
        ]])
    }

    #[test]
    fn bounds_of_polygon_and_sphere() {
        let b = bounds(&square());
        assert_eq!(b.min, [-10.0, -10.0]);
        assert_eq!(b.max, [10.0, 10.0]);
        assert_eq!(bounds(&Geometry::Sphere).width(), 360.0);
    }

    #[test]
    fn centroid_ignores_closing_vertex() {
        let c = centroid(&square()).unwrap();
        assert!(c[0].abs() < 1e-9);
        assert!(c[1].abs() < 1e-9);

        let c = centroid(&Geometry::Point([20.0, 40.0])).unwrap();
        assert!((c[0] - 20.0).abs() < 1e-9 && (c[1] - 40.0).abs() < 1e-9);
        assert_eq!(centroid(&Geometry::Sphere), None);
    }

    #[test]
    fn circle_is_closed_and_equidistant() {
        let Geometry::Polygon(rings) = circle([2.35, 48.85], 5.0, 6.0) else {
            panic!("circle must be a polygon");
        };
        let ring = &rings[0];
        assert_eq!(ring.len(), 61);
        assert_eq!(ring.first(), ring.last());
        let o = Vec3::from_lonlat([2.35, 48.85]);
        for p in ring {
            let d = o.dot(Vec3::from_lonlat(*p)).clamp(-1.0, 1.0).acos().to_degrees();
            assert!((d - 5.0).abs() < 1e-6, "distance {d}");
        }
    }

    #[test]
    fn graticule_line_counts() {
        let Geometry::MultiLineString(lines) = graticule() else {
            panic!("graticule must be a multi line string");
        };
        // 36 meridians + 17 parallels.
        assert_eq!(lines.len(), 53);
        let pole_reaching = lines[..36]
            .iter()
            .filter(|l| l.last().map(|p| p[1]) == Some(90.0))
            .count();
        assert_eq!(pole_reaching, 4);
    }
}
