//! SVG path data for projected geometry.

use std::fmt::Write as _;

use super::geo::{Geometry, LonLat};
use super::precision::format_coord;
use super::projection::{Projection, ProjectionKind};

/// Radius of the marker drawn for point geometry.
pub const POINT_RADIUS: f64 = 4.5;

/// Generate the SVG `d` attribute for `geometry` under `projection`.
///
/// Lines break at clipped vertices; polygon rings keep only their visible
/// vertices. An empty string means nothing is visible.
pub fn path_data(projection: &Projection, geometry: &Geometry) -> String {
    let mut out = String::new();
    write_geometry(&mut out, projection, geometry);
    out
}

fn write_geometry(out: &mut String, projection: &Projection, geometry: &Geometry) {
    match geometry {
        Geometry::Point(p) => write_point(out, projection, *p),
        Geometry::MultiPoint(ps) => ps.iter().for_each(|p| write_point(out, projection, *p)),
        Geometry::LineString(line) => write_line(out, projection, line),
        Geometry::MultiLineString(lines) => {
            lines.iter().for_each(|l| write_line(out, projection, l))
        }
        Geometry::Polygon(rings) => rings.iter().for_each(|r| write_ring(out, projection, r)),
        Geometry::MultiPolygon(polys) => polys
            .iter()
            .flatten()
            .for_each(|r| write_ring(out, projection, r)),
        Geometry::Sphere => write_sphere(out, projection),
        Geometry::Collection(gs) => gs.iter().for_each(|g| write_geometry(out, projection, g)),
    }
}

fn xy(p: [f64; 2]) -> String {
    format!("{},{}", format_coord(p[0]), format_coord(p[1]))
}

fn write_point(out: &mut String, projection: &Projection, p: LonLat) {
    let Some(q) = projection.project(p) else {
        return;
    };
    let r = format_coord(POINT_RADIUS);
    let d = format_coord(2.0 * POINT_RADIUS);
    let _ = write!(
        out,
        "M{}m0,{r}a{r},{r} 0 1,1 0,-{d}a{r},{r} 0 1,1 0,{d}z",
        xy(q)
    );
}

fn write_line(out: &mut String, projection: &Projection, line: &[LonLat]) {
    let mut pen_down = false;
    for p in line {
        match projection.project(*p) {
            Some(q) => {
                out.push(if pen_down { 'L' } else { 'M' });
                out.push_str(&xy(q));
                pen_down = true;
            }
            None => pen_down = false,
        }
    }
}

fn write_ring(out: &mut String, projection: &Projection, ring: &[LonLat]) {
    let visible: Vec<[f64; 2]> = ring.iter().filter_map(|p| projection.project(*p)).collect();
    if visible.len() < 2 {
        return;
    }
    for (i, q) in visible.iter().enumerate() {
        out.push(if i == 0 { 'M' } else { 'L' });
        out.push_str(&xy(*q));
    }
    out.push('Z');
}

fn write_sphere(out: &mut String, projection: &Projection) {
    let [tx, ty] = projection.translate;
    let k = projection.scale;
    match projection.kind {
        ProjectionKind::Orthographic => {
            let clip = projection.clip_angle.unwrap_or(90.0).min(90.0);
            let r = format_coord(k * clip.to_radians().sin());
            let top = xy([tx, ty - k * clip.to_radians().sin()]);
            let bottom = xy([tx, ty + k * clip.to_radians().sin()]);
            let _ = write!(
                out,
                "M{top}A{r},{r} 0 1,1 {bottom}A{r},{r} 0 1,1 {top}Z"
            );
        }
        ProjectionKind::Equirectangular => {
            let (hx, hy) = (std::f64::consts::PI * k, std::f64::consts::FRAC_PI_2 * k);
            write_rect(out, [tx - hx, ty - hy], [tx + hx, ty + hy]);
        }
        ProjectionKind::Identity => write_rect(out, [-180.0, -90.0], [180.0, 90.0]),
    }
}

fn write_rect(out: &mut String, min: [f64; 2], max: [f64; 2]) {
    let _ = write!(
        out,
        "M{}L{}L{}L{}Z",
        xy(min),
        xy([max[0], min[1]]),
        xy(max),
        xy([min[0], max[1]])
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn flat() -> Projection {
        Projection::new(ProjectionKind::Identity)
    }

    #[test]
    fn point_is_a_small_circle() {
        let d = path_data(&flat(), &Geometry::Point([10.0, 20.0]));
        assert_eq!(d, "M10,20m0,4.5a4.5,4.5 0 1,1 0,-9a4.5,4.5 0 1,1 0,9z");
    }

    #[test]
    fn polygon_and_line() {
        let poly = Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]);
        assert_eq!(path_data(&flat(), &poly), "M0,0L1,0L1,1L0,0Z");
        let line = Geometry::LineString(vec![[0.0, 0.0], [2.5, 1.0]]);
        assert_eq!(path_data(&flat(), &line), "M0,0L2.5,1");
    }

    #[test]
    fn clipped_vertices_break_lines() {
        let p = Projection::orthographic()
            .with_scale(1.0)
            .with_translate([0.0, 0.0])
            .with_clip_angle(90.0);
        let line = Geometry::LineString(vec![[0.0, 0.0], [180.0, 0.0], [0.0, 0.0]]);
        assert_eq!(path_data(&p, &line), "M0,0M0,0");
        assert_eq!(path_data(&p, &Geometry::Point([180.0, 0.0])), "");
    }

    #[test]
    fn orthographic_sphere_is_a_disc() {
        let p = Projection::orthographic()
            .with_scale(100.0)
            .with_translate([200.0, 200.0]);
        assert_eq!(
            path_data(&p, &Geometry::Sphere),
            "M200,100A100,100 0 1,1 200,300A100,100 0 1,1 200,100Z"
        );
    }
}
