use super::geo::LonLat;

/// Cartesian vector, used for unit-sphere positions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Unit vector for a `[lon, lat]` position in degrees.
    pub fn from_lonlat(p: LonLat) -> Self {
        let (lon, lat) = (p[0].to_radians(), p[1].to_radians());
        let cos_lat = lat.cos();
        Self::new(cos_lat * lon.cos(), cos_lat * lon.sin(), lat.sin())
    }

    /// Inverse of [`Vec3::from_lonlat`]; `None` for a zero-length vector.
    pub fn to_lonlat(self) -> Option<LonLat> {
        let len = self.length();
        if len < 1e-12 {
            return None;
        }
        Some([
            self.y.atan2(self.x).to_degrees(),
            (self.z / len).clamp(-1.0, 1.0).asin().to_degrees(),
        ])
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

#[cfg(test)]
mod tests {
    use super::Vec3;

    #[test]
    fn lonlat_round_trips_through_unit_vector() {
        let v = Vec3::from_lonlat([30.0, -45.0]);
        assert!((v.length() - 1.0).abs() < 1e-12);
        let p = v.to_lonlat().unwrap();
        assert!((p[0] - 30.0).abs() < 1e-9);
        assert!((p[1] + 45.0).abs() < 1e-9);
        assert_eq!(Vec3::ZERO.to_lonlat(), None);
    }
}
