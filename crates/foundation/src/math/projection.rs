//! Map projections with rotate / scale / translate / clip-angle.

use super::geo::LonLat;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProjectionKind {
    Orthographic,
    Equirectangular,
    /// Coordinates pass through untouched. Not rotatable.
    Identity,
}

impl ProjectionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "orthographic" => Some(ProjectionKind::Orthographic),
            "equirectangular" => Some(ProjectionKind::Equirectangular),
            "identity" => Some(ProjectionKind::Identity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub kind: ProjectionKind,
    pub scale: f64,
    pub translate: [f64; 2],
    /// `[λ, φ, γ]` in degrees.
    pub rotate: [f64; 3],
    /// Small-circle clip radius in degrees, measured after rotation.
    pub clip_angle: Option<f64>,
}

impl Projection {
    pub fn new(kind: ProjectionKind) -> Self {
        Self {
            kind,
            scale: 150.0,
            translate: [480.0, 250.0],
            rotate: [0.0; 3],
            clip_angle: None,
        }
    }

    pub fn orthographic() -> Self {
        Self::new(ProjectionKind::Orthographic)
    }

    pub fn equirectangular() -> Self {
        Self::new(ProjectionKind::Equirectangular)
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_translate(mut self, translate: [f64; 2]) -> Self {
        self.translate = translate;
        self
    }

    pub fn with_rotate(mut self, rotate: &[f64]) -> Self {
        self.set_rotate(rotate);
        self
    }

    pub fn with_clip_angle(mut self, angle: f64) -> Self {
        self.clip_angle = Some(angle);
        self
    }

    pub fn rotatable(&self) -> bool {
        self.kind != ProjectionKind::Identity
    }

    /// Set rotation from 2 or 3 angles; a missing `γ` becomes 0.
    pub fn set_rotate(&mut self, r: &[f64]) {
        self.rotate = [
            r.first().copied().unwrap_or(0.0),
            r.get(1).copied().unwrap_or(0.0),
            r.get(2).copied().unwrap_or(0.0),
        ];
    }

    /// Rotate a position into the projection's frame (radians in, radians out).
    fn rotate_radians(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let d_lambda = (self.rotate[0] % 360.0).to_radians();
        let d_phi = self.rotate[1].to_radians();
        let d_gamma = self.rotate[2].to_radians();

        let mut lambda = lambda + d_lambda;
        if lambda > std::f64::consts::PI {
            lambda -= std::f64::consts::TAU;
        } else if lambda < -std::f64::consts::PI {
            lambda += std::f64::consts::TAU;
        }
        if d_phi == 0.0 && d_gamma == 0.0 {
            return (lambda, phi);
        }

        let (sin_dp, cos_dp) = d_phi.sin_cos();
        let (sin_dg, cos_dg) = d_gamma.sin_cos();
        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let k = z * cos_dp + x * sin_dp;
        (
            (y * cos_dg - k * sin_dg).atan2(x * cos_dp - z * sin_dp),
            (k * cos_dg + y * sin_dg).clamp(-1.0, 1.0).asin(),
        )
    }

    /// Rotated position in degrees, or `None` when outside the clip circle.
    pub fn rotated(&self, p: LonLat) -> Option<LonLat> {
        let (l, f) = self.rotate_radians(p[0].to_radians(), p[1].to_radians());
        if let Some(angle) = self.clip_angle
            && l.cos() * f.cos() < angle.to_radians().cos() - 1e-9
        {
            return None;
        }
        Some([l.to_degrees(), f.to_degrees()])
    }

    /// Project a geographic position to screen coordinates.
    pub fn project(&self, p: LonLat) -> Option<[f64; 2]> {
        if self.kind == ProjectionKind::Identity {
            return Some(p);
        }
        let r = self.rotated(p)?;
        let (l, f) = (r[0].to_radians(), r[1].to_radians());
        let (x, y) = match self.kind {
            ProjectionKind::Orthographic => (f.cos() * l.sin(), f.sin()),
            ProjectionKind::Equirectangular | ProjectionKind::Identity => (l, f),
        };
        Some([
            self.translate[0] + x * self.scale,
            self.translate[1] - y * self.scale,
        ])
    }
}
