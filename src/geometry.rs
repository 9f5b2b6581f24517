//! 2D points and the rigid transforms used by alignment.

/// A point in the layout plane. Used both for vertex positions and for the
/// per-partition scratch buffers the force and sparsify phases write into.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pos {
    pub x: f64,
    pub y: f64,
}

impl Pos {
    pub const ZERO: Pos = Pos { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Pos { x, y }
    }

    pub fn dist(self, other: Pos) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn add(self, other: Pos) -> Pos {
        Pos::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Pos) -> Pos {
        Pos::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f64) -> Pos {
        Pos::new(self.x * factor, self.y * factor)
    }
}

/// A 2x2 matrix `[[a, b], [c, d]]`, used by alignment for rotation (and one
/// reflection-composed-with-rotation "mirror" family).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Matrix2 {
    /// Builds the transform for rotation angle `theta` and mirror flag `mirror`.
    ///
    /// `mirror == false` is an ordinary rotation matrix. `mirror == true` is
    /// the improper orthogonal matrix `[[-sin, cos], [cos, sin]]` (a
    /// reflection composed with a rotation) — preserved verbatim from the
    /// original implementation; changing its form shifts which `theta`
    /// minimizes the alignment score.
    pub fn for_candidate(theta: f64, mirror: bool) -> Self {
        let (sin_val, cos_val) = theta.sin_cos();
        if !mirror {
            Matrix2 { a: cos_val, b: -sin_val, c: sin_val, d: cos_val }
        } else {
            Matrix2 { a: -sin_val, b: cos_val, c: cos_val, d: sin_val }
        }
    }

    pub fn apply(&self, p: Pos) -> Pos {
        Pos::new(p.x * self.a + p.y * self.b, p.x * self.c + p.y * self.d)
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn rotation_is_norm_preserving() {
        let m = Matrix2::for_candidate(0.73, false);
        assert!((m.a * m.a + m.c * m.c - 1.0).abs() < 1e-12);
        assert!((m.b * m.b + m.d * m.d - 1.0).abs() < 1e-12);
        assert!((m.a * m.b + m.c * m.d).abs() < 1e-12);
        assert!((m.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mirror_has_determinant_minus_one() {
        let m = Matrix2::for_candidate(1.2, true);
        assert!((m.determinant() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn identity_rotation_is_identity() {
        let m = Matrix2::for_candidate(0.0, false);
        let p = Pos::new(3.0, -4.0);
        let q = m.apply(p);
        assert!((q.x - p.x).abs() < 1e-12);
        assert!((q.y - p.y).abs() < 1e-12);
    }

    #[test]
    fn full_turn_matches_start() {
        let m = Matrix2::for_candidate(2.0 * PI, false);
        let p = Pos::new(1.5, 2.5);
        let q = m.apply(p);
        assert!((q.x - p.x).abs() < 1e-9);
        assert!((q.y - p.y).abs() < 1e-9);
    }
}
