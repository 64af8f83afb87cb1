// src/utils/geometry.rs
// Small closed-form helpers on the neighbor shell. All angles in radians.

use nalgebra::Vector3;

type Point3 = Vector3<f64>;

/// Planar angle of triangle (`vertex`, `b`, `c`) at `vertex`
pub fn triangular_angle(vertex: &Point3, b: &Point3, c: &Point3) -> f64 {
    let u = b - vertex;
    let v = c - vertex;
    let denom = u.norm() * v.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (u.dot(&v) / denom).clamp(-1.0, 1.0).acos()
}

/// Solid angle subtended at `apex` by the triangle (`a`, `b`, `c`)
///
/// # Formula
/// Van Oosterom & Strackee (1983):
/// ```text
/// tan(Ω/2) = |R1·(R2×R3)| / (r1 r2 r3 + (R1·R2) r3 + (R1·R3) r2 + (R2·R3) r1)
/// ```
/// A coplanar configuration gives exactly zero.
pub fn solid_angle(apex: &Point3, a: &Point3, b: &Point3, c: &Point3) -> f64 {
    let r1 = a - apex;
    let r2 = b - apex;
    let r3 = c - apex;
    let (n1, n2, n3) = (r1.norm(), r2.norm(), r3.norm());

    let numerator = r1.dot(&r2.cross(&r3)).abs();
    let denominator =
        n1 * n2 * n3 + r1.dot(&r2) * n3 + r1.dot(&r3) * n2 + r2.dot(&r3) * n1;

    if numerator == 0.0 {
        return 0.0;
    }
    2.0 * numerator.atan2(denominator)
}

pub fn triangle_area(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    0.5 * (b - a).cross(&(c - a)).norm()
}

pub fn tetra_volume(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> f64 {
    (b - a).dot(&(c - a).cross(&(d - a))).abs() / 6.0
}
