// src/physics/hull.rs
// Incremental 3-D convex hull over one atom's neighbor shell.
// Shells are small (4..~30 points); insertion is O(n²).

use crate::utils::geometry::{tetra_volume, triangle_area};
use nalgebra::Vector3;
use std::collections::HashSet;
use thiserror::Error;

/// Relative tolerance for side-of-plane tests (scaled by the shell extent)
pub(crate) const EPSILON: f64 = 1e-10;

/// Per-atom geometry failure. Callers turn this into a zero feature row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("not enough neighbors to form a hull: {0} (minimum 4 required)")]
    InsufficientVertices(usize),

    #[error("neighbor shell is coplanar, collinear or not finite")]
    Degenerate,
}

/// A triangular facet, vertices counter-clockwise seen from outside.
#[derive(Debug, Clone)]
struct Facet {
    vertices: [usize; 3],
    normal: Vector3<f64>,
    offset: f64,
}

impl Facet {
    fn new(points: &[Vector3<f64>], vertices: [usize; 3], interior: &Vector3<f64>) -> Self {
        let [a, b, c] = vertices;
        let mut normal = (points[b] - points[a]).cross(&(points[c] - points[a]));
        let len = normal.norm();
        if len > 0.0 {
            normal /= len;
        }
        let mut facet = Facet {
            vertices,
            normal,
            offset: normal.dot(&points[a]),
        };
        // Orient outward: the interior point must sit behind the plane
        if facet.distance(interior) > 0.0 {
            facet.vertices = [a, c, b];
            facet.normal = -facet.normal;
            facet.offset = -facet.offset;
        }
        facet
    }

    fn distance(&self, p: &Vector3<f64>) -> f64 {
        self.normal.dot(p) - self.offset
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

/// Convex hull of a neighbor shell.
///
/// `simplices` index into the input point slice, like the simplices of a
/// triangulated Qhull result. Points lying on a facet plane do not become
/// vertices, so coplanar faces come out as a valid triangulation.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    simplices: Vec<[usize; 3]>,
    volume: f64,
    area: f64,
}

impl ConvexHull {
    /// Builds the hull.
    ///
    /// # Algorithm
    /// 1. Seed with the most spread-out tetrahedron (extreme point, farthest
    ///    point, farthest from that line, farthest from that plane)
    /// 2. Insert remaining points in index order: drop the facets that see the
    ///    point, then stitch the horizon edges to it
    ///
    /// # Returns
    /// - `Err(InsufficientVertices)` for fewer than 4 points
    /// - `Err(Degenerate)` when the points do not span 3-D space
    pub fn build(points: &[Vector3<f64>]) -> Result<Self, GeometryError> {
        let n = points.len();
        if n < 4 {
            return Err(GeometryError::InsufficientVertices(n));
        }
        if points.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(GeometryError::Degenerate);
        }

        let seed = initial_tetrahedron(points)?;
        let scale = seed.1;
        let tol = EPSILON * scale;
        let [i0, i1, i2, i3] = seed.0;

        let interior = (points[i0] + points[i1] + points[i2] + points[i3]) / 4.0;
        let mut facets = vec![
            Facet::new(points, [i0, i1, i2], &interior),
            Facet::new(points, [i0, i1, i3], &interior),
            Facet::new(points, [i0, i2, i3], &interior),
            Facet::new(points, [i1, i2, i3], &interior),
        ];

        for (p, point) in points.iter().enumerate() {
            if seed.0.contains(&p) {
                continue;
            }

            let visible: Vec<bool> = facets.iter().map(|f| f.distance(point) > tol).collect();
            if !visible.iter().any(|&v| v) {
                continue; // inside, or on the surface
            }

            let visible_edges: HashSet<(usize, usize)> = facets
                .iter()
                .zip(&visible)
                .filter(|(_, v)| **v)
                .flat_map(|(f, _)| f.edges())
                .collect();

            // Horizon: visible edges whose twin belongs to a hidden facet
            let horizon: Vec<(usize, usize)> = facets
                .iter()
                .zip(&visible)
                .filter(|(_, v)| **v)
                .flat_map(|(f, _)| f.edges())
                .filter(|&(a, b)| !visible_edges.contains(&(b, a)))
                .collect();

            let mut keep = visible.iter().map(|v| !v);
            facets.retain(|_| keep.next().unwrap_or(true));

            facets.extend(
                horizon
                    .into_iter()
                    .map(|(a, b)| Facet::new(points, [a, b, p], &interior)),
            );
        }

        let mut volume = 0.0;
        let mut area = 0.0;
        for f in &facets {
            let [a, b, c] = f.vertices;
            volume += tetra_volume(&interior, &points[a], &points[b], &points[c]);
            area += triangle_area(&points[a], &points[b], &points[c]);
        }
        if volume <= tol * scale * scale {
            return Err(GeometryError::Degenerate);
        }

        Ok(ConvexHull {
            simplices: facets.into_iter().map(|f| f.vertices).collect(),
            volume,
            area,
        })
    }

    pub fn simplices(&self) -> &[[usize; 3]] {
        &self.simplices
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn area(&self) -> f64 {
        self.area
    }
}

/// Picks four well-separated, non-coplanar points. Also returns the length
/// scale used to make tolerances relative.
fn initial_tetrahedron(points: &[Vector3<f64>]) -> Result<([usize; 4], f64), GeometryError> {
    let (i0, _) = argmax(points, |p| -p.x);
    let a = points[i0];

    let (i1, scale) = argmax(points, |p| (p - a).norm());
    if scale <= 0.0 || !scale.is_finite() {
        return Err(GeometryError::Degenerate);
    }
    let tol = EPSILON * scale;
    let dir = (points[i1] - a) / scale;

    let (i2, line_dist) = argmax(points, |p| (p - a).cross(&dir).norm());
    if line_dist <= tol {
        return Err(GeometryError::Degenerate);
    }

    let normal = (points[i1] - a).cross(&(points[i2] - a)).normalize();
    let (i3, plane_dist) = argmax(points, |p| normal.dot(&(p - a)).abs());
    if plane_dist <= tol {
        return Err(GeometryError::Degenerate);
    }

    Ok(([i0, i1, i2, i3], scale))
}

/// First index maximising `f` (ties keep the lower index)
fn argmax(points: &[Vector3<f64>], f: impl Fn(&Vector3<f64>) -> f64) -> (usize, f64) {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, f(p)))
        .fold((0, f64::NEG_INFINITY), |best, cur| {
            if cur.1 > best.1 {
                cur
            } else {
                best
            }
        })
}
