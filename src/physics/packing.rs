// src/physics/packing.rs
// Packing of one atom's coordination cluster: facet/tetra angles over the
// neighbor hull, interstice fractions, atomic and glass packing efficiency.

use crate::error::{Result, SroError};
use crate::physics::hull::{ConvexHull, GeometryError};
use crate::utils::geometry::{solid_angle, tetra_volume, triangle_area, triangular_angle};
use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Ideal centre/neighbor radius ratio for each coordination number
///
/// **Reference**: Miracle, Lord & Ranganathan (2006), Mater. Trans. 47, 1737
pub const IDEAL_RATIO: [(usize, f64); 22] = [
    (3, 0.154701),
    (4, 0.224745),
    (5, 0.361654),
    (6, 0.414214),
    (7, 0.518145),
    (8, 0.616517),
    (9, 0.709914),
    (10, 0.798907),
    (11, 0.884003),
    (12, 0.902113),
    (13, 0.976006),
    (14, 1.04733),
    (15, 1.11632),
    (16, 1.18318),
    (17, 1.2481),
    (18, 1.31123),
    (19, 1.37271),
    (20, 1.43267),
    (21, 1.49119),
    (22, 1.5484),
    (23, 1.60436),
    (24, 1.65915),
];

/// Ideal radius ratio for `cn`. No extrapolation outside 3..=24.
pub fn ideal_ratio(cn: usize) -> Result<f64> {
    IDEAL_RATIO
        .iter()
        .find(|(n, _)| *n == cn)
        .map(|&(_, r)| r)
        .ok_or(SroError::UnsupportedCoordination(cn))
}

/// A neighbor as seen from the centre: unwrapped position, type and radius.
#[derive(Clone, Copy, Debug)]
pub struct PackedNeighbor {
    pub position: Vector3<f64>,
    pub atom_type: u32,
    pub radius: f64,
}

/// Per-atom scratch geometry.
///
/// Built for one atom, consumed by the angle and interstice steps, then
/// dropped. Never shared between atoms.
#[derive(Debug)]
pub struct SitePacking {
    center: Vector3<f64>,
    center_radius: f64,
    neighbors: Vec<PackedNeighbor>,
    hull: ConvexHull,
    /// Planar angle at each vertex of each hull facet
    triangular_angles: Vec<[f64; 3]>,
    /// Solid angle at each facet vertex, subtended by (centre, other two vertices)
    solid_angles: Vec<[f64; 3]>,
}

/// For facet vertex k, the other two vertices
const LEAVES: [(usize, usize); 3] = [(1, 2), (0, 2), (0, 1)];

impl SitePacking {
    pub fn new(
        center: Vector3<f64>,
        center_radius: f64,
        neighbors: Vec<PackedNeighbor>,
    ) -> std::result::Result<Self, GeometryError> {
        let positions: Vec<Vector3<f64>> = neighbors.iter().map(|n| n.position).collect();
        let hull = ConvexHull::build(&positions)?;

        let mut triangular_angles = Vec::with_capacity(hull.simplices().len());
        let mut solid_angles = Vec::with_capacity(hull.simplices().len());

        for simplex in hull.simplices() {
            let mut tri = [0.0; 3];
            let mut solid = [0.0; 3];
            for (k, &(l1, l2)) in LEAVES.iter().enumerate() {
                let vertex = &positions[simplex[k]];
                let leaf1 = &positions[simplex[l1]];
                let leaf2 = &positions[simplex[l2]];
                tri[k] = triangular_angle(vertex, leaf1, leaf2);
                solid[k] = solid_angle(vertex, &center, leaf1, leaf2);
            }
            triangular_angles.push(tri);
            solid_angles.push(solid);
        }

        Ok(Self {
            center,
            center_radius,
            neighbors,
            hull,
            triangular_angles,
            solid_angles,
        })
    }

    pub fn hull(&self) -> &ConvexHull {
        &self.hull
    }

    pub fn center_radius(&self) -> f64 {
        self.center_radius
    }

    pub fn coordination(&self) -> usize {
        self.neighbors.len()
    }

    pub fn triangular_angles(&self) -> &[[f64; 3]] {
        &self.triangular_angles
    }

    pub fn solid_angles(&self) -> &[[f64; 3]] {
        &self.solid_angles
    }

    fn facet_points(&self, simplex: &[usize; 3]) -> [&Vector3<f64>; 3] {
        [
            &self.neighbors[simplex[0]].position,
            &self.neighbors[simplex[1]].position,
            &self.neighbors[simplex[2]].position,
        ]
    }

    /// Facet areas and their interstice *fractions*.
    ///
    /// The second vector is `1 - packed_area / facet_area`, a fraction, not
    /// an absolute area.
    pub fn facet_interstices(&self) -> (Vec<f64>, Vec<f64>) {
        let mut areas = Vec::with_capacity(self.triangular_angles.len());
        let mut fractions = Vec::with_capacity(self.triangular_angles.len());

        for (simplex, angles) in self.hull.simplices().iter().zip(&self.triangular_angles) {
            let packed_area: f64 = simplex
                .iter()
                .zip(angles)
                .map(|(&idx, &angle)| angle / 2.0 * self.neighbors[idx].radius.powi(2))
                .sum();

            let [a, b, c] = self.facet_points(simplex);
            let area = triangle_area(a, b, c);
            areas.push(area);
            fractions.push(if area > 0.0 { 1.0 - packed_area / area } else { 0.0 });
        }
        (areas, fractions)
    }

    /// Tetrahedron (centre + facet) volumes and their interstice fractions.
    pub fn tetra_interstices(&self) -> (Vec<f64>, Vec<f64>) {
        let mut volumes = Vec::with_capacity(self.solid_angles.len());
        let mut fractions = Vec::with_capacity(self.solid_angles.len());

        for (simplex, angles) in self.hull.simplices().iter().zip(&self.solid_angles) {
            let mut packed_volume: f64 = simplex
                .iter()
                .zip(angles)
                .filter(|(_, omega)| **omega != 0.0)
                .map(|(&idx, &omega)| omega / 3.0 * self.neighbors[idx].radius.powi(3))
                .sum();

            let [a, b, c] = self.facet_points(simplex);
            let center_omega = solid_angle(&self.center, a, b, c);
            packed_volume += center_omega / 3.0 * self.center_radius.powi(3);

            let volume = tetra_volume(&self.center, a, b, c);
            volumes.push(volume);
            fractions.push(if volume > 0.0 {
                1.0 - packed_volume / volume
            } else {
                0.0
            });
        }
        (volumes, fractions)
    }

    /// Solid angle each neighbor subtends, summed over all facets it touches
    pub fn neighbor_solid_angles(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.neighbors.len()];
        for (simplex, angles) in self.hull.simplices().iter().zip(&self.solid_angles) {
            for (&idx, &omega) in simplex.iter().zip(angles) {
                totals[idx] += omega;
            }
        }
        totals
    }

    /// Volume of the cluster filled by atoms: the whole centre sphere plus a
    /// cone of each neighbor sphere.
    ///
    /// **Formula**: V = 4/3·π·r_c³ + Σ_i Ω_i/3 · r_i³
    pub fn cluster_packed_volume(&self) -> f64 {
        let mut packed = 4.0 / 3.0 * PI * self.center_radius.powi(3);
        for (neighbor, omega) in self.neighbors.iter().zip(self.neighbor_solid_angles()) {
            if omega == 0.0 {
                continue;
            }
            packed += omega / 3.0 * neighbor.radius.powi(3);
        }
        packed
    }

    pub fn atomic_packing_efficiency(&self) -> f64 {
        self.cluster_packed_volume() / self.hull.volume()
    }

    /// **Formula**: r_c / (Σ_t r_t·n_t / CN) − ideal_ratio(CN)
    pub fn glass_packing_efficiency(&self) -> Result<f64> {
        let cn = self.neighbors.len();
        let ideal = ideal_ratio(cn)?;

        // Group by type so the accumulation order is fixed
        let mut by_type: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for n in &self.neighbors {
            let entry = by_type.entry(n.atom_type).or_insert((n.radius, 0));
            entry.1 += 1;
        }
        let mean_radius: f64 = by_type
            .values()
            .map(|&(r, count)| r * count as f64)
            .sum::<f64>()
            / cn as f64;

        Ok(self.center_radius / mean_radius - ideal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn octahedral_site(center_radius: f64, neighbor_radius: f64) -> SitePacking {
        let dirs = [
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ];
        let neighbors = dirs
            .iter()
            .map(|&d| PackedNeighbor {
                position: Vector3::from(d),
                atom_type: 29,
                radius: neighbor_radius,
            })
            .collect();
        SitePacking::new(Vector3::zeros(), center_radius, neighbors).unwrap()
    }

    #[test]
    fn test_octahedron_vertex_solid_angle() {
        // Interior solid angle at an octahedron vertex is 4·asin(1/3)
        let site = octahedral_site(0.5, 0.5);
        for omega in site.neighbor_solid_angles() {
            assert!((omega - 4.0 * (1.0f64 / 3.0).asin()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_octahedron_atomic_packing_efficiency() {
        // V_packed = r³(4π/3 + 8·asin(1/3)), V_hull = 4/3
        let r: f64 = 0.5;
        let site = octahedral_site(r, r);
        let expected = r.powi(3) * (PI + 6.0 * (1.0f64 / 3.0).asin());
        assert!((site.atomic_packing_efficiency() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_octahedron_interstices() {
        let r: f64 = 0.5;
        let site = octahedral_site(r, r);

        // Each facet: equilateral, all angles π/3 -> packed area = π/2 · r²
        let (areas, fractions) = site.facet_interstices();
        assert_eq!(areas.len(), 8);
        let area = 3f64.sqrt() / 2.0;
        for (a, f) in areas.iter().zip(&fractions) {
            assert!((a - area).abs() < 1e-12);
            assert!((f - (1.0 - PI / 2.0 * r * r / area)).abs() < 1e-12);
        }

        // Each tetra: centre octant (π/2) + three vertex angles of asin(1/3)
        let (volumes, fractions) = site.tetra_interstices();
        let packed = (PI / 2.0 + 3.0 * (1.0f64 / 3.0).asin()) / 3.0 * r.powi(3);
        for (v, f) in volumes.iter().zip(&fractions) {
            assert!((v - 1.0 / 6.0).abs() < 1e-12);
            assert!((f - (1.0 - packed * 6.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_glass_packing_efficiency_at_ideal_ratio_is_zero() {
        let site = octahedral_site(0.414214, 1.0);
        assert_eq!(site.glass_packing_efficiency().unwrap(), 0.0);
    }

    #[test]
    fn test_ideal_ratio_range() {
        assert!(ideal_ratio(3).is_ok());
        assert!(ideal_ratio(24).is_ok());
        assert!(matches!(
            ideal_ratio(25),
            Err(SroError::UnsupportedCoordination(25))
        ));
        assert!(ideal_ratio(2).is_err());
    }
}
