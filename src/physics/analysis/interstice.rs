// src/physics/analysis/interstice.rs
// Packing efficiency and facet/tetrahedron interstice statistics.

use crate::error::{Result, SroError};
use crate::model::{FeatureTable, Provider, RadiusTable, RadiusType, Snapshot, TopologyColumn};
use crate::physics::packing::{PackedNeighbor, SitePacking};
use crate::pipeline::{finish, map_rows, FeatureContext, Featurizer};
use crate::utils::stats::{calc_stats, STAT_NAMES};
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// --- 1. CONFIGURATION ---

/// Which interstice groups to emit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcVolumeArea {
    Volume,
    Area,
    #[default]
    All,
}

impl CalcVolumeArea {
    fn volume(self) -> bool {
        matches!(self, CalcVolumeArea::Volume | CalcVolumeArea::All)
    }

    fn area(self) -> bool {
        matches!(self, CalcVolumeArea::Area | CalcVolumeArea::All)
    }
}

pub const VOLUME_PREFIXES: [&str; 4] = [
    "fractional_volume_interstice_tetrahedra",
    "volume_interstice",
    "fractional_volume_interstice_tetrahedra_avg",
    "fractional_volume_interstice_center_v",
];

pub const AREA_PREFIXES: [&str; 4] = [
    "fractional_area_interstice_triangle",
    "area_interstice",
    "fractional_area_interstice_triangle_avg",
    "fractional_area_interstice_center_slice_a",
];

/// Atomic/glass packing efficiency plus interstice statistics over the
/// neighbor hull of every atom.
///
/// Atoms with fewer than 4 neighbors, or whose shell has no proper hull,
/// get a zero row. Missing radii and coordination numbers outside the
/// ideal-ratio table abort the run.
#[derive(Clone, Copy, Debug)]
pub struct VolumeAreaInterstice {
    pub provider: Provider,
    pub radius_type: RadiusType,
    pub calc_packing_efficiency: bool,
    pub calc_volume_area: CalcVolumeArea,
}

impl Default for VolumeAreaInterstice {
    fn default() -> Self {
        Self {
            provider: Provider::Voro,
            radius_type: RadiusType::Miracle,
            calc_packing_efficiency: true,
            calc_volume_area: CalcVolumeArea::All,
        }
    }
}

// --- 2. PER-ATOM COMPUTATION ---

impl VolumeAreaInterstice {
    pub fn new(provider: Provider, radius_type: RadiusType) -> Self {
        Self {
            provider,
            radius_type,
            ..Default::default()
        }
    }

    fn width(&self) -> usize {
        let mut n = 0;
        if self.calc_packing_efficiency {
            n += 2;
        }
        if self.calc_volume_area.volume() {
            n += VOLUME_PREFIXES.len() * STAT_NAMES.len();
        }
        if self.calc_volume_area.area() {
            n += AREA_PREFIXES.len() * STAT_NAMES.len();
        }
        n
    }

    /// Builds the scratch geometry for one atom, or `None` when the atom
    /// falls back to a zero row.
    fn site(
        &self,
        snapshot: &Snapshot,
        radii: &RadiusTable,
        atom_id: i64,
        neighbor_ids: &[i64],
    ) -> Result<Option<SitePacking>> {
        if neighbor_ids.len() < 4 {
            return Ok(None);
        }

        let center = snapshot.get(atom_id).ok_or(SroError::UnknownAtom(atom_id))?;
        let center_radius = radii.radius(center.atom_type, self.radius_type)?;
        let origin = Vector3::from(center.position);

        let neighbors = neighbor_ids
            .iter()
            .map(|&nid| -> Result<PackedNeighbor> {
                let atom = snapshot.get(nid).ok_or(SroError::UnknownNeighbor {
                    atom_id,
                    neighbor_id: nid,
                })?;
                Ok(PackedNeighbor {
                    position: origin + snapshot.minimum_image(center.position, atom.position),
                    atom_type: atom.atom_type,
                    radius: radii.radius(atom.atom_type, self.radius_type)?,
                })
            })
            .collect::<Result<Vec<PackedNeighbor>>>()?;

        match SitePacking::new(origin, center_radius, neighbors) {
            Ok(site) => Ok(Some(site)),
            Err(e) => {
                debug!("Atom {}: {}; emitting zero row", atom_id, e);
                Ok(None)
            }
        }
    }

    fn row(&self, site: &SitePacking) -> Result<Vec<f64>> {
        let mut row = Vec::with_capacity(self.width());

        if self.calc_packing_efficiency {
            row.push(site.atomic_packing_efficiency());
            row.push(site.glass_packing_efficiency()?);
        }

        let rc = site.center_radius();

        if self.calc_volume_area.volume() {
            let (volumes, fractions) = site.tetra_interstices();
            let n_facets = volumes.len() as f64;
            let absolute: Vec<f64> = fractions.iter().zip(&volumes).map(|(f, v)| f * v).collect();
            let hull_volume = site.hull().volume();
            let center_volume = 4.0 / 3.0 * PI * rc.powi(3);

            row.extend(calc_stats(&fractions));
            row.extend(calc_stats(&absolute));
            row.extend(calc_stats(&scaled(&absolute, n_facets / hull_volume)));
            row.extend(calc_stats(&scaled(&absolute, 1.0 / center_volume)));
        }

        if self.calc_volume_area.area() {
            let (areas, fractions) = site.facet_interstices();
            let n_facets = areas.len() as f64;
            let absolute: Vec<f64> = fractions.iter().zip(&areas).map(|(f, a)| f * a).collect();
            let hull_area = site.hull().area();
            let center_slice = PI * rc.powi(2);

            row.extend(calc_stats(&fractions));
            row.extend(calc_stats(&absolute));
            row.extend(calc_stats(&scaled(&absolute, n_facets / hull_area)));
            row.extend(calc_stats(&scaled(&absolute, 1.0 / center_slice)));
        }

        Ok(row)
    }
}

fn scaled(values: &[f64], factor: f64) -> Vec<f64> {
    values.iter().map(|v| v * factor).collect()
}

// --- 3. FEATURIZER ---

impl Featurizer for VolumeAreaInterstice {
    fn label(&self) -> &'static str {
        "volume/area interstice"
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount, TopologyColumn::NeighborId]
    }

    fn feature_names(&self) -> Vec<String> {
        let p = self.provider;
        let kind = self.radius_type.prefix();
        let mut names = Vec::with_capacity(self.width());

        if self.calc_packing_efficiency {
            names.push(format!("{}_atomic_packing_efficiency {}", kind, p));
            names.push(format!("{}_glass_packing_efficiency {}", kind, p));
        }

        let mut prefixes: Vec<&str> = Vec::new();
        if self.calc_volume_area.volume() {
            prefixes.extend(VOLUME_PREFIXES);
        }
        if self.calc_volume_area.area() {
            prefixes.extend(AREA_PREFIXES);
        }
        for prefix in prefixes {
            names.extend(STAT_NAMES.iter().map(|s| format!("{} {} {}", prefix, s, p)));
        }
        names
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        let snapshot = ctx.snapshot()?;
        let radii = ctx.radii()?;
        let topology = ctx.topology;
        let limit = topology.neighbor_limit;
        let width = self.width();

        let rows = map_rows(topology.len(), ctx.parallel, |i| {
            let ids: Vec<i64> = topology.records[i].neighbor_ids(limit).collect();
            match self.site(snapshot, radii, topology.atom_ids[i], &ids)? {
                Some(site) => self.row(&site),
                None => Ok(vec![0.0; width]),
            }
        })?;
        finish(ctx, self.feature_names(), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Atom, NeighborRecord, NeighborTopology, RadiusRecord};

    const CU: u32 = 29;

    fn octahedron_snapshot() -> Snapshot {
        let mut atoms = vec![Atom::new(1, CU, [5.0, 5.0, 5.0])];
        let dirs = [
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ];
        for (k, d) in dirs.iter().enumerate() {
            atoms.push(Atom::new(
                k as i64 + 2,
                CU,
                [5.0 + d[0], 5.0 + d[1], 5.0 + d[2]],
            ));
        }
        Snapshot::new(atoms, [[0.0, 10.0]; 3], [true; 3])
    }

    fn topology(shells: &[Vec<i64>]) -> NeighborTopology {
        let mut topo = NeighborTopology::new(
            Provider::Voro,
            80,
            &[TopologyColumn::NeighborCount, TopologyColumn::NeighborId],
        );
        for (i, ids) in shells.iter().enumerate() {
            topo.push(
                i as i64 + 1,
                NeighborRecord {
                    n_neighbors: ids.len(),
                    ids: ids.clone(),
                    ..Default::default()
                },
            );
        }
        topo
    }

    fn radii(r: f64) -> RadiusTable {
        RadiusTable::new().with(CU, RadiusRecord::new(r, r))
    }

    #[test]
    fn test_feature_names_layout() {
        let names = VolumeAreaInterstice::default().feature_names();
        assert_eq!(names.len(), 42);
        assert_eq!(names[0], "miracle_atomic_packing_efficiency voro");
        assert_eq!(names[1], "miracle_glass_packing_efficiency voro");
        assert_eq!(names[2], "fractional_volume_interstice_tetrahedra sum voro");
        assert_eq!(names[22], "fractional_area_interstice_triangle sum voro");

        let area_only = VolumeAreaInterstice {
            calc_volume_area: CalcVolumeArea::Area,
            calc_packing_efficiency: false,
            ..VolumeAreaInterstice::new(Provider::Dist, RadiusType::Atomic)
        };
        assert_eq!(area_only.feature_names().len(), 20);
        assert_eq!(area_only.feature_names()[5], "area_interstice sum dist");
    }

    #[test]
    fn test_octahedron_row() {
        let r: f64 = 0.5;
        let snapshot = octahedron_snapshot();
        let topo = topology(&[vec![2, 3, 4, 5, 6, 7]]);
        let table = radii(r);
        let ctx = FeatureContext::new(&topo)
            .with_snapshot(&snapshot)
            .with_radii(&table);

        let featurizer = VolumeAreaInterstice::default();
        let out = featurizer.transform(&ctx, &FeatureTable::empty(vec![1])).unwrap();
        let row = &out.rows[0];
        assert_eq!(row.len(), featurizer.feature_names().len());

        let ape = r.powi(3) * (PI + 6.0 * (1.0f64 / 3.0).asin());
        assert!((row[0] - ape).abs() < 1e-12);
        assert!((row[1] - (1.0 - 0.414214)).abs() < 1e-12);

        // Eight identical tetrahedra: std is zero and min == max
        let frac_mean = row[3];
        assert!(row[4].abs() < 1e-12);
        assert!((row[5] - frac_mean).abs() < 1e-12);
        // _avg group: absolute / hull_volume * n_facets, hull volume 4/3
        let abs_mean = row[8];
        assert!((row[13] - abs_mean * 8.0 / (4.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_small_shells_give_zero_rows() {
        let snapshot = octahedron_snapshot();
        let shells: Vec<Vec<i64>> = (0..4).map(|n| (2..2 + n).collect()).collect();
        let topo = topology(&shells);
        let table = radii(0.5);
        let ctx = FeatureContext::new(&topo)
            .with_snapshot(&snapshot)
            .with_radii(&table);

        let featurizer = VolumeAreaInterstice::default();
        let out = featurizer
            .transform(&ctx, &FeatureTable::empty(vec![1, 2, 3, 4]))
            .unwrap();
        for row in &out.rows {
            assert_eq!(row, &vec![0.0; featurizer.feature_names().len()]);
        }
    }

    #[test]
    fn test_coplanar_shell_gives_zero_row() {
        let snapshot = octahedron_snapshot();
        // Four neighbors in the z = 5 plane
        let topo = topology(&[vec![2, 3, 4, 5]]);
        let table = radii(0.5);
        let ctx = FeatureContext::new(&topo)
            .with_snapshot(&snapshot)
            .with_radii(&table);
        let out = VolumeAreaInterstice::default()
            .transform(&ctx, &FeatureTable::empty(vec![1]))
            .unwrap();
        assert!(out.rows[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_radius_is_fatal() {
        let snapshot = octahedron_snapshot();
        let topo = topology(&[vec![2, 3, 4, 5, 6, 7]]);
        let table = RadiusTable::new();
        let ctx = FeatureContext::new(&topo)
            .with_snapshot(&snapshot)
            .with_radii(&table);
        let result = VolumeAreaInterstice::default().transform(&ctx, &FeatureTable::empty(vec![1]));
        assert!(matches!(result, Err(SroError::MissingRadius { atom_type: 29, .. })));
    }

    #[test]
    fn test_missing_snapshot_is_fatal() {
        let topo = topology(&[vec![]]);
        let ctx = FeatureContext::new(&topo);
        let result = VolumeAreaInterstice::default().transform(&ctx, &FeatureTable::empty(vec![1]));
        assert!(matches!(result, Err(SroError::MissingGeometry(_))));
    }

    #[test]
    fn test_periodic_neighbors_are_unwrapped() {
        // Same octahedron, centre moved onto the box corner
        let mut snapshot = octahedron_snapshot();
        for atom in &mut snapshot.atoms {
            for c in &mut atom.position {
                *c = (*c - 5.0).rem_euclid(10.0);
            }
        }
        snapshot.reindex();
        let topo = topology(&[vec![2, 3, 4, 5, 6, 7]]);
        let table = radii(0.5);
        let ctx = FeatureContext::new(&topo)
            .with_snapshot(&snapshot)
            .with_radii(&table);
        let out = VolumeAreaInterstice::default()
            .transform(&ctx, &FeatureTable::empty(vec![1]))
            .unwrap();
        let ape = 0.125 * (PI + 6.0 * (1.0f64 / 3.0).asin());
        assert!((out.rows[0][0] - ape).abs() < 1e-12);
    }
}
