// src/model/table.rs

use crate::error::{Result, SroError};
use crate::model::topology::{NeighborTopology, TopologyColumn};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Named numeric columns, one row per atom, row-aligned to the topology table.
///
/// Column order is the declaration order of the producing featurizer and is
/// part of the output contract.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub ids: Vec<i64>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(ids: Vec<i64>, columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if rows.len() != ids.len() {
            return Err(SroError::RowMismatch {
                expected: ids.len(),
                found: rows.len(),
            });
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(SroError::RowMismatch {
                expected: columns.len(),
                found: bad.len(),
            });
        }
        Ok(Self { ids, columns, rows })
    }

    /// A table with rows but no columns yet; the starting point for merges.
    pub fn empty(ids: Vec<i64>) -> Self {
        let rows = vec![Vec::new(); ids.len()];
        Self {
            ids,
            columns: Vec::new(),
            rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    pub fn has_columns<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.column_index(n.as_ref()).is_some())
    }

    /// Sub-table with the given columns in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Option<FeatureTable> {
        let indices: Option<Vec<usize>> =
            names.iter().map(|n| self.column_index(n.as_ref())).collect();
        let indices = indices?;
        Some(FeatureTable {
            ids: self.ids.clone(),
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|&i| r[i]).collect())
                .collect(),
        })
    }

    /// Appends the columns of `other` that this table does not have yet.
    ///
    /// Both tables must describe the same atoms in the same order.
    pub fn merge(&mut self, other: &FeatureTable) -> Result<()> {
        if self.ids != other.ids {
            return Err(SroError::RowMismatch {
                expected: self.ids.len(),
                found: other.ids.len(),
            });
        }
        let fresh: Vec<usize> = other
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| self.column_index(c).is_none())
            .map(|(i, _)| i)
            .collect();

        for &i in &fresh {
            self.columns.push(other.columns[i].clone());
        }
        for (row, src) in self.rows.iter_mut().zip(&other.rows) {
            row.extend(fresh.iter().map(|&i| src[i]));
        }
        Ok(())
    }

    /// Renders the input topology in the flat column layout, for merging
    /// features back next to the neighbor data they came from.
    pub fn from_topology(topology: &NeighborTopology) -> Self {
        let limit = topology.neighbor_limit;
        let mut columns = vec![topology.column_name(TopologyColumn::NeighborCount, 0)];
        let families: Vec<TopologyColumn> = [
            TopologyColumn::NeighborId,
            TopologyColumn::NeighborEdge,
            TopologyColumn::NeighborArea,
            TopologyColumn::NeighborVolume,
            TopologyColumn::NeighborDistance,
        ]
        .into_iter()
        .filter(|&c| topology.has(c))
        .collect();

        for &family in &families {
            columns.extend((0..limit).map(|slot| topology.column_name(family, slot)));
        }

        let rows = topology
            .records
            .iter()
            .map(|rec| {
                let mut row = Vec::with_capacity(columns.len());
                row.push(rec.n_neighbors as f64);
                for &family in &families {
                    for slot in 0..limit {
                        let value = match family {
                            TopologyColumn::NeighborId => rec.ids.get(slot).map(|&v| v as f64),
                            TopologyColumn::NeighborEdge => {
                                rec.edges.get(slot).map(|&v| v as f64)
                            }
                            TopologyColumn::NeighborArea => rec.areas.get(slot).copied(),
                            TopologyColumn::NeighborVolume => rec.volumes.get(slot).copied(),
                            TopologyColumn::NeighborDistance => rec.distances.get(slot).copied(),
                            TopologyColumn::NeighborCount => None,
                        };
                        row.push(value.unwrap_or(0.0));
                    }
                }
                row
            })
            .collect();

        Self {
            ids: topology.atom_ids.clone(),
            columns,
            rows,
        }
    }

    /// Writes `id,<columns...>` CSV. Names containing commas are quoted.
    pub fn write_csv<W: Write>(&self, mut w: W) -> io::Result<()> {
        let quote = |s: &str| {
            if s.contains(',') || s.contains('"') {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.to_string()
            }
        };

        let header: Vec<String> = std::iter::once("id".to_string())
            .chain(self.columns.iter().map(|c| quote(c)))
            .collect();
        writeln!(w, "{}", header.join(","))?;

        for (id, row) in self.ids.iter().zip(&self.rows) {
            let line: Vec<String> = std::iter::once(id.to_string())
                .chain(row.iter().map(|v| v.to_string()))
                .collect();
            writeln!(w, "{}", line.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::topology::{NeighborRecord, Provider};

    fn table(columns: &[&str], rows: Vec<Vec<f64>>) -> FeatureTable {
        FeatureTable::new(
            (1..=rows.len() as i64).collect(),
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = FeatureTable::new(vec![1, 2], vec!["a".into()], vec![vec![1.0], vec![]]);
        assert!(matches!(result, Err(SroError::RowMismatch { .. })));
    }

    #[test]
    fn test_merge_skips_existing_columns() {
        let mut left = table(&["a", "b"], vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let right = table(&["b", "c"], vec![vec![9.0, 5.0], vec![9.0, 6.0]]);
        left.merge(&right).unwrap();
        assert_eq!(left.columns, vec!["a", "b", "c"]);
        assert_eq!(left.rows[1], vec![3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_select_preserves_requested_order() {
        let t = table(&["a", "b", "c"], vec![vec![1.0, 2.0, 3.0]]);
        let s = t.select(&["c", "a"]).unwrap();
        assert_eq!(s.rows[0], vec![3.0, 1.0]);
        assert!(t.select(&["z"]).is_none());
    }

    #[test]
    fn test_from_topology_layout() {
        let mut topo = NeighborTopology::new(
            Provider::Voro,
            2,
            &[TopologyColumn::NeighborCount, TopologyColumn::NeighborEdge],
        );
        topo.push(
            7,
            NeighborRecord {
                n_neighbors: 1,
                edges: vec![5],
                ..Default::default()
            },
        );
        let t = FeatureTable::from_topology(&topo);
        assert_eq!(
            t.columns,
            vec!["n_neighbors_voro", "neighbor_edge_0_voro", "neighbor_edge_1_voro"]
        );
        assert_eq!(t.rows[0], vec![1.0, 5.0, 0.0]);
        assert_eq!(t.ids, vec![7]);
    }

    #[test]
    fn test_csv_quotes_motif_names() {
        let t = table(&["is <0,0,12,0,0> voro"], vec![vec![1.0]]);
        let mut out = Vec::new();
        t.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,\"is <0,0,12,0,0> voro\"\n1,1\n");
    }
}
