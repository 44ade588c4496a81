//! The master catalog: one row per physical object, merged from any number
//! of source catalogs.
//!
//! Each source catalog is stored as an [`Extension`] whose rows line up
//! one-to-one with the master rows. The master position of an object comes
//! from the source with the tightest correlation radius that detected it;
//! `matches` counts the sources that detected it and `S` is their mean
//! separation from that position.

mod extension;
pub mod store;

pub use extension::{Detection, Extension, Footprint, SkyBox};

use rkyv::{Archive, Deserialize, Serialize};

use crate::catalogs::{ColumnType, Schema, SkyKdTree, Table, Value};
use crate::correlation::{correlate, MatchOptions, Radius};
use crate::progress::Progress;
use crate::{McError, Result, SkyPosition};

/// Position column names every source catalog must provide
pub const ALPHA: &str = "alpha";
pub const DELTA: &str = "delta";

#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MasterRow {
    /// 1-based, reissued on every update
    pub id: u64,
    pub position: Option<SkyPosition>,
    /// Radius of the source currently providing `position`
    pub rc: Option<f64>,
    /// Number of sources with a detection
    pub matches: u32,
    /// Mean separation of the detections from `position`; `None` unless
    /// at least two sources detected the object
    pub mean_separation: Option<f64>,
}

/// Counts from one `add_catalog` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub matched: usize,
    pub appended: usize,
    pub discarded: usize,
}

/// Nearest other object in the master catalog
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: u64,
    pub separation: f64,
}

#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MasterCatalog {
    rows: Vec<MasterRow>,
    extensions: Vec<Extension>,
}

impl MasterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[MasterRow] {
        &self.rows
    }

    /// Extensions in registration order
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub fn extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name() == name)
    }

    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    /// Correlate `catalog` against the master and register it as extension `name`.
    ///
    /// Each master row is matched within its current radius, floored at `rc`
    /// (degrees), so a tighter source can take over positions. With `append`
    /// the catalog's unmatched rows become new master objects; otherwise they
    /// are discarded. Ends with [`MasterCatalog::update`].
    pub fn add_catalog(
        &mut self,
        name: &str,
        catalog: &Table,
        rc: f64,
        append: bool,
    ) -> Result<MergeSummary> {
        if self.extension(name).is_some() {
            return Err(McError::DuplicateExtension(name.to_string()));
        }

        let catalog = catalog.clone().with_id_column()?;
        let mut extension = Extension::new(name, rc, append, catalog.schema().clone())?;
        let candidates = catalog.positions(ALPHA, DELTA)?;

        let (reference_rows, reference): (Vec<usize>, Vec<SkyPosition>) = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.position.map(|p| (i, p)))
            .unzip();
        let radii: Vec<f64> = reference_rows
            .iter()
            .map(|&i| self.rows[i].rc.unwrap_or(rc))
            .collect();
        let options = MatchOptions {
            min_radius: Some(rc),
            ..Default::default()
        };
        let result = correlate(&reference, &candidates, &Radius::PerPoint(radii), &options)?;

        let mut rows = vec![Detection::Absent; self.rows.len()];
        for (k, m) in result.matches().iter().enumerate() {
            if let Some(m) = m {
                rows[reference_rows[k]] = Detection::Detected(catalog.row(m.index));
            }
        }

        let unmatched = result.unmatched_candidates();
        if append {
            rows.extend(
                unmatched
                    .iter()
                    .map(|&j| Detection::Detected(catalog.row(j))),
            );
        }
        extension.rows = rows;

        let summary = MergeSummary {
            matched: result.matched_count(),
            appended: if append { unmatched.len() } else { 0 },
            discarded: if append { 0 } else { unmatched.len() },
        };
        tracing::info!(
            "{}: {} matched, {} new, {} discarded",
            name,
            summary.matched,
            summary.appended,
            summary.discarded
        );

        self.extensions.push(extension);
        self.update();
        Ok(summary)
    }

    /// Level all extensions to one length and recompute the master columns.
    ///
    /// Positions are rebuilt from scratch: for every row, the detection from
    /// the extension with the smallest radius is adopted, the first
    /// registered extension winning ties. Calling this twice in a row gives
    /// the same result.
    pub fn update(&mut self) {
        let n = self.extensions.iter().map(|e| e.len()).max().unwrap_or(0);

        self.rows.resize_with(n, MasterRow::default);
        for ext in self.extensions.iter_mut() {
            ext.pad(n);
        }

        for (i, row) in self.rows.iter_mut().enumerate() {
            row.id = i as u64 + 1;
            row.position = None;
            row.rc = None;

            for ext in self.extensions.iter() {
                let Some(position) = ext.position(i) else {
                    continue;
                };
                if row.rc.map_or(true, |current| current > ext.rc()) {
                    row.position = Some(position);
                    row.rc = Some(ext.rc());
                }
            }

            let Some(consensus) = row.position else {
                row.matches = 0;
                row.mean_separation = None;
                continue;
            };

            let (matches, total) = self
                .extensions
                .iter()
                .filter_map(|ext| ext.position(i))
                .fold((0u32, 0.0), |(count, sum), p| {
                    (count + 1, sum + p.separation(&consensus))
                });
            row.matches = matches;
            row.mean_separation = (matches > 1).then(|| total / f64::from(matches - 1));
        }
    }

    /// Drop extension `name` and rebuild the master from the remaining ones.
    ///
    /// Remaining extensions are re-merged in registration order from their
    /// detected rows, with their original radius and append setting.
    /// Coverage marks are not carried over.
    pub fn remove_catalog(&mut self, name: &str) -> Result<()> {
        let index = self
            .extensions
            .iter()
            .position(|e| e.name() == name)
            .ok_or_else(|| McError::UnknownExtension(name.to_string()))?;
        self.extensions.remove(index);

        let remaining = std::mem::take(&mut self.extensions);
        self.rows.clear();
        for ext in remaining.iter() {
            let source = ext.source_table()?;
            self.add_catalog(ext.name(), &source, ext.rc(), ext.append())?;
        }
        self.update();

        tracing::info!("removed {}; {} objects remain", name, self.rows.len());
        Ok(())
    }

    /// Mark non-detections of extension `name` whose master position falls
    /// outside `footprint` as `OutOfCoverage`. Returns how many changed.
    ///
    /// Both `Absent` and `Unobserved` rows are checked. Covered `Unobserved`
    /// rows stay as they are: the source was never correlated against them.
    pub fn mark_out_of_coverage<F: Footprint>(&mut self, name: &str, footprint: &F) -> Result<usize> {
        let rows = &self.rows;
        let ext = self
            .extensions
            .iter_mut()
            .find(|e| e.name() == name)
            .ok_or_else(|| McError::UnknownExtension(name.to_string()))?;

        let mut marked = 0;
        for (state, master) in ext.rows.iter_mut().zip(rows.iter()) {
            if !matches!(state, Detection::Absent | Detection::Unobserved) {
                continue;
            }
            if let Some(position) = master.position {
                if !footprint.contains(&position) {
                    *state = Detection::OutOfCoverage;
                    marked += 1;
                }
            }
        }
        Ok(marked)
    }

    /// For each master row, the nearest other object.
    pub fn find_neighbors(&self) -> Vec<Option<Neighbor>> {
        let (owners, positions): (Vec<usize>, Vec<SkyPosition>) = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.position.map(|p| (i, p)))
            .unzip();
        let mut slot_of = vec![None; self.rows.len()];
        for (slot, &row) in owners.iter().enumerate() {
            slot_of[row] = Some(slot);
        }
        let tree = SkyKdTree::build(positions);

        let mut progress = Progress::new("Finding neighbors...", self.rows.len());
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                progress.tick(i);
                let slot = slot_of[i]?;
                let position = row.position?;
                tree.nearest_where([position.alpha, position.delta], |j| j != slot)
                    .map(|(j, separation)| Neighbor {
                        id: self.rows[owners[j]].id,
                        separation,
                    })
            })
            .collect()
    }

    /// Master columns as a table: id, matches, alpha, delta, Rc, S
    pub fn master_table(&self) -> Result<Table> {
        let float = |v: Option<f64>| v.map(Value::Float).unwrap_or(Value::Null);
        Table::from_rows(
            master_schema()?,
            self.rows.iter().map(|row| {
                vec![
                    Value::Int(row.id as i64),
                    Value::Int(i64::from(row.matches)),
                    float(row.position.map(|p| p.alpha)),
                    float(row.position.map(|p| p.delta)),
                    float(row.rc),
                    float(row.mean_separation),
                ]
            }),
        )
    }

    pub fn extension_table(&self, name: &str) -> Result<Table> {
        self.extension(name)
            .ok_or_else(|| McError::UnknownExtension(name.to_string()))?
            .to_table()
    }
}

fn master_schema() -> Result<Schema> {
    Schema::new(vec![
        ("id", ColumnType::Int),
        ("matches", ColumnType::Int),
        (ALPHA, ColumnType::Float),
        (DELTA, ColumnType::Float),
        ("Rc", ColumnType::Float),
        ("S", ColumnType::Float),
    ])
}
