use rkyv::{Archive, Deserialize, Serialize};

use super::{ALPHA, DELTA};
use crate::catalogs::table::ID_COLUMN;
use crate::catalogs::{ColumnType, Schema, Table, Value};
use crate::{McError, Result, SkyPosition};

/// State of one extension row relative to its master object
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Detection {
    /// The source catalog's row for this object
    Detected(Vec<Value>),
    /// Correlated against this object, no counterpart within radius
    Absent,
    /// Correlated, no counterpart, and the object lies outside the source's footprint
    OutOfCoverage,
    /// Object entered the master after this source was merged
    Unobserved,
}

impl Detection {
    pub fn label(&self) -> &'static str {
        match self {
            Detection::Detected(_) => "detected",
            Detection::Absent => "absent",
            Detection::OutOfCoverage => "out_of_coverage",
            Detection::Unobserved => "unobserved",
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Detection::Detected(_))
    }
}

/// Region of sky a source catalog is known to cover
pub trait Footprint {
    fn contains(&self, position: &SkyPosition) -> bool;
}

/// Rectangular footprint in (alpha, delta), bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyBox {
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub delta_min: f64,
    pub delta_max: f64,
}

impl Footprint for SkyBox {
    fn contains(&self, position: &SkyPosition) -> bool {
        (self.alpha_min..=self.alpha_max).contains(&position.alpha)
            && (self.delta_min..=self.delta_max).contains(&position.delta)
    }
}

/// A source catalog, row-aligned with the master catalog
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Extension {
    name: String,
    rc: f64,
    append: bool,
    schema: Schema,
    alpha_index: usize,
    delta_index: usize,
    pub(super) rows: Vec<Detection>,
}

impl Extension {
    pub(super) fn new(name: &str, rc: f64, append: bool, schema: Schema) -> Result<Self> {
        let locate = |column: &str| match schema.kind_of(column) {
            Some(ColumnType::Float) => schema
                .index_of(column)
                .ok_or_else(|| McError::MissingColumn(column.to_string())),
            Some(other) => Err(McError::ColumnType {
                name: column.to_string(),
                expected: ColumnType::Float.name(),
                found: other.name(),
            }),
            None => Err(McError::MissingColumn(column.to_string())),
        };
        let alpha_index = locate(ALPHA)?;
        let delta_index = locate(DELTA)?;

        Ok(Self {
            name: name.to_string(),
            rc,
            append,
            schema,
            alpha_index,
            delta_index,
            rows: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation radius of this source, degrees
    pub fn rc(&self) -> f64 {
        self.rc
    }

    /// Whether unmatched detections were added to the master
    pub fn append(&self) -> bool {
        self.append
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Detection] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn detected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_detected()).count()
    }

    /// Reported position at master row `row`, if detected there
    pub fn position(&self, row: usize) -> Option<SkyPosition> {
        match self.rows.get(row)? {
            Detection::Detected(values) => {
                let alpha = values.get(self.alpha_index)?.as_f64()?;
                let delta = values.get(self.delta_index)?.as_f64()?;
                Some(SkyPosition::new(alpha, delta))
            }
            _ => None,
        }
    }

    pub(super) fn pad(&mut self, len: usize) {
        if self.rows.len() < len {
            self.rows.resize(len, Detection::Unobserved);
        }
    }

    /// The detected rows as a plain table in the source's own schema
    pub fn source_table(&self) -> Result<Table> {
        Table::from_rows(
            self.schema.clone(),
            self.rows.iter().filter_map(|r| match r {
                Detection::Detected(values) => Some(values.clone()),
                _ => None,
            }),
        )
    }

    /// Export aligned with the master: `id`, `status`, then the source
    /// columns, with the source's own `id` renamed `source_id`.
    pub fn to_table(&self) -> Result<Table> {
        let mut fields = vec![
            (ID_COLUMN.to_string(), ColumnType::Int),
            ("status".to_string(), ColumnType::Text),
        ];
        fields.extend(self.schema.fields().iter().map(|f| {
            let name = if f.name == ID_COLUMN {
                "source_id".to_string()
            } else {
                f.name.clone()
            };
            (name, f.kind)
        }));
        let schema = Schema::new(fields)?;

        let mut table = Table::empty(schema);
        let width = self.schema.len();
        for (i, row) in self.rows.iter().enumerate() {
            let mut values = vec![Value::Int(i as i64 + 1), Value::Text(row.label().to_string())];
            match row {
                Detection::Detected(source) => values.extend(source.iter().cloned()),
                _ => values.extend(std::iter::repeat(Value::Null).take(width)),
            }
            table.push_row(values)?;
        }
        Ok(table)
    }
}
