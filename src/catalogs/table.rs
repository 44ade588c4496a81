//! Column-oriented tables with an explicit schema.
//!
//! Every table carries an ordered list of named, typed columns that is
//! validated when the table is built. Cells are nullable; a missing value
//! is `None`/`Value::Null`, never a magic number.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use super::SkyPosition;
use crate::{McError, Result};

/// Name of the identifier column
pub const ID_COLUMN: &str = "id";

#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Text,
}

impl ColumnType {
    /// Type name as written in ascii table headers
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Int => "int64",
            ColumnType::Float => "float64",
            ColumnType::Text => "str",
        }
    }

    /// Parse a numpy-style type name ("int32", "float64", "U20", ...)
    pub fn from_type_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("int") || lower.starts_with("uint") {
            Some(ColumnType::Int)
        } else if lower.starts_with("float") {
            Some(ColumnType::Float)
        } else if lower.starts_with("str") || lower.starts_with('u') || lower.starts_with('s') {
            Some(ColumnType::Text)
        } else {
            None
        }
    }
}

/// A single cell
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => ColumnType::Int.name(),
            Value::Float(_) => ColumnType::Float.name(),
            Value::Text(_) => ColumnType::Text.name(),
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Null => write!(f, "null"),
        }
    }
}

#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: ColumnType,
}

/// Ordered list of (name, type) pairs
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new<S: Into<String>>(fields: Vec<(S, ColumnType)>) -> Result<Self> {
        let fields: Vec<Field> = fields
            .into_iter()
            .map(|(name, kind)| Field {
                name: name.into(),
                kind,
            })
            .collect();

        if fields.is_empty() {
            return Err(McError::Schema("schema has no columns".to_string()));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(McError::Schema(format!("column {} has an empty name", i)));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(McError::Schema(format!(
                    "duplicate column name '{}'",
                    field.name
                )));
            }
        }

        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnType> {
        self.index_of(name).map(|i| self.fields[i].kind)
    }

    /// New schema with `name` inserted as the first column
    pub fn prepend(&self, name: &str, kind: ColumnType) -> Result<Self> {
        let mut fields = vec![(name.to_string(), kind)];
        fields.extend(self.fields.iter().map(|f| (f.name.clone(), f.kind)));
        Schema::new(fields)
    }
}

/// Typed, nullable column storage
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn empty(kind: ColumnType) -> Self {
        match kind {
            ColumnType::Int => Column::Int(Vec::new()),
            ColumnType::Float => Column::Float(Vec::new()),
            ColumnType::Text => Column::Text(Vec::new()),
        }
    }

    pub fn kind(&self) -> ColumnType {
        match self {
            Column::Int(_) => ColumnType::Int,
            Column::Float(_) => ColumnType::Float,
            Column::Text(_) => ColumnType::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Value {
        match self {
            Column::Int(v) => v[index].map(Value::Int).unwrap_or(Value::Null),
            Column::Float(v) => v[index].map(Value::Float).unwrap_or(Value::Null),
            Column::Text(v) => v[index].clone().map(Value::Text).unwrap_or(Value::Null),
        }
    }

    /// Integers widen into float columns; everything else must match exactly.
    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Column::Int(_), Value::Int(_))
                | (Column::Float(_), Value::Float(_))
                | (Column::Float(_), Value::Int(_))
                | (Column::Text(_), Value::Text(_))
        )
    }

    fn push(&mut self, value: Value) {
        match (self, value) {
            (Column::Int(v), Value::Int(x)) => v.push(Some(x)),
            (Column::Int(v), _) => v.push(None),
            (Column::Float(v), Value::Float(x)) => v.push(Some(x)),
            (Column::Float(v), Value::Int(x)) => v.push(Some(x as f64)),
            (Column::Float(v), _) => v.push(None),
            (Column::Text(v), Value::Text(x)) => v.push(Some(x)),
            (Column::Text(v), _) => v.push(None),
        }
    }

    fn select(&self, indices: &[usize]) -> Column {
        match self {
            Column::Int(v) => Column::Int(indices.iter().map(|&i| v[i]).collect()),
            Column::Float(v) => Column::Float(indices.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(indices.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    fn extend_from(&mut self, other: &Column) {
        match (self, other) {
            (Column::Int(a), Column::Int(b)) => a.extend_from_slice(b),
            (Column::Float(a), Column::Float(b)) => a.extend_from_slice(b),
            (Column::Text(a), Column::Text(b)) => a.extend(b.iter().cloned()),
            // Callers compare schemas first
            _ => unreachable!("column kinds differ"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    columns: Vec<Column>,
    len: usize,
}

impl Table {
    /// Build a table, validating column count, types and lengths against the schema
    pub fn new(schema: Schema, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(McError::SizeMismatch {
                what: "schema fields and columns",
                left: schema.len(),
                right: columns.len(),
            });
        }

        for (field, column) in schema.fields().iter().zip(columns.iter()) {
            if field.kind != column.kind() {
                return Err(McError::ColumnType {
                    name: field.name.clone(),
                    expected: field.kind.name(),
                    found: column.kind().name(),
                });
            }
        }

        let len = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != len) {
            return Err(McError::SizeMismatch {
                what: "column lengths",
                left: len,
                right: bad.len(),
            });
        }

        Ok(Self {
            schema,
            columns,
            len,
        })
    }

    pub fn empty(schema: Schema) -> Self {
        let columns = schema.fields().iter().map(|f| Column::empty(f.kind)).collect();
        Self {
            schema,
            columns,
            len: 0,
        }
    }

    pub fn from_rows<I>(schema: Schema, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let mut table = Table::empty(schema);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.index_of(name).map(|i| &self.columns[i])
    }

    pub fn floats(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name) {
            Some(Column::Float(values)) => Ok(values),
            Some(other) => Err(McError::ColumnType {
                name: name.to_string(),
                expected: ColumnType::Float.name(),
                found: other.kind().name(),
            }),
            None => Err(McError::MissingColumn(name.to_string())),
        }
    }

    /// Sky positions from two float columns; any null, NaN or infinite cell is an error
    pub fn positions(&self, x_col: &str, y_col: &str) -> Result<Vec<SkyPosition>> {
        let xs = self.floats(x_col)?;
        let ys = self.floats(y_col)?;
        xs.iter()
            .zip(ys.iter())
            .enumerate()
            .map(|(row, (x, y))| match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    Ok(SkyPosition::new(*x, *y))
                }
                (Some(_), Some(_)) => Err(McError::NonFinitePosition { row }),
                _ => Err(McError::NullPosition { row }),
            })
            .collect()
    }

    /// Values of row `index` in schema order. Panics if out of range.
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.get(index)).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.len).map(|i| self.row(i))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(McError::SizeMismatch {
                what: "row width and schema",
                left: row.len(),
                right: self.schema.len(),
            });
        }

        for ((field, column), value) in self
            .schema
            .fields()
            .iter()
            .zip(self.columns.iter())
            .zip(row.iter())
        {
            if !column.accepts(value) {
                return Err(McError::ColumnType {
                    name: field.name.clone(),
                    expected: field.kind.name(),
                    found: value.type_name(),
                });
            }
        }

        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
        self.len += 1;
        Ok(())
    }

    /// New table holding the rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Table {
        Table {
            schema: self.schema.clone(),
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
            len: indices.len(),
        }
    }

    /// Append all rows of `other`, which must have an identical schema
    pub fn concat(&mut self, other: &Table) -> Result<()> {
        if self.schema != other.schema {
            return Err(McError::Schema(
                "cannot concatenate tables with different schemas".to_string(),
            ));
        }
        for (column, extra) in self.columns.iter_mut().zip(other.columns.iter()) {
            column.extend_from(extra);
        }
        self.len += other.len;
        Ok(())
    }

    /// Ensure an `id` column exists, prepending sequential 1-based ids when absent
    pub fn with_id_column(self) -> Result<Table> {
        if self.schema.index_of(ID_COLUMN).is_some() {
            return Ok(self);
        }

        let schema = self.schema.prepend(ID_COLUMN, ColumnType::Int)?;
        let ids = Column::Int((1..=self.len as i64).map(Some).collect());
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(ids);
        columns.extend(self.columns);
        Table::new(schema, columns)
    }
}
