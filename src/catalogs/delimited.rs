//! Comma-separated catalogs.
//!
//! The header row names the columns. Column types are inferred from the
//! data: a column is `Int` when every non-empty cell parses as an integer,
//! `Float` when every non-empty cell parses as a float, and `Text`
//! otherwise. Empty cells are null.

use std::path::Path;

use anyhow::Context;

use super::table::{Column, Schema, Table};

pub fn read_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Table> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("Failed to open CSV catalog: {}", path.display()))?;

    let names: Vec<String> = rdr
        .headers()
        .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for (line, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("Failed to read record {} of {}", line + 1, path.display()))?;
        for (column, cell) in cells.iter_mut().zip(record.iter()) {
            column.push(cell.to_string());
        }
    }

    let columns: Vec<Column> = cells.iter().map(|c| infer_column(c)).collect();
    let schema = Schema::new(
        names
            .into_iter()
            .zip(columns.iter())
            .map(|(name, column)| (name, column.kind()))
            .collect(),
    )
    .with_context(|| format!("Invalid CSV header in {}", path.display()))?;

    let table = Table::new(schema, columns)?;
    tracing::debug!("read {} rows from {}", table.len(), path.display());
    Ok(table)
}

fn infer_column(cells: &[String]) -> Column {
    let present = || cells.iter().filter(|c| !c.is_empty());

    if present().all(|c| c.parse::<i64>().is_ok()) {
        Column::Int(cells.iter().map(|c| c.parse().ok()).collect())
    } else if present().all(|c| c.parse::<f64>().is_ok()) {
        Column::Float(cells.iter().map(|c| c.parse().ok()).collect())
    } else {
        Column::Text(
            cells
                .iter()
                .map(|c| (!c.is_empty()).then(|| c.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogs::{ColumnType, Value};

    #[test]
    fn test_infers_types_and_nulls() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("survey.csv");
        std::fs::write(
            &path,
            "# exported survey\n\
             id, alpha, delta, name, flux\n\
             1, 150.1, 2.2, first, 10\n\
             2, 150.2, 2.3, , 11.5\n\
             3, 150, 2.4, third,\n",
        )
        .expect("writing csv");

        let table = read_csv(&path).expect("reading csv");
        assert_eq!(table.len(), 3);
        let kinds: Vec<ColumnType> = table.schema().fields().iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnType::Int,
                ColumnType::Float,
                ColumnType::Float,
                ColumnType::Text,
                ColumnType::Float
            ]
        );
        assert_eq!(table.row(1)[3], Value::Null);
        assert_eq!(table.row(2)[4], Value::Null);
        assert_eq!(table.row(2)[1], Value::Float(150.0));
    }

    #[test]
    fn test_infer_column() {
        let kind = |v: &[&str]| {
            let cells: Vec<String> = v.iter().map(|s| s.to_string()).collect();
            infer_column(&cells).kind()
        };
        assert_eq!(kind(&["1", "", "-3"]), ColumnType::Int);
        assert_eq!(kind(&["1", "2.5"]), ColumnType::Float);
        assert_eq!(kind(&["1", "x"]), ColumnType::Text);
    }

    #[test]
    fn test_errors() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        assert!(read_csv(dir.path().join("missing.csv")).is_err());

        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").expect("writing csv");
        assert!(read_csv(&path).is_err());

        let path = dir.path().join("dup.csv");
        std::fs::write(&path, "a,a\n1,2\n").expect("writing csv");
        assert!(read_csv(&path).is_err());
    }
}
