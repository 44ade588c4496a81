//! Whitespace-delimited ascii catalogs with an inline column header.
//!
//! A typical file:
//!
//! ```text
//! ##  comment
//! #<  id          int64
//! #<  alpha       float64
//! #<  delta       float64
//! #<  name        U20
//! 1   150.10001   2.20345   NGC_1   # trailing comment
//! 2   150.20002   2.21001   null
//! ```
//!
//! `#<` lines declare columns in order, other `#` lines are comments, and a
//! token containing `#` starts a comment for the rest of its line. Cells
//! spelled `null` are empty.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};

use super::table::{ColumnType, Schema, Table, Value};

const NULL_TOKEN: &str = "null";

/// Result of parsing ascii text
#[derive(Debug, Clone)]
pub struct AsciiCatalog {
    pub table: Table,
    pub comments: Vec<String>,
    /// Body lines that did not fit the header
    pub skipped: usize,
}

pub fn read_ascii<P: AsRef<Path>>(path: P) -> anyhow::Result<Table> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to open ascii catalog: {}", path.display()))?;
    let parsed =
        parse_ascii(&text).with_context(|| format!("parsing {}", path.display()))?;

    if parsed.skipped > 0 {
        tracing::warn!("{} lines not read in {}", parsed.skipped, path.display());
    }
    Ok(parsed.table)
}

pub fn parse_ascii(text: &str) -> anyhow::Result<AsciiCatalog> {
    let mut fields: Vec<(String, ColumnType)> = Vec::new();
    let mut comments = Vec::new();
    let mut body: Vec<Vec<&str>> = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };

        if *first == "#<" {
            if tokens.len() < 3 {
                bail!("malformed column declaration on line {}", line_num + 1);
            }
            let kind = ColumnType::from_type_name(tokens[2]).with_context(|| {
                format!("unknown column type '{}' on line {}", tokens[2], line_num + 1)
            })?;
            fields.push((tokens[1].to_string(), kind));
        } else if first.starts_with('#') {
            comments.push(line.to_string());
        } else {
            match tokens.iter().position(|t| t.contains('#')) {
                Some(j) => {
                    comments.push(tokens[j..].join(" "));
                    body.push(tokens[..j].to_vec());
                }
                None => body.push(tokens),
            }
        }
    }

    if fields.is_empty() {
        bail!("no '#<' column declarations found");
    }
    let schema = Schema::new(fields).context("invalid column declarations")?;

    let mut table = Table::empty(schema.clone());
    let mut skipped = 0;
    for tokens in body {
        let parsed = parse_row(&schema, &tokens);
        match parsed.and_then(|row| table.push_row(row).ok()) {
            Some(()) => {}
            None => skipped += 1,
        }
    }

    Ok(AsciiCatalog {
        table,
        comments,
        skipped,
    })
}

fn parse_row(schema: &Schema, tokens: &[&str]) -> Option<Vec<Value>> {
    if tokens.len() != schema.len() {
        return None;
    }
    schema
        .fields()
        .iter()
        .zip(tokens.iter())
        .map(|(field, token)| {
            if *token == NULL_TOKEN {
                return Some(Value::Null);
            }
            match field.kind {
                ColumnType::Int => token.parse::<i64>().ok().map(Value::Int),
                ColumnType::Float => token.parse::<f64>().ok().map(Value::Float),
                ColumnType::Text => Some(Value::Text(token.to_string())),
            }
        })
        .collect()
}

/// Render a table as ascii text, optionally with the `#<` header
pub fn format_ascii(table: &Table, header: bool) -> String {
    let mut out = String::new();

    if header {
        for field in table.schema().fields() {
            let _ = writeln!(out, "#<  {:<25} {}", field.name, field.kind.name());
        }
    }

    for row in table.rows() {
        let cells: Vec<String> = row.iter().map(format_cell).collect();
        out.push_str(&cells.join("   "));
        out.push('\n');
    }
    out
}

pub fn write_ascii<P: AsRef<Path>>(path: P, table: &Table, header: bool) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, format_ascii(table, header))
        .with_context(|| format!("Failed to write ascii catalog: {}", path.display()))
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Int(v) => format!("{:>6}", v),
        Value::Float(v) => format!("{:>16.10}", v),
        // Whitespace would split the cell on reading
        Value::Text(v) => v.split_whitespace().collect::<Vec<_>>().join("_"),
        Value::Null => NULL_TOKEN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = "\
##  This is a comment at the top of the file.
#<  col_1           int32
#<  col_2           float32
#<  col_3           float32
#<  col_4           U20
1       3.14159         2.71828         Feynman
2       2.71828         3.14159         Jefferson
##  Here is another comment randomly in the file.
3       3.13159         2.71828         Beethoven  # inline
4       oops            2.0             Broken
5       1.0             null            null
";

    #[test]
    fn test_parse_sample() {
        let parsed = parse_ascii(SAMPLE).expect("parsing");
        let table = &parsed.table;

        assert_eq!(table.len(), 4);
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.comments.len(), 3);
        assert_eq!(
            table.schema().names().collect::<Vec<_>>(),
            vec!["col_1", "col_2", "col_3", "col_4"]
        );
        assert_eq!(table.row(2)[3], Value::Text("Beethoven".into()));
        assert_eq!(table.row(3)[2], Value::Null);
        assert_relative_eq!(table.row(0)[1].as_f64().expect("float"), 3.14159);
    }

    #[test]
    fn test_header_required() {
        assert!(parse_ascii("1 2 3\n").is_err());
        assert!(parse_ascii("#<  a  complex64\n").is_err());
        assert!(parse_ascii("#<  a\n").is_err());
        assert!(parse_ascii("#<  a  int64\n#<  a  float64\n").is_err());
    }

    #[test]
    fn test_write_then_read() {
        let parsed = parse_ascii(SAMPLE).expect("parsing");
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("out.dat");

        write_ascii(&path, &parsed.table, true).expect("writing");
        let table = read_ascii(&path).expect("reading");
        assert_eq!(table.schema(), parsed.table.schema());
        assert_eq!(table.len(), parsed.table.len());
        assert_eq!(table.row(3)[2], Value::Null);
        assert_relative_eq!(table.row(1)[2].as_f64().expect("float"), 3.14159, epsilon = 1e-10);

        let body_only = format_ascii(&parsed.table, false);
        assert!(!body_only.contains("#<"));
        assert_eq!(body_only.lines().count(), 4);
    }

    #[test]
    fn test_text_cells_stay_single_tokens() {
        let schema = Schema::new(vec![("name", ColumnType::Text)]).expect("schema");
        let table = Table::from_rows(schema, vec![vec![Value::Text("Crab Nebula".into())]])
            .expect("table");
        let reparsed = parse_ascii(&format_ascii(&table, true)).expect("parsing");
        assert_eq!(reparsed.table.row(0)[0], Value::Text("Crab_Nebula".into()));
    }
}
