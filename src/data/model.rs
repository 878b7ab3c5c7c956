use std::fmt;

use serde::Serialize;

use crate::error::ParseError;

// ---------------------------------------------------------------------------
// StarValue – a single cell in a STAR table
// ---------------------------------------------------------------------------

/// A STAR cell. Tokens that parse as floats become `Number`, the rest stay text
/// (image paths such as `Class3D/job012/run_it025_class001.mrc`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StarValue {
    Number(f64),
    Text(String),
}

impl StarValue {
    /// Classify a raw whitespace-delimited token.
    pub fn from_token(token: &str) -> Self {
        match token.parse::<f64>() {
            Ok(v) => StarValue::Number(v),
            Err(_) => StarValue::Text(token.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StarValue::Number(v) => Some(*v),
            StarValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StarValue::Text(s) => Some(s),
            StarValue::Number(_) => None,
        }
    }
}

impl fmt::Display for StarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StarValue::Number(v) => write!(f, "{v}"),
            StarValue::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Column / ParsedTable
// ---------------------------------------------------------------------------

/// Which of the two STAR table layouts a table was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableShape {
    /// `loop_` style: `_name #n` headers followed by one data line per row.
    RowMajor,
    /// `_name value` pairs, exactly one row.
    SingleRecord,
}

/// One named column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Field name without the leading underscore, or the raw header text when
    /// parsed with `keep_index`.
    pub name: String,
    /// The `#n` annotation, if the header carried one.
    pub index: Option<usize>,
    pub values: Vec<StarValue>,
}

/// A fully parsed STAR table. Immutable once built; every column has the same
/// number of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    name: String,
    shape: TableShape,
    columns: Vec<Column>,
}

impl ParsedTable {
    pub(crate) fn new(name: String, shape: TableShape, columns: Vec<Column>) -> Self {
        debug_assert!(columns
            .windows(2)
            .all(|w| w[0].values.len() == w[1].values.len()));
        Self {
            name,
            shape,
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> TableShape {
        self.shape
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows (classes, for a model-classes table).
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look a column up by field name. Matches with or without the leading
    /// underscore and index annotation, so it works in `keep_index` mode too.
    pub fn column(&self, name: &str) -> Option<&Column> {
        let wanted = super::star::strip_index(name);
        self.columns
            .iter()
            .find(|c| super::star::strip_index(&c.name) == wanted)
    }

    pub fn value(&self, column: &str, row: usize) -> Option<&StarValue> {
        self.column(column)?.values.get(row)
    }

    /// All values of a column as floats.
    pub fn numeric(&self, column: &str) -> Result<Vec<f64>, ParseError> {
        let col = self
            .column(column)
            .ok_or_else(|| ParseError::MissingColumn(column.to_string()))?;
        col.values
            .iter()
            .enumerate()
            .map(|(row, v)| {
                v.as_f64().ok_or_else(|| ParseError::NonNumeric {
                    column: column.to_string(),
                    row,
                    value: v.to_string(),
                })
            })
            .collect()
    }
}
