use serde::Serialize;

use super::collate::CollatedFile;
use super::model::{ParsedTable, StarValue};
use super::star::{read_table, ParseOptions};
use crate::error::{ParseError, ReportError};

// ---------------------------------------------------------------------------
// JobDataCube – iteration × class × parameter
// ---------------------------------------------------------------------------

/// One table per iteration, stacked in iteration order.
///
/// Axis 1 is the dense position in sorted order (`0..iteration_count()`); each
/// slot also remembers the iteration number parsed from its filename, which is
/// what plots put on the x axis. Axis 2 is the class, taken from row order.
#[derive(Debug, Clone)]
pub struct JobDataCube {
    table: String,
    iterations: Vec<u32>,
    class_count: usize,
    slots: Vec<ParsedTable>,
}

/// A per-class numeric trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSeries {
    pub parameter: String,
    /// Filename iteration number of each slot.
    pub iterations: Vec<u32>,
    /// `classes[c][i]` is class `c` at slot `i`.
    pub classes: Vec<Vec<f64>>,
}

impl ParameterSeries {
    /// `(iteration, value)` points of one class.
    pub fn points(&self, class: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.iterations
            .iter()
            .zip(&self.classes[class])
            .map(|(&it, &v)| (it as f64, v))
    }

    /// The same series with every value replaced by its log10. Non-positive
    /// values become non-finite and drop out of `value_range`.
    pub fn log10(&self) -> Self {
        Self {
            parameter: self.parameter.clone(),
            iterations: self.iterations.clone(),
            classes: self
                .classes
                .iter()
                .map(|c| c.iter().map(|v| v.log10()).collect())
                .collect(),
        }
    }

    /// Smallest and largest finite value over the given classes.
    pub fn value_range(&self, classes: &[usize]) -> Option<(f64, f64)> {
        classes
            .iter()
            .filter_map(|&c| self.classes.get(c))
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Parse `table_name` from every file, fail-fast, and stack the results.
pub fn build_cube(files: &[CollatedFile], table_name: &str) -> Result<JobDataCube, ReportError> {
    let tables = read_tables(files, table_name)?;
    stack_tables(files, table_name, tables)
}

/// Parse `table_name` from every file in order. The first bad file aborts.
pub fn read_tables(
    files: &[CollatedFile],
    table_name: &str,
) -> Result<Vec<(u32, ParsedTable)>, ReportError> {
    let mut tables = Vec::with_capacity(files.len());
    for file in files {
        let table = read_table(&file.path, table_name, ParseOptions::default())?;
        tables.push((file.iteration, table));
    }
    Ok(tables)
}

/// Stack tables read from `files`. Cube errors are reported against the
/// directory holding the files.
pub fn stack_tables(
    files: &[CollatedFile],
    table_name: &str,
    tables: Vec<(u32, ParsedTable)>,
) -> Result<JobDataCube, ReportError> {
    JobDataCube::from_tables(table_name, tables).map_err(|source| ReportError::Parse {
        path: files
            .first()
            .and_then(|f| f.path.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_default(),
        source,
    })
}

impl JobDataCube {
    /// Stack already parsed tables. All must have the same row count.
    pub fn from_tables(
        table_name: &str,
        tables: Vec<(u32, ParsedTable)>,
    ) -> Result<Self, ParseError> {
        let class_count = tables.first().map_or(0, |(_, t)| t.row_count());
        let mut iterations = Vec::with_capacity(tables.len());
        let mut slots = Vec::with_capacity(tables.len());

        for (iteration, table) in tables {
            if table.row_count() != class_count {
                return Err(ParseError::ClassCountMismatch {
                    iteration,
                    expected: class_count,
                    found: table.row_count(),
                });
            }
            iterations.push(iteration);
            slots.push(table);
        }

        Ok(Self {
            table: table_name.to_string(),
            iterations,
            class_count,
            slots,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Length of the iteration axis.
    pub fn iteration_count(&self) -> usize {
        self.slots.len()
    }

    /// Length of the class axis.
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Filename iteration number of every slot.
    pub fn iterations(&self) -> &[u32] {
        &self.iterations
    }

    /// Whether the first slot has this column.
    pub fn has_column(&self, column: &str) -> bool {
        self.slots
            .first()
            .is_some_and(|t| t.column(column).is_some())
    }

    /// Raw values of a column, one row-vector per iteration slot.
    pub fn get(&self, column: &str) -> Result<Vec<&[StarValue]>, ParseError> {
        self.slots
            .iter()
            .map(|t| {
                t.column(column)
                    .map(|c| c.values.as_slice())
                    .ok_or_else(|| ParseError::MissingColumn(column.to_string()))
            })
            .collect()
    }

    /// Per-class trajectory of a numeric column.
    pub fn graph(&self, column: &str) -> Result<ParameterSeries, ParseError> {
        let mut classes = vec![Vec::with_capacity(self.slots.len()); self.class_count];
        for table in &self.slots {
            for (class, value) in table.numeric(column)?.into_iter().enumerate() {
                classes[class].push(value);
            }
        }
        Ok(ParameterSeries {
            parameter: super::star::strip_index(column).to_string(),
            iterations: self.iterations.clone(),
            classes,
        })
    }
}
