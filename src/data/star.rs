use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::model::{Column, ParsedTable, StarValue, TableShape};
use crate::error::{ParseError, ReportError};

/// Every table marker starts with this prefix (`data_model_classes`, `data_`).
pub const TABLE_PREFIX: &str = "data_";

const FIELD_MARKER: char = '_';
const LOOP_MARKER: &str = "loop_";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Keep row-major headers verbatim (`_rlnClassDistribution #2`) instead of
    /// the bare field name.
    pub keep_index: bool,
}

/// Strip the leading underscore and any `#n` annotation from a header.
///
/// `strip_index("_rlnClassDistribution #2") == "rlnClassDistribution"`
pub fn strip_index(header: &str) -> &str {
    let before = header.split_once('#').map_or(header, |(name, _)| name);
    before
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_start_matches(FIELD_MARKER)
}

/// Parse the table called `table_name` out of a whole STAR document.
///
/// The table is found by exact equality of a line's first token, so asking for
/// `data_model` never matches `data_model_classes`.
pub fn parse_table(
    content: &str,
    table_name: &str,
    options: ParseOptions,
) -> Result<ParsedTable, ParseError> {
    let mut parser = TableParser::new(table_name, options);
    for (i, line) in content.lines().enumerate() {
        if parser.feed(i + 1, line)? == Flow::Done {
            break;
        }
    }
    parser.finish()
}

/// Read one table from a STAR file on disk. Reading stops as soon as the table
/// ends, the rest of the file is never touched.
pub fn read_table(
    path: &Path,
    table_name: &str,
    options: ParseOptions,
) -> Result<ParsedTable, ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parse_err = |source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut parser = TableParser::new(table_name, options);
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if parser.feed(i + 1, &line).map_err(parse_err)? == Flow::Done {
            break;
        }
    }
    log::debug!("read {} from {}", table_name, path.display());
    parser.finish().map_err(parse_err)
}

// ---------------------------------------------------------------------------
// Line-driven parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Searching,
    Headers,
    Rows,
}

struct TableParser<'a> {
    table_name: &'a str,
    options: ParseOptions,
    stage: Stage,
    in_loop: bool,
    shape: Option<TableShape>,
    columns: Vec<Column>,
}

impl<'a> TableParser<'a> {
    fn new(table_name: &'a str, options: ParseOptions) -> Self {
        Self {
            table_name,
            options,
            stage: Stage::Searching,
            in_loop: false,
            shape: None,
            columns: Vec::new(),
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) -> Result<Flow, ParseError> {
        let trimmed = line.trim();
        let first = trimmed.split_whitespace().next();

        if self.stage == Stage::Searching {
            if first == Some(self.table_name) {
                self.stage = Stage::Headers;
            }
            return Ok(Flow::Continue);
        }

        // Any other table marker closes ours.
        if first.is_some_and(|tok| tok.starts_with(TABLE_PREFIX)) {
            return Ok(Flow::Done);
        }

        // Blank lines between the marker and the first header are padding;
        // once headers have started, a blank line closes the table.
        if trimmed.is_empty() {
            return Ok(if self.columns.is_empty() {
                Flow::Continue
            } else {
                Flow::Done
            });
        }

        if trimmed.starts_with('#') {
            return Ok(Flow::Continue);
        }

        if trimmed == LOOP_MARKER {
            if !self.columns.is_empty() {
                return Err(malformed(line_no, trimmed));
            }
            self.in_loop = true;
            return Ok(Flow::Continue);
        }

        if trimmed.starts_with(FIELD_MARKER) {
            if self.stage == Stage::Rows {
                return Err(malformed(line_no, trimmed));
            }
            self.push_header(line_no, trimmed)?;
            return Ok(Flow::Continue);
        }

        self.push_row(line_no, trimmed)?;
        Ok(Flow::Continue)
    }

    fn push_header(&mut self, line_no: usize, header: &str) -> Result<(), ParseError> {
        let tokens: Vec<&str> = header.split_whitespace().collect();
        let name = tokens[0].trim_start_matches(FIELD_MARKER);
        if name.is_empty() {
            return Err(malformed(line_no, header));
        }

        let rest = &tokens[1..];
        let (shape, column) = match rest.first() {
            // Neither a `#n` index nor a value.
            None => return Err(malformed(line_no, header)),
            Some(tok) if tok.starts_with('#') => {
                let index = parse_index(rest).ok_or_else(|| malformed(line_no, header))?;
                let name = if self.options.keep_index {
                    header.to_string()
                } else {
                    name.to_string()
                };
                (
                    TableShape::RowMajor,
                    Column {
                        name,
                        index: Some(index),
                        values: Vec::new(),
                    },
                )
            }
            Some(_) => {
                if self.in_loop {
                    return Err(malformed(line_no, header));
                }
                // Value is the last token before any trailing comment.
                let value = rest
                    .iter()
                    .take_while(|tok| !tok.starts_with('#'))
                    .last()
                    .ok_or_else(|| malformed(line_no, header))?;
                (
                    TableShape::SingleRecord,
                    Column {
                        name: name.to_string(),
                        index: None,
                        values: vec![StarValue::from_token(value)],
                    },
                )
            }
        };

        match self.shape {
            Some(existing) if existing != shape => return Err(malformed(line_no, header)),
            _ => self.shape = Some(shape),
        }
        self.columns.push(column);
        Ok(())
    }

    fn push_row(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        if self.shape == Some(TableShape::SingleRecord) || self.columns.is_empty() {
            return Err(ParseError::UnexpectedData { line: line_no });
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != self.columns.len() {
            return Err(ParseError::RowWidthMismatch {
                line: line_no,
                expected: self.columns.len(),
                found: tokens.len(),
            });
        }
        for (column, token) in self.columns.iter_mut().zip(tokens) {
            column.values.push(StarValue::from_token(token));
        }
        self.stage = Stage::Rows;
        Ok(())
    }

    fn finish(self) -> Result<ParsedTable, ParseError> {
        if self.stage == Stage::Searching {
            return Err(ParseError::TableNotFound(self.table_name.to_string()));
        }
        Ok(ParsedTable::new(
            self.table_name.to_string(),
            self.shape.unwrap_or(TableShape::RowMajor),
            self.columns,
        ))
    }
}

/// `#3` or `# 3`.
fn parse_index(rest: &[&str]) -> Option<usize> {
    let digits = rest[0].trim_start_matches('#');
    let digits = if digits.is_empty() { *rest.get(1)? } else { digits };
    digits.parse().ok()
}

fn malformed(line: usize, text: &str) -> ParseError {
    ParseError::MalformedHeader {
        line,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_STAR: &str = "
# version 30001

data_model_general

_rlnReferenceDimensionality                        3
_rlnCurrentResolution                            4.5
_rlnAveragePmax                                  0.8

# version 30001

data_model_classes

loop_
_rlnReferenceImage #1
_rlnClassDistribution #2
_rlnAccuracyRotations #3
_rlnEstimatedResolution #4
Class3D/job012/run_it025_class001.mrc   0.352941     3.143000     9.142857
Class3D/job012/run_it025_class002.mrc   0.411765     2.981000     8.533333
Class3D/job012/run_it025_class003.mrc   0.235294     4.022000    12.800000

# version 30001

data_model_class_1

loop_
_rlnSpectralIndex #1
_rlnResolution #2
0 0.000000
1 0.005000
";

    #[test]
    fn row_major_table() {
        let t = parse_table(MODEL_STAR, "data_model_classes", ParseOptions::default()).unwrap();
        assert_eq!(t.shape(), TableShape::RowMajor);
        assert_eq!(t.column_count(), 4);
        assert_eq!(t.row_count(), 3);
        assert_eq!(
            t.column_names(),
            vec![
                "rlnReferenceImage",
                "rlnClassDistribution",
                "rlnAccuracyRotations",
                "rlnEstimatedResolution"
            ]
        );
        assert_eq!(
            t.numeric("rlnEstimatedResolution").unwrap(),
            vec![9.142857, 8.533333, 12.8]
        );
        assert_eq!(t.columns()[1].index, Some(2));
        assert_eq!(
            t.value("rlnReferenceImage", 2).and_then(|v| v.as_str()),
            Some("Class3D/job012/run_it025_class003.mrc")
        );
    }

    #[test]
    fn single_record_table() {
        let t = parse_table(MODEL_STAR, "data_model_general", ParseOptions::default()).unwrap();
        assert_eq!(t.shape(), TableShape::SingleRecord);
        assert_eq!(t.row_count(), 1);
        assert_eq!(t.numeric("rlnCurrentResolution").unwrap(), vec![4.5]);
        assert_eq!(t.numeric("rlnAveragePmax").unwrap(), vec![0.8]);
        assert_eq!(t.column_count(), 3);
    }

    #[test]
    fn single_record_without_surroundings() {
        let content = "data_model_general\n_rlnCurrentResolution 4.5\n_rlnAveragePmax 0.8\n";
        let t = parse_table(content, "data_model_general", ParseOptions::default()).unwrap();
        assert_eq!(t.column_names(), vec!["rlnCurrentResolution", "rlnAveragePmax"]);
        assert_eq!(t.value("rlnCurrentResolution", 0), Some(&StarValue::Number(4.5)));
        assert_eq!(t.value("rlnAveragePmax", 0), Some(&StarValue::Number(0.8)));
    }

    #[test]
    fn prefix_of_another_table_is_not_found() {
        let err = parse_table(MODEL_STAR, "data_model", ParseOptions::default()).unwrap_err();
        assert_eq!(err, ParseError::TableNotFound("data_model".into()));
    }

    #[test]
    fn last_table_runs_to_eof() {
        let t = parse_table(MODEL_STAR, "data_model_class_1", ParseOptions::default()).unwrap();
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.numeric("rlnResolution").unwrap(), vec![0.0, 0.005]);
    }

    #[test]
    fn next_marker_ends_table_without_blank_line() {
        let content = "data_a\n_x #1\n1\n2\ndata_b\n_x #1\n3\n";
        let t = parse_table(content, "data_a", ParseOptions::default()).unwrap();
        assert_eq!(t.numeric("x").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn row_width_mismatch_aborts() {
        let content = "data_model_classes\nloop_\n_a #1\n_b #2\n1 2\n3\n";
        let err = parse_table(content, "data_model_classes", ParseOptions::default()).unwrap_err();
        assert_eq!(
            err,
            ParseError::RowWidthMismatch {
                line: 6,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn bad_index_annotation_is_malformed() {
        let content = "data_t\nloop_\n_a #one\n1\n";
        let err = parse_table(content, "data_t", ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { line: 3, .. }));
    }

    #[test]
    fn loop_header_without_index_is_malformed() {
        let content = "data_t\nloop_\n_a\n_b\n1 2\n";
        let err = parse_table(content, "data_t", ParseOptions::default()).unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedHeader {
                line: 3,
                text: "_a".into()
            }
        );

        // A bare field name outside a loop has no value either.
        let err = parse_table("data_t\n_a\n", "data_t", ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { line: 2, .. }));
    }

    #[test]
    fn mixed_header_shapes_are_malformed() {
        let content = "data_t\n_a #1\n_b 4.5\n";
        let err = parse_table(content, "data_t", ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { line: 3, .. }));
    }

    #[test]
    fn data_line_in_single_record_table() {
        let content = "data_t\n_a 1\n_b 2\n3 4\n";
        let err = parse_table(content, "data_t", ParseOptions::default()).unwrap_err();
        assert_eq!(err, ParseError::UnexpectedData { line: 4 });
    }

    #[test]
    fn keep_index_preserves_annotation() {
        let opts = ParseOptions { keep_index: true };
        let t = parse_table(MODEL_STAR, "data_model_classes", opts).unwrap();
        assert_eq!(t.column_names()[1], "_rlnClassDistribution #2");
        // Lookups by bare name still work.
        assert_eq!(t.numeric("rlnClassDistribution").unwrap().len(), 3);
    }

    #[test]
    fn strip_index_recovers_field_name() {
        for (i, name) in ["rlnClassDistribution", "rlnAccuracyRotations", "a"].iter().enumerate() {
            let annotated = format!("_{name} #{}", i + 1);
            assert_eq!(strip_index(&annotated), *name);
        }
        assert_eq!(strip_index("rlnX"), "rlnX");
        assert_eq!(strip_index("_rlnX #"), "rlnX");
    }

    #[test]
    fn row_count_matches_data_lines() {
        for rows in 0..5 {
            let mut content = String::from("data_t\nloop_\n_a #1\n_b #2\n_c #3\n");
            for r in 0..rows {
                content.push_str(&format!("{r} {r}.5 x{r}\n"));
            }
            content.push_str("\n99 99 99\n");
            let t = parse_table(&content, "data_t", ParseOptions::default()).unwrap();
            assert_eq!(t.row_count(), rows);
            assert_eq!(t.column_count(), 3);
        }
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_it025_model.star");
        std::fs::write(&path, MODEL_STAR).unwrap();
        let t = read_table(&path, "data_model_classes", ParseOptions::default()).unwrap();
        assert_eq!(t.row_count(), 3);

        let err = read_table(&path, "data_optics", ParseOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Parse {
                source: ParseError::TableNotFound(_),
                ..
            }
        ));
    }
}
