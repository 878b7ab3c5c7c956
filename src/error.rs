use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Fatal errors: discovery, parsing, state
// ---------------------------------------------------------------------------

/// The files a job needs could not be found.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no files matching `{pattern}` in {}", dir.display())]
    NoMatchingFiles { dir: PathBuf, pattern: String },

    #[error("no pipeline descriptor (*_pipeline.star) in {}", dir.display())]
    NoDescriptor { dir: PathBuf },

    #[error("expected one pipeline descriptor in {}, found {count}", dir.display())]
    DescriptorCount { dir: PathBuf, count: usize },

    #[error("pipeline descriptor has no process name")]
    MissingProcessName,

    #[error("unsupported job type `{0}`")]
    UnknownJobType(String),

    #[error("invalid file pattern `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A STAR table could not be read into a [`ParsedTable`](crate::data::model::ParsedTable).
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("table `{0}` not found")]
    TableNotFound(String),

    #[error("line {line}: malformed header `{text}`")]
    MalformedHeader { line: usize, text: String },

    #[error("line {line}: expected {expected} columns, found {found}")]
    RowWidthMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: data line inside a single-record table")]
    UnexpectedData { line: usize },

    #[error("column `{0}` not present")]
    MissingColumn(String),

    #[error("column `{column}`, row {row}: `{value}` is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("iteration {iteration} has {found} classes, earlier iterations have {expected}")]
    ClassCountMismatch {
        iteration: u32,
        expected: usize,
        found: usize,
    },
}

/// An operation was called before the job reached the required stage.
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("`{operation}` needs {required}, job is {current}")]
    NotReady {
        operation: &'static str,
        required: &'static str,
        current: &'static str,
    },
}

/// Anything that aborts a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Non-fatal: external tools
// ---------------------------------------------------------------------------

/// Rendering or encoding failed. Callers log these and carry on.
#[derive(Debug, Error)]
pub enum ExternalToolError {
    #[error("{0} not found on PATH")]
    NotFound(&'static str),

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}")]
    ExitStatus {
        tool: &'static str,
        status: std::process::ExitStatus,
    },

    #[error("{tool} did not produce {}", path.display())]
    MissingOutput { tool: &'static str, path: PathBuf },

    #[error("writing {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
