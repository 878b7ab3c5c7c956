//! Iteration reports for RELION processing jobs.
//!
//! Reads the per-iteration `*_model.star` files of a job, stacks the
//! `data_model_classes` table of each into an iteration × class cube, and
//! writes the per-class trajectories (distribution, resolution, accuracy) as a
//! plot document and CSV. Optionally drives ChimeraX and ffmpeg to render the
//! class volumes of every iteration into a movie.
//!
//! ```text
//! job_pipeline.star ──► Job (type, profile)
//! run_*_model.star  ──► collate ──► star ──► JobDataCube ──► report
//! run_*_class*.mrc  ──► collate ──► render (ChimeraX) ──► ffmpeg
//! ```

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod job;
pub mod render;
pub mod report;

pub use config::ReportConfig;
pub use data::cube::{build_cube, JobDataCube, ParameterSeries};
pub use data::model::{ParsedTable, StarValue};
pub use data::star::{parse_table, read_table, ParseOptions};
pub use error::{DiscoveryError, ExternalToolError, ParseError, ReportError, StateError};
pub use job::{Job, JobType};
