use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::job::MODEL_CLASSES_TABLE;
use crate::render::RenderConfig;
use crate::report::figures::PlotStyle;

/// Output directory used when none is given, relative to the job directory.
pub const DEFAULT_OUT_DIR: &str = "report";

/// Resolved settings of one report run. Written into `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub out_dir: PathBuf,
    /// STAR table the cube is built from.
    pub table: String,
    pub style: PlotStyle,
    /// 1-based class numbers to plot; empty means all.
    pub classes: Vec<usize>,
    /// Render one frame per iteration.
    pub frames: bool,
    /// Encode the frames into a movie (implies `frames`).
    pub movie: bool,
    pub fps: u32,
    pub render: RenderConfig,
}

impl ReportConfig {
    /// Defaults for a job directory: everything next to the job, no rendering.
    pub fn for_job(job_dir: &Path) -> Self {
        Self {
            out_dir: job_dir.join(DEFAULT_OUT_DIR),
            table: MODEL_CLASSES_TABLE.to_string(),
            style: PlotStyle::default(),
            classes: Vec::new(),
            frames: false,
            movie: false,
            fps: 4,
            render: RenderConfig::default(),
        }
    }

    pub fn wants_frames(&self) -> bool {
        self.frames || self.movie
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.out_dir.join("frames")
    }
}
