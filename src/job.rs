use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::data::collate::{collate_files, list_matching, CollatedFile, DEFAULT_RUN_PREFIX};
use crate::data::cube::{read_tables, stack_tables, JobDataCube, ParameterSeries};
use crate::data::model::ParsedTable;
use crate::data::star::{read_table, ParseOptions};
use crate::error::{DiscoveryError, ParseError, ReportError, StateError};

/// Per-class table of a `*_model.star` file.
pub const MODEL_CLASSES_TABLE: &str = "data_model_classes";

const DESCRIPTOR_PATTERN: &str = "*_pipeline.star";
const PROCESSES_TABLE: &str = "data_pipeline_processes";
const PROCESS_NAME_FIELD: &str = "rlnPipeLineProcessName";
const RUN_JOB_FILE: &str = "run.job";

// ---------------------------------------------------------------------------
// Parameters and profiles
// ---------------------------------------------------------------------------

/// A tracked quantity and how to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub title: &'static str,
    /// Candidate column names, first one present wins. RELION renamed some
    /// columns between releases.
    pub columns: &'static [&'static str],
    pub y_label: &'static str,
    pub log_scale: bool,
}

impl Parameter {
    /// The first candidate column the cube actually has.
    pub fn resolve(&self, cube: &JobDataCube) -> Option<&'static str> {
        self.columns.iter().copied().find(|c| cube.has_column(c))
    }
}

pub const CLASS_DISTRIBUTION: Parameter = Parameter {
    title: "Class distribution",
    columns: &["rlnClassDistribution"],
    y_label: "Fraction of particles",
    log_scale: false,
};

pub const RESOLUTION: Parameter = Parameter {
    title: "Estimated resolution",
    columns: &["rlnEstimatedResolution"],
    y_label: "Resolution (Å)",
    log_scale: false,
};

pub const REFINE_RESOLUTION: Parameter = Parameter {
    log_scale: true,
    ..RESOLUTION
};

pub const ACCURACY_ROTATIONS: Parameter = Parameter {
    title: "Rotational accuracy",
    columns: &["rlnAccuracyRotations"],
    y_label: "Accuracy (°)",
    log_scale: false,
};

pub const ACCURACY_TRANSLATIONS: Parameter = Parameter {
    title: "Translational accuracy",
    columns: &["rlnAccuracyTranslationsAngst", "rlnAccuracyTranslations"],
    y_label: "Accuracy (Å)",
    log_scale: false,
};

/// Everything that differs between job types, as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProfile {
    /// Glob selecting the model STAR files to read.
    pub model_pattern: &'static str,
    pub parameters: &'static [Parameter],
    /// Whether plots label each class.
    pub legend: bool,
}

const CLASS3D_PROFILE: JobProfile = JobProfile {
    model_pattern: "*_model.star",
    parameters: &[
        CLASS_DISTRIBUTION,
        RESOLUTION,
        ACCURACY_ROTATIONS,
        ACCURACY_TRANSLATIONS,
    ],
    legend: true,
};

// 2D runs have tens to hundreds of classes, a legend would bury the plot.
const CLASS2D_PROFILE: JobProfile = JobProfile {
    legend: false,
    ..CLASS3D_PROFILE
};

const REFINE3D_PROFILE: JobProfile = JobProfile {
    model_pattern: "*_half1_model.star",
    parameters: &[REFINE_RESOLUTION, ACCURACY_ROTATIONS, ACCURACY_TRANSLATIONS],
    legend: false,
};

const INITIAL_MODEL_PROFILE: JobProfile = JobProfile {
    model_pattern: "*_model.star",
    parameters: &[CLASS_DISTRIBUTION, RESOLUTION, ACCURACY_ROTATIONS],
    legend: true,
};

// ---------------------------------------------------------------------------
// Job types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobType {
    Class2D,
    Class3D,
    Refine3D,
    InitialModel,
}

impl JobType {
    /// Dispatch on the leading segment of a pipeline process name
    /// (`Class3D/job012/` → `Class3D`).
    pub fn from_process_name(process: &str) -> Result<Self, DiscoveryError> {
        let segment = process.split('/').next().unwrap_or_default();
        match segment {
            "Class2D" => Ok(JobType::Class2D),
            "Class3D" => Ok(JobType::Class3D),
            "Refine3D" => Ok(JobType::Refine3D),
            "InitialModel" => Ok(JobType::InitialModel),
            other => Err(DiscoveryError::UnknownJobType(other.to_string())),
        }
    }

    pub fn profile(self) -> &'static JobProfile {
        match self {
            JobType::Class2D => &CLASS2D_PROFILE,
            JobType::Class3D => &CLASS3D_PROFILE,
            JobType::Refine3D => &REFINE3D_PROFILE,
            JobType::InitialModel => &INITIAL_MODEL_PROFILE,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

enum JobState {
    Unbound,
    FileSetDiscovered {
        files: Vec<CollatedFile>,
    },
    TableRead {
        files: Vec<CollatedFile>,
        table: String,
        tables: Vec<(u32, ParsedTable)>,
    },
    CubeBuilt {
        files: Vec<CollatedFile>,
        cube: JobDataCube,
    },
}

impl JobState {
    fn label(&self) -> &'static str {
        match self {
            JobState::Unbound => "unbound",
            JobState::FileSetDiscovered { .. } => "discovered",
            JobState::TableRead { .. } => "table read",
            JobState::CubeBuilt { .. } => "cube built",
        }
    }

    fn files(&self) -> Option<&[CollatedFile]> {
        match self {
            JobState::Unbound => None,
            JobState::FileSetDiscovered { files }
            | JobState::TableRead { files, .. }
            | JobState::CubeBuilt { files, .. } => Some(files),
        }
    }
}

/// One RELION job directory.
///
/// Stages: `discover` → `read` → `build`; `graph` and `export` need the cube.
pub struct Job {
    dir: PathBuf,
    process_name: String,
    job_type: JobType,
    run_prefix: String,
    expected_classes: Option<usize>,
    state: JobState,
}

impl Job {
    /// Bind a job directory, reading its type from the pipeline descriptor.
    pub fn open(dir: &Path) -> Result<Self, ReportError> {
        let process_name = read_process_name(dir)?;
        let job_type = JobType::from_process_name(&process_name)?;
        log::info!("{} is a {job_type} job ({process_name})", dir.display());

        let mut job = Self::with_type(dir, job_type);
        job.process_name = process_name;
        job.expected_classes = read_class_count(&dir.join(RUN_JOB_FILE));
        Ok(job)
    }

    /// Bind a directory whose type is already known.
    pub fn with_type(dir: &Path, job_type: JobType) -> Self {
        Self {
            dir: dir.to_path_buf(),
            process_name: format!("{job_type}/"),
            job_type,
            run_prefix: DEFAULT_RUN_PREFIX.to_string(),
            expected_classes: None,
            state: JobState::Unbound,
        }
    }

    /// Discover, read the model-classes table, and build the cube.
    pub fn load(dir: &Path) -> Result<Self, ReportError> {
        let mut job = Self::open(dir)?;
        job.discover()?;
        job.read(MODEL_CLASSES_TABLE)?;
        job.build()?;
        Ok(job)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn profile(&self) -> &'static JobProfile {
        self.job_type.profile()
    }

    pub fn run_prefix(&self) -> &str {
        &self.run_prefix
    }

    /// `Class3D/job012/` → `Class3D_job012`, usable as a file stem.
    pub fn name(&self) -> String {
        self.process_name.trim_matches('/').replace('/', "_")
    }

    /// Class count declared in `run.job`, if present.
    pub fn expected_classes(&self) -> Option<usize> {
        self.expected_classes
    }

    pub fn stage(&self) -> &'static str {
        self.state.label()
    }

    pub fn files(&self) -> Option<&[CollatedFile]> {
        self.state.files()
    }

    /// Find the model STAR files for this job type. Always starts over, any
    /// previously built cube is dropped.
    pub fn discover(&mut self) -> Result<&[CollatedFile], ReportError> {
        let pattern = self.profile().model_pattern;
        let files = collate_files(&self.dir, pattern, &self.run_prefix)?;
        self.state = JobState::FileSetDiscovered { files };
        Ok(self.state.files().unwrap_or_default())
    }

    /// Parse `table` from every discovered file. The first bad file aborts the
    /// read and leaves the job as it was.
    pub fn read(&mut self, table: &str) -> Result<(), ReportError> {
        let files = self
            .state
            .files()
            .ok_or_else(|| self.not_ready("read", "discovered files"))?;

        let tables = read_tables(files, table)?;
        let files = files.to_vec();
        self.state = JobState::TableRead {
            files,
            table: table.to_string(),
            tables,
        };
        Ok(())
    }

    /// Stack the read tables into a cube.
    pub fn build(&mut self) -> Result<&JobDataCube, ReportError> {
        let (files, table, tables) = match std::mem::replace(&mut self.state, JobState::Unbound) {
            JobState::TableRead {
                files,
                table,
                tables,
            } => (files, table, tables),
            other => {
                self.state = other;
                return Err(self.not_ready("build", "a read table").into());
            }
        };

        let cube = match stack_tables(&files, &table, tables) {
            Ok(cube) => cube,
            Err(e) => {
                self.state = JobState::FileSetDiscovered { files };
                return Err(e);
            }
        };

        if let Some(expected) = self.expected_classes {
            if expected != cube.class_count() {
                log::warn!(
                    "{RUN_JOB_FILE} declares {expected} classes, {table} has {}",
                    cube.class_count()
                );
            }
        }
        log::info!(
            "built {} × {} cube from {table}",
            cube.iteration_count(),
            cube.class_count()
        );

        self.state = JobState::CubeBuilt { files, cube };
        self.cube().map_err(ReportError::from)
    }

    pub fn cube(&self) -> Result<&JobDataCube, StateError> {
        match &self.state {
            JobState::CubeBuilt { cube, .. } => Ok(cube),
            _ => Err(self.not_ready("cube", "a built cube")),
        }
    }

    /// Trajectory of one parameter across iterations.
    pub fn graph(&self, parameter: &Parameter) -> Result<ParameterSeries, ReportError> {
        let cube = self
            .cube()
            .map_err(|_| self.not_ready("graph", "a built cube"))?;
        let column = parameter.resolve(cube).ok_or_else(|| ReportError::Parse {
            path: self.dir.clone(),
            source: ParseError::MissingColumn(parameter.columns.join(" | ")),
        })?;
        cube.graph(column).map_err(|source| ReportError::Parse {
            path: self.dir.clone(),
            source,
        })
    }

    /// Trajectories of every tracked parameter the files actually carry.
    pub fn graphs(&self) -> Result<Vec<(Parameter, ParameterSeries)>, ReportError> {
        let cube = self
            .cube()
            .map_err(|_| self.not_ready("graph", "a built cube"))?;
        let mut out = Vec::new();
        for parameter in self.profile().parameters {
            if parameter.resolve(cube).is_none() {
                log::warn!("{}: no {} column, skipping", self.name(), parameter.title);
                continue;
            }
            out.push((*parameter, self.graph(parameter)?));
        }
        Ok(out)
    }

    /// Write every tracked series to CSV.
    pub fn export(&self, path: &Path) -> anyhow::Result<()> {
        if self.cube().is_err() {
            return Err(self.not_ready("export", "a built cube").into());
        }
        let graphs = self.graphs()?;
        crate::report::export::write_series_csv(path, &graphs)
    }

    fn not_ready(&self, operation: &'static str, required: &'static str) -> StateError {
        StateError::NotReady {
            operation,
            required,
            current: self.state.label(),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor files
// ---------------------------------------------------------------------------

fn read_process_name(dir: &Path) -> Result<String, ReportError> {
    let descriptors = list_matching(dir, DESCRIPTOR_PATTERN)?;
    let descriptor = match descriptors.as_slice() {
        [] => {
            return Err(DiscoveryError::NoDescriptor {
                dir: dir.to_path_buf(),
            }
            .into())
        }
        [one] => one,
        many => {
            return Err(DiscoveryError::DescriptorCount {
                dir: dir.to_path_buf(),
                count: many.len(),
            }
            .into())
        }
    };

    let table = read_table(descriptor, PROCESSES_TABLE, ParseOptions::default())?;
    table
        .value(PROCESS_NAME_FIELD, 0)
        .map(|v| v.to_string())
        .ok_or_else(|| DiscoveryError::MissingProcessName.into())
}

/// `Number of classes: == 4` from a `run.job` file.
fn read_class_count(path: &Path) -> Option<usize> {
    let text = std::fs::read_to_string(path).ok()?;
    text.lines()
        .find(|l| l.starts_with("Number of classes"))
        .and_then(|l| l.split_once("=="))
        .and_then(|(_, n)| n.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: &str = "
# version 30001

data_pipeline_general

_rlnPipeLineJobCounter                       13

# version 30001

data_pipeline_processes

loop_
_rlnPipeLineProcessName #1
_rlnPipeLineProcessAlias #2
_rlnPipeLineProcessTypeLabel #3
_rlnPipeLineProcessStatusLabel #4
Class3D/job012/       None relion.class3d  Succeeded
";

    fn model_star(dist: &[f64]) -> String {
        let mut s = String::from(
            "data_model_general\n\n_rlnCurrentResolution 8.0\n\n\
             data_model_classes\n\nloop_\n_rlnReferenceImage #1\n\
             _rlnClassDistribution #2\n_rlnAccuracyRotations #3\n\
             _rlnAccuracyTranslationsAngst #4\n_rlnEstimatedResolution #5\n",
        );
        for (i, d) in dist.iter().enumerate() {
            s.push_str(&format!("run_it001_class{:03}.mrc {d} 3.1 1.2 9.5\n", i + 1));
        }
        s.push('\n');
        s
    }

    fn job_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("job_pipeline.star"), PIPELINE).unwrap();
        std::fs::write(dir.path().join("run.job"), "Number of classes: == 3\n").unwrap();
        for (name, dist) in [
            ("run_it001_model.star", [0.2, 0.3, 0.5]),
            ("run_it002_model.star", [0.1, 0.3, 0.6]),
            ("run_ct005_it003_model.star", [0.1, 0.2, 0.7]),
        ] {
            std::fs::write(dir.path().join(name), model_star(&dist)).unwrap();
        }
        dir
    }

    #[test]
    fn job_type_dispatch() {
        assert_eq!(JobType::from_process_name("Class3D/job012/").unwrap(), JobType::Class3D);
        assert_eq!(JobType::from_process_name("Refine3D/job020/").unwrap(), JobType::Refine3D);
        assert!(matches!(
            JobType::from_process_name("PostProcess/job030/"),
            Err(DiscoveryError::UnknownJobType(t)) if t == "PostProcess"
        ));
        assert_eq!(JobType::Refine3D.profile().model_pattern, "*_half1_model.star");
        assert!(!JobType::Class2D.profile().legend);
    }

    #[test]
    fn open_reads_descriptor_and_run_job() {
        let dir = job_dir();
        let job = Job::open(dir.path()).unwrap();
        assert_eq!(job.job_type(), JobType::Class3D);
        assert_eq!(job.name(), "Class3D_job012");
        assert_eq!(job.expected_classes(), Some(3));
        assert_eq!(job.stage(), "unbound");
    }

    #[test]
    fn missing_descriptor_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Job::open(dir.path()),
            Err(ReportError::Discovery(DiscoveryError::NoDescriptor { .. }))
        ));

        std::fs::write(dir.path().join("job_pipeline.star"), PIPELINE).unwrap();
        std::fs::write(dir.path().join("default_pipeline.star"), PIPELINE).unwrap();
        assert!(matches!(
            Job::open(dir.path()),
            Err(ReportError::Discovery(DiscoveryError::DescriptorCount { count: 2, .. }))
        ));
    }

    #[test]
    fn stages_in_order() {
        let dir = job_dir();
        let mut job = Job::open(dir.path()).unwrap();

        assert!(matches!(
            job.read(MODEL_CLASSES_TABLE),
            Err(ReportError::State(StateError::NotReady { operation: "read", .. }))
        ));
        assert!(matches!(
            job.graph(&CLASS_DISTRIBUTION),
            Err(ReportError::State(StateError::NotReady { operation: "graph", .. }))
        ));

        assert_eq!(job.discover().unwrap().len(), 3);
        assert!(matches!(job.build(), Err(ReportError::State(_))));

        job.read(MODEL_CLASSES_TABLE).unwrap();
        assert_eq!(job.stage(), "table read");
        assert!(job.cube().is_err());

        let cube = job.build().unwrap();
        assert_eq!(cube.iteration_count(), 3);
        assert_eq!(cube.class_count(), 3);
        assert_eq!(cube.iterations(), &[1, 2, 4]);

        let dist = job.graph(&CLASS_DISTRIBUTION).unwrap();
        assert_eq!(dist.classes[2], vec![0.5, 0.6, 0.7]);
    }

    #[test]
    fn renamed_column_falls_back() {
        let dir = job_dir();
        let job = Job::load(dir.path()).unwrap();
        let series = job.graph(&ACCURACY_TRANSLATIONS).unwrap();
        assert_eq!(series.parameter, "rlnAccuracyTranslationsAngst");
        assert_eq!(job.graphs().unwrap().len(), 4);
    }

    #[test]
    fn malformed_file_fails_fast_and_keeps_state() {
        let dir = job_dir();
        std::fs::write(
            dir.path().join("run_it004_model.star"),
            "data_model_classes\nloop_\n_rlnClassDistribution #1\n0.5 0.5\n",
        )
        .unwrap();
        let mut job = Job::open(dir.path()).unwrap();
        job.discover().unwrap();
        let err = job.read(MODEL_CLASSES_TABLE).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Parse {
                source: ParseError::RowWidthMismatch { .. },
                ..
            }
        ));
        assert_eq!(job.stage(), "discovered");
    }

    #[test]
    fn class_count_change_fails_build() {
        let dir = job_dir();
        std::fs::write(dir.path().join("run_it005_model.star"), model_star(&[0.5, 0.5])).unwrap();
        let mut job = Job::open(dir.path()).unwrap();
        job.discover().unwrap();
        job.read(MODEL_CLASSES_TABLE).unwrap();
        match job.build() {
            Err(ReportError::Parse { path, source }) => {
                assert_eq!(path, dir.path());
                assert!(matches!(source, ParseError::ClassCountMismatch { iteration: 5, .. }));
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("build should fail"),
        }
        assert_eq!(job.stage(), "discovered");
    }

    #[test]
    fn export_needs_cube() {
        let dir = job_dir();
        let job = Job::open(dir.path()).unwrap();
        let err = job.export(&dir.path().join("out.csv")).unwrap_err();
        assert!(err.downcast_ref::<StateError>().is_some());
    }

    #[test]
    fn class_count_from_run_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.job");
        std::fs::write(&path, "is_continue == false\nNumber of classes: == 12\n").unwrap();
        assert_eq!(read_class_count(&path), Some(12));
        assert_eq!(read_class_count(&dir.path().join("absent.job")), None);
    }
}
