use eframe::egui::Color32;

use relion_report::color::generate_palette;
use relion_report::data::cube::ParameterSeries;
use relion_report::data::filter::{init_class_filter, visible_classes, ClassFilter};
use relion_report::job::{Job, JobType, Parameter};
use relion_report::ReportError;

// ---------------------------------------------------------------------------
// Loaded job snapshot
// ---------------------------------------------------------------------------

/// Everything the viewer needs from a built job.
pub struct LoadedJob {
    pub name: String,
    pub job_type: JobType,
    pub class_count: usize,
    pub graphs: Vec<(Parameter, ParameterSeries)>,
    pub legend: bool,
}

impl LoadedJob {
    pub fn from_job(job: &Job) -> Result<Self, ReportError> {
        Ok(Self {
            name: job.name(),
            job_type: job.job_type(),
            class_count: job.cube()?.class_count(),
            graphs: job.graphs()?,
            legend: job.profile().legend,
        })
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded job (None until a job directory is opened).
    pub job: Option<LoadedJob>,

    /// Index into `job.graphs` of the parameter on screen.
    pub selected_parameter: usize,

    /// Classes ticked in the side panel.
    pub filters: ClassFilter,

    /// Classes passing the filter (cached).
    pub visible_classes: Vec<usize>,

    /// One colour per class, same hues as the SVG report.
    pub colors: Vec<Color32>,

    /// Plot log10 of the values.
    pub log_scale: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            job: None,
            selected_parameter: 0,
            filters: ClassFilter::default(),
            visible_classes: Vec::new(),
            colors: Vec::new(),
            log_scale: false,
            status_message: None,
        }
    }
}

impl AppState {
    /// Ingest a newly loaded job; all classes start visible.
    pub fn set_job(&mut self, job: LoadedJob) {
        self.filters = init_class_filter(job.class_count);
        self.colors = generate_palette(job.class_count)
            .into_iter()
            .map(|[r, g, b]| Color32::from_rgb(r, g, b))
            .collect();
        self.job = Some(job);
        self.select_parameter(0);
        self.refilter();
        self.status_message = None;
    }

    /// Switch parameter; the log toggle follows the parameter's default.
    pub fn select_parameter(&mut self, index: usize) {
        self.selected_parameter = index;
        self.log_scale = self
            .current()
            .map(|(p, _)| p.log_scale)
            .unwrap_or(false);
    }

    pub fn current(&self) -> Option<&(Parameter, ParameterSeries)> {
        self.job.as_ref()?.graphs.get(self.selected_parameter)
    }

    pub fn color(&self, class: usize) -> Color32 {
        self.colors.get(class).copied().unwrap_or(Color32::GRAY)
    }

    /// Recompute `visible_classes` after a filter change.
    pub fn refilter(&mut self) {
        let count = self.job.as_ref().map_or(0, |j| j.class_count);
        self.visible_classes = visible_classes(&self.filters, count);
    }

    pub fn toggle_class(&mut self, class: usize) {
        if !self.filters.remove(&class) {
            self.filters.insert(class);
        }
        self.refilter();
    }

    pub fn select_all(&mut self) {
        let count = self.job.as_ref().map_or(0, |j| j.class_count);
        self.filters = init_class_filter(count);
        self.refilter();
    }

    pub fn select_none(&mut self) {
        self.filters.clear();
        self.refilter();
    }
}
