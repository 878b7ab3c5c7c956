mod app;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use eframe::egui;

use app::ReportApp;
use relion_report::config::ReportConfig;
use relion_report::render::RenderConfig;
use relion_report::report::figures::PlotStyle;
use relion_report::report::run_report;
use relion_report::Job;
use state::{AppState, LoadedJob};

/// Plot per-class trajectories of a RELION job and render its volumes.
#[derive(Debug, Parser)]
#[command(name = "relion-report", version, about)]
struct Cli {
    /// The job directory (containing job_pipeline.star)
    job_dir: PathBuf,

    /// Open the interactive viewer after writing the report
    #[arg(short, long)]
    display: bool,

    /// Render frames with ChimeraX and encode them into a movie with ffmpeg
    #[arg(short, long)]
    movie: bool,

    /// Render frames without encoding a movie
    #[arg(long)]
    frames: bool,

    /// ChimeraX commands replacing the default volume presentation
    #[arg(long)]
    visual: Option<String>,

    /// Extra options for the ChimeraX save command
    #[arg(long)]
    save: Option<String>,

    /// Plot style
    #[arg(short, long, value_enum, default_value_t = PlotStyle::Default)]
    style: PlotStyle,

    /// Full lighting with shadows
    #[arg(long)]
    raytrace: bool,

    /// Flat lighting with silhouettes
    #[arg(long)]
    flat: bool,

    /// Render 1920x1080 frames
    #[arg(long)]
    high_res: bool,

    /// Only plot these classes (1-based, comma separated)
    #[arg(short, long, value_delimiter = ',')]
    classes: Vec<usize>,

    /// Movie frame rate
    #[arg(long, default_value_t = 4)]
    fps: u32,

    /// Output directory [default: <JOB_DIR>/report]
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// STAR table to collate
    #[arg(long, default_value = relion_report::job::MODEL_CLASSES_TABLE)]
    table: String,
}

impl Cli {
    fn into_config(self) -> ReportConfig {
        let defaults = ReportConfig::for_job(&self.job_dir);
        ReportConfig {
            out_dir: self.out.unwrap_or(defaults.out_dir),
            table: self.table,
            style: self.style,
            classes: self.classes,
            frames: self.frames,
            movie: self.movie,
            fps: self.fps,
            render: RenderConfig {
                raytrace: self.raytrace,
                flat: self.flat,
                high_res: self.high_res,
                visual: self.visual,
                save: self.save,
            },
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !cli.job_dir.is_dir() {
        bail!("{} is not a directory", cli.job_dir.display());
    }
    if cli.fps == 0 {
        bail!("--fps must be at least 1");
    }
    let job_dir = cli.job_dir.clone();
    let display = cli.display;
    let config = cli.into_config();

    let mut job = Job::open(&job_dir)?;
    job.discover()?;
    job.read(&config.table)?;
    job.build()?;

    let outputs = run_report(&job, &config)
        .with_context(|| format!("writing report for {}", job_dir.display()))?;
    if let Some(doc) = &outputs.plot_document {
        println!("{}", doc.display());
    }
    if let Some(movie) = &outputs.movie {
        println!("{}", movie.display());
    }

    if display {
        let mut state = AppState::default();
        state.set_job(LoadedJob::from_job(&job)?);
        show_viewer(state)?;
    }
    Ok(())
}

fn show_viewer(state: AppState) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "RELION Report",
        options,
        Box::new(|_cc| Ok(Box::new(ReportApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}
