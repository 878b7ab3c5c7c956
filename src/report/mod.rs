//! Report writers: plot document, CSV/JSON exports, rendered frames.

pub mod export;
pub mod figures;

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::ReportConfig;
use crate::data::collate::{collate_volumes, list_matching};
use crate::data::filter::{from_class_numbers, visible_classes};
use crate::job::Job;
use crate::render::{frame_specs, render_frames, ChimeraX, MovieEncoder, Renderer, FRAME_PREFIX};
use export::ReportOutputs;
use figures::PageOptions;

/// Produce every report artifact for a job whose cube is built.
///
/// Plot and export failures abort; rendering and encoding failures are
/// logged and leave `frames`/`movie` empty.
pub fn run_report(job: &Job, config: &ReportConfig) -> Result<ReportOutputs> {
    let cube = job.cube()?;
    std::fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("creating {}", config.out_dir.display()))?;

    let name = job.name();
    let graphs = job.graphs()?;
    let filter = from_class_numbers(&config.classes, cube.class_count());
    let classes = visible_classes(&filter, cube.class_count());

    let mut outputs = ReportOutputs::default();

    let plot_path = config.out_dir.join(format!("{name}_report.svg"));
    figures::write_plot_document(
        &plot_path,
        &graphs,
        PageOptions {
            title: &name,
            classes: &classes,
            legend: job.profile().legend,
            style: config.style,
        },
    )?;
    outputs.plot_document = Some(plot_path);

    let csv_path = config.out_dir.join(format!("{name}_series.csv"));
    export::write_series_csv(&csv_path, &graphs)?;
    outputs.series_csv = Some(csv_path);

    if config.wants_frames() {
        match ChimeraX::locate() {
            Ok(chimerax) => render_movie(job, config, &chimerax, &mut outputs)?,
            Err(e) => log::warn!("skipping frames: {e}"),
        }
    }

    export::write_summary(
        &config.out_dir.join("summary.json"),
        job,
        &graphs,
        &outputs,
        config,
    )?;
    Ok(outputs)
}

/// Render frames with `renderer` and, if asked, encode them.
pub fn render_movie(
    job: &Job,
    config: &ReportConfig,
    renderer: &dyn Renderer,
    outputs: &mut ReportOutputs,
) -> Result<()> {
    let groups = match collate_volumes(job.dir(), job.run_prefix()) {
        Ok(groups) => groups,
        Err(e) => {
            log::warn!("skipping frames: {e}");
            return Ok(());
        }
    };

    let frames_dir = config.frames_dir();
    std::fs::create_dir_all(&frames_dir)
        .with_context(|| format!("creating {}", frames_dir.display()))?;
    clear_frames(&frames_dir)?;
    let specs = frame_specs(&groups, &frames_dir);
    outputs.frames = render_frames(renderer, &specs, &config.render);

    if !config.movie {
        return Ok(());
    }
    if outputs.frames.len() != specs.len() {
        log::warn!(
            "skipping movie: {} of {} frames rendered",
            outputs.frames.len(),
            specs.len()
        );
        return Ok(());
    }

    let movie = config.out_dir.join(format!("{}.mp4", job.name()));
    match MovieEncoder::locate().and_then(|enc| enc.encode(&frames_dir, &movie, config.fps)) {
        Ok(()) => outputs.movie = Some(movie),
        Err(e) => log::warn!("movie not written: {e}"),
    }
    Ok(())
}

/// Delete frames and command scripts left by an earlier run. The encoder reads
/// `frame_%04d.png` until the first gap.
fn clear_frames(frames_dir: &Path) -> Result<()> {
    for ext in ["png", "cxc"] {
        for path in list_matching(frames_dir, &format!("{FRAME_PREFIX}*.{ext}"))? {
            std::fs::remove_file(&path)
                .with_context(|| format!("removing {}", path.display()))?;
            log::debug!("removed stale {}", path.display());
        }
    }
    Ok(())
}
