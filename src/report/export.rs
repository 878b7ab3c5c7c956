use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::ReportConfig;
use crate::data::cube::ParameterSeries;
use crate::job::{Job, JobType, Parameter};

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Long-format CSV: one row per (slot, class), one column per parameter.
///
/// ```text
/// slot,iteration,class,rlnClassDistribution,rlnEstimatedResolution
/// 0,1,1,0.2,9.5
/// ```
pub fn write_series_csv(path: &Path, graphs: &[(Parameter, ParameterSeries)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["slot".to_string(), "iteration".into(), "class".into()];
    header.extend(graphs.iter().map(|(_, s)| s.parameter.clone()));
    writer.write_record(&header).context("writing CSV header")?;

    let Some((_, first)) = graphs.first() else {
        writer.flush()?;
        return Ok(());
    };

    for (slot, iteration) in first.iterations.iter().enumerate() {
        for class in 0..first.classes.len() {
            let mut record = vec![slot.to_string(), iteration.to_string(), (class + 1).to_string()];
            for (_, series) in graphs {
                let value = series
                    .classes
                    .get(class)
                    .and_then(|c| c.get(slot))
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                record.push(value);
            }
            writer
                .write_record(&record)
                .with_context(|| format!("CSV row for slot {slot}, class {}", class + 1))?;
        }
    }
    writer.flush()?;
    log::info!("wrote {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON summary
// ---------------------------------------------------------------------------

/// Files a report run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportOutputs {
    pub plot_document: Option<PathBuf>,
    pub series_csv: Option<PathBuf>,
    pub frames: Vec<PathBuf>,
    pub movie: Option<PathBuf>,
}

/// Machine-readable record of a report run.
#[derive(Debug, Serialize)]
pub struct JobSummary<'a> {
    pub job: String,
    pub job_type: JobType,
    pub directory: &'a Path,
    pub table: &'a str,
    pub iterations: &'a [u32],
    pub class_count: usize,
    pub expected_classes: Option<usize>,
    /// Value of every parameter at the last iteration, per class.
    pub latest: BTreeMap<String, Vec<f64>>,
    pub outputs: &'a ReportOutputs,
    pub config: &'a ReportConfig,
}

/// Write `summary.json` for a job whose cube is built.
pub fn write_summary(
    path: &Path,
    job: &Job,
    graphs: &[(Parameter, ParameterSeries)],
    outputs: &ReportOutputs,
    config: &ReportConfig,
) -> Result<()> {
    let cube = job.cube()?;
    let latest: BTreeMap<String, Vec<f64>> = graphs
        .iter()
        .map(|(_, s)| {
            let last: Vec<f64> = s.classes.iter().filter_map(|c| c.last().copied()).collect();
            (s.parameter.clone(), last)
        })
        .collect();

    let summary = JobSummary {
        job: job.name(),
        job_type: job.job_type(),
        directory: job.dir(),
        table: cube.table_name(),
        iterations: cube.iterations(),
        class_count: cube.class_count(),
        expected_classes: job.expected_classes(),
        latest,
        outputs,
        config,
    };

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &summary).context("serializing summary")?;
    log::info!("wrote {}", path.display());
    Ok(())
}
