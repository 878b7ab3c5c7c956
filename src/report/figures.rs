//! Plot document generation using plotters (SVG output).
//!
//! One page per tracked parameter, pages stacked top to bottom in a single
//! SVG file. Uses the SVG backend to avoid system font dependencies.

use std::path::Path;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::class_color;
use crate::data::cube::ParameterSeries;
use crate::job::Parameter;

/// Size of one page in the document.
pub const PAGE_SIZE: (u32, u32) = (900, 560);

/// Named plot style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlotStyle {
    #[default]
    Default,
    Dark,
    /// Thin black-on-white lines for printing.
    Print,
}

impl PlotStyle {
    fn background(self) -> RGBColor {
        match self {
            PlotStyle::Default | PlotStyle::Print => WHITE,
            PlotStyle::Dark => RGBColor(30, 30, 36),
        }
    }

    fn foreground(self) -> RGBColor {
        match self {
            PlotStyle::Default | PlotStyle::Print => BLACK,
            PlotStyle::Dark => RGBColor(220, 220, 220),
        }
    }

    fn grid(self) -> RGBColor {
        match self {
            PlotStyle::Default => RGBColor(225, 225, 225),
            PlotStyle::Dark => RGBColor(60, 60, 70),
            PlotStyle::Print => RGBColor(240, 240, 240),
        }
    }

    fn line_width(self) -> u32 {
        match self {
            PlotStyle::Print => 1,
            _ => 2,
        }
    }
}

/// How a page should be drawn.
#[derive(Debug, Clone, Copy)]
pub struct PageOptions<'a> {
    pub title: &'a str,
    /// Classes to draw, 0-based.
    pub classes: &'a [usize],
    pub legend: bool,
    pub style: PlotStyle,
}

/// Write every `(parameter, series)` pair as one page of a single SVG.
pub fn write_plot_document(
    path: &Path,
    pages: &[(Parameter, ParameterSeries)],
    options: PageOptions<'_>,
) -> Result<()> {
    let page_count = pages.len().max(1) as u32;
    let root = SVGBackend::new(path, (PAGE_SIZE.0, PAGE_SIZE.1 * page_count)).into_drawing_area();
    root.fill(&options.style.background())?;

    if pages.is_empty() {
        draw_placeholder(&root, "No parameters to plot", options.style)?;
    } else {
        let areas = root.split_evenly((pages.len(), 1));
        for (area, (parameter, series)) in areas.iter().zip(pages) {
            draw_page(area, parameter, series, options)
                .with_context(|| format!("drawing {}", parameter.title))?;
        }
    }

    root.present()
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {} page(s) to {}", page_count, path.display());
    Ok(())
}

fn draw_page(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    parameter: &Parameter,
    series: &ParameterSeries,
    options: PageOptions<'_>,
) -> Result<()> {
    let style = options.style;
    let fg = style.foreground();
    let shown = if parameter.log_scale {
        series.log10()
    } else {
        series.clone()
    };

    let lines: Vec<(usize, Vec<(f64, f64)>)> = options
        .classes
        .iter()
        .filter(|&&c| c < shown.classes.len())
        .map(|&c| {
            let pts = shown.points(c).filter(|(_, y)| y.is_finite()).collect();
            (c, pts)
        })
        .collect();

    let Some((y_min, y_max)) = shown.value_range(options.classes) else {
        return draw_placeholder(area, &format!("{}: no data", parameter.title), style);
    };
    let x_min = shown.iterations.first().map_or(0.0, |&i| i as f64);
    let x_max = shown.iterations.last().map_or(1.0, |&i| i as f64);
    let (x_min, x_max) = pad(x_min, x_max, 0.0);
    let (y_min, y_max) = pad(y_min, y_max, 0.05);

    let y_desc = if parameter.log_scale {
        format!("log10 {}", parameter.y_label)
    } else {
        parameter.y_label.to_string()
    };

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{} - {}", options.title, parameter.title),
            ("sans-serif", 20).into_font().color(&fg),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Iteration")
        .y_desc(y_desc)
        .label_style(("sans-serif", 12).into_font().color(&fg))
        .axis_desc_style(("sans-serif", 14).into_font().color(&fg))
        .light_line_style(style.grid().stroke_width(1))
        .bold_line_style(style.grid().stroke_width(1))
        .axis_style(fg.stroke_width(1))
        .draw()?;

    let class_count = series.classes.len();
    for (class, pts) in &lines {
        let [r, g, b] = class_color(*class, class_count);
        let color = RGBColor(r, g, b);

        let drawn = chart.draw_series(LineSeries::new(
            pts.iter().copied(),
            color.stroke_width(style.line_width()),
        ))?;
        if options.legend {
            drawn
                .label(format!("Class {}", class + 1))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }
        chart.draw_series(pts.iter().map(|&p| Circle::new(p, 3, color.filled())))?;
    }

    if options.legend && !lines.is_empty() {
        chart
            .configure_series_labels()
            .background_style(style.background().mix(0.85).filled())
            .border_style(fg.stroke_width(1))
            .label_font(("sans-serif", 12).into_font().color(&fg))
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }
    Ok(())
}

fn draw_placeholder(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    message: &str,
    style: PlotStyle,
) -> Result<()> {
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        message.to_string(),
        (w as i32 / 2 - 100, h as i32 / 2),
        ("sans-serif", 20).into_font().color(&style.foreground()),
    ))?;
    Ok(())
}

/// Widen a range by `frac` of its span; degenerate ranges get ±1 (or ±10%).
fn pad(lo: f64, hi: f64, frac: f64) -> (f64, f64) {
    let span = hi - lo;
    if span.abs() < f64::EPSILON {
        let d = if lo.abs() > f64::EPSILON { lo.abs() * 0.1 } else { 1.0 };
        (lo - d, hi + d)
    } else {
        (lo - span * frac, hi + span * frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CLASS_DISTRIBUTION, REFINE_RESOLUTION};

    fn series() -> ParameterSeries {
        ParameterSeries {
            parameter: "rlnClassDistribution".into(),
            iterations: vec![1, 2, 4],
            classes: vec![vec![0.2, 0.1, 0.1], vec![0.8, 0.9, 0.9]],
        }
    }

    #[test]
    fn writes_one_page_per_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.svg");
        let pages = vec![(CLASS_DISTRIBUTION, series()), (REFINE_RESOLUTION, series())];
        write_plot_document(
            &path,
            &pages,
            PageOptions {
                title: "Class3D_job012",
                classes: &[0, 1],
                legend: true,
                style: PlotStyle::Default,
            },
        )
        .unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Class distribution"));
        assert!(svg.contains("Estimated resolution"));
        assert!(svg.contains("Class 2"));
        assert!(svg.contains(&format!("height=\"{}\"", PAGE_SIZE.1 * 2)));
    }

    #[test]
    fn hidden_classes_leave_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.svg");
        write_plot_document(
            &path,
            &[(CLASS_DISTRIBUTION, series())],
            PageOptions {
                title: "job",
                classes: &[],
                legend: false,
                style: PlotStyle::Dark,
            },
        )
        .unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("no data"));
    }

    #[test]
    fn padding() {
        assert_eq!(pad(0.0, 0.0, 0.05), (-1.0, 1.0));
        assert_eq!(pad(1.0, 3.0, 0.0), (1.0, 3.0));
        let (lo, hi) = pad(10.0, 10.0, 0.05);
        assert!((lo - 9.0).abs() < 1e-9 && (hi - 11.0).abs() < 1e-9);
    }
}
