use eframe::egui::Ui;
use egui_plot::{Legend, Line, Plot, PlotPoints, Points};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Parameter plot (central panel)
// ---------------------------------------------------------------------------

/// Render the selected parameter, one line per visible class.
pub fn parameter_plot(ui: &mut Ui, state: &AppState) {
    let (Some(job), Some((parameter, series))) = (&state.job, state.current()) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a job directory to view its iterations  (File → Open job…)");
        });
        return;
    };

    let y_label = if state.log_scale {
        format!("log10 {}", parameter.y_label)
    } else {
        parameter.y_label.to_string()
    };

    let mut plot = Plot::new("parameter_plot")
        .x_axis_label("Iteration")
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    if job.legend {
        plot = plot.legend(Legend::default());
    }

    plot.show(ui, |plot_ui| {
        for &class in &state.visible_classes {
            let points: Vec<[f64; 2]> = series
                .points(class)
                .map(|(x, y)| [x, if state.log_scale { y.log10() } else { y }])
                .filter(|[_, y]| y.is_finite())
                .collect();
            let color = state.color(class);
            let name = format!("Class {}", class + 1);

            plot_ui.line(
                Line::new(PlotPoints::from(points.clone()))
                    .name(&name)
                    .color(color)
                    .width(1.5),
            );
            plot_ui.points(Points::new(points).name(&name).color(color).radius(2.5));
        }
    });
}
