use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use relion_report::job::Job;

use crate::state::{AppState, LoadedJob};

// ---------------------------------------------------------------------------
// Left side panel – parameter and class widgets
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    let Some(job) = &state.job else {
        ui.heading("Classes");
        ui.separator();
        ui.label("No job loaded.");
        return;
    };

    ui.heading(&job.name);
    ui.label(job.job_type.to_string());
    ui.separator();

    // Copy what we need so we can mutate state inside the widgets.
    let titles: Vec<&'static str> = job.graphs.iter().map(|(p, _)| p.title).collect();
    let class_count = job.class_count;

    // ---- Parameter selector ----
    ui.strong("Parameter");
    let current = titles.get(state.selected_parameter).copied().unwrap_or_default();
    let mut chosen = None;
    egui::ComboBox::from_id_salt("parameter")
        .selected_text(current)
        .show_ui(ui, |ui: &mut Ui| {
            for (i, title) in titles.iter().enumerate() {
                if ui
                    .selectable_label(state.selected_parameter == i, *title)
                    .clicked()
                {
                    chosen = Some(i);
                }
            }
        });
    if let Some(i) = chosen {
        state.select_parameter(i);
    }
    ui.separator();

    // ---- Class checkboxes ----
    ui.horizontal(|ui: &mut Ui| {
        ui.strong(format!(
            "Classes  ({}/{class_count})",
            state.visible_classes.len()
        ));
        if ui.small_button("All").clicked() {
            state.select_all();
        }
        if ui.small_button("None").clicked() {
            state.select_none();
        }
    });

    let mut toggled = None;
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for class in 0..class_count {
                let mut checked = state.filters.contains(&class);
                let text = RichText::new(format!("Class {}", class + 1)).color(state.color(class));
                if ui.checkbox(&mut checked, text).changed() {
                    toggled = Some(class);
                }
            }
        });
    if let Some(class) = toggled {
        state.toggle_class(class);
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open job…").clicked() {
                open_job_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some((_, series)) = state.current() {
            ui.label(format!(
                "{} iterations × {} classes",
                series.iterations.len(),
                series.classes.len()
            ));
        }

        ui.separator();

        if ui.selectable_label(state.log_scale, "Log scale").clicked() {
            state.log_scale = !state.log_scale;
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Folder dialog
// ---------------------------------------------------------------------------

pub fn open_job_dialog(state: &mut AppState) {
    let Some(dir) = rfd::FileDialog::new()
        .set_title("Open RELION job directory")
        .pick_folder()
    else {
        return;
    };

    match Job::load(&dir).and_then(|job| LoadedJob::from_job(&job)) {
        Ok(loaded) => {
            log::info!(
                "Loaded {} with {} classes and {} parameters",
                loaded.name,
                loaded.class_count,
                loaded.graphs.len()
            );
            state.set_job(loaded);
        }
        Err(e) => {
            log::error!("Failed to load job: {e:#}");
            state.status_message = Some(format!("Error: {e}"));
        }
    }
}
