// ============================================================================
// ui.rs - physarum
// egui parameter panel: per-tick step parameters and hot-editable species
// settings, display mode and run control.
// ============================================================================

use crate::config::{SimulationConfig, SpeciesSettings, StepParams, MAX_SPECIES};
use crate::stepper::RenderMode;

/// Host-side mutable state backing the panel. Step parameters and species
/// settings edited here are injected into the next tick.
pub struct UiState {
    pub paused: bool,
    pub mode: RenderMode,
    pub steps_per_frame: u32,
    pub step: StepParams,
    pub species: Vec<SpeciesSettings>,
    pub restart_requested: bool,
    pub show_panel: bool,
}

impl UiState {
    pub fn from_config(config: &SimulationConfig, mode: RenderMode) -> Self {
        Self {
            paused: false,
            mode,
            steps_per_frame: config.steps_per_frame,
            step: config.step,
            species: config.species.clone(),
            restart_requested: false,
            show_panel: true,
        }
    }
}

pub fn draw_panel(ctx: &egui::Context, state: &mut UiState, frame: u32, fps: f32) {
    if !state.show_panel {
        return;
    }

    egui::Window::new("Physarum")
        .default_pos([10.0, 10.0])
        .show(ctx, |ui| {
            ui.label(format!("Frame {frame}   {fps:.0} fps"));
            ui.horizontal(|ui| {
                if ui
                    .button(if state.paused { "Resume" } else { "Pause" })
                    .clicked()
                {
                    state.paused = !state.paused;
                }
                if ui.button("Restart").clicked() {
                    state.restart_requested = true;
                }
            });

            ui.separator();
            ui.horizontal(|ui| {
                ui.label("Display:");
                ui.radio_value(&mut state.mode, RenderMode::FieldColorization, "Trail");
                ui.radio_value(&mut state.mode, RenderMode::AgentsOnly, "Agents");
            });
            ui.add(
                egui::Slider::new(&mut state.steps_per_frame, 1..=10).text("Steps per frame"),
            );

            ui.separator();
            ui.heading("Trail");
            ui.add(
                egui::Slider::new(&mut state.step.trail_weight, 0.0..=200.0).text("Deposit weight"),
            );
            ui.add(egui::Slider::new(&mut state.step.decay_rate, 0.0..=5.0).text("Decay rate"));
            ui.add(
                egui::Slider::new(&mut state.step.diffuse_rate, 0.0..=50.0).text("Diffuse rate"),
            );
            ui.add(
                egui::Slider::new(&mut state.step.delta_time, 0.001..=0.1)
                    .logarithmic(true)
                    .text("Delta time"),
            );

            ui.separator();
            ui.heading("Species");
            let mut remove: Option<usize> = None;
            for (index, species) in state.species.iter_mut().enumerate() {
                egui::CollapsingHeader::new(format!("Species {}", index + 1))
                    .default_open(index == 0)
                    .show(ui, |ui| {
                        species_editor(ui, species);
                        if index > 0 && ui.button("Remove").clicked() {
                            remove = Some(index);
                        }
                    });
            }
            // Keep 1..=3 species; the mask encoding allows no more.
            if let Some(index) = remove {
                if state.species.len() > 1 {
                    state.species.remove(index);
                    state.restart_requested = true;
                }
            }
            if state.species.len() < MAX_SPECIES && ui.button("Add species").clicked() {
                state.species.push(SpeciesSettings::default());
                state.restart_requested = true;
            }

            ui.separator();
            ui.label("Space: pause | Tab: display mode | R: restart | F1: panel");
        });
}

fn species_editor(ui: &mut egui::Ui, species: &mut SpeciesSettings) {
    ui.add(egui::Slider::new(&mut species.move_speed, 0.0..=150.0).text("Move speed"));
    ui.add(egui::Slider::new(&mut species.turn_speed, 0.0..=10.0).text("Turn speed"));
    ui.add(
        egui::Slider::new(&mut species.sensor_angle_degrees, 0.0..=180.0).text("Sensor angle"),
    );
    ui.add(egui::Slider::new(&mut species.sensor_offset, 0.0..=50.0).text("Sensor offset"));
    ui.add(egui::Slider::new(&mut species.sensor_size, 0..=4).text("Sensor size"));
    ui.add(
        egui::Slider::new(&mut species.deposit_strength, 0.0..=5.0).text("Deposit strength"),
    );
    ui.horizontal(|ui| {
        ui.label("Color:");
        ui.color_edit_button_rgba_unmultiplied(&mut species.color);
    });
}
