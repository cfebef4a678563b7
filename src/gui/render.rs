//! GUI rendering functions.
//!
//! Control panel sections and overlay painting. Panel functions return which
//! buttons were clicked; the app handles them.

use std::collections::HashMap;

use eframe::egui::{self, Color32, Pos2, Rect, RichText, Stroke, TextureHandle, Vec2};

use super::state::{GuiState, TrackerStatus};
use crate::grid::{CellCoordinate, GridConfig};

const GRID_COLOR: Color32 = Color32::from_rgb(0, 0, 255);
const STRIP_COLOR: Color32 = Color32::from_rgb(255, 0, 0);

/// Render the resolution preset radio buttons.
/// Returns true when the selection changed.
pub fn render_resolution(ui: &mut egui::Ui, state: &mut GuiState, presets: &[String]) -> bool {
    let mut changed = false;

    ui.group(|ui| {
        ui.label(RichText::new("Resolution").strong());
        ui.horizontal(|ui| {
            for name in presets {
                if ui.radio_value(&mut state.preset, name.clone(), name.as_str()).changed() {
                    changed = true;
                }
            }
        });
    });

    changed
}

/// Render the gap adjustment inputs.
/// Returns true when "Apply Gaps" was clicked.
pub fn render_gaps(ui: &mut egui::Ui, state: &mut GuiState) -> bool {
    let mut apply_clicked = false;

    ui.group(|ui| {
        ui.label(RichText::new("Manual Adjust (Optional)").strong());
        ui.horizontal(|ui| {
            ui.label("Gap X:");
            ui.add(egui::DragValue::new(&mut state.gap_x).range(0..=50));
            ui.add_space(10.0);
            ui.label("Gap Y:");
            ui.add(egui::DragValue::new(&mut state.gap_y).range(0..=50));
        });
        if ui.button("Apply Gaps").clicked() {
            apply_clicked = true;
        }
    });

    apply_clicked
}

/// Render the start/stop/reset buttons.
/// Returns (start_clicked, stop_clicked, reset_clicked).
pub fn render_controls(ui: &mut egui::Ui, state: &GuiState) -> (bool, bool, bool) {
    let mut start_clicked = false;
    let mut stop_clicked = false;
    let mut reset_clicked = false;
    let is_running = state.status.is_running();
    let width = ui.available_width();

    ui.add_space(8.0);

    ui.add_enabled_ui(!is_running, |ui| {
        let button = egui::Button::new(
            RichText::new("START Monitoring (Locks Overlay)")
                .strong()
                .color(Color32::WHITE),
        )
        .fill(Color32::from_rgb(0, 128, 0));
        if ui.add_sized([width, 28.0], button).clicked() {
            start_clicked = true;
        }
    });

    let button = egui::Button::new(
        RichText::new("UNLOCK / STOP (Enable Move)")
            .strong()
            .color(Color32::WHITE),
    )
    .fill(Color32::from_rgb(200, 0, 0));
    if ui.add_sized([width, 28.0], button).clicked() {
        stop_clicked = true;
    }

    ui.add_space(8.0);

    let button = egui::Button::new(RichText::new("RESET Memory").color(Color32::BLACK))
        .fill(Color32::from_rgb(255, 165, 0));
    if ui.add_sized([width, 24.0], button).clicked() {
        reset_clicked = true;
    }

    (start_clicked, stop_clicked, reset_clicked)
}

/// Render the status line and usage hint.
pub fn render_status(ui: &mut egui::Ui, state: &GuiState) {
    ui.add_space(8.0);

    let color = match &state.status {
        TrackerStatus::Stopped => Color32::from_rgb(0, 120, 200),
        TrackerStatus::Running => Color32::from_rgb(0, 150, 0),
        TrackerStatus::Error(_) => Color32::from_rgb(200, 0, 0),
    };
    ui.vertical_centered(|ui| {
        ui.label(RichText::new(state.status_text()).color(color));
        if state.stats.capture_failures > 0 {
            ui.label(
                RichText::new(format!(
                    "Capture failing ({} cycles)",
                    state.stats.capture_failures
                ))
                .color(Color32::from_rgb(200, 150, 0)),
            );
        }
        ui.add_space(8.0);
        ui.label(
            RichText::new("Select Resolution -> Align Blue Boxes -> START").color(Color32::GRAY),
        );
    });
}

/// Converts a physical pixel rectangle inside the overlay into egui points.
fn to_points(left: i32, top: i32, width: u32, height: u32, pixels_per_point: f32) -> Rect {
    Rect::from_min_size(
        Pos2::new(left as f32, top as f32) / pixels_per_point,
        Vec2::new(width as f32, height as f32) / pixels_per_point,
    )
}

/// Paint the cell frames, scan strips and gold card annotations.
pub fn paint_overlay(
    painter: &egui::Painter,
    config: &GridConfig,
    annotations: &HashMap<CellCoordinate, (TextureHandle, u32)>,
    pixels_per_point: f32,
) {
    let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));

    for cell in config.cells() {
        let (cell_x, cell_y) = config.cell_origin(cell);
        let left = cell_x + config.padding_x as i32;
        let top = cell_y + config.padding_y as i32;

        if let Some((texture, y_offset)) = annotations.get(&cell) {
            let [w, h] = texture.size();
            let rect = to_points(left, top + *y_offset as i32, w as u32, h as u32, pixels_per_point);
            painter.image(texture.id(), rect, uv, Color32::WHITE);
        }

        let frame = to_points(left, top, config.card_w(), config.card_h(), pixels_per_point);
        painter.rect_stroke(frame, 0.0, Stroke::new(2.0, GRID_COLOR));

        let strip = to_points(
            left,
            top + config.scan_y_start as i32,
            config.card_w(),
            config.scan_y_end.saturating_sub(config.scan_y_start),
            pixels_per_point,
        );
        painter.rect_stroke(strip, 0.0, Stroke::new(1.0, STRIP_COLOR));
    }
}
