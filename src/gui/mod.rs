//! GUI module for the application.
//!
//! The root viewport is the control panel. The card overlay is a second,
//! borderless, transparent and always-on-top viewport that the user drags
//! over the game's card grid. Once tracking starts it becomes click-through.

pub mod render;
pub mod state;

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use eframe::egui::{self, TextureHandle, Vec2, ViewportCommand, ViewportId};

use crate::capture::{platform_source, TimeoutSource};
use crate::grid::{CellCoordinate, GridConfig, GridLayout, ScreenPoint, SharedLayout};
use crate::tracker::{
    create_overlay_queue, OverlayCommand, OverlaySender, TrackerConfig, TrackerHandle, TrackerLoop,
};

use state::{GuiState, TrackerStatus};

/// Main GUI application struct.
pub struct TrackerApp {
    state: GuiState,
    config: &'static TrackerConfig,
    /// Grid currently drawn on the overlay.
    grid: GridConfig,
    /// Grid and overlay position as seen by the tracker.
    layout: SharedLayout,
    overlay_tx: Sender<OverlayCommand>,
    overlay_rx: Receiver<OverlayCommand>,
    /// Annotation texture and its vertical offset per cell.
    annotations: HashMap<CellCoordinate, (TextureHandle, u32)>,
    /// Created on first START.
    tracker: Option<TrackerHandle>,
    /// Overlay should be centered on its monitor next frame.
    recenter: bool,
}

impl TrackerApp {
    pub fn new(config: &'static TrackerConfig) -> Result<Self> {
        let preset = if config.presets.contains_key(&config.default_preset) {
            config.default_preset.clone()
        } else {
            config
                .preset_names()
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("config.json defines no resolution presets"))?
        };

        let grid = build_grid(config, &preset, config.gap_x, config.gap_y)?;
        let layout = SharedLayout::new(GridLayout {
            config: grid.clone(),
            origin: ScreenPoint::default(),
        });
        let (overlay_tx, overlay_rx) = create_overlay_queue();

        log::info!("Using {} preset, {}x{} grid", preset, grid.rows, grid.cols);

        Ok(Self {
            state: GuiState::new(preset, config.gap_x, config.gap_y),
            config,
            grid,
            layout,
            overlay_tx,
            overlay_rx,
            annotations: HashMap::new(),
            tracker: None,
            recenter: true,
        })
    }

    /// Rebuilds the grid from the selected preset and gaps.
    /// Invalid settings keep the previous grid. Returns true if applied.
    fn apply_grid(&mut self) -> bool {
        match build_grid(self.config, &self.state.preset, self.state.gap_x, self.state.gap_y) {
            Ok(grid) => {
                log::info!(
                    "Grid set to {} with gaps ({}, {})",
                    self.state.preset,
                    grid.gap_x,
                    grid.gap_y
                );
                self.layout.set_config(grid.clone());
                self.grid = grid;
                true
            }
            Err(e) => {
                log::warn!("Rejected grid settings: {}", e);
                self.state.gap_x = self.grid.gap_x;
                self.state.gap_y = self.grid.gap_y;
                self.state.status = TrackerStatus::Error(e.to_string());
                false
            }
        }
    }

    fn handle_preset_change(&mut self, previous: String) {
        if self.apply_grid() {
            self.recenter = true;
            // Gold counts from another resolution are not comparable
            self.forget_cards();
        } else {
            self.state.preset = previous;
        }
    }

    /// Clears card memory and annotations, through the tracker if there is one.
    fn forget_cards(&mut self) {
        match &self.tracker {
            Some(tracker) => tracker.reset(),
            // Nothing tracked yet, only the overlay to clear
            None => self.annotations.clear(),
        }
        self.state.stats.gold_cells = 0;
    }

    /// Handle start button click.
    fn handle_start(&mut self, ctx: &egui::Context) {
        let tracker = self.tracker.get_or_insert_with(|| {
            let repaint = ctx.clone();
            let renderer = OverlaySender::new(self.overlay_tx.clone(), move || {
                repaint.request_repaint()
            });
            let source = TimeoutSource::new(platform_source(), self.config.capture_timeout());
            let tracker = TrackerLoop::new(
                Box::new(source),
                Arc::new(renderer),
                Arc::new(self.layout.clone()),
                self.config.detection.clone(),
            );
            TrackerHandle::new(tracker, self.config.cycle_budget())
        });

        match tracker.start() {
            Ok(()) => {
                self.state.locked = true;
                self.state.status = TrackerStatus::Running;
            }
            Err(e) => {
                log::error!("GUI: Failed to start tracking: {}", e);
                self.state.status = TrackerStatus::Error(e.to_string());
            }
        }
    }

    /// Handle stop button click. The worker finishes its cycle in the background.
    fn handle_stop(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.stop();
        }
        self.state.locked = false;
        self.state.status = TrackerStatus::Stopped;
    }

    /// Handle reset button click.
    fn handle_reset(&mut self) {
        self.forget_cards();
        log::info!("GUI: Reset requested");
    }

    /// Applies queued render commands from the tracker.
    fn drain_overlay_commands(&mut self, ctx: &egui::Context) {
        while let Ok(command) = self.overlay_rx.try_recv() {
            match command {
                OverlayCommand::Render(request) => {
                    let size = [
                        request.image.width() as usize,
                        request.image.height() as usize,
                    ];
                    let image = egui::ColorImage::from_rgba_unmultiplied(size, request.image.as_raw());
                    let texture = ctx.load_texture(
                        format!("card_{}_{}", request.cell.row, request.cell.col),
                        image,
                        egui::TextureOptions::LINEAR,
                    );
                    self.annotations.insert(request.cell, (texture, request.y_offset));
                }
                OverlayCommand::ClearAll => self.annotations.clear(),
            }
        }
    }

    /// Shows the overlay viewport and publishes its position to the tracker.
    fn show_overlay(&mut self, ctx: &egui::Context) {
        let pixels_per_point = ctx.pixels_per_point();
        let (width, height) = self.grid.window_size();
        let size = Vec2::new(width as f32, height as f32) / pixels_per_point;
        let locked = self.state.locked;

        let builder = egui::ViewportBuilder::default()
            .with_title("Card Helper Overlay")
            .with_inner_size(size)
            .with_decorations(false)
            .with_transparent(true)
            .with_resizable(false)
            .with_taskbar(false)
            .with_window_level(egui::WindowLevel::AlwaysOnTop)
            .with_mouse_passthrough(locked);

        ctx.show_viewport_immediate(
            ViewportId::from_hash_of("card_overlay"),
            builder,
            |ctx, class| {
                // Only native multi-window backends can host the overlay
                if matches!(class, egui::ViewportClass::Embedded) {
                    return;
                }

                let (inner_rect, monitor_size) =
                    ctx.input(|i| (i.viewport().inner_rect, i.viewport().monitor_size));
                let pixels_per_point = ctx.pixels_per_point();

                if self.recenter {
                    if let Some(monitor) = monitor_size {
                        let position = ((monitor - size) / 2.0).max(Vec2::ZERO);
                        ctx.send_viewport_cmd(ViewportCommand::OuterPosition(position.to_pos2()));
                        self.recenter = false;
                    }
                }

                if let Some(rect) = inner_rect {
                    let origin = ScreenPoint::new(
                        (rect.min.x * pixels_per_point).round() as i32,
                        (rect.min.y * pixels_per_point).round() as i32,
                    );
                    if self.layout.set_origin(origin) {
                        log::debug!("Overlay moved to ({}, {})", origin.x, origin.y);
                    }
                }

                // A faint tint keeps the unlocked overlay visible and grabbable
                let fill = if locked {
                    egui::Color32::TRANSPARENT
                } else {
                    egui::Color32::from_black_alpha(40)
                };
                egui::CentralPanel::default()
                    .frame(egui::Frame::none().fill(fill))
                    .show(ctx, |ui| {
                        if !locked {
                            let response = ui.interact(
                                ui.max_rect(),
                                ui.id().with("overlay_drag"),
                                egui::Sense::drag(),
                            );
                            if response.drag_started() {
                                ctx.send_viewport_cmd(ViewportCommand::StartDrag);
                            }
                        }
                        render::paint_overlay(
                            ui.painter(),
                            &self.grid,
                            &self.annotations,
                            pixels_per_point,
                        );
                    });
            },
        );
    }

    fn poll_tracker(&mut self, ctx: &egui::Context) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        let reset_applied = tracker.apply_pending_reset();
        self.state.stats = tracker.stats();
        // Keep polling until a deferred reset lands and a stopped worker exits
        if tracker.is_running() || !tracker.worker_finished() || !reset_applied {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// Builds the grid for a preset, turning a missing preset into an error.
fn build_grid(config: &TrackerConfig, preset: &str, gap_x: u32, gap_y: u32) -> Result<GridConfig> {
    config
        .grid_config(preset, gap_x, gap_y)
        .ok_or_else(|| anyhow!("Unknown resolution preset: {}", preset))?
        .map_err(|e| anyhow!("Invalid {} preset: {}", preset, e))
}

impl eframe::App for TrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_overlay_commands(ctx);
        self.poll_tracker(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let presets = self.config.preset_names();
            let is_running = self.state.status.is_running();
            let previous_preset = self.state.preset.clone();

            // Grid changes while tracking would move the capture under the user
            let preset_changed = ui
                .add_enabled_ui(!is_running, |ui| {
                    render::render_resolution(ui, &mut self.state, &presets)
                })
                .inner;
            if preset_changed {
                self.handle_preset_change(previous_preset);
            }

            let apply_clicked = ui
                .add_enabled_ui(!is_running, |ui| render::render_gaps(ui, &mut self.state))
                .inner;
            if apply_clicked {
                self.apply_grid();
            }

            let (start_clicked, stop_clicked, reset_clicked) =
                render::render_controls(ui, &self.state);
            if start_clicked {
                self.handle_start(ctx);
            }
            if stop_clicked {
                self.handle_stop();
            }
            if reset_clicked {
                self.handle_reset();
            }

            render::render_status(ui, &self.state);
        });

        self.show_overlay(ctx);
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        // The overlay viewport shares this; the control panel paints its own background
        egui::Rgba::TRANSPARENT.to_array()
    }
}

/// Run the GUI application.
/// This function blocks until the control panel is closed.
/// The tracker worker is stopped when the app is dropped.
pub fn run_gui(config: &'static TrackerConfig) -> eframe::Result<()> {
    log::info!("GUI: Creating native options...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(350.0, 400.0))
            .with_min_inner_size(Vec2::new(300.0, 340.0))
            .with_title("Controls")
            .with_window_level(egui::WindowLevel::AlwaysOnTop),
        ..Default::default()
    };

    let app = TrackerApp::new(config).map_err(|e| eframe::Error::AppCreation(e.into()))?;

    log::info!("GUI: Calling eframe::run_native...");

    eframe::run_native("Gold Card Tracker", options, Box::new(|_cc| Ok(Box::new(app))))
}
