//! Gold Card Tracker
//!
//! A screen overlay for the card flipping minigame. A transparent window is
//! aligned over the card grid; while tracking runs, every card whose gold
//! indicator is found gets its lower half pinned on the overlay.

// Hide console window on Windows for GUI mode
#![windows_subsystem = "windows"]

mod capture;
mod grid;
mod gui;
mod logger;
mod paths;
mod tracker;

use anyhow::{anyhow, Context, Result};

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let thread = std::thread::current();
        log::error!(
            "[PANIC] thread '{}'{} {}",
            thread.name().unwrap_or("unnamed"),
            location,
            msg
        );
        eprintln!("[PANIC]{} {}", location, msg);
    }));

    // Ensure output directories exist
    paths::ensure_directories().context("Failed to create logs directory")?;

    logger::init(log::LevelFilter::Info).context("Failed to install logger")?;
    log::info!("Gold Card Tracker started");

    // Load configuration
    let config = tracker::init_config();
    logger::set_level(config.log_level_filter());

    log::info!("Starting GUI application...");
    match gui::run_gui(config) {
        Ok(()) => {
            log::info!("GUI application exited normally");
            Ok(())
        }
        Err(e) => {
            log::error!("GUI error: {}", e);
            Err(anyhow!("GUI error: {}", e))
        }
    }
}
