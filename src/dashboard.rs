//! MultiZap dashboard - Edit the profile registry and launch the session host

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::Result;
use tracing::info;

use multizap::core::{ProfileRegistry, Settings};
use multizap::ui::DashboardApp;
use multizap::{APP_NAME, APP_VERSION};

fn main() -> Result<()> {
    let settings = Settings::load_or_create(&Settings::default_path());
    multizap::init_logging(settings.debug_logging);

    info!("{} dashboard v{} starting...", APP_NAME, APP_VERSION);

    let registry = ProfileRegistry::open(
        settings.get_registry_path(),
        settings.get_profiles_directory(),
    );

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([640.0, 560.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        &format!("{} - Profiles", APP_NAME),
        native_options,
        Box::new(|cc| Ok(Box::new(DashboardApp::new(cc, registry)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run dashboard: {}", e))?;

    info!("Dashboard closed");
    Ok(())
}
