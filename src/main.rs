//! MultiZap session host
//!
//! Starts one isolated browser session per enabled profile and shows them on
//! a two-column grid.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use single_instance::SingleInstance;
use tracing::{error, info, warn};

use multizap::core::{detect, ProfileRegistry, RenderingEngine, Settings, SysinfoProbe};
use multizap::engine::{ChromiumEngine, ChromiumOptions};
use multizap::ui::{show_message, HostApp, HostSetup};
use multizap::{APP_NAME, APP_VERSION};

fn main() -> Result<()> {
    let settings = Settings::load_or_create(&Settings::default_path());
    multizap::init_logging(settings.debug_logging);

    info!("{} v{} starting...", APP_NAME, APP_VERSION);

    // Ensure only one host is running
    let instance = SingleInstance::new(APP_NAME)
        .map_err(|e| anyhow::anyhow!("Failed to create single instance lock: {}", e))?;
    if !instance.is_single() {
        error!("Another instance of {} is already running!", APP_NAME);
        show_message(
            "Already running",
            &format!("{} is already running.", APP_NAME),
        )?;
        return Ok(());
    }

    if let Err(e) = run(settings) {
        error!("Fatal error: {:#}", e);
        if let Err(shown) = show_message(
            &format!("{} could not start", APP_NAME),
            &format!("{:#}", e),
        ) {
            error!("{}", shown);
        }
        return Err(e);
    }

    info!("{} shutting down", APP_NAME);
    Ok(())
}

fn run(settings: Settings) -> Result<()> {
    let capability = detect(&SysinfoProbe::new());

    let registry = ProfileRegistry::open(
        settings.get_registry_path(),
        settings.get_profiles_directory(),
    );
    if registry.get_enabled().is_empty() {
        warn!("No enabled profiles, nothing to host");
        show_message(
            "No enabled profiles",
            "No profile is enabled. Open the dashboard, enable at least one profile and start again.",
        )?;
        return Ok(());
    }

    let options =
        ChromiumOptions::from_settings(&settings).context("No usable browser for sessions")?;

    // Session tasks run on a single-threaded runtime driven by a background thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build session runtime")?;
    let handle = runtime.handle().clone();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let driver = std::thread::Builder::new()
        .name("multizap-sessions".to_string())
        .spawn(move || {
            runtime.block_on(async {
                let _ = stop_rx.await;
            });
            runtime.shutdown_timeout(Duration::from_secs(2));
        })
        .context("Failed to start session thread")?;
    let _guard = handle.enter();
    let engine: Arc<dyn RenderingEngine> = Arc::new(ChromiumEngine::new(options, handle.clone()));

    let setup = HostSetup {
        settings,
        registry,
        capability,
        engine,
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([640.0, 420.0])
            .with_icon(load_app_icon()),
        ..Default::default()
    };

    info!("Starting GUI...");
    let result = eframe::run_native(
        &format!("{} v{}", APP_NAME, APP_VERSION),
        native_options,
        Box::new(|cc| Ok(Box::new(HostApp::new(cc, setup)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run application: {}", e));

    let _ = stop_tx.send(());
    if driver.join().is_err() {
        warn!("Session thread panicked during shutdown");
    }
    result
}

/// Green disc icon
fn load_app_icon() -> egui::IconData {
    let size = 64;
    let mut rgba = vec![0u8; size * size * 4];

    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let cx = x as f32 - size as f32 / 2.0;
            let cy = y as f32 - size as f32 / 2.0;
            let dist = (cx * cx + cy * cy).sqrt();

            if dist < size as f32 / 2.0 - 2.0 {
                let t = dist / (size as f32 / 2.0);
                rgba[idx] = (37.0 - t * 19.0) as u8;
                rgba[idx + 1] = (211.0 - t * 71.0) as u8;
                rgba[idx + 2] = (102.0 + t * 24.0) as u8;
                rgba[idx + 3] = 255;
            }
        }
    }

    egui::IconData {
        rgba,
        width: size as u32,
        height: size as u32,
    }
}
