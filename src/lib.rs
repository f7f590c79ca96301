//! MultiZap - Several isolated messaging-web sessions side by side
//!
//! Each session is bound to its own durable profile (cookies, cache, local
//! storage), tagged with a color and label, and sized to the host machine's
//! capability tier.

pub mod core;
pub mod engine;
pub mod platform;
pub mod ui;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application name constant
pub const APP_NAME: &str = "MultiZap";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the logging system
pub fn init_logging(debug: bool) {
    let default_filter = if debug {
        "multizap=debug,eframe=warn,egui=warn"
    } else {
        "multizap=info,eframe=warn,egui=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
