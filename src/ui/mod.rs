//! User interface module - egui front ends for the registry and the session host

mod components;
mod dashboard_app;
mod dialogs;
mod host_app;
mod message;
mod notifications;
mod prompt;
mod theme;

pub use dashboard_app::{host_executable, DashboardApp};
pub use host_app::{GridLayout, HostApp, HostSetup};
pub use message::show_message;
pub use prompt::{EguiPrompt, PromptQueue};
pub use theme::Theme;
