//! Concrete rendering engines

mod chromium;
mod devtools;

pub use chromium::{browser_args, locate_browser, ChromiumEngine, ChromiumOptions};
pub use devtools::{BrowserCommand, DevToolsError};
