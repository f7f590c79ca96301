//! Application settings management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::permission::{TrustPolicy, UntrustedMediaPolicy};
use super::session::StorageBinding;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "MULTIZAP_DATA_DIR";

pub const DEFAULT_SERVICE_URL: &str = "https://web.whatsapp.com";

/// Desktop Chrome user agent the service accepts
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (900, 760);

/// Smallest session window the service renders usably in
const MIN_WINDOW_SIZE: (u32, u32) = (400, 300);

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to write settings to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Service
    /// Address every session navigates to
    pub service_url: String,
    /// Domains whose media requests are granted without asking
    pub trusted_domains: Vec<String>,
    /// What to do with media requests from any other origin
    pub untrusted_media: UntrustedMediaPolicy,
    /// Require a user gesture before audio/video playback
    pub playback_requires_user_gesture: bool,

    // Engine
    /// Whether sessions of one profile share a storage context across restarts
    pub storage_binding: StorageBinding,
    /// User agent override
    pub user_agent: Option<String>,
    /// Browser executable; searched on PATH when unset
    pub browser_path: Option<PathBuf>,
    /// Width and height of each session window, tiled by grid cell
    pub session_window_size: (u32, u32),

    // Advanced
    /// Custom data directory
    pub data_directory: Option<PathBuf>,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            trusted_domains: vec!["whatsapp.com".to_string()],
            untrusted_media: UntrustedMediaPolicy::Ask,
            playback_requires_user_gesture: false,

            storage_binding: StorageBinding::Exclusive,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            browser_path: None,
            session_window_size: DEFAULT_WINDOW_SIZE,

            data_directory: None,
            debug_logging: false,
        }
    }
}

impl Settings {
    /// Default location of the settings file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME)
            .join("settings.json")
    }

    /// Load settings; a missing or corrupt file yields defaults
    pub fn load(path: &Path) -> Self {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring corrupt settings file {:?}: {}", path, e);
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                warn!("Failed to read settings from {:?}: {}", path, e);
                Settings::default()
            }
        };
        settings.validate();
        settings
    }

    /// Load settings, writing the defaults out on first run so they can be edited
    pub fn load_or_create(path: &Path) -> Self {
        let settings = Self::load(path);
        if !path.exists() {
            if let Err(e) = settings.save(path) {
                warn!("Could not create settings file: {}", e);
            }
        }
        settings
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        let write = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write)?;
        }
        std::fs::write(path, json).map_err(write)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Get the data directory, using default if not set
    pub fn get_data_directory(&self) -> PathBuf {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        self.data_directory.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(crate::APP_NAME)
        })
    }

    /// Get the registry file path
    pub fn get_registry_path(&self) -> PathBuf {
        self.get_data_directory().join("profiles_config.json")
    }

    /// Get the profiles directory
    pub fn get_profiles_directory(&self) -> PathBuf {
        self.get_data_directory().join("profiles")
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy {
            trusted_domains: self.trusted_domains.clone(),
            untrusted_media: self.untrusted_media,
        }
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.service_url = self.service_url.trim().to_string();
        if self.service_url.is_empty() {
            self.service_url = DEFAULT_SERVICE_URL.to_string();
        }

        self.trusted_domains = self
            .trusted_domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        if self
            .user_agent
            .as_ref()
            .is_some_and(|ua| ua.trim().is_empty())
        {
            self.user_agent = None;
        }
        if self
            .browser_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.browser_path = None;
        }

        let (width, height) = self.session_window_size;
        self.session_window_size = (width.max(MIN_WINDOW_SIZE.0), height.max(MIN_WINDOW_SIZE.1));
    }
}
