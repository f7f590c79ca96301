//! Profile model - A named, colored identity bound to one storage directory

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color given to newly created profiles
pub const DEFAULT_PROFILE_COLOR: &str = "#b71c1c";

/// Validation failures for profile fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("invalid profile id '{0}': must be a single, non-empty path segment")]
    InvalidProfileId(String),
    #[error("invalid color '{0}': expected #RRGGBB")]
    InvalidColor(String),
    #[error("profile name must not be empty")]
    EmptyName,
}

/// Stable identifier of a profile, also used as its storage directory name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

impl ProfileId {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ProfileError> {
        let raw = raw.as_ref().trim();
        let valid = !raw.is_empty()
            && raw != "."
            && raw != ".."
            && !raw
                .chars()
                .any(|c| c == '/' || c == '\\' || c == ':' || c.is_control());
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ProfileError::InvalidProfileId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProfileId {
    type Error = ProfileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// RGB color in `#rrggbb` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ProfileColor {
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ProfileError> {
        let raw = raw.as_ref().trim();
        let invalid = || ProfileError::InvalidColor(raw.to_string());

        let hex = raw.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Format as lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for ProfileColor {
    fn default() -> Self {
        Self::from_rgb(0xb7, 0x1c, 0x1c)
    }
}

impl TryFrom<String> for ProfileColor {
    type Error = ProfileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProfileColor> for String {
    fn from(color: ProfileColor) -> Self {
        color.to_hex()
    }
}

impl std::fmt::Display for ProfileColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn default_true() -> bool {
    true
}

/// A persisted messaging identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique, immutable identifier
    pub profile_id: ProfileId,
    /// Display label
    pub name: String,
    /// Header and border color
    pub color: ProfileColor,
    /// Whether the host starts a session for this profile
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Profile {
    pub fn new(
        profile_id: ProfileId,
        name: impl Into<String>,
        color: ProfileColor,
    ) -> Result<Self, ProfileError> {
        let name = validate_name(name.into())?;
        Ok(Self {
            profile_id,
            name,
            color,
            enabled: true,
        })
    }
}

/// Trim a display name and reject it if nothing is left
pub fn validate_name(name: String) -> Result<String, ProfileError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(ProfileError::EmptyName)
    } else {
        Ok(trimmed.to_string())
    }
}
