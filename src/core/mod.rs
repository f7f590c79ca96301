//! Core module - Profiles, capability detection, permissions, and sessions

pub mod capability;
pub mod engine;
pub mod orchestrator;
pub mod permission;
pub mod profile;
pub mod registry;
pub mod session;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{detect, HostCapability, ResourceTier, SessionBudget, SysinfoProbe};
pub use engine::{EngineError, EngineEvent, RenderingEngine};
pub use orchestrator::{DisplaySurface, Orchestrator, OrchestratorError, SlotView};
pub use permission::{PermissionArbiter, PermissionDecision, PromptProvider};
pub use profile::{Profile, ProfileColor, ProfileId};
pub use registry::{ProfileRegistry, ProfileUpdate, RegistryError};
pub use session::{Session, SessionState, StorageBinding};
pub use settings::Settings;
