//! Orchestrator - One session per enabled profile, placed on a 2-column grid

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use super::capability::{HostCapability, SessionBudget};
use super::engine::{RenderingEngine, StorageHandle};
use super::permission::{PermissionArbiter, PromptProvider};
use super::profile::{Profile, ProfileId};
use super::registry::ProfileRegistry;
use super::session::{
    DisplaySlot, Session, SessionConfig, SessionServices, SessionSnapshot, SessionStorage,
    StorageBinding,
};

/// Number of columns in the session grid
pub const GRID_COLUMNS: usize = 2;

/// Grid cell for the n-th enabled profile
pub fn grid_cell(index: usize) -> DisplaySlot {
    DisplaySlot {
        row: index / GRID_COLUMNS,
        col: index % GRID_COLUMNS,
    }
}

/// Presentation collaborator that owns the display regions
pub trait DisplaySurface {
    fn create_display_region(&self, row: usize, col: usize) -> DisplaySlot;
}

/// Surface that hands back the requested cell unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct GridSurface;

impl DisplaySurface for GridSurface {
    fn create_display_region(&self, row: usize, col: usize) -> DisplaySlot {
        DisplaySlot { row, col }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no enabled profiles")]
    NoEnabledProfiles,
}

/// What ended up in a grid cell
pub enum SlotOutcome {
    Running(Session),
    /// Session creation failed; the message is shown in place of the session
    Failed(String),
}

pub struct SlotEntry {
    pub slot: DisplaySlot,
    pub profile: Profile,
    pub outcome: SlotOutcome,
}

impl SlotEntry {
    pub fn session(&self) -> Option<&Session> {
        match &self.outcome {
            SlotOutcome::Running(session) => Some(session),
            SlotOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            SlotOutcome::Running(_) => None,
            SlotOutcome::Failed(message) => Some(message),
        }
    }
}

/// Display-ready view of one grid cell
#[derive(Debug, Clone)]
pub enum SlotView {
    Session(SessionSnapshot),
    Failed {
        slot: DisplaySlot,
        profile: Profile,
        error: String,
    },
}

impl SlotView {
    pub fn slot(&self) -> DisplaySlot {
        match self {
            Self::Session(snapshot) => snapshot.slot,
            Self::Failed { slot, .. } => *slot,
        }
    }
}

/// Inputs of the last successful `start`, kept for `restart_all`
struct Plan {
    placements: Vec<(DisplaySlot, Profile)>,
    budget: SessionBudget,
    profiles_root: PathBuf,
}

/// Owns every session of a hosting run
pub struct Orchestrator {
    services: SessionServices,
    storage_binding: StorageBinding,
    service_url: String,
    shared_storage: HashMap<ProfileId, StorageHandle>,
    slots: Vec<SlotEntry>,
    plan: Option<Plan>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn RenderingEngine>,
        arbiter: Arc<PermissionArbiter>,
        prompt: Arc<dyn PromptProvider>,
        storage_binding: StorageBinding,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            services: SessionServices {
                engine,
                arbiter,
                prompt,
            },
            storage_binding,
            service_url: service_url.into(),
            shared_storage: HashMap::new(),
            slots: Vec::new(),
            plan: None,
        }
    }

    pub fn storage_binding(&self) -> StorageBinding {
        self.storage_binding
    }

    /// Create and load one session per enabled profile.
    ///
    /// Must run inside a tokio runtime. Any sessions from a previous start are
    /// disposed first.
    pub fn start(
        &mut self,
        registry: &ProfileRegistry,
        capability: &HostCapability,
        surface: &dyn DisplaySurface,
    ) -> Result<&[SlotEntry], OrchestratorError> {
        self.shutdown();

        let enabled = registry.get_enabled();
        if enabled.is_empty() {
            warn!("No enabled profiles in {:?}", registry.config_path());
            return Err(OrchestratorError::NoEnabledProfiles);
        }

        let placements = enabled
            .into_iter()
            .enumerate()
            .map(|(index, profile)| {
                let cell = grid_cell(index);
                (surface.create_display_region(cell.row, cell.col), profile)
            })
            .collect();

        info!(
            "Starting sessions with {} tier budget ({} binding)",
            capability.tier.label(),
            self.storage_binding.label()
        );
        self.plan = Some(Plan {
            placements,
            budget: capability.budget,
            profiles_root: registry.profiles_root().to_path_buf(),
        });
        self.launch();
        Ok(&self.slots)
    }

    pub fn slots(&self) -> &[SlotEntry] {
        &self.slots
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().filter_map(SlotEntry::session)
    }

    pub fn running_count(&self) -> usize {
        self.sessions().count()
    }

    pub fn views(&self) -> Vec<SlotView> {
        self.slots
            .iter()
            .map(|entry| match &entry.outcome {
                SlotOutcome::Running(session) => SlotView::Session(session.snapshot()),
                SlotOutcome::Failed(error) => SlotView::Failed {
                    slot: entry.slot,
                    profile: entry.profile.clone(),
                    error: error.clone(),
                },
            })
            .collect()
    }

    /// Reload the session at `index`; failed slots and bad indices are ignored
    pub fn reload(&self, index: usize) {
        let Some(session) = self.slots.get(index).and_then(SlotEntry::session) else {
            return;
        };
        if let Err(e) = session.reload() {
            warn!("Reload of '{}' failed: {}", session.config().label, e);
        }
    }

    /// Dispose everything and recreate from the last start's profile list
    pub fn restart_all(&mut self) {
        if self.plan.is_none() {
            return;
        }
        info!("Restarting all sessions");
        self.dispose_sessions();
        self.launch();
    }

    /// Dispose every live session in creation order
    pub fn shutdown(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        info!("Shutting down {} session(s)", self.running_count());
        self.dispose_sessions();
        self.plan = None;
    }

    fn dispose_sessions(&mut self) {
        for entry in self.slots.drain(..) {
            if let SlotOutcome::Running(session) = entry.outcome {
                session.dispose();
            }
        }
    }

    fn launch(&mut self) {
        let Some(plan) = self.plan.take() else {
            return;
        };

        for (slot, profile) in &plan.placements {
            let outcome = match self.create_session(&plan, *slot, profile) {
                Ok(session) => {
                    if let Err(e) = session.load() {
                        warn!("Session for '{}' did not start loading: {}", profile.name, e);
                    }
                    SlotOutcome::Running(session)
                }
                Err(message) => {
                    error!("{}", message);
                    SlotOutcome::Failed(message)
                }
            };
            self.slots.push(SlotEntry {
                slot: *slot,
                profile: profile.clone(),
                outcome,
            });
        }

        info!(
            "{} of {} session(s) running",
            self.running_count(),
            plan.placements.len()
        );
        self.plan = Some(plan);
    }

    fn create_session(
        &mut self,
        plan: &Plan,
        slot: DisplaySlot,
        profile: &Profile,
    ) -> Result<Session, String> {
        let storage_path = plan.profiles_root.join(profile.profile_id.as_str());
        let config = SessionConfig {
            profile_id: profile.profile_id.clone(),
            label: profile.name.clone(),
            color: profile.color,
            budget: plan.budget,
            storage_path,
            service_url: self.service_url.clone(),
            slot,
        };

        let storage = match self.storage_binding {
            StorageBinding::Exclusive => SessionStorage::Exclusive,
            StorageBinding::Shared => SessionStorage::Borrowed(self.shared_storage_for(&config)?),
        };

        Session::create(config, storage, self.services.clone()).map_err(|e| e.to_string())
    }

    fn shared_storage_for(&mut self, config: &SessionConfig) -> Result<StorageHandle, String> {
        if let Some(handle) = self.shared_storage.get(&config.profile_id) {
            return Ok(*handle);
        }
        let handle = self
            .services
            .engine
            .open_storage(&config.storage_path, &config.budget)
            .map_err(|e| {
                format!(
                    "failed to create session for profile '{}': {}",
                    config.profile_id, e
                )
            })?;
        self.shared_storage.insert(config.profile_id.clone(), handle);
        Ok(handle)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
        for (_, storage) in self.shared_storage.drain() {
            self.services.engine.release_storage(storage);
        }
    }
}
