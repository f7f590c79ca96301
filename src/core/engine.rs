//! Rendering engine interface - What the core needs from the hosted browser

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::mpsc;

use super::capability::SessionBudget;
use super::permission::{PermissionDecision, PermissionRequest};
use super::session::DisplaySlot;

/// Script run on every keep-alive tick when the engine has no cheaper signal
pub const KEEP_ALIVE_SCRIPT: &str = "void 0;";

/// Opaque reference to an engine storage context (cookies, cache, local storage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageHandle(pub u64);

/// Opaque reference to one rendering session inside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle and permission events raised by the engine for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    LoadFinished { success: bool },
    PermissionRequested(PermissionRequest),
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage path {path:?} is not usable: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch rendering session: {0}")]
    Launch(String),
    #[error("unknown engine handle {0}")]
    UnknownHandle(u64),
    #[error("rendering session is no longer running")]
    SessionGone,
}

/// Embedded browser engine as seen by sessions.
///
/// Storage contexts and sessions are separate so that several sessions can
/// share one context. Events for a session are delivered on the sender passed
/// to `create_session`, in the order the engine produced them.
///
/// Calls are made from both the UI thread and the session runtime, never
/// while a session lock is held. Implementations must not block for long.
pub trait RenderingEngine: Send + Sync {
    fn open_storage(
        &self,
        storage_path: &Path,
        budget: &SessionBudget,
    ) -> Result<StorageHandle, EngineError>;

    /// Register a session shown in `slot`; nothing is loaded until `navigate`
    fn create_session(
        &self,
        storage: StorageHandle,
        slot: DisplaySlot,
        events: EngineEventSender,
    ) -> Result<SessionHandle, EngineError>;

    fn navigate(&self, handle: SessionHandle, url: &str) -> Result<(), EngineError>;

    /// Reload the current page, falling back to a fresh navigation to `url`
    fn reload(&self, handle: SessionHandle, url: &str) -> Result<(), EngineError> {
        self.navigate(handle, url)
    }

    fn run_script(&self, handle: SessionHandle, script: &str) -> Result<(), EngineError>;

    /// Trivial activity signal that keeps the host from backgrounding the session
    fn keep_alive(&self, handle: SessionHandle) -> Result<(), EngineError> {
        self.run_script(handle, KEEP_ALIVE_SCRIPT)
    }

    fn set_permission_result(
        &self,
        handle: SessionHandle,
        request: &PermissionRequest,
        decision: PermissionDecision,
    ) -> Result<(), EngineError>;

    /// Tear down a session; unknown handles are ignored
    fn release_session(&self, handle: SessionHandle);

    /// Drop a storage context; the on-disk directory is left in place
    fn release_storage(&self, storage: StorageHandle);
}
