//! Session - One isolated rendering context bound to one profile

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::capability::SessionBudget;
use super::engine::{
    EngineError, EngineEvent, EngineEventReceiver, RenderingEngine, SessionHandle, StorageHandle,
};
use super::permission::{PermissionArbiter, PermissionRequest, PromptProvider};
use super::profile::{ProfileColor, ProfileId};

/// Unique identifier for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Storage and budget bound, nothing loaded yet
    Created,
    /// Navigation to the service issued
    Loading,
    /// Service loaded and branded
    Ready,
    /// Reload requested, navigation about to be reissued
    Reloading,
    /// Released; storage stays on disk
    Disposed,
}

impl SessionState {
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Disposed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Loading => "Loading",
            Self::Ready => "Ready",
            Self::Reloading => "Reloading",
            Self::Disposed => "Disposed",
        }
    }
}

/// Whether a session's storage context is private or borrowed from a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StorageBinding {
    /// Each session opens and releases its own storage context
    #[default]
    Exclusive,
    /// Sessions reuse a context per profile that outlives them
    Shared,
}

impl StorageBinding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exclusive => "Exclusive",
            Self::Shared => "Shared",
        }
    }
}

/// Cell of the display grid a session is shown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplaySlot {
    pub row: usize,
    pub col: usize,
}

impl std::fmt::Display for DisplaySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Everything a session is created from
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub profile_id: ProfileId,
    pub label: String,
    pub color: ProfileColor,
    pub budget: SessionBudget,
    pub storage_path: PathBuf,
    pub service_url: String,
    pub slot: DisplaySlot,
}

/// Collaborators shared by every session of a host
#[derive(Clone)]
pub struct SessionServices {
    pub engine: Arc<dyn RenderingEngine>,
    pub arbiter: Arc<PermissionArbiter>,
    pub prompt: Arc<dyn PromptProvider>,
}

/// Storage context handed to `Session::create`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStorage {
    /// Open a fresh context and release it on dispose
    Exclusive,
    /// Use a context owned by someone else
    Borrowed(StorageHandle),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create session for profile '{profile_id}': {source}")]
    Creation {
        profile_id: ProfileId,
        #[source]
        source: EngineError,
    },
    #[error("navigation failed: {0}")]
    Navigation(#[source] EngineError),
    #[error("session has been disposed")]
    Disposed,
}

/// One-shot post-load customization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branding {
    Pending,
    Applied,
}

struct SessionInner {
    state: SessionState,
    branding: Branding,
    handle: SessionHandle,
    storage: StorageHandle,
    owns_storage: bool,
    /// Bumped per navigation so a superseded engine result is ignored
    navigation: u64,
    driver: Option<JoinHandle<()>>,
    keep_alive: Option<JoinHandle<()>>,
    ready_at: Option<DateTime<Utc>>,
    last_keep_alive: Option<DateTime<Utc>>,
    keep_alive_ticks: u64,
    reload_count: u32,
    last_error: Option<String>,
}

struct SessionShared {
    id: SessionId,
    config: SessionConfig,
    services: SessionServices,
    inner: Mutex<SessionInner>,
    /// Held for the duration of a keep-alive engine call
    tick_gate: Mutex<()>,
}

/// Point-in-time view of a session for display
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub profile_id: ProfileId,
    pub label: String,
    pub color: ProfileColor,
    pub slot: DisplaySlot,
    pub state: SessionState,
    pub branded: bool,
    pub created_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub last_keep_alive: Option<DateTime<Utc>>,
    pub keep_alive_ticks: u64,
    pub reload_count: u32,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    /// Time since the session first became ready
    pub fn uptime(&self) -> Option<chrono::Duration> {
        self.ready_at.map(|ready| Utc::now() - ready)
    }

    /// Format uptime as human-readable string
    pub fn uptime_string(&self) -> String {
        match self.uptime() {
            Some(duration) => {
                let secs = duration.num_seconds().max(0);
                if secs < 60 {
                    format!("{}s", secs)
                } else if secs < 3600 {
                    format!("{}m {}s", secs / 60, secs % 60)
                } else if secs < 86400 {
                    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
                } else {
                    format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
                }
            }
            None => "-".to_string(),
        }
    }
}

/// A live rendering session.
///
/// Engine events are consumed by a driver task, so `create` must be called
/// from within a tokio runtime. Dropping a session disposes it.
pub struct Session {
    shared: Arc<SessionShared>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Bind storage and budget and register with the engine. No navigation yet.
    pub fn create(
        config: SessionConfig,
        storage: SessionStorage,
        services: SessionServices,
    ) -> Result<Self, SessionError> {
        let engine = &services.engine;
        let creation_error = |source| SessionError::Creation {
            profile_id: config.profile_id.clone(),
            source,
        };

        let (storage, owns_storage) = match storage {
            SessionStorage::Exclusive => (
                engine
                    .open_storage(&config.storage_path, &config.budget)
                    .map_err(creation_error)?,
                true,
            ),
            SessionStorage::Borrowed(handle) => (handle, false),
        };

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = match engine.create_session(storage, config.slot, tx) {
            Ok(handle) => handle,
            Err(e) => {
                if owns_storage {
                    engine.release_storage(storage);
                }
                return Err(creation_error(e));
            }
        };

        let id = SessionId::new();
        info!(
            "Created session {} for profile '{}' at {:?} (engine {})",
            id, config.profile_id, config.storage_path, handle
        );

        let shared = Arc::new(SessionShared {
            id,
            config,
            services,
            inner: Mutex::new(SessionInner {
                state: SessionState::Created,
                branding: Branding::Pending,
                handle,
                storage,
                owns_storage,
                navigation: 0,
                driver: None,
                keep_alive: None,
                ready_at: None,
                last_keep_alive: None,
                keep_alive_ticks: 0,
                reload_count: 0,
                last_error: None,
            }),
            tick_gate: Mutex::new(()),
        });

        let driver = tokio::spawn(drive(Arc::clone(&shared), rx));
        shared.lock().driver = Some(driver);

        Ok(Self {
            shared,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn engine_handle(&self) -> SessionHandle {
        self.shared.lock().handle
    }

    /// Issue the first navigation to the service (`Created -> Loading`)
    pub fn load(&self) -> Result<(), SessionError> {
        let (handle, navigation) = {
            let mut inner = self.shared.lock();
            match inner.state {
                SessionState::Created => {}
                SessionState::Disposed => return Err(SessionError::Disposed),
                state => {
                    debug!("Session {} already loading ({:?})", self.shared.id, state);
                    return Ok(());
                }
            }
            inner.state = SessionState::Loading;
            inner.navigation += 1;
            (inner.handle, inner.navigation)
        };

        let result = self
            .shared
            .services
            .engine
            .navigate(handle, &self.shared.config.service_url);
        self.shared.finish_navigation(navigation, result)
    }

    /// Navigate again (`-> Reloading -> Loading`); branding is not re-armed
    pub fn reload(&self) -> Result<(), SessionError> {
        let (handle, navigation) = {
            let mut inner = self.shared.lock();
            if inner.state == SessionState::Disposed {
                return Err(SessionError::Disposed);
            }
            inner.state = SessionState::Reloading;
            inner.reload_count += 1;
            inner.navigation += 1;
            (inner.handle, inner.navigation)
        };

        info!(
            "Reloading session {} ('{}')",
            self.shared.id, self.shared.config.label
        );
        let result = self
            .shared
            .services
            .engine
            .reload(handle, &self.shared.config.service_url);
        self.shared.finish_navigation(navigation, result)
    }

    /// Release engine resources and cancel the keep-alive. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.lock();
        let config = &self.shared.config;
        SessionSnapshot {
            id: self.shared.id,
            profile_id: config.profile_id.clone(),
            label: config.label.clone(),
            color: config.color,
            slot: config.slot,
            state: inner.state,
            branded: inner.branding == Branding::Applied,
            created_at: self.created_at,
            ready_at: inner.ready_at,
            last_keep_alive: inner.last_keep_alive,
            keep_alive_ticks: inner.keep_alive_ticks,
            reload_count: inner.reload_count,
            last_error: inner.last_error.clone(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the engine's answer to a navigation unless a newer one superseded it
    fn finish_navigation(
        &self,
        navigation: u64,
        result: Result<(), EngineError>,
    ) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.navigation != navigation || inner.state == SessionState::Disposed {
            debug!("Session {} ignoring result of a superseded navigation", self.id);
            return result.map_err(SessionError::Navigation);
        }
        if inner.state == SessionState::Reloading {
            inner.state = SessionState::Loading;
        }

        match result {
            Ok(()) => {
                debug!("Session {} navigating to {}", self.id, self.config.service_url);
                Ok(())
            }
            Err(e) => {
                warn!("Session {} failed to navigate: {}", self.id, e);
                inner.last_error = Some(e.to_string());
                Err(SessionError::Navigation(e))
            }
        }
    }

    fn on_load_finished(self: &Arc<Self>, success: bool) {
        let brand = {
            let mut inner = self.lock();
            match inner.state {
                // A fast engine may finish before the reload call returned
                SessionState::Loading | SessionState::Reloading if success => {
                    inner.state = SessionState::Ready;
                    inner.last_error = None;
                    if inner.ready_at.is_none() {
                        inner.ready_at = Some(Utc::now());
                    }
                    info!("Session {} ('{}') is ready", self.id, self.config.label);

                    self.restart_keep_alive(&mut inner);

                    let pending = inner.branding == Branding::Pending;
                    inner.branding = Branding::Applied;
                    pending.then_some(inner.handle)
                }
                SessionState::Loading | SessionState::Reloading => {
                    warn!("Session {} failed to load {}", self.id, self.config.service_url);
                    inner.last_error = Some("Page failed to load".to_string());
                    None
                }
                state => {
                    debug!(
                        "Session {} ignoring load completion in state {:?}",
                        self.id, state
                    );
                    None
                }
            }
        };

        if let Some(handle) = brand {
            self.apply_branding(handle);
        }
    }

    fn apply_branding(&self, handle: SessionHandle) {
        let script = branding_script(&self.config.color);
        match self.services.engine.run_script(handle, &script) {
            Ok(()) => debug!("Session {} branded with {}", self.id, self.config.color),
            Err(e) => warn!("Session {} could not apply branding: {}", self.id, e),
        }
    }

    fn restart_keep_alive(self: &Arc<Self>, inner: &mut SessionInner) {
        if let Some(previous) = inner.keep_alive.take() {
            previous.abort();
        }

        let period = Duration::from_millis(self.config.budget.keep_alive_interval_ms.max(1));
        inner.keep_alive = Some(tokio::spawn(keep_alive_loop(Arc::clone(self), period)));
    }

    /// One keep-alive tick; returns false once the session is gone
    fn tick_keep_alive(&self) -> bool {
        let _tick = self.tick_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Disposed => return false,
                SessionState::Ready => {}
                _ => return true,
            }
            inner.keep_alive_ticks += 1;
            inner.last_keep_alive = Some(Utc::now());
            inner.handle
        };

        if let Err(e) = self.services.engine.keep_alive(handle) {
            warn!("Keep-alive for session {} failed: {}", self.id, e);
            self.lock().last_error = Some(e.to_string());
        }
        true
    }

    fn on_permission_request(&self, request: PermissionRequest) {
        if !self.lock().state.is_live() {
            return;
        }

        let decision = self.services.arbiter.evaluate(
            &request,
            &self.config.label,
            self.services.prompt.as_ref(),
        );

        // The prompt may have outlived the session
        let handle = {
            let inner = self.lock();
            if !inner.state.is_live() {
                debug!(
                    "Discarding {:?} for disposed session {}",
                    decision, self.id
                );
                return;
            }
            inner.handle
        };
        if let Err(e) = self
            .services
            .engine
            .set_permission_result(handle, &request, decision)
        {
            warn!("Session {} could not apply permission result: {}", self.id, e);
        }
    }

    fn dispose(&self) {
        let (handle, owned_storage) = {
            let mut inner = self.lock();
            if inner.state == SessionState::Disposed {
                return;
            }
            inner.state = SessionState::Disposed;
            inner.navigation += 1;

            if let Some(keep_alive) = inner.keep_alive.take() {
                keep_alive.abort();
            }
            if let Some(driver) = inner.driver.take() {
                driver.abort();
            }
            (inner.handle, inner.owns_storage.then_some(inner.storage))
        };

        // Wait out a tick that passed the state check before we got here
        drop(self.tick_gate.lock().unwrap_or_else(PoisonError::into_inner));

        let engine = &self.services.engine;
        engine.release_session(handle);
        if let Some(storage) = owned_storage {
            engine.release_storage(storage);
        }

        info!(
            "Disposed session {} ('{}'); data kept at {:?}",
            self.id, self.config.label, self.config.storage_path
        );
    }
}

/// Consume engine events for one session, in order
async fn drive(shared: Arc<SessionShared>, mut events: EngineEventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::LoadFinished { success } => shared.on_load_finished(success),
            EngineEvent::PermissionRequested(request) => {
                // The prompt blocks; keep it off this session's event stream
                let shared = Arc::clone(&shared);
                tokio::task::spawn_blocking(move || shared.on_permission_request(request));
            }
        }
    }
    debug!("Event stream for session {} closed", shared.id);
}

async fn keep_alive_loop(shared: Arc<SessionShared>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !shared.tick_keep_alive() {
            break;
        }
    }
}

/// Script that colors the service header and side pane with the profile color
pub fn branding_script(color: &ProfileColor) -> String {
    let color = color.to_hex();
    format!(
        r#"(function() {{
    const style = document.createElement('style');
    style.textContent = `
        header {{ background-color: {color} !important; }}
        #side {{ border-right: 5px solid {color} !important; }}
    `;
    document.head.appendChild(style);
}})();"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::permission::{Capability, PermissionDecision};
    use crate::core::testing::{wait_until, GatedPrompt, RecordingEngine, StaticPrompt};

    const TEST_BUDGET: SessionBudget = SessionBudget {
        cache_size_mb: 20,
        keep_alive_interval_ms: 1_000,
        max_heap_mb: 256,
        raster_threads: 1,
    };

    fn config(profile: &str) -> SessionConfig {
        SessionConfig {
            profile_id: ProfileId::parse(profile).unwrap(),
            label: profile.to_uppercase(),
            color: ProfileColor::parse("#1b5e20").unwrap(),
            budget: TEST_BUDGET,
            storage_path: PathBuf::from("/tmp/profiles").join(profile),
            service_url: "https://web.whatsapp.com".to_string(),
            slot: DisplaySlot { row: 0, col: 0 },
        }
    }

    fn services(engine: &Arc<RecordingEngine>, prompt: Arc<dyn PromptProvider>) -> SessionServices {
        SessionServices {
            engine: Arc::clone(engine) as Arc<dyn RenderingEngine>,
            arbiter: Arc::new(PermissionArbiter::default()),
            prompt,
        }
    }

    async fn ready_session(engine: &Arc<RecordingEngine>, profile: &str) -> Session {
        let session = Session::create(
            config(profile),
            SessionStorage::Exclusive,
            services(engine, Arc::new(StaticPrompt(Some(true)))),
        )
        .unwrap();
        session.load().unwrap();
        engine.emit(session.engine_handle(), EngineEvent::LoadFinished { success: true });
        wait_until(|| session.state() == SessionState::Ready).await;
        session
    }

    #[tokio::test]
    async fn test_lifecycle_states() {
        let engine = Arc::new(RecordingEngine::default());
        let session = Session::create(
            config("a"),
            SessionStorage::Exclusive,
            services(&engine, Arc::new(StaticPrompt(None))),
        )
        .unwrap();

        assert_eq!(session.state(), SessionState::Created);
        assert!(engine.navigations(session.engine_handle()).is_empty());

        session.load().unwrap();
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(
            engine.navigations(session.engine_handle()),
            vec!["https://web.whatsapp.com".to_string()]
        );

        engine.emit(session.engine_handle(), EngineEvent::LoadFinished { success: true });
        wait_until(|| session.state() == SessionState::Ready).await;

        session.dispose();
        assert_eq!(session.state(), SessionState::Disposed);
        assert!(matches!(session.reload(), Err(SessionError::Disposed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_branding_injected_once_across_reload() {
        let engine = Arc::new(RecordingEngine::default());
        let session = ready_session(&engine, "brand").await;
        let handle = session.engine_handle();

        session.reload().unwrap();
        assert_eq!(session.state(), SessionState::Loading);
        engine.emit(handle, EngineEvent::LoadFinished { success: true });
        wait_until(|| session.state() == SessionState::Ready).await;

        assert_eq!(engine.branding_count(handle), 1);
        assert_eq!(engine.navigations(handle).len(), 2);
        assert!(session.snapshot().branded);
        assert_eq!(session.snapshot().reload_count, 1);
    }

    #[tokio::test]
    async fn test_failed_load_stays_loading_until_reload() {
        let engine = Arc::new(RecordingEngine::default());
        let session = Session::create(
            config("flaky"),
            SessionStorage::Exclusive,
            services(&engine, Arc::new(StaticPrompt(None))),
        )
        .unwrap();
        let handle = session.engine_handle();
        session.load().unwrap();

        engine.emit(handle, EngineEvent::LoadFinished { success: false });
        wait_until(|| session.snapshot().last_error.is_some()).await;
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(engine.branding_count(handle), 0);

        session.reload().unwrap();
        engine.emit(handle, EngineEvent::LoadFinished { success: true });
        wait_until(|| session.state() == SessionState::Ready).await;
        assert_eq!(engine.branding_count(handle), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_ticks_and_stops_on_dispose() {
        let engine = Arc::new(RecordingEngine::default());
        let session = ready_session(&engine, "alive").await;
        let handle = session.engine_handle();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let ticks = engine.keep_alive_count(handle);
        assert!(ticks >= 3, "expected at least 3 ticks, got {}", ticks);

        session.dispose();
        let after_dispose = engine.keep_alive_count(handle);

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(engine.keep_alive_count(handle), after_dispose);
        assert!(engine.released_sessions().contains(&handle));
    }

    #[tokio::test]
    async fn test_creation_failure_reports_profile() {
        let engine = Arc::new(RecordingEngine::default());
        engine.fail_storage_for("broken");

        let result = Session::create(
            config("broken"),
            SessionStorage::Exclusive,
            services(&engine, Arc::new(StaticPrompt(None))),
        );
        match result {
            Err(SessionError::Creation { profile_id, .. }) => {
                assert_eq!(profile_id.as_str(), "broken")
            }
            _ => panic!("expected a creation error"),
        }
    }

    #[tokio::test]
    async fn test_borrowed_storage_is_not_released() {
        let engine = Arc::new(RecordingEngine::default());
        let storage = engine
            .open_storage(std::path::Path::new("/tmp/profiles/shared"), &TEST_BUDGET)
            .unwrap();

        let session = Session::create(
            config("shared"),
            SessionStorage::Borrowed(storage),
            services(&engine, Arc::new(StaticPrompt(None))),
        )
        .unwrap();
        session.dispose();

        assert!(engine.released_storage().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_permission_request_routed_through_arbiter() {
        let engine = Arc::new(RecordingEngine::default());
        let session = Session::create(
            config("perm"),
            SessionStorage::Exclusive,
            services(&engine, Arc::new(StaticPrompt(Some(false)))),
        )
        .unwrap();
        let handle = session.engine_handle();

        let trusted = PermissionRequest {
            origin: "https://web.whatsapp.com".to_string(),
            capability: Capability::AudioCapture,
        };
        let untrusted = PermissionRequest {
            origin: "https://evil.example".to_string(),
            capability: Capability::VideoCapture,
        };
        engine.emit(handle, EngineEvent::PermissionRequested(trusted.clone()));
        engine.emit(handle, EngineEvent::PermissionRequested(untrusted.clone()));

        wait_until(|| engine.permission_results(handle).len() == 2).await;
        let results = engine.permission_results(handle);
        assert!(results.contains(&(trusted, PermissionDecision::Grant)));
        assert!(results.contains(&(untrusted, PermissionDecision::Deny)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pending_prompt_blocks_nothing_and_is_discarded_after_dispose() {
        let engine = Arc::new(RecordingEngine::default());
        let gate = Arc::new(GatedPrompt::default());

        let asking = Session::create(
            config("asking"),
            SessionStorage::Exclusive,
            services(&engine, Arc::clone(&gate) as Arc<dyn PromptProvider>),
        )
        .unwrap();
        let other = Session::create(
            config("other"),
            SessionStorage::Exclusive,
            services(&engine, Arc::clone(&gate) as Arc<dyn PromptProvider>),
        )
        .unwrap();
        asking.load().unwrap();
        other.load().unwrap();

        engine.emit(
            asking.engine_handle(),
            EngineEvent::PermissionRequested(PermissionRequest {
                origin: "https://evil.example".to_string(),
                capability: Capability::AudioCapture,
            }),
        );
        wait_until(|| gate.pending() == 1).await;

        // The outstanding prompt does not hold up either session's load
        engine.emit(asking.engine_handle(), EngineEvent::LoadFinished { success: true });
        engine.emit(other.engine_handle(), EngineEvent::LoadFinished { success: true });
        wait_until(|| asking.state() == SessionState::Ready).await;
        wait_until(|| other.state() == SessionState::Ready).await;

        asking.dispose();
        gate.answer(true);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(engine.permission_results(asking.engine_handle()).is_empty());
        assert_eq!(asking.state(), SessionState::Disposed);
    }

    /// Two ready sessions ticking every 50ms on the current-thread runtime
    async fn ticking_pair(engine: &Arc<RecordingEngine>) -> (Arc<Session>, Session) {
        let fast = SessionBudget {
            keep_alive_interval_ms: 50,
            ..TEST_BUDGET
        };
        let mut sessions = Vec::new();
        for profile in ["slow", "busy"] {
            let session = Session::create(
                SessionConfig {
                    budget: fast,
                    ..config(profile)
                },
                SessionStorage::Exclusive,
                services(engine, Arc::new(StaticPrompt(None))),
            )
            .unwrap();
            session.load().unwrap();
            engine.emit(session.engine_handle(), EngineEvent::LoadFinished { success: true });
            wait_until(|| session.state() == SessionState::Ready).await;
            sessions.push(session);
        }
        let busy = sessions.pop().unwrap();
        let slow = sessions.pop().unwrap();
        (Arc::new(slow), busy)
    }

    #[tokio::test]
    async fn test_slow_reload_does_not_stall_other_sessions() {
        let engine = Arc::new(RecordingEngine::default());
        let (slow, busy) = ticking_pair(&engine).await;
        engine.set_slow_calls(Duration::from_millis(600));

        let before = engine.keep_alive_count(busy.engine_handle());
        let reloading = Arc::clone(&slow);
        let reload = tokio::task::spawn_blocking(move || reloading.reload());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let during = engine.keep_alive_count(busy.engine_handle()) - before;
        assert_eq!(slow.state(), SessionState::Reloading);

        reload.await.unwrap().unwrap();
        assert!(during >= 3, "only {} keep-alive ticks during the reload", during);
        assert_eq!(slow.state(), SessionState::Loading);
    }

    #[tokio::test]
    async fn test_slow_dispose_does_not_stall_other_sessions() {
        let engine = Arc::new(RecordingEngine::default());
        let (slow, busy) = ticking_pair(&engine).await;
        engine.set_slow_calls(Duration::from_millis(600));

        let before = engine.keep_alive_count(busy.engine_handle());
        let disposing = Arc::clone(&slow);
        let dispose = tokio::task::spawn_blocking(move || disposing.dispose());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let during = engine.keep_alive_count(busy.engine_handle()) - before;

        dispose.await.unwrap();
        assert!(during >= 3, "only {} keep-alive ticks during the dispose", during);
        assert!(engine.released_sessions().contains(&slow.engine_handle()));
    }

    #[tokio::test]
    async fn test_superseded_navigation_result_is_ignored() {
        let engine = Arc::new(RecordingEngine::default());
        let session = ready_session(&engine, "stale").await;
        engine.set_slow_calls(Duration::from_millis(200));

        let session = Arc::new(session);
        let reloading = Arc::clone(&session);
        let reload = tokio::task::spawn_blocking(move || reloading.reload());
        wait_until(|| session.state() == SessionState::Reloading).await;

        // A dispose while the engine is still navigating wins
        engine.set_slow_calls(Duration::ZERO);
        session.dispose();
        reload.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Disposed);
    }

    #[test]
    fn test_branding_script_uses_color() {
        let script = branding_script(&ProfileColor::parse("#ABCDEF").unwrap());
        assert!(script.contains("header { background-color: #abcdef !important; }"));
        assert!(script.contains("#side { border-right: 5px solid #abcdef !important; }"));
    }
}
