//! In-memory engine and prompt doubles shared by core tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::capability::SessionBudget;
use super::engine::{
    EngineError, EngineEvent, EngineEventSender, RenderingEngine, SessionHandle, StorageHandle,
    KEEP_ALIVE_SCRIPT,
};
use super::permission::{PermissionDecision, PermissionRequest, PromptProvider};
use super::session::DisplaySlot;

#[derive(Default)]
struct Recorded {
    next_handle: u64,
    storages: HashMap<StorageHandle, PathBuf>,
    sessions: HashMap<SessionHandle, (StorageHandle, EngineEventSender)>,
    slots: HashMap<SessionHandle, DisplaySlot>,
    creation_order: Vec<SessionHandle>,
    navigations: HashMap<SessionHandle, Vec<String>>,
    scripts: HashMap<SessionHandle, Vec<String>>,
    keep_alives: HashMap<SessionHandle, usize>,
    permission_results: HashMap<SessionHandle, Vec<(PermissionRequest, PermissionDecision)>>,
    released_sessions: Vec<SessionHandle>,
    released_storage: Vec<StorageHandle>,
    failing_profiles: HashSet<String>,
    slow_calls: Duration,
}

/// Engine that records every call and lets tests raise events
#[derive(Default)]
pub struct RecordingEngine {
    state: Mutex<Recorded>,
}

impl RecordingEngine {
    /// Make `open_storage` fail for storage paths ending in `profile`
    pub fn fail_storage_for(&self, profile: &str) {
        self.lock().failing_profiles.insert(profile.to_string());
    }

    /// Make `navigate` and `release_session` block the caller for `delay`
    pub fn set_slow_calls(&self, delay: Duration) {
        self.lock().slow_calls = delay;
    }

    pub fn slot_of(&self, handle: SessionHandle) -> Option<DisplaySlot> {
        self.lock().slots.get(&handle).copied()
    }

    pub fn emit(&self, handle: SessionHandle, event: EngineEvent) {
        if let Some((_, events)) = self.lock().sessions.get(&handle) {
            let _ = events.send(event);
        }
    }

    pub fn navigations(&self, handle: SessionHandle) -> Vec<String> {
        self.lock().navigations.get(&handle).cloned().unwrap_or_default()
    }

    pub fn branding_count(&self, handle: SessionHandle) -> usize {
        self.lock()
            .scripts
            .get(&handle)
            .map(|scripts| scripts.iter().filter(|s| s.contains("#side")).count())
            .unwrap_or(0)
    }

    pub fn keep_alive_count(&self, handle: SessionHandle) -> usize {
        self.lock().keep_alives.get(&handle).copied().unwrap_or(0)
    }

    pub fn permission_results(
        &self,
        handle: SessionHandle,
    ) -> Vec<(PermissionRequest, PermissionDecision)> {
        self.lock()
            .permission_results
            .get(&handle)
            .cloned()
            .unwrap_or_default()
    }

    pub fn opened_storage(&self) -> Vec<PathBuf> {
        let state = self.lock();
        let mut handles: Vec<_> = state.storages.iter().collect();
        handles.sort_by_key(|(handle, _)| handle.0);
        handles.into_iter().map(|(_, path)| path.clone()).collect()
    }

    pub fn storage_of(&self, handle: SessionHandle) -> Option<StorageHandle> {
        self.lock().sessions.get(&handle).map(|(storage, _)| *storage)
    }

    pub fn created_sessions(&self) -> Vec<SessionHandle> {
        self.lock().creation_order.clone()
    }

    pub fn released_sessions(&self) -> Vec<SessionHandle> {
        self.lock().released_sessions.clone()
    }

    pub fn released_storage(&self) -> Vec<StorageHandle> {
        self.lock().released_storage.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.state.lock().unwrap()
    }

    fn stall(&self) {
        let delay = self.lock().slow_calls;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl RenderingEngine for RecordingEngine {
    fn open_storage(
        &self,
        storage_path: &Path,
        _budget: &SessionBudget,
    ) -> Result<StorageHandle, EngineError> {
        let mut state = self.lock();
        let failing = state
            .failing_profiles
            .iter()
            .any(|profile| storage_path.ends_with(profile));
        if failing {
            return Err(EngineError::Storage {
                path: storage_path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }

        state.next_handle += 1;
        let handle = StorageHandle(state.next_handle);
        state.storages.insert(handle, storage_path.to_path_buf());
        Ok(handle)
    }

    fn create_session(
        &self,
        storage: StorageHandle,
        slot: DisplaySlot,
        events: EngineEventSender,
    ) -> Result<SessionHandle, EngineError> {
        let mut state = self.lock();
        if !state.storages.contains_key(&storage) {
            return Err(EngineError::UnknownHandle(storage.0));
        }
        state.next_handle += 1;
        let handle = SessionHandle(state.next_handle);
        state.sessions.insert(handle, (storage, events));
        state.slots.insert(handle, slot);
        state.creation_order.push(handle);
        Ok(handle)
    }

    fn navigate(&self, handle: SessionHandle, url: &str) -> Result<(), EngineError> {
        self.stall();
        self.lock()
            .navigations
            .entry(handle)
            .or_default()
            .push(url.to_string());
        Ok(())
    }

    fn run_script(&self, handle: SessionHandle, script: &str) -> Result<(), EngineError> {
        self.lock()
            .scripts
            .entry(handle)
            .or_default()
            .push(script.to_string());
        Ok(())
    }

    fn keep_alive(&self, handle: SessionHandle) -> Result<(), EngineError> {
        let mut state = self.lock();
        *state.keep_alives.entry(handle).or_default() += 1;
        state
            .scripts
            .entry(handle)
            .or_default()
            .push(KEEP_ALIVE_SCRIPT.to_string());
        Ok(())
    }

    fn set_permission_result(
        &self,
        handle: SessionHandle,
        request: &PermissionRequest,
        decision: PermissionDecision,
    ) -> Result<(), EngineError> {
        self.lock()
            .permission_results
            .entry(handle)
            .or_default()
            .push((request.clone(), decision));
        Ok(())
    }

    fn release_session(&self, handle: SessionHandle) {
        self.stall();
        let mut state = self.lock();
        state.sessions.remove(&handle);
        state.released_sessions.push(handle);
    }

    fn release_storage(&self, storage: StorageHandle) {
        self.lock().released_storage.push(storage);
    }
}

/// Prompt that always gives the same answer
pub struct StaticPrompt(pub Option<bool>);

impl PromptProvider for StaticPrompt {
    fn ask(&self, _title: &str, _message: &str) -> Option<bool> {
        self.0
    }
}

/// Prompt that blocks every caller until the test answers
#[derive(Default)]
pub struct GatedPrompt {
    answer: Mutex<Option<bool>>,
    answered: Condvar,
    waiting: AtomicUsize,
}

impl GatedPrompt {
    pub fn pending(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn answer(&self, granted: bool) {
        *self.answer.lock().unwrap() = Some(granted);
        self.answered.notify_all();
    }
}

impl PromptProvider for GatedPrompt {
    fn ask(&self, _title: &str, _message: &str) -> Option<bool> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let guard = self.answer.lock().unwrap();
        let guard = self
            .answered
            .wait_while(guard, |answer| answer.is_none())
            .unwrap();
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        *guard
    }
}

/// Poll `condition` until it holds, failing the test after a while
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
