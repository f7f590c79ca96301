//! Chromium engine - One browser process per session, driven over DevTools

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::devtools::{self, BrowserCommand};
use crate::core::capability::{ResourceTier, SessionBudget};
use crate::core::engine::{
    EngineError, EngineEventSender, RenderingEngine, SessionHandle, StorageHandle,
};
use crate::core::permission::{PermissionDecision, PermissionRequest};
use crate::core::session::DisplaySlot;
use crate::core::settings::Settings;
use crate::platform;

/// Executables tried in order when no browser is configured
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "microsoft-edge",
    "msedge",
    "chrome",
];

#[cfg(windows)]
const WELL_KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(target_os = "macos")]
const WELL_KNOWN_PATHS: &[&str] = &[
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(not(any(windows, target_os = "macos")))]
const WELL_KNOWN_PATHS: &[&str] = &["/usr/bin/chromium", "/snap/bin/chromium"];

/// Launch options shared by every session
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub browser_path: PathBuf,
    pub user_agent: Option<String>,
    pub playback_requires_user_gesture: bool,
    /// Size of one grid cell's browser window in pixels
    pub window_size: (u32, u32),
    /// How long a fresh browser may take to open its DevTools endpoint
    pub connect_timeout: Duration,
    /// Wait between each step of stopping a browser
    pub shutdown_grace: Duration,
}

impl ChromiumOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, EngineError> {
        Ok(Self {
            browser_path: locate_browser(settings.browser_path.as_deref())?,
            user_agent: settings.user_agent.clone(),
            playback_requires_user_gesture: settings.playback_requires_user_gesture,
            window_size: settings.session_window_size,
            connect_timeout: Duration::from_secs(20),
            shutdown_grace: Duration::from_millis(1500),
        })
    }
}

/// Find a Chromium-family browser, preferring an explicit path
pub fn locate_browser(explicit: Option<&Path>) -> Result<PathBuf, EngineError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(EngineError::Launch(format!(
            "configured browser not found: {}",
            path.display()
        )));
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&search_path) {
        for name in BROWSER_CANDIDATES {
            let candidate = dir.join(executable_name(name));
            if candidate.is_file() {
                debug!("Found browser at {:?}", candidate);
                return Ok(candidate);
            }
        }
    }

    WELL_KNOWN_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .ok_or_else(|| EngineError::Launch("no Chromium-based browser found".to_string()))
}

fn executable_name(name: &str) -> OsString {
    let mut name = OsString::from(name);
    if cfg!(windows) {
        name.push(".exe");
    }
    name
}

/// Command-line arguments for one session's browser.
///
/// The window opens blank at its grid cell; the page is loaded over DevTools
/// once the session is attached, so no event from it is missed.
pub fn browser_args(
    storage_path: &Path,
    budget: &SessionBudget,
    slot: DisplaySlot,
    options: &ChromiumOptions,
) -> Vec<OsString> {
    let mut user_data_dir = OsString::from("--user-data-dir=");
    user_data_dir.push(storage_path.as_os_str());

    let (width, height) = options.window_size;
    let x = slot.col as u64 * u64::from(width);
    let y = slot.row as u64 * u64::from(height);

    let mut args = vec![
        user_data_dir,
        "--app=about:blank".into(),
        "--remote-debugging-port=0".into(),
        format!("--window-position={},{}", x, y).into(),
        format!("--window-size={},{}", width, height).into(),
        format!(
            "--disk-cache-size={}",
            u64::from(budget.cache_size_mb) * 1024 * 1024
        )
        .into(),
        format!("--js-flags=--max-old-space-size={}", budget.max_heap_mb).into(),
        format!("--num-raster-threads={}", budget.raster_threads).into(),
    ];

    for flag in [
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-sync",
        "--disable-extensions",
        "--disable-component-update",
        "--disable-breakpad",
        "--disable-print-preview",
    ] {
        args.push(flag.into());
    }

    if *budget == ResourceTier::Low.budget() {
        args.push("--enable-low-end-device-mode".into());
    }
    if !options.playback_requires_user_gesture {
        args.push("--autoplay-policy=no-user-gesture-required".into());
    }
    if let Some(ref user_agent) = options.user_agent {
        args.push(format!("--user-agent={}", user_agent).into());
    }

    args
}

struct StorageContext {
    path: PathBuf,
    budget: SessionBudget,
}

struct RunningBrowser {
    child: Child,
    commands: mpsc::UnboundedSender<BrowserCommand>,
}

struct BrowserSession {
    storage: StorageHandle,
    slot: DisplaySlot,
    events: EngineEventSender,
    browser: Option<RunningBrowser>,
}

impl BrowserSession {
    /// The session's browser, forgetting it once it has exited
    fn running(&mut self) -> Option<&RunningBrowser> {
        let exited = match self.browser.as_mut().map(|b| b.child.try_wait()) {
            Some(Ok(None)) => false,
            Some(Ok(Some(status))) => {
                warn!("Browser exited: {}", status);
                true
            }
            Some(Err(e)) => {
                warn!("Error checking browser: {}", e);
                true
            }
            None => return None,
        };
        if exited {
            self.browser = None;
        }
        self.browser.as_ref()
    }
}

#[derive(Default)]
struct EngineState {
    next_handle: u64,
    storages: HashMap<StorageHandle, StorageContext>,
    sessions: HashMap<SessionHandle, BrowserSession>,
}

impl EngineState {
    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn session_mut(&mut self, handle: SessionHandle) -> Result<&mut BrowserSession, EngineError> {
        self.sessions
            .get_mut(&handle)
            .ok_or(EngineError::UnknownHandle(handle.0))
    }
}

/// Rendering engine that runs each session in its own Chromium process
pub struct ChromiumEngine {
    options: ChromiumOptions,
    runtime: Handle,
    state: Mutex<EngineState>,
    /// Browsers still shutting down in the background
    stopping: Mutex<Vec<JoinHandle<()>>>,
}

impl ChromiumEngine {
    /// DevTools connections run on `runtime`
    pub fn new(options: ChromiumOptions, runtime: Handle) -> Self {
        info!("Using browser {:?}", options.browser_path);
        Self {
            options,
            runtime,
            state: Mutex::new(EngineState::default()),
            stopping: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_browser(&self, args: &[OsString]) -> Result<Child, EngineError> {
        let mut cmd = Command::new(&self.options.browser_path);
        cmd.args(args);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Launch(format!("{}: {}", self.options.browser_path.display(), e)))
    }

    /// Start the session's browser and queue the first page for it
    fn launch(
        &self,
        state: &mut EngineState,
        handle: SessionHandle,
        url: &str,
    ) -> Result<(), EngineError> {
        let session = state.session_mut(handle)?;
        let (storage, slot, events) = (session.storage, session.slot, session.events.clone());
        let context = state
            .storages
            .get(&storage)
            .ok_or(EngineError::UnknownHandle(storage.0))?;

        devtools::clear_endpoint(&context.path);
        let args = browser_args(&context.path, &context.budget, slot, &self.options);
        let child = self.spawn_browser(&args)?;
        info!(
            "Launched browser for session {} at {} (PID {})",
            handle,
            slot,
            child.id()
        );

        let (commands, receiver) = mpsc::unbounded_channel();
        let _ = commands.send(BrowserCommand::Navigate(url.to_string()));
        self.runtime.spawn(devtools::drive_browser(
            context.path.clone(),
            self.options.connect_timeout,
            receiver,
            events,
        ));

        state.session_mut(handle)?.browser = Some(RunningBrowser { child, commands });
        Ok(())
    }

    /// Hand a command to the session's DevTools connection
    fn command(&self, handle: SessionHandle, command: BrowserCommand) -> Result<(), EngineError> {
        let mut state = self.lock();
        let browser = state
            .session_mut(handle)?
            .running()
            .ok_or(EngineError::SessionGone)?;
        browser
            .commands
            .send(command)
            .map_err(|_| EngineError::SessionGone)
    }

    fn stop_in_background(&self, handle: SessionHandle, browser: RunningBrowser) {
        let _ = browser.commands.send(BrowserCommand::Close);
        info!(
            "Stopping browser for session {} (PID {})",
            handle,
            browser.child.id()
        );

        let grace = self.options.shutdown_grace;
        let stopper = thread::spawn(move || stop_browser(browser.child, grace));

        let mut stopping = self.stopping.lock().unwrap_or_else(PoisonError::into_inner);
        stopping.retain(|stopper| !stopper.is_finished());
        stopping.push(stopper);
    }
}

/// Give the browser time to close, then terminate, then kill it
fn stop_browser(mut child: Child, grace: Duration) {
    let pid = child.id();
    if wait_for_exit(&mut child, grace) {
        return;
    }

    if let Err(e) = platform::terminate_process(pid) {
        warn!("Graceful termination of {} failed: {}", pid, e);
    }
    if wait_for_exit(&mut child, grace) {
        return;
    }

    if platform::is_process_running(pid) {
        warn!("Browser {} ignored termination, killing it", pid);
        if let Err(e) = platform::kill_process(pid) {
            warn!("Failed to kill browser process {}: {}", pid, e);
        }
    }
    let _ = child.wait();
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(50)),
            Ok(None) | Err(_) => return false,
        }
    }
}

impl RenderingEngine for ChromiumEngine {
    fn open_storage(
        &self,
        storage_path: &Path,
        budget: &SessionBudget,
    ) -> Result<StorageHandle, EngineError> {
        std::fs::create_dir_all(storage_path).map_err(|source| EngineError::Storage {
            path: storage_path.to_path_buf(),
            source,
        })?;

        let mut state = self.lock();
        let handle = StorageHandle(state.allocate());
        state.storages.insert(
            handle,
            StorageContext {
                path: storage_path.to_path_buf(),
                budget: *budget,
            },
        );
        debug!("Opened storage {:?} as {:?}", storage_path, handle);
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

        let handle = SessionHandle(state.allocate());
        state.sessions.insert(
            handle,
            BrowserSession {
                storage,
                slot,
                events,
                browser: None,
            },
        );
        Ok(handle)
    }

    /// Load `url` in the session's browser, launching it on first use
    fn navigate(&self, handle: SessionHandle, url: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        if let Some(browser) = state.session_mut(handle)?.running() {
            return browser
                .commands
                .send(BrowserCommand::Navigate(url.to_string()))
                .map_err(|_| EngineError::SessionGone);
        }
        self.launch(&mut state, handle, url)
    }

    fn reload(&self, handle: SessionHandle, url: &str) -> Result<(), EngineError> {
        match self.command(handle, BrowserCommand::Reload) {
            Err(EngineError::SessionGone) => {
                debug!("Browser for session {} is gone, relaunching", handle);
                // A dead connection can leave the process behind on the profile
                let stale = self.lock().session_mut(handle)?.browser.take();
                if let Some(stale) = stale {
                    self.stop_in_background(handle, stale);
                }
                self.navigate(handle, url)
            }
            other => other,
        }
    }

    fn run_script(&self, handle: SessionHandle, script: &str) -> Result<(), EngineError> {
        self.command(handle, BrowserCommand::Evaluate(script.to_string()))
    }

    fn set_permission_result(
        &self,
        handle: SessionHandle,
        request: &PermissionRequest,
        decision: PermissionDecision,
    ) -> Result<(), EngineError> {
        self.command(
            handle,
            BrowserCommand::Permission {
                request: request.clone(),
                decision,
            },
        )
    }

    fn release_session(&self, handle: SessionHandle) {
        let browser = self
            .lock()
            .sessions
            .remove(&handle)
            .and_then(|session| session.browser);

        if let Some(browser) = browser {
            self.stop_in_background(handle, browser);
        }
    }

    fn release_storage(&self, storage: StorageHandle) {
        if let Some(context) = self.lock().storages.remove(&storage) {
            debug!("Released storage {:?}", context.path);
        }
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        let browsers: Vec<(SessionHandle, RunningBrowser)> = self
            .lock()
            .sessions
            .drain()
            .filter_map(|(handle, session)| session.browser.map(|browser| (handle, browser)))
            .collect();
        for (handle, browser) in browsers {
            self.stop_in_background(handle, browser);
        }

        let stopping = std::mem::take(
            &mut *self.stopping.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for stopper in stopping {
            if stopper.join().is_err() {
                warn!("Browser stop thread panicked");
            }
        }
    }
}
