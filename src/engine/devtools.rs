//! DevTools protocol client - Drives one browser over its debugging websocket
//!
//! The browser is started with `--remote-debugging-port=0` and publishes the
//! chosen port in `DevToolsActivePort` inside its user data directory. One
//! task per browser attaches to the app window's page target and turns engine
//! commands into protocol calls and protocol events into engine events.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::core::engine::{EngineEvent, EngineEventSender};
use crate::core::permission::{Capability, PermissionDecision, PermissionRequest};

/// File the browser writes its debugging port and path to
pub const ACTIVE_PORT_FILE: &str = "DevToolsActivePort";

/// Page binding the media shim reports requests through
pub const PERMISSION_BINDING: &str = "multizapPermission";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Installed on every document: media requests wait for the host's answer
/// instead of reaching the browser's own permission prompt.
pub const MEDIA_SHIM: &str = r#"(() => {
    const media = navigator.mediaDevices;
    if (!media || !media.getUserMedia || window.__multizapResolve) return;
    const original = media.getUserMedia.bind(media);
    const waiting = new Map();
    let next = 0;
    window.__multizapResolve = (id, granted) => {
        const settle = waiting.get(id);
        if (settle) {
            waiting.delete(id);
            settle(granted);
        }
    };
    media.getUserMedia = (constraints) => new Promise((resolve, reject) => {
        const id = ++next;
        waiting.set(id, (granted) => granted
            ? original(constraints).then(resolve, reject)
            : reject(new DOMException('Permission denied', 'NotAllowedError')));
        window.multizapPermission(JSON.stringify({
            id,
            origin: location.origin,
            audio: !!(constraints && constraints.audio),
            video: !!(constraints && constraints.video),
        }));
    });
})();"#;

/// Work for the task driving one browser
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserCommand {
    Navigate(String),
    Reload,
    Evaluate(String),
    Permission {
        request: PermissionRequest,
        decision: PermissionDecision,
    },
    Close,
}

#[derive(Debug, Error)]
pub enum DevToolsError {
    #[error("browser did not publish a DevTools endpoint within {0:?}")]
    EndpointTimeout(Duration),
    #[error("malformed DevTools endpoint file: {0:?}")]
    BadEndpoint(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("browser has no page to attach to")]
    NoPage,
    #[error("browser closed the DevTools connection")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Websocket address from the contents of `DevToolsActivePort`
pub fn parse_endpoint(content: &str) -> Result<String, DevToolsError> {
    let bad = || DevToolsError::BadEndpoint(content.to_string());
    let mut lines = content.lines().map(str::trim);
    let port = lines
        .next()
        .and_then(|line| line.parse::<u16>().ok())
        .filter(|port| *port != 0)
        .ok_or_else(bad)?;
    let path = lines
        .next()
        .filter(|path| path.starts_with("/devtools/browser/"))
        .ok_or_else(bad)?;
    Ok(format!("ws://127.0.0.1:{}{}", port, path))
}

/// Remove a stale endpoint left by a previous browser in this directory
pub fn clear_endpoint(user_data_dir: &Path) {
    let path = user_data_dir.join(ACTIVE_PORT_FILE);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {:?}: {}", path, e);
        }
    }
}

async fn wait_for_endpoint(user_data_dir: &Path, timeout: Duration) -> Result<String, DevToolsError> {
    let path = user_data_dir.join(ACTIVE_PORT_FILE);
    let deadline = Instant::now() + timeout;
    loop {
        // The file may be caught half written
        if let Ok(content) = tokio::fs::read_to_string(&path).await {
            if let Ok(url) = parse_endpoint(&content) {
                return Ok(url);
            }
        }
        if Instant::now() >= deadline {
            return Err(DevToolsError::EndpointTimeout(timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Capability asked for by a `getUserMedia` call
pub fn capability_of(audio: bool, video: bool) -> Capability {
    match (audio, video) {
        (true, true) => Capability::AudioVideoCapture,
        (true, false) => Capability::AudioCapture,
        (false, true) => Capability::VideoCapture,
        (false, false) => Capability::Other,
    }
}

/// Browser permission names covering a capability
pub fn permission_names(capability: Capability) -> &'static [&'static str] {
    match capability {
        Capability::AudioCapture => &["audioCapture"],
        Capability::VideoCapture => &["videoCapture"],
        Capability::AudioVideoCapture => &["audioCapture", "videoCapture"],
        Capability::Other => &[],
    }
}

/// Connect to the browser behind `user_data_dir` and serve `commands` until
/// the browser goes away or the engine closes it
pub async fn drive_browser(
    user_data_dir: PathBuf,
    connect_timeout: Duration,
    mut commands: mpsc::UnboundedReceiver<BrowserCommand>,
    events: EngineEventSender,
) {
    let mut client = match PageClient::connect(&user_data_dir, connect_timeout, events.clone()).await {
        Ok(client) => client,
        Err(e) => {
            warn!("DevTools connection for {:?} failed: {}", user_data_dir, e);
            let _ = events.send(EngineEvent::LoadFinished { success: false });
            return;
        }
    };

    match client.serve(&mut commands).await {
        Ok(()) => debug!("DevTools session for {:?} closed", user_data_dir),
        Err(e) => warn!("DevTools session for {:?} ended: {}", user_data_dir, e),
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Browser,
    Page,
}

/// Responses the client is waiting on
enum Reply {
    Navigation,
    LoadCheck,
}

#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<u64>,
    #[serde(default)]
    result: Value,
    error: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaAsk {
    id: u64,
    origin: String,
    #[serde(default)]
    audio: bool,
    #[serde(default)]
    video: bool,
}

struct PageClient {
    socket: Socket,
    next_id: u64,
    session_id: String,
    replies: HashMap<u64, Reply>,
    backlog: VecDeque<Incoming>,
    /// Media requests from the page still waiting for a decision
    waiting: Vec<(u64, PermissionRequest)>,
    navigating: bool,
    events: EngineEventSender,
}

impl PageClient {
    async fn connect(
        user_data_dir: &Path,
        timeout: Duration,
        events: EngineEventSender,
    ) -> Result<Self, DevToolsError> {
        let url = wait_for_endpoint(user_data_dir, timeout).await?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!("Connected to DevTools at {}", url);

        let mut client = Self {
            socket,
            next_id: 0,
            session_id: String::new(),
            replies: HashMap::new(),
            backlog: VecDeque::new(),
            waiting: Vec::new(),
            navigating: false,
            events,
        };

        let target_id = client.page_target(timeout).await?;
        let attached = client
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                Scope::Browser,
            )
            .await?;
        client.session_id = attached["sessionId"]
            .as_str()
            .ok_or_else(|| DevToolsError::Protocol("attachToTarget returned no session".into()))?
            .to_string();

        for (method, params) in [
            ("Page.enable", json!({})),
            ("Runtime.enable", json!({})),
            ("Runtime.addBinding", json!({ "name": PERMISSION_BINDING })),
            (
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": MEDIA_SHIM }),
            ),
        ] {
            client.call(method, params, Scope::Page).await?;
        }
        Ok(client)
    }

    /// The app window's page; it can take a moment to appear after launch
    async fn page_target(&mut self, timeout: Duration) -> Result<String, DevToolsError> {
        let deadline = Instant::now() + timeout;
        loop {
            let targets = self.call("Target.getTargets", json!({}), Scope::Browser).await?;
            let page = targets["targetInfos"]
                .as_array()
                .and_then(|infos| infos.iter().find(|info| info["type"] == "page"))
                .and_then(|info| info["targetId"].as_str());
            if let Some(target_id) = page {
                return Ok(target_id.to_string());
            }
            if Instant::now() >= deadline {
                return Err(DevToolsError::NoPage);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn serve(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<BrowserCommand>,
    ) -> Result<(), DevToolsError> {
        loop {
            tokio::select! {
                incoming = self.receive() => self.handle_incoming(incoming?).await?,
                command = commands.recv() => match command {
                    Some(BrowserCommand::Close) | None => {
                        self.send("Browser.close", json!({}), Scope::Browser).await?;
                        return Ok(());
                    }
                    Some(command) => self.execute(command).await?,
                },
            }
        }
    }

    async fn execute(&mut self, command: BrowserCommand) -> Result<(), DevToolsError> {
        match command {
            BrowserCommand::Navigate(url) => {
                self.navigating = true;
                let id = self
                    .send("Page.navigate", json!({ "url": url }), Scope::Page)
                    .await?;
                self.replies.insert(id, Reply::Navigation);
            }
            BrowserCommand::Reload => {
                self.navigating = true;
                self.send("Page.reload", json!({}), Scope::Page).await?;
            }
            BrowserCommand::Evaluate(expression) => {
                self.send(
                    "Runtime.evaluate",
                    json!({ "expression": expression }),
                    Scope::Page,
                )
                .await?;
            }
            BrowserCommand::Permission { request, decision } => {
                self.answer_media(request, decision).await?;
            }
            BrowserCommand::Close => {}
        }
        Ok(())
    }

    async fn handle_incoming(&mut self, message: Incoming) -> Result<(), DevToolsError> {
        if let Some(id) = message.id {
            match self.replies.remove(&id) {
                Some(Reply::Navigation) => {
                    let failure = message
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .or_else(|| message.result["errorText"].as_str().map(str::to_string));
                    if let Some(failure) = failure {
                        warn!("Navigation failed: {}", failure);
                        self.emit(EngineEvent::LoadFinished { success: false });
                    }
                }
                Some(Reply::LoadCheck) => {
                    let protocol = message.result["result"]["value"].as_str().unwrap_or_default();
                    let success = message.error.is_none() && is_service_page(protocol);
                    self.emit(EngineEvent::LoadFinished { success });
                }
                None => {
                    if let Some(error) = message.error {
                        debug!("DevTools command {} failed: {}", id, error);
                    }
                }
            }
            return Ok(());
        }

        let Some(method) = message.method.as_deref() else {
            return Ok(());
        };
        let on_page = message.session_id.as_deref() == Some(self.session_id.as_str());
        match method {
            "Page.loadEventFired" if on_page && self.navigating => {
                let id = self
                    .send(
                        "Runtime.evaluate",
                        json!({ "expression": "location.protocol", "returnByValue": true }),
                        Scope::Page,
                    )
                    .await?;
                self.replies.insert(id, Reply::LoadCheck);
            }
            "Runtime.bindingCalled" if on_page && message.params["name"] == PERMISSION_BINDING => {
                self.on_media_request(&message.params);
            }
            "Target.detachedFromTarget"
                if message.params["sessionId"] == self.session_id.as_str() =>
            {
                return Err(DevToolsError::Closed);
            }
            _ => trace!("DevTools event {}", method),
        }
        Ok(())
    }

    fn on_media_request(&mut self, params: &Value) {
        let payload = params["payload"].as_str().unwrap_or_default();
        let ask: MediaAsk = match serde_json::from_str(payload) {
            Ok(ask) => ask,
            Err(e) => {
                warn!("Ignoring malformed media request {:?}: {}", payload, e);
                return;
            }
        };

        let request = PermissionRequest {
            origin: ask.origin,
            capability: capability_of(ask.audio, ask.video),
        };
        debug!("Page asks for {:?}", request);
        self.waiting.push((ask.id, request.clone()));
        self.emit(EngineEvent::PermissionRequested(request));
    }

    /// Set the origin's browser permission, then let the page's call proceed
    async fn answer_media(
        &mut self,
        request: PermissionRequest,
        decision: PermissionDecision,
    ) -> Result<(), DevToolsError> {
        let Some(position) = self.waiting.iter().position(|(_, asked)| *asked == request) else {
            debug!("No page request waiting for {:?}", request);
            return Ok(());
        };
        let (id, _) = self.waiting.remove(position);

        let granted = decision == PermissionDecision::Grant;
        let setting = if granted { "granted" } else { "denied" };
        for name in permission_names(request.capability) {
            let params = json!({
                "permission": { "name": name },
                "setting": setting,
                "origin": request.origin,
            });
            match self.call("Browser.setPermission", params, Scope::Browser).await {
                Ok(_) => {}
                Err(DevToolsError::Protocol(e)) => warn!("Could not set {}: {}", name, e),
                Err(e) => return Err(e),
            }
        }

        let expression = format!(
            "window.__multizapResolve && window.__multizapResolve({}, {})",
            id, granted
        );
        self.send("Runtime.evaluate", json!({ "expression": expression }), Scope::Page)
            .await?;
        Ok(())
    }

    /// Send a command and wait for its result, keeping anything else for later
    async fn call(&mut self, method: &str, params: Value, scope: Scope) -> Result<Value, DevToolsError> {
        let id = self.send(method, params, scope).await?;
        let mut skipped = Vec::new();
        let result = loop {
            let message = match self.next_message().await {
                Ok(message) => message,
                Err(e) => break Err(e),
            };
            if message.id == Some(id) {
                break match message.error {
                    Some(error) => Err(DevToolsError::Protocol(format!("{}: {}", method, error))),
                    None => Ok(message.result),
                };
            }
            skipped.push(message);
        };
        self.backlog.extend(skipped);
        result
    }

    async fn send(&mut self, method: &str, params: Value, scope: Scope) -> Result<u64, DevToolsError> {
        self.next_id += 1;
        let id = self.next_id;
        let mut frame = json!({ "id": id, "method": method, "params": params });
        if scope == Scope::Page {
            frame["sessionId"] = Value::from(self.session_id.as_str());
        }
        trace!("-> {}", frame);
        self.socket.send(Message::Text(frame.to_string())).await?;
        Ok(id)
    }

    /// Next message, serving skipped ones first
    async fn receive(&mut self) -> Result<Incoming, DevToolsError> {
        match self.backlog.pop_front() {
            Some(message) => Ok(message),
            None => self.next_message().await,
        }
    }

    async fn next_message(&mut self) -> Result<Incoming, DevToolsError> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Text(text) => match serde_json::from_str::<Incoming>(&text) {
                    Ok(incoming) => return Ok(incoming),
                    Err(e) => warn!("Unreadable DevTools message: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(DevToolsError::Closed)
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("Session stopped listening for browser events");
        }
    }
}

/// False for the browser's own error page
fn is_service_page(protocol: &str) -> bool {
    !protocol.is_empty() && protocol != "chrome-error:"
}
