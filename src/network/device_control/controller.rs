use std::sync::Arc;

use tracing::debug;

use super::roku::{DeviceSession, EcpOptions};
use super::types::{CommandOutcome, DeviceAddress};
use crate::dispatch::{CommandDispatcher, Completion, CompletionQueue};
use crate::history::{HistoryEntry, HistorySink, HistoryStatus};
use crate::scanner::SsdpScanner;
use crate::voice::{VoiceIntent, VoiceInterpreter};

const NOT_CONNECTED: &str = "Not connected to any Roku device";

/// A user-visible operation on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Discover,
    Connect(DeviceAddress),
    SendKey(String),
    LaunchApp { id: String, name: String },
    RefreshApps,
    RefreshInfo,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Discover => "Auto-Discover",
            Action::Connect(_) => "Connect",
            Action::SendKey(_) => "Send Key",
            Action::LaunchApp { .. } => "Launch App",
            Action::RefreshApps => "Refresh Apps",
            Action::RefreshInfo => "Refresh TV Info",
        }
    }

    fn started_detail(&self) -> String {
        match self {
            Action::Discover => "Searching for Roku devices".to_string(),
            Action::Connect(address) => format!("Connecting to {}", address),
            Action::SendKey(key) => format!("Sending {} command", key),
            Action::LaunchApp { id, name } => format!("Launching {} (ID: {})", name, id),
            Action::RefreshApps => "Retrieving app list".to_string(),
            Action::RefreshInfo => "Retrieving device information".to_string(),
        }
    }

    /// Status line and history detail for a finished action
    fn finished_messages(&self, outcome: &CommandOutcome) -> (String, String) {
        if let CommandOutcome::Error(detail) = outcome {
            return (format!("Error: {}", detail), detail.clone());
        }
        let ok = outcome.is_success();
        match self {
            Action::Discover if ok => ("Roku found".into(), "Roku found".into()),
            Action::Discover => ("No Roku devices found".into(), "No Roku devices found".into()),
            Action::Connect(address) if ok => {
                let msg = format!("Connected to Roku at {}", address);
                (msg.clone(), msg)
            }
            Action::Connect(address) => (
                "Failed to connect to Roku device".into(),
                format!("Could not get app list from {}", address),
            ),
            Action::SendKey(key) if ok => {
                let msg = format!("Sent {} command", key);
                (msg.clone(), msg)
            }
            Action::SendKey(key) => {
                let msg = format!("Failed to send {} command", key);
                (msg.clone(), msg)
            }
            Action::LaunchApp { id, name } if ok => (
                format!("Launched {}", name),
                format!("Launched {} (ID: {})", name, id),
            ),
            Action::LaunchApp { id, name } => (
                format!("Failed to launch {}", name),
                format!("Failed to launch {} (ID: {})", name, id),
            ),
            Action::RefreshApps if ok => ("App list updated".into(), "App list updated".into()),
            Action::RefreshApps => (
                "Failed to get app list".into(),
                "Could not retrieve app list".into(),
            ),
            Action::RefreshInfo if ok => (
                "TV information updated".into(),
                "Device information updated".into(),
            ),
            Action::RefreshInfo => (
                "Failed to get TV information".into(),
                "Could not retrieve device information".into(),
            ),
        }
    }
}

/// What a background operation hands back to the remote
#[derive(Debug)]
pub enum RemoteEvent {
    Discovered(Option<DeviceAddress>),
    Finished { action: Action, outcome: CommandOutcome },
}

/// Serial control context for one device at a time.
///
/// Commands are dispatched to background tasks; their results only touch the
/// status line, the history and follow-up commands inside `apply`, which the
/// owner calls from one place.
pub struct Remote {
    options: EcpOptions,
    scanner: SsdpScanner,
    interpreter: VoiceInterpreter,
    session: Option<Arc<DeviceSession>>,
    dispatcher: CommandDispatcher<RemoteEvent>,
    queue: CompletionQueue<RemoteEvent>,
    history: Arc<dyn HistorySink>,
    status: String,
}

impl Remote {
    pub fn new(options: EcpOptions, history: Arc<dyn HistorySink>) -> Self {
        let (dispatcher, queue) = CommandDispatcher::new();
        Self {
            options,
            scanner: SsdpScanner::new(),
            interpreter: VoiceInterpreter::default(),
            session: None,
            dispatcher,
            queue,
            history,
            status: "Not connected".to_string(),
        }
    }

    pub fn with_scanner(mut self, scanner: SsdpScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_interpreter(mut self, interpreter: VoiceInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn session(&self) -> Option<&Arc<DeviceSession>> {
        self.session.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Operations dispatched but not yet applied
    pub fn in_flight(&self) -> usize {
        self.queue.pending()
    }

    /// Locate a device via SSDP and connect to it when found
    pub fn discover(&mut self) {
        self.set_status("Searching for Roku devices...");
        self.start(&Action::Discover);

        let scanner = self.scanner.clone();
        self.dispatcher.dispatch(Action::Discover.name(), async move {
            RemoteEvent::Discovered(scanner.discover().await)
        });
    }

    /// Replace the current session with one for `host` and load its app list
    pub fn connect(&mut self, host: &str) {
        let address = match DeviceAddress::new(host) {
            Ok(address) => address,
            Err(e) => {
                let detail = if host.trim().is_empty() {
                    "No IP address provided".to_string()
                } else {
                    e.to_string()
                };
                self.set_status(&detail);
                self.record("Connect", HistoryStatus::Failed, detail);
                return;
            }
        };

        let session = match DeviceSession::with_options(address.clone(), self.options) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                self.set_status(&format!("Connection error: {}", e));
                self.record("Connect", HistoryStatus::Error, e.to_string());
                return;
            }
        };

        self.session = Some(session.clone());
        self.set_status(&format!("Connecting to {}...", address));
        let action = Action::Connect(address);
        self.start(&action);

        self.dispatcher.dispatch(action.name(), async move {
            let outcome = session.refresh_app_catalog().await;
            RemoteEvent::Finished { action, outcome }
        });
    }

    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            self.set_status("Not connected");
            debug!("Dropped session for {}", session.address());
        }
    }

    pub fn send_key(&mut self, key: &str) {
        let Some(session) = self.require_session("Send Key", &format!("{}: {}", key, NOT_CONNECTED))
        else {
            return;
        };

        let action = Action::SendKey(key.to_string());
        self.start(&action);
        let key = key.to_string();
        self.dispatcher.dispatch(action.name(), async move {
            let outcome = session.send_key(&key).await;
            RemoteEvent::Finished { action, outcome }
        });
    }

    /// Launch an app; without a name, the catalog name (or `App ID {id}`) is used
    pub async fn launch_app(&mut self, id: &str, name: Option<&str>) {
        let Some(session) = self.require_session("Launch App", NOT_CONNECTED) else {
            return;
        };

        let name = match name {
            Some(name) => name.to_string(),
            None => session
                .app_catalog()
                .await
                .find_by_id(id)
                .map(|app| app.name.clone())
                .unwrap_or_else(|| format!("App ID {}", id)),
        };

        self.set_status(&format!("Launching {}...", name));
        let action = Action::LaunchApp {
            id: id.to_string(),
            name,
        };
        self.start(&action);
        let id = id.to_string();
        self.dispatcher.dispatch(action.name(), async move {
            let outcome = session.launch_app(&id).await;
            RemoteEvent::Finished { action, outcome }
        });
    }

    pub fn refresh_apps(&mut self) {
        self.refresh(Action::RefreshApps);
    }

    pub fn refresh_info(&mut self) {
        self.refresh(Action::RefreshInfo);
    }

    fn refresh(&mut self, action: Action) {
        let Some(session) = self.require_session(action.name(), NOT_CONNECTED) else {
            return;
        };

        self.set_status(&format!("{}...", action.started_detail()));
        self.start(&action);
        self.dispatcher.dispatch(action.name(), async move {
            let outcome = match action {
                Action::RefreshApps => session.refresh_app_catalog().await,
                _ => session.refresh_device_info().await,
            };
            RemoteEvent::Finished { action, outcome }
        });
    }

    /// Interpret a transcribed phrase and run the resulting command.
    ///
    /// Returns `None` when no device is connected.
    pub async fn handle_phrase(&mut self, text: &str) -> Option<VoiceIntent> {
        let phrase = text.trim().to_lowercase();
        let Some(session) = self.session.clone() else {
            self.set_status("Voice command received but not connected to Roku");
            self.record(
                "Voice Command",
                HistoryStatus::Failed,
                format!("'{}': Not connected to Roku", phrase),
            );
            return None;
        };

        self.record("Voice Command", HistoryStatus::Received, format!("'{}'", phrase));
        let catalog = session.app_catalog().await;
        let intent = self.interpreter.interpret(&phrase, &catalog);

        match &intent {
            VoiceIntent::SendKey(key) => self.send_key(key.as_str()),
            VoiceIntent::LaunchApp { id, name } => self.launch_app(id, Some(name.as_str())).await,
            VoiceIntent::Unrecognized(raw) => {
                self.set_status(&format!("Unrecognized voice command: '{}'", raw));
                self.record("Voice Command", HistoryStatus::Unrecognized, format!("'{}'", raw));
            }
        }
        Some(intent)
    }

    pub fn voice_control_started(&mut self) {
        self.set_status("Voice control active");
        self.record("Voice Control", HistoryStatus::Started, "Voice recognition started");
    }

    pub fn voice_control_stopped(&mut self) {
        self.set_status("Voice control stopped");
        self.record("Voice Control", HistoryStatus::Stopped, "Voice recognition stopped");
    }

    /// Wait for the next finished operation
    pub async fn next_completion(&mut self) -> Option<Completion<RemoteEvent>> {
        self.queue.next().await
    }

    /// Fold a finished operation into the status line and history
    pub fn apply(&mut self, completion: Completion<RemoteEvent>) {
        let event = match completion.result {
            Ok(event) => event,
            Err(e) => {
                self.set_status(&format!("Error: {}", e));
                self.record(&completion.label, HistoryStatus::Error, e.to_string());
                return;
            }
        };

        match event {
            RemoteEvent::Discovered(Some(address)) => {
                let msg = format!("Found Roku at {}", address);
                self.set_status(&msg);
                self.record(Action::Discover.name(), HistoryStatus::Success, msg);
                self.connect(address.as_str());
            }
            RemoteEvent::Discovered(None) => {
                let (status, detail) = Action::Discover.finished_messages(&CommandOutcome::Failed);
                self.set_status(&status);
                self.record(Action::Discover.name(), HistoryStatus::Failed, detail);
            }
            RemoteEvent::Finished { action, outcome } => {
                let (status, detail) = action.finished_messages(&outcome);
                self.record(action.name(), HistoryStatus::from(&outcome), detail);

                // A connect for a session that has since been replaced is history only
                if let Action::Connect(address) = &action
                    && !self.is_current(address)
                {
                    debug!("Ignoring connect result for replaced session {}", address);
                    return;
                }

                self.set_status(&status);
                if matches!(action, Action::Connect(_)) && outcome.is_success() {
                    self.refresh_info();
                }
            }
        }
    }

    /// Apply completions until nothing is in flight, including follow-ups
    pub async fn settle(&mut self) {
        while !self.queue.is_idle() {
            match self.queue.next().await {
                Some(completion) => self.apply(completion),
                None => break,
            }
        }
    }

    fn is_current(&self, address: &DeviceAddress) -> bool {
        self.session.as_ref().is_some_and(|s| s.address() == address)
    }

    fn require_session(&mut self, action: &str, detail: &str) -> Option<Arc<DeviceSession>> {
        let session = self.session.clone();
        if session.is_none() {
            self.set_status(NOT_CONNECTED);
            self.record(action, HistoryStatus::Failed, detail.to_string());
        }
        session
    }

    fn start(&self, action: &Action) {
        self.record(action.name(), HistoryStatus::Started, action.started_detail());
    }

    fn set_status(&mut self, status: &str) {
        debug!("Status: {}", status);
        self.status = status.to_string();
    }

    fn record(&self, action: &str, status: HistoryStatus, details: impl Into<String>) {
        self.history.record(HistoryEntry::new(action, status, details));
    }
}
