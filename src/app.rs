//! Application state and the presentation loop.
//!
//! `App` owns the session handle, the suggestion worker and all view state.
//! The main loop waits on user input and on the event bridge; every view
//! mutation happens here, on the loop's task, never on a worker thread.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::KeyEventKind;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc::{Receiver, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::ai::{RequestId, Suggestion, SuggestionWorker};
use crate::audit::AuditLogger;
use crate::config::Config;
use crate::event::input::{self, InputAction};
use crate::event::{AppEvent, SessionEvent, UserEvent, init_app_eventsource, init_user_event};
use crate::session::{SessionHandle, SessionParams, SessionWorker, Ssh2Connector, WorkerOptions};
use crate::utils::text::{DisplayFilter, truncate_front};

/// Log view keeps at most this much text.
const MAX_LOG_BYTES: usize = 1 << 20;

/// How long shutdown waits for the session worker to release the connection.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

/// Poll step while waiting for the session worker to exit.
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Which input receives typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Command,
    Prompt,
}

impl Focus {
    pub fn toggled(self) -> Self {
        match self {
            Focus::Command => Focus::Prompt,
            Focus::Prompt => Focus::Command,
        }
    }
}

/// Everything the UI draws.
#[derive(Debug, Default)]
pub struct ViewState {
    pub log: String,
    pub command_input: String,
    pub prompt_input: String,
    pub suggestion: String,
    pub status: Option<String>,
    pub focus: Focus,
    pub target: String,
    pub connected: bool,
    pub confirm_enabled: bool,
    /// Id of the newest suggestion request; older results are dropped.
    pub pending_request: Option<RequestId>,
    output_filter: DisplayFilter,
}

impl ViewState {
    pub fn focused_input_mut(&mut self) -> &mut String {
        match self.focus {
            Focus::Command => &mut self.command_input,
            Focus::Prompt => &mut self.prompt_input,
        }
    }

    /// Append remote output as it arrived.
    pub fn append_output(&mut self, text: &str) {
        let shown = self.output_filter.push(text);
        self.log.push_str(&shown);
        truncate_front(&mut self.log, MAX_LOG_BYTES);
    }

    /// Append a status line of our own, starting on a fresh line.
    pub fn append_notice(&mut self, text: &str) {
        if !self.log.is_empty() && !self.log.ends_with('\n') {
            self.log.push('\n');
        }
        self.log.push_str(text);
        self.log.push('\n');
        truncate_front(&mut self.log, MAX_LOG_BYTES);
    }

    pub fn is_generating(&self) -> bool {
        self.pending_request.is_some()
    }
}

pub struct App {
    session: SessionHandle,
    suggestions: SuggestionWorker,
    pub(crate) view: ViewState,
    exit: bool,
    user_events: Receiver<io::Result<UserEvent>>,
    app_events: UnboundedReceiver<AppEvent>,
}

impl App {
    /// Open the audit log, start the session worker and wire up events.
    pub fn new(config: &Config, password: String) -> Result<Self> {
        let (event_sink, app_events) = init_app_eventsource();

        let audit = AuditLogger::open(&config.audit.path).context("Failed to open audit log")?;
        let params = SessionParams::from_config(&config.session, password);
        let session = SessionWorker::new(Ssh2Connector, params, audit, event_sink.clone())
            .with_options(WorkerOptions {
                poll_interval: config.session.poll_interval,
                max_chunk: config.session.max_chunk,
            })
            .spawn()
            .context("Failed to start session worker")?;

        let suggestions = SuggestionWorker::from_config(&config.ai, event_sink);

        Ok(Self::with_parts(session, suggestions, app_events, init_user_event()))
    }

    pub fn with_parts(
        session: SessionHandle,
        suggestions: SuggestionWorker,
        app_events: UnboundedReceiver<AppEvent>,
        user_events: Receiver<io::Result<UserEvent>>,
    ) -> Self {
        Self {
            session,
            suggestions,
            view: ViewState::default(),
            exit: false,
            user_events,
            app_events,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn should_exit(&self) -> bool {
        self.exit
    }

    pub async fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            if self.exit {
                break;
            }
            tokio::select! {
                res = self.user_events.recv() => {
                    let usr_evt = res.with_context(|| anyhow::anyhow!("User event stream is ended."))?;
                    self.handle_user_event(usr_evt?);
                }
                res = self.app_events.recv() => {
                    let app_evt = res.with_context(|| anyhow::anyhow!("App event stream is ended"))?;
                    self.handle_app_event(app_evt);
                    // Apply whatever else is already queued before redrawing.
                    while let Ok(app_evt) = self.app_events.try_recv() {
                        self.handle_app_event(app_evt);
                    }
                }
            }
            self.draw(terminal)?;
        }
        self.shutdown().await;
        Ok(())
    }

    pub fn draw(&self, terminal: &mut DefaultTerminal) -> Result<()> {
        terminal.draw(|frame| {
            use ratatui::widgets::Widget;
            let area = frame.area();
            self.render(area, frame.buffer_mut());
            if let Some(position) = crate::ui::cursor_position(self, area) {
                frame.set_cursor_position(position);
            }
        })?;
        Ok(())
    }

    /// Close the session and give the worker a moment to release it.
    ///
    /// Waits by polling so the runtime thread stays free for other tasks.
    pub async fn shutdown(&mut self) {
        self.session.close();
        let deadline = tokio::time::Instant::now() + SHUTDOWN_WAIT;
        while !self.session.is_finished() {
            if tokio::time::Instant::now() >= deadline {
                warn!("Session worker did not stop within {:?}", SHUTDOWN_WAIT);
                return;
            }
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
    }

    fn handle_user_event(&mut self, event: UserEvent) {
        if let UserEvent::Key(key_evt) = event {
            if key_evt.kind == KeyEventKind::Press {
                let action = input::handle_key_event(&mut self.view, key_evt);
                self.apply(action);
            }
        }
    }

    pub(crate) fn apply(&mut self, action: InputAction) {
        match action {
            InputAction::None => {}
            InputAction::Quit => self.exit = true,
            InputAction::SendCommand(line) => self.send_command(line),
            InputAction::Generate(prompt) => self.generate(prompt),
            InputAction::ConfirmSuggestion => self.confirm_suggestion(),
        }
    }

    fn send_command(&mut self, line: String) {
        if !self.view.connected {
            self.view.status = Some("Not connected.".to_string());
            return;
        }
        self.session.send(line);
    }

    fn generate(&mut self, prompt: String) {
        if prompt.is_empty() {
            self.view.status = Some("Prompt is empty.".to_string());
            return;
        }
        if let Some(previous) = self.view.pending_request {
            debug!("Suggestion request {} superseded", previous);
        }
        self.view.suggestion.clear();
        self.view.confirm_enabled = false;
        self.view.status = None;
        self.view.pending_request = Some(self.suggestions.request(prompt));
    }

    fn confirm_suggestion(&mut self) {
        if !self.view.confirm_enabled {
            return;
        }
        let command = self.view.suggestion.trim().to_string();
        if command.is_empty() {
            return;
        }
        if !self.view.connected {
            self.view.status = Some("Not connected.".to_string());
            return;
        }
        info!("Sending confirmed suggestion");
        self.session.send(command);
        self.view.suggestion.clear();
        self.view.prompt_input.clear();
        self.view.confirm_enabled = false;
    }

    pub(crate) fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Session(event) => self.handle_session_event(event),
            AppEvent::Suggestion(suggestion) => self.handle_suggestion(suggestion),
            AppEvent::AuditFailed { message } => {
                self.view.status = Some(format!("Audit log write failed: {message}"));
            }
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connecting { target } => {
                self.view.append_notice(&format!("Connecting to {target} ..."));
                self.view.target = target;
            }
            SessionEvent::Connected => {
                self.view.connected = true;
                self.view.append_notice("Connected.");
            }
            SessionEvent::CommandSent(_) => {
                // The remote echo shows the command in the log.
            }
            SessionEvent::ServerOutput(text) => self.view.append_output(&text),
            SessionEvent::Disconnected { reason } => {
                self.view.connected = false;
                self.view.append_notice(&format!("Disconnected: {reason}"));
            }
        }
    }

    fn handle_suggestion(&mut self, suggestion: Suggestion) {
        if self.view.pending_request != Some(suggestion.id) {
            debug!("Discarding stale suggestion {}", suggestion.id);
            return;
        }
        self.view.pending_request = None;
        if suggestion.is_ok() {
            self.view.suggestion = suggestion.result;
            self.view.confirm_enabled = true;
        } else {
            self.view.suggestion = format!("Error: {}", suggestion.result);
            self.view.confirm_enabled = false;
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.session.close();
    }
}
