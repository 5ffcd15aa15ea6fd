//! remote-pilot - a terminal client for one remote SSH shell, with an audit
//! log of everything sent and received and AI-generated command suggestions.
//!
//! The crate is split by who owns what:
//! - `session`: the SSH connection, owned by a dedicated worker thread
//! - `audit`: the append-only JSON Lines record of the session
//! - `ai`: suggestion requests against a chat-completion endpoint
//! - `event`: the bridge that carries worker and AI results to the UI loop
//! - `app` / `ui`: view state and rendering, touched only by the UI loop
//!
//! # Example
//!
//! ```no_run
//! use remote_pilot::audit::AuditLogger;
//! use remote_pilot::config::Config;
//! use remote_pilot::event::init_app_eventsource;
//! use remote_pilot::session::{SessionParams, SessionWorker, Ssh2Connector};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let (events, mut rx) = init_app_eventsource();
//! let audit = AuditLogger::open(&config.audit.path)?;
//! let params = SessionParams::from_config(&config.session, "secret".to_string());
//!
//! let handle = SessionWorker::new(Ssh2Connector, params, audit, events).spawn()?;
//! handle.send("uptime");
//! while let Some(event) = rx.blocking_recv() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod app;
pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use ai::{Suggestion, SuggestionWorker};
pub use app::App;
pub use audit::AuditLogger;
pub use config::{Config, load_config};
pub use event::{AppEvent, SessionEvent, UserEvent, init_app_eventsource, init_user_event};
pub use session::{SessionHandle, SessionWorker};
