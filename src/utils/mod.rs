//! Utility modules for common functionality.
//!
//! Diagnostics logging setup, the terminal exit guard and text clean-up for
//! the log view.

pub mod guard;
pub mod logger;
pub mod text;
