//! Where the SSH password comes from.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::error::ConfigError;

/// Env var read when `source = "env"` names none.
pub const DEFAULT_PASSWORD_ENV: &str = "REMOTE_PILOT_PASSWORD";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CredentialSource {
    /// Ask on the terminal before the UI starts.
    #[default]
    Prompt,
    /// Read from an environment variable.
    Env { var: String },
    /// Read the first line of a file.
    File { path: PathBuf },
}

impl CredentialSource {
    /// Resolve the password, prompting on the controlling terminal if needed.
    ///
    /// `Ok(None)` means the user cancelled the prompt.
    pub fn resolve(&self, label: &str) -> Result<Option<String>, ConfigError> {
        self.resolve_with(|var| std::env::var(var).ok(), || prompt_password(label))
    }

    pub(crate) fn resolve_with<E, P>(&self, env: E, prompt: P) -> Result<Option<String>, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
        P: FnOnce() -> io::Result<Option<String>>,
    {
        match self {
            CredentialSource::Prompt => prompt()
                .map_err(|e| ConfigError::Credential(format!("password prompt failed: {e}"))),
            CredentialSource::Env { var } => env(var)
                .filter(|v| !v.is_empty())
                .map(Some)
                .ok_or_else(|| ConfigError::Credential(format!("environment variable {var} is not set"))),
            CredentialSource::File { path } => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                let secret = contents.lines().next().unwrap_or("").to_string();
                if secret.is_empty() {
                    return Err(ConfigError::Credential(format!(
                        "{} does not contain a password",
                        path.display()
                    )));
                }
                Ok(Some(secret))
            }
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::error!("Failed to leave raw mode: {}", e);
        }
    }
}

/// Read a password without echo. Esc or Ctrl+C cancels.
fn prompt_password(label: &str) -> io::Result<Option<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{label}")?;
    stderr.flush()?;

    let entered = {
        let _raw = RawModeGuard::enable()?;
        let mut secret = String::new();
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => break Some(secret),
                KeyCode::Esc => break None,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break None,
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    };

    writeln!(stderr)?;
    Ok(entered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_prompt() -> io::Result<Option<String>> {
        panic!("prompt must not be used")
    }

    #[test]
    fn test_env_source_reads_variable() {
        let source = CredentialSource::Env {
            var: "SSH_PW".to_string(),
        };
        let secret = source
            .resolve_with(|var| (var == "SSH_PW").then(|| "s3cret".to_string()), no_prompt)
            .unwrap();
        assert_eq!(secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_env_source_missing_variable() {
        let source = CredentialSource::Env {
            var: "SSH_PW".to_string(),
        };
        let err = source.resolve_with(|_| None, no_prompt).unwrap_err();
        assert!(err.to_string().contains("SSH_PW"));
    }

    #[test]
    fn test_file_source_takes_first_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pw");
        fs::write(&path, "pa ss\nignored\n").unwrap();

        let source = CredentialSource::File { path };
        let secret = source.resolve_with(|_| None, no_prompt).unwrap();
        assert_eq!(secret.as_deref(), Some("pa ss"));
    }

    #[test]
    fn test_file_source_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pw");
        fs::write(&path, "\n").unwrap();

        let source = CredentialSource::File { path };
        assert!(matches!(
            source.resolve_with(|_| None, no_prompt),
            Err(ConfigError::Credential(_))
        ));
    }

    #[test]
    fn test_prompt_source_passes_cancel_through() {
        let secret = CredentialSource::Prompt
            .resolve_with(|_| None, || Ok(None))
            .unwrap();
        assert_eq!(secret, None);
    }
}
