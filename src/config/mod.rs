//! Configuration loading and merging.
//!
//! Config is read from two TOML files, project taking precedence:
//! 1. User-level: `~/.remote-pilot/config.toml`
//! 2. Project-level: `<dir>/.remote-pilot/config.toml`
//!
//! Every key is optional; anything missing falls back to the defaults the
//! application has always shipped with (root@localhost:22, a 10 second connect
//! timeout, `gpt-3.5-turbo` at temperature 0, `session_log.jsonl`).

mod credential;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::session::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CHUNK, DEFAULT_POLL_INTERVAL};

pub use credential::{CredentialSource, DEFAULT_PASSWORD_ENV};

const CONFIG_DIR: &str = ".remote-pilot";
const CONFIG_FILE: &str = "config.toml";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_USER: &str = "root";
const DEFAULT_PORT: u16 = 22;
const DEFAULT_KNOWN_HOSTS: &str = "~/.ssh/known_hosts";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TEMPERATURE: f32 = 0.0;
const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_AUDIT_PATH: &str = "session_log.jsonl";

#[derive(Debug, Clone)]
pub struct Config {
    pub session: SessionConfig,
    pub ai: AiConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub credential: CredentialSource,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub max_chunk: usize,
    pub trust_on_first_use: bool,
    pub known_hosts: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub api_key_env: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        merge_config(None, None, CredentialSource::Prompt, dirs::home_dir().as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    session: Option<RawSession>,
    ai: Option<RawAi>,
    audit: Option<RawAudit>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSession {
    host: Option<String>,
    user: Option<String>,
    port: Option<u16>,
    credential: Option<RawCredential>,
    connect_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_chunk_bytes: Option<usize>,
    trust_on_first_use: Option<bool>,
    known_hosts: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawCredential {
    source: Option<String>,
    var: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAi {
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    api_key_env: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAudit {
    path: Option<String>,
}

fn read_toml(path: &Path) -> Result<Option<RawConfig>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    toml::from_str::<RawConfig>(&contents)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// First value set, project before user.
fn pick<T: Clone>(project: Option<&T>, user: Option<&T>) -> Option<T> {
    project.or(user).cloned()
}

fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn credential_from_raw(raw: &RawCredential, home: Option<&Path>) -> Result<CredentialSource, String> {
    match raw.source.as_deref().unwrap_or("prompt") {
        "prompt" => Ok(CredentialSource::Prompt),
        "env" => Ok(CredentialSource::Env {
            var: raw
                .var
                .clone()
                .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string()),
        }),
        "file" => raw
            .path
            .as_deref()
            .map(|p| CredentialSource::File {
                path: expand_home(p, home),
            })
            .ok_or_else(|| "credential source \"file\" needs a path".to_string()),
        other => Err(format!(
            "unknown credential source \"{other}\" (expected prompt, env or file)"
        )),
    }
}

fn merged_credential(
    user: Option<&RawConfig>,
    project: Option<&RawConfig>,
    home: Option<&Path>,
) -> Result<CredentialSource, String> {
    let raw = pick(
        project.and_then(|c| c.session.as_ref()).and_then(|s| s.credential.as_ref()),
        user.and_then(|c| c.session.as_ref()).and_then(|s| s.credential.as_ref()),
    );
    match raw {
        Some(raw) => credential_from_raw(&raw, home),
        None => Ok(CredentialSource::Prompt),
    }
}

fn merge_config(
    user: Option<&RawConfig>,
    project: Option<&RawConfig>,
    credential: CredentialSource,
    home: Option<&Path>,
) -> Config {
    let ps = project.and_then(|c| c.session.as_ref());
    let us = user.and_then(|c| c.session.as_ref());
    let pa = project.and_then(|c| c.ai.as_ref());
    let ua = user.and_then(|c| c.ai.as_ref());
    let pd = project.and_then(|c| c.audit.as_ref());
    let ud = user.and_then(|c| c.audit.as_ref());

    let known_hosts = pick(
        ps.and_then(|s| s.known_hosts.as_ref()),
        us.and_then(|s| s.known_hosts.as_ref()),
    )
    .unwrap_or_else(|| DEFAULT_KNOWN_HOSTS.to_string());

    let session = SessionConfig {
        host: pick(ps.and_then(|s| s.host.as_ref()), us.and_then(|s| s.host.as_ref()))
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        user: pick(ps.and_then(|s| s.user.as_ref()), us.and_then(|s| s.user.as_ref()))
            .unwrap_or_else(|| DEFAULT_USER.to_string()),
        port: pick(ps.and_then(|s| s.port.as_ref()), us.and_then(|s| s.port.as_ref()))
            .unwrap_or(DEFAULT_PORT),
        credential,
        connect_timeout: pick(
            ps.and_then(|s| s.connect_timeout_secs.as_ref()),
            us.and_then(|s| s.connect_timeout_secs.as_ref()),
        )
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        poll_interval: pick(
            ps.and_then(|s| s.poll_interval_ms.as_ref()),
            us.and_then(|s| s.poll_interval_ms.as_ref()),
        )
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_POLL_INTERVAL),
        max_chunk: pick(
            ps.and_then(|s| s.max_chunk_bytes.as_ref()),
            us.and_then(|s| s.max_chunk_bytes.as_ref()),
        )
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_CHUNK),
        trust_on_first_use: pick(
            ps.and_then(|s| s.trust_on_first_use.as_ref()),
            us.and_then(|s| s.trust_on_first_use.as_ref()),
        )
        .unwrap_or(false),
        known_hosts: expand_home(&known_hosts, home),
    };

    let ai = AiConfig {
        model: pick(pa.and_then(|a| a.model.as_ref()), ua.and_then(|a| a.model.as_ref()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        temperature: pick(
            pa.and_then(|a| a.temperature.as_ref()),
            ua.and_then(|a| a.temperature.as_ref()),
        )
        .unwrap_or(DEFAULT_TEMPERATURE),
        timeout: pick(
            pa.and_then(|a| a.timeout_secs.as_ref()),
            ua.and_then(|a| a.timeout_secs.as_ref()),
        )
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_AI_TIMEOUT),
        api_key_env: pick(
            pa.and_then(|a| a.api_key_env.as_ref()),
            ua.and_then(|a| a.api_key_env.as_ref()),
        )
        .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
        api_base: pick(
            pa.and_then(|a| a.api_base.as_ref()),
            ua.and_then(|a| a.api_base.as_ref()),
        ),
    };

    let audit = AuditConfig {
        path: pick(pd.and_then(|d| d.path.as_ref()), ud.and_then(|d| d.path.as_ref()))
            .map(|p| expand_home(&p, home))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_PATH)),
    };

    Config { session, ai, audit }
}

fn config_path_from_root(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load the merged configuration for a project directory.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    load_config_with_home(root, dirs::home_dir().as_deref())
}

/// Like [`load_config`] with an explicit home directory.
pub fn load_config_with_home(root: &Path, home: Option<&Path>) -> Result<Config, ConfigError> {
    let project_path = config_path_from_root(root);
    let project = read_toml(&project_path)?;
    let user = match home.map(config_path_from_root) {
        Some(path) if path != project_path => read_toml(&path)?,
        _ => None,
    };

    let credential = merged_credential(user.as_ref(), project.as_ref(), home).map_err(|message| {
        ConfigError::Parse {
            path: project_path,
            message,
        }
    })?;
    Ok(merge_config(user.as_ref(), project.as_ref(), credential, home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(root: &Path, contents: &str) {
        let path = config_path_from_root(root);
        fs::create_dir_all(path.parent().unwrap()).expect("create config dir");
        fs::write(path, contents).expect("write config");
    }

    #[test]
    fn load_config_uses_defaults_when_empty() {
        let home = TempDir::new().expect("temp home");
        let repo = TempDir::new().expect("temp repo");
        let config = load_config_with_home(repo.path(), Some(home.path())).unwrap();

        assert_eq!(config.session.host, "localhost");
        assert_eq!(config.session.user, "root");
        assert_eq!(config.session.port, 22);
        assert_eq!(config.session.credential, CredentialSource::Prompt);
        assert_eq!(config.session.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.session.max_chunk, 65535);
        assert!(!config.session.trust_on_first_use);
        assert_eq!(
            config.session.known_hosts,
            home.path().join(".ssh").join("known_hosts")
        );
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
        assert_eq!(config.ai.temperature, 0.0);
        assert_eq!(config.ai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.ai.api_base, None);
        assert_eq!(config.audit.path, Path::new("session_log.jsonl"));
    }

    #[test]
    fn load_config_merges_user_and_project() {
        let home = TempDir::new().expect("temp home");
        write_config(
            home.path(),
            r#"
[session]
host = "db.internal"
user = "ops"
port = 2222
trust_on_first_use = true

[session.credential]
source = "env"
var = "OPS_PASSWORD"

[ai]
model = "gpt-4o-mini"
timeout_secs = 5
"#,
        );

        let repo = TempDir::new().expect("temp repo");
        write_config(
            repo.path(),
            r#"
[session]
user = "deploy"

[audit]
path = "~/audit/session.jsonl"
"#,
        );

        let config = load_config_with_home(repo.path(), Some(home.path())).unwrap();

        assert_eq!(config.session.host, "db.internal");
        assert_eq!(config.session.user, "deploy");
        assert_eq!(config.session.port, 2222);
        assert!(config.session.trust_on_first_use);
        assert_eq!(
            config.session.credential,
            CredentialSource::Env {
                var: "OPS_PASSWORD".to_string()
            }
        );
        assert_eq!(config.ai.model, "gpt-4o-mini");
        assert_eq!(config.ai.timeout, Duration::from_secs(5));
        assert_eq!(
            config.audit.path,
            home.path().join("audit").join("session.jsonl")
        );
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let repo = TempDir::new().expect("temp repo");
        write_config(repo.path(), "[session\nhost = 1");
        let err = load_config_with_home(repo.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_config_rejects_unknown_credential_source() {
        let repo = TempDir::new().expect("temp repo");
        write_config(
            repo.path(),
            r#"
[session.credential]
source = "keychain"
"#,
        );
        let err = load_config_with_home(repo.path(), None).unwrap_err();
        assert!(err.to_string().contains("keychain"));
    }

    #[test]
    fn file_credential_requires_path() {
        let raw = RawCredential {
            source: Some("file".to_string()),
            var: None,
            path: None,
        };
        assert!(credential_from_raw(&raw, None).is_err());
    }

    #[test]
    fn env_credential_defaults_variable() {
        let raw = RawCredential {
            source: Some("env".to_string()),
            var: None,
            path: None,
        };
        assert_eq!(
            credential_from_raw(&raw, None).unwrap(),
            CredentialSource::Env {
                var: DEFAULT_PASSWORD_ENV.to_string()
            }
        );
    }
}
