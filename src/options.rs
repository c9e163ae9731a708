use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SecretManagerError};

pub const DEFAULT_RELEASE_URL: &str =
    "https://api.github.com/repos/ohishi-yhonda-org/secret_manager/releases/latest";
pub const DEFAULT_USER_AGENT: &str = "secret_manager-updater";

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub release_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub staging_dir: Option<PathBuf>,
    pub cleanup_delay_secs: u64,
    pub show_progress: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            release_url: DEFAULT_RELEASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            staging_dir: None,
            cleanup_delay_secs: 5,
            show_progress: true,
        }
    }
}

impl Options {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(crate::paths::default_staging_dir)
    }
}

pub fn load() -> Result<Options> {
    match crate::paths::options_file() {
        Some(p) => load_from_file(&p),
        None => Ok(Options::default()),
    }
}

fn load_from_file(p: &Path) -> Result<Options> {
    let s = match std::fs::read_to_string(p) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %p.display(), "no options file, using defaults");
            return Ok(Options::default());
        }
        Err(e) => {
            return Err(SecretManagerError::Config {
                path: p.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let o = parse_options_toml(&s).map_err(|reason| SecretManagerError::Config {
        path: p.to_path_buf(),
        reason,
    })?;
    debug!(path = %p.display(), ?o, "loaded options");
    Ok(o)
}

fn parse_options_toml(s: &str) -> std::result::Result<Options, String> {
    let o: Options = toml::from_str(s).map_err(|e| e.to_string())?;
    if o.release_url.trim().is_empty() {
        return Err("`release_url` must not be empty".to_string());
    }
    if o.user_agent.trim().is_empty() {
        return Err("`user_agent` must not be empty".to_string());
    }
    Ok(o)
}
