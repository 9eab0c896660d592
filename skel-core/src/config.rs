//! Agent settings persisted as `skelsettings.json`.
//!
//! # Storage layout
//!
//! ```text
//! <config dir>/skelenox/
//!   skelsettings.json   (mode 0600, pretty JSON)
//! ```
//!
//! # API pattern
//!
//! Every function that touches disk has two forms:
//! - `fn_at(path: &Path, …)`: explicit settings path; used in tests
//! - `fn(…)`: derives the path from [`default_path`], delegates to `_at`
//!
//! A missing file is populated with defaults and reported as
//! [`CoreError::NotEdited`]: the analyst must fill in the server details and
//! flip `edit_flag` before the agent will start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

pub const SETTINGS_FILE: &str = "skelsettings.json";

/// Effective agent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkelConfig {
    pub username: String,
    /// Must be set to `true` by the analyst once the file has been edited.
    pub edit_flag: bool,

    pub poli_server: String,
    pub poli_port: u16,
    /// API prefix, e.g. `/api/1.0/`.
    pub poli_remote_path: String,
    pub poli_apikey: String,
    /// Use plain HTTP and log every request.
    pub debug_http: bool,

    /// Seconds between periodic workspace backups.
    pub save_timeout: u64,
    /// Milliseconds between two pulls of remote changes.
    pub sync_frequency: u64,
    /// Offer to push pre-existing names and comments at startup.
    pub initial_sync: bool,

    pub notepad_font_name: String,
    pub notepad_font_size: u32,
}

impl Default for SkelConfig {
    fn default() -> Self {
        Self {
            username: "Anonymous".to_string(),
            edit_flag: false,
            poli_server: String::new(),
            poli_port: 80,
            poli_remote_path: String::new(),
            poli_apikey: String::new(),
            debug_http: false,
            save_timeout: 10 * 60,
            sync_frequency: 1000,
            initial_sync: false,
            notepad_font_name: "Courier New".to_string(),
            notepad_font_size: 10,
        }
    }
}

impl SkelConfig {
    /// Timer period and stop-wait window of the sync agent.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_frequency.max(1))
    }

    /// `http(s)://server:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.debug_http { "http" } else { "https" };
        format!("{scheme}://{}:{}", self.poli_server, self.poli_port)
    }

    /// Remote API prefix normalised to start and end with `/`.
    pub fn remote_prefix(&self) -> String {
        let trimmed = self.poli_remote_path.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }

    /// Pretty JSON of the settings with the API key redacted.
    pub fn dump(&self) -> Result<String, CoreError> {
        let mut shown = self.clone();
        if !shown.poli_apikey.is_empty() {
            shown.poli_apikey = "********".to_string();
        }
        Ok(serde_json::to_string_pretty(&shown)?)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<config dir>/skelenox/skelsettings.json`.
pub fn default_path() -> Result<PathBuf, CoreError> {
    dirs::config_dir()
        .map(|dir| dir.join("skelenox").join(SETTINGS_FILE))
        .ok_or(CoreError::ConfigDirNotFound)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load settings from `path`.
///
/// Missing file: defaults are written and `NotEdited` is returned.
/// `edit_flag == false`: `NotEdited` is returned without touching the file.
pub fn load_at(path: &Path) -> Result<SkelConfig, CoreError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "settings file missing, populating defaults");
        save_at(path, &SkelConfig::default())?;
        return Err(CoreError::NotEdited {
            path: path.to_path_buf(),
        });
    }

    tracing::info!(path = %path.display(), "loading settings file");
    let config = read_at(path)?;
    if !config.edit_flag {
        return Err(CoreError::NotEdited {
            path: path.to_path_buf(),
        });
    }
    Ok(config)
}

/// Parse `path` as-is: no defaults written, `edit_flag` not checked.
pub fn read_at(path: &Path) -> Result<SkelConfig, CoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| CoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SkelConfig, CoreError> {
    load_at(&default_path()?)
}

/// Write settings atomically (`.tmp` + rename).
pub fn save_at(path: &Path, config: &SkelConfig) -> Result<(), CoreError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}
