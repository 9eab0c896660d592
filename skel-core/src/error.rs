//! Error types for skel-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration and input-file handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, with the path that caused it.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load; includes the file path.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The settings file was missing or still carries `edit_flag: false`.
    #[error("please edit {path} with your settings (set \"edit_flag\" to true)")]
    NotEdited { path: PathBuf },

    /// `dirs::config_dir()` returned `None`.
    #[error("cannot determine the configuration directory; set $HOME or equivalent")]
    ConfigDirNotFound,
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
