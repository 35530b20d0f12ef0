//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not JSON, or a field has the wrong shape.
    #[error("malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A value parsed fine but breaks a range or cross-field rule.
    #[error("setting `{field}` {rule}")]
    Constraint {
        /// camelCase path of the offending field, e.g. `hub.pongWaitMs`.
        field: &'static str,
        /// The rule it broke.
        rule: &'static str,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
