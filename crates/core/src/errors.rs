//! Error types for the ldap-template core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Directory errors
// ---------------------------------------------------------------------------

/// Errors talking to the directory server.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Dialing the server failed.
    #[error("directory connection to '{url}' failed: {detail}")]
    Connect { url: String, detail: String },

    /// The service account bind was rejected.
    #[error("directory bind as '{bind_dn}' failed: {detail}")]
    Bind { bind_dn: String, detail: String },

    /// The search operation failed.
    #[error("directory search under '{base_dn}' failed: {detail}")]
    Search { base_dn: String, detail: String },
}

// ---------------------------------------------------------------------------
// Timestamp errors
// ---------------------------------------------------------------------------

/// Errors parsing a directory generalized-time value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    /// The entry carries no timestamp attribute.
    #[error("directory entry has no '{0}' attribute")]
    Missing(String),

    /// The value does not follow `YYYYMMDDHHMMSSZ`.
    #[error("malformed directory timestamp '{value}': {detail}")]
    Malformed { value: String, detail: String },
}

// ---------------------------------------------------------------------------
// Lookup errors
// ---------------------------------------------------------------------------

/// Outcome kinds of a person lookup that did not produce a record.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No entry matched, or the matching entry has no display name.
    #[error("person not found")]
    NotFound,

    /// Connection, bind or search failure.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The entry's last-modified timestamp could not be parsed.
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

// ---------------------------------------------------------------------------
// Template errors
// ---------------------------------------------------------------------------

/// Errors resolving or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template identifier contains characters outside `[A-Za-z0-9-]`.
    #[error("malformed template name '{0}'")]
    InvalidName(String),

    /// No template file exists for the identifier and format.
    #[error("template file not found: {0}")]
    NotFound(String),

    /// The template file exists but could not be read.
    #[error("failed to read template '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Template syntax error or runtime substitution failure.
    #[error("failed to render template: {0}")]
    Render(String),
}
