//! Error types for the Voicemeeter remote connector

use thiserror::Error;

use crate::callback::Mode;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio callback error: {0}")]
    Callback(#[from] CallbackError),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio callback lifecycle errors.
///
/// These are delivered by value to audio handlers, so the type stays
/// `Clone` and carries no foreign error sources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("Audio callback for {0} is already registered")]
    AlreadyRegistered(Mode),

    #[error("Audio callback already registered by: {client_name}")]
    AlreadyRegisteredByOther { client_name: String },

    #[error("Failed to register audio callback (code {code})")]
    RegistrationFailed { code: i32 },

    #[error("Failed to start audio callback (code {code})")]
    StartFailed { code: i32 },

    #[error("No audio callback registered")]
    NoCallbackRegistered,

    #[error("Failed to stop audio callback (code {code})")]
    StopFailed { code: i32 },

    #[error("No audio callback registered for {0}")]
    NotRegistered(Mode),

    #[error("Failed to unregister audio callback (code {code})")]
    UnregisterFailed { code: i32 },

    #[error("Failed to unregister {} audio callback(s)", failures.len())]
    UnregisterAllFailed { failures: Vec<(Mode, CallbackError)> },

    #[error("Malformed audio record: {0}")]
    DecodeFailed(String),

    #[error("Audio handler panicked: {0}")]
    HandlerFault(String),

    #[error("Failed to restart callback after changed stream: {0}")]
    RestartAfterChangeFailed(Box<CallbackError>),

    #[error("Completion dropped before the native engine answered")]
    Abandoned,
}

/// Connection and remote API errors
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Failed to load {path}: {reason}")]
    LibraryLoad { path: String, reason: String },

    #[error("Missing symbol {0} in remote library")]
    MissingSymbol(&'static str),

    #[error("Login failed (code {code}): {reason}")]
    LoginFailed { code: i32, reason: &'static str },

    #[error("Logout failed (code {0})")]
    LogoutFailed(i32),

    #[error("Not connected")]
    NotConnected,

    #[error("Voicemeeter seems not to be installed (type {0})")]
    UnknownEngineKind(i32),

    #[error("Remote call {call} failed (code {code})")]
    CallFailed { call: &'static str, code: i32 },

    #[error("Failed to get macro button {index} status (code {code})")]
    MacroButtonGetFailed { index: i32, code: i32 },

    #[error("Failed to set macro button {index} status (code {code})")]
    MacroButtonSetFailed { index: i32, code: i32 },

    #[error("Invalid parameter name or script: {0}")]
    InvalidParameter(String),

    #[error("Failed to spawn watcher thread: {0}")]
    Spawn(String),
}

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
