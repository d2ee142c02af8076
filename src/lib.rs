//! # Voicemeeter Remote
//!
//! Control a running Voicemeeter engine and process its audio in real time.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          APPLICATION                                  │
//! │   handler(error, event)          Connector / AudioCallbacks           │
//! └────────▲──────────────────────────────────┬──────────────────────────┘
//!          │ decoded AudioEvent               │ register / start / stop
//!          │                                  │ unregister / parameters
//! ┌────────┴──────────────┐   ┌───────────────▼──────────────────────────┐
//! │ Bridge (callback)     │   │ Coordinator (callback::AudioCallbacks)   │
//! │  trampoline::<MODE>   │   │  oneshot completions per operation       │
//! │  decode + catch_unwind│   │                                          │
//! └────────▲──────────────┘   └───────────────┬──────────────────────────┘
//!          │ STARTING / ENDING ┌──────────────▼───────────────┐
//!          └──────────────────►│ CallbackRegistry (per mode)  │
//!                              │  handle · ended · waiters    │
//!                              └──────────────────────────────┘
//!          ▲                                  │
//!          │ audio thread                     │ C ABI
//! ┌────────┴──────────────────────────────────▼──────────────────────────┐
//! │             VoicemeeterRemote64.dll (remote::RemoteLibrary)          │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod callback;
pub mod config;
pub mod connector;
pub mod error;
pub mod remote;

pub use callback::{AudioBuffer, AudioCallbacks, AudioEvent, CallbackOptions, Mode};
pub use config::ConnectorConfig;
pub use connector::Connector;
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default install location of the remote library
    pub const DEFAULT_LIBRARY_PATH: &str =
        r"C:\Program Files (x86)\VB\Voicemeeter\VoicemeeterRemote64.dll";

    /// Delay between a CHANGE event and the automatic restart
    pub const DEFAULT_RESTART_DELAY_MS: u64 = 50;

    /// Dirty-flag poll period of the change watcher
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

    /// Wait after a parameter script so the engine has applied it
    pub const DEFAULT_PARAMETER_SETTLE_MS: u64 = 200;
}
