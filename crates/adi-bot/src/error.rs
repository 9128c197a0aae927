//! Error types for the bot binary.
//!
//! [`BotError`] wraps every failure that can stop the bot: startup
//! (config, state, registration) and the few fatal events of the loop.

use std::path::PathBuf;

/// Top-level error for the bot binary.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: adi_core::ConfigError,
    },

    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The `console` section of the config is unusable.
    #[error("console config error: {message}")]
    Console {
        /// Description of the problem.
        message: String,
    },

    /// The log file could not be opened.
    #[error("cannot open log file {path}: {source}")]
    LogFile {
        /// The configured log file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Persisted state could not be loaded.
    #[error("state error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: adi_core::StoreError,
    },

    /// Handler registration or registry assembly failed.
    #[error("command registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: adi_core::RegistryError,
    },

    /// The address matcher could not be built for the bot id.
    #[error("address matcher error: {source}")]
    Address {
        /// The underlying regex error.
        #[from]
        source: regex::Error,
    },

    /// The console reader thread could not be started.
    #[error("cannot start console input: {source}")]
    InputThread {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The platform rejected the credentials.
    #[error("invalid credentials")]
    InvalidAuth,

    /// The inbound event channel closed before startup finished.
    #[error("event channel closed")]
    EventChannelClosed,
}
