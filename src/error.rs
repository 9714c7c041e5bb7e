//! Error types surfaced by the client core.
//!
//! Only [`ConfigError`] ever reaches `main`. A [`TransportError`] is logged by
//! the transport task and reported as the text of a
//! [`crate::transport::TransportEvent::Errored`]. Decode failures are logged
//! and the frame is dropped; semantic inconsistencies in the event stream are
//! reconciled inside [`crate::session`] and never become errors at all.

use std::path::PathBuf;

use thiserror::Error;

/// A frame that could not be turned into a routable [`crate::protocol::Frame`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame text is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The frame is valid JSON but not an object.
    #[error("frame payload is not a JSON object")]
    NotAnObject,
    /// The object has no `webuiCommand` field, or it is not a string.
    #[error("frame has no string `webuiCommand` discriminator")]
    MissingDiscriminator,
}

/// Configuration could not be loaded or resolved to a usable endpoint.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid manager endpoint: {0}")]
    InvalidEndpoint(String),
}

/// The channel to the manager could not be established.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket connect to {url} failed: {source}")]
    Connect {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
}
