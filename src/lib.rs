#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

//! # simwatch
//!
//! Live-status client for a distributed simulation-run manager.
//!
//! The manager pushes lifecycle events for its configs (parameter sets) and
//! their runs over a single WebSocket at `/ws`. simwatch keeps an in-memory
//! view of that state, streams it to the terminal and lets the operator ask
//! the manager to shut down.
//!
//! ## Architecture
//!
//! ```text
//! transport.rs — WebSocket adapter: connect/send/close, opened/errored/closed
//! protocol.rs  — frame codec (`webuiCommand` discriminator) and payload types
//! dispatch.rs  — discriminator → handler routing table
//! session.rs   — connection status, pause flag, config/run registry, log
//! render.rs    — pure projection of the session + terminal renderer
//! command.rs   — operator commands (shutdown)
//! client.rs    — event loop, teardown policy, operator console
//! config.rs    — TOML + env-var + CLI configuration
//! error.rs     — error types
//! ```
//!
//! Data flows `transport → protocol → dispatch → session → render` for
//! inbound frames, and `console → command → protocol → transport` for
//! operator commands.

pub mod client;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod render;
pub mod session;
pub mod transport;

pub use client::Client;
pub use config::Config;
pub use session::Session;
