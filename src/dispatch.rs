//! Routes decoded frames to the handler responsible for their kind.
//!
//! The table is keyed by the `webuiCommand` string. Kinds without a handler
//! are ignored so that newer managers can add events without breaking this
//! client. Handlers never fail: a payload that does not fit the expected shape
//! is logged and leaves the session untouched.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::protocol::{self, Frame};
use crate::session::{Session, Severity};

/// Side effect a handler asks the event loop to perform after the session
/// has been updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// The manager is going away: close the transport.
    CloseTransport,
}

/// A total function over the session for one event kind.
pub type Handler = fn(&mut Session, &Frame) -> Effect;

/// Discriminator → handler routing table.
pub struct Dispatcher {
    routes: HashMap<&'static str, Handler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// The table for every server event this client understands.
    pub fn new() -> Self {
        let mut routes: HashMap<&'static str, Handler> = HashMap::new();
        routes.insert(protocol::NEW_CONNECTION, on_new_connection);
        routes.insert(protocol::ADDED_CONFIG, on_added_config);
        routes.insert(protocol::COMPLETED_CONFIG, on_completed_config);
        routes.insert(protocol::STARTED_RUN, on_started_run);
        routes.insert(protocol::COMPLETED_RUN, on_completed_run);
        routes.insert(protocol::FAILED_RUN, on_failed_run);
        routes.insert(protocol::DISPLAY_LOG, on_display_log);
        routes.insert(protocol::SHUTDOWN, on_shutdown);
        Self { routes }
    }

    /// Whether `kind` has a handler.
    pub fn handles(&self, kind: &str) -> bool {
        self.routes.contains_key(kind)
    }

    /// Apply one frame to the session.
    pub fn dispatch(&self, session: &mut Session, frame: &Frame) -> Effect {
        match self.routes.get(frame.kind.as_str()) {
            Some(handler) => handler(session, frame),
            None => {
                debug!("ignoring unknown event kind {}", frame.kind);
                Effect::None
            }
        }
    }
}

/// Decode the frame's payload, logging and returning `None` on mismatch.
fn payload<T: DeserializeOwned>(frame: &Frame) -> Option<T> {
    match frame.payload() {
        Ok(p) => Some(p),
        Err(e) => {
            debug!("dropping {} with unexpected payload: {e}", frame.kind);
            None
        }
    }
}

fn on_new_connection(session: &mut Session, frame: &Frame) -> Effect {
    if let Some(p) = payload::<protocol::NewConnection>(frame) {
        session.apply_initial_state(p.paused, p.output);
    }
    Effect::None
}

fn on_added_config(session: &mut Session, frame: &Frame) -> Effect {
    if let Some(p) = payload::<protocol::AddedConfig>(frame) {
        session.add_config(&p.config, p.total_run_count, &p.result_dir);
    }
    Effect::None
}

fn on_completed_config(session: &mut Session, frame: &Frame) -> Effect {
    if let Some(p) = payload::<protocol::CompletedConfig>(frame) {
        session.complete_config(&p.config);
    }
    Effect::None
}

fn on_started_run(session: &mut Session, frame: &Frame) -> Effect {
    if let Some(p) = payload::<protocol::RunRef>(frame) {
        session.start_run(&p.config, p.run);
    }
    Effect::None
}

fn on_completed_run(session: &mut Session, frame: &Frame) -> Effect {
    if let Some(p) = payload::<protocol::CompletedRun>(frame) {
        session.complete_run(&p.config, p.run, p.duration);
    }
    Effect::None
}

fn on_failed_run(session: &mut Session, frame: &Frame) -> Effect {
    if let Some(p) = payload::<protocol::RunRef>(frame) {
        session.fail_run(&p.config, p.run);
    }
    Effect::None
}

fn on_display_log(session: &mut Session, frame: &Frame) -> Effect {
    if let Some(p) = payload::<protocol::DisplayLog>(frame) {
        session.append_log(p.line, Severity::Info);
    }
    Effect::None
}

fn on_shutdown(session: &mut Session, _frame: &Frame) -> Effect {
    session.on_shutdown();
    Effect::CloseTransport
}
