//! In-memory model of one monitoring session.
//!
//! [`Session`] holds the connection status, the manager's pause flag, the
//! config/run registry and the append-only log. It is owned by the event loop
//! and mutated only by the dispatcher's handlers (and the connection
//! lifecycle callbacks), one event at a time, so it needs no locking.
//!
//! Run statuses only move forward (`Queued < Running < terminal`). Events that
//! reference a config or run the client has not seen yet synthesize the
//! missing row instead of being dropped, so a client that joins mid-session
//! still converges on the manager's state.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::{debug, warn};

/// Lifecycle of the single channel to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Errored => "ERRORED",
        }
    }

    /// `Closed` and `Errored` are final: there is no reconnection.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

/// Status of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }
}

/// One execution of a config.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub id: u32,
    pub status: RunStatus,
    /// Reported by the manager on completion.
    pub duration: Option<f64>,
}

impl Run {
    fn queued(id: u32) -> Self {
        Self {
            id,
            status: RunStatus::Queued,
            duration: None,
        }
    }

    /// Move to `next` if that is a forward transition.
    ///
    /// A repeated completion refreshes the duration; every other transition
    /// out of a terminal status is ignored.
    fn advance(&mut self, next: RunStatus, duration: Option<f64>) -> bool {
        if self.status == RunStatus::Completed && next == RunStatus::Completed {
            if duration.is_some() {
                self.duration = duration;
            }
            return true;
        }
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return false;
        }
        self.status = next;
        if next == RunStatus::Completed {
            self.duration = duration;
        }
        true
    }
}

/// A parameter set registered with the manager, and its runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub name: String,
    pub total_run_count: u32,
    pub result_dir: String,
    pub completed: bool,
    /// Synthesized from a run or completion event before `ADDED_CONFIG` was
    /// seen. `total_run_count` is provisional until the config is adopted.
    pub placeholder: bool,
    runs: BTreeMap<u32, Run>,
}

impl Config {
    fn new(name: &str, total_run_count: u32, result_dir: &str) -> Self {
        Self {
            name: name.to_string(),
            total_run_count,
            result_dir: result_dir.to_string(),
            completed: false,
            placeholder: false,
            runs: (0..total_run_count).map(|id| (id, Run::queued(id))).collect(),
        }
    }

    fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            total_run_count: 0,
            result_dir: String::new(),
            completed: false,
            placeholder: true,
            runs: BTreeMap::new(),
        }
    }

    /// Runs in id order.
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.values()
    }

    pub fn run(&self, id: u32) -> Option<&Run> {
        self.runs.get(&id)
    }

    /// Number of runs currently in `status`.
    pub fn count(&self, status: RunStatus) -> usize {
        self.runs.values().filter(|r| r.status == status).count()
    }

    /// Replace provisional placeholder data with the manager's registration.
    fn adopt(&mut self, total_run_count: u32, result_dir: &str) {
        let before = self.runs.len();
        self.runs.retain(|id, _| *id < total_run_count);
        if self.runs.len() != before {
            warn!(
                "config {}: dropped {} synthesized run(s) beyond totalRunCount {}",
                self.name,
                before - self.runs.len(),
                total_run_count
            );
        }
        for id in 0..total_run_count {
            self.runs.entry(id).or_insert_with(|| Run::queued(id));
        }
        self.total_run_count = total_run_count;
        self.result_dir = result_dir.to_string();
        self.placeholder = false;
    }
}

/// Severity attached to each log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub severity: Severity,
}

/// All client-side state for one connection lifetime.
#[derive(Debug)]
pub struct Session {
    connection: ConnectionStatus,
    paused: bool,
    configs: IndexMap<String, Config>,
    log: Vec<LogLine>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session, waiting for the transport to open.
    pub fn new() -> Self {
        Self {
            connection: ConnectionStatus::Connecting,
            paused: false,
            configs: IndexMap::new(),
            log: Vec::new(),
        }
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Outgoing commands are only allowed while the channel is open.
    pub fn can_send(&self) -> bool {
        self.connection == ConnectionStatus::Open
    }

    /// The pause flag as last reported by the manager.
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Configs in registration order.
    pub fn configs(&self) -> impl Iterator<Item = &Config> {
        self.configs.values()
    }

    pub fn config(&self, name: &str) -> Option<&Config> {
        self.configs.get(name)
    }

    pub fn log(&self) -> &[LogLine] {
        &self.log
    }

    // --- connection lifecycle ---

    /// The transport completed its handshake.
    pub fn on_opened(&mut self) {
        if self.connection.is_terminal() || self.connection == ConnectionStatus::Open {
            debug!(
                "ignoring open notification in state {}",
                self.connection.as_str()
            );
            return;
        }
        self.connection = ConnectionStatus::Open;
        self.append_log("Connected to manager", Severity::Notice);
    }

    /// The transport reported a failure. A `closed` notification follows.
    pub fn on_errored(&mut self, reason: &str) {
        if self.connection == ConnectionStatus::Closed {
            return;
        }
        self.connection = ConnectionStatus::Errored;
        self.append_log(format!("Connection error: {reason}"), Severity::Error);
    }

    /// The transport terminated. Idempotent.
    pub fn on_closed(&mut self) {
        if self.connection == ConnectionStatus::Closed {
            return;
        }
        self.connection = ConnectionStatus::Closed;
        self.append_log("Connection closed", Severity::Error);
    }

    // --- server events ---

    /// `NEW_CONNECTION`: take the manager's pause flag and its log backlog.
    pub fn apply_initial_state(&mut self, paused: bool, output: Vec<String>) {
        self.paused = paused;
        for line in output {
            self.append_log(line, Severity::Info);
        }
    }

    /// `ADDED_CONFIG`: register a config and queue all of its runs.
    ///
    /// A repeated add for an already registered name is a no-op. A placeholder
    /// created by an earlier run event is adopted, keeping run statuses.
    pub fn add_config(&mut self, name: &str, total_run_count: u32, result_dir: &str) {
        match self.configs.get_mut(name) {
            Some(config) if config.placeholder => config.adopt(total_run_count, result_dir),
            Some(_) => debug!("config {name} already registered, ignoring duplicate add"),
            None => {
                self.configs.insert(
                    name.to_string(),
                    Config::new(name, total_run_count, result_dir),
                );
            }
        }
    }

    /// `COMPLETED_CONFIG`: mark the config finished. Run statuses are left as
    /// they are.
    pub fn complete_config(&mut self, name: &str) {
        let config = self
            .configs
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("completion for unknown config {name}, synthesizing placeholder");
                Config::placeholder(name)
            });
        config.completed = true;
    }

    /// `STARTED_RUN`
    pub fn start_run(&mut self, config: &str, run: u32) {
        self.advance_run(config, run, RunStatus::Running, None);
    }

    /// `COMPLETED_RUN`
    pub fn complete_run(&mut self, config: &str, run: u32, duration: Option<f64>) {
        self.advance_run(config, run, RunStatus::Completed, duration);
    }

    /// `FAILED_RUN`
    pub fn fail_run(&mut self, config: &str, run: u32) {
        self.advance_run(config, run, RunStatus::Failed, None);
    }

    /// `SHUTDOWN` from the manager: the channel is finished.
    pub fn on_shutdown(&mut self) {
        self.append_log("Manager is shutting down", Severity::Warning);
        self.connection = ConnectionStatus::Closed;
    }

    /// Append one line to the log. The log is never truncated here.
    pub fn append_log(&mut self, text: impl Into<String>, severity: Severity) {
        self.log.push(LogLine {
            text: text.into(),
            severity,
        });
    }

    fn advance_run(
        &mut self,
        config: &str,
        run: u32,
        next: RunStatus,
        duration: Option<f64>,
    ) {
        let Some(entry) = self.run_entry(config, run) else {
            return;
        };
        if !entry.advance(next, duration) {
            debug!(
                "run {config}/{run}: ignoring {} after {}",
                next.as_str(),
                entry.status.as_str()
            );
        }
    }

    /// Find a run, synthesizing its config and row when they are unknown.
    ///
    /// Returns `None` when the run id lies outside a registered config, or
    /// is too large to fit under any `total_run_count`.
    fn run_entry(&mut self, name: &str, run: u32) -> Option<&mut Run> {
        let config = self.configs.entry(name.to_string()).or_insert_with(|| {
            debug!("run event for unknown config {name}, synthesizing placeholder");
            Config::placeholder(name)
        });
        if run >= config.total_run_count {
            if !config.placeholder {
                warn!(
                    "run {name}/{run} outside totalRunCount {}, dropping event",
                    config.total_run_count
                );
                return None;
            }
            let Some(total) = run.checked_add(1) else {
                warn!("run {name}/{run} cannot be tracked, dropping event");
                return None;
            };
            config.total_run_count = total;
        }
        Some(config.runs.entry(run).or_insert_with(|| Run::queued(run)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session() -> Session {
        let mut session = Session::new();
        session.on_opened();
        session
    }

    fn status(session: &Session, config: &str, run: u32) -> RunStatus {
        session.config(config).unwrap().run(run).unwrap().status
    }

    #[test]
    fn new_session_is_connecting_and_cannot_send() {
        let session = Session::new();
        assert_eq!(session.connection(), ConnectionStatus::Connecting);
        assert!(!session.can_send());
    }

    #[test]
    fn opened_allows_sending() {
        let session = open_session();
        assert_eq!(session.connection(), ConnectionStatus::Open);
        assert!(session.can_send());
        assert_eq!(session.log()[0].severity, Severity::Notice);
    }

    #[test]
    fn added_configs_queue_every_run() {
        let mut session = open_session();
        session.add_config("A", 3, "/a");
        session.add_config("B", 0, "/b");
        session.add_config("C", 5, "/c");

        let names: Vec<&str> = session.configs().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        for config in session.configs() {
            assert_eq!(config.runs().count() as u32, config.total_run_count);
            assert!(config.runs().all(|r| r.status == RunStatus::Queued));
            assert!(!config.completed);
        }
    }

    #[test]
    fn duplicate_add_does_not_duplicate_runs() {
        let mut session = open_session();
        session.add_config("A", 2, "/a");
        session.start_run("A", 0);
        session.add_config("A", 7, "/other");

        let config = session.config("A").unwrap();
        assert_eq!(config.total_run_count, 2);
        assert_eq!(config.result_dir, "/a");
        assert_eq!(config.runs().count(), 2);
        assert_eq!(status(&session, "A", 0), RunStatus::Running);
        assert_eq!(session.configs().count(), 1);
    }

    #[test]
    fn started_then_completed_keeps_duration() {
        let mut session = open_session();
        session.add_config("K0", 2, "/r");
        session.start_run("K0", 0);
        assert_eq!(status(&session, "K0", 0), RunStatus::Running);
        session.complete_run("K0", 0, Some(12.5));

        let run = session.config("K0").unwrap().run(0).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.duration, Some(12.5));
        assert_eq!(status(&session, "K0", 1), RunStatus::Queued);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut session = open_session();
        session.add_config("K0", 1, "/r");
        session.complete_run("K0", 0, Some(3.0));
        session.start_run("K0", 0);
        session.fail_run("K0", 0);

        let run = session.config("K0").unwrap().run(0).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.duration, Some(3.0));
    }

    #[test]
    fn failed_is_not_overwritten_by_completion() {
        let mut session = open_session();
        session.add_config("K0", 1, "/r");
        session.start_run("K0", 0);
        session.fail_run("K0", 0);
        session.complete_run("K0", 0, Some(1.0));

        let run = session.config("K0").unwrap().run(0).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.duration, None);
    }

    #[test]
    fn repeated_completion_updates_duration() {
        let mut session = open_session();
        session.add_config("K0", 1, "/r");
        session.complete_run("K0", 0, Some(1.0));
        session.complete_run("K0", 0, Some(2.0));
        session.complete_run("K0", 0, None);
        assert_eq!(
            session.config("K0").unwrap().run(0).unwrap().duration,
            Some(2.0)
        );
    }

    #[test]
    fn run_event_for_unknown_config_synthesizes_placeholder() {
        let mut session = open_session();
        session.start_run("late", 4);

        let config = session.config("late").unwrap();
        assert!(config.placeholder);
        assert_eq!(config.total_run_count, 5);
        assert_eq!(config.runs().count(), 1);
        assert_eq!(status(&session, "late", 4), RunStatus::Running);
    }

    #[test]
    fn added_config_adopts_placeholder_and_keeps_statuses() {
        let mut session = open_session();
        session.complete_run("late", 1, Some(9.0));
        session.start_run("late", 6);
        session.add_config("late", 3, "/late");

        let config = session.config("late").unwrap();
        assert!(!config.placeholder);
        assert_eq!(config.total_run_count, 3);
        assert_eq!(config.result_dir, "/late");
        assert_eq!(config.runs().count(), 3);
        assert!(config.run(6).is_none());
        assert_eq!(status(&session, "late", 0), RunStatus::Queued);
        assert_eq!(status(&session, "late", 1), RunStatus::Completed);
    }

    #[test]
    fn out_of_range_run_on_registered_config_is_dropped() {
        let mut session = open_session();
        session.add_config("K0", 2, "/r");
        session.start_run("K0", 2);

        let config = session.config("K0").unwrap();
        assert_eq!(config.total_run_count, 2);
        assert!(config.run(2).is_none());
    }

    #[test]
    fn completed_config_leaves_runs_alone() {
        let mut session = open_session();
        session.add_config("K0", 2, "/r");
        session.start_run("K0", 0);
        session.complete_config("K0");

        let config = session.config("K0").unwrap();
        assert!(config.completed);
        assert_eq!(config.count(RunStatus::Running), 1);
        assert_eq!(config.count(RunStatus::Queued), 1);
    }

    #[test]
    fn completed_config_for_unknown_name_is_tolerated() {
        let mut session = open_session();
        session.complete_config("ghost");
        let config = session.config("ghost").unwrap();
        assert!(config.completed);
        assert!(config.placeholder);
    }

    #[test]
    fn initial_state_sets_pause_and_appends_history() {
        let mut session = open_session();
        session.apply_initial_state(true, vec!["one".into(), "two".into()]);
        assert!(session.paused());
        let texts: Vec<&str> = session.log().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["Connected to manager", "one", "two"]);
    }

    #[test]
    fn shutdown_closes_connection() {
        let mut session = open_session();
        session.on_shutdown();
        assert_eq!(session.connection(), ConnectionStatus::Closed);
        assert!(!session.can_send());

        let before = session.log().len();
        session.on_closed();
        assert_eq!(session.log().len(), before);
    }

    #[test]
    fn maximal_run_id_for_unknown_config_is_dropped() {
        let mut session = open_session();
        session.start_run("late", u32::MAX);
        session.complete_run("late", u32::MAX, Some(1.0));

        let config = session.config("late").unwrap();
        assert!(config.placeholder);
        assert_eq!(config.total_run_count, 0);
        assert!(config.run(u32::MAX).is_none());

        session.start_run("late", 2);
        let config = session.config("late").unwrap();
        assert_eq!(config.total_run_count, 3);
        assert!(config.runs().all(|r| r.id < config.total_run_count));
    }

    #[test]
    fn terminal_helpers_match_lifecycle() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(ConnectionStatus::Errored.is_terminal());
        assert!(!ConnectionStatus::Open.is_terminal());
    }

    #[test]
    fn error_then_close_ends_closed() {
        let mut session = open_session();
        session.on_errored("reset by peer");
        assert_eq!(session.connection(), ConnectionStatus::Errored);
        assert!(!session.can_send());
        session.on_closed();
        assert_eq!(session.connection(), ConnectionStatus::Closed);
        session.on_opened();
        assert_eq!(session.connection(), ConnectionStatus::Closed);
    }
}
