//! Projection of the session into what the operator sees.
//!
//! [`project`] is a pure function of the [`Session`]: status banner, one row
//! per config with progress counts, one row per run and a window onto the log.
//! [`TextRenderer`] is the terminal consumer used by the binary. After every
//! event it diffs the projection against what it last printed and streams the
//! changes: banner, config rows, run rows and new log lines. The full table is
//! printed on request.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::session::{ConnectionStatus, LogLine, RunStatus, Session};

/// Top-line status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Connecting,
    Running,
    Paused,
    /// The connection is gone. Shown regardless of the stored pause flag.
    Disconnected,
}

impl Banner {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRow {
    pub name: String,
    pub result_dir: String,
    pub total: u32,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub config: String,
    pub run: u32,
    pub status: RunStatus,
    pub duration: Option<f64>,
}

/// Everything needed to draw one frame of the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct View<'a> {
    pub banner: Banner,
    pub configs: Vec<ConfigRow>,
    pub runs: Vec<RunRow>,
    /// The last `log_window` lines, or all of them when the window is 0.
    pub log: &'a [LogLine],
}

pub fn banner(session: &Session) -> Banner {
    match session.connection() {
        ConnectionStatus::Connecting => Banner::Connecting,
        ConnectionStatus::Open if session.paused() => Banner::Paused,
        ConnectionStatus::Open => Banner::Running,
        ConnectionStatus::Closed | ConnectionStatus::Errored => Banner::Disconnected,
    }
}

pub fn project(session: &Session, log_window: usize) -> View<'_> {
    let configs = session
        .configs()
        .map(|c| ConfigRow {
            name: c.name.clone(),
            result_dir: c.result_dir.clone(),
            total: c.total_run_count,
            queued: c.count(RunStatus::Queued),
            running: c.count(RunStatus::Running),
            completed: c.count(RunStatus::Completed),
            failed: c.count(RunStatus::Failed),
            done: c.completed,
        })
        .collect();

    let runs = session
        .configs()
        .flat_map(|c| {
            c.runs().map(move |r| RunRow {
                config: c.name.clone(),
                run: r.id,
                status: r.status,
                duration: r.duration,
            })
        })
        .collect();

    let log = session.log();
    let start = if log_window == 0 {
        0
    } else {
        log.len().saturating_sub(log_window)
    };

    View {
        banner: banner(session),
        configs,
        runs,
        log: &log[start..],
    }
}

/// Consumer of the session view.
pub trait Renderer {
    /// Called after every applied event, before the next one is processed.
    fn refresh(&mut self, session: &Session) -> io::Result<()>;
    /// Draw the full projection.
    fn show_table(&mut self, session: &Session) -> io::Result<()>;
    /// Show a one-off operator message (prompts, command feedback).
    fn message(&mut self, text: &str) -> io::Result<()>;
}

/// Line-oriented terminal renderer.
pub struct TextRenderer<W: Write> {
    out: W,
    log_window: usize,
    show_runs: bool,
    printed_log: usize,
    last_banner: Option<Banner>,
    printed_configs: HashMap<String, ConfigRow>,
    printed_runs: HashMap<(String, u32), (RunStatus, Option<f64>)>,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, log_window: usize, show_runs: bool) -> Self {
        Self {
            out,
            log_window,
            show_runs,
            printed_log: 0,
            last_banner: None,
            printed_configs: HashMap::new(),
            printed_runs: HashMap::new(),
        }
    }

    /// Print config rows that are new or whose registration or completion
    /// changed. Progress counts alone do not trigger a line; the run lines
    /// already show that.
    fn write_config_changes(&mut self, rows: Vec<ConfigRow>) -> io::Result<()> {
        for row in rows {
            match self.printed_configs.get(&row.name) {
                None => writeln!(
                    self.out,
                    "+ {}: {} run(s) -> {}",
                    row.name,
                    row.total,
                    display_dir(&row.result_dir)
                )?,
                Some(prev) => {
                    if prev.total != row.total || prev.result_dir != row.result_dir {
                        writeln!(
                            self.out,
                            "~ {}: {} run(s) -> {}",
                            row.name,
                            row.total,
                            display_dir(&row.result_dir)
                        )?;
                    }
                    if !prev.done && row.done {
                        writeln!(
                            self.out,
                            "* {} completed ({} completed, {} failed of {})",
                            row.name, row.completed, row.failed, row.total
                        )?;
                    }
                }
            }
            self.printed_configs.insert(row.name.clone(), row);
        }
        Ok(())
    }

    /// Print run rows whose status or duration changed. Runs that first
    /// appear as `QUEUED` are recorded silently.
    fn write_run_changes(&mut self, rows: Vec<RunRow>) -> io::Result<()> {
        for row in rows {
            let key = (row.config, row.run);
            let current = (row.status, row.duration);
            let changed = match self.printed_runs.get(&key) {
                None => row.status != RunStatus::Queued,
                Some(prev) => *prev != current,
            };
            if changed {
                write_run_line(&mut self.out, &key.0, key.1, row.status, row.duration)?;
            }
            self.printed_runs.insert(key, current);
        }
        Ok(())
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn refresh(&mut self, session: &Session) -> io::Result<()> {
        let current = banner(session);
        if self.last_banner != Some(current) {
            writeln!(self.out, "== {} ==", current.label())?;
            self.last_banner = Some(current);
        }
        let view = project(session, 0);
        self.write_config_changes(view.configs)?;
        if self.show_runs {
            self.write_run_changes(view.runs)?;
        }
        let log = session.log();
        for line in &log[self.printed_log.min(log.len())..] {
            write_log_line(&mut self.out, line)?;
        }
        self.printed_log = log.len();
        self.out.flush()
    }

    fn show_table(&mut self, session: &Session) -> io::Result<()> {
        let view = project(session, self.log_window);
        writeln!(self.out, "== {} ==", view.banner.label())?;
        writeln!(
            self.out,
            "{:<24} {:>6} {:>7} {:>8} {:>10} {:>7}  {:<5} DIR",
            "CONFIG", "RUNS", "QUEUED", "RUNNING", "COMPLETED", "FAILED", "DONE"
        )?;
        for row in &view.configs {
            writeln!(
                self.out,
                "{:<24} {:>6} {:>7} {:>8} {:>10} {:>7}  {:<5} {}",
                row.name,
                row.total,
                row.queued,
                row.running,
                row.completed,
                row.failed,
                if row.done { "yes" } else { "no" },
                row.result_dir
            )?;
        }
        if self.show_runs && !view.runs.is_empty() {
            writeln!(self.out)?;
            for row in &view.runs {
                write_run_line(&mut self.out, &row.config, row.run, row.status, row.duration)?;
            }
        }
        if !view.log.is_empty() {
            writeln!(self.out)?;
            for line in view.log {
                write_log_line(&mut self.out, line)?;
            }
        }
        self.out.flush()
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }
}

fn write_log_line(out: &mut impl Write, line: &LogLine) -> io::Result<()> {
    writeln!(out, "[{}] {}", line.severity.as_str(), line.text)
}

fn write_run_line(
    out: &mut impl Write,
    config: &str,
    run: u32,
    status: RunStatus,
    duration: Option<f64>,
) -> io::Result<()> {
    writeln!(
        out,
        "  {}#{:<5} {:<10} {}",
        config,
        run,
        status.as_str(),
        format_duration(duration)
    )
}

fn display_dir(dir: &str) -> &str {
    if dir.is_empty() {
        "?"
    } else {
        dir
    }
}

fn format_duration(duration: Option<f64>) -> String {
    duration.map_or_else(String::new, |d| format!("{d:.1}s"))
}
