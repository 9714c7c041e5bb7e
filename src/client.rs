//! The client event loop.
//!
//! One task owns the [`Session`] and serializes everything that touches it:
//! transport notifications are applied in delivery order, each one runs to
//! completion and is followed by a synchronous render refresh before the next
//! event or operator command is looked at.
//!
//! ## Teardown
//!
//! When the transport reports `Closed` (after a manager `SHUTDOWN`, a dropped
//! connection or a failed handshake) the session is terminal. The loop prints
//! the final table and returns. There is no reconnection; the operator starts
//! a new client for a new session.
//!
//! ## Operator console
//!
//! | Input      | Action                                             |
//! |------------|----------------------------------------------------|
//! | `status`   | print the full config/run table                    |
//! | `shutdown` | ask the manager to shut down (after `y` if confirm)|
//! | `help`     | list commands                                      |
//! | `quit`     | close the connection and exit                      |

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::command::CommandSender;
use crate::config::Config;
use crate::dispatch::{Dispatcher, Effect};
use crate::error::ConfigError;
use crate::protocol;
use crate::render::Renderer;
use crate::session::Session;
use crate::transport::{FrameSink, TransportEvent, WsTransport};

const HELP: &str = "commands: status, shutdown, help, quit";
const CONFIRM_PROMPT: &str = "Send shutdown request to the manager? [y/N]";

/// Session plus the machinery that mutates and displays it.
pub struct Client<R: Renderer> {
    session: Session,
    dispatcher: Dispatcher,
    commands: CommandSender,
    renderer: R,
}

impl<R: Renderer> Client<R> {
    pub fn new(commands: CommandSender, renderer: R) -> Self {
        Self {
            session: Session::new(),
            dispatcher: Dispatcher::new(),
            commands,
            renderer,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Apply one transport notification and refresh the view.
    pub fn handle_event(&mut self, event: TransportEvent, sink: &dyn FrameSink) {
        match event {
            TransportEvent::Opened => self.session.on_opened(),
            TransportEvent::Frame(text) => {
                let frame = match protocol::decode(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("dropping frame: {e}");
                        return;
                    }
                };
                if self.dispatcher.dispatch(&mut self.session, &frame) == Effect::CloseTransport {
                    sink.close();
                }
            }
            TransportEvent::Errored(reason) => self.session.on_errored(&reason),
            TransportEvent::Closed => self.session.on_closed(),
        }
        self.refresh();
    }

    /// Operator asked for a shutdown (already confirmed).
    pub fn request_shutdown(&mut self, sink: &dyn FrameSink) {
        self.commands.request_shutdown(&mut self.session, sink);
        self.refresh();
    }

    pub fn refresh(&mut self) {
        if let Err(e) = self.renderer.refresh(&self.session) {
            warn!("render failed: {e}");
        }
    }

    pub fn show_table(&mut self) {
        if let Err(e) = self.renderer.show_table(&self.session) {
            warn!("render failed: {e}");
        }
    }

    fn message(&mut self, text: &str) {
        if let Err(e) = self.renderer.message(text) {
            warn!("render failed: {e}");
        }
    }
}

/// What the event loop should do with one line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    None,
    ShowStatus,
    ShowHelp,
    /// Ask for confirmation before a shutdown.
    Confirm,
    Shutdown,
    ShutdownCancelled,
    Quit,
    Unknown(String),
}

/// Line-based operator input with a pending-confirmation state.
#[derive(Debug)]
pub struct Console {
    confirm: bool,
    awaiting_confirmation: bool,
}

impl Console {
    pub fn new(confirm: bool) -> Self {
        Self {
            confirm,
            awaiting_confirmation: false,
        }
    }

    pub fn handle_line(&mut self, line: &str) -> ConsoleAction {
        let input = line.trim();
        if self.awaiting_confirmation {
            self.awaiting_confirmation = false;
            return if matches!(input.to_ascii_lowercase().as_str(), "y" | "yes") {
                ConsoleAction::Shutdown
            } else {
                ConsoleAction::ShutdownCancelled
            };
        }
        match input {
            "" => ConsoleAction::None,
            "status" | "s" => ConsoleAction::ShowStatus,
            "help" | "h" | "?" => ConsoleAction::ShowHelp,
            "quit" | "q" | "exit" => ConsoleAction::Quit,
            "shutdown" if self.confirm => {
                self.awaiting_confirmation = true;
                ConsoleAction::Confirm
            }
            "shutdown" => ConsoleAction::Shutdown,
            other => ConsoleAction::Unknown(other.to_string()),
        }
    }
}

/// Connect to the manager and run until the connection is gone.
///
/// Returns the final session state.
pub async fn run<R, I>(config: &Config, renderer: R, input: I) -> Result<Session, ConfigError>
where
    R: Renderer,
    I: AsyncBufRead + Unpin,
{
    let url = config.endpoint()?;
    info!("connecting to manager at {url}");

    let (transport, mut events) = WsTransport::connect(&url);
    let mut client = Client::new(CommandSender::new(config.shutdown.graceful), renderer);
    let mut console = Console::new(config.shutdown.confirm);
    let mut lines = input.lines();
    let mut input_open = true;

    client.refresh();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let closed = event == TransportEvent::Closed;
                client.handle_event(event, &transport);
                if closed {
                    break;
                }
            }
            line = lines.next_line(), if input_open => {
                match line {
                    Ok(Some(line)) => match console.handle_line(&line) {
                        ConsoleAction::None => {}
                        ConsoleAction::ShowStatus => client.show_table(),
                        ConsoleAction::ShowHelp => client.message(HELP),
                        ConsoleAction::Confirm => client.message(CONFIRM_PROMPT),
                        ConsoleAction::Shutdown => client.request_shutdown(&transport),
                        ConsoleAction::ShutdownCancelled => client.message("Shutdown cancelled"),
                        ConsoleAction::Quit => transport.close(),
                        ConsoleAction::Unknown(cmd) => {
                            client.message(&format!("unknown command: {cmd} ({HELP})"));
                        }
                    },
                    Ok(None) => {
                        debug!("operator input closed");
                        input_open = false;
                    }
                    Err(e) => {
                        warn!("failed to read operator input: {e}");
                        input_open = false;
                    }
                }
            }
        }
    }

    client.show_table();
    info!("session terminated");
    Ok(client.into_session())
}
