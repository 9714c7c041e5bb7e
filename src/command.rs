//! Operator-initiated commands to the manager.
//!
//! Commands are fire-and-forget: the manager sends no acknowledgement, and a
//! command issued while the channel is not open is dropped without error.

use tracing::{debug, info};

use crate::protocol::ClientCommand;
use crate::session::{Session, Severity};
use crate::transport::FrameSink;

/// Builds and transmits operator commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandSender {
    /// Value for the optional `graceful` field of `SHUTDOWN`.
    graceful: Option<bool>,
}

impl CommandSender {
    pub fn new(graceful: Option<bool>) -> Self {
        Self { graceful }
    }

    /// Ask the manager to shut down.
    ///
    /// The feedback line is logged whether or not the frame goes out. Returns
    /// `true` if the frame was handed to the transport.
    pub fn request_shutdown(&self, session: &mut Session, sink: &dyn FrameSink) -> bool {
        session.append_log("Sending shutdown request", Severity::Notice);
        self.send(
            session,
            sink,
            ClientCommand::Shutdown {
                graceful: self.graceful,
            },
        )
    }

    fn send(&self, session: &Session, sink: &dyn FrameSink, command: ClientCommand) -> bool {
        if !session.can_send() {
            debug!(
                "not sending {}: connection is {}",
                command.kind(),
                session.connection().as_str()
            );
            return false;
        }
        info!("sending {} to manager", command.kind());
        sink.send(command.to_frame());
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records frames instead of sending them.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: RefCell<Vec<String>>,
        pub closes: RefCell<usize>,
    }

    impl FrameSink for RecordingSink {
        fn send(&self, frame: String) {
            self.sent.borrow_mut().push(frame);
        }

        fn close(&self) {
            *self.closes.borrow_mut() += 1;
        }
    }

    #[test]
    fn shutdown_is_sent_while_open() {
        let sink = RecordingSink::default();
        let mut session = Session::new();
        session.on_opened();

        assert!(CommandSender::new(None).request_shutdown(&mut session, &sink));
        assert_eq!(*sink.sent.borrow(), [r#"{"webuiCommand":"SHUTDOWN"}"#]);
        assert_eq!(
            session.log().last().unwrap().text,
            "Sending shutdown request"
        );
    }

    #[test]
    fn shutdown_carries_graceful_when_configured() {
        let sink = RecordingSink::default();
        let mut session = Session::new();
        session.on_opened();

        CommandSender::new(Some(false)).request_shutdown(&mut session, &sink);
        let sent: serde_json::Value = serde_json::from_str(&sink.sent.borrow()[0]).unwrap();
        assert_eq!(
            sent,
            serde_json::json!({"webuiCommand": "SHUTDOWN", "graceful": false})
        );
    }

    #[test]
    fn shutdown_without_open_connection_sends_nothing() {
        let sink = RecordingSink::default();
        let sender = CommandSender::default();

        let mut connecting = Session::new();
        assert!(!sender.request_shutdown(&mut connecting, &sink));

        let mut closed = Session::new();
        closed.on_opened();
        closed.on_shutdown();
        assert!(!sender.request_shutdown(&mut closed, &sink));
        assert!(!sender.request_shutdown(&mut closed, &sink));

        assert!(sink.sent.borrow().is_empty());
        assert_eq!(
            closed
                .log()
                .iter()
                .filter(|l| l.text == "Sending shutdown request")
                .count(),
            2
        );
    }

    #[test]
    fn shutdown_may_be_repeated() {
        let sink = RecordingSink::default();
        let mut session = Session::new();
        session.on_opened();
        let sender = CommandSender::new(Some(true));
        sender.request_shutdown(&mut session, &sink);
        sender.request_shutdown(&mut session, &sink);
        assert_eq!(sink.sent.borrow().len(), 2);
    }
}
