//! WebSocket transport to the manager.
//!
//! [`WsTransport`] owns one duplex channel. A background task performs the
//! handshake, forwards inbound text frames and writes outbound ones. Lifecycle
//! is reported on an event channel:
//!
//! - exactly one [`TransportEvent::Opened`] after a successful handshake
//! - zero or more [`TransportEvent::Errored`]
//! - exactly one [`TransportEvent::Closed`], always last
//!
//! Closing while the handshake is still pending emits only `Closed`. There is
//! no reconnection. Once `Closed` has been emitted the transport is finished
//! and a new session needs a new instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Notification from the transport task, delivered in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    /// One inbound text frame, undecoded.
    Frame(String),
    Errored(String),
    Closed,
}

/// Outbound half of a transport, as seen by the command sender.
pub trait FrameSink {
    /// Transmit one frame. A no-op unless the channel is open.
    fn send(&self, frame: String);
    /// Close the channel. Closing twice is a no-op.
    fn close(&self);
}

enum Outgoing {
    Frame(String),
    Close,
}

/// Handle to the transport task.
pub struct WsTransport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    open: Arc<AtomicBool>,
}

impl WsTransport {
    /// Start connecting to `url`.
    ///
    /// Returns immediately. A failed handshake is reported as `Errored`
    /// followed by `Closed` on the returned receiver.
    pub fn connect(url: &str) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        tokio::spawn(io_loop(
            url.to_string(),
            out_rx,
            event_tx,
            Arc::clone(&open),
        ));

        (
            Self {
                outgoing: out_tx,
                open,
            },
            event_rx,
        )
    }

    /// Whether the handshake has completed and the channel is not closed.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl FrameSink for WsTransport {
    fn send(&self, frame: String) {
        if !self.is_open() {
            debug!("transport not open, discarding outbound frame");
            return;
        }
        let _ = self.outgoing.send(Outgoing::Frame(frame));
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("closing connection to manager");
        }
        // The task may already be gone; that is the same as closed.
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

/// Connect, then pump frames in both directions until either side closes.
async fn io_loop(
    url: String,
    mut out_rx: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<TransportEvent>,
    open: Arc<AtomicBool>,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send(event);
    };

    // A close requested while the handshake is pending abandons it.
    let connect = tokio_tungstenite::connect_async(url.clone());
    tokio::pin!(connect);
    let handshake = loop {
        tokio::select! {
            res = &mut connect => break res,
            cmd = out_rx.recv() => match cmd {
                Some(Outgoing::Frame(_)) => debug!("not connected yet, discarding outbound frame"),
                Some(Outgoing::Close) | None => {
                    info!("close requested before handshake with {url} completed");
                    emit(TransportEvent::Closed);
                    return;
                }
            },
        }
    };
    let ws_stream = match handshake {
        Ok((ws_stream, _response)) => ws_stream,
        Err(source) => {
            let err = TransportError::Connect { url, source };
            warn!("{err}");
            emit(TransportEvent::Errored(err.to_string()));
            emit(TransportEvent::Closed);
            return;
        }
    };

    info!("connected to manager at {url}");
    open.store(true, Ordering::SeqCst);
    emit(TransportEvent::Opened);

    let (mut ws_sink, mut ws_reader) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_reader.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        emit(TransportEvent::Frame(text.as_str().to_string()));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("manager closed the connection");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("ignoring binary frame");
                    }
                    Some(Ok(_)) => {} // Ping/Pong — handled by tungstenite
                    Some(Err(e)) => {
                        warn!("WebSocket error: {e}");
                        emit(TransportEvent::Errored(e.to_string()));
                        break;
                    }
                }
            }
            cmd = out_rx.recv() => {
                match cmd {
                    Some(Outgoing::Frame(text)) => {
                        if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                            warn!("WebSocket send failed: {e}");
                            emit(TransportEvent::Errored(e.to_string()));
                            break;
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        let _ = ws_sink.close().await;
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    emit(TransportEvent::Closed);
}
