//! WebSocket transport to the controller
//!
//! A background task owns the socket and reconnects at a fixed interval.
//! The bridge talks to it only through channels, so sending never blocks.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::*;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use wsfwd_node::Transport;

/// Connection events delivered to the bridge loop
#[derive(Debug)]
pub enum WsEvent {
    Connected,
    Disconnected,
    Text(String),
}

/// Sending half handed to the bridge
pub struct WsTransport {
    outbox: mpsc::UnboundedSender<String>,
}

impl WsTransport {
    /// Create the transport and the queue the connection task drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        (Self { outbox }, rx)
    }
}

impl Transport for WsTransport {
    type Error = mpsc::error::SendError<String>;

    fn send_text(&mut self, text: &str) -> Result<(), Self::Error> {
        self.outbox.send(text.to_string())
    }
}

/// Start the connection task for `url`
pub fn spawn(
    url: String,
    reconnect_interval: Duration,
    outbox: mpsc::UnboundedReceiver<String>,
) -> mpsc::UnboundedReceiver<WsEvent> {
    let (events, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(url, reconnect_interval, outbox, events));
    rx
}

async fn run(
    url: String,
    reconnect_interval: Duration,
    mut outbox: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<WsEvent>,
) {
    loop {
        // Anything queued while offline was meant for a dead session
        let mut stale = 0;
        while outbox.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("Discarded {stale} queued message(s)");
        }

        info!("Connecting to {url}");
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                if events.send(WsEvent::Connected).is_err() {
                    return;
                }
                if let Err(e) = session(stream, &mut outbox, &events).await {
                    warn!("WebSocket error: {e}");
                }
                if events.send(WsEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => warn!("Connection to {url} failed: {e}"),
        }

        tokio::time::sleep(reconnect_interval).await;
    }
}

async fn session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbox: &mut mpsc::UnboundedReceiver<String>,
    events: &mpsc::UnboundedSender<WsEvent>,
) -> Result<(), tungstenite::Error> {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            Some(text) = outbox.recv() => {
                sink.send(Message::Text(text)).await?;
            }
            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if events.send(WsEvent::Text(text)).is_err() {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                // pings are answered by tungstenite, binary frames are not part of the protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
            },
        }
    }
}
