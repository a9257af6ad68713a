use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tq_logging::{tq_debug, tq_trace};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {message}")]
    Connect { url: String, message: String },
    #[error("transport error: {0}")]
    Io(String),
}

/// What the reader side of an open link reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame.
    Payload(String),
    /// The peer closed the channel. No further events follow.
    Closed { reason: Option<String> },
    /// Read or write failure. No further events follow.
    Error(String),
}

/// An open bidirectional text channel.
///
/// Dropping `outbound` closes the channel from the client side.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens one link. Resolves once the channel is usable.
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError> {
        let (stream, _) =
            connect_async(url.as_str())
                .await
                .map_err(|err| TransportError::Connect {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
        tq_debug!("Websocket open to {}", url);

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let writer_events = inbound_tx.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                tq_trace!("-> {}", frame);
                if let Err(err) = sink.send(Message::Text(frame)).await {
                    let _ = writer_events.send(TransportEvent::Error(err.to_string()));
                    return;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let last = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        tq_trace!("<- {}", text);
                        if inbound_tx.send(TransportEvent::Payload(text)).is_err() {
                            break None;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if inbound_tx.send(TransportEvent::Payload(text)).is_err() {
                                break None;
                            }
                        }
                        Err(_) => tq_debug!("Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|frame| frame.reason.to_string())
                            .filter(|reason| !reason.is_empty());
                        break Some(TransportEvent::Closed { reason });
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break Some(TransportEvent::Error(err.to_string())),
                    None => break Some(TransportEvent::Closed { reason: None }),
                }
            };
            if let Some(event) = last {
                let _ = inbound_tx.send(event);
            }
            writer.abort();
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
