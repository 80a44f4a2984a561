//! WebSocket transport built on tokio-tungstenite.
//!
//! The socket is split into a writer task fed by the outbound channel and a
//! reader task that forwards text frames to the inbound channel. Either side
//! finishing tears the socket down.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::{
    domain::{HubTransport, TransportChannel},
    error::ClientError,
};

use super::negotiate::{NegotiatedEndpoint, negotiate, parse_hub_url, to_websocket_url};

pub struct WebSocketTransport {
    http: reqwest::Client,
    skip_negotiation: bool,
}

impl WebSocketTransport {
    /// Create a transport.
    ///
    /// # Arguments
    ///
    /// * `skip_negotiation` - Connect straight to the hub URL without `POST /negotiate`
    pub fn new(skip_negotiation: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            skip_negotiation,
        }
    }

    async fn resolve_endpoint(&self, hub_url: &str) -> Result<NegotiatedEndpoint, ClientError> {
        if self.skip_negotiation {
            return Ok(NegotiatedEndpoint {
                url: parse_hub_url(hub_url)?,
                access_token: None,
            });
        }
        negotiate(&self.http, hub_url).await
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl HubTransport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<TransportChannel, ClientError> {
        let endpoint = self.resolve_endpoint(url).await?;
        let mut ws_url = to_websocket_url(endpoint.url)?;
        if let Some(token) = &endpoint.access_token {
            ws_url.query_pairs_mut().append_pair("access_token", token);
        }

        let (ws_stream, _response) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| ClientError::ConnectionEstablishment(e.to_string()))?;
        tracing::debug!("WebSocket opened to {}", ws_url);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::warn!("Failed to send frame: {}", e);
                    break;
                }
            }
            // Outbound sender dropped: the connection is done with this socket
            if let Err(e) = write.close().await {
                tracing::debug!("Failed to close WebSocket cleanly: {}", e);
            }
        });

        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        tracing::warn!(
                            "Ignoring {} bytes of binary data on a text protocol",
                            data.len()
                        );
                    }
                    Ok(Message::Close(frame)) => {
                        tracing::info!("Hub closed the WebSocket: {:?}", frame);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(TransportChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
