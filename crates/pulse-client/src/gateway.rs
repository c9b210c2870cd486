use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use pulse_types::events::{GatewayCommand, GatewayEvent};

use crate::client::{PulseClient, Result};
use crate::error::ClientError;

/// Events buffered between the socket and a slow consumer.
const FEED_BUFFER: usize = 256;

/// `http(s)://host` -> `ws(s)://host/gateway`
pub fn gateway_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/gateway", ws)
}

impl PulseClient {
    /// Open the live feed. Resolves once the server has sent Ready; after
    /// that every event arrives on the returned channel until the socket
    /// closes or the receiver is dropped.
    pub async fn subscribe(&self) -> Result<(mpsc::Receiver<GatewayEvent>, JoinHandle<()>)> {
        let token = self.token().ok_or(ClientError::NotSignedIn)?.to_string();
        let url = gateway_url(self.base_url());

        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(Box::new)?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let identify = serde_json::to_string(&GatewayCommand::Identify { token })?;
        ws_tx.send(Message::Text(identify.into())).await.map_err(Box::new)?;

        // Wait for Ready
        loop {
            match ws_rx.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(GatewayEvent::Ready { username, .. }) = serde_json::from_str(&text) {
                        info!("Gateway ready for {}", username);
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Err(ClientError::GatewayRejected),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Box::new(e).into()),
            }
        }

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let task = tokio::spawn(async move {
            // Keep the write half alive; tungstenite answers pings through it.
            let _ws_tx = ws_tx;
            while let Some(msg) = ws_rx.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Gateway read failed: {}", e);
                        break;
                    }
                };
                match serde_json::from_str::<GatewayEvent>(&text) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Undecodable gateway event: {}", e),
                }
            }
            debug!("Gateway feed closed");
        });

        Ok((rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url_swaps_scheme() {
        assert_eq!(gateway_url("http://localhost:3000"), "ws://localhost:3000/gateway");
        assert_eq!(gateway_url("https://pulse.example.com/"), "wss://pulse.example.com/gateway");
    }
}
