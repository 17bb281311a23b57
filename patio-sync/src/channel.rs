//! Push event channel
//!
//! Maintains exactly one SSE subscription per authenticated identity against
//! the API host, delivering `resultado-placa` and
//! `resultado-novo-estacionamento` events in transport order. The connection
//! reconnects with backoff after a drop, but no replay is attempted: events
//! emitted while disconnected are permanently lost to this client and only
//! reconciled by the next full snapshot.

use std::time::Duration;

use futures::StreamExt;
use patio_common::config::BackendConfig;
use patio_common::events::PushEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const EVENTS_PATH: &str = "/events";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// One complete SSE frame: event name plus joined data lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental parser for the SSE wire format
///
/// Feeds on arbitrary byte-chunk boundaries; a frame is dispatched at each
/// blank line. Comment lines (heartbeats) are dropped, `event:` names the
/// frame, consecutive `data:` lines are joined with newlines.
#[derive(Default)]
pub(crate) struct SseParser {
    pending_line: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Consume a chunk of the response body, returning any frames it
    /// completed
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for ch in chunk.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.pending_line);
                if let Some(frame) = self.push_line(line.trim_end_matches('\r')) {
                    frames.push(frame);
                }
            } else {
                self.pending_line.push(ch);
            }
        }
        frames
    }

    fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            // blank line dispatches the accumulated frame
            let data = std::mem::take(&mut self.data);
            let event = self.event.take();
            if data.is_empty() {
                return None;
            }
            return Some(SseFrame {
                event: event.unwrap_or_else(|| "message".to_string()),
                data: data.join("\n"),
            });
        }
        if line.starts_with(':') {
            return None; // comment / heartbeat
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {} // id/retry not used by this client
        }
        None
    }
}

/// The persistent push subscription for one authenticated identity
///
/// Dropping the channel (view teardown / sign-out) closes the subscription.
pub struct EventChannel {
    events_tx: broadcast::Sender<PushEvent>,
    task: JoinHandle<()>,
}

impl EventChannel {
    /// Open the subscription and start the background receive loop
    pub fn connect(config: &BackendConfig) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        let connection_id = Uuid::new_v4();
        let task = tokio::spawn(run_subscription(
            config.clone(),
            connection_id,
            events_tx.clone(),
        ));
        Self { events_tx, task }
    }

    /// Subscribe to decoded push events
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events_tx.subscribe()
    }

    /// Tear down the subscription
    pub fn close(&self) {
        self.task.abort();
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_subscription(
    config: BackendConfig,
    connection_id: Uuid,
    events_tx: broadcast::Sender<PushEvent>,
) {
    let url = format!("{}{}", config.base_url, EVENTS_PATH);
    let http = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not build push-channel client");
            return;
        }
    };

    let mut backoff = INITIAL_BACKOFF;
    let mut first_attempt = true;

    loop {
        if !first_attempt {
            // No replay on reconnect: whatever was emitted during the gap
            // is lost until the next full snapshot.
            warn!(
                connection_id = %connection_id,
                "push subscription reconnecting; events during the gap are lost"
            );
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
        first_attempt = false;

        let response = match http
            .get(&url)
            .bearer_auth(&config.token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "push subscription connect failed");
                continue;
            }
        };

        if response.status().as_u16() == 403 {
            // Fatal at session scope; the session is over, stop retrying.
            error!(connection_id = %connection_id, "push subscription rejected (403), closing channel");
            return;
        }
        if !response.status().is_success() {
            warn!(
                connection_id = %connection_id,
                status = %response.status(),
                "push subscription refused"
            );
            continue;
        }

        info!(connection_id = %connection_id, url = %url, "push subscription established");
        backoff = INITIAL_BACKOFF;

        let mut stream = response.bytes_stream();
        let mut parser = SseParser::default();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "push stream error");
                    break;
                }
            };

            for frame in parser.push_chunk(&String::from_utf8_lossy(&bytes)) {
                match PushEvent::decode(&frame.event, &frame.data) {
                    Ok(Some(event)) => {
                        debug!(connection_id = %connection_id, event = event.event_name(), "push event");
                        // send error just means no subscriber right now
                        let _ = events_tx.send(event);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "undecodable push event dropped");
                    }
                }
            }
        }
    }
}
