use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::adapters::pump_portal::router::{EventRouter, RoutedMessage};
use crate::adapters::pump_portal::types::SubscribeMessage;
use crate::domain::events::{ConnectionStatus, NewTokenEvent, TradeUpdateEvent};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no traffic within the heartbeat window")]
    HeartbeatTimeout,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub ws_url: String,
    pub base_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// 0 means retry forever.
    pub max_reconnect_attempts: u32,
    /// Idle time after which a ping is sent.
    pub idle_timeout: Duration,
    /// Time after an unanswered ping before the socket is force-closed.
    pub ping_timeout: Duration,
    pub channel_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://pumpportal.fun/api/data".to_string(),
            base_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            max_reconnect_attempts: 10,
            idle_timeout: Duration::from_secs(60),
            ping_timeout: Duration::from_secs(15),
            channel_buffer_size: 1000,
        }
    }
}

/// Events surfaced to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    NewToken(NewTokenEvent),
    TradeUpdate(TradeUpdateEvent),
    Status {
        status: ConnectionStatus,
        reconnect_count: u32,
    },
}

#[derive(Debug)]
enum StreamCommand {
    SubscribeToken(String),
    UnsubscribeToken(String),
    Stop,
}

/// What must be replayed after a reconnect. Token set is ordered so the
/// replay batch is deterministic.
#[derive(Debug, Default)]
struct SubscriptionState {
    new_tokens: bool,
    token_trades: BTreeSet<String>,
}

/// Handle to the resilient feed connection. The connection itself lives
/// in a spawned task; this handle only carries the command channel and a
/// shared status snapshot.
#[derive(Clone)]
pub struct StreamConnection {
    command_tx: mpsc::Sender<StreamCommand>,
    status: Arc<RwLock<ConnectionStatus>>,
}

impl StreamConnection {
    /// Connect and start streaming. The returned receiver yields domain
    /// events and status changes until the task ends.
    pub fn start(config: StreamConfig) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);
        let status = Arc::new(RwLock::new(ConnectionStatus::Disconnected));

        let task_status = Arc::clone(&status);
        tokio::spawn(async move {
            run_loop(config, command_rx, event_tx, task_status).await;
        });

        (Self { command_tx, status }, event_rx)
    }

    pub async fn status(&self) -> ConnectionStatus {
        *self.status.read().await
    }

    pub async fn subscribe_token(&self, mint: &str) {
        let _ = self
            .command_tx
            .send(StreamCommand::SubscribeToken(mint.to_string()))
            .await;
    }

    pub async fn unsubscribe_token(&self, mint: &str) {
        let _ = self
            .command_tx
            .send(StreamCommand::UnsubscribeToken(mint.to_string()))
            .await;
    }

    pub async fn stop(&self) {
        let _ = self.command_tx.send(StreamCommand::Stop).await;
    }
}

async fn run_loop(
    config: StreamConfig,
    mut command_rx: mpsc::Receiver<StreamCommand>,
    event_tx: mpsc::Sender<StreamEvent>,
    status: Arc<RwLock<ConnectionStatus>>,
) {
    let mut state = SubscriptionState {
        new_tokens: true,
        ..SubscriptionState::default()
    };
    let mut router = EventRouter::new();
    let mut attempts: u32 = 0;
    let mut delay = config.base_reconnect_delay;

    loop {
        transition(&status, &event_tx, ConnectionStatus::Connecting, attempts).await;

        let outcome = connect_and_run(
            &config,
            &mut state,
            &mut command_rx,
            &event_tx,
            &mut router,
            &status,
            &mut attempts,
            &mut delay,
        )
        .await;

        match outcome {
            Ok(true) => {
                info!("feed stopped on request");
                transition(&status, &event_tx, ConnectionStatus::Disconnected, attempts).await;
                return;
            }
            Ok(false) => warn!("feed connection closed by server"),
            Err(e) => warn!(error = %e, "feed connection dropped"),
        }

        attempts += 1;
        if config.max_reconnect_attempts > 0 && attempts > config.max_reconnect_attempts {
            transition(&status, &event_tx, ConnectionStatus::Failed, attempts).await;
            return;
        }
        transition(&status, &event_tx, ConnectionStatus::Reconnecting, attempts).await;

        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=500));
        debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "backing off");
        tokio::select! {
            _ = tokio::time::sleep(delay + jitter) => {}
            cmd = command_rx.recv() => {
                match cmd {
                    Some(StreamCommand::Stop) | None => {
                        transition(&status, &event_tx, ConnectionStatus::Disconnected, attempts).await;
                        return;
                    }
                    Some(StreamCommand::SubscribeToken(mint)) => {
                        state.token_trades.insert(mint);
                    }
                    Some(StreamCommand::UnsubscribeToken(mint)) => {
                        state.token_trades.remove(&mint);
                    }
                }
            }
        }
        delay = (delay * 2).min(config.max_reconnect_delay);
    }
}

/// One connection lifetime. Returns Ok(true) when a stop was requested,
/// Ok(false) when the server ended the stream cleanly.
#[allow(clippy::too_many_arguments)]
async fn connect_and_run(
    config: &StreamConfig,
    state: &mut SubscriptionState,
    command_rx: &mut mpsc::Receiver<StreamCommand>,
    event_tx: &mpsc::Sender<StreamEvent>,
    router: &mut EventRouter,
    status: &Arc<RwLock<ConnectionStatus>>,
    attempts: &mut u32,
    delay: &mut Duration,
) -> Result<bool, StreamError> {
    let (ws, _) = connect_async(&config.ws_url)
        .await
        .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;
    let (mut write, mut read) = ws.split();

    replay_subscriptions(&mut write, state).await?;
    transition(status, event_tx, ConnectionStatus::Connected, *attempts).await;

    let mut last_inbound = Instant::now();
    let mut ping_sent_at: Option<Instant> = None;

    loop {
        let heartbeat_deadline = match ping_sent_at {
            Some(sent) => sent + config.ping_timeout,
            None => last_inbound + config.idle_timeout,
        };

        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(StreamCommand::Stop) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(true);
                    }
                    Some(StreamCommand::SubscribeToken(mint)) => {
                        if state.token_trades.insert(mint.clone()) {
                            send_json(&mut write, &SubscribeMessage::token_trades(vec![mint])).await?;
                        }
                    }
                    Some(StreamCommand::UnsubscribeToken(mint)) => {
                        if state.token_trades.remove(&mint) {
                            send_json(
                                &mut write,
                                &SubscribeMessage::unsubscribe_token_trades(vec![mint]),
                            )
                            .await?;
                        }
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_inbound = Instant::now();
                        ping_sent_at = None;
                        handle_text(&text, state, &mut write, event_tx, router, config, attempts, delay)
                            .await?;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_inbound = Instant::now();
                        write.send(Message::Pong(payload)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_inbound = Instant::now();
                        ping_sent_at = None;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(false),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
            _ = tokio::time::sleep_until(heartbeat_deadline) => {
                if ping_sent_at.is_some() {
                    warn!("ping unanswered, forcing reconnect");
                    let _ = write.send(Message::Close(None)).await;
                    return Err(StreamError::HeartbeatTimeout);
                }
                debug!("feed idle, sending ping");
                write.send(Message::Ping(Vec::new())).await?;
                ping_sent_at = Some(Instant::now());
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_text(
    text: &str,
    state: &mut SubscriptionState,
    write: &mut WsSink,
    event_tx: &mpsc::Sender<StreamEvent>,
    router: &mut EventRouter,
    config: &StreamConfig,
    attempts: &mut u32,
    delay: &mut Duration,
) -> Result<(), StreamError> {
    match router.classify(text) {
        RoutedMessage::NewToken(event) => {
            // A processed message proves the link is healthy.
            *attempts = 0;
            *delay = config.base_reconnect_delay;
            // Auto-subscribe to the new token's trades before dispatch.
            if state.token_trades.insert(event.mint.clone()) {
                send_json(
                    write,
                    &SubscribeMessage::token_trades(vec![event.mint.clone()]),
                )
                .await?;
            }
            let _ = event_tx.send(StreamEvent::NewToken(event)).await;
        }
        RoutedMessage::TradeUpdate(event) => {
            *attempts = 0;
            *delay = config.base_reconnect_delay;
            let _ = event_tx.send(StreamEvent::TradeUpdate(event)).await;
        }
        RoutedMessage::SubscriptionAck(message) => {
            // Acks count as processed traffic too.
            *attempts = 0;
            *delay = config.base_reconnect_delay;
            debug!(message, "subscription acknowledged");
        }
        RoutedMessage::Unknown => {}
    }
    Ok(())
}

/// Replay the persistent subscription state on a fresh socket: the
/// new-token topic first, then one batch for all tracked tokens.
async fn replay_subscriptions(
    write: &mut WsSink,
    state: &SubscriptionState,
) -> Result<(), StreamError> {
    if state.new_tokens {
        send_json(write, &SubscribeMessage::new_tokens()).await?;
    }
    if !state.token_trades.is_empty() {
        let mints: Vec<String> = state.token_trades.iter().cloned().collect();
        send_json(write, &SubscribeMessage::token_trades(mints)).await?;
    }
    Ok(())
}

async fn send_json(write: &mut WsSink, msg: &SubscribeMessage) -> Result<(), StreamError> {
    let text = serde_json::to_string(msg)?;
    write.send(Message::Text(text)).await?;
    Ok(())
}

async fn transition(
    status: &Arc<RwLock<ConnectionStatus>>,
    event_tx: &mpsc::Sender<StreamEvent>,
    new_status: ConnectionStatus,
    reconnect_count: u32,
) {
    let mut guard = status.write().await;
    if *guard == new_status {
        return;
    }
    info!(from = %*guard, to = %new_status, "feed status change");
    *guard = new_status;
    drop(guard);
    let _ = event_tx
        .send(StreamEvent::Status {
            status: new_status,
            reconnect_count,
        })
        .await;
}
