//! Minimal Discord gateway client.
//!
//! Holds one session open (identify, heartbeats) and exposes presence updates
//! through a [`GatewayHandle`]. A supervisor task reconnects with exponential
//! backoff whenever the session drops, re-identifying with the latest presence.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::tracker::Presence;

/// Gateway intent: guild message events.
pub const GUILD_MESSAGES: u64 = 1 << 9;
/// Gateway intent: message content in message events.
pub const MESSAGE_CONTENT: u64 = 1 << 15;

/// Activity type rendered as "Watching {name}".
const ACTIVITY_WATCHING: u8 = 3;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_PRESENCE_UPDATE: u8 = 3;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Close codes after which Discord says not to reconnect.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// Upper bound for Hello + Identify + Ready.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// How long a presence update may wait on the connection task.
const PRESENCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Base reconnect delay (doubles each failed attempt).
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection parameters. The token is never logged.
#[derive(Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub intents: u64,
}

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Presence object shared by Identify and Presence Update.
fn presence_data(text: &str) -> Value {
    json!({
        "since": null,
        "activities": [{ "name": text, "type": ACTIVITY_WATCHING }],
        "status": "online",
        "afk": false,
    })
}

pub fn presence_payload(text: &str) -> Value {
    json!({ "op": OP_PRESENCE_UPDATE, "d": presence_data(text) })
}

pub fn identify_payload(token: &str, intents: u64, presence: Option<&str>) -> Value {
    let mut d = json!({
        "token": token,
        "intents": intents,
        "properties": {
            "os": std::env::consts::OS,
            "browser": "ovi-tracker",
            "device": "ovi-tracker",
        },
    });
    if let Some(text) = presence {
        d["presence"] = presence_data(text);
    }
    json!({ "op": OP_IDENTIFY, "d": d })
}

fn heartbeat_payload(seq: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": seq })
}

fn close_error(frame: Option<CloseFrame>) -> GatewayError {
    match frame.map(|f| u16::from(f.code)) {
        Some(code) if FATAL_CLOSE_CODES.contains(&code) => GatewayError::Rejected(code),
        Some(code) => {
            debug!("Gateway closed the connection with code {code}");
            GatewayError::Disconnected
        }
        None => GatewayError::Disconnected,
    }
}

async fn send_json(
    write: &mut SplitSink<WsStream, Message>,
    payload: &Value,
) -> Result<(), GatewayError> {
    write.send(Message::Text(payload.to_string().into())).await?;
    Ok(())
}

/// Next JSON payload from the gateway, skipping ping/pong/binary frames.
async fn next_payload(read: &mut SplitStream<WsStream>) -> Result<GatewayPayload, GatewayError> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(text.as_str())?),
            Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(GatewayError::Disconnected),
        }
    }
}

/// One identified gateway connection.
struct Session {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    heartbeat_interval: Duration,
    seq: Option<u64>,
}

impl Session {
    async fn open(config: &GatewayConfig, presence: Option<&str>) -> Result<Self, GatewayError> {
        tokio::time::timeout(HANDSHAKE_TIMEOUT, Self::handshake(config, presence))
            .await
            .map_err(|_| GatewayError::Timeout(HANDSHAKE_TIMEOUT))?
    }

    async fn handshake(config: &GatewayConfig, presence: Option<&str>) -> Result<Self, GatewayError> {
        let (ws, _) = connect_async(config.url.as_str()).await?;
        let (mut write, mut read) = ws.split();

        let hello = next_payload(&mut read).await?;
        if hello.op != OP_HELLO {
            return Err(GatewayError::Protocol(format!(
                "expected Hello, got op {}",
                hello.op
            )));
        }
        let interval_ms = hello
            .d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .ok_or_else(|| GatewayError::Protocol("Hello without heartbeat_interval".into()))?;

        send_json(
            &mut write,
            &identify_payload(&config.token, config.intents, presence),
        )
        .await?;

        let mut seq = None;
        loop {
            let payload = next_payload(&mut read).await?;
            if payload.s.is_some() {
                seq = payload.s;
            }
            match payload.op {
                OP_DISPATCH if payload.t.as_deref() == Some("READY") => {
                    let user = payload
                        .d
                        .pointer("/user/username")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    info!("Gateway session ready as {user}");
                    break;
                }
                OP_INVALID_SESSION => {
                    return Err(GatewayError::Protocol(
                        "session invalidated during identify".into(),
                    ));
                }
                _ => continue,
            }
        }

        Ok(Self {
            write,
            read,
            heartbeat_interval: Duration::from_millis(interval_ms),
            seq,
        })
    }

    async fn close(mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "shutting down".to_string().into(),
        };
        if let Err(e) = self.write.send(Message::Close(Some(frame))).await {
            debug!("Failed to send close frame: {e}");
            return;
        }
        // Give the server a moment to echo the close.
        let _ = tokio::time::timeout(Duration::from_secs(2), self.read.next()).await;
    }
}

enum Command {
    Presence {
        text: String,
        reply: oneshot::Sender<Result<(), GatewayError>>,
    },
    Shutdown,
}

enum SessionEnd {
    Shutdown,
    Lost(GatewayError),
}

/// Cheap, cloneable handle for talking to the connection task.
#[derive(Clone)]
pub struct GatewayHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl Presence for GatewayHandle {
    async fn set_watching(&self, text: &str) -> Result<(), GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Presence {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| GatewayError::Closed)?;

        match tokio::time::timeout(PRESENCE_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::Closed),
            Err(_) => Err(GatewayError::Timeout(PRESENCE_TIMEOUT)),
        }
    }
}

/// A running gateway connection and its supervisor task.
pub struct Gateway {
    handle: GatewayHandle,
    task: JoinHandle<()>,
}

impl Gateway {
    /// Open the first session and start the supervisor.
    ///
    /// Failing to establish the first session is an error; later drops are
    /// retried in the background.
    pub async fn connect(config: GatewayConfig) -> Result<Self, GatewayError> {
        let session = Session::open(&config, None).await?;
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(supervise(config, session, rx));
        Ok(Self {
            handle: GatewayHandle { commands },
            task,
        })
    }

    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    /// Close the connection and wait for the supervisor to exit.
    pub async fn shutdown(self) {
        let _ = self.handle.commands.send(Command::Shutdown);
        match tokio::time::timeout(Duration::from_secs(5), self.task).await {
            Ok(Ok(())) => info!("Gateway connection closed"),
            Ok(Err(e)) => warn!("Gateway task failed: {e}"),
            Err(_) => warn!("Gateway did not close in time"),
        }
    }
}

async fn supervise(
    config: GatewayConfig,
    mut session: Session,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut presence: Option<String> = None;

    loop {
        match run_session(&mut session, &mut commands, &mut presence).await {
            SessionEnd::Shutdown => {
                session.close().await;
                return;
            }
            SessionEnd::Lost(e) => warn!("Gateway connection lost: {e}"),
        }
        drop(session);

        session = match reconnect(&config, &mut commands, &mut presence).await {
            Some(s) => s,
            None => return,
        };
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Open a new session, retrying with backoff. Commands keep being answered
/// while waiting and while the handshake is in flight. Returns `None` on
/// shutdown or when Discord refuses the connection.
async fn reconnect(
    config: &GatewayConfig,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    presence: &mut Option<String>,
) -> Option<Session> {
    let mut backoff = BASE_BACKOFF;
    loop {
        if !wait_backoff(backoff, commands, presence).await {
            return None;
        }
        info!("Reconnecting to gateway...");

        let identified = presence.clone();
        let result = {
            let open = Session::open(config, identified.as_deref());
            tokio::pin!(open);
            loop {
                tokio::select! {
                    result = &mut open => break result,
                    cmd = commands.recv() => {
                        if !defer_command(cmd, presence) {
                            return None;
                        }
                    }
                }
            }
        };

        let err = match result {
            Ok(mut session) => match presence.as_deref() {
                // Text that arrived after Identify went out.
                Some(text) if *presence != identified => {
                    match send_json(&mut session.write, &presence_payload(text)).await {
                        Ok(()) => return Some(session),
                        Err(e) => e,
                    }
                }
                _ => return Some(session),
            },
            Err(e) => e,
        };
        if !err.is_retryable() {
            error!("Gateway refused to reconnect: {err}");
            return None;
        }
        backoff = next_backoff(backoff);
        warn!("Reconnect failed: {err} (next attempt in {backoff:?})");
    }
}

/// Handle a command while no session is open: presence requests get
/// `Disconnected` and the latest text is kept for the next Identify.
/// Returns `false` on shutdown.
fn defer_command(cmd: Option<Command>, presence: &mut Option<String>) -> bool {
    match cmd {
        None | Some(Command::Shutdown) => false,
        Some(Command::Presence { text, reply }) => {
            *presence = Some(text);
            let _ = reply.send(Err(GatewayError::Disconnected));
            true
        }
    }
}

/// Sleep for `backoff` while answering commands. Returns `false` on shutdown.
async fn wait_backoff(
    backoff: Duration,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    presence: &mut Option<String>,
) -> bool {
    let sleep = tokio::time::sleep(backoff);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = commands.recv() => {
                if !defer_command(cmd, presence) {
                    return false;
                }
            }
        }
    }
}

async fn run_session(
    session: &mut Session,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    presence: &mut Option<String>,
) -> SessionEnd {
    let period = session.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    let mut awaiting_ack = false;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if awaiting_ack {
                    return SessionEnd::Lost(GatewayError::Protocol(
                        "heartbeat not acknowledged".into(),
                    ));
                }
                if let Err(e) = send_json(&mut session.write, &heartbeat_payload(session.seq)).await {
                    return SessionEnd::Lost(e);
                }
                awaiting_ack = true;
            }
            msg = session.read.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => return SessionEnd::Lost(close_error(frame)),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Lost(e.into()),
                    None => return SessionEnd::Lost(GatewayError::Disconnected),
                };
                let payload: GatewayPayload = match serde_json::from_str(text.as_str()) {
                    Ok(p) => p,
                    Err(e) => {
                        debug!("Ignoring undecodable gateway payload: {e}");
                        continue;
                    }
                };
                if payload.s.is_some() {
                    session.seq = payload.s;
                }
                match payload.op {
                    OP_HEARTBEAT => {
                        if let Err(e) = send_json(&mut session.write, &heartbeat_payload(session.seq)).await {
                            return SessionEnd::Lost(e);
                        }
                    }
                    OP_HEARTBEAT_ACK => awaiting_ack = false,
                    OP_RECONNECT => {
                        return SessionEnd::Lost(GatewayError::Protocol(
                            "server requested reconnect".into(),
                        ));
                    }
                    OP_INVALID_SESSION => {
                        return SessionEnd::Lost(GatewayError::Protocol(
                            "session invalidated".into(),
                        ));
                    }
                    OP_DISPATCH => debug!("Gateway event {}", payload.t.as_deref().unwrap_or("?")),
                    op => debug!("Ignoring gateway op {op}"),
                }
            }
            cmd = commands.recv() => match cmd {
                None | Some(Command::Shutdown) => return SessionEnd::Shutdown,
                Some(Command::Presence { text, reply }) => {
                    let result = send_json(&mut session.write, &presence_payload(&text)).await;
                    *presence = Some(text);
                    match result {
                        Ok(()) => {
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let _ = reply.send(Err(GatewayError::Disconnected));
                            return SessionEnd::Lost(e);
                        }
                    }
                }
            },
        }
    }
}
