//! The main gateway session.
//!
//! One task drives the websocket: it heartbeats, applies DISPATCH events
//! to the cache in arrival order, and owns the lifecycle of per-guild
//! voice sessions. Handler callbacks are awaited on this task, so they
//! observe the cache at or after the event that fired them.

use crate::{
    cache::Cache,
    constants::{GATEWAY_VERSION, RECONNECT_DELAY},
    driver::{ConnectionInfo, DriverEvent, VoiceSession},
    error::{Error, Result},
    events::EventHandler,
    id::UserId,
    model::{
        entity::{GuildData, GuildDeleteData, MessageData, VoiceServerUpdateData, VoiceStateData},
        payload::{self, Command, GatewayPayload},
        GatewayOpcode,
    },
    ws::WsStream,
};
use flume::{Receiver, Sender};
use serde_json::Value;
use std::sync::Arc;
use tokio::{
    select,
    time::{sleep, sleep_until, Duration, Instant},
};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

/// Commands accepted by the gateway task.
pub(crate) enum ShardControl {
    /// A pre-built payload to forward to Discord verbatim.
    Command(Value),
    /// Orderly shutdown.
    Quit,
}

/// Why one websocket's loop ended.
enum Flow {
    /// Transport trouble or a heartbeat miss: flush and reconnect.
    Reconnect,
    /// The client is done for good.
    Quit,
}

pub(crate) struct Shard {
    token: String,
    gateway_url: String,
    cache: Arc<Cache>,
    handler: Arc<dyn EventHandler>,
    rx: Receiver<ShardControl>,
    driver_tx: Sender<DriverEvent>,
    driver_rx: Receiver<DriverEvent>,
    session_id: Option<String>,
    last_seq: Option<u64>,
    bot_user_id: Option<UserId>,
}

impl Shard {
    pub(crate) fn new(
        token: String,
        gateway_url: String,
        cache: Arc<Cache>,
        handler: Arc<dyn EventHandler>,
        rx: Receiver<ShardControl>,
    ) -> Self {
        let (driver_tx, driver_rx) = flume::unbounded();

        Self {
            token,
            gateway_url,
            cache,
            handler,
            rx,
            driver_tx,
            driver_rx,
            session_id: None,
            last_seq: None,
            bot_user_id: None,
        }
    }

    /// Runs until quit, reconnecting across transport failures.
    #[instrument(skip(self))]
    pub(crate) async fn run(&mut self) -> Result<()> {
        let url = Url::parse(&format!(
            "{}/?v={GATEWAY_VERSION}&encoding=json",
            self.gateway_url
        ))
        .map_err(|_| Error::GatewayUrl)?;

        loop {
            let mut ws = match WsStream::connect(url.clone()).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("Gateway connection failed: {e}; retrying.");
                    sleep(RECONNECT_DELAY).await;
                    continue;
                },
            };

            match self.session(&mut ws).await {
                Flow::Reconnect => {
                    self.disconnected(&mut ws).await;
                },
                Flow::Quit => {
                    self.quit(&mut ws).await;
                    return Ok(());
                },
            }
        }
    }

    /// Drives one websocket connection to completion.
    async fn session(&mut self, ws: &mut WsStream) -> Flow {
        // HELLO always leads, carrying the heartbeat interval.
        let hello = loop {
            match ws.recv_json::<GatewayPayload>().await {
                Ok(Some(payload))
                    if GatewayOpcode::from_u8(payload.op) == Some(GatewayOpcode::Hello) =>
                {
                    match serde_json::from_value::<payload::Hello>(payload.d) {
                        Ok(hello) => break hello,
                        Err(e) => {
                            warn!("Malformed HELLO: {e}");
                            return Flow::Reconnect;
                        },
                    }
                },
                Ok(_) => continue,
                Err(e) => {
                    warn!("Gateway error awaiting HELLO: {e}");
                    return Flow::Reconnect;
                },
            }
        };

        let heartbeat_interval = Duration::from_millis(hello.heartbeat_interval);
        info!("Gateway heartbeat interval {}ms.", hello.heartbeat_interval);

        let sent = match &self.session_id {
            Some(session_id) => {
                ws.send_json(&Command::gateway(
                    GatewayOpcode::Resume,
                    payload::Resume {
                        token: self.token.clone(),
                        session_id: session_id.clone(),
                        seq: self.last_seq,
                    },
                ))
                .await
            },
            None => {
                ws.send_json(&Command::gateway(
                    GatewayOpcode::Identify,
                    payload::Identify::new(&self.token),
                ))
                .await
            },
        };
        if let Err(e) = sent {
            warn!("Gateway identify/resume failed: {e}");
            return Flow::Reconnect;
        }

        let mut acked = true;
        let mut next_heartbeat = Instant::now();

        loop {
            select! {
                () = sleep_until(next_heartbeat) => {
                    if !acked {
                        warn!("Gateway heartbeat went unacknowledged; reconnecting.");
                        return Flow::Reconnect;
                    }

                    trace!("Sending gateway heartbeat at seq {:?}.", self.last_seq);
                    let beat = Command::gateway(GatewayOpcode::Heartbeat, self.last_seq);
                    if let Err(e) = ws.send_json(&beat).await {
                        warn!("Gateway heartbeat send failed: {e}");
                        return Flow::Reconnect;
                    }

                    acked = false;
                    next_heartbeat += heartbeat_interval;
                }
                msg = ws.recv_json_no_timeout::<GatewayPayload>() => match msg {
                    Ok(Some(payload)) => {
                        if let Some(flow) = self.process(payload, ws, &mut acked).await {
                            return flow;
                        }
                    },
                    Ok(None) => {},
                    Err(e) => {
                        warn!("Gateway websocket error: {e}");
                        return Flow::Reconnect;
                    },
                },
                evt = self.driver_rx.recv_async() => {
                    if let Ok(DriverEvent::SpeakFinished(guild_id)) = evt {
                        if let Some(guild) = self.cache.guild(&guild_id) {
                            self.handler.end_speaking(guild).await;
                        }
                    }
                },
                ctrl = self.rx.recv_async() => match ctrl {
                    Ok(ShardControl::Command(value)) => {
                        if let Err(e) = ws.send_json(&value).await {
                            warn!("Gateway command send failed: {e}");
                            return Flow::Reconnect;
                        }
                    },
                    Ok(ShardControl::Quit) | Err(_) => return Flow::Quit,
                },
            }
        }
    }

    async fn process(
        &mut self,
        payload: GatewayPayload,
        ws: &mut WsStream,
        acked: &mut bool,
    ) -> Option<Flow> {
        match GatewayOpcode::from_u8(payload.op) {
            Some(GatewayOpcode::Dispatch) => {
                if let Some(s) = payload.s {
                    self.last_seq = Some(s);
                }
                let name = payload.t.unwrap_or_default();
                self.dispatch(&name, payload.d).await;
                None
            },
            Some(GatewayOpcode::HeartbeatAck) => {
                trace!("Gateway heartbeat acknowledged.");
                *acked = true;
                None
            },
            Some(GatewayOpcode::InvalidSession) => self.invalid_session(&payload.d, ws).await,
            Some(GatewayOpcode::Reconnect) => {
                info!("Gateway requested a reconnect.");
                Some(Flow::Reconnect)
            },
            Some(other) => {
                trace!("Unhandled gateway opcode {other:?}.");
                None
            },
            None => {
                debug!("Unknown gateway opcode {}: {:?}", payload.op, payload.d);
                None
            },
        }
    }

    /// Applies one DISPATCH event to the cache and fires the matching
    /// callback. Malformed payloads are logged and skipped; the
    /// connection stays up.
    async fn dispatch(&mut self, name: &str, d: Value) {
        match name {
            "READY" => match serde_json::from_value::<payload::Ready>(d) {
                Ok(ready) => {
                    self.session_id = Some(ready.session_id);
                    let user = self.cache.upsert_user(&ready.user);
                    info!("Connected to Discord as {}.", user.username());
                    self.bot_user_id = Some(user.id.clone());
                    self.handler.ready().await;
                },
                Err(e) => warn!("Malformed READY: {e}"),
            },
            "GUILD_CREATE" => match serde_json::from_value::<GuildData>(d) {
                Ok(data) => {
                    let guild = self.cache.insert_guild(data);
                    debug!("Cached guild {} ({}).", guild.name(), guild.id);
                },
                Err(e) => warn!("Malformed GUILD_CREATE: {e}"),
            },
            "GUILD_DELETE" => match serde_json::from_value::<GuildDeleteData>(d) {
                Ok(data) => {
                    if let Some((_, session)) = self.cache.voice_sessions.remove(&data.id) {
                        session.quit();
                    }
                    self.cache.remove_guild(&data.id);
                    info!("Dropped guild {}.", data.id);
                },
                Err(e) => warn!("Malformed GUILD_DELETE: {e}"),
            },
            "VOICE_STATE_UPDATE" => match serde_json::from_value::<VoiceStateData>(d) {
                Ok(data) => {
                    if let Some(event) = self.cache.apply_voice_state(data, None) {
                        let own_state = self.bot_user_id.as_ref() == Some(&event.state.user.id);

                        if own_state && event.state.channel.is_none() {
                            if let Some((_, session)) =
                                self.cache.voice_sessions.remove(&event.guild.id)
                            {
                                session.quit();
                                info!("Left voice in guild {}.", event.guild.id);
                            }
                        }

                        if let Some(member) = event.member {
                            self.handler.voice_state_update(member).await;
                        }
                    }
                },
                Err(e) => warn!("Malformed VOICE_STATE_UPDATE: {e}"),
            },
            "VOICE_SERVER_UPDATE" => self.voice_server_update(d),
            "MESSAGE_CREATE" => match serde_json::from_value::<MessageData>(d) {
                Ok(data) => {
                    if let Some(message) = self.cache.build_message(data) {
                        self.handler.message(message).await;
                    }
                },
                Err(e) => warn!("Malformed MESSAGE_CREATE: {e}"),
            },
            "RESUMED" => {
                info!("Gateway session resumed.");
                self.handler.resume().await;
            },
            _ => trace!("Unhandled event {name}."),
        }
    }

    /// Builds a fresh voice session from the assigned server, replacing
    /// any prior session for that guild, and attaches a queued source.
    fn voice_server_update(&mut self, d: Value) {
        let data: VoiceServerUpdateData = match serde_json::from_value(d) {
            Ok(data) => data,
            Err(e) => {
                warn!("Malformed VOICE_SERVER_UPDATE: {e}");
                return;
            },
        };

        let Some(endpoint) = data.endpoint else {
            debug!("Voice server for guild {} not yet allocated.", data.guild_id);
            return;
        };
        let Some(guild) = self.cache.guild(&data.guild_id) else {
            debug!("Voice server update for unknown guild {}.", data.guild_id);
            return;
        };
        let Some(user_id) = self.bot_user_id.clone() else {
            return;
        };
        let Some(member) = guild.member(&user_id) else {
            debug!("Bot is not a cached member of guild {}.", guild.id);
            return;
        };
        let Some(state) = member.voice_state() else {
            debug!("No bot voice state in guild {}; ignoring server update.", guild.id);
            return;
        };

        if let Some((_, old)) = self.cache.voice_sessions.remove(&guild.id) {
            old.quit();
        }

        let session = VoiceSession::spawn(
            ConnectionInfo {
                endpoint,
                guild_id: data.guild_id,
                session_id: state.session_id.clone(),
                token: data.token,
                user_id,
            },
            self.driver_tx.clone(),
        );

        if let Some((_, source)) = self.cache.pending_sources.remove(&guild.id) {
            session.start_speaking(source);
        }

        self.cache.voice_sessions.insert(guild.id.clone(), session);
    }

    async fn invalid_session(&mut self, d: &Value, ws: &mut WsStream) -> Option<Flow> {
        info!("Gateway invalidated the session.");

        if d.as_bool() == Some(true) {
            if let Some(session_id) = self.session_id.clone() {
                let resume = Command::gateway(
                    GatewayOpcode::Resume,
                    payload::Resume {
                        token: self.token.clone(),
                        session_id,
                        seq: self.last_seq,
                    },
                );
                if let Err(e) = ws.send_json(&resume).await {
                    warn!("Resume send failed: {e}");
                    return Some(Flow::Reconnect);
                }
                return None;
            }
            return Some(Flow::Reconnect);
        }

        self.session_id = None;
        Some(Flow::Quit)
    }

    /// A heartbeat miss or transport failure: close, flush everything,
    /// tell the handler, and pause briefly before the next dial.
    async fn disconnected(&mut self, ws: &mut WsStream) {
        let _ = ws.close().await;
        self.stop_voice_sessions();
        self.cache.flush();
        self.handler.disconnect().await;
        sleep(RECONNECT_DELAY).await;
    }

    async fn quit(&mut self, ws: &mut WsStream) {
        self.stop_voice_sessions();
        let _ = ws.close().await;
        self.handler.disconnect().await;
        self.handler.quit().await;
        info!("Gateway session closed.");
    }

    fn stop_voice_sessions(&self) {
        for entry in self.cache.voice_sessions.iter() {
            entry.value().quit();
        }
        self.cache.voice_sessions.clear();
    }
}
