//! The long-lived task behind each voice session.

use super::{
    connection,
    crypto::Cipher,
    playback::{self, PlaybackContext},
    ConnectionInfo,
    DriverEvent,
    VoiceControl,
};
use crate::{
    constants::{SPEAKING_LEAD_IN, UDP_KEEPALIVE_GAP},
    input::AudioSource,
    model::{
        payload::Command,
        voice::{self, VoicePayload},
        VoiceOpcode,
    },
    ws::{Result as WsResult, WsStream},
};
use discortp::discord::MutableKeepalivePacket;
use flume::{Receiver, Sender};
use rand::random;
use std::{
    net::UdpSocket,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    select,
    time::{sleep, sleep_until, Instant},
};
use tracing::{debug, error, info, instrument, trace, warn};

/// Handle to a live playback thread.
struct Playback {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
    finished: Receiver<()>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Playback {
    /// Raises the stop flag and waits the thread out; it observes the
    /// flag between frames, so this returns within one frame time.
    fn halt(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct Session {
    info: ConnectionInfo,
    rx: Receiver<VoiceControl>,
    events: Sender<DriverEvent>,
    ws: WsStream,
    udp: Arc<UdpSocket>,
    cipher: Cipher,
    ssrc: u32,
    heartbeat_interval: Duration,
    acked: bool,
    playback: Option<Playback>,
}

#[instrument(skip_all, fields(guild = %info.guild_id))]
pub(crate) async fn runner(
    info: ConnectionInfo,
    rx: Receiver<VoiceControl>,
    events: Sender<DriverEvent>,
) {
    trace!("Voice session task started.");

    let conn = match connection::connect(&info).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("Voice connection failed: {e}");
            return;
        },
    };

    let mut session = Session {
        info,
        rx,
        events,
        ws: conn.ws,
        udp: conn.udp,
        cipher: conn.cipher,
        ssrc: conn.ssrc,
        heartbeat_interval: conn.heartbeat_interval,
        acked: true,
        playback: None,
    };

    session.run().await;
    session.shutdown().await;

    trace!("Voice session task finished.");
}

impl Session {
    async fn run(&mut self) {
        let mut next_heartbeat = Instant::now();
        let mut next_keepalive = Instant::now() + UDP_KEEPALIVE_GAP;

        loop {
            let finished = self.playback.as_ref().map(|p| p.finished.clone());

            select! {
                () = sleep_until(next_heartbeat) => {
                    if !self.acked {
                        warn!("Voice heartbeat went unacknowledged; resuming session.");
                        if !self.resume().await {
                            break;
                        }
                        next_heartbeat = Instant::now() + self.heartbeat_interval;
                        continue;
                    }

                    if let Err(e) = self.send_heartbeat().await {
                        warn!("Voice heartbeat send failed: {e}; resuming session.");
                        if !self.resume().await {
                            break;
                        }
                    } else {
                        self.acked = false;
                    }
                    next_heartbeat = Instant::now() + self.heartbeat_interval;
                }
                () = sleep_until(next_keepalive) => {
                    self.send_keepalive();
                    next_keepalive += UDP_KEEPALIVE_GAP;
                }
                msg = self.ws.recv_json_no_timeout::<VoicePayload>() => match msg {
                    Ok(Some(payload)) => self.process(payload),
                    Ok(None) => {},
                    Err(e) => {
                        warn!("Voice websocket error: {e}; resuming session.");
                        if !self.resume().await {
                            break;
                        }
                        next_heartbeat = Instant::now() + self.heartbeat_interval;
                    },
                },
                () = wait_finished(&finished) => self.finish_playback().await,
                ctrl = self.rx.recv_async() => match ctrl {
                    Ok(VoiceControl::Speak(source)) => self.start_playback(source).await,
                    Ok(VoiceControl::Pause) => self.set_paused(true).await,
                    Ok(VoiceControl::Resume) => self.set_paused(false).await,
                    Ok(VoiceControl::Stop) => {
                        if let Some(mut playback) = self.playback.take() {
                            playback.halt();
                            self.announce_stop().await;
                        }
                    },
                    Ok(VoiceControl::Quit) | Err(_) => break,
                },
            }
        }
    }

    /// Replaces whatever is playing with a new source.
    async fn start_playback(&mut self, source: Box<dyn AudioSource>) {
        if let Some(mut playback) = self.playback.take() {
            playback.halt();
        }

        if let Err(e) = self.set_speaking(true).await {
            warn!("Speaking announcement failed: {e}");
        }
        sleep(SPEAKING_LEAD_IN).await;

        let stop = Arc::new(AtomicBool::new(false));
        let pause = Arc::new(AtomicBool::new(false));
        let (finished_tx, finished_rx) = flume::bounded(1);

        let ctx = PlaybackContext {
            source,
            udp: self.udp.clone(),
            cipher: self.cipher.clone(),
            ssrc: self.ssrc,
            stop: stop.clone(),
            pause: pause.clone(),
            finished: finished_tx,
        };

        let thread = std::thread::spawn(move || playback::runner(ctx));

        self.playback = Some(Playback {
            stop,
            pause,
            finished: finished_rx,
            thread: Some(thread),
        });
    }

    /// The pipeline ran itself out: join the thread and tell the world.
    async fn finish_playback(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.halt();
        }
        self.announce_stop().await;
    }

    async fn announce_stop(&mut self) {
        if let Err(e) = self.set_speaking(false).await {
            warn!("Speaking announcement failed: {e}");
        }
        let _ = self
            .events
            .send(DriverEvent::SpeakFinished(self.info.guild_id.clone()));
    }

    async fn set_paused(&mut self, paused: bool) {
        let Some(playback) = &self.playback else {
            return;
        };
        playback.pause.store(paused, Ordering::Release);

        if let Err(e) = self.set_speaking(true).await {
            warn!("Speaking announcement failed: {e}");
        }
    }

    async fn set_speaking(&mut self, speaking: bool) -> WsResult<()> {
        self.ws
            .send_json(&Command::voice(
                VoiceOpcode::Speaking,
                voice::Speaking::new(speaking, self.ssrc),
            ))
            .await
    }

    async fn send_heartbeat(&mut self) -> WsResult<()> {
        trace!("Sending voice heartbeat.");
        self.ws
            .send_json(&Command::voice(VoiceOpcode::Heartbeat, random::<u32>()))
            .await
    }

    fn send_keepalive(&self) {
        let mut bytes = [0u8; MutableKeepalivePacket::minimum_packet_size()];
        let mut ka = MutableKeepalivePacket::new(&mut bytes[..])
            .expect("FATAL: Insufficient bytes given to keepalive packet.");
        ka.set_ssrc(self.ssrc);

        trace!("Sending UDP keepalive.");
        if let Err(e) = self.udp.send(&bytes[..]) {
            warn!("UDP keepalive send failed: {e}");
        }
    }

    fn process(&mut self, payload: VoicePayload) {
        match VoiceOpcode::from_u8(payload.op) {
            Some(VoiceOpcode::HeartbeatAck) => {
                self.acked = true;
                trace!("Voice heartbeat acknowledged.");
            },
            Some(VoiceOpcode::Resumed) => {
                info!("Voice gateway session resumed.");
            },
            Some(VoiceOpcode::Speaking) => {
                trace!("Peer speaking update: {:?}", payload.d);
            },
            Some(other) => {
                trace!("Unhandled voice opcode {other:?}.");
            },
            None => {
                debug!("Unknown voice opcode {}: {:?}", payload.op, payload.d);
            },
        }
    }

    /// Tears the websocket down and brings it back with a RESUME; the key
    /// and UDP transport carry over. Returns false when the session is lost.
    async fn resume(&mut self) -> bool {
        let _ = self.ws.close().await;

        match connection::reconnect(&self.info).await {
            Ok((ws, heartbeat_interval)) => {
                self.ws = ws;
                self.heartbeat_interval = heartbeat_interval;
                self.acked = true;
                true
            },
            Err(e) => {
                error!("Voice resume failed: {e}");
                false
            },
        }
    }

    /// Teardown order matters: stop the pipeline before the transport it
    /// writes to, then the websocket under the heartbeat.
    async fn shutdown(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.halt();
        }
        let _ = self.set_speaking(false).await;
        let _ = self.ws.close().await;
    }
}

/// Resolves when the active playback signals completion; pends forever
/// when nothing is playing.
async fn wait_finished(finished: &Option<Receiver<()>>) {
    match finished {
        Some(rx) => {
            let _ = rx.recv_async().await;
        },
        None => std::future::pending().await,
    }
}
