//! The audio send pipeline.
//!
//! Runs on a dedicated thread while a source is attached: pull PCM,
//! encode, stamp the RTP header, encrypt, send, pace. The thread is
//! compute-bound and must not miss 20 ms deadlines, hence no async here.

use super::{
    crypto::{self, Cipher, TAG_SIZE},
    error::{Error, Result},
};
use crate::{
    constants::*,
    input::AudioSource,
};
use audiopus::{coder::Encoder as OpusEncoder, Application as CodingMode, Channels};
use discortp::rtp::{MutableRtpPacket, RtpPacket};
use flume::Sender;
use std::{
    io,
    net::UdpSocket,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, error, trace};

pub(crate) struct PlaybackContext {
    pub source: Box<dyn AudioSource>,
    pub udp: Arc<UdpSocket>,
    pub cipher: Cipher,
    pub ssrc: u32,
    pub stop: Arc<AtomicBool>,
    pub pause: Arc<AtomicBool>,
    /// Fired once the pipeline winds down, however it got there.
    pub finished: Sender<()>,
}

pub(crate) fn runner(mut ctx: PlaybackContext) {
    trace!("Playback thread started.");

    if let Err(e) = stream(&mut ctx) {
        error!("Playback halted: {e}");
    }

    let _ = ctx.finished.send(());
    trace!("Playback thread finished.");
}

fn stream(ctx: &mut PlaybackContext) -> Result<()> {
    let encoder = OpusEncoder::new(SAMPLE_RATE, Channels::Stereo, CodingMode::Voip)?;

    let mut packet = [0u8; VOICE_PACKET_MAX];
    prepare_packet(&mut packet, ctx.ssrc);

    let mut pcm = [0i16; STEREO_FRAME_SIZE];
    let mut deadline = Instant::now();

    loop {
        if ctx.stop.load(Ordering::Acquire) {
            break;
        }

        if ctx.pause.load(Ordering::Acquire) {
            thread::sleep(PAUSE_POLL);
            continue;
        }

        let sample_count = ctx.source.read(&mut pcm);
        if sample_count == 0 {
            debug!("Audio source drained.");
            break;
        }
        // Opus only accepts whole frames; pad a final short pull.
        pcm[sample_count..].fill(0);

        bump_sequence(&mut packet);

        let total = {
            let mut rtp = MutableRtpPacket::new(&mut packet[..]).expect(
                "FATAL: Too few bytes in packet buffer for RTP header.\
                    (Blame: VOICE_PACKET_MAX?)",
            );
            let payload = rtp.payload_mut();
            let opus_len = encoder.encode(&pcm[..], &mut payload[TAG_SIZE..])?;
            let payload_len = TAG_SIZE + opus_len;

            crypto::encrypt_in_place(&mut rtp, &ctx.cipher, payload_len)?;

            RtpPacket::minimum_packet_size() + payload_len
        };

        match ctx.udp.send(&packet[..total]) {
            Ok(_) => {},
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                trace!("UDP send would block; dropping frame.");
            },
            Err(e) => return Err(Error::Io(e)),
        }

        let samples_per_channel = (sample_count / CHANNEL_COUNT) as u32;
        advance_timestamp(&mut packet, samples_per_channel);

        deadline += frame_duration(samples_per_channel as usize);
        thread::sleep(deadline.saturating_duration_since(Instant::now()));

        if sample_count < STEREO_FRAME_SIZE {
            debug!("Audio source drained.");
            break;
        }
    }

    Ok(())
}

/// Stamps the static RTP fields; sequence starts at zero so the first
/// increment puts frame one on the wire as sequence one.
pub(crate) fn prepare_packet(packet: &mut [u8], ssrc: u32) {
    let mut rtp = MutableRtpPacket::new(packet).expect(
        "FATAL: Too few bytes in packet buffer for RTP header.\
            (Blame: VOICE_PACKET_MAX?)",
    );
    rtp.set_version(RTP_VERSION);
    rtp.set_payload_type(RTP_PROFILE_TYPE);
    rtp.set_sequence(0);
    rtp.set_timestamp(0);
    rtp.set_ssrc(ssrc);
}

pub(crate) fn bump_sequence(packet: &mut [u8]) {
    let mut rtp = MutableRtpPacket::new(packet).expect(
        "FATAL: Too few bytes in packet buffer for RTP header.\
            (Blame: VOICE_PACKET_MAX?)",
    );
    let next = rtp.get_sequence().wrapping_add(1);
    rtp.set_sequence(next);
}

pub(crate) fn advance_timestamp(packet: &mut [u8], samples_per_channel: u32) {
    let mut rtp = MutableRtpPacket::new(packet).expect(
        "FATAL: Too few bytes in packet buffer for RTP header.\
            (Blame: VOICE_PACKET_MAX?)",
    );
    let next = rtp.get_timestamp().wrapping_add(samples_per_channel);
    rtp.set_timestamp(next);
}

/// How long a frame of the given length takes to speak.
pub(crate) fn frame_duration(samples_per_channel: usize) -> Duration {
    Duration::from_micros((samples_per_channel * 1_000_000 / SAMPLE_RATE_RAW) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtp_counters_follow_frames() {
        let mut packet = [0u8; VOICE_PACKET_MAX];
        prepare_packet(&mut packet, 1);

        // First frame: sequence 1, timestamp 0.
        bump_sequence(&mut packet);
        assert_eq!(
            &packet[..12],
            &[0x80, 0x78, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01],
        );

        // A full frame later: sequence 2, timestamp 960.
        advance_timestamp(&mut packet, MONO_FRAME_SIZE as u32);
        bump_sequence(&mut packet);
        assert_eq!(&packet[2..4], &[0x00, 0x02]);
        assert_eq!(&packet[4..8], &[0x00, 0x00, 0x03, 0xC0]);
    }

    #[test]
    fn sequence_wraps_modulo_u16() {
        let mut packet = [0u8; VOICE_PACKET_MAX];
        prepare_packet(&mut packet, 1);
        packet[2] = 0xFF;
        packet[3] = 0xFF;

        bump_sequence(&mut packet);
        assert_eq!(&packet[2..4], &[0x00, 0x00]);
    }

    #[test]
    fn pacing_follows_pulled_audio() {
        assert_eq!(frame_duration(MONO_FRAME_SIZE), TIMESTEP_LENGTH);
        assert_eq!(frame_duration(240), Duration::from_millis(5));
        assert_eq!(frame_duration(0), Duration::ZERO);
    }
}
