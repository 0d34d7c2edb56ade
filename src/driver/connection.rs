//! Voice gateway handshake: websocket identify, UDP setup, IP discovery,
//! and key exchange.

use super::{
    crypto::{self, Cipher},
    error::{Error, Result},
    ConnectionInfo,
};
use crate::{
    constants::VOICE_GATEWAY_VERSION,
    model::{
        payload::Command,
        voice::{self, VoicePayload},
        VoiceOpcode,
    },
    ws::WsStream,
};
use discortp::discord::{IpDiscoveryPacket, IpDiscoveryType, MutableIpDiscoveryPacket};
use socket2::Socket;
use std::{sync::Arc, time::Duration};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use url::Url;

/// A fully negotiated voice transport, ready for the session loop.
pub(crate) struct Connection {
    pub ws: WsStream,
    pub heartbeat_interval: Duration,
    pub ssrc: u32,
    pub udp: Arc<std::net::UdpSocket>,
    pub cipher: Cipher,
}

pub(crate) async fn connect(info: &ConnectionInfo) -> Result<Connection> {
    let url = generate_url(&info.endpoint)?;
    let mut ws = WsStream::connect(url).await?;

    ws.send_json(&Command::voice(
        VoiceOpcode::Identify,
        voice::Identify {
            server_id: info.guild_id.clone(),
            session_id: info.session_id.clone(),
            user_id: info.user_id.clone(),
            token: info.token.clone(),
        },
    ))
    .await?;

    let mut hello: Option<voice::Hello> = None;
    let mut ready: Option<voice::Ready> = None;

    while hello.is_none() || ready.is_none() {
        let Some(payload) = ws.recv_json::<VoicePayload>().await? else {
            continue;
        };

        match VoiceOpcode::from_u8(payload.op) {
            Some(VoiceOpcode::Hello) => hello = Some(serde_json::from_value(payload.d)?),
            Some(VoiceOpcode::Ready) => ready = Some(serde_json::from_value(payload.d)?),
            other => {
                debug!("Expected hello/ready; got opcode {other:?}");
            },
        }
    }

    let hello = hello.expect("Hello payload expected in voice handshake, but not found.");
    let ready = ready.expect("Ready payload expected in voice handshake, but not found.");

    if !ready.modes.is_empty() && !ready.modes.iter().any(|m| m == crypto::MODE) {
        warn!("Voice server did not offer {}; proceeding regardless.", crypto::MODE);
    }

    let udp = UdpSocket::bind("0.0.0.0:0").await?;
    udp.connect((ready.ip.as_str(), ready.port)).await?;

    // Follow Discord's IP discovery procedure, in case NAT tunnelling is needed.
    let request = discovery_request(ready.ssrc);
    udp.send(&request).await?;

    let mut response = [0u8; IpDiscoveryPacket::const_packet_size()];
    let (len, _addr) = udp.recv_from(&mut response).await?;
    let (address, port) = parse_discovery_response(&response[..len])?;

    ws.send_json(&Command::voice(
        VoiceOpcode::SelectProtocol,
        voice::SelectProtocol {
            protocol: "udp",
            data: voice::ProtocolData {
                address,
                port,
                mode: crypto::MODE,
            },
        },
    ))
    .await?;

    let cipher = init_cipher(&mut ws).await?;

    // The socket only transmits from here on; free its receive buffer.
    let udp = {
        let socket = Socket::from(udp.into_std()?);

        #[cfg(not(target_os = "macos"))]
        socket.set_recv_buffer_size(0)?;

        Arc::new(socket.into())
    };

    info!("Connected to voice endpoint {}.", info.endpoint);
    info!(
        "Voice heartbeat interval {}ms.",
        hello.heartbeat_interval
    );

    Ok(Connection {
        ws,
        heartbeat_interval: Duration::from_secs_f64(hello.heartbeat_interval / 1000.0),
        ssrc: ready.ssrc,
        udp,
        cipher,
    })
}

/// Reopens the websocket and resumes the existing session; the UDP
/// transport and key survive as they were.
pub(crate) async fn reconnect(info: &ConnectionInfo) -> Result<(WsStream, Duration)> {
    let url = generate_url(&info.endpoint)?;
    let mut ws = WsStream::connect(url).await?;

    ws.send_json(&Command::voice(
        VoiceOpcode::Resume,
        voice::Resume {
            server_id: info.guild_id.clone(),
            session_id: info.session_id.clone(),
            token: info.token.clone(),
        },
    ))
    .await?;

    let mut hello: Option<voice::Hello> = None;
    let mut resumed = false;

    while hello.is_none() || !resumed {
        let Some(payload) = ws.recv_json::<VoicePayload>().await? else {
            continue;
        };

        match VoiceOpcode::from_u8(payload.op) {
            Some(VoiceOpcode::Hello) => hello = Some(serde_json::from_value(payload.d)?),
            Some(VoiceOpcode::Resumed) => resumed = true,
            other => {
                debug!("Expected hello/resumed; got opcode {other:?}");
            },
        }
    }

    let hello = hello.expect("Hello payload expected in voice handshake, but not found.");

    info!("Reconnected to voice endpoint {}.", info.endpoint);

    Ok((
        ws,
        Duration::from_secs_f64(hello.heartbeat_interval / 1000.0),
    ))
}

fn generate_url(endpoint: &str) -> Result<Url> {
    // Endpoints may arrive with a stale `:port` suffix; only the host is used.
    let host = endpoint.split(':').next().unwrap_or(endpoint);

    Url::parse(&format!("wss://{host}/?v={VOICE_GATEWAY_VERSION}")).or(Err(Error::EndpointUrl))
}

/// Builds the 74-byte discovery request: type 0x01, length 70, SSRC,
/// all big-endian, zero padding.
pub(crate) fn discovery_request(ssrc: u32) -> [u8; IpDiscoveryPacket::const_packet_size()] {
    let mut bytes = [0u8; IpDiscoveryPacket::const_packet_size()];

    let mut view = MutableIpDiscoveryPacket::new(&mut bytes[..]).expect(
        "FATAL: Too few bytes for IP discovery packet.\
            (Blame: IpDiscoveryPacket::const_packet_size()?)",
    );
    view.set_pkt_type(IpDiscoveryType::Request);
    view.set_length(70);
    view.set_ssrc(ssrc);

    bytes
}

/// Pulls the external address out of the echoed discovery packet: a
/// NUL-terminated IP string at offset 8, port in the trailing two bytes.
pub(crate) fn parse_discovery_response(bytes: &[u8]) -> Result<(String, u16)> {
    let view = IpDiscoveryPacket::new(bytes).ok_or(Error::IllegalDiscoveryResponse)?;

    // We could do something clever like binary search,
    // but possibility of UDP spoofing precludes us from
    // making the assumption we can find a "left edge" of '\0's.
    let nul_byte_index = view
        .get_address_raw()
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::IllegalIp)?;

    let address = std::str::from_utf8(&view.get_address_raw()[..nul_byte_index])
        .map_err(|_| Error::IllegalIp)?
        .to_owned();

    Ok((address, view.get_port()))
}

async fn init_cipher(ws: &mut WsStream) -> Result<Cipher> {
    loop {
        let Some(payload) = ws.recv_json::<VoicePayload>().await? else {
            continue;
        };

        match VoiceOpcode::from_u8(payload.op) {
            Some(VoiceOpcode::SessionDescription) => {
                let desc: voice::SessionDescription = serde_json::from_value(payload.d)?;

                if !desc.mode.is_empty() && desc.mode != crypto::MODE {
                    warn!("Session negotiated unexpected mode {}.", desc.mode);
                }

                return crypto::new_cipher(&desc.secret_key).map_err(Error::Crypto);
            },
            other => {
                debug!("Expected session description; got opcode {other:?}");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_request_layout() {
        let bytes = discovery_request(1234);

        assert_eq!(bytes.len(), 74);
        assert_eq!(&bytes[..4], &[0x00, 0x01, 0x00, 0x46]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x04, 0xD2]);
        assert!(bytes[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn discovery_response_round_trip() {
        // Servers echo the request shape back with address and port filled in.
        let mut bytes = discovery_request(1234);
        bytes[8..16].copy_from_slice(b"5.6.7.8\0");
        bytes[72..74].copy_from_slice(&5000u16.to_be_bytes());

        let (address, port) = parse_discovery_response(&bytes).unwrap();
        assert_eq!(address, "5.6.7.8");
        assert_eq!(port, 5000);
    }

    #[test]
    fn truncated_discovery_response_is_rejected() {
        let bytes = discovery_request(1234);
        assert!(parse_discovery_response(&bytes[..8]).is_err());
    }

    #[test]
    fn endpoint_port_suffix_is_stripped() {
        let url = generate_url("smart.loyal.discord.media:443").unwrap();
        assert_eq!(url.as_str(), "wss://smart.loyal.discord.media/?v=4");
    }
}
