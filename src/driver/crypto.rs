//! Encryption for Discord's secure RTP traffic.

use crypto_secretbox::{
    AeadInPlace,
    Error as CryptoError,
    KeyInit,
    Nonce,
    SecretBox,
    XSalsa20Poly1305,
};
use discortp::MutablePacket;

/// The cipher every voice session encrypts with.
pub(crate) type Cipher = XSalsa20Poly1305;

/// Length of the Poly1305 authentication tag prepended to each payload.
pub const TAG_SIZE: usize = SecretBox::<()>::TAG_SIZE;

/// Length of the XSalsa20 nonce.
pub const NONCE_SIZE: usize = SecretBox::<()>::NONCE_SIZE;

/// Length of the session key handed out in `SESSION_DESCRIPTION`.
pub const KEY_SIZE: usize = SecretBox::<()>::KEY_SIZE;

/// The encryption mode this driver negotiates.
///
/// The nonce is the 12-byte RTP header padded with zeroes; no extra bytes
/// ride along in the packet.
pub const MODE: &str = "xsalsa20_poly1305";

pub(crate) fn new_cipher(secret_key: &[u8]) -> Result<Cipher, CryptoError> {
    Cipher::new_from_slice(secret_key).map_err(|_| CryptoError)
}

/// Encrypts a voice packet in place using the given key.
///
/// The packet must hold `TAG_SIZE` spare bytes between header and Opus
/// data; `payload_len` counts everything after the header, tag included.
#[inline]
pub(crate) fn encrypt_in_place(
    packet: &mut impl MutablePacket,
    cipher: &Cipher,
    payload_len: usize,
) -> Result<(), CryptoError> {
    let header_len = packet.packet().len() - packet.payload().len();
    let (header, body) = packet.packet_mut().split_at_mut(header_len);

    if header_len > NONCE_SIZE || payload_len < TAG_SIZE || payload_len > body.len() {
        return Err(CryptoError);
    }

    let mut nonce = Nonce::default();
    nonce[..header_len].copy_from_slice(header);

    let body = &mut body[..payload_len];
    let tag = cipher.encrypt_in_place_detached(&nonce, b"", &mut body[TAG_SIZE..])?;
    body[..TAG_SIZE].copy_from_slice(&tag[..]);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::{RTP_PROFILE_TYPE, RTP_VERSION};
    use crypto_secretbox::Tag;
    use discortp::rtp::{MutableRtpPacket, RtpPacket};

    fn test_packet(extra: usize) -> Vec<u8> {
        let mut buf = vec![0u8; RtpPacket::minimum_packet_size() + extra];
        let mut rtp = MutableRtpPacket::new(&mut buf[..]).unwrap();
        rtp.set_version(RTP_VERSION);
        rtp.set_payload_type(RTP_PROFILE_TYPE);
        rtp.set_sequence(1);
        rtp.set_ssrc(1);
        buf
    }

    #[test]
    fn undersized_payload_errors() {
        let mut buf = test_packet(0);
        let mut pkt = MutableRtpPacket::new(&mut buf[..]).unwrap();
        let cipher = Cipher::new_from_slice(&[1u8; KEY_SIZE]).unwrap();

        // AIM: should error, and not panic.
        assert!(encrypt_in_place(&mut pkt, &cipher, 0).is_err());
    }

    #[test]
    fn symmetric_encrypt_decrypt() {
        const TRUE_PAYLOAD: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut buf = test_packet(TAG_SIZE + TRUE_PAYLOAD.len());
        let cipher = Cipher::new_from_slice(&[7u8; KEY_SIZE]).unwrap();
        let payload_len = TAG_SIZE + TRUE_PAYLOAD.len();

        let mut pkt = MutableRtpPacket::new(&mut buf[..]).unwrap();
        pkt.payload_mut()[TAG_SIZE..payload_len].copy_from_slice(&TRUE_PAYLOAD[..]);
        assert!(encrypt_in_place(&mut pkt, &cipher, payload_len).is_ok());

        // Undo by hand with the same header-derived nonce.
        let header_len = RtpPacket::minimum_packet_size();
        let (header, body) = buf.split_at_mut(header_len);
        let mut nonce = Nonce::default();
        nonce[..header_len].copy_from_slice(header);

        let (tag_bytes, data) = body.split_at_mut(TAG_SIZE);
        let tag = Tag::from_slice(tag_bytes);
        assert!(cipher
            .decrypt_in_place_detached(&nonce, b"", data, tag)
            .is_ok());
        assert_eq!(data, &TRUE_PAYLOAD[..]);
    }

    #[test]
    fn datagram_length_matches_opus_payload() {
        // An 80-byte Opus frame yields a 12 + 16 + 80 byte datagram.
        let opus_len = 80;
        let mut buf = test_packet(TAG_SIZE + opus_len);
        let cipher = Cipher::new_from_slice(&[9u8; KEY_SIZE]).unwrap();

        let mut pkt = MutableRtpPacket::new(&mut buf[..]).unwrap();
        assert!(encrypt_in_place(&mut pkt, &cipher, TAG_SIZE + opus_len).is_ok());

        assert_eq!(buf.len(), 108);
        assert_eq!(&buf[..2], &[0x80, 0x78]);
    }
}
