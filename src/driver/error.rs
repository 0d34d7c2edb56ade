//! Voice connection and playback error handling.

use crate::{error::JsonError, ws::Error as WsError};
use audiopus::Error as OpusError;
use crypto_secretbox::Error as CryptoError;
use std::{error::Error as StdError, fmt, io::Error as IoError};

/// Errors encountered while negotiating or driving a voice connection.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The session key was rejected, or encryption failed.
    Crypto(CryptoError),
    /// The voice endpoint could not be turned into a websocket URL.
    EndpointUrl,
    /// The IP discovery response was malformed or truncated.
    IllegalDiscoveryResponse,
    /// The discovered external IP was not a valid address string.
    IllegalIp,
    /// UDP or socket configuration failed.
    Io(IoError),
    /// A voice payload could not be parsed or serialized.
    Json(JsonError),
    /// The Opus encoder could not be created, or rejected a frame.
    Opus(OpusError),
    /// The voice websocket failed.
    Ws(WsError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice connection failure: ")?;
        match self {
            Error::Crypto(_) => write!(f, "encryption could not be initialised or applied"),
            Error::EndpointUrl => write!(f, "endpoint improperly formatted"),
            Error::IllegalDiscoveryResponse => write!(f, "IP discovery/NAT punching response was invalid"),
            Error::IllegalIp => write!(f, "IP discovery/NAT punching response had bad IP value"),
            Error::Io(e) => e.fmt(f),
            Error::Json(e) => e.fmt(f),
            Error::Opus(e) => e.fmt(f),
            Error::Ws(e) => e.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Opus(e) => Some(e),
            Error::Ws(e) => Some(e),
            Error::Crypto(_)
            | Error::EndpointUrl
            | Error::IllegalDiscoveryResponse
            | Error::IllegalIp => None,
        }
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::Crypto(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Self {
        Error::Json(e)
    }
}

impl From<OpusError> for Error {
    fn from(e: OpusError) -> Self {
        Error::Opus(e)
    }
}

impl From<WsError> for Error {
    fn from(e: WsError) -> Self {
        Error::Ws(e)
    }
}

/// Convenience type for voice connection handling.
pub type Result<T> = std::result::Result<T, Error>;
