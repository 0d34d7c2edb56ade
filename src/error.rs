//! Client-level error handling.

pub use serde_json::Error as JsonError;

use crate::ws::Error as WsError;
use std::{error::Error as StdError, fmt};

/// Error returned when the client cannot reach or drive Discord's APIs.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// [`Client::run`] was called while a session was already live.
    ///
    /// [`Client::run`]: crate::Client::run
    AlreadyRunning,
    /// The HTTP layer failed outright (DNS, TLS, transport).
    Http(reqwest::Error),
    /// A REST endpoint answered with a non-success status.
    HttpStatus(reqwest::StatusCode),
    /// A payload could not be serialized or deserialized.
    Json(JsonError),
    /// The gateway URL handed out by Discord could not be parsed.
    GatewayUrl,
    /// The websocket connection failed.
    Ws(WsError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyRunning => write!(f, "client is already running"),
            Error::Http(e) => e.fmt(f),
            Error::HttpStatus(status) => write!(f, "HTTP request failed with status {status}"),
            Error::Json(e) => e.fmt(f),
            Error::GatewayUrl => write!(f, "illegal gateway URL"),
            Error::Ws(e) => e.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Ws(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Self {
        Error::Json(e)
    }
}

impl From<WsError> for Error {
    fn from(e: WsError) -> Self {
        Error::Ws(e)
    }
}

/// Convenience type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
