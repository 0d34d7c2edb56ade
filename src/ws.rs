use crate::error::JsonError;

use futures::{SinkExt, StreamExt, TryStreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    net::TcpStream,
    time::{timeout, Duration},
};
use tokio_tungstenite::{
    tungstenite::{
        error::Error as TungsteniteError,
        protocol::{CloseFrame, WebSocketConfig as Config},
        Message,
    },
    MaybeTlsStream,
    WebSocketStream,
};
use tracing::{debug, instrument};
use url::Url;

/// One websocket connection, shared in shape between the main gateway
/// (v6) and voice gateway (v4) dialects: both exchange JSON text frames.
pub struct WsStream(WebSocketStream<MaybeTlsStream<TcpStream>>);

impl WsStream {
    #[instrument]
    pub(crate) async fn connect(url: Url) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async_with_config::<Url>(
            url,
            Some(Config {
                max_message_size: None,
                max_frame_size: None,
                ..Default::default()
            }),
            true,
        )
        .await?;

        Ok(Self(stream))
    }

    pub(crate) async fn recv_json<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        const TIMEOUT: Duration = Duration::from_millis(500);

        let ws_message = match timeout(TIMEOUT, self.0.next()).await {
            Ok(Some(Ok(v))) => Some(v),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) | Err(_) => None,
        };

        convert_ws_message(ws_message)
    }

    pub(crate) async fn recv_json_no_timeout<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        convert_ws_message(self.0.try_next().await?)
    }

    pub(crate) async fn send_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        Ok(serde_json::to_string(value)
            .map(Message::Text)
            .map_err(Error::from)
            .map(|m| self.0.send(m))?
            .await?)
    }

    pub(crate) async fn close(&mut self) -> Result<()> {
        self.0.close(None).await.map_err(Error::from)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Json(JsonError),

    /// Neither gateway dialect offers zlib compression here, so only text
    /// messages are expected.
    UnexpectedBinaryMessage(Vec<u8>),

    Ws(TungsteniteError),

    WsClosed(Option<CloseFrame<'static>>),
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Error {
        Error::Json(e)
    }
}

impl From<TungsteniteError> for Error {
    fn from(e: TungsteniteError) -> Error {
        Error::Ws(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Json(e) => e.fmt(f),
            Error::UnexpectedBinaryMessage(_) => write!(f, "unexpected binary websocket message"),
            Error::Ws(e) => e.fmt(f),
            Error::WsClosed(_) => write!(f, "websocket closed by remote"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            Error::Ws(e) => Some(e),
            Error::UnexpectedBinaryMessage(_) | Error::WsClosed(_) => None,
        }
    }
}

#[inline]
pub(crate) fn convert_ws_message<T: DeserializeOwned>(message: Option<Message>) -> Result<Option<T>> {
    Ok(match message {
        Some(Message::Text(payload)) => serde_json::from_str(&payload)
            .map_err(|e| {
                debug!("Unexpected JSON: {e}. Payload: {payload}");
                e
            })
            .ok(),
        Some(Message::Binary(bytes)) => {
            return Err(Error::UnexpectedBinaryMessage(bytes));
        },
        Some(Message::Close(Some(frame))) => {
            return Err(Error::WsClosed(Some(frame)));
        },
        // Ping/Pong message behaviour is internally handled by tungstenite.
        _ => None,
    })
}
