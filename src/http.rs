//! The thin slice of Discord's REST API the client consumes.

use crate::{
    constants::API_BASE_URL,
    error::{Error, Result},
    id::ChannelId,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::error;

pub(crate) struct Rest {
    http: HttpClient,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GatewayBot {
    url: String,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
    tts: bool,
}

impl Rest {
    pub(crate) fn new(token: &str) -> Self {
        Self {
            http: HttpClient::new(),
            token: token.to_owned(),
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Asks Discord which websocket URL this bot should connect to.
    pub(crate) async fn gateway_url(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{API_BASE_URL}/gateway/bot"))
            .header("Authorization", self.auth())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Gateway discovery failed: HTTP {status}");
            return Err(Error::HttpStatus(status));
        }

        Ok(response.json::<GatewayBot>().await?.url)
    }

    /// Posts a message to a channel.
    pub(crate) async fn create_message(
        &self,
        channel_id: &ChannelId,
        content: &str,
        tts: bool,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!("{API_BASE_URL}/channels/{channel_id}/messages"))
            .header("Authorization", self.auth())
            .json(&CreateMessage { content, tts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Failed to send message: HTTP {status}");
            return Err(Error::HttpStatus(status));
        }

        Ok(())
    }
}
