use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::TelegramConfig;
use crate::models::NotificationDestination;
use crate::notify::transport::NotificationTransport;
use crate::{AppError, Result};

/// Sends notifications through the Telegram Bot API. Threaded destinations
/// map to `message_thread_id`, flat ones post to the chat root.
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let bot_token = config
            .bot_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Validation("telegram.bot_token is required to send notifications".into())
            })?;

        Ok(Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationTransport for TelegramTransport {
    async fn send(&self, destination: &NotificationDestination, text: &str) -> Result<()> {
        let mut payload = json!({
            "chat_id": destination.chat_id(),
            "text": text,
        });
        if let NotificationDestination::Threaded { thread_id, .. } = destination {
            payload["message_thread_id"] = json!(thread_id);
        }

        let delivery_error = |message: String| AppError::Delivery {
            destination: destination.to_string(),
            message,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| delivery_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(delivery_error(format!(
                "telegram api returned {status}: {body}"
            )));
        }

        Ok(())
    }
}
