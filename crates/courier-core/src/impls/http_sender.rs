//! HttpWebhookSender - reqwest による WebhookSender 実装
//!
//! 1 attempt = 1 POST（JSON ボディ）。タイムアウトは client に焼き込む。

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{CourierError, WebhookPayload};
use crate::ports::{SendError, WebhookSender};

/// 1 attempt あたりのタイムアウト
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// HttpWebhookSender は callback URL へ JSON を POST する
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    pub fn new() -> Result<Self, CourierError> {
        Self::with_timeout(DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::Store(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, url: &str, payload: &WebhookPayload) -> Result<u16, SendError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout
                } else {
                    SendError::Network(e.to_string())
                }
            })?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_timeout() {
        assert!(HttpWebhookSender::new().is_ok());
    }
}
