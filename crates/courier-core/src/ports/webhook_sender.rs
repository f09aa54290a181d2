//! WebhookSender port - 1 回分の HTTP 送信
//!
//! # 設計
//! - sender は 1 attempt = 1 POST。リトライ/バックオフは
//!   WebhookDispatcher（app 層）の責務。
//! - 返り値は HTTP ステータスコード。2xx 判定も dispatcher が行う。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::WebhookPayload;

/// 送信そのものの失敗（HTTP 応答すら得られなかった場合）
#[derive(Debug, Error)]
pub enum SendError {
    #[error("request timeout")]
    Timeout,

    #[error("request error: {0}")]
    Network(String),
}

/// WebhookSender はペイロードを callback URL へ 1 回 POST する
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST を 1 回実行し、HTTP ステータスコードを返す
    async fn send(&self, url: &str, payload: &WebhookPayload) -> Result<u16, SendError>;
}
