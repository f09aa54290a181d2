//! WebhookPayload - 消費者へ届ける回調データ
//!
//! ワイヤ上の JSON（HTTPS POST のボディ）:
//! ```json
//! { "request_id": "...", "type": "code", "value": "123456",
//!   "email": "a@x.com", "service": "openai",
//!   "received_at": "2026-01-01T00:00:00Z" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CourierError;
use super::extraction::ExtractionKind;
use super::ids::WaitRequestId;

/// Webhook 配送ペイロード
///
/// フィールド名はワイヤ互換のため固定（`kind` は `type` として出る）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub request_id: WaitRequestId,

    #[serde(rename = "type")]
    pub kind: ExtractionKind,

    pub value: String,
    pub email: String,
    pub service: String,
    pub received_at: DateTime<Utc>,
}

impl WebhookPayload {
    /// 配送前の検査
    ///
    /// kind は code/link のどちらか、value/email/service は非空であること。
    pub fn validate(&self) -> Result<(), CourierError> {
        if self.kind == ExtractionKind::Unknown {
            return Err(CourierError::Validation(
                "payload type must be code or link".to_string(),
            ));
        }
        if self.value.is_empty() {
            return Err(CourierError::Validation("value cannot be empty".to_string()));
        }
        if self.email.is_empty() {
            return Err(CourierError::Validation("email cannot be empty".to_string()));
        }
        if self.service.is_empty() {
            return Err(CourierError::Validation(
                "service cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
