//! StatusQuery - 要求の現在地を問い合わせる読み取り専用の口
//!
//! HTTP に被せる前提のステータス対応:
//! - 要求が存在しない: 404
//! - pending: 202（まだ待っている）
//! - completed: 200（payload と同じ形で値を返す）
//! - cancelled / failed: 410（この要求はもう何も返さない）

use std::sync::Arc;

use crate::domain::{
    CourierError, ExtractionKind, WaitRequest, WaitRequestId, WaitStatus, WebhookPayload,
};
use crate::ports::WaitRequestStore;

/// 問い合わせ結果
#[derive(Debug, Clone)]
pub enum CodeStatus {
    NotFound,
    Pending {
        request_id: WaitRequestId,
        /// 202 応答ボディに載せる人間向けメッセージ
        message: String,
    },
    /// 抽出済み。webhook と同じ形で値を持つ。
    Completed(WebhookPayload),
    /// terminal（cancelled / failed）。もう値は来ない。
    Closed {
        request_id: WaitRequestId,
        status: WaitStatus,
        reason: Option<String>,
    },
}

impl CodeStatus {
    pub fn http_status(&self) -> u16 {
        match self {
            CodeStatus::NotFound => 404,
            CodeStatus::Pending { .. } => 202,
            CodeStatus::Completed(_) => 200,
            CodeStatus::Closed { .. } => 410,
        }
    }
}

/// StatusQuery は wait store だけを見る（書き込みはしない）
pub struct StatusQuery {
    wait_store: Arc<dyn WaitRequestStore>,
}

impl StatusQuery {
    pub fn new(wait_store: Arc<dyn WaitRequestStore>) -> Self {
        Self { wait_store }
    }

    pub async fn get_code(&self, request_id: WaitRequestId) -> Result<CodeStatus, CourierError> {
        let Some(request) = self.wait_store.get(request_id).await? else {
            return Ok(CodeStatus::NotFound);
        };

        Ok(match request.status {
            WaitStatus::Pending => CodeStatus::Pending {
                request_id,
                message: "still waiting for the verification mail".to_string(),
            },
            WaitStatus::Completed => CodeStatus::Completed(completed_payload(&request)?),
            WaitStatus::Cancelled | WaitStatus::Failed => CodeStatus::Closed {
                request_id,
                status: request.status,
                reason: request.failure_reason,
            },
        })
    }
}

/// Completed な要求から webhook と同じ形の payload を組み立てる
///
/// 種別は保存済みの値から推定する（http(s) で始まれば link）。
fn completed_payload(request: &WaitRequest) -> Result<WebhookPayload, CourierError> {
    let value = request
        .extraction_value
        .clone()
        .ok_or_else(|| CourierError::Store("completed request without value".into()))?;
    Ok(WebhookPayload {
        request_id: request.id,
        kind: ExtractionKind::infer(&value),
        value,
        email: request.address.clone(),
        service: request.service_name.clone(),
        received_at: request.completed_at.unwrap_or(request.updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    use crate::domain::{MailboxId, WaitRequest};
    use crate::impls::memory::InMemoryWaitRequestStore;

    async fn stored(mutate: impl FnOnce(&mut WaitRequest)) -> (StatusQuery, WaitRequestId) {
        let store = Arc::new(InMemoryWaitRequestStore::new());
        let mut request = WaitRequest::new(
            WaitRequestId::from_ulid(Ulid::new()),
            MailboxId::from_ulid(Ulid::new()),
            "a@x.com",
            "openai",
            "https://consumer.example/hook",
            Utc::now(),
        );
        mutate(&mut request);
        let id = request.id;
        store.add(request).await.unwrap();
        (StatusQuery::new(store), id)
    }

    #[tokio::test]
    async fn missing_request_maps_to_404() {
        let (query, _) = stored(|_| {}).await;
        let status = query
            .get_code(WaitRequestId::from_ulid(Ulid::new()))
            .await
            .unwrap();
        assert!(matches!(status, CodeStatus::NotFound));
        assert_eq!(status.http_status(), 404);
    }

    #[tokio::test]
    async fn pending_request_maps_to_202_with_a_message() {
        let (query, id) = stored(|_| {}).await;
        let status = query.get_code(id).await.unwrap();
        assert_eq!(status.http_status(), 202);
        match status {
            CodeStatus::Pending { request_id, message } => {
                assert_eq!(request_id, id);
                assert!(!message.is_empty());
            }
            other => panic!("expected Pending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_code_comes_back_as_code_payload() {
        let (query, id) = stored(|r| r.complete("482913", Utc::now()).unwrap()).await;
        let status = query.get_code(id).await.unwrap();
        assert_eq!(status.http_status(), 200);
        match status {
            CodeStatus::Completed(payload) => {
                assert_eq!(payload.kind, ExtractionKind::Code);
                assert_eq!(payload.value, "482913");
                assert_eq!(payload.email, "a@x.com");
                assert_eq!(payload.service, "openai");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_link_is_inferred_from_the_value() {
        let (query, id) =
            stored(|r| r.complete("https://verify.example/x", Utc::now()).unwrap()).await;
        match query.get_code(id).await.unwrap() {
            CodeStatus::Completed(payload) => assert_eq!(payload.kind, ExtractionKind::Link),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_and_failed_map_to_410() {
        let (query, id) = stored(|r| r.cancel(Utc::now()).unwrap()).await;
        let status = query.get_code(id).await.unwrap();
        assert_eq!(status.http_status(), 410);
        assert!(matches!(
            status,
            CodeStatus::Closed {
                status: WaitStatus::Cancelled,
                ..
            }
        ));

        let (query, id) = stored(|r| {
            r.fail(Some("Webhook failed: HTTP 500".to_string()), Utc::now())
                .unwrap()
        })
        .await;
        match query.get_code(id).await.unwrap() {
            CodeStatus::Closed { status, reason, .. } => {
                assert_eq!(status, WaitStatus::Failed);
                assert_eq!(reason.as_deref(), Some("Webhook failed: HTTP 500"));
            }
            other => panic!("expected Closed, got {other:?}"),
        }
    }
}
