//! WaitRequest - 検証コード/リンクを待つ消費者の要求
//!
//! # 状態遷移
//! - pending: 初期状態（メール待ち）
//! - completed: 抽出成功（extraction_value / completed_at が入る）
//! - cancelled: 消費者による取消
//! - failed: webhook 配送失敗など（failure_reason が入る）
//!
//! 遷移は一方向の DAG: Pending → {Completed, Cancelled, Failed}。
//! terminal に入った後の Complete/Cancel/Fail はすべて `InvalidTransition`。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::CourierError;
use super::ids::{MailboxId, WaitRequestId};

/// WaitRequest の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl WaitStatus {
    pub fn is_terminal(&self) -> bool {
        *self != WaitStatus::Pending
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaitStatus::Pending => "pending",
            WaitStatus::Completed => "completed",
            WaitStatus::Cancelled => "cancelled",
            WaitStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WaitRequest は「この address に service の検証メールが届くのを待ち、
/// 値を callback_url に届けてほしい」という 1 件の要求
///
/// `address` は作成時点の lease.address の非正規化コピー（検索用）。
#[derive(Debug, Clone)]
pub struct WaitRequest {
    pub id: WaitRequestId,
    pub mailbox_id: MailboxId,
    pub address: String,
    pub service_name: String,
    pub callback_url: String,
    pub status: WaitStatus,
    pub extraction_value: Option<String>,
    pub failure_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WaitRequest {
    /// 新しい Pending な要求を作成
    pub fn new(
        id: WaitRequestId,
        mailbox_id: MailboxId,
        address: impl Into<String>,
        service_name: impl Into<String>,
        callback_url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            mailbox_id,
            address: address.into(),
            service_name: service_name.into(),
            callback_url: callback_url.into(),
            status: WaitStatus::Pending,
            extraction_value: None,
            failure_reason: None,
            completed_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn guard_pending(&self, to: WaitStatus) -> Result<(), CourierError> {
        if self.status != WaitStatus::Pending {
            return Err(CourierError::InvalidTransition {
                entity: "WaitRequest",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// 抽出成功を記録（Pending からのみ）
    pub fn complete(
        &mut self,
        value: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), CourierError> {
        self.guard_pending(WaitStatus::Completed)?;
        self.status = WaitStatus::Completed;
        self.extraction_value = Some(value.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// 取消（Pending からのみ）
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), CourierError> {
        self.guard_pending(WaitStatus::Cancelled)?;
        self.status = WaitStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// 失敗を記録（Pending からのみ）
    pub fn fail(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), CourierError> {
        self.guard_pending(WaitStatus::Failed)?;
        self.status = WaitStatus::Failed;
        self.failure_reason = reason;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == WaitStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == WaitStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ulid::Ulid;

    fn request() -> WaitRequest {
        WaitRequest::new(
            WaitRequestId::from_ulid(Ulid::new()),
            MailboxId::from_ulid(Ulid::new()),
            "a@x.com",
            "openai",
            "https://consumer.example/hook",
            Utc::now(),
        )
    }

    #[test]
    fn new_request_is_pending() {
        let req = request();
        assert!(req.is_pending());
        assert_eq!(req.extraction_value, None);
        assert_eq!(req.completed_at, None);
    }

    #[test]
    fn complete_sets_value_and_timestamp() {
        let mut req = request();
        let now = Utc::now();
        req.complete("123456", now).unwrap();

        assert!(req.is_completed());
        assert_eq!(req.extraction_value.as_deref(), Some("123456"));
        assert_eq!(req.completed_at, Some(now));
    }

    #[test]
    fn fail_records_reason() {
        let mut req = request();
        req.fail(Some("webhook failed: HTTP 500".to_string()), Utc::now())
            .unwrap();

        assert_eq!(req.status, WaitStatus::Failed);
        assert_eq!(req.failure_reason.as_deref(), Some("webhook failed: HTTP 500"));
    }

    // terminal になった後はどの遷移も拒否される（一方向 DAG）
    #[rstest]
    #[case::from_completed(WaitStatus::Completed)]
    #[case::from_cancelled(WaitStatus::Cancelled)]
    #[case::from_failed(WaitStatus::Failed)]
    fn terminal_states_reject_all_transitions(#[case] terminal: WaitStatus) {
        let mut req = request();
        let now = Utc::now();
        match terminal {
            WaitStatus::Completed => req.complete("v", now).unwrap(),
            WaitStatus::Cancelled => req.cancel(now).unwrap(),
            WaitStatus::Failed => req.fail(None, now).unwrap(),
            WaitStatus::Pending => unreachable!(),
        }

        assert!(matches!(
            req.clone().complete("x", now).unwrap_err(),
            CourierError::InvalidTransition { .. }
        ));
        assert!(matches!(
            req.clone().cancel(now).unwrap_err(),
            CourierError::InvalidTransition { .. }
        ));
        assert!(matches!(
            req.clone().fail(None, now).unwrap_err(),
            CourierError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn failed_complete_does_not_downgrade_state() {
        let mut req = request();
        let now = Utc::now();
        req.complete("123456", now).unwrap();

        let _ = req.fail(Some("late webhook error".to_string()), now);

        // 既に Completed の要求は決して巻き戻らない
        assert!(req.is_completed());
        assert_eq!(req.extraction_value.as_deref(), Some("123456"));
        assert_eq!(req.failure_reason, None);
    }
}
