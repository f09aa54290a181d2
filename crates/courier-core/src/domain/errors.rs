//! Errors - エラー型と分類
//!
//! # 分類
//! - NotFound: lease/request/email が存在しない（呼び出し元へそのまま返す）
//! - Conflict: AlreadyOccupied, AlreadyTerminal, VersionConflict など
//! - Transient: fetch/webhook の一時エラー（retry の対象、別の型で表現）
//! - Validation: 状態を変更する前に弾く入力エラー

use thiserror::Error;

use super::ids::{EmailId, MailboxId, WaitRequestId};
use super::wait_request::WaitStatus;

/// CourierError はドメイン/アプリケーション共通のエラー型
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("mailbox not found: {0}")]
    MailboxNotFound(String),

    #[error("wait request not found: {0}")]
    RequestNotFound(WaitRequestId),

    #[error("email not found: {0}")]
    EmailNotFound(EmailId),

    #[error("mailbox {address} already occupied by service: {service}")]
    AlreadyOccupied { address: String, service: String },

    #[error("mailbox {0} is not occupied")]
    NotOccupied(MailboxId),

    #[error("invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("wait request {id} is already terminal (status: {status})")]
    AlreadyTerminal { id: WaitRequestId, status: WaitStatus },

    #[error("email {0} has already been processed")]
    AlreadyProcessed(EmailId),

    #[error("duplicate message id: {0}")]
    DuplicateMessageId(String),

    #[error("version conflict on {entity} (expected {expected}, found {found})")]
    VersionConflict {
        entity: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("validation: {0}")]
    Validation(String),

    #[error("store: {0}")]
    Store(String),
}

impl CourierError {
    /// 呼び出し元に 404 相当で返すべきエラーか
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MailboxNotFound(_) | Self::RequestNotFound(_) | Self::EmailNotFound(_)
        )
    }

    /// 409 相当（衝突・前提条件違反）のエラーか
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyOccupied { .. }
                | Self::NotOccupied(_)
                | Self::InvalidTransition { .. }
                | Self::AlreadyTerminal { .. }
                | Self::AlreadyProcessed(_)
                | Self::DuplicateMessageId(_)
                | Self::VersionConflict { .. }
        )
    }
}
