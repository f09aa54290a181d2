//! EmailStore port - 保存済みメールの永続化
//!
//! # 設計原則
//! - message_id は store 全体で一意（dedup キー）。`add` は重複を拒否する。
//! - スケジューラは `exists_by_message_id` で先にチェックするが、並行
//!   サイクルの取りこぼしは `add` の一意性が最後の防衛線になる。

use async_trait::async_trait;

use crate::domain::{CourierError, Email, EmailId};

/// EmailStore は Email の永続化ポート
#[async_trait]
pub trait EmailStore: Send + Sync {
    /// 新しいメールを保存（message_id 重複は `DuplicateMessageId`）
    async fn add(&self, email: Email) -> Result<(), CourierError>;

    async fn get(&self, id: EmailId) -> Result<Option<Email>, CourierError>;

    async fn exists_by_message_id(&self, message_id: &str) -> Result<bool, CourierError>;

    /// 未処理メールを received_at 昇順で最大 `limit` 件返す
    ///
    /// sweep はこの順序で処理する（消費者間の FIFO 公平性の近似）。
    async fn list_unprocessed(&self, limit: usize) -> Result<Vec<Email>, CourierError>;

    /// 楽観ロック付き更新（version 不一致は `VersionConflict`）
    async fn update(&self, email: Email) -> Result<(), CourierError>;
}
