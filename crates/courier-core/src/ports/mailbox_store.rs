//! MailboxLeaseStore port - lease の正本（source of truth）
//!
//! # 設計原則
//! - Lease 行がシステム唯一の相互排他点。すべての mutation は
//!   occupy/release → `update` を通る。
//! - `update` は楽観ロック: 保存済み version と entity の version が
//!   一致しなければ `VersionConflict`。黙って上書きすることは決してない。
//! - プロセスをまたいでも正しく動く必要があるため、in-process のロックでは
//!   代わりにならない。

use async_trait::async_trait;

use crate::domain::{CourierError, LeaseStatus, MailboxId, MailboxLease};

/// `list_filtered` の結果（items + フィルタ後の総件数）
#[derive(Debug, Clone)]
pub struct LeasePage {
    pub items: Vec<MailboxLease>,
    pub total: usize,
}

/// MailboxLeaseStore は MailboxLease の永続化ポート
#[async_trait]
pub trait MailboxLeaseStore: Send + Sync {
    /// 新しい lease を保存（address は一意）
    async fn add(&self, lease: MailboxLease) -> Result<(), CourierError>;

    async fn get(&self, id: MailboxId) -> Result<Option<MailboxLease>, CourierError>;

    async fn get_by_address(&self, address: &str) -> Result<Option<MailboxLease>, CourierError>;

    /// 全 lease を取得（ポーリングサイクルが毎回呼ぶ — 動的発見）
    async fn list_all(&self) -> Result<Vec<MailboxLease>, CourierError>;

    /// service / status で絞り込み、ページングして返す
    ///
    /// `page` は 1 始まり。total はページング前の件数。
    async fn list_filtered(
        &self,
        service: Option<&str>,
        status: Option<LeaseStatus>,
        page: usize,
        limit: usize,
    ) -> Result<LeasePage, CourierError>;

    /// 楽観ロック付き更新
    ///
    /// `lease.version` は読み出し時点の version であること。保存側は検査後に
    /// version を +1 して永続化する。不一致なら `VersionConflict`（呼び出し元が
    /// 再読込してリトライする）。
    async fn update(&self, lease: MailboxLease) -> Result<(), CourierError>;
}
