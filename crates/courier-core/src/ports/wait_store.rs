//! WaitRequestStore port - wait request の永続化

use async_trait::async_trait;

use crate::domain::{CourierError, WaitRequest, WaitRequestId};

/// WaitRequestStore は WaitRequest の永続化ポート
///
/// `update` は MailboxLeaseStore と同じ楽観ロック契約に従う。
#[async_trait]
pub trait WaitRequestStore: Send + Sync {
    async fn add(&self, request: WaitRequest) -> Result<(), CourierError>;

    async fn get(&self, id: WaitRequestId) -> Result<Option<WaitRequest>, CourierError>;

    /// ある address に対する Pending な要求を created_at 昇順で返す
    ///
    /// 順序は FIFO fallback（最古の要求が勝つ）の前提になっている。
    async fn list_pending_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<WaitRequest>, CourierError>;

    /// 楽観ロック付き更新（version 不一致は `VersionConflict`）
    async fn update(&self, request: WaitRequest) -> Result<(), CourierError>;
}
