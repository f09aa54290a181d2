//! CancelWait - 待ち受け取消コマンド
//!
//! # フロー
//! 1. request を取得（なければ `RequestNotFound`）
//! 2. Pending でなければ `AlreadyTerminal`（現在の状態を添えて報告、無変更）
//! 3. cancel → update
//! 4. lease の解放は best-effort（失敗はログのみ — 取消自体は成功させる）

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{CourierError, MailboxId, WaitRequestId};
use crate::ports::{Clock, MailboxLeaseStore, WaitRequestStore};

/// CancelWaitHandler は取消コマンドを処理
pub struct CancelWaitHandler {
    wait_store: Arc<dyn WaitRequestStore>,
    mailbox_store: Arc<dyn MailboxLeaseStore>,
    clock: Arc<dyn Clock>,
}

impl CancelWaitHandler {
    pub fn new(
        wait_store: Arc<dyn WaitRequestStore>,
        mailbox_store: Arc<dyn MailboxLeaseStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            wait_store,
            mailbox_store,
            clock,
        }
    }

    pub async fn handle(&self, request_id: WaitRequestId) -> Result<(), CourierError> {
        info!(request_id = %request_id, "cancelling wait request");

        let mut request = self
            .wait_store
            .get(request_id)
            .await?
            .ok_or(CourierError::RequestNotFound(request_id))?;

        if !request.is_pending() {
            return Err(CourierError::AlreadyTerminal {
                id: request_id,
                status: request.status,
            });
        }

        request.cancel(self.clock.now())?;
        self.wait_store.update(request.clone()).await?;

        // lease の帳尻が合っていなくても取消は成功扱い
        self.release_best_effort(request.mailbox_id).await;

        info!(request_id = %request_id, address = %request.address, "wait request cancelled");
        Ok(())
    }

    async fn release_best_effort(&self, mailbox_id: MailboxId) {
        let lease = match self.mailbox_store.get(mailbox_id).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                warn!(mailbox_id = %mailbox_id, "mailbox not found for release");
                return;
            }
            Err(e) => {
                warn!(mailbox_id = %mailbox_id, error = %e, "failed to load lease for release");
                return;
            }
        };

        if lease.is_available() {
            debug!(mailbox_id = %mailbox_id, "mailbox already available");
            return;
        }

        let mut lease = lease;
        if let Err(e) = lease.release(self.clock.now()) {
            warn!(mailbox_id = %mailbox_id, error = %e, "failed to release mailbox");
            return;
        }
        if let Err(e) = self.mailbox_store.update(lease).await {
            warn!(mailbox_id = %mailbox_id, error = %e, "failed to persist mailbox release");
        } else {
            debug!(mailbox_id = %mailbox_id, "released mailbox");
        }
    }
}
