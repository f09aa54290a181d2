//! RegisterWait - 待ち受け登録コマンド
//!
//! # フロー
//! 1. 入力検証（address / service 非空、callback は http(s)）
//! 2. address で lease を検索（なければ `MailboxNotFound`）
//! 3. occupy → update（ここが同一 address の並行登録に対する直列化点）
//! 4. Pending な WaitRequest を作成して保存
//!
//! update が `VersionConflict` を返した場合は lease を読み直して occupy を
//! やり直す（上限あり）。別 writer が先に占有していれば `AlreadyOccupied` が
//! 同期的に呼び出し元へ返る（409 相当）。

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{CourierError, WaitRequest};
use crate::ports::{Clock, IdGenerator, MailboxLeaseStore, WaitRequestStore};

/// occupy の version 競合をリロードしてやり直す回数の上限
const OCCUPY_RETRIES: usize = 3;

/// 登録コマンド
#[derive(Debug, Clone)]
pub struct RegisterWaitCommand {
    pub address: String,
    pub service_name: String,
    pub callback_url: String,
}

impl RegisterWaitCommand {
    fn validate(&self) -> Result<(), CourierError> {
        if self.address.trim().is_empty() {
            return Err(CourierError::Validation("address cannot be empty".into()));
        }
        if self.service_name.trim().is_empty() {
            return Err(CourierError::Validation(
                "service name cannot be empty".into(),
            ));
        }
        if !self.callback_url.starts_with("http://") && !self.callback_url.starts_with("https://")
        {
            return Err(CourierError::Validation(format!(
                "callback url must be http(s): {}",
                self.callback_url
            )));
        }
        Ok(())
    }
}

/// RegisterWaitHandler は登録コマンドを処理
pub struct RegisterWaitHandler {
    mailbox_store: Arc<dyn MailboxLeaseStore>,
    wait_store: Arc<dyn WaitRequestStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl RegisterWaitHandler {
    pub fn new(
        mailbox_store: Arc<dyn MailboxLeaseStore>,
        wait_store: Arc<dyn WaitRequestStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mailbox_store,
            wait_store,
            ids,
            clock,
        }
    }

    pub async fn handle(&self, cmd: RegisterWaitCommand) -> Result<WaitRequest, CourierError> {
        cmd.validate()?;
        info!(address = %cmd.address, service = %cmd.service_name, "registering wait request");

        let lease = self.occupy_lease(&cmd).await?;

        let request = WaitRequest::new(
            self.ids.new_wait_request_id(),
            lease.id,
            lease.address.clone(),
            cmd.service_name.clone(),
            cmd.callback_url.clone(),
            self.clock.now(),
        );

        if let Err(e) = self.wait_store.add(request.clone()).await {
            // 要求が保存できなかったら lease を戻しておく（best-effort）
            warn!(address = %cmd.address, error = %e, "wait request add failed, releasing lease");
            self.release_best_effort(lease.id).await;
            return Err(e);
        }

        info!(request_id = %request.id, address = %cmd.address, "wait request created");
        Ok(request)
    }

    /// occupy → update を version 競合に備えてリトライ付きで行う
    async fn occupy_lease(
        &self,
        cmd: &RegisterWaitCommand,
    ) -> Result<crate::domain::MailboxLease, CourierError> {
        let mut last_err = None;
        for _ in 0..OCCUPY_RETRIES {
            let mut lease = self
                .mailbox_store
                .get_by_address(&cmd.address)
                .await?
                .ok_or_else(|| CourierError::MailboxNotFound(cmd.address.clone()))?;

            lease.occupy(&cmd.service_name, self.clock.now())?;

            match self.mailbox_store.update(lease.clone()).await {
                Ok(()) => return Ok(lease),
                Err(e @ CourierError::VersionConflict { .. }) => {
                    // 別 writer と競合した。読み直すと相手が占有済みなら
                    // occupy 側が AlreadyOccupied を返す。
                    warn!(address = %cmd.address, "lease version conflict, reloading");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| CourierError::Store("occupy retries exhausted".into())))
    }

    async fn release_best_effort(&self, id: crate::domain::MailboxId) {
        match self.mailbox_store.get(id).await {
            Ok(Some(mut lease)) => {
                if lease.release(self.clock.now()).is_ok()
                    && let Err(e) = self.mailbox_store.update(lease).await
                {
                    warn!(mailbox_id = %id, error = %e, "failed to release lease");
                }
            }
            Ok(None) => warn!(mailbox_id = %id, "mailbox not found for release"),
            Err(e) => warn!(mailbox_id = %id, error = %e, "failed to load lease for release"),
        }
    }
}
