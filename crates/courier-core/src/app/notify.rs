//! WebhookDispatcher - 消費者 callback への配送
//!
//! # フロー
//! 1. payload を構築して検査
//! 2. 2xx が返るまで送信。失敗ごとにスケジュール通り待つ（既定 1s/5s/15s、
//!    つまり最大 4 attempt）
//! 3. 成功: lease を解放して報告
//! 4. 全滅: 要求を読み直し、まだ Pending なら Failed にする。既に terminal
//!    （通常は抽出時点で Completed 済み）なら警告ログのみ。lease はどちらでも
//!    解放する
//!
//! sender は 1 attempt = 1 POST。リトライの所有者はこの dispatcher だけ。

use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::{
    CourierError, ExtractionKind, MailboxId, WaitRequest, WebhookPayload,
};
use crate::ports::{Clock, MailboxLeaseStore, WaitRequestStore, WebhookSender};

/// リトライ間隔の列。attempt 数は `backoffs.len() + 1`。
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    backoffs: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            backoffs: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(15),
            ],
        }
    }
}

impl RetrySchedule {
    pub fn new(backoffs: Vec<Duration>) -> Self {
        Self { backoffs }
    }

    /// 初回を含めた送信回数の上限
    pub fn max_attempts(&self) -> usize {
        self.backoffs.len() + 1
    }

    /// n 回目の失敗（0 始まり）の後に待つ時間。スケジュールを使い切ったら None。
    pub fn delay_after(&self, failed_attempts: usize) -> Option<Duration> {
        self.backoffs.get(failed_attempts).copied()
    }
}

/// 配送の結果
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub success: bool,
    /// リトライ回数（0 なら初回で成功）
    pub retry_count: usize,
    /// 最後に受け取った HTTP ステータス（応答が得られなかった場合は None）
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// WebhookDispatcher は抽出結果を callback_url へ届ける
pub struct WebhookDispatcher {
    sender: Arc<dyn WebhookSender>,
    wait_store: Arc<dyn WaitRequestStore>,
    mailbox_store: Arc<dyn MailboxLeaseStore>,
    clock: Arc<dyn Clock>,
    schedule: RetrySchedule,
}

impl WebhookDispatcher {
    pub fn new(
        sender: Arc<dyn WebhookSender>,
        wait_store: Arc<dyn WaitRequestStore>,
        mailbox_store: Arc<dyn MailboxLeaseStore>,
        clock: Arc<dyn Clock>,
        schedule: RetrySchedule,
    ) -> Self {
        Self {
            sender,
            wait_store,
            mailbox_store,
            clock,
            schedule,
        }
    }

    /// 抽出結果を配送する
    ///
    /// 戻り値の Err は payload が組めなかった場合のみ。配送の失敗は
    /// `DeliveryReport::success = false` で表す。
    pub async fn notify(
        &self,
        request: &WaitRequest,
        kind: ExtractionKind,
        value: &str,
        received_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<DeliveryReport, CourierError> {
        let payload = WebhookPayload {
            request_id: request.id,
            kind,
            value: value.to_string(),
            email: request.address.clone(),
            service: request.service_name.clone(),
            received_at,
        };
        payload.validate()?;

        info!(
            request_id = %request.id,
            url = %request.callback_url,
            "sending webhook notification"
        );

        let mut last_status = None;
        let mut last_error = None;
        for attempt in 0..self.schedule.max_attempts() {
            if attempt > 0 {
                // delay_after は attempt < max_attempts の間は必ず Some
                if let Some(delay) = self.schedule.delay_after(attempt - 1) {
                    debug!(
                        request_id = %request.id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "retrying webhook"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            match self.sender.send(&request.callback_url, &payload).await {
                Ok(status) if (200..300).contains(&status) => {
                    self.release_lease(request.mailbox_id).await;
                    info!(
                        request_id = %request.id,
                        status,
                        retries = attempt,
                        "webhook delivered"
                    );
                    return Ok(DeliveryReport {
                        success: true,
                        retry_count: attempt,
                        status: Some(status),
                        error: None,
                    });
                }
                Ok(status) => {
                    warn!(request_id = %request.id, status, attempt, "webhook rejected");
                    last_status = Some(status);
                    last_error = Some(format!("HTTP {status}"));
                }
                Err(e) => {
                    warn!(request_id = %request.id, error = %e, attempt, "webhook send failed");
                    last_status = None;
                    last_error = Some(e.to_string());
                }
            }
        }

        let reason = last_error
            .clone()
            .unwrap_or_else(|| "webhook delivery failed".to_string());
        self.mark_failed_if_pending(request.id, &reason).await;
        // 失敗でも lease は塞ぎっぱなしにしない
        self.release_lease(request.mailbox_id).await;

        error!(
            request_id = %request.id,
            retries = self.schedule.max_attempts() - 1,
            reason = %reason,
            "webhook delivery exhausted"
        );
        Ok(DeliveryReport {
            success: false,
            retry_count: self.schedule.max_attempts() - 1,
            status: last_status,
            error: last_error,
        })
    }

    /// store の最新状態で判定する。まだ Pending のときだけ Failed へ落とす。
    async fn mark_failed_if_pending(&self, request_id: crate::domain::WaitRequestId, reason: &str) {
        let request = match self.wait_store.get(request_id).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                warn!(request_id = %request_id, "request disappeared before failure record");
                return;
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "failed to reload request");
                return;
            }
        };

        if !request.is_pending() {
            warn!(
                request_id = %request_id,
                status = %request.status,
                "webhook failed but request already terminal"
            );
            return;
        }

        let mut request = request;
        let failed = request
            .fail(Some(format!("Webhook failed: {reason}")), self.clock.now())
            .is_ok();
        if failed && let Err(e) = self.wait_store.update(request).await {
            warn!(request_id = %request_id, error = %e, "failed to persist failure");
        }
    }

    async fn release_lease(&self, mailbox_id: MailboxId) {
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
