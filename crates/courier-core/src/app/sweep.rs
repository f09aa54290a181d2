//! EmailProcessor - 未処理メールの一括処理
//!
//! MatchingEngine と WebhookDispatcher を束ねる層。poller が保存した
//! 未処理メールを received_at の古い順に舐め、突き合わせと配送まで進める。
//!
//! # エラー分離
//! 1 通の処理失敗は sweep 全体を止めない。失敗はログと `SweepStats.errors`
//! に計上して次へ進む。

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::app::matching::{MatchOutcome, MatchingEngine};
use crate::app::notify::WebhookDispatcher;
use crate::domain::{CourierError, EmailId};
use crate::ports::EmailStore;

/// 1 回の sweep で処理するメール数の上限
pub const DEFAULT_SWEEP_LIMIT: usize = 100;

/// 1 回の sweep の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    /// 抽出成功で要求が completed になった数
    pub completed: usize,
    /// webhook まで届いた数（completed のうち配送成功分）
    pub delivered: usize,
    pub unmatched: usize,
    /// 要求は決まったが値が取れなかった数
    pub no_value: usize,
    pub errors: usize,
}

/// EmailProcessor は未処理メールを突き合わせから配送まで進める
pub struct EmailProcessor {
    email_store: Arc<dyn EmailStore>,
    matching: Arc<MatchingEngine>,
    dispatcher: Arc<WebhookDispatcher>,
}

impl EmailProcessor {
    pub fn new(
        email_store: Arc<dyn EmailStore>,
        matching: Arc<MatchingEngine>,
        dispatcher: Arc<WebhookDispatcher>,
    ) -> Self {
        Self {
            email_store,
            matching,
            dispatcher,
        }
    }

    /// メール 1 通を処理する（明示的なトリガ用）
    pub async fn process_email(&self, email_id: EmailId) -> Result<MatchOutcome, CourierError> {
        let email = self
            .email_store
            .get(email_id)
            .await?
            .ok_or(CourierError::EmailNotFound(email_id))?;
        if email.is_processed {
            return Err(CourierError::AlreadyProcessed(email_id));
        }

        let outcome = self.matching.process_email(email).await?;
        if let MatchOutcome::Completed {
            request,
            kind,
            value,
            received_at,
        } = &outcome
        {
            // 配送の失敗は dispatcher がログと状態で記録する。ここでは
            // outcome を変えない（抽出は成功している）。
            self.dispatcher
                .notify(request, *kind, value, *received_at)
                .await?;
        }
        Ok(outcome)
    }

    /// 未処理メールを古い順に limit 件まで処理する
    pub async fn sweep(&self, limit: usize) -> Result<SweepStats, CourierError> {
        let emails = self.email_store.list_unprocessed(limit).await?;
        let mut stats = SweepStats {
            scanned: emails.len(),
            ..SweepStats::default()
        };

        for email in emails {
            let email_id = email.id;
            match self.matching.process_email(email).await {
                Ok(MatchOutcome::Completed {
                    request,
                    kind,
                    value,
                    received_at,
                }) => {
                    stats.completed += 1;
                    match self.dispatcher.notify(&request, kind, &value, received_at).await {
                        Ok(report) if report.success => stats.delivered += 1,
                        Ok(_) => {}
                        Err(e) => {
                            error!(email_id = %email_id, error = %e, "webhook dispatch error");
                            stats.errors += 1;
                        }
                    }
                }
                Ok(MatchOutcome::Unmatched) => stats.unmatched += 1,
                Ok(MatchOutcome::ExtractedNothing { .. }) => stats.no_value += 1,
                Err(e) => {
                    error!(email_id = %email_id, error = %e, "failed to process email");
                    stats.errors += 1;
                }
            }
        }

        if stats.scanned > 0 {
            info!(
                scanned = stats.scanned,
                completed = stats.completed,
                delivered = stats.delivered,
                unmatched = stats.unmatched,
                no_value = stats.no_value,
                errors = stats.errors,
                "sweep complete"
            );
        } else {
            debug!("no unprocessed mail");
        }
        Ok(stats)
    }
}
