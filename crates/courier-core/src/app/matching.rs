//! MatchingEngine - メールと待ち受け要求の突き合わせ
//!
//! # 選択規則
//! 1. メールの mailbox から address を引き、その address の Pending 要求を集める
//! 2. 0 件なら不一致（メールは未処理のまま残す — 後から登録される要求に備える）
//! 3. 1 件ならそれ
//! 4. 複数件なら smart match: service_name が差出人 or 件名に（大文字小文字を
//!    無視して）部分一致する最初の要求。どれにも一致しなければ FIFO
//!    （created_at が最古の要求）に倒す
//!
//! # 抽出後の扱い
//! - 値が取れたら要求を complete、メールを処理済みにする
//! - 要求は決まったが値が取れなかった場合、メールだけ処理済みにして
//!   要求は Pending のまま残す（同じ address の次のメールに賭ける）

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{CourierError, Email, ExtractionKind, WaitRequest, WaitRequestId};
use crate::ports::{Clock, EmailStore, Extractor, MailboxLeaseStore, WaitRequestStore};

/// 1 通のメールを処理した結果
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// 対応する Pending 要求がない（メールは未処理のまま）
    Unmatched,

    /// 要求は決まったが本文から値が取れなかった（メールは消費済み、要求は Pending）
    ExtractedNothing { request_id: WaitRequestId },

    /// 抽出成功（要求は Completed で保存済み）
    Completed {
        request: WaitRequest,
        kind: ExtractionKind,
        value: String,
        received_at: DateTime<Utc>,
    },
}

/// MatchingEngine はメールを要求に結び付けて値を抽出する
pub struct MatchingEngine {
    email_store: Arc<dyn EmailStore>,
    wait_store: Arc<dyn WaitRequestStore>,
    mailbox_store: Arc<dyn MailboxLeaseStore>,
    extractor: Arc<dyn Extractor>,
    clock: Arc<dyn Clock>,
}

impl MatchingEngine {
    pub fn new(
        email_store: Arc<dyn EmailStore>,
        wait_store: Arc<dyn WaitRequestStore>,
        mailbox_store: Arc<dyn MailboxLeaseStore>,
        extractor: Arc<dyn Extractor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            email_store,
            wait_store,
            mailbox_store,
            extractor,
            clock,
        }
    }

    /// メール 1 通を突き合わせて処理する
    pub async fn process_email(&self, mut email: Email) -> Result<MatchOutcome, CourierError> {
        let Some(mut request) = self.resolve_request(&email).await? else {
            debug!(message_id = %email.message_id, "no pending request for this mail");
            return Ok(MatchOutcome::Unmatched);
        };

        let extraction = match self.extractor.extract(email.body()).await {
            Ok(extraction) => extraction,
            Err(e) => {
                // extractor の失敗は「取れなかった」と同じ扱い
                warn!(
                    message_id = %email.message_id,
                    request_id = %request.id,
                    error = %e,
                    "extraction failed"
                );
                crate::domain::ExtractionResult::unknown()
            }
        };

        if !extraction.is_successful() {
            email.mark_processed()?;
            self.email_store.update(email).await?;
            debug!(request_id = %request.id, "nothing extracted, request stays pending");
            return Ok(MatchOutcome::ExtractedNothing {
                request_id: request.id,
            });
        }

        // is_successful が true なら value は必ずある
        let value = extraction
            .value()
            .ok_or_else(|| CourierError::Store("successful extraction without value".into()))?
            .to_string();
        let kind = extraction.kind;
        let received_at = email.received_at;

        request.complete(value.clone(), self.clock.now())?;
        self.wait_store.update(request.clone()).await?;

        email.mark_processed()?;
        self.email_store.update(email).await?;

        info!(
            request_id = %request.id,
            service = %request.service_name,
            kind = %kind.as_str(),
            "extracted value, request completed"
        );
        Ok(MatchOutcome::Completed {
            request,
            kind,
            value,
            received_at,
        })
    }

    /// このメールが応えるべき Pending 要求を選ぶ
    async fn resolve_request(&self, email: &Email) -> Result<Option<WaitRequest>, CourierError> {
        let Some(lease) = self.mailbox_store.get(email.mailbox_id).await? else {
            warn!(mailbox_id = %email.mailbox_id, "mail references unknown mailbox");
            return Ok(None);
        };

        // created_at 昇順で返ってくる（FIFO fallback の前提）
        let pending = self.wait_store.list_pending_by_address(&lease.address).await?;
        if pending.is_empty() {
            return Ok(None);
        }
        if pending.len() == 1 {
            return Ok(pending.into_iter().next());
        }

        let from = email.from_address.to_lowercase();
        let subject = email.subject.to_lowercase();
        let smart = pending.iter().position(|r| {
            let service = r.service_name.to_lowercase();
            from.contains(&service) || subject.contains(&service)
        });

        let index = match smart {
            Some(index) => {
                debug!(service = %pending[index].service_name, "smart match on sender/subject");
                index
            }
            None => {
                debug!("no service name matched, falling back to oldest request");
                0
            }
        };
        Ok(Some(pending[index].clone()))
    }
}
