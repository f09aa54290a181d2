//! In-memory store implementations (development / tests).
//!
//! # 実装詳細
//! - 各 store は `tokio::sync::Mutex<HashMap>` で状態を持つ
//! - `update` は version 検査（不一致なら `VersionConflict`、保存時に +1）
//! - address / message_id の一意性もここで強制する
//!
//! ロックは各メソッド内で完結する（ロックを跨いで await しない）。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    CourierError, Email, EmailId, LeaseStatus, MailboxId, MailboxLease, WaitRequest,
    WaitRequestId, WaitStatus,
};
use crate::ports::{EmailStore, LeasePage, MailboxLeaseStore, WaitRequestStore};

fn check_version(entity: &'static str, expected: u64, found: u64) -> Result<(), CourierError> {
    if expected != found {
        return Err(CourierError::VersionConflict {
            entity,
            expected,
            found,
        });
    }
    Ok(())
}

// ========================================
// MailboxLeaseStore
// ========================================

/// InMemoryMailboxStore は lease の開発用 store
#[derive(Default)]
pub struct InMemoryMailboxStore {
    leases: Arc<Mutex<HashMap<MailboxId, MailboxLease>>>,
}

impl InMemoryMailboxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailboxLeaseStore for InMemoryMailboxStore {
    async fn add(&self, lease: MailboxLease) -> Result<(), CourierError> {
        let mut leases = self.leases.lock().await;
        if leases.values().any(|l| l.address == lease.address) {
            return Err(CourierError::Validation(format!(
                "mailbox address already registered: {}",
                lease.address
            )));
        }
        leases.insert(lease.id, lease);
        Ok(())
    }

    async fn get(&self, id: MailboxId) -> Result<Option<MailboxLease>, CourierError> {
        let leases = self.leases.lock().await;
        Ok(leases.get(&id).cloned())
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<MailboxLease>, CourierError> {
        let leases = self.leases.lock().await;
        Ok(leases.values().find(|l| l.address == address).cloned())
    }

    async fn list_all(&self) -> Result<Vec<MailboxLease>, CourierError> {
        let leases = self.leases.lock().await;
        let mut all: Vec<_> = leases.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn list_filtered(
        &self,
        service: Option<&str>,
        status: Option<LeaseStatus>,
        page: usize,
        limit: usize,
    ) -> Result<LeasePage, CourierError> {
        let leases = self.leases.lock().await;
        let mut items: Vec<_> = leases
            .values()
            .filter(|l| service.is_none_or(|s| l.occupied_by.as_deref() == Some(s)))
            .filter(|l| status.is_none_or(|s| l.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));

        let total = items.len();
        let page = page.max(1);
        let items = items
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();
        Ok(LeasePage { items, total })
    }

    async fn update(&self, mut lease: MailboxLease) -> Result<(), CourierError> {
        let mut leases = self.leases.lock().await;
        let current = leases
            .get(&lease.id)
            .ok_or_else(|| CourierError::MailboxNotFound(lease.address.clone()))?;
        check_version("MailboxLease", lease.version, current.version)?;
        lease.version += 1;
        leases.insert(lease.id, lease);
        Ok(())
    }
}

// ========================================
// WaitRequestStore
// ========================================

/// InMemoryWaitRequestStore は wait request の開発用 store
#[derive(Default)]
pub struct InMemoryWaitRequestStore {
    requests: Arc<Mutex<HashMap<WaitRequestId, WaitRequest>>>,
}

impl InMemoryWaitRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WaitRequestStore for InMemoryWaitRequestStore {
    async fn add(&self, request: WaitRequest) -> Result<(), CourierError> {
        let mut requests = self.requests.lock().await;
        requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: WaitRequestId) -> Result<Option<WaitRequest>, CourierError> {
        let requests = self.requests.lock().await;
        Ok(requests.get(&id).cloned())
    }

    async fn list_pending_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<WaitRequest>, CourierError> {
        let requests = self.requests.lock().await;
        let mut pending: Vec<_> = requests
            .values()
            .filter(|r| r.address == address && r.status == WaitStatus::Pending)
            .cloned()
            .collect();
        // created_at 昇順（FIFO fallback の前提）
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn update(&self, mut request: WaitRequest) -> Result<(), CourierError> {
        let mut requests = self.requests.lock().await;
        let current = requests
            .get(&request.id)
            .ok_or(CourierError::RequestNotFound(request.id))?;
        check_version("WaitRequest", request.version, current.version)?;
        request.version += 1;
        requests.insert(request.id, request);
        Ok(())
    }
}

// ========================================
// EmailStore
// ========================================

/// InMemoryEmailStore はメールの開発用 store
#[derive(Default)]
pub struct InMemoryEmailStore {
    emails: Arc<Mutex<HashMap<EmailId, Email>>>,
}

impl InMemoryEmailStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmailStore for InMemoryEmailStore {
    async fn add(&self, email: Email) -> Result<(), CourierError> {
        let mut emails = self.emails.lock().await;
        if emails.values().any(|e| e.message_id == email.message_id) {
            return Err(CourierError::DuplicateMessageId(email.message_id));
        }
        emails.insert(email.id, email);
        Ok(())
    }

    async fn get(&self, id: EmailId) -> Result<Option<Email>, CourierError> {
        let emails = self.emails.lock().await;
        Ok(emails.get(&id).cloned())
    }

    async fn exists_by_message_id(&self, message_id: &str) -> Result<bool, CourierError> {
        let emails = self.emails.lock().await;
        Ok(emails.values().any(|e| e.message_id == message_id))
    }

    async fn list_unprocessed(&self, limit: usize) -> Result<Vec<Email>, CourierError> {
        let emails = self.emails.lock().await;
        let mut unprocessed: Vec<_> = emails
            .values()
            .filter(|e| !e.is_processed)
            .cloned()
            .collect();
        unprocessed.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)));
        unprocessed.truncate(limit);
        Ok(unprocessed)
    }

    async fn update(&self, mut email: Email) -> Result<(), CourierError> {
        let mut emails = self.emails.lock().await;
        let current = emails
            .get(&email.id)
            .ok_or(CourierError::EmailNotFound(email.id))?;
        check_version("Email", email.version, current.version)?;
        email.version += 1;
        emails.insert(email.id, email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    use crate::domain::ParsedEmail;

    fn lease(address: &str) -> MailboxLease {
        MailboxLease::new(MailboxId::from_ulid(Ulid::new()), address, Utc::now()).unwrap()
    }

    fn email(message_id: &str, mailbox_id: MailboxId) -> Email {
        Email::from_parsed(
            EmailId::from_ulid(Ulid::new()),
            mailbox_id,
            ParsedEmail {
                message_id: message_id.to_string(),
                from_address: "noreply@openai.com".to_string(),
                subject: "code".to_string(),
                body_text: Some("123456".to_string()),
                body_html: None,
                received_at: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn stale_version_update_is_rejected() {
        let store = InMemoryMailboxStore::new();
        let lease = lease("a@x.com");
        let id = lease.id;
        store.add(lease).await.unwrap();

        // 2 人の writer が同じ version を読む
        let mut first = store.get(id).await.unwrap().unwrap();
        let mut second = store.get(id).await.unwrap().unwrap();

        first.occupy("openai", Utc::now()).unwrap();
        store.update(first).await.unwrap();

        // 2 人目は stale（version 0）なので拒否される
        second.occupy("claude", Utc::now()).unwrap();
        let err = store.update(second).await.unwrap_err();
        assert!(matches!(err, CourierError::VersionConflict { .. }));

        // 勝者の書き込みは残る
        let current = store.get(id).await.unwrap().unwrap();
        assert_eq!(current.occupied_by.as_deref(), Some("openai"));
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn duplicate_message_id_never_produces_two_rows() {
        let store = InMemoryEmailStore::new();
        let mailbox_id = MailboxId::from_ulid(Ulid::new());

        store.add(email("<m1@mx>", mailbox_id)).await.unwrap();
        let err = store.add(email("<m1@mx>", mailbox_id)).await.unwrap_err();
        assert!(matches!(err, CourierError::DuplicateMessageId(_)));

        assert!(store.exists_by_message_id("<m1@mx>").await.unwrap());
        assert_eq!(store.list_unprocessed(100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unprocessed_emails_come_back_in_received_order() {
        let store = InMemoryEmailStore::new();
        let mailbox_id = MailboxId::from_ulid(Ulid::new());

        let mut newer = email("<new@mx>", mailbox_id);
        newer.received_at = Utc::now();
        let mut older = email("<old@mx>", mailbox_id);
        older.received_at = newer.received_at - chrono::Duration::minutes(5);

        store.add(newer).await.unwrap();
        store.add(older).await.unwrap();

        let listed = store.list_unprocessed(100).await.unwrap();
        assert_eq!(listed[0].message_id, "<old@mx>");
        assert_eq!(listed[1].message_id, "<new@mx>");
    }

    #[tokio::test]
    async fn list_filtered_paginates_and_reports_total() {
        let store = InMemoryMailboxStore::new();
        for i in 0..5 {
            let mut l = lease(&format!("m{i}@x.com"));
            if i < 3 {
                l.occupy("openai", Utc::now()).unwrap();
            }
            store.add(l).await.unwrap();
        }

        let page = store
            .list_filtered(Some("openai"), Some(LeaseStatus::Occupied), 1, 2)
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);

        let page2 = store
            .list_filtered(Some("openai"), Some(LeaseStatus::Occupied), 2, 2)
            .await
            .unwrap();
        assert_eq!(page2.items.len(), 1);
    }

    #[tokio::test]
    async fn pending_requests_are_fifo_ordered() {
        let store = InMemoryWaitRequestStore::new();
        let mailbox_id = MailboxId::from_ulid(Ulid::new());
        let t0 = Utc::now();

        for (i, service) in ["claude", "openai", "github"].iter().enumerate() {
            let req = WaitRequest::new(
                WaitRequestId::from_ulid(Ulid::new()),
                mailbox_id,
                "a@x.com",
                *service,
                "https://consumer.example/hook",
                t0 + chrono::Duration::seconds(i as i64),
            );
            store.add(req).await.unwrap();
        }

        let pending = store.list_pending_by_address("a@x.com").await.unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].service_name, "claude");
        assert_eq!(pending[2].service_name, "github");
    }
}
