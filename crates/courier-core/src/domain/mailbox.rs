//! MailboxLease - ポーリング対象の受信箱 1 件分の状態
//!
//! # 状態遷移
//! - available: どのサービスにも占有されていない
//! - occupied: 1 つのサービスが占有中（occupied_by に記録）
//!
//! Lease は排他です。同時に参照できる Pending な WaitRequest は最大 1 件。
//! すべての遷移はメソッド経由（precondition に反する呼び出しはエラー）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CourierError;
use super::ids::MailboxId;

/// Lease の占有状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    Available,
    Occupied,
}

/// MailboxLease はシステムがポーリングを許可された受信箱
///
/// # Invariant
/// `occupied_by.is_some()` iff `status == Occupied`
///
/// `version` は楽観ロック用のカウンタ。store の update が検査・加算する。
#[derive(Debug, Clone)]
pub struct MailboxLease {
    pub id: MailboxId,
    pub address: String,
    pub status: LeaseStatus,
    pub occupied_by: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MailboxLease {
    /// 新しい available な lease を作成
    pub fn new(
        id: MailboxId,
        address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CourierError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(CourierError::Validation(
                "mailbox address cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            address,
            status: LeaseStatus::Available,
            occupied_by: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// サービスによる占有を記録
    ///
    /// すでに占有されている場合は `AlreadyOccupied`（first writer wins、
    /// 黙ってキューイングはしない）。
    pub fn occupy(
        &mut self,
        service: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), CourierError> {
        if self.status == LeaseStatus::Occupied {
            return Err(CourierError::AlreadyOccupied {
                address: self.address.clone(),
                service: self.occupied_by.clone().unwrap_or_default(),
            });
        }
        self.status = LeaseStatus::Occupied;
        self.occupied_by = Some(service.into());
        self.updated_at = now;
        Ok(())
    }

    /// 占有を解除
    ///
    /// 占有されていない場合は `NotOccupied`。防御的に release する
    /// 呼び出し元はこれを no-op として扱う（エラー扱いにしない）。
    pub fn release(&mut self, now: DateTime<Utc>) -> Result<(), CourierError> {
        if self.status == LeaseStatus::Available {
            return Err(CourierError::NotOccupied(self.id));
        }
        self.status = LeaseStatus::Available;
        self.occupied_by = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.status == LeaseStatus::Available
    }

    pub fn is_occupied(&self) -> bool {
        self.status == LeaseStatus::Occupied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn lease() -> MailboxLease {
        MailboxLease::new(MailboxId::from_ulid(Ulid::new()), "a@x.com", Utc::now()).unwrap()
    }

    #[test]
    fn new_lease_is_available() {
        let lease = lease();
        assert!(lease.is_available());
        assert_eq!(lease.occupied_by, None);
        assert_eq!(lease.version, 0);
    }

    #[test]
    fn empty_address_is_rejected() {
        let err = MailboxLease::new(MailboxId::from_ulid(Ulid::new()), "  ", Utc::now())
            .unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));
    }

    #[test]
    fn occupy_sets_service_and_status() {
        let mut lease = lease();
        lease.occupy("openai", Utc::now()).unwrap();

        assert!(lease.is_occupied());
        assert_eq!(lease.occupied_by.as_deref(), Some("openai"));
    }

    #[test]
    fn occupy_twice_fails_and_reports_holder() {
        let mut lease = lease();
        lease.occupy("openai", Utc::now()).unwrap();

        let err = lease.occupy("claude", Utc::now()).unwrap_err();
        match err {
            CourierError::AlreadyOccupied { service, .. } => assert_eq!(service, "openai"),
            other => panic!("expected AlreadyOccupied, got {other:?}"),
        }
        // first writer wins: 占有者は変わらない
        assert_eq!(lease.occupied_by.as_deref(), Some("openai"));
    }

    #[test]
    fn release_clears_occupation() {
        let mut lease = lease();
        lease.occupy("openai", Utc::now()).unwrap();
        lease.release(Utc::now()).unwrap();

        assert!(lease.is_available());
        assert_eq!(lease.occupied_by, None);
    }

    #[test]
    fn release_when_available_fails() {
        let mut lease = lease();
        let err = lease.release(Utc::now()).unwrap_err();
        assert!(matches!(err, CourierError::NotOccupied(_)));
    }
}
