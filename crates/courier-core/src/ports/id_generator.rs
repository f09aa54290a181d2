//! IdGenerator port - ID 生成の抽象化
//!
//! IdGenerator は分散システムで使える ID を生成するためのインターフェースです。
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::ids::{EmailId, MailboxId, WaitRequestId};
use crate::ports::Clock;

/// IdGenerator は各集約の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn new_mailbox_id(&self) -> MailboxId;

    fn new_wait_request_id(&self) -> WaitRequestId;

    fn new_email_id(&self) -> EmailId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時には FixedClock で決定的な timestamp 部を得られます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn new_mailbox_id(&self) -> MailboxId {
        MailboxId::from(self.next())
    }

    fn new_wait_request_id(&self) -> WaitRequestId {
        WaitRequestId::from(self.next())
    }

    fn new_email_id(&self) -> EmailId {
        EmailId::from(self.next())
    }
}
