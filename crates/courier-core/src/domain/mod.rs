//! Domain model (IDs, entities, state machines, value objects).
//!
//! # モジュール構成
//! - ids: phantom type による強い型の ID
//! - mailbox: MailboxLease（available/occupied の排他状態機械）
//! - wait_request: WaitRequest（Pending → terminal の一方向状態機械）
//! - email: ParsedEmail / Email（message_id で dedup）
//! - extraction: ExtractionKind / ExtractionResult
//! - webhook: WebhookPayload（ワイヤ互換の JSON）
//! - errors: CourierError

pub mod email;
pub mod errors;
pub mod extraction;
pub mod ids;
pub mod mailbox;
pub mod wait_request;
pub mod webhook;

pub use self::email::{Email, ParsedEmail};
pub use self::errors::CourierError;
pub use self::extraction::{ExtractionKind, ExtractionResult};
pub use self::ids::{EmailId, Id, IdMarker, MailboxId, WaitRequestId};
pub use self::mailbox::{LeaseStatus, MailboxLease};
pub use self::wait_request::{WaitRequest, WaitStatus};
pub use self::webhook::WebhookPayload;
