//! Port implementations.
//!
//! - memory: in-memory store 群（開発・テスト用）
//! - http_sender: reqwest による webhook 送信

pub mod http_sender;
pub mod memory;

pub use self::http_sender::HttpWebhookSender;
pub use self::memory::{InMemoryEmailStore, InMemoryMailboxStore, InMemoryWaitRequestStore};
