//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（ストレージ, IMAP, LLM, 消費者の HTTP endpoint）
//! へのインターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 3 つの store（lease / wait request / email）が状態の正本
//! - すべての update は楽観ロック（version 検査）を要求する
//! - fetcher / extractor / sender は外部協力者（mock で差し替え可能）

pub mod clock;
pub mod email_store;
pub mod extractor;
pub mod id_generator;
pub mod mail_fetcher;
pub mod mailbox_store;
pub mod wait_store;
pub mod webhook_sender;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::email_store::EmailStore;
pub use self::extractor::Extractor;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::mail_fetcher::{FetchError, MailFetcher};
pub use self::mailbox_store::{LeasePage, MailboxLeaseStore};
pub use self::wait_store::WaitRequestStore;
pub use self::webhook_sender::{SendError, WebhookSender};
