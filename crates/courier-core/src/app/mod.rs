//! Application services - ユースケースの実装
//!
//! # 構成
//! - register / cancel: 消費者からのコマンド
//! - poller: 受信箱の巡回（バックグラウンドループ）
//! - matching: メールと要求の突き合わせ + 抽出
//! - notify: webhook 配送（リトライの所有者）
//! - sweep: matching と notify を束ねる一括処理
//! - status: 読み取り専用の問い合わせ

pub mod cancel;
pub mod matching;
pub mod notify;
pub mod poller;
pub mod register;
pub mod status;
pub mod sweep;

pub use self::cancel::CancelWaitHandler;
pub use self::matching::{MatchOutcome, MatchingEngine};
pub use self::notify::{DeliveryReport, RetrySchedule, WebhookDispatcher};
pub use self::poller::{CycleStats, PollerConfig, PollingScheduler};
pub use self::register::{RegisterWaitCommand, RegisterWaitHandler};
pub use self::status::{CodeStatus, StatusQuery};
pub use self::sweep::{DEFAULT_SWEEP_LIMIT, EmailProcessor, SweepStats};
