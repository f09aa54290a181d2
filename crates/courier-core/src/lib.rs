//! courier-core
//!
//! Core building blocks for the Courier verification-mail relay.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, mailbox, wait_request, email, extraction, webhook, errors）
//! - **ports**: 抽象化レイヤー（MailboxLeaseStore, WaitRequestStore, EmailStore, MailFetcher, Extractor, WebhookSender, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（register, cancel, poller, matching, notify, sweep, status）
//! - **impls**: 実装（InMemory store 群、reqwest による HttpWebhookSender）
//!
//! # ライフサイクル
//! 1. 消費者が address + service + callback_url で待ち受けを登録（lease 占有）
//! 2. PollingScheduler が全受信箱を巡回して新着を保存
//! 3. EmailProcessor が未処理メールを要求に突き合わせ、値を抽出
//! 4. WebhookDispatcher が callback_url へ配送し、lease を解放

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
