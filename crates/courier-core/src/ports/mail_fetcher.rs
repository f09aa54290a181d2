//! MailFetcher port - IMAP fetch の抽象化
//!
//! バイトレベルの IMAP fetch/parse はこの trait の向こう側（外部協力者）。
//! core はここから `ParsedEmail` の列を受け取るだけ。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{MailboxLease, ParsedEmail};

/// fetch 失敗の分類（どちらも transient — サイクル単位でログして先へ進む）
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("auth error: {0}")]
    Auth(String),
}

/// MailFetcher は 1 つの受信箱から新着メールを取得
#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// 新着メールを返す（既読管理は fetcher 側の責務）
    async fn fetch_new_mail(
        &self,
        mailbox: &MailboxLease,
    ) -> Result<Vec<ParsedEmail>, FetchError>;
}
