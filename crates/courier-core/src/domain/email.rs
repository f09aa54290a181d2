//! Email - 受信箱から取得した 1 通のメッセージ
//!
//! # 設計
//! - `ParsedEmail` は fetcher の出力（まだ保存されていない値オブジェクト）
//! - `Email` は保存済みのエンティティ（message_id が dedup キー）
//! - 処理済みフラグは一度だけ立てられる（二度目は `AlreadyProcessed`）

use chrono::{DateTime, Utc};

use super::errors::CourierError;
use super::ids::{EmailId, MailboxId};

/// ParsedEmail は IMAP fetch 層が返すメッセージ
///
/// `received_at` が取れなかった場合は保存時に fetch 時刻で補完される。
#[derive(Debug, Clone)]
pub struct ParsedEmail {
    pub message_id: String,
    pub from_address: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Email は保存済みのメッセージ
#[derive(Debug, Clone)]
pub struct Email {
    pub id: EmailId,
    pub mailbox_id: MailboxId,
    /// プロバイダ付与の Message-ID。store 全体で一意（dedup キー）。
    pub message_id: String,
    pub from_address: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub received_at: DateTime<Utc>,
    pub is_processed: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Email {
    /// ParsedEmail から Email を構築
    ///
    /// message_id が空の場合は `Validation`（dedup キーとして使えないため）。
    pub fn from_parsed(
        id: EmailId,
        mailbox_id: MailboxId,
        parsed: ParsedEmail,
        now: DateTime<Utc>,
    ) -> Result<Self, CourierError> {
        if parsed.message_id.trim().is_empty() {
            return Err(CourierError::Validation(
                "message id cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            mailbox_id,
            message_id: parsed.message_id,
            from_address: parsed.from_address,
            subject: parsed.subject,
            body_text: parsed.body_text,
            body_html: parsed.body_html,
            received_at: parsed.received_at.unwrap_or(now),
            is_processed: false,
            version: 0,
            created_at: now,
        })
    }

    /// 本文を取得（text 優先、なければ html、どちらもなければ空文字列）
    pub fn body(&self) -> &str {
        match (&self.body_text, &self.body_html) {
            (Some(text), _) if !text.is_empty() => text,
            (_, Some(html)) if !html.is_empty() => html,
            _ => "",
        }
    }

    /// 処理済みフラグを立てる
    ///
    /// 既に処理済みなら `AlreadyProcessed`（黙って無視しない — 二重処理は
    /// 呼び出し側のバグか競合なので、検出できるようにする）。
    pub fn mark_processed(&mut self) -> Result<(), CourierError> {
        if self.is_processed {
            return Err(CourierError::AlreadyProcessed(self.id));
        }
        self.is_processed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn parsed(message_id: &str) -> ParsedEmail {
        ParsedEmail {
            message_id: message_id.to_string(),
            from_address: "noreply@openai.com".to_string(),
            subject: "Your verification code".to_string(),
            body_text: Some("Your code is 123456".to_string()),
            body_html: Some("<p>Your code is 123456</p>".to_string()),
            received_at: None,
        }
    }

    fn email(parsed: ParsedEmail) -> Result<Email, CourierError> {
        Email::from_parsed(
            EmailId::from_ulid(Ulid::new()),
            MailboxId::from_ulid(Ulid::new()),
            parsed,
            Utc::now(),
        )
    }

    #[test]
    fn missing_received_at_falls_back_to_now() {
        let mail = email(parsed("<m1@mx>")).unwrap();
        assert!(!mail.is_processed);
        // received_at は補完される
        assert!(mail.received_at <= Utc::now());
    }

    #[test]
    fn empty_message_id_is_rejected() {
        let err = email(parsed("")).unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));
    }

    #[test]
    fn body_prefers_text_over_html() {
        let mail = email(parsed("<m1@mx>")).unwrap();
        assert_eq!(mail.body(), "Your code is 123456");
    }

    #[test]
    fn body_falls_back_to_html_then_empty() {
        let mut p = parsed("<m1@mx>");
        p.body_text = None;
        let mail = email(p).unwrap();
        assert_eq!(mail.body(), "<p>Your code is 123456</p>");

        let mut p = parsed("<m2@mx>");
        p.body_text = None;
        p.body_html = None;
        let mail = email(p).unwrap();
        assert_eq!(mail.body(), "");
    }

    #[test]
    fn mark_processed_is_one_shot() {
        let mut mail = email(parsed("<m1@mx>")).unwrap();
        mail.mark_processed().unwrap();
        assert!(mail.is_processed);

        let err = mail.mark_processed().unwrap_err();
        assert!(matches!(err, CourierError::AlreadyProcessed(_)));
    }
}
