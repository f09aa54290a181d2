use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Duration, sleep};

use courier_core::app::{
    CodeStatus, DEFAULT_SWEEP_LIMIT, EmailProcessor, MatchingEngine, PollerConfig,
    PollingScheduler, RegisterWaitCommand, RegisterWaitHandler, RetrySchedule, StatusQuery,
    WebhookDispatcher,
};
use courier_core::domain::{CourierError, ExtractionResult, MailboxLease, ParsedEmail, WebhookPayload};
use courier_core::impls::{InMemoryEmailStore, InMemoryMailboxStore, InMemoryWaitRequestStore};
use courier_core::ports::{
    Clock, Extractor, FetchError, IdGenerator, MailFetcher, MailboxLeaseStore, SendError,
    SystemClock, UlidGenerator, WebhookSender,
};

/// demo fetcher：最初の fetch だけ検証メールを 1 通返す
struct DemoFetcher {
    delivered: AtomicBool,
}

#[async_trait]
impl MailFetcher for DemoFetcher {
    async fn fetch_new_mail(
        &self,
        mailbox: &MailboxLease,
    ) -> Result<Vec<ParsedEmail>, FetchError> {
        if self.delivered.swap(true, Ordering::Relaxed) {
            return Ok(vec![]);
        }
        Ok(vec![ParsedEmail {
            message_id: format!("<demo-1@{}>", mailbox.address),
            from_address: "noreply@openai.com".to_string(),
            subject: "Your OpenAI verification code".to_string(),
            body_text: Some("Your verification code is 482913. It expires soon.".to_string()),
            body_html: None,
            received_at: None,
        }])
    }
}

/// demo extractor：本文中の最初の 6 桁数字を code として返す
struct DigitExtractor;

#[async_trait]
impl Extractor for DigitExtractor {
    async fn extract(&self, content: &str) -> Result<ExtractionResult, CourierError> {
        let mut run = String::new();
        for c in content.chars() {
            if c.is_ascii_digit() {
                run.push(c);
                if run.len() == 6 {
                    return Ok(ExtractionResult::code(run, 0.9));
                }
            } else {
                run.clear();
            }
        }
        Ok(ExtractionResult::unknown())
    }
}

/// demo sender：実際には送らず、payload を標準出力に出して 200 を返す
struct PrintingSender;

#[async_trait]
impl WebhookSender for PrintingSender {
    async fn send(&self, url: &str, payload: &WebhookPayload) -> Result<u16, SendError> {
        let body = serde_json::to_string_pretty(payload)
            .map_err(|e| SendError::Network(e.to_string()))?;
        println!("POST {url}\n{body}");
        Ok(200)
    }
}

#[tokio::main]
async fn main() -> Result<(), CourierError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // (A) store とポート実装を用意
    let mailbox_store = Arc::new(InMemoryMailboxStore::new());
    let wait_store = Arc::new(InMemoryWaitRequestStore::new());
    let email_store = Arc::new(InMemoryEmailStore::new());
    let clock = Arc::new(SystemClock);
    let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));

    let lease = MailboxLease::new(ids.new_mailbox_id(), "demo@courier.example", clock.now())?;
    mailbox_store.add(lease).await?;

    // (B) アプリケーションサービスを組む
    let register = RegisterWaitHandler::new(
        mailbox_store.clone(),
        wait_store.clone(),
        ids.clone(),
        clock.clone(),
    );
    let matching = Arc::new(MatchingEngine::new(
        email_store.clone(),
        wait_store.clone(),
        mailbox_store.clone(),
        Arc::new(DigitExtractor),
        clock.clone(),
    ));
    let dispatcher = Arc::new(WebhookDispatcher::new(
        Arc::new(PrintingSender),
        wait_store.clone(),
        mailbox_store.clone(),
        clock.clone(),
        RetrySchedule::default(),
    ));
    let processor = EmailProcessor::new(email_store.clone(), matching, dispatcher);
    let scheduler = Arc::new(PollingScheduler::new(
        mailbox_store,
        Arc::new(DemoFetcher {
            delivered: AtomicBool::new(false),
        }),
        email_store,
        ids,
        clock,
        PollerConfig::default(),
    ));
    let status = StatusQuery::new(wait_store);

    // (C) 待ち受けを登録してから巡回を開始
    let request = register
        .handle(RegisterWaitCommand {
            address: "demo@courier.example".to_string(),
            service_name: "openai".to_string(),
            callback_url: "https://consumer.example/hook".to_string(),
        })
        .await?;
    println!("registered wait request: {}", request.id);

    scheduler.start().await;
    sleep(Duration::from_millis(200)).await;

    // (D) 未処理メールを処理（突き合わせ → 抽出 → webhook）
    let stats = processor.sweep(DEFAULT_SWEEP_LIMIT).await?;
    println!(
        "sweep: scanned={} completed={} delivered={}",
        stats.scanned, stats.completed, stats.delivered
    );

    // (E) 結果を問い合わせる
    match status.get_code(request.id).await? {
        CodeStatus::Completed(payload) => {
            println!("code for {}: {}", request.id, payload.value)
        }
        other => println!("status: HTTP {}", other.http_status()),
    }

    scheduler.stop().await;
    Ok(())
}
