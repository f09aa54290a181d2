//! PollingScheduler - メール巡回スケジューラ
//!
//! # フロー
//! 1. start 直後に 1 サイクル実行、以後 interval ごとに繰り返す
//! 2. 各サイクルで lease store から全メールボックスを再取得（動的発見 —
//!    サイクルを跨いでキャッシュしない）
//! 3. メールボックスごとに独立タスクを spawn、Semaphore で同時 fetch 数を制限
//! 4. 各タスクは per_mailbox_timeout の deadline 付き。遅い/壊れた受信箱が
//!    他を道連れにしない
//! 5. メッセージ単位で dedup（exists_by_message_id）してから保存。1 通の失敗は
//!    同じバッチの残りを止めない
//!
//! # 停止
//! - stop は watch channel で通知し、実行中サイクルの future を drop する
//!   （JoinSet の子タスクは次の await 点で協調的にキャンセルされる）
//! - start/stop はどちらも冪等

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::domain::{CourierError, Email, MailboxLease, ParsedEmail};
use crate::ports::{Clock, EmailStore, FetchError, IdGenerator, MailFetcher, MailboxLeaseStore};

/// スケジューラ設定
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// サイクル間隔
    pub interval: Duration,

    /// 同時に走らせる fetch の上限（Semaphore のサイズ）
    pub max_concurrent_fetches: usize,

    /// 1 メールボックスあたりの deadline
    pub per_mailbox_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_concurrent_fetches: 10,
            per_mailbox_timeout: Duration::from_secs(30),
        }
    }
}

/// 1 サイクルの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub mailboxes: usize,
    pub ok: usize,
    pub errors: usize,
    pub timeouts: usize,
    pub new_emails: usize,
}

/// メールボックス 1 件分の結果
enum FetchOutcome {
    Saved(usize),
    Error,
    Timeout,
}

struct RunningLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// PollingScheduler は全 lease の受信箱を巡回して Email store を最新に保つ
pub struct PollingScheduler {
    mailbox_store: Arc<dyn MailboxLeaseStore>,
    fetcher: Arc<dyn MailFetcher>,
    email_store: Arc<dyn EmailStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
    running: Mutex<Option<RunningLoop>>,
}

impl PollingScheduler {
    pub fn new(
        mailbox_store: Arc<dyn MailboxLeaseStore>,
        fetcher: Arc<dyn MailFetcher>,
        email_store: Arc<dyn EmailStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: PollerConfig,
    ) -> Self {
        Self {
            mailbox_store,
            fetcher,
            email_store,
            ids,
            clock,
            config,
            running: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// スケジューラを起動（既に起動済みなら no-op）
    pub async fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("polling scheduler already running");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let this = Arc::clone(self);

        let join = tokio::spawn(async move {
            loop {
                // サイクル実行中も shutdown と競合させる。shutdown 側が勝つと
                // サイクル future は drop され、子タスクは協調的に止まる。
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    stats = this.run_cycle() => {
                        debug!(?stats, "polling cycle finished");
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(this.config.interval) => {}
                }
            }
        });

        *running = Some(RunningLoop { shutdown_tx, join });
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_concurrent = self.config.max_concurrent_fetches,
            timeout_secs = self.config.per_mailbox_timeout.as_secs(),
            "mail polling scheduler started"
        );
    }

    /// スケジューラを停止（未起動なら no-op）
    ///
    /// ループの終了を観測してから返る。
    pub async fn stop(&self) {
        let Some(run) = self.running.lock().await.take() else {
            debug!("polling scheduler not running");
            return;
        };

        // receiver が既に落ちていても気にしない
        let _ = run.shutdown_tx.send(true);
        if let Err(e) = run.join.await {
            warn!(error = %e, "polling loop terminated abnormally");
        }
        info!("mail polling scheduler stopped");
    }

    /// 1 サイクル実行（テストや明示的なトリガにも使う）
    pub async fn run_cycle(&self) -> CycleStats {
        let mailboxes = match self.mailbox_store.list_all().await {
            Ok(mailboxes) => mailboxes,
            Err(e) => {
                // 一覧が取れなくてもループは落とさない。次のサイクルに期待する。
                error!(error = %e, "failed to fetch mailbox list");
                return CycleStats::default();
            }
        };

        let mut stats = CycleStats {
            mailboxes: mailboxes.len(),
            ..CycleStats::default()
        };
        if mailboxes.is_empty() {
            debug!("no mailboxes configured, skipping poll");
            return stats;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches));
        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();

        for mailbox in mailboxes {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let email_store = Arc::clone(&self.email_store);
            let ids = Arc::clone(&self.ids);
            let clock = Arc::clone(&self.clock);
            let timeout = self.config.per_mailbox_timeout;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return FetchOutcome::Error, // semaphore closed: shutting down
                };

                match tokio::time::timeout(
                    timeout,
                    poll_one_mailbox(fetcher, email_store, ids, clock, &mailbox),
                )
                .await
                {
                    Ok(Ok(saved)) => FetchOutcome::Saved(saved),
                    Ok(Err(e)) => {
                        error!(address = %mailbox.address, error = %e, "failed to poll mailbox");
                        FetchOutcome::Error
                    }
                    Err(_) => {
                        warn!(
                            address = %mailbox.address,
                            timeout_secs = timeout.as_secs(),
                            "timeout polling mailbox"
                        );
                        FetchOutcome::Timeout
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(FetchOutcome::Saved(saved)) => {
                    stats.ok += 1;
                    stats.new_emails += saved;
                }
                Ok(FetchOutcome::Error) => stats.errors += 1,
                Ok(FetchOutcome::Timeout) => stats.timeouts += 1,
                Err(e) => {
                    error!(error = %e, "mailbox poll task panicked");
                    stats.errors += 1;
                }
            }
        }

        info!(
            mailboxes = stats.mailboxes,
            ok = stats.ok,
            errors = stats.errors,
            timeouts = stats.timeouts,
            new_emails = stats.new_emails,
            "polling cycle complete"
        );
        stats
    }
}

/// 1 メールボックス分の fetch + dedup + 保存
async fn poll_one_mailbox(
    fetcher: Arc<dyn MailFetcher>,
    email_store: Arc<dyn EmailStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    mailbox: &MailboxLease,
) -> Result<usize, FetchError> {
    let parsed = fetcher.fetch_new_mail(mailbox).await?;

    let mut saved = 0;
    for message in parsed {
        let message_id = message.message_id.clone();
        // 1 通の失敗は同じバッチの残りを止めない
        match save_message(&*email_store, &*ids, &*clock, mailbox, message).await {
            Ok(true) => saved += 1,
            Ok(false) => {
                debug!(address = %mailbox.address, message_id = %message_id, "duplicate, skipping");
            }
            Err(e) => {
                error!(
                    address = %mailbox.address,
                    message_id = %message_id,
                    error = %e,
                    "failed to save message"
                );
            }
        }
    }
    Ok(saved)
}

/// dedup チェックして保存。保存したら true、重複スキップなら false。
async fn save_message(
    email_store: &dyn EmailStore,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    mailbox: &MailboxLease,
    message: ParsedEmail,
) -> Result<bool, CourierError> {
    if email_store.exists_by_message_id(&message.message_id).await? {
        return Ok(false);
    }

    let email = Email::from_parsed(ids.new_email_id(), mailbox.id, message, clock.now())?;
    match email_store.add(email).await {
        Ok(()) => Ok(true),
        // 並行サイクルに先を越された場合も重複扱い
        Err(CourierError::DuplicateMessageId(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;

    use crate::domain::MailboxId;
    use crate::impls::memory::{InMemoryEmailStore, InMemoryMailboxStore};
    use crate::ports::{SystemClock, UlidGenerator};
    use ulid::Ulid;

    /// テスト用 fetcher: address ごとに挙動を script できる
    enum Script {
        Messages(Vec<ParsedEmail>),
        Hang,
        Fail,
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        scripts: HashMap<String, Script>,
    }

    impl ScriptedFetcher {
        fn with(mut self, address: &str, script: Script) -> Self {
            self.scripts.insert(address.to_string(), script);
            self
        }
    }

    #[async_trait]
    impl MailFetcher for ScriptedFetcher {
        async fn fetch_new_mail(
            &self,
            mailbox: &MailboxLease,
        ) -> Result<Vec<ParsedEmail>, FetchError> {
            match self.scripts.get(&mailbox.address) {
                Some(Script::Messages(messages)) => Ok(messages.clone()),
                Some(Script::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(vec![])
                }
                Some(Script::Fail) => {
                    Err(FetchError::Connection("connection refused".to_string()))
                }
                None => Ok(vec![]),
            }
        }
    }

    fn message(id: &str) -> ParsedEmail {
        ParsedEmail {
            message_id: id.to_string(),
            from_address: "noreply@openai.com".to_string(),
            subject: "Your code".to_string(),
            body_text: Some("code: 123456".to_string()),
            body_html: None,
            received_at: Some(Utc::now()),
        }
    }

    async fn scheduler_with(
        fetcher: ScriptedFetcher,
        addresses: &[&str],
        config: PollerConfig,
    ) -> (Arc<PollingScheduler>, Arc<InMemoryEmailStore>) {
        let mailbox_store = Arc::new(InMemoryMailboxStore::new());
        for address in addresses {
            let lease =
                MailboxLease::new(MailboxId::from_ulid(Ulid::new()), *address, Utc::now())
                    .unwrap();
            mailbox_store.add(lease).await.unwrap();
        }

        let email_store = Arc::new(InMemoryEmailStore::new());
        let scheduler = Arc::new(PollingScheduler::new(
            mailbox_store,
            Arc::new(fetcher),
            email_store.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
            config,
        ));
        (scheduler, email_store)
    }

    #[tokio::test]
    async fn cycle_saves_new_mail_and_dedups_across_cycles() {
        let fetcher = ScriptedFetcher::default()
            .with("a@x.com", Script::Messages(vec![message("<m1@mx>"), message("<m2@mx>")]));
        let (scheduler, email_store) =
            scheduler_with(fetcher, &["a@x.com"], PollerConfig::default()).await;

        let stats = scheduler.run_cycle().await;
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.new_emails, 2);

        // 同じメッセージが再度返ってきても二重保存しない
        let stats = scheduler.run_cycle().await;
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.new_emails, 0);
        assert_eq!(email_store.list_unprocessed(100).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_mailbox_does_not_block_the_others() {
        let fetcher = ScriptedFetcher::default()
            .with("slow@x.com", Script::Hang)
            .with("m1@x.com", Script::Messages(vec![message("<a1@mx>")]))
            .with("m2@x.com", Script::Messages(vec![message("<a2@mx>")]))
            .with("m3@x.com", Script::Messages(vec![message("<a3@mx>")]))
            .with("m4@x.com", Script::Messages(vec![message("<a4@mx>")]));
        let (scheduler, email_store) = scheduler_with(
            fetcher,
            &["slow@x.com", "m1@x.com", "m2@x.com", "m3@x.com", "m4@x.com"],
            PollerConfig::default(),
        )
        .await;

        let stats = scheduler.run_cycle().await;

        // 4 件は保存され、ハングした 1 件は timeout として報告される
        assert_eq!(stats.mailboxes, 5);
        assert_eq!(stats.ok, 4);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.new_emails, 4);
        assert_eq!(email_store.list_unprocessed(100).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated_per_mailbox() {
        let fetcher = ScriptedFetcher::default()
            .with("bad@x.com", Script::Fail)
            .with("good@x.com", Script::Messages(vec![message("<g1@mx>")]));
        let (scheduler, _) = scheduler_with(
            fetcher,
            &["bad@x.com", "good@x.com"],
            PollerConfig::default(),
        )
        .await;

        let stats = scheduler.run_cycle().await;
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.new_emails, 1);
    }

    #[tokio::test]
    async fn empty_message_id_does_not_abort_the_batch() {
        let mut bad = message("");
        bad.message_id = String::new();
        let fetcher = ScriptedFetcher::default()
            .with("a@x.com", Script::Messages(vec![bad, message("<ok@mx>")]));
        let (scheduler, email_store) =
            scheduler_with(fetcher, &["a@x.com"], PollerConfig::default()).await;

        let stats = scheduler.run_cycle().await;
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.new_emails, 1);
        assert!(email_store.exists_by_message_id("<ok@mx>").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_and_stop_joins_the_loop() {
        let fetcher = ScriptedFetcher::default();
        let (scheduler, _) = scheduler_with(fetcher, &[], PollerConfig::default()).await;

        scheduler.start().await;
        assert!(scheduler.is_running().await);

        // 二重起動は no-op
        scheduler.start().await;
        assert!(scheduler.is_running().await);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);

        // 停止済みの stop も no-op
        scheduler.stop().await;
    }
}
