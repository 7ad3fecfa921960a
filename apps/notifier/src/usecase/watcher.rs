//! # 申請ウォッチャー
//!
//! 通知メール未送信の申請を購読し、新しく追加された申請ごとに通知メールを送る。
//!
//! ## 設計方針
//!
//! - **逐次処理**: イベントは到着順に 1 件ずつ処理する。同じウォッチャー内で送信が並行することはない
//! - **Added のみ**: ステータス変更などの Modified では再送しない
//! - **少なくとも 1 回**: 送信後に送信済みフラグの書き込み前にプロセスが落ちると、
//!   再起動時の再同期で同じ申請が再び Added として届き、重複送信になる
//! - **失敗の記録**: 送信・書き込みのどちらが失敗しても `email_error` と試行日時を残し、
//!   `email_sent` は false のまま。自動リトライはしない
//! - **停止**: `watch` チャネルで停止を受け取り、処理中のイベントを終えてから購読を一度だけ解放する
//! - **異常終了の通知**: [`SubmissionWatcher::spawn`] で起動すると、停止要求なしに終了した時点で
//!   エラーを記録し、[`WatcherTask::exit_signal`] で終了を知らせる

use std::sync::Arc;

use campuswave_domain::{notification::NotificationError, submission::Submission};
use campuswave_infra::{
    InfraError,
    change_feed::{ChangeEvent, ChangeKind, SubmissionChangeFeed},
    repository::SubmissionRepository,
};
use campuswave_shared::event_log::error::{category, kind};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use super::notification::NotificationService;

/// 送信後に申請が削除されていた場合の結果メッセージ
const SUBMISSION_GONE: &str = "Submission not found";

/// 1 件の申請に対する処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 送信し、送信済みとして記録した
    Sent,
    /// 送信または記録に失敗した（申請に記録したメッセージ）
    Failed(String),
}

/// 申請ウォッチャー
pub struct SubmissionWatcher {
    feed:          Arc<dyn SubmissionChangeFeed>,
    repository:    Arc<dyn SubmissionRepository>,
    notifications: Arc<NotificationService>,
}

impl SubmissionWatcher {
    pub fn new(
        feed: Arc<dyn SubmissionChangeFeed>,
        repository: Arc<dyn SubmissionRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            feed,
            repository,
            notifications,
        }
    }

    /// 停止シグナルを受け取るかフィードが終了するまでイベントを処理する
    ///
    /// 購読の開始に失敗した場合のみエラーを返す。
    /// `shutdown` が true になるか送り手がドロップされると停止する。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), InfraError> {
        let mut subscription = self.feed.subscribe_unsent().await?;
        tracing::info!("未送信申請の購読を開始");

        if !*shutdown.borrow_and_update() {
            loop {
                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("停止シグナルを受信");
                            break;
                        }
                    }
                    event = subscription.next() => match event {
                        Some(Ok(event)) => self.handle(event).await,
                        Some(Err(e)) => {
                            tracing::error!(
                                error.category = category::INFRASTRUCTURE,
                                error.kind = kind::CHANGE_FEED,
                                span_trace = %e.span_trace(),
                                "変更フィードのエラー: {}",
                                e
                            );
                        }
                        None => {
                            tracing::warn!("変更フィードが終了");
                            break;
                        }
                    },
                }
            }
        }

        subscription.unsubscribe();
        tracing::info!("未送信申請の購読を解放");
        Ok(())
    }

    /// バックグラウンドタスクとして起動する
    pub fn spawn(self) -> WatcherTask {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = oneshot::channel();
        let requested = shutdown_rx.clone();

        let task = tokio::spawn(async move {
            let result = self.run(shutdown_rx).await;
            let stop_requested = *requested.borrow();
            match &result {
                Err(e) => tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::CHANGE_FEED,
                    span_trace = %e.span_trace(),
                    "申請ウォッチャーが異常終了: {}",
                    e
                ),
                Ok(()) if !stop_requested => tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::CHANGE_FEED,
                    "停止要求なしに申請ウォッチャーが終了"
                ),
                Ok(()) => {}
            }
            // パニック時も送り手のドロップで終了が伝わる
            let _ = exited_tx.send(());
            result.is_ok() && stop_requested
        });

        WatcherTask {
            task,
            shutdown: shutdown_tx,
            exited: Some(exited_rx),
        }
    }

    async fn handle(&self, event: ChangeEvent) {
        match event.kind {
            ChangeKind::Added => {
                self.process(&event.submission).await;
            }
            ChangeKind::Modified | ChangeKind::Removed => {
                tracing::debug!(
                    submission.id = %event.submission.id(),
                    change.kind = %event.kind,
                    "送信対象外の変更"
                );
            }
        }
    }

    /// 申請 1 件の通知メールを送り、結果を申請に記録する
    pub async fn process(&self, submission: &Submission) -> DeliveryOutcome {
        let id = submission.id();

        let failure = match self.notifications.send_admission(submission).await {
            Ok(_) => match self.repository.mark_email_sent(id).await {
                Ok(true) => {
                    tracing::info!(submission.id = %id, "送信済みとして記録");
                    return DeliveryOutcome::Sent;
                }
                Ok(false) => {
                    // 送信中に申請が削除された。記録する行がないので終わる
                    tracing::warn!(submission.id = %id, "送信済みを記録する申請が見つからない");
                    return DeliveryOutcome::Failed(SUBMISSION_GONE.to_string());
                }
                Err(e) => {
                    tracing::error!(
                        error.category = category::INFRASTRUCTURE,
                        error.kind = kind::DATABASE,
                        submission.id = %id,
                        "送信済みの記録に失敗: {}",
                        e
                    );
                    e.to_string()
                }
            },
            Err(e) => notification_message(e),
        };

        match self.repository.record_email_error(id, &failure).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(submission.id = %id, "送信エラーを記録する申請が見つからない");
            }
            Err(e) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::DATABASE,
                    submission.id = %id,
                    "送信エラーの記録に失敗: {}",
                    e
                );
            }
        }
        DeliveryOutcome::Failed(failure)
    }
}

/// ウォッチャーの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherExit {
    /// 停止要求に応じて終了した
    Requested,
    /// 購読の失敗、フィードの終了、パニックのいずれかで自ら終了した
    Unexpected,
}

/// 起動済みの申請ウォッチャー
pub struct WatcherTask {
    task:     JoinHandle<bool>,
    shutdown: watch::Sender<bool>,
    exited:   Option<oneshot::Receiver<()>>,
}

impl WatcherTask {
    /// タスクが終了した時点で完了する future を取り出す
    ///
    /// 2 回目以降に取り出した future は完了しない。
    pub fn exit_signal(&mut self) -> impl Future<Output = ()> + Send + 'static {
        let exited = self.exited.take();
        async move {
            match exited {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// 停止を要求し、購読の解放を待つ
    pub async fn stop(self) -> WatcherExit {
        // タスクが既に終了していれば受信側はない
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(true) => WatcherExit::Requested,
            Ok(false) => WatcherExit::Unexpected,
            Err(e) => {
                tracing::error!("申請ウォッチャーのタスクが失敗: {}", e);
                WatcherExit::Unexpected
            }
        }
    }
}

fn notification_message(err: NotificationError) -> String {
    match err {
        NotificationError::DeliveryFailed(msg) | NotificationError::TemplateFailed(msg) => msg,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use campuswave_domain::{
        clock::FixedClock,
        submission::{AdmissionForm, SubmissionId},
    };
    use campuswave_infra::mock::{
        MockNotificationSender,
        MockSubmissionChangeFeed,
        MockSubmissionRepository,
        RecordedWrite,
    };
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::usecase::notification::{Mailer, TemplateRenderer};

    struct Fixture {
        feed:   MockSubmissionChangeFeed,
        repo:   MockSubmissionRepository,
        sender: MockNotificationSender,
        sut:    SubmissionWatcher,
    }

    fn fixture(sender: MockNotificationSender) -> Fixture {
        let feed = MockSubmissionChangeFeed::new();
        let repo = MockSubmissionRepository::new();
        let renderer =
            TemplateRenderer::new("http://localhost:8080", Arc::new(FixedClock::new(Utc::now())))
                .unwrap();
        let mailer = Mailer::new(
            Arc::new(sender.clone()),
            vec!["admissions@campuswave.example.com".to_string()],
        );
        let service = NotificationService::new(
            renderer,
            mailer,
            "feedback@campuswave.example.com".to_string(),
        );
        let sut = SubmissionWatcher::new(
            Arc::new(feed.clone()),
            Arc::new(repo.clone()),
            Arc::new(service),
        );
        Fixture {
            feed,
            repo,
            sender,
            sut,
        }
    }

    fn sara(id: &str) -> Submission {
        Submission::new(
            SubmissionId::parse(id).unwrap(),
            AdmissionForm {
                child_name: Some("Sara".to_string()),
                grade_applying: Some("Grade 1".to_string()),
                email_to: vec!["a@b.com".to_string()],
                ..AdmissionForm::default()
            },
            Utc::now(),
        )
    }

    async fn run_until_closed(f: &Fixture) {
        f.feed.close();
        let (_tx, rx) = watch::channel(false);
        f.sut.run(rx).await.unwrap();
    }

    #[tokio::test]
    async fn added_イベントごとに1回だけ送信する() {
        let f = fixture(MockNotificationSender::new());
        let sub = sara("sub-001");
        f.repo.add_submission(sub.clone());
        f.feed.push(ChangeKind::Added, sub.clone()).await;
        f.feed.push(ChangeKind::Modified, sub.clone()).await;
        f.feed.push(ChangeKind::Removed, sub).await;

        run_until_closed(&f).await;

        let sent = f.sender.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["a@b.com".to_string()]);
        assert!(sent[0].subject.contains("Sara"));
        assert!(sent[0].subject.contains("Grade 1"));
    }

    #[tokio::test]
    async fn 到着順に逐次処理する() {
        let f = fixture(MockNotificationSender::new());
        for id in ["sub-001", "sub-002", "sub-003"] {
            f.repo.add_submission(sara(id));
            f.feed.push(ChangeKind::Added, sara(id)).await;
        }

        run_until_closed(&f).await;

        let marked: Vec<RecordedWrite> = f.repo.writes();
        assert_eq!(
            marked,
            ["sub-001", "sub-002", "sub-003"]
                .into_iter()
                .map(|id| RecordedWrite::MarkEmailSent(SubmissionId::parse(id).unwrap()))
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn 送信成功で送信済みになりエラーは残らない() {
        let f = fixture(MockNotificationSender::new());
        let sub = sara("sub-001");
        f.repo.add_submission(sub.clone());

        let outcome = f.sut.process(&sub).await;

        assert_eq!(outcome, DeliveryOutcome::Sent);
        let stored = f.repo.find("sub-001").unwrap();
        assert!(stored.email_sent());
        assert_eq!(stored.email_error(), None);
    }

    #[tokio::test]
    async fn 送信失敗はエラーを記録し未送信のまま() {
        let f = fixture(MockNotificationSender::failing("535 Authentication failed"));
        let sub = sara("sub-001");
        f.repo.add_submission(sub.clone());

        let outcome = f.sut.process(&sub).await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed("535 Authentication failed".to_string())
        );
        let stored = f.repo.find("sub-001").unwrap();
        assert!(!stored.email_sent());
        assert_eq!(stored.email_error(), Some("535 Authentication failed"));
        assert_eq!(
            f.repo.writes(),
            vec![RecordedWrite::RecordEmailError(
                SubmissionId::parse("sub-001").unwrap(),
                "535 Authentication failed".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn 送信済みの記録に失敗したらエラーを記録する() {
        let f = fixture(MockNotificationSender::new());
        let sub = sara("sub-001");
        f.repo.add_submission(sub.clone());
        f.repo.fail_mark_email_sent();

        let outcome = f.sut.process(&sub).await;

        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert_eq!(f.sender.sent_emails().len(), 1);
        let stored = f.repo.find("sub-001").unwrap();
        assert!(!stored.email_sent());
        assert!(stored.email_error().is_some());
    }

    #[tokio::test]
    async fn 送信中に申請が削除されていたら送信済みにしない() {
        let f = fixture(MockNotificationSender::new());
        let sub = sara("sub-001");

        let outcome = f.sut.process(&sub).await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed("Submission not found".to_string())
        );
        assert_eq!(f.sender.sent_emails().len(), 1);
        assert_eq!(
            f.repo.writes(),
            vec![RecordedWrite::MarkEmailSent(
                SubmissionId::parse("sub-001").unwrap()
            )]
        );
    }

    #[tokio::test]
    async fn フィードのエラー後も処理を続ける() {
        let f = fixture(MockNotificationSender::new());
        let sub = sara("sub-001");
        f.repo.add_submission(sub.clone());
        f.feed.push_error(InfraError::unexpected("listen connection lost")).await;
        f.feed.push(ChangeKind::Added, sub).await;

        run_until_closed(&f).await;

        assert_eq!(f.sender.sent_emails().len(), 1);
    }

    #[tokio::test]
    async fn 停止シグナルで購読を解放して終了する() {
        let f = fixture(MockNotificationSender::new());
        let Fixture { feed, sut, .. } = f;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { sut.run(rx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!feed.is_unsubscribed());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(feed.is_unsubscribed());
    }

    #[tokio::test]
    async fn 開始前に停止済みなら何も処理しない() {
        let f = fixture(MockNotificationSender::new());
        f.feed.push(ChangeKind::Added, sara("sub-001")).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        f.sut.run(rx).await.unwrap();

        assert!(f.sender.sent_emails().is_empty());
        assert!(f.feed.is_unsubscribed());
    }

    #[tokio::test]
    async fn 起動したウォッチャーは停止要求で終了する() {
        let f = fixture(MockNotificationSender::new());
        let Fixture { feed, sut, .. } = f;
        let mut task = sut.spawn();
        let exited = task.exit_signal();

        let still_running = tokio::time::timeout(Duration::from_millis(50), exited).await;
        assert!(still_running.is_err());

        assert_eq!(task.stop().await, WatcherExit::Requested);
        assert!(feed.is_unsubscribed());
    }

    #[tokio::test]
    async fn 購読に失敗したら直ちに終了を知らせる() {
        let f = fixture(MockNotificationSender::new());
        let Fixture { feed, sut, .. } = f;
        let _taken = feed.subscribe_unsent().await.unwrap();
        let mut task = sut.spawn();

        tokio::time::timeout(Duration::from_secs(1), task.exit_signal())
            .await
            .unwrap();

        assert_eq!(task.stop().await, WatcherExit::Unexpected);
    }

    #[tokio::test]
    async fn フィードが終了したら停止要求なしでも終了を知らせる() {
        let f = fixture(MockNotificationSender::new());
        let Fixture { feed, sut, .. } = f;
        feed.close();
        let mut task = sut.spawn();

        tokio::time::timeout(Duration::from_secs(1), task.exit_signal())
            .await
            .unwrap();

        assert_eq!(task.stop().await, WatcherExit::Unexpected);
    }

    #[tokio::test]
    async fn 購読済みのフィードでは開始できない() {
        let f = fixture(MockNotificationSender::new());
        f.feed.close();
        let (_tx, rx) = watch::channel(false);
        f.sut.run(rx.clone()).await.unwrap();

        let result = f.sut.run(rx).await;

        assert!(result.is_err());
    }
}
