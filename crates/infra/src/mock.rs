//! # テスト用モック
//!
//! ユースケース・ハンドラのテストで使用するインメモリ実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! campuswave-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use campuswave_domain::{
    notification::{EmailMessage, NotificationError},
    submission::{AdmissionStatus, Submission, SubmissionId},
};
use chrono::Utc;
use tokio::sync::mpsc;

use crate::{
    change_feed::{ChangeEvent, ChangeKind, FeedSubscription, SubmissionChangeFeed},
    error::InfraError,
    notification::NotificationSender,
    repository::SubmissionRepository,
};

// ===== MockSubmissionRepository =====

/// 書き込み操作の記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedWrite {
    Insert(SubmissionId),
    MarkEmailSent(SubmissionId),
    RecordEmailError(SubmissionId, String),
    UpdateStatus(SubmissionId, AdmissionStatus),
}

#[derive(Default)]
struct RepositoryState {
    submissions:          Vec<Submission>,
    writes:               Vec<RecordedWrite>,
    fail_all:             bool,
    fail_mark_email_sent: bool,
}

#[derive(Clone, Default)]
pub struct MockSubmissionRepository {
    state: Arc<Mutex<RepositoryState>>,
}

impl MockSubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_submission(&self, submission: Submission) {
        self.state.lock().unwrap().submissions.push(submission);
    }

    /// 現在保存されている申請
    pub fn find(&self, id: &str) -> Option<Submission> {
        self
            .state
            .lock()
            .unwrap()
            .submissions
            .iter()
            .find(|s| s.id().as_str() == id)
            .cloned()
    }

    /// 記録された書き込み操作（`insert` を含む）
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    /// すべての操作をデータベースエラーにする
    pub fn fail_all(&self) {
        self.state.lock().unwrap().fail_all = true;
    }

    /// `mark_email_sent` のみデータベースエラーにする
    pub fn fail_mark_email_sent(&self) {
        self.state.lock().unwrap().fail_mark_email_sent = true;
    }

    fn check(&self) -> Result<(), InfraError> {
        if self.state.lock().unwrap().fail_all {
            return Err(InfraError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn update<F>(&self, id: &SubmissionId, write: RecordedWrite, f: F) -> bool
    where
        F: FnOnce(Submission) -> Submission,
    {
        let mut state = self.state.lock().unwrap();
        state.writes.push(write);
        let Some(pos) = state.submissions.iter().position(|s| s.id() == id) else {
            return false;
        };
        let current = state.submissions[pos].clone();
        state.submissions[pos] = f(current);
        true
    }
}

#[async_trait]
impl SubmissionRepository for MockSubmissionRepository {
    async fn insert(&self, submission: &Submission) -> Result<(), InfraError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.writes.push(RecordedWrite::Insert(submission.id().clone()));
        state.submissions.push(submission.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &SubmissionId) -> Result<Option<Submission>, InfraError> {
        self.check()?;
        Ok(self.find(id.as_str()))
    }

    async fn find_unsent(&self) -> Result<Vec<Submission>, InfraError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .submissions
            .iter()
            .filter(|s| s.awaits_notification())
            .cloned()
            .collect())
    }

    async fn mark_email_sent(&self, id: &SubmissionId) -> Result<bool, InfraError> {
        self.check()?;
        if self.state.lock().unwrap().fail_mark_email_sent {
            return Err(InfraError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(self.update(id, RecordedWrite::MarkEmailSent(id.clone()), |s| {
            s.delivered(Utc::now())
        }))
    }

    async fn record_email_error(
        &self,
        id: &SubmissionId,
        message: &str,
    ) -> Result<bool, InfraError> {
        self.check()?;
        Ok(self.update(
            id,
            RecordedWrite::RecordEmailError(id.clone(), message.to_string()),
            |s| s.delivery_failed(message, Utc::now()),
        ))
    }

    async fn update_status(
        &self,
        id: &SubmissionId,
        status: AdmissionStatus,
    ) -> Result<bool, InfraError> {
        self.check()?;
        Ok(self.update(id, RecordedWrite::UpdateStatus(id.clone(), status), |s| {
            s.with_status(status, Utc::now())
        }))
    }
}

// ===== MockSubmissionChangeFeed =====

type EventSender = mpsc::Sender<Result<ChangeEvent, InfraError>>;
type EventReceiver = mpsc::Receiver<Result<ChangeEvent, InfraError>>;

/// テストからイベントを流し込める変更フィード
///
/// `subscribe_unsent` は一度だけ成功する。
#[derive(Clone)]
pub struct MockSubmissionChangeFeed {
    sender:   Arc<Mutex<Option<EventSender>>>,
    receiver: Arc<Mutex<Option<EventReceiver>>>,
}

impl MockSubmissionChangeFeed {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(32);
        Self {
            sender:   Arc::new(Mutex::new(Some(tx))),
            receiver: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// イベントを流し込む
    pub async fn push(&self, kind: ChangeKind, submission: Submission) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(Ok(ChangeEvent { kind, submission })).await;
        }
    }

    /// フィードのエラーを流し込む
    pub async fn push_error(&self, error: InfraError) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(Err(error)).await;
        }
    }

    /// フィードを終了させる（購読側の `next` が `None` を返すようになる）
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }

    /// 購読が解放されたか（`close` 済みの場合も真）
    pub fn is_unsubscribed(&self) -> bool {
        self
            .sender
            .lock()
            .unwrap()
            .as_ref()
            .is_none_or(|sender| sender.is_closed())
    }
}

impl Default for MockSubmissionChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionChangeFeed for MockSubmissionChangeFeed {
    async fn subscribe_unsent(&self) -> Result<FeedSubscription, InfraError> {
        let receiver = self.receiver.lock().unwrap().take();
        match receiver {
            Some(rx) => Ok(FeedSubscription::from_receiver(rx)),
            None => Err(InfraError::unexpected("既に購読済みです")),
        }
    }
}

// ===== MockNotificationSender =====

/// 送信したメールを記録するモック
#[derive(Clone, Default)]
pub struct MockNotificationSender {
    sent:    Arc<Mutex<Vec<EmailMessage>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 常に `DeliveryFailed(message)` を返すモック
    pub fn failing(message: impl Into<String>) -> Self {
        let sender = Self::default();
        *sender.failure.lock().unwrap() = Some(message.into());
        sender
    }

    /// 送信に成功したメール
    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for MockNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(NotificationError::DeliveryFailed(message));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
