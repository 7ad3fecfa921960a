//! # 申請の変更フィード
//!
//! 「通知メール未送信（`email_sent = false`）」の申請集合を購読し、
//! 集合への追加・変更・除外をイベントとして配信する。
//!
//! ## 設計方針
//!
//! - **クエリビュー**: [`UnsentQueryView`] が購読条件に一致する申請の最新スナップショットを
//!   保持し、観測した状態を Added / Modified / Removed に分類する。
//!   DB 依存のない純粋なデータ構造なので単体テストできる
//! - **PostgreSQL LISTEN/NOTIFY**: トリガーが `admission_submission_changes` チャネルに
//!   `{"op": ..., "id": ...}` を配信し、[`PgSubmissionChangeFeed`] が該当行を読み直す
//! - **再同期**: LISTEN 接続が切れた間の通知や、読み直しに失敗した通知は失われるため、
//!   未送信の申請を全件読み直してクエリビューと差分を取る。読み直しは成功するまで再試行する
//! - **購読ハンドル**: [`FeedSubscription`] はバックグラウンドタスクを所有し、
//!   `unsubscribe` またはドロップで一度だけ解放される
//!
//! ## イベントの流れ
//!
//! ```text
//! INSERT/UPDATE/DELETE
//!   → trigger → pg_notify
//!   → PgListener → find_by_id → UnsentQueryView::apply
//!   → mpsc → FeedSubscription::next → SubmissionWatcher
//! ```

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use campuswave_domain::submission::{Submission, SubmissionId};
use serde::Deserialize;
use sqlx::{PgPool, postgres::PgListener};
use strum::IntoStaticStr;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    error::InfraError,
    repository::{PostgresSubmissionRepository, SubmissionRepository},
};

/// トリガーが通知を配信するチャネル名
pub const CHANGE_CHANNEL: &str = "admission_submission_changes";

/// 購読チャネルのバッファサイズ
const EVENT_BUFFER: usize = 64;

/// LISTEN 接続エラー後の待機時間
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

// =========================================================================
// ChangeEvent
// =========================================================================

/// 変更の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    /// 購読条件に新たに一致した
    Added,
    /// 一致したまま内容が変わった
    Modified,
    /// 購読条件から外れた（送信済みになった、または削除された）
    Removed,
}

/// 変更イベント（変更種別と、その時点のスナップショット）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind:       ChangeKind,
    pub submission: Submission,
}

// =========================================================================
// UnsentQueryView
// =========================================================================

/// 購読条件 `email_sent == false` に一致する申請の集合
#[derive(Debug, Default)]
pub struct UnsentQueryView {
    snapshots: HashMap<SubmissionId, Submission>,
}

impl UnsentQueryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1 件の申請について観測した現在の状態を反映する
    ///
    /// `current` が `None` の場合は行が削除されたことを表す。
    /// 集合に変化がなければ `None` を返す。
    pub fn apply(
        &mut self,
        id: &SubmissionId,
        current: Option<Submission>,
    ) -> Option<ChangeEvent> {
        let was_matching = self.snapshots.contains_key(id);

        match current {
            Some(submission) if submission.awaits_notification() => {
                if !was_matching {
                    self.snapshots.insert(id.clone(), submission.clone());
                    return Some(ChangeEvent {
                        kind: ChangeKind::Added,
                        submission,
                    });
                }
                if self.snapshots.get(id) == Some(&submission) {
                    return None;
                }
                self.snapshots.insert(id.clone(), submission.clone());
                Some(ChangeEvent {
                    kind: ChangeKind::Modified,
                    submission,
                })
            }
            Some(submission) => {
                self.snapshots.remove(id)?;
                Some(ChangeEvent {
                    kind: ChangeKind::Removed,
                    submission,
                })
            }
            None => self.snapshots.remove(id).map(|last| ChangeEvent {
                kind:       ChangeKind::Removed,
                submission: last,
            }),
        }
    }

    /// 購読条件に一致する申請の全件を反映する（初回読み込み・再同期用）
    ///
    /// `submissions` に含まれない既知の申請は Removed になる。
    pub fn apply_snapshot(&mut self, submissions: Vec<Submission>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        let mut seen = Vec::with_capacity(submissions.len());

        for submission in submissions {
            let id = submission.id().clone();
            if let Some(event) = self.apply(&id, Some(submission)) {
                events.push(event);
            }
            seen.push(id);
        }

        let mut stale: Vec<SubmissionId> = self
            .snapshots
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        stale.sort();
        for id in stale {
            if let Some(event) = self.apply(&id, None) {
                events.push(event);
            }
        }

        events
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

// =========================================================================
// FeedSubscription
// =========================================================================

/// 変更フィードの購読ハンドル
///
/// イベント受信側とバックグラウンドタスクを所有する。
/// `unsubscribe` を呼ぶか、ドロップした時点で購読を解放する（解放は一度だけ）。
pub struct FeedSubscription {
    events: mpsc::Receiver<Result<ChangeEvent, InfraError>>,
    task:   Option<JoinHandle<()>>,
}

impl FeedSubscription {
    /// バックグラウンドタスク付きの購読を作成する
    pub fn new(events: mpsc::Receiver<Result<ChangeEvent, InfraError>>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// 受信側のみの購読を作成する（イベントの送り手を呼び出し元が持つ場合）
    pub fn from_receiver(events: mpsc::Receiver<Result<ChangeEvent, InfraError>>) -> Self {
        Self { events, task: None }
    }

    /// 次のイベントを待つ
    ///
    /// フィードが終了した場合は `None` を返す。
    pub async fn next(&mut self) -> Option<Result<ChangeEvent, InfraError>> {
        self.events.recv().await
    }

    /// 購読を解放する
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("変更フィードの購読を解放");
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

// =========================================================================
// SubmissionChangeFeed
// =========================================================================

/// 申請の変更フィード
#[async_trait]
pub trait SubmissionChangeFeed: Send + Sync {
    /// 通知メール未送信の申請集合を購読する
    ///
    /// 購読開始時点で条件に一致する申請は Added として最初に配信される。
    async fn subscribe_unsent(&self) -> Result<FeedSubscription, InfraError>;
}

/// トリガーが配信するペイロード
#[derive(Debug, Deserialize)]
struct ChangeNotification {
    op: String,
    id: String,
}

/// PostgreSQL LISTEN/NOTIFY による変更フィード
#[derive(Debug, Clone)]
pub struct PgSubmissionChangeFeed {
    pool:       PgPool,
    repository: PostgresSubmissionRepository,
}

impl PgSubmissionChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        let repository = PostgresSubmissionRepository::new(pool.clone());
        Self { pool, repository }
    }
}

#[async_trait]
impl SubmissionChangeFeed for PgSubmissionChangeFeed {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn subscribe_unsent(&self) -> Result<FeedSubscription, InfraError> {
        // 初回読み込みより先に LISTEN し、その間の変更を取りこぼさない
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let repository = self.repository.clone();
        let task = tokio::spawn(async move {
            run_listener(listener, repository, tx).await;
        });

        tracing::info!(channel = CHANGE_CHANNEL, "変更フィードの購読を開始");
        Ok(FeedSubscription::new(rx, task))
    }
}

type EventSender = mpsc::Sender<Result<ChangeEvent, InfraError>>;

/// 全件読み直しの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncOutcome {
    Synced,
    /// 読み直しに失敗した（エラーは購読側へ送信済み）
    Failed,
    /// 購読側が閉じられた
    Closed,
}

/// LISTEN ループ本体
///
/// 購読側が閉じられた時点で終了する。
/// 通知の取りこぼしが起きうる場合（再読み込みの失敗、接続断、受信エラー）は
/// 次の通知を待つ前に全件を読み直し、成功するまで再試行する。
async fn run_listener(
    mut listener: PgListener,
    repository: PostgresSubmissionRepository,
    tx: EventSender,
) {
    let mut view = UnsentQueryView::new();
    let mut needs_resync = true;

    loop {
        if needs_resync {
            match resync(&repository, &mut view, &tx).await {
                SyncOutcome::Synced => needs_resync = false,
                SyncOutcome::Failed => {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
                SyncOutcome::Closed => return,
            }
        }

        match listener.try_recv().await {
            Ok(Some(notification)) => {
                let delivered =
                    match on_notification(&repository, &mut view, notification.payload()).await {
                        Ok(Some(event)) => tx.send(Ok(event)).await.is_ok(),
                        Ok(None) => !tx.is_closed(),
                        Err(e) => {
                            tracing::warn!("変更通知の処理に失敗したため再同期する: {}", e);
                            needs_resync = true;
                            tx.send(Err(e)).await.is_ok()
                        }
                    };
                if !delivered {
                    return;
                }
            }
            Ok(None) => {
                // 接続断。次の try_recv で再接続されるが、その間の通知は失われている
                tracing::warn!("LISTEN 接続が切断されたため再同期する");
                needs_resync = true;
            }
            Err(e) => {
                if tx.send(Err(e.into())).await.is_err() {
                    return;
                }
                needs_resync = true;
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// 未送信の申請を全件読み直してクエリビューと差分を取る
async fn resync(
    repository: &PostgresSubmissionRepository,
    view: &mut UnsentQueryView,
    tx: &EventSender,
) -> SyncOutcome {
    match repository.find_unsent().await {
        Ok(submissions) => {
            let events = view.apply_snapshot(submissions);
            tracing::debug!(events = events.len(), tracked = view.len(), "変更フィードを同期");
            for event in events {
                if tx.send(Ok(event)).await.is_err() {
                    return SyncOutcome::Closed;
                }
            }
            SyncOutcome::Synced
        }
        Err(e) => {
            if tx.send(Err(e)).await.is_err() {
                return SyncOutcome::Closed;
            }
            SyncOutcome::Failed
        }
    }
}

async fn on_notification(
    repository: &PostgresSubmissionRepository,
    view: &mut UnsentQueryView,
    payload: &str,
) -> Result<Option<ChangeEvent>, InfraError> {
    let notification: ChangeNotification = serde_json::from_str(payload)?;
    let id = SubmissionId::parse(&notification.id)?;
    tracing::debug!(op = %notification.op, submission_id = %id, "変更通知を受信");

    let current = if notification.op == "DELETE" {
        None
    } else {
        repository.find_by_id(&id).await?
    };

    Ok(view.apply(&id, current))
}
