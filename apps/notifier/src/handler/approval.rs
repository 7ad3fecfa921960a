//! # 承認ハンドラ
//!
//! 通知メールの承認・却下リンクから開かれるエンドポイント。
//! ブラウザで開かれるため、成功時は HTML、失敗時はプレーンテキストを返す。
//!
//! ## エンドポイント
//!
//! - `GET /admissionApproval?submissionId={id}&action={approve|reject}`

use std::sync::Arc;

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::Html,
};
use serde::Deserialize;

use crate::{
    error::{NotifierError, PageError},
    usecase::{ApprovalInput, ApprovalUseCaseImpl, NotificationService},
};

/// 承認ハンドラの共有状態
pub struct ApprovalState {
    pub usecase:       ApprovalUseCaseImpl,
    pub notifications: Arc<NotificationService>,
}

/// 承認リンクのクエリ
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalQuery {
    pub submission_id: Option<String>,
    pub action:        Option<String>,
}

/// GET /admissionApproval
pub async fn admission_approval(
    State(state): State<Arc<ApprovalState>>,
    query: Result<Query<ApprovalQuery>, QueryRejection>,
) -> Result<Html<String>, PageError> {
    let Query(query) =
        query.map_err(|rejection| NotifierError::BadRequest(rejection.body_text()))?;

    let outcome = state
        .usecase
        .apply(ApprovalInput {
            submission_id: query.submission_id,
            action:        query.action,
        })
        .await?;

    let page = state
        .notifications
        .renderer()
        .render_approval_page(&outcome.submission_id, outcome.status)
        .map_err(NotifierError::from)?;

    Ok(Html(page))
}
