//! # フィードバックハンドラ
//!
//! アプリ利用者の自由記述フィードバックを固定の受信箱へ転送する。保存はしない。
//!
//! ## エンドポイント
//!
//! - `POST /sendFeedbackEmail` - `{message, role?, userEmail?}`

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use campuswave_domain::feedback::Feedback;
use campuswave_shared::ActionResponse;
use serde::Deserialize;

use crate::{error::NotifierError, usecase::NotificationService};

/// フィードバックハンドラの共有状態
pub struct FeedbackState {
    pub notifications: Arc<NotificationService>,
}

/// フィードバック送信リクエスト
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub message:    Option<String>,
    #[serde(default)]
    pub role:       Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// POST /sendFeedbackEmail
///
/// 空のメッセージは送信せずに 400 を返す。
pub async fn send_feedback_email(
    State(state): State<Arc<FeedbackState>>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, NotifierError> {
    let Json(req) = payload.map_err(|rejection| NotifierError::BadRequest(rejection.body_text()))?;

    let feedback = Feedback::new(req.message, req.role, req.user_email)?;
    state.notifications.send_feedback(&feedback).await?;

    Ok(Json(ActionResponse::ok("Feedback sent")))
}
