//! # 申請メールハンドラ
//!
//! モバイルアプリが申請フォームの内容を直接送り、入学事務局へメールさせるエンドポイント。
//!
//! ## エンドポイント
//!
//! - `POST /sendAdmissionEmail`
//!
//! リクエストはフォーム項目（camelCase）に加えて、任意の `to`（文字列または配列）、
//! `submissionId`、`status` を受け付ける。宛先は `to` と既定の宛先の両方。

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use campuswave_domain::submission::{AdmissionForm, SubmissionId, non_blank, one_or_many};
use campuswave_shared::ActionResponse;
use serde::Deserialize;

use crate::{error::NotifierError, usecase::NotificationService};

/// 申請メールハンドラの共有状態
pub struct AdmissionEmailState {
    pub notifications: Arc<NotificationService>,
}

/// 申請メール送信リクエスト
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionEmailRequest {
    #[serde(flatten)]
    pub form:          AdmissionForm,
    #[serde(default, deserialize_with = "one_or_many")]
    pub to:            Vec<String>,
    #[serde(default)]
    pub submission_id: Option<String>,
    #[serde(default)]
    pub status:        Option<String>,
}

/// POST /sendAdmissionEmail
///
/// 不正な JSON は 400、送信失敗は 500 で送信エラーの内容を返す。
pub async fn send_admission_email(
    State(state): State<Arc<AdmissionEmailState>>,
    payload: Result<Json<AdmissionEmailRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, NotifierError> {
    let Json(req) = payload.map_err(|rejection| NotifierError::BadRequest(rejection.body_text()))?;

    // 空白だけの ID はリンクを付けないだけで、エラーにはしない
    let submission_id = req
        .submission_id
        .as_deref()
        .and_then(|raw| SubmissionId::parse(raw).ok());
    let status = non_blank(req.status);

    state
        .notifications
        .send_admission_form(&req.form, &req.to, submission_id.as_ref(), status.as_deref())
        .await?;

    Ok(Json(ActionResponse::ok("Email sent successfully")))
}
