//! # Notifier エラー定義
//!
//! Notifier 固有のエラーと、HTTP レスポンスへの変換を定義する。
//!
//! ## レスポンス形式
//!
//! | 変換 | 形式 | 用途 |
//! |------|------|------|
//! | [`NotifierError`] | `{"success": false, "error": "..."}` | メール送信 API |
//! | [`PageError`] | プレーンテキスト | 承認リンク（ブラウザで開かれる） |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use campuswave_domain::{DomainError, notification::NotificationError};
use campuswave_infra::InfraError;
use campuswave_shared::{
    ActionResponse,
    event_log::error::{category, kind},
};
use thiserror::Error;

/// Notifier で発生するエラー
#[derive(Debug, Error)]
pub enum NotifierError {
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 申請が見つからない
    #[error("申請が見つかりません: {0}")]
    NotFound(String),

    /// 許可されていない HTTP メソッド
    #[error("許可されていないメソッドです")]
    MethodNotAllowed,

    /// メール送信・テンプレートのエラー
    #[error("通知エラー: {0}")]
    Notification(#[from] NotificationError),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(#[from] InfraError),
}

impl From<DomainError> for NotifierError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::BadRequest(msg),
            DomainError::NotFound { id, .. } => Self::NotFound(id),
        }
    }
}

impl NotifierError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Notification(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 5xx をエラーログに残す
    fn log(&self) {
        match self {
            Self::Notification(NotificationError::DeliveryFailed(msg)) => {
                tracing::error!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = kind::MAIL_DELIVERY,
                    "メール送信エラー: {}",
                    msg
                );
            }
            Self::Notification(NotificationError::TemplateFailed(msg)) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::TEMPLATE,
                    "テンプレートエラー: {}",
                    msg
                );
            }
            Self::Database(e) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::DATABASE,
                    span_trace = %e.span_trace(),
                    "データベースエラー: {}",
                    e
                );
            }
            Self::BadRequest(_) | Self::NotFound(_) | Self::MethodNotAllowed => {}
        }
    }

    /// クライアントに返すメッセージ
    fn client_message(&self) -> String {
        match self {
            Self::BadRequest(msg) => msg.clone(),
            Self::NotFound(_) => "Submission not found".to_string(),
            Self::MethodNotAllowed => "Method not allowed".to_string(),
            // 送信失敗の理由（認証エラー、不正な宛先など）は利用者が対処できるので返す
            Self::Notification(NotificationError::DeliveryFailed(msg)) => msg.clone(),
            Self::Notification(NotificationError::TemplateFailed(_)) | Self::Database(_) => {
                "Internal error".to_string()
            }
        }
    }
}

impl IntoResponse for NotifierError {
    fn into_response(self) -> Response {
        self.log();
        (
            self.status_code(),
            Json(ActionResponse::error(self.client_message())),
        )
            .into_response()
    }
}

/// 承認ページ用のエラー（プレーンテキストで返す）
#[derive(Debug)]
pub struct PageError(pub NotifierError);

impl From<NotifierError> for PageError {
    fn from(err: NotifierError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for PageError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let inner = self.0;
        inner.log();
        let body = match &inner {
            NotifierError::BadRequest(_) => "Invalid request",
            NotifierError::NotFound(_) => "Submission not found",
            NotifierError::MethodNotAllowed => "Method not allowed",
            NotifierError::Notification(_) | NotifierError::Database(_) => "Internal error",
        };
        (inner.status_code(), body).into_response()
    }
}
