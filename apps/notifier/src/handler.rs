//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュールで re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、ビジネスロジックは usecase 層に委譲
//!
//! ## ハンドラ一覧
//!
//! - `health`: ヘルスチェック
//! - `admission_email`: 申請メール送信（モバイルアプリから直接呼ばれる）
//! - `approval`: 承認リンク
//! - `feedback`: フィードバック転送

pub mod admission_email;
pub mod approval;
pub mod feedback;
pub mod health;

pub use admission_email::{AdmissionEmailState, send_admission_email};
pub use approval::{ApprovalState, admission_approval};
pub use feedback::{FeedbackState, send_feedback_email};
pub use health::health_check;

use crate::error::NotifierError;

/// 許可されていないメソッドへのフォールバック
pub async fn method_not_allowed() -> NotifierError {
    NotifierError::MethodNotAllowed
}
