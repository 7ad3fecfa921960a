//! # 通知送信
//!
//! メール通知の送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `NotificationSender` trait でメール送信を抽象化
//! - **3 つの実装**: SMTP（既定。Gmail などのリレー）、SES、Noop（ローカル開発用）
//! - **起動時に一度だけ構築**: `NOTIFICATION_BACKEND` で選択し、
//!   `Arc<dyn NotificationSender>` として注入する

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
use campuswave_domain::notification::{EmailMessage, NotificationError};
pub use noop::NoopNotificationSender;
pub use ses::SesNotificationSender;
pub use smtp::{SmtpNotificationSender, SmtpSettings, SmtpTls};

/// メール送信トレイト
///
/// 宛先の解決（既定宛先へのフォールバック）は呼び出し側の責務で、
/// ここに届く `EmailMessage::to` は空でない前提。
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 1 通を全宛先にまとめて送信する
    ///
    /// SMTP 応答や SES のエラーメッセージは `NotificationError::DeliveryFailed` に
    /// そのまま載せる。申請の `emailError` に記録される文字列になる。
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError>;
}
