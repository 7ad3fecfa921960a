//! Noop 送信
//!
//! `NOTIFICATION_BACKEND=noop` のときに使う。SMTP 資格情報なしでサービス全体を
//! ローカルで動かせるよう、宛先と件名をログに残して成功を返す。

use async_trait::async_trait;
use campuswave_domain::notification::{EmailMessage, NotificationError};

use super::NotificationSender;

#[derive(Debug, Clone)]
pub struct NoopNotificationSender;

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        tracing::info!(
            notification.recipients = %email.to.join(", "),
            notification.subject = %email.subject,
            notification.html_bytes = email.html_body.len(),
            "noop バックエンドのため送信しない"
        );
        tracing::debug!(body = %email.text_body, "送信しなかった本文");
        Ok(())
    }
}
