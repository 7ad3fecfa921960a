//! SES 通知送信実装
//!
//! AWS SES v2 API を使用してメールを送信する。

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    types::{Body, Content, Destination, EmailContent, Message},
};
use campuswave_domain::notification::{EmailMessage, NotificationError};

use super::NotificationSender;

/// SES 通知送信
///
/// `aws_sdk_sesv2::Client` をラップする。
pub struct SesNotificationSender {
    client:       Client,
    from_address: String,
}

impl SesNotificationSender {
    /// 新しい SES 送信インスタンスを作成
    ///
    /// - `from_address`: 送信元メールアドレス（SES で検証済みであること）
    pub fn new(client: Client, from_address: String) -> Self {
        Self {
            client,
            from_address,
        }
    }
}

fn content(data: &str, part: &str) -> Result<Content, NotificationError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| NotificationError::DeliveryFailed(format!("{part}構築失敗: {e}")))
}

#[async_trait]
impl NotificationSender for SesNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        if email.to.is_empty() {
            return Err(NotificationError::DeliveryFailed(
                "宛先が指定されていません".to_string(),
            ));
        }

        let destination = Destination::builder()
            .set_to_addresses(Some(email.to.clone()))
            .build();

        let message = Message::builder()
            .subject(content(&email.subject, "件名")?)
            .body(
                Body::builder()
                    .html(content(&email.html_body, "HTML 本文")?)
                    .text(content(&email.text_body, "テキスト本文")?)
                    .build(),
            )
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(format!("SES 送信失敗: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SesNotificationSender>();
    }

    #[test]
    fn 本文パーツを構築できる() {
        let part = content("<p>Sara</p>", "HTML 本文").unwrap();
        assert_eq!(part.data(), "<p>Sara</p>");
    }
}
