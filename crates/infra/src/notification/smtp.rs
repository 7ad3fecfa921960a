//! SMTP 通知送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 既定では Gmail（`smtp.gmail.com:587`, STARTTLS）にアプリパスワードで認証する。

use async_trait::async_trait;
use campuswave_domain::notification::{EmailMessage, NotificationError};
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Mailbox, Message, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use super::NotificationSender;

/// SMTP の TLS モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SmtpTls {
    /// 平文で接続して STARTTLS で昇格（587 番）
    Starttls,
    /// 接続時から TLS（465 番）
    Tls,
    /// TLS なし（ローカルの SMTP サーバー向け）
    #[strum(serialize = "none")]
    Plain,
}

/// SMTP 接続設定
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host:     String,
    pub port:     u16,
    pub tls:      SmtpTls,
    /// 認証ユーザー。送信元アドレスとしても使う
    pub username: String,
    pub password: String,
}

/// SMTP 通知送信
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
pub struct SmtpNotificationSender {
    transport:    AsyncSmtpTransport<Tokio1Executor>,
    from_address: Mailbox,
}

impl SmtpNotificationSender {
    /// 新しい SMTP 送信インスタンスを作成
    ///
    /// 接続は送信時に確立されるため、ここではホスト名と送信元アドレスの検証のみ行う。
    pub fn new(settings: SmtpSettings) -> Result<Self, NotificationError> {
        let from_address: Mailbox = settings.username.parse().map_err(|e| {
            NotificationError::DeliveryFailed(format!("送信元アドレス不正: {e}"))
        })?;

        let builder = match settings.tls {
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| NotificationError::DeliveryFailed(format!("SMTP 設定不正: {e}")))?
            }
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| NotificationError::DeliveryFailed(format!("SMTP 設定不正: {e}")))?,
            SmtpTls::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        };

        let mut builder = builder.port(settings.port);
        if !settings.password.is_empty() {
            builder = builder.credentials(Credentials::new(settings.username, settings.password));
        }

        Ok(Self {
            transport: builder.build(),
            from_address,
        })
    }
}

/// `EmailMessage` から送信用の MIME メッセージ（text + HTML の multipart/alternative）を組み立てる
fn build_message(from: &Mailbox, email: &EmailMessage) -> Result<Message, NotificationError> {
    if email.to.is_empty() {
        return Err(NotificationError::DeliveryFailed(
            "宛先が指定されていません".to_string(),
        ));
    }

    let mut builder = Message::builder().from(from.clone());
    for recipient in &email.to {
        let mailbox: Mailbox = recipient.parse().map_err(|e| {
            NotificationError::DeliveryFailed(format!("宛先アドレス不正 ({recipient}): {e}"))
        })?;
        builder = builder.to(mailbox);
    }

    builder
        .subject(&email.subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.text_body.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.html_body.clone()),
                ),
        )
        .map_err(|e| NotificationError::DeliveryFailed(format!("メッセージ構築失敗: {e}")))
}

#[async_trait]
impl NotificationSender for SmtpNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        let message = build_message(&self.from_address, email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::DeliveryFailed(format!("SMTP 送信失敗: {e}")))?;

        Ok(())
    }
}
