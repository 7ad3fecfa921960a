//! # Mailer
//!
//! レンダリング済みのメールに宛先を付けて [`NotificationSender`] に渡す。
//!
//! 宛先リストは前後の空白を除去し、大文字小文字を区別せずに重複を取り除く。
//! 空になった場合は既定の宛先（入学事務局）に送る。送信エラーは握りつぶさず返す。

use std::sync::Arc;

use campuswave_domain::notification::{EmailMessage, NotificationError, RenderedEmail};
use campuswave_infra::notification::NotificationSender;

pub struct Mailer {
    sender:             Arc<dyn NotificationSender>,
    default_recipients: Vec<String>,
}

impl Mailer {
    pub fn new(sender: Arc<dyn NotificationSender>, default_recipients: Vec<String>) -> Self {
        Self {
            sender,
            default_recipients,
        }
    }

    /// 宛先を解決してメールを送信する
    ///
    /// 送信したメッセージ（解決後の宛先を含む）を返す。
    pub async fn send(
        &self,
        rendered: RenderedEmail,
        requested: &[String],
    ) -> Result<EmailMessage, NotificationError> {
        let message = rendered.addressed_to(self.resolve_recipients(requested));
        self.sender.send_email(&message).await?;
        Ok(message)
    }

    /// 宛先リストを正規化する（空なら既定の宛先）
    pub fn resolve_recipients(&self, requested: &[String]) -> Vec<String> {
        let recipients = dedup_recipients(requested);
        if recipients.is_empty() {
            dedup_recipients(&self.default_recipients)
        } else {
            recipients
        }
    }

    pub fn default_recipients(&self) -> &[String] {
        &self.default_recipients
    }
}

fn dedup_recipients(raw: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    for recipient in raw.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(recipient)) {
            seen.push(recipient.to_string());
        }
    }
    seen
}
