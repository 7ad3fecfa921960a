//! # 通知サービス
//!
//! テンプレートレンダリング → 宛先解決 → メール送信 → イベントログを統合するサービス。
//!
//! ## 設計方針
//!
//! - **エラーを返す**: 送信失敗は呼び出し元（ウォッチャー・ハンドラ）に返し、
//!   申請への記録や HTTP ステータスへの変換はそちらで行う
//! - **宛先ポリシー**: 用途ごとに異なる
//!   - ウォッチャー: 申請の `emailTo`（空なら既定の宛先）
//!   - 申請メール API: リクエストの `to` と既定の宛先の両方
//!   - フィードバック: 固定の受信箱 1 件のみ
//! - **依存性注入**: 送信実装は [`Mailer`] 経由で trait として受け取る

use campuswave_domain::{
    feedback::Feedback,
    notification::{EmailMessage, NotificationError},
    submission::{AdmissionForm, Submission, SubmissionId},
};
use campuswave_shared::{event_log::event, log_business_event};

use super::{Mailer, TemplateRenderer};

/// 通知サービス
pub struct NotificationService {
    renderer:           TemplateRenderer,
    mailer:             Mailer,
    feedback_recipient: String,
}

impl NotificationService {
    pub fn new(renderer: TemplateRenderer, mailer: Mailer, feedback_recipient: String) -> Self {
        Self {
            renderer,
            mailer,
            feedback_recipient,
        }
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// 新しい申請の通知メールを送る（ウォッチャー用）
    pub async fn send_admission(
        &self,
        submission: &Submission,
    ) -> Result<EmailMessage, NotificationError> {
        let rendered = self.renderer.render_admission(submission)?;

        match self.mailer.send(rendered, &submission.form().email_to).await {
            Ok(message) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SENT,
                    event.entity_type = event::entity_type::SUBMISSION,
                    event.entity_id = %submission.id(),
                    event.result = event::result::SUCCESS,
                    notification.recipients = %message.to.join(", "),
                    "申請通知メール送信成功"
                );
                Ok(message)
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_FAILED,
                    event.entity_type = event::entity_type::SUBMISSION,
                    event.entity_id = %submission.id(),
                    event.result = event::result::FAILURE,
                    error = %e,
                    "申請通知メール送信失敗"
                );
                Err(e)
            }
        }
    }

    /// モバイルアプリから直接依頼された申請メールを送る
    ///
    /// 宛先はリクエストの `to` に既定の宛先を加えたもの。
    pub async fn send_admission_form(
        &self,
        form: &AdmissionForm,
        to: &[String],
        submission_id: Option<&SubmissionId>,
        status: Option<&str>,
    ) -> Result<EmailMessage, NotificationError> {
        let rendered = self
            .renderer
            .render_admission_form(form, submission_id, status)?;

        let mut recipients = to.to_vec();
        recipients.extend(self.mailer.default_recipients().iter().cloned());

        let entity_id = submission_id.map_or("-", SubmissionId::as_str);
        match self.mailer.send(rendered, &recipients).await {
            Ok(message) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SENT,
                    event.entity_type = event::entity_type::SUBMISSION,
                    event.entity_id = entity_id,
                    event.result = event::result::SUCCESS,
                    notification.recipients = %message.to.join(", "),
                    "申請フォームメール送信成功"
                );
                Ok(message)
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_FAILED,
                    event.entity_type = event::entity_type::SUBMISSION,
                    event.entity_id = entity_id,
                    event.result = event::result::FAILURE,
                    error = %e,
                    "申請フォームメール送信失敗"
                );
                Err(e)
            }
        }
    }

    /// フィードバックを固定の受信箱に転送する
    pub async fn send_feedback(&self, feedback: &Feedback) -> Result<EmailMessage, NotificationError> {
        let rendered = self.renderer.render_feedback(feedback)?;
        let recipients = vec![self.feedback_recipient.clone()];

        match self.mailer.send(rendered, &recipients).await {
            Ok(message) => {
                log_business_event!(
                    event.category = event::category::FEEDBACK,
                    event.action = event::action::FEEDBACK_SENT,
                    event.entity_type = event::entity_type::FEEDBACK,
                    event.result = event::result::SUCCESS,
                    feedback.role = feedback.role().unwrap_or("unknown"),
                    "フィードバック送信成功"
                );
                Ok(message)
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::FEEDBACK,
                    event.action = event::action::FEEDBACK_FAILED,
                    event.entity_type = event::entity_type::FEEDBACK,
                    event.result = event::result::FAILURE,
                    error = %e,
                    "フィードバック送信失敗"
                );
                Err(e)
            }
        }
    }
}
