//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンで通知メールを HTML/plaintext 両形式で生成する。
//!
//! ## 設計方針
//!
//! - **`include_str!` によるコンパイル時埋め込み**: テンプレートはバイナリに埋め込まれる
//! - **自動エスケープ**: `.html` テンプレートに差し込む値はすべて HTML エスケープする。
//!   URL を読みやすく保つため `/` はエスケープしない
//! - **プレースホルダ**: 未入力の項目は `-` などの固定文字列で表示し、失敗させない
//! - **承認リンク**: `{base_url}/admissionApproval?action=approve|reject&submissionId={id}`
//! - **添付画像**: base64 の先頭バイトから MIME タイプを判定し、data URI として埋め込む
//!
//! 宛先の決定は [`Mailer`](super::Mailer) の責務なので、ここでは件名と本文だけを返す。

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use campuswave_domain::{
    clock::Clock,
    feedback::Feedback,
    notification::{NotificationError, RenderedEmail},
    submission::{AdmissionForm, AdmissionStatus, ApprovalAction, Submission, SubmissionId},
};
use chrono::SecondsFormat;
use tera::{Context, Tera};

/// 未入力項目の表示
const PLACEHOLDER: &str = "-";

/// 判定できない画像の MIME タイプ
const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

/// テンプレートレンダラー
///
/// tera テンプレートエンジンをラップし、申請・フィードバックから
/// [`RenderedEmail`] を生成する。
pub struct TemplateRenderer {
    engine:            Tera,
    approval_base_url: String,
    clock:             Arc<dyn Clock>,
}

impl TemplateRenderer {
    /// 新しいレンダラーインスタンスを作成
    ///
    /// `include_str!` で埋め込んだテンプレートを tera に登録する。
    ///
    /// # 引数
    ///
    /// - `approval_base_url`: 承認エンドポイントのベース URL（例: `http://localhost:8080`）
    /// - `clock`: フィードバックの受付日時に使う時刻プロバイダ
    pub fn new(
        approval_base_url: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NotificationError> {
        let mut engine = Tera::default();
        engine.set_escape_fn(escape_html);

        engine
            .add_raw_templates(vec![
                (
                    "admission.html",
                    include_str!("../../../templates/notifications/admission.html"),
                ),
                (
                    "admission.txt",
                    include_str!("../../../templates/notifications/admission.txt"),
                ),
                (
                    "admission_form.html",
                    include_str!("../../../templates/notifications/admission_form.html"),
                ),
                (
                    "admission_form.txt",
                    include_str!("../../../templates/notifications/admission_form.txt"),
                ),
                (
                    "feedback.html",
                    include_str!("../../../templates/notifications/feedback.html"),
                ),
                (
                    "feedback.txt",
                    include_str!("../../../templates/notifications/feedback.txt"),
                ),
                (
                    "approval_page.html",
                    include_str!("../../../templates/notifications/approval_page.html"),
                ),
            ])
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(Self {
            engine,
            approval_base_url: approval_base_url.into().trim_end_matches('/').to_string(),
            clock,
        })
    }

    /// ウォッチャーが送る入学申請メールを生成する
    ///
    /// 件名: `🎓 New Admission Request - {childName} ({gradeApplying})`
    pub fn render_admission(&self, submission: &Submission) -> Result<RenderedEmail, NotificationError> {
        let form = submission.form();
        let mut context = form_context(form);

        context.insert(
            "status",
            &submission.status().to_string().to_uppercase(),
        );
        context.insert(
            "test_date",
            display_or(&form.test_date, "To Be Determined"),
        );
        context.insert("notes", display_or(&form.notes, "None"));
        context.insert("submission_id", submission.id().as_str());
        context.insert(
            "submitted_at",
            &submission
                .created_at()
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        );
        context.insert(
            "approve_url",
            &self.approval_url(submission.id(), ApprovalAction::Approve),
        );
        context.insert(
            "reject_url",
            &self.approval_url(submission.id(), ApprovalAction::Reject),
        );

        let subject = format!(
            "🎓 New Admission Request - {} ({})",
            display(&form.child_name),
            display(&form.grade_applying)
        );

        self.render_pair("admission", subject, &context)
    }

    /// HTTP エンドポイントから送る簡易版の申請メールを生成する
    ///
    /// 申請 ID がある場合のみ承認・却下リンクを含める。
    /// 件名: `Admission Form - {childName | "New Submission"}`
    pub fn render_admission_form(
        &self,
        form: &AdmissionForm,
        submission_id: Option<&SubmissionId>,
        status: Option<&str>,
    ) -> Result<RenderedEmail, NotificationError> {
        let mut context = form_context(form);

        context.insert("notes", &trimmed(&form.notes));
        context.insert(
            "status",
            status
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("pending"),
        );
        context.insert(
            "approve_url",
            &submission_id.map(|id| self.approval_url(id, ApprovalAction::Approve)),
        );
        context.insert(
            "reject_url",
            &submission_id.map(|id| self.approval_url(id, ApprovalAction::Reject)),
        );

        let subject = format!(
            "Admission Form - {}",
            display_or(&form.child_name, "New Submission")
        );

        self.render_pair("admission_form", subject, &context)
    }

    /// フィードバックメールを生成する
    ///
    /// 件名: `Feedback from {userEmail | "user"}`
    pub fn render_feedback(&self, feedback: &Feedback) -> Result<RenderedEmail, NotificationError> {
        let mut context = Context::new();
        context.insert("message", feedback.message());
        context.insert("role", feedback.role().unwrap_or("unknown"));
        context.insert("user_email", feedback.user_email().unwrap_or(PLACEHOLDER));
        context.insert(
            "submitted_at",
            &self
                .clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        let subject = format!(
            "Feedback from {}",
            feedback.user_email().unwrap_or("user")
        );

        self.render_pair("feedback", subject, &context)
    }

    /// 承認・却下後に表示する確認ページを生成する
    pub fn render_approval_page(
        &self,
        submission_id: &SubmissionId,
        status: AdmissionStatus,
    ) -> Result<String, NotificationError> {
        let mut context = Context::new();
        context.insert("submission_id", submission_id.as_str());
        context.insert("status", &status.to_string());

        self.engine
            .render("approval_page.html", &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))
    }

    /// 承認リンクの URL を組み立てる
    pub fn approval_url(&self, submission_id: &SubmissionId, action: ApprovalAction) -> String {
        format!(
            "{}/admissionApproval?action={action}&submissionId={}",
            self.approval_base_url,
            urlencoding::encode(submission_id.as_str())
        )
    }

    fn render_pair(
        &self,
        template_name: &str,
        subject: String,
        context: &Context,
    ) -> Result<RenderedEmail, NotificationError> {
        let html_body = self
            .engine
            .render(&format!("{template_name}.html"), context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        let text_body = self
            .engine
            .render(&format!("{template_name}.txt"), context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(RenderedEmail {
            subject,
            html_body,
            text_body,
        })
    }
}

/// 両テンプレート共通のフォーム項目
fn form_context(form: &AdmissionForm) -> Context {
    let mut context = Context::new();
    context.insert("parent_name", display(&form.parent_name));
    context.insert("parent_email", display(&form.parent_email));
    context.insert("phone", display(&form.phone));
    context.insert("child_name", display(&form.child_name));
    context.insert("gender", display(&form.gender));
    context.insert("child_dob", display(&form.child_dob));
    context.insert("grade_applying", display(&form.grade_applying));
    context.insert("campus", display(&form.campus));
    context.insert(
        "image_data_uri",
        &form.image_base64.as_deref().and_then(image_data_uri),
    );
    context
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn display(value: &Option<String>) -> &str {
    display_or(value, PLACEHOLDER)
}

fn display_or<'a>(value: &'a Option<String>, placeholder: &'a str) -> &'a str {
    trimmed(value).unwrap_or(placeholder)
}

/// base64 画像を data URI にする（既に data URI ならそのまま）
fn image_data_uri(raw: &str) -> Option<String> {
    let data: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if data.is_empty() {
        return None;
    }
    if data.starts_with("data:image/") {
        return Some(data);
    }
    Some(format!("data:{};base64,{data}", sniff_image_mime(&data)))
}

/// 先頭 12 バイトのマジックナンバーから MIME タイプを判定する
fn sniff_image_mime(data: &str) -> &'static str {
    let prefix_len = data.len().min(16) / 4 * 4;
    let Some(prefix) = data.get(..prefix_len) else {
        return FALLBACK_IMAGE_MIME;
    };
    let Ok(bytes) = STANDARD.decode(prefix) else {
        return FALLBACK_IMAGE_MIME;
    };

    match bytes.as_slice() {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => FALLBACK_IMAGE_MIME,
    }
}

/// HTML エスケープ（`/` は対象外）
fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
