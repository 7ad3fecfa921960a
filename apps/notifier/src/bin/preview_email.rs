//! # 申請通知メールのプレビュー
//!
//! サンプルの申請から通知メールをレンダリングし、HTML ファイルに書き出す。
//! テンプレートを変更したときにブラウザで見た目を確認するためのツール。
//!
//! ## 使い方
//!
//! ```bash
//! cargo run --bin preview-email -p campuswave-notifier [出力先]
//! ```
//!
//! 出力先を省略すると `email-preview.html` に書き出す。

use std::sync::Arc;

use anyhow::Context as _;
use campuswave_domain::{
    clock::FixedClock,
    submission::{AdmissionForm, Submission, SubmissionId},
};
use campuswave_notifier::usecase::TemplateRenderer;
use chrono::Utc;

const DEFAULT_OUTPUT: &str = "email-preview.html";

/// 1x1 の PNG 画像
const SAMPLE_IMAGE: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let now = Utc::now();
    let renderer = TemplateRenderer::new("http://localhost:8080", Arc::new(FixedClock::new(now)))
        .context("テンプレートの読み込みに失敗しました")?;

    let email = renderer
        .render_admission(&sample_submission(now)?)
        .context("メールのレンダリングに失敗しました")?;

    std::fs::write(&output, &email.html_body)
        .with_context(|| format!("{output} への書き込みに失敗しました"))?;

    println!("件名: {}", email.subject);
    println!("プレビューを書き出しました: {output}");
    Ok(())
}

fn sample_submission(now: chrono::DateTime<Utc>) -> anyhow::Result<Submission> {
    let form = AdmissionForm {
        parent_name: Some("Ahmed Ali Khan".to_string()),
        parent_email: Some("ahmed.khan@example.com".to_string()),
        phone: Some("+92-300-1234567".to_string()),
        child_name: Some("Sara Ahmed Khan".to_string()),
        gender: Some("Female".to_string()),
        child_dob: Some("2018-03-15".to_string()),
        grade_applying: Some("Grade 1".to_string()),
        campus: Some("Gulberg Campus".to_string()),
        test_date: Some("2025-12-20".to_string()),
        notes: Some("Child has nut allergies. Prefers morning classes.".to_string()),
        image_base64: Some(SAMPLE_IMAGE.to_string()),
        email_to: vec!["admissions@campuswave.example.com".to_string()],
    };
    let id = SubmissionId::parse("preview-submission-001")?;
    Ok(Submission::new(id, form, now))
}
