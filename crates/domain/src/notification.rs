//! # 通知
//!
//! メール通知に関するドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **テンプレート分離**: メール本文の生成（TemplateRenderer）はアプリ層、
//!   送信（NotificationSender）はインフラ層が担当し、このモジュールは両者の間で
//!   受け渡すデータ型のみを持つ
//! - **エラーの伝播**: 送信失敗は呼び出し元へ返す。握りつぶさない

use thiserror::Error;

/// 通知送信エラー
#[derive(Debug, Error)]
pub enum NotificationError {
    /// メール送信に失敗（認証エラー、ネットワーク障害、不正なアドレスなど）
    #[error("メール送信に失敗: {0}")]
    DeliveryFailed(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),
}

/// メールメッセージ
///
/// テンプレートレンダリングの出力に宛先を加えたもの。NotificationSender に渡される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 送信先メールアドレス（1 件以上）
    pub to:        Vec<String>,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
    /// プレーンテキスト本文
    pub text_body: String,
}

/// 宛先を持たないレンダリング結果
///
/// 宛先の決定は Mailer の責務なので、レンダラーは件名と本文だけを返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject:   String,
    pub html_body: String,
    pub text_body: String,
}

impl RenderedEmail {
    /// 宛先を付けて送信可能なメッセージにする
    pub fn addressed_to(self, to: Vec<String>) -> EmailMessage {
        EmailMessage {
            to,
            subject: self.subject,
            html_body: self.html_body,
            text_body: self.text_body,
        }
    }
}
