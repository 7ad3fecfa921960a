//! # 通知ユースケース
//!
//! 入学申請・フィードバックのメール生成と送信を統合する。
//!
//! ## モジュール構成
//!
//! - [`template_renderer`] - tera テンプレートエンジンによるメール生成
//! - [`mailer`] - 宛先解決と送信
//! - [`service`] - レンダリング + 送信 + イベントログの統合サービス

pub mod mailer;
pub mod service;
pub mod template_renderer;

pub use mailer::Mailer;
pub use service::NotificationService;
pub use template_renderer::TemplateRenderer;
