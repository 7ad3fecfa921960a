//! # ユースケース層
//!
//! ハンドラとウォッチャーから呼ばれるアプリケーションロジック。
//!
//! - [`notification`] - メールのレンダリングと送信
//! - [`approval`] - 承認リンクによる審査ステータス更新
//! - [`watcher`] - 未送信申請の購読と通知

pub mod approval;
pub mod notification;
pub mod watcher;

pub use approval::{ApprovalInput, ApprovalOutcome, ApprovalUseCaseImpl};
pub use notification::{Mailer, NotificationService, TemplateRenderer};
pub use watcher::{DeliveryOutcome, SubmissionWatcher, WatcherExit, WatcherTask};
