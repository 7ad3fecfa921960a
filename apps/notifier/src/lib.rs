//! # Campus Wave Notifier
//!
//! 入学申請の通知メールを送るサービス。
//!
//! - 未送信の申請を購読し、追加された申請ごとに入学事務局へメールする（[`usecase::watcher`]）
//! - メール中の承認・却下リンクを受けて審査ステータスを更新する
//! - モバイルアプリからの申請メール送信とフィードバック転送を受け付ける
//!
//! ## モジュール構成
//!
//! - [`app_builder`] - ルーター構築
//! - [`config`] - 環境変数からの設定読み込み
//! - [`error`] - エラーと HTTP レスポンスへの変換
//! - [`handler`] - HTTP ハンドラ
//! - [`usecase`] - 通知・承認・ウォッチャー

pub mod app_builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;
