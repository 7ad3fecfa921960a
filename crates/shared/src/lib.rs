//! # Campus Wave 共有ユーティリティ
//!
//! 通知サービスの HTTP 層とインフラ層で共有する、ビジネスロジックを含まない部品。
//!
//! - [`response`] - `{success, message | error}` 形式のレスポンス
//! - [`health`] - ヘルスチェックレスポンス
//! - [`event_log`] - ビジネスイベントログのマクロと定数
//! - `observability` / `canonical_log` - トレーシング初期化とリクエストログ（`observability` feature）

#[cfg(feature = "observability")]
pub mod canonical_log;
pub mod event_log;
pub mod health;
pub mod observability;
pub mod response;

pub use health::HealthResponse;
pub use response::ActionResponse;
