//! # Campus Wave インフラ層
//!
//! 申請ストア（PostgreSQL）とメール送信サービスとの通信を担当する。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理とマイグレーション
//! - **リポジトリ実装**: 申請の読み書き（[`repository`]）
//! - **変更フィード**: 未送信の申請集合の購読（[`change_feed`]）
//! - **メール送信**: SMTP / SES / Noop（[`notification`]）
//!
//! ## 依存関係
//!
//! ```text
//! apps → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`repository`] - リポジトリ実装
//! - [`change_feed`] - LISTEN/NOTIFY による変更フィード
//! - [`notification`] - メール送信
//! - `mock` - テスト用インメモリ実装（`test-utils` feature）
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use campuswave_infra::{change_feed::PgSubmissionChangeFeed, db};
//!
//! let pool = db::create_pool("postgres://localhost/campuswave").await?;
//! db::run_migrations(&pool).await?;
//! let feed = PgSubmissionChangeFeed::new(pool.clone());
//! ```

pub mod change_feed;
pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod notification;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
