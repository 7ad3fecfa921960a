//! # リポジトリ実装
//!
//! 申請ストアへの読み書きを提供する。
//!
//! ## 設計方針
//!
//! - **トレイトで抽象化**: ユースケース層は `SubmissionRepository` にのみ依存する
//! - **実行時クエリ**: `sqlx::query` / `query_as` + `FromRow` で行をマッピングする

pub mod submission_repository;

pub use submission_repository::{PostgresSubmissionRepository, SubmissionRepository};
