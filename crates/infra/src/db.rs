//! # PostgreSQL データベース接続管理
//!
//! 申請ストアへの接続プールの作成とマイグレーションを行う。
//!
//! ## 設計方針
//!
//! - **接続プール**: 起動時に一度だけ作成し、HTTP ハンドラとウォッチャーで共有する
//! - **変更フィード用の接続は別**: `LISTEN` は [`crate::change_feed`] が
//!   専用の `PgListener` で張るため、プールの接続を占有しない
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use campuswave_infra::db;
//!
//! let pool = db::create_pool("postgres://localhost/campuswave").await?;
//! db::run_migrations(&pool).await?;
//! ```

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::error::InfraError;

/// データベースマイグレーションを実行する
///
/// `sqlx::migrate!()` マクロで埋め込まれたマイグレーションファイルを
/// 順番に適用する。適用済みのマイグレーションはスキップされる。
pub async fn run_migrations(pool: &PgPool) -> Result<(), InfraError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL 接続プールを作成する
///
/// # 設定値
///
/// - `max_connections(10)`: 最大接続数
/// - `acquire_timeout(5秒)`: 接続取得のタイムアウト。超過時はエラー
pub async fn create_pool(database_url: &str) -> Result<PgPool, InfraError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}
