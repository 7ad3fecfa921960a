//! # ヘルスチェックハンドラ
//!
//! レスポンス型は [`campuswave_shared::HealthResponse`] を参照。

use axum::Json;
use campuswave_shared::HealthResponse;

/// Notifier のヘルスチェックエンドポイント
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(env!("CARGO_PKG_VERSION")))
}
