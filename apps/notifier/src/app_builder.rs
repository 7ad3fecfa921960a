//! # Notifier アプリケーション構築
//!
//! ハンドラの State の初期化とルーター構築を担当する。
//! `main.rs` はインフラ初期化とサーバー起動・ウォッチャー起動に集中する。
//!
//! ## ルート
//!
//! | メソッド | パス | ハンドラ |
//! |---------|------|---------|
//! | GET | `/health` | [`health_check`] |
//! | POST | `/sendAdmissionEmail` | [`send_admission_email`] |
//! | GET | `/admissionApproval` | [`admission_approval`] |
//! | POST | `/sendFeedbackEmail` | [`send_feedback_email`] |
//!
//! パスはメール済みの承認リンクとモバイルアプリが使っているものをそのまま受け付ける。

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use campuswave_infra::repository::SubmissionRepository;
use campuswave_shared::{
    canonical_log::CanonicalLogLineLayer,
    observability::{MakeRequestUuidV7, make_request_span},
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    handler::{
        AdmissionEmailState,
        ApprovalState,
        FeedbackState,
        admission_approval,
        health_check,
        method_not_allowed,
        send_admission_email,
        send_feedback_email,
    },
    usecase::{ApprovalUseCaseImpl, NotificationService},
};

/// プリフライト結果のキャッシュ期間
const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

/// State の構築とルーター定義を行う
pub fn build_app(
    notifications: Arc<NotificationService>,
    repository: Arc<dyn SubmissionRepository>,
) -> Router {
    let admission_state = Arc::new(AdmissionEmailState {
        notifications: notifications.clone(),
    });
    let approval_state = Arc::new(ApprovalState {
        usecase:       ApprovalUseCaseImpl::new(repository),
        notifications: notifications.clone(),
    });
    let feedback_state = Arc::new(FeedbackState { notifications });

    // モバイルアプリ・Web フォームからのクロスオリジン呼び出しを許可する
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(CORS_MAX_AGE);

    Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/sendAdmissionEmail", post(send_admission_email))
                .with_state(admission_state),
        )
        .merge(
            Router::new()
                .route("/admissionApproval", get(admission_approval))
                .with_state(approval_state),
        )
        .merge(
            Router::new()
                .route("/sendFeedbackEmail", post(send_feedback_email))
                .with_state(feedback_state),
        )
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CanonicalLogLineLayer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
}
