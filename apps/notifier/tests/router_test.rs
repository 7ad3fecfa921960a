//! Notifier HTTP API 統合テスト
//!
//! [`build_app`] で組み立てたルーター全体（CORS・リクエスト ID を含む）に対して、
//! インメモリのモックを使ってエンドポイントの振る舞いを検証する。
//!
//! ## テストケース
//!
//! - ヘルスチェック
//! - 申請メール送信の成功・送信失敗・不正な JSON
//! - 承認リンクの承認・不正なアクション・存在しない申請
//! - フィードバック送信の成功・空メッセージ
//! - 許可されていないメソッドと CORS プリフライト
//! - リクエスト ID の付与

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use campuswave_domain::{
    clock::FixedClock,
    submission::{AdmissionForm, AdmissionStatus, Submission, SubmissionId},
};
use campuswave_infra::mock::{MockNotificationSender, MockSubmissionRepository};
use campuswave_notifier::{
    app_builder::build_app,
    usecase::{Mailer, NotificationService, TemplateRenderer},
};
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;

// --- テストヘルパー ---

fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn default_recipients() -> Vec<String> {
    vec![
        "admissions@campuswave.example.com".to_string(),
        "registrar@campuswave.example.com".to_string(),
    ]
}

struct TestApp {
    router: Router,
    repo:   MockSubmissionRepository,
    sender: MockNotificationSender,
}

fn create_test_app(sender: MockNotificationSender) -> TestApp {
    let repo = MockSubmissionRepository::new();
    repo.add_submission(Submission::new(
        SubmissionId::parse("sub-001").unwrap(),
        AdmissionForm {
            child_name: Some("Sara".to_string()),
            ..AdmissionForm::default()
        },
        fixed_now(),
    ));

    let renderer =
        TemplateRenderer::new("http://localhost:8080", Arc::new(FixedClock::new(fixed_now())))
            .unwrap();
    let mailer = Mailer::new(Arc::new(sender.clone()), default_recipients());
    let notifications = Arc::new(NotificationService::new(
        renderer,
        mailer,
        "feedback@campuswave.example.com".to_string(),
    ));

    TestApp {
        router: build_app(notifications, Arc::new(repo.clone())),
        repo,
        sender,
    }
}

fn json_request(method: Method, uri: &str, body: &JsonValue) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> JsonValue {
    serde_json::from_str(&body_string(response).await).unwrap()
}

// --- ヘルスチェック ---

#[tokio::test]
async fn test_ヘルスチェックは200を返す() {
    let app = create_test_app(MockNotificationSender::new());

    let response = app.router.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

// --- 申請メール ---

#[tokio::test]
async fn test_申請メールは依頼先と既定の宛先に送られる() {
    // Given
    let app = create_test_app(MockNotificationSender::new());
    let body = json!({
        "childName": "Sara",
        "gradeApplying": "Grade 1",
        "to": "parent@example.com",
        "submissionId": "sub-001",
        "status": "pending"
    });

    // When
    let response = app
        .router
        .oneshot(json_request(Method::POST, "/sendAdmissionEmail", &body))
        .await
        .unwrap();

    // Then
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"success": true, "message": "Email sent successfully"})
    );

    let sent = app.sender.sent_emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].to,
        vec![
            "parent@example.com".to_string(),
            "admissions@campuswave.example.com".to_string(),
            "registrar@campuswave.example.com".to_string(),
        ]
    );
    assert_eq!(sent[0].subject, "Admission Form - Sara");
    assert!(sent[0].html_body.contains("submissionId=sub-001"));
}

#[tokio::test]
async fn test_申請メールの送信失敗は500でエラー内容を返す() {
    let app = create_test_app(MockNotificationSender::failing("535 Authentication failed"));
    let body = json!({ "childName": "Sara" });

    let response = app
        .router
        .oneshot(json_request(Method::POST, "/sendAdmissionEmail", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"success": false, "error": "535 Authentication failed"})
    );
}

#[tokio::test]
async fn test_不正なjsonは400を返す() {
    let app = create_test_app(MockNotificationSender::new());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/sendAdmissionEmail")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
    assert!(app.sender.sent_emails().is_empty());
}

// --- 承認リンク ---

#[tokio::test]
async fn test_承認リンクでステータスが更新され確認ページを返す() {
    // Given
    let app = create_test_app(MockNotificationSender::new());

    // When
    let response = app
        .router
        .oneshot(get_request(
            "/admissionApproval?submissionId=sub-001&action=approve",
        ))
        .await
        .unwrap();

    // Then
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let page = body_string(response).await;
    assert!(page.contains("Admission approved"));
    assert!(page.contains("sub-001"));

    assert_eq!(
        app.repo.find("sub-001").unwrap().status(),
        AdmissionStatus::Approved
    );
}

#[tokio::test]
async fn test_不正なアクションは400で書き込まない() {
    let app = create_test_app(MockNotificationSender::new());

    let response = app
        .router
        .oneshot(get_request(
            "/admissionApproval?submissionId=sub-001&action=delete",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Invalid request");
    assert!(app.repo.writes().is_empty());
}

#[tokio::test]
async fn test_パラメータが無ければ400を返す() {
    let app = create_test_app(MockNotificationSender::new());

    let response = app
        .router
        .oneshot(get_request("/admissionApproval"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.repo.writes().is_empty());
}

#[tokio::test]
async fn test_存在しない申請は404を返す() {
    let app = create_test_app(MockNotificationSender::new());

    let response = app
        .router
        .oneshot(get_request(
            "/admissionApproval?submissionId=missing&action=reject",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Submission not found");
    assert!(app.repo.writes().is_empty());
}

// --- フィードバック ---

#[tokio::test]
async fn test_フィードバックは固定の受信箱に送られる() {
    let app = create_test_app(MockNotificationSender::new());
    let body = json!({
        "message": "  Great app!  ",
        "role": "parent",
        "userEmail": "ahmed@example.com"
    });

    let response = app
        .router
        .oneshot(json_request(Method::POST, "/sendFeedbackEmail", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"success": true, "message": "Feedback sent"})
    );
    let sent = app.sender.sent_emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["feedback@campuswave.example.com".to_string()]);
    assert_eq!(sent[0].subject, "Feedback from ahmed@example.com");
    assert!(sent[0].html_body.contains("Great app!"));
}

#[tokio::test]
async fn test_空のフィードバックは400でメールを送らない() {
    let app = create_test_app(MockNotificationSender::new());
    let body = json!({ "message": "   ", "role": "parent" });

    let response = app
        .router
        .oneshot(json_request(Method::POST, "/sendFeedbackEmail", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"success": false, "error": "Message required"})
    );
    assert!(app.sender.sent_emails().is_empty());
}

#[tokio::test]
async fn test_フィードバック本文はエスケープされる() {
    let app = create_test_app(MockNotificationSender::new());
    let body = json!({ "message": "<script>alert(1)</script>" });

    let response = app
        .router
        .oneshot(json_request(Method::POST, "/sendFeedbackEmail", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = &app.sender.sent_emails()[0].html_body;
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;"));
}

// --- メソッド・CORS ---

#[tokio::test]
async fn test_許可されていないメソッドは405を返す() {
    let app = create_test_app(MockNotificationSender::new());

    let response = app
        .router
        .oneshot(get_request("/sendAdmissionEmail"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        body_json(response).await,
        json!({"success": false, "error": "Method not allowed"})
    );
    assert!(app.sender.sent_emails().is_empty());
}

#[tokio::test]
async fn test_プリフライトにcorsヘッダを返す() {
    let app = create_test_app(MockNotificationSender::new());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/sendAdmissionEmail")
        .header(header::ORIGIN, "https://app.campuswave.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .contains("POST")
    );
    assert!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .contains("content-type")
    );
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
    assert!(app.sender.sent_emails().is_empty());
}

// --- リクエスト ID ---

#[tokio::test]
async fn test_レスポンスにリクエストidが付与される() {
    let app = create_test_app(MockNotificationSender::new());

    let response = app.router.oneshot(get_request("/health")).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_受け取ったリクエストidをそのまま返す() {
    let app = create_test_app(MockNotificationSender::new());
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
}
