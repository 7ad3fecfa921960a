//! # Canonical Log Line ミドルウェア
//!
//! HTTP リクエスト完了時に、メソッド・パス・ステータス・レイテンシを 1 行に集約した
//! サマリログを出力する tower Layer。
//!
//! `TraceLayer` の内側に配置すると、リクエストスパンの `request_id` が
//! JSON ログに自動的に含まれる。
//!
//! ```text
//! SetRequestId → TraceLayer → CanonicalLogLineLayer → handler
//! ```
//!
//! ヘルスチェックと CORS プリフライト（`OPTIONS`）は出力しない。

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use http::{Method, Request, Response};
use tower::{Layer, Service};

/// サマリログの出力対象か
fn should_log(method: &Method, path: &str) -> bool {
    method != Method::OPTIONS && !path.starts_with("/health")
}

/// リクエスト 1 件分のサマリ
struct CanonicalLine {
    method: Method,
    path:   String,
    start:  Instant,
}

impl CanonicalLine {
    fn latency_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn completed(&self, status: http::StatusCode) {
        let latency_ms = self.latency_ms();
        if status.is_server_error() {
            tracing::warn!(
                log.r#type = "canonical",
                http.method = %self.method,
                http.path = %self.path,
                http.status_code = status.as_u16(),
                http.latency_ms = latency_ms,
                "リクエスト完了（サーバーエラー）"
            );
        } else {
            tracing::info!(
                log.r#type = "canonical",
                http.method = %self.method,
                http.path = %self.path,
                http.status_code = status.as_u16(),
                http.latency_ms = latency_ms,
                "リクエスト完了"
            );
        }
    }

    fn failed(&self, err: &dyn std::fmt::Display) {
        tracing::error!(
            log.r#type = "canonical",
            http.method = %self.method,
            http.path = %self.path,
            http.latency_ms = self.latency_ms(),
            error.message = %err,
            "リクエスト処理エラー"
        );
    }
}

/// Canonical Log Line を出力する Layer
#[derive(Clone, Debug)]
pub struct CanonicalLogLineLayer;

impl<S> Layer<S> for CanonicalLogLineLayer {
    type Service = CanonicalLogLineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CanonicalLogLineService { inner }
    }
}

/// [`CanonicalLogLineLayer`] が生成する Service
#[derive(Clone, Debug)]
pub struct CanonicalLogLineService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CanonicalLogLineService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Display + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // poll_ready 済みの inner を使い、self には新しい clone を残す
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if !should_log(req.method(), req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let line = CanonicalLine {
            method: req.method().clone(),
            path:   req.uri().path().to_owned(),
            start:  Instant::now(),
        };

        Box::pin(async move {
            let result = inner.call(req).await;
            match &result {
                Ok(response) => line.completed(response.status()),
                Err(err) => line.failed(err),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[derive(Clone)]
    struct StatusService {
        status: http::StatusCode,
    }

    impl Service<Request<()>> for StatusService {
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
        type Response = Response<()>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<()>) -> Self::Future {
            let status = self.status;
            Box::pin(async move { Ok(Response::builder().status(status).body(()).unwrap()) })
        }
    }

    #[derive(Clone)]
    struct FailingService;

    impl Service<Request<()>> for FailingService {
        type Error = String;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
        type Response = Response<()>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<()>) -> Self::Future {
            Box::pin(async { Err("connection reset".to_string()) })
        }
    }

    #[derive(Debug, Clone)]
    struct Captured {
        level:   tracing::Level,
        message: String,
        fields:  Vec<(String, String)>,
    }

    impl Captured {
        fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    #[derive(Clone)]
    struct CaptureLayer {
        events: Arc<Mutex<Vec<Captured>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = FieldVisitor::default();
            event.record(&mut visitor);
            self.events.lock().unwrap().push(Captured {
                level:   *event.metadata().level(),
                message: visitor.message.unwrap_or_default(),
                fields:  visitor.fields,
            });
        }
    }

    #[derive(Default)]
    struct FieldVisitor {
        message: Option<String>,
        fields:  Vec<(String, String)>,
    }

    impl tracing::field::Visit for FieldVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            let text = format!("{value:?}");
            if field.name() == "message" {
                self.message = Some(text);
            } else {
                self.fields.push((field.name().to_string(), text));
            }
        }

        fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
            self.fields.push((field.name().to_string(), value.to_string()));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            if field.name() == "message" {
                self.message = Some(value.to_string());
            } else {
                self.fields.push((field.name().to_string(), value.to_string()));
            }
        }
    }

    fn setup_capture() -> (tracing::subscriber::DefaultGuard, Arc<Mutex<Vec<Captured>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(CaptureLayer {
            events: events.clone(),
        });
        (tracing::subscriber::set_default(subscriber), events)
    }

    fn request(method: Method, path: &str) -> Request<()> {
        Request::builder().method(method).uri(path).body(()).unwrap()
    }

    #[test]
    fn test_ヘルスチェックとプリフライトは対象外() {
        assert!(!should_log(&Method::GET, "/health"));
        assert!(!should_log(&Method::OPTIONS, "/sendAdmissionEmail"));
        assert!(should_log(&Method::POST, "/sendAdmissionEmail"));
        assert!(should_log(&Method::GET, "/admissionApproval"));
    }

    #[tokio::test]
    async fn test_正常リクエストでメソッドとパスとステータスが出力される() {
        let (_guard, events) = setup_capture();
        let mut sut = CanonicalLogLineLayer.layer(StatusService {
            status: http::StatusCode::OK,
        });

        let response = sut
            .call(request(Method::POST, "/sendFeedbackEmail"))
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].level, tracing::Level::INFO);
        assert_eq!(captured[0].message, "リクエスト完了");
        assert_eq!(captured[0].field("log.type"), Some("canonical"));
        assert_eq!(captured[0].field("http.method"), Some("POST"));
        assert_eq!(captured[0].field("http.path"), Some("/sendFeedbackEmail"));
        assert_eq!(captured[0].field("http.status_code"), Some("200"));
        assert!(captured[0].field("http.latency_ms").is_some());
    }

    #[tokio::test]
    async fn test_5xxはwarnレベルで出力される() {
        let (_guard, events) = setup_capture();
        let mut sut = CanonicalLogLineLayer.layer(StatusService {
            status: http::StatusCode::INTERNAL_SERVER_ERROR,
        });

        let response = sut
            .call(request(Method::POST, "/sendAdmissionEmail"))
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        let captured = events.lock().unwrap();
        assert_eq!(captured[0].level, tracing::Level::WARN);
        assert_eq!(captured[0].field("http.status_code"), Some("500"));
    }

    #[tokio::test]
    async fn test_ヘルスチェックではログが出力されない() {
        let (_guard, events) = setup_capture();
        let mut sut = CanonicalLogLineLayer.layer(StatusService {
            status: http::StatusCode::OK,
        });

        sut.call(request(Method::GET, "/health")).await.unwrap();

        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serviceエラー時にerrorレベルで出力される() {
        let (_guard, events) = setup_capture();
        let mut sut = CanonicalLogLineLayer.layer(FailingService);

        let result = sut.call(request(Method::GET, "/admissionApproval")).await;
        assert!(result.is_err());

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].level, tracing::Level::ERROR);
        assert_eq!(captured[0].message, "リクエスト処理エラー");
        assert_eq!(captured[0].field("error.message"), Some("connection reset"));
    }
}
