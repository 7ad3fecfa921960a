//! # Notifier サーバー
//!
//! 入学申請の通知メールを送るサービスのエントリーポイント。
//!
//! ## 起動の流れ
//!
//! 1. `.env` 読み込みとトレーシング初期化
//! 2. 設定読み込み（[`NotifierConfig::from_env`]）
//! 3. データベース接続とマイグレーション
//! 4. メール送信バックエンドの構築（プロセス内で 1 つだけ作り、注入する）
//! 5. 申請ウォッチャーの起動（`WATCHER_ENABLED=false` で無効化）
//! 6. HTTP サーバー起動
//!
//! ## 停止
//!
//! Ctrl-C / SIGTERM で HTTP サーバーを graceful shutdown した後、
//! ウォッチャーに停止を通知し、購読の解放を待ってから終了する。
//! ウォッチャーが自ら停止した場合（購読開始の失敗、フィードの終了）も
//! サーバーを停止し、エラーとしてプロセスを終了する。

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use campuswave_domain::clock::SystemClock;
use campuswave_infra::{
    change_feed::PgSubmissionChangeFeed,
    db,
    notification::{
        NoopNotificationSender,
        NotificationSender,
        SesNotificationSender,
        SmtpNotificationSender,
        SmtpSettings,
    },
    repository::{PostgresSubmissionRepository, SubmissionRepository},
};
use campuswave_notifier::{
    app_builder::build_app,
    config::{NotificationBackend, NotificationConfig, NotifierConfig},
    usecase::{
        Mailer,
        NotificationService,
        SubmissionWatcher,
        TemplateRenderer,
        WatcherExit,
        WatcherTask,
    },
};
use campuswave_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    init_tracing(TracingConfig::from_env("notifier"));
    let _tracing_guard = tracing::info_span!("app", service = "notifier").entered();

    let config = NotifierConfig::from_env().context("設定の読み込みに失敗しました")?;

    tracing::info!(
        "Notifier サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    let pool = db::create_pool(&config.database_url)
        .await
        .context("データベース接続に失敗しました")?;
    tracing::info!("データベースに接続しました");

    db::run_migrations(&pool)
        .await
        .context("マイグレーションの実行に失敗しました")?;
    tracing::info!("マイグレーションを適用しました");

    // 依存コンポーネントを初期化
    let sender = build_sender(&config.notification).await?;
    let renderer = TemplateRenderer::new(
        config.notification.approval_base_url.clone(),
        Arc::new(SystemClock),
    )
    .context("メールテンプレートの読み込みに失敗しました")?;
    let mailer = Mailer::new(sender, config.notification.default_recipients.clone());
    let notifications = Arc::new(NotificationService::new(
        renderer,
        mailer,
        config.notification.feedback_recipient.clone(),
    ));
    let repository: Arc<dyn SubmissionRepository> =
        Arc::new(PostgresSubmissionRepository::new(pool.clone()));

    // 申請ウォッチャー
    let mut watcher = if config.watcher_enabled {
        let watcher = SubmissionWatcher::new(
            Arc::new(PgSubmissionChangeFeed::new(pool)),
            repository.clone(),
            notifications.clone(),
        );
        Some(watcher.spawn())
    } else {
        tracing::info!("申請ウォッチャーは無効です");
        None
    };
    let watcher_exit = watcher.as_mut().map(WatcherTask::exit_signal);

    let app = build_app(notifications, repository);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("アドレスのパースに失敗しました")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Notifier サーバーが起動しました: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = shutdown_signal() => {},
                () = wait_for(watcher_exit) => {
                    tracing::error!("申請ウォッチャーが停止したためサーバーを停止します");
                }
            }
        })
        .await?;

    if let Some(watcher) = watcher
        && watcher.stop().await == WatcherExit::Unexpected
    {
        anyhow::bail!("申請ウォッチャーが異常終了しました");
    }

    tracing::info!("Notifier サーバーを停止しました");
    Ok(())
}

/// 設定に応じた送信バックエンドを構築する
async fn build_sender(config: &NotificationConfig) -> anyhow::Result<Arc<dyn NotificationSender>> {
    let sender: Arc<dyn NotificationSender> = match config.backend {
        NotificationBackend::Smtp => {
            tracing::info!(
                "SMTP で送信します: {}:{} ({})",
                config.smtp_host,
                config.smtp_port,
                config.smtp_tls
            );
            Arc::new(
                SmtpNotificationSender::new(SmtpSettings {
                    host:     config.smtp_host.clone(),
                    port:     config.smtp_port,
                    tls:      config.smtp_tls,
                    username: config.mail_user.clone(),
                    password: config.mail_pass.clone(),
                })
                .context("SMTP 送信の初期化に失敗しました")?,
            )
        }
        NotificationBackend::Ses => {
            tracing::info!("Amazon SES で送信します");
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Arc::new(SesNotificationSender::new(
                aws_sdk_sesv2::Client::new(&aws_config),
                config.mail_user.clone(),
            ))
        }
        NotificationBackend::Noop => {
            tracing::warn!("メールは送信されません（noop バックエンド）");
            Arc::new(NoopNotificationSender)
        }
    };
    Ok(sender)
}

/// `future` があれば完了を待ち、なければ永久に待つ
async fn wait_for(future: Option<impl Future<Output = ()>>) {
    match future {
        Some(future) => future.await,
        None => std::future::pending::<()>().await,
    }
}

/// Ctrl-C または SIGTERM を待つ
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Ctrl-C ハンドラの登録に失敗しました: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("SIGTERM ハンドラの登録に失敗しました: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("停止シグナルを受信しました");
}
