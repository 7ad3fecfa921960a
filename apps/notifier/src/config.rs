//! # Notifier 設定
//!
//! 環境変数から Notifier サーバーの設定を読み込む。
//!
//! 値の取得は [`NotifierConfig::from_lookup`] に渡す関数経由で行うため、
//! テストではプロセスの環境変数に触れずに検証できる。

use std::env;

use campuswave_infra::notification::SmtpTls;
use thiserror::Error;

/// 既定の通知先（入学事務局）
const DEFAULT_RECIPIENTS: [&str; 2] = [
    "admissions@campuswave.example.com",
    "registrar@campuswave.example.com",
];

/// 既定のフィードバック受信箱
const DEFAULT_FEEDBACK_RECIPIENT: &str = "feedback@campuswave.example.com";

/// noop バックエンドで `MAIL_USER` 未設定時の送信元
const NOOP_SENDER: &str = "noreply@campuswave.example.com";

/// 設定読み込みエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 必須の環境変数が未設定
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    /// 値が不正
    #[error("{name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// 送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationBackend {
    /// SMTP リレー（Gmail など）
    Smtp,
    /// Amazon SES v2
    Ses,
    /// 送信しない（ログ出力のみ）
    Noop,
}

/// Notifier サーバーの設定
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// バインドアドレス
    pub host:            String,
    /// ポート番号
    pub port:            u16,
    /// データベース接続 URL
    pub database_url:    String,
    /// 変更ウォッチャーを起動するか
    pub watcher_enabled: bool,
    /// 通知設定
    pub notification:    NotificationConfig,
}

/// 通知機能の設定
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub backend:            NotificationBackend,
    /// 送信元アドレス（SMTP 認証ユーザーを兼ねる）
    pub mail_user:          String,
    /// SMTP アプリパスワード
    pub mail_pass:          String,
    pub smtp_host:          String,
    pub smtp_port:          u16,
    pub smtp_tls:           SmtpTls,
    /// 宛先が指定されなかったときの通知先
    pub default_recipients: Vec<String>,
    /// フィードバックの送信先
    pub feedback_recipient: String,
    /// 承認リンクのベース URL（末尾スラッシュなし）
    pub approval_base_url:  String,
}

impl NotifierConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の取得関数から設定を読み込む
    ///
    /// 空文字列は未設定として扱う。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = get("NOTIFIER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or("NOTIFIER_PORT", get("NOTIFIER_PORT"), 8080)?;
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let watcher_enabled = parse_bool("WATCHER_ENABLED", get("WATCHER_ENABLED"), true)?;

        let backend = parse_or(
            "NOTIFICATION_BACKEND",
            get("NOTIFICATION_BACKEND"),
            NotificationBackend::Smtp,
        )?;

        let mail_user = match (backend, get("MAIL_USER")) {
            (_, Some(user)) => user,
            (NotificationBackend::Noop, None) => NOOP_SENDER.to_string(),
            (_, None) => return Err(ConfigError::Missing("MAIL_USER")),
        };
        let mail_pass = match (backend, get("MAIL_PASS")) {
            (_, Some(pass)) => pass,
            (NotificationBackend::Smtp, None) => return Err(ConfigError::Missing("MAIL_PASS")),
            (_, None) => String::new(),
        };

        let default_recipients = get("DEFAULT_RECIPIENTS")
            .map(|raw| split_recipients(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_RECIPIENTS.iter().map(|r| r.to_string()).collect());

        let approval_base_url = get("APPROVAL_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            host,
            port,
            database_url,
            watcher_enabled,
            notification: NotificationConfig {
                backend,
                mail_user,
                mail_pass,
                smtp_host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                smtp_port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                smtp_tls: parse_or("SMTP_TLS", get("SMTP_TLS"), SmtpTls::Starttls)?,
                default_recipients,
                feedback_recipient: get("FEEDBACK_RECIPIENT")
                    .unwrap_or_else(|| DEFAULT_FEEDBACK_RECIPIENT.to_string()),
                approval_base_url,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(default),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            name,
            value: v.to_string(),
        }),
    }
}

/// カンマ区切りの宛先リストを分割する
fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
