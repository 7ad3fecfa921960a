//! # ビジネスイベントログ
//!
//! メール送信や審査結果など、運用上追跡したい出来事を構造化ログとして出力する。
//!
//! [`log_business_event!`] マクロは `event.kind = "business_event"` マーカーを自動付与するので、
//! JSON ログを `jq 'select(.["event.kind"] == "business_event")'` で抽出できる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`event.action`）を使用する。
//! JSON 出力ではフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: [`event::category`] の定数
/// - `event.action`: [`event::action`] の定数
/// - `event.result`: [`event::result`] の定数
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: [`event::entity_type`] の定数
/// - `event.entity_id`: 申請 ID など
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const NOTIFICATION: &str = "notification";
        pub const ADMISSION: &str = "admission";
        pub const FEEDBACK: &str = "feedback";
    }

    /// イベントアクション
    pub mod action {
        // 通知メール
        pub const NOTIFICATION_SENT: &str = "notification.sent";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";

        // 審査
        pub const ADMISSION_APPROVED: &str = "admission.approved";
        pub const ADMISSION_REJECTED: &str = "admission.rejected";

        // フィードバック
        pub const FEEDBACK_SENT: &str = "feedback.sent";
        pub const FEEDBACK_FAILED: &str = "feedback.failed";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const SUBMISSION: &str = "submission";
        pub const FEEDBACK: &str = "feedback";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
///
/// `tracing::error!` に `error.category` + `error.kind` を添えて使う。
pub mod error {
    pub mod category {
        /// DB、変更フィード
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// メールリレー
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const CHANGE_FEED: &str = "change_feed";
        pub const MAIL_DELIVERY: &str = "mail_delivery";
        pub const TEMPLATE: &str = "template";
        pub const INTERNAL: &str = "internal";
    }
}
