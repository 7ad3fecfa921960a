//! # 操作結果レスポンス
//!
//! メール送信エンドポイントが返す `{success, message | error}` 形式の JSON。
//! モバイルアプリが `success` と `error` を直接参照するため、形を変えないこと。

use serde::Serialize;

/// 操作結果レスポンス
///
/// `message` と `error` は値がある場合のみ出力する。
///
/// ```
/// use campuswave_shared::ActionResponse;
///
/// let ok = ActionResponse::ok("Email sent successfully");
/// assert!(ok.success);
///
/// let ng = ActionResponse::error("Message required");
/// assert!(!ng.success);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:   Option<String>,
}

impl ActionResponse {
    /// 成功レスポンス
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error:   None,
        }
    }

    /// 失敗レスポンス
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error:   Some(error.into()),
        }
    }
}
