//! # ドメイン層エラー定義
//!
//! 入力検証の失敗や存在しない申請など、ドメイン固有の例外状態を表現する。
//!
//! ## エラーの種類と HTTP ステータスの対応
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | リクエストフィールドの欠落・不正 |
//! | `NotFound` | 404 Not Found | 申請 ID が存在しない |
//!
//! ## 使用例
//!
//! ```rust
//! use campuswave_domain::DomainError;
//!
//! fn validate_message(message: &str) -> Result<(), DomainError> {
//!     if message.trim().is_empty() {
//!         return Err(DomainError::Validation("Message required".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_message("  ").is_err());
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
///
/// API 層でこのエラーを受け取り、適切な HTTP レスポンスに変換する。
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 必須フィールドの欠落、許可されていない値など。
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// エンティティが見つからない
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        /// エンティティの種類（"Submission" など）
        entity_type: &'static str,
        /// 検索に使用した識別子
        id:          String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_foundのメッセージにエンティティ種別とidが含まれる() {
        let err = DomainError::NotFound {
            entity_type: "Submission",
            id:          "abc123".to_string(),
        };

        assert_eq!(err.to_string(), "Submission が見つかりません: abc123");
    }
}
