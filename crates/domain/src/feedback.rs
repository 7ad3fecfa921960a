//! # フィードバック
//!
//! 学生・教員からの自由記述フィードバック。永続化せず、メールで転送するだけ。

use crate::{DomainError, submission::non_blank};

/// フィードバック
///
/// メッセージは前後の空白を除去済みで、空でないことを保証する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    message:    String,
    role:       Option<String>,
    user_email: Option<String>,
}

impl Feedback {
    /// フィードバックを作成する
    ///
    /// # エラー
    ///
    /// メッセージが未指定・空白のみの場合は `DomainError::Validation` を返す。
    pub fn new(
        message: Option<String>,
        role: Option<String>,
        user_email: Option<String>,
    ) -> Result<Self, DomainError> {
        let message = non_blank(message)
            .map(|m| m.trim().to_string())
            .ok_or_else(|| DomainError::Validation("Message required".to_string()))?;

        Ok(Self {
            message,
            role: non_blank(role).map(|r| r.trim().to_string()),
            user_email: non_blank(user_email).map(|e| e.trim().to_string()),
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }
}
