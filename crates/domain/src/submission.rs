//! # 入学申請（Submission）
//!
//! モバイルアプリが作成する入学申請ドキュメントと、その審査ステータス・
//! 通知メールの配信状態を定義する。
//!
//! ## 設計方針
//!
//! - **フォームは緩く受け取る**: モバイルアプリは任意項目を空文字で送ることがあるため、
//!   空白のみの値は「未入力」として扱う
//! - **配信状態は ADT**: `emailSent` と `emailError` の不正な組み合わせを型で防ぐ
//! - **変更はストア経由**: このシステムが申請を削除することはない
//!
//! ## ライフサイクル
//!
//! ```text
//! 作成（モバイル） → Unsent ─送信成功→ Sent
//!                     │
//!                     └─送信失敗→ Failed（Unsent と同じく未送信扱い）
//!
//! status: pending ─approve→ approved
//!                 └reject──→ rejected   （何度でも上書き可能）
//! ```

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

// =========================================================================
// SubmissionId
// =========================================================================

/// 申請 ID（値オブジェクト）
///
/// ストアが採番する不透明な文字列。前後の空白を除去し、空でないことを保証する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[display("{_0}")]
#[serde(try_from = "String", into = "String")]
pub struct SubmissionId(String);

impl SubmissionId {
    /// 文字列から申請 ID を作成する
    ///
    /// # エラー
    ///
    /// 空文字または空白のみの場合は `DomainError::Validation` を返す。
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Validation(
                "申請 ID は必須です".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SubmissionId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubmissionId> for String {
    fn from(id: SubmissionId) -> Self {
        id.0
    }
}

// =========================================================================
// AdmissionStatus / ApprovalAction
// =========================================================================

/// 審査ステータス
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "snake_case")]
pub enum AdmissionStatus {
    /// 審査待ち（作成時の初期値）
    #[default]
    Pending,
    /// 承認
    Approved,
    /// 却下
    Rejected,
}

impl std::str::FromStr for AdmissionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(DomainError::Validation(format!(
                "不正な審査ステータス: {}",
                s
            ))),
        }
    }
}

/// 承認リンクのアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl ApprovalAction {
    /// アクション適用後のステータス
    pub fn resulting_status(self) -> AdmissionStatus {
        match self {
            Self::Approve => AdmissionStatus::Approved,
            Self::Reject => AdmissionStatus::Rejected,
        }
    }
}

impl std::str::FromStr for ApprovalAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(DomainError::Validation(format!(
                "不正なアクション: {}",
                s
            ))),
        }
    }
}

// =========================================================================
// AdmissionForm
// =========================================================================

/// 入学申請フォームの入力内容
///
/// すべて任意項目。空白のみの値はデシリアライズ時に `None` になる。
/// `emailTo` は文字列単体と配列の両方を受け付ける。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionForm {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub parent_name:    Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub parent_email:   Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub phone:          Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub child_name:     Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub gender:         Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub child_dob:      Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub grade_applying: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub campus:         Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub test_date:      Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub notes:          Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub image_base64:   Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub email_to:       Vec<String>,
}

/// 空白のみの文字列を `None` に正規化する
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_blank(Option::<String>::deserialize(deserializer)?))
}

/// 文字列単体・配列・null のいずれかで届く宛先リスト
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// `"a@b.com"` / `["a@b.com", ...]` / `null` を空要素なしの `Vec` に変換する
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<OneOrMany>::deserialize(deserializer)?;
    let values = match raw {
        None => Vec::new(),
        Some(OneOrMany::One(one)) => vec![one],
        Some(OneOrMany::Many(many)) => many,
    };
    Ok(values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

// =========================================================================
// DeliveryState
// =========================================================================

/// 通知メールの配信状態
///
/// `Failed` は未送信扱いのままなので、ウォッチャーの購読条件
/// （`emailSent == false`）に引き続き一致する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// 未送信
    Unsent,
    /// 送信済み
    Sent { sent_at: DateTime<Utc> },
    /// 送信失敗（直近の試行結果）
    Failed {
        error:        String,
        attempted_at: DateTime<Utc>,
    },
}

impl DeliveryState {
    /// DB の列から配信状態を復元する
    ///
    /// `email_sent` が真なら他の列に関わらず送信済み。送信日時が欠けていれば
    /// `fallback_at` を使う。
    pub fn from_columns(
        email_sent: bool,
        email_sent_at: Option<DateTime<Utc>>,
        email_error: Option<String>,
        email_attempted_at: Option<DateTime<Utc>>,
        fallback_at: DateTime<Utc>,
    ) -> Self {
        if email_sent {
            return Self::Sent {
                sent_at: email_sent_at.unwrap_or(fallback_at),
            };
        }
        match email_error {
            Some(error) => Self::Failed {
                error,
                attempted_at: email_attempted_at.unwrap_or(fallback_at),
            },
            None => Self::Unsent,
        }
    }

    /// `emailSent` フラグ
    pub fn email_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    /// `emailError` の値
    pub fn email_error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

// =========================================================================
// Submission
// =========================================================================

/// 入学申請エンティティ
///
/// # 不変条件
///
/// - `delivery` が `Sent` なら `email_error` は存在しない
/// - `emailSent == true` になった申請はウォッチャーの購読条件から外れる
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    id:         SubmissionId,
    form:       AdmissionForm,
    status:     AdmissionStatus,
    delivery:   DeliveryState,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

/// DB から復元するためのパラメータ
pub struct SubmissionRecord {
    pub id:         SubmissionId,
    pub form:       AdmissionForm,
    pub status:     AdmissionStatus,
    pub delivery:   DeliveryState,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// 新しい申請を作成する（ステータスは pending、未送信）
    pub fn new(id: SubmissionId, form: AdmissionForm, now: DateTime<Utc>) -> Self {
        Self {
            id,
            form,
            status: AdmissionStatus::Pending,
            delivery: DeliveryState::Unsent,
            created_at: now,
            updated_at: None,
        }
    }

    /// 既存のデータから復元する
    pub fn from_db(record: SubmissionRecord) -> Self {
        Self {
            id:         record.id,
            form:       record.form,
            status:     record.status,
            delivery:   record.delivery,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    // Getter メソッド

    pub fn id(&self) -> &SubmissionId {
        &self.id
    }

    pub fn form(&self) -> &AdmissionForm {
        &self.form
    }

    pub fn status(&self) -> AdmissionStatus {
        self.status
    }

    pub fn delivery(&self) -> &DeliveryState {
        &self.delivery
    }

    pub fn email_sent(&self) -> bool {
        self.delivery.email_sent()
    }

    pub fn email_error(&self) -> Option<&str> {
        self.delivery.email_error()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// ウォッチャーの購読条件（`emailSent == false`）に一致するか
    pub fn awaits_notification(&self) -> bool {
        !self.email_sent()
    }

    // 状態遷移メソッド

    /// 審査ステータスを更新した新しいインスタンスを返す
    pub fn with_status(self, status: AdmissionStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: Some(now),
            ..self
        }
    }

    /// 送信成功を記録した新しいインスタンスを返す（直前のエラーは消える）
    pub fn delivered(self, now: DateTime<Utc>) -> Self {
        Self {
            delivery: DeliveryState::Sent { sent_at: now },
            ..self
        }
    }

    /// 送信失敗を記録した新しいインスタンスを返す
    pub fn delivery_failed(self, error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            delivery: DeliveryState::Failed {
                error:        error.into(),
                attempted_at: now,
            },
            ..self
        }
    }
}
