//! # Campus Wave ドメイン層
//!
//! 入学申請通知の中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **申請（Submission）**: モバイルアプリが作成する入学申請ドキュメント
//! - **配信状態**: 通知メールの送信結果を ADT で表現し、不正な組み合わせを防ぐ
//! - **通知**: メールメッセージと送信エラーの型
//!
//! ## 依存関係の方向
//!
//! ```text
//! apps → infra → domain
//!    ↘     ↓
//!      shared
//! ```
//!
//! ドメイン層はインフラ層（DB、SMTP）に一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`submission`] - 入学申請と審査ステータス
//! - [`feedback`] - 自由記述フィードバック
//! - [`notification`] - メールメッセージと通知エラー
//! - [`clock`] - 時刻プロバイダ
//! - [`error`] - ドメイン層エラー
//!
//! ## 使用例
//!
//! ```rust
//! use campuswave_domain::submission::{AdmissionStatus, ApprovalAction};
//!
//! let action: ApprovalAction = "approve".parse().unwrap();
//! assert_eq!(action.resulting_status(), AdmissionStatus::Approved);
//! ```

pub mod clock;
pub mod error;
pub mod feedback;
pub mod notification;
pub mod submission;

pub use error::DomainError;
