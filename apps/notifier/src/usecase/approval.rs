//! # 承認ユースケース
//!
//! 承認リンクのクエリ（`submissionId`, `action`）を検証し、申請の審査ステータスを更新する。
//!
//! ## 設計方針
//!
//! - **検証してから書く**: 不正なアクションや存在しない申請では一切書き込まない
//! - **冪等**: 同じアクションを繰り返しても同じステータスを書き直すだけ
//! - **後勝ち**: 承認と却下が同時に届いた場合は最後の書き込みが残る
//! - **認証なし**: リンクは入学事務局にのみメールされる前提

use std::sync::Arc;

use campuswave_domain::{
    DomainError,
    submission::{AdmissionStatus, ApprovalAction, SubmissionId},
};
use campuswave_infra::repository::SubmissionRepository;
use campuswave_shared::{event_log::event, log_business_event};

use crate::error::NotifierError;

/// 承認操作の入力（クエリパラメータそのまま）
#[derive(Debug, Default)]
pub struct ApprovalInput {
    pub submission_id: Option<String>,
    pub action:        Option<String>,
}

/// 承認操作の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub submission_id: SubmissionId,
    pub status:        AdmissionStatus,
}

/// 承認ユースケース
pub struct ApprovalUseCaseImpl {
    repository: Arc<dyn SubmissionRepository>,
}

impl ApprovalUseCaseImpl {
    pub fn new(repository: Arc<dyn SubmissionRepository>) -> Self {
        Self { repository }
    }

    /// 承認・却下を適用する
    ///
    /// 1. `submissionId` と `action` の検証（不正なら BadRequest）
    /// 2. 申請の存在確認（無ければ NotFound）
    /// 3. ステータスと更新日時の書き込み
    pub async fn apply(&self, input: ApprovalInput) -> Result<ApprovalOutcome, NotifierError> {
        let submission_id = SubmissionId::parse(input.submission_id.as_deref().unwrap_or(""))?;
        let action: ApprovalAction = input.action.as_deref().unwrap_or("").trim().parse()?;
        let status = action.resulting_status();

        if self.repository.find_by_id(&submission_id).await?.is_none() {
            return Err(not_found(&submission_id));
        }

        // 存在確認と更新の間に消えた場合も NotFound として扱う
        if !self.repository.update_status(&submission_id, status).await? {
            return Err(not_found(&submission_id));
        }

        let action_name = match action {
            ApprovalAction::Approve => event::action::ADMISSION_APPROVED,
            ApprovalAction::Reject => event::action::ADMISSION_REJECTED,
        };
        log_business_event!(
            event.category = event::category::ADMISSION,
            event.action = action_name,
            event.entity_type = event::entity_type::SUBMISSION,
            event.entity_id = %submission_id,
            event.result = event::result::SUCCESS,
            "審査ステータス更新"
        );

        Ok(ApprovalOutcome {
            submission_id,
            status,
        })
    }
}

fn not_found(id: &SubmissionId) -> NotifierError {
    DomainError::NotFound {
        entity_type: "Submission",
        id:          id.to_string(),
    }
    .into()
}
