//! # SubmissionRepository
//!
//! 入学申請ドキュメントの永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **サーバー時刻**: 送信日時・試行日時・更新日時はすべて DB の `now()` で記録する
//! - **冪等な更新**: `update_status` は同じ値で何度呼んでも結果が変わらない
//! - **後勝ち**: 同一申請への同時更新はロックせず、最後の書き込みが残る

use async_trait::async_trait;
use campuswave_domain::submission::{
    AdmissionForm,
    AdmissionStatus,
    DeliveryState,
    Submission,
    SubmissionId,
    SubmissionRecord,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::InfraError;

/// 申請リポジトリトレイト
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// 申請を挿入する
    async fn insert(&self, submission: &Submission) -> Result<(), InfraError>;

    /// ID で申請を検索する
    async fn find_by_id(&self, id: &SubmissionId) -> Result<Option<Submission>, InfraError>;

    /// 通知メール未送信（`email_sent = false`）の申請を作成日時順で取得する
    async fn find_unsent(&self) -> Result<Vec<Submission>, InfraError>;

    /// 送信成功を記録する（`email_sent = true`、直前のエラーは消去）
    ///
    /// 該当する申請が存在しない場合は何もせず `false` を返す。
    async fn mark_email_sent(&self, id: &SubmissionId) -> Result<bool, InfraError>;

    /// 送信失敗を記録する（`email_sent` は false のまま）
    ///
    /// 該当する申請が存在しない場合は何もせず `false` を返す。
    async fn record_email_error(
        &self,
        id: &SubmissionId,
        message: &str,
    ) -> Result<bool, InfraError>;

    /// 審査ステータスを更新する
    ///
    /// 該当する申請が存在しない場合は何もせず `false` を返す。
    async fn update_status(
        &self,
        id: &SubmissionId,
        status: AdmissionStatus,
    ) -> Result<bool, InfraError>;
}

/// DB の行（`admission_submissions`）
#[derive(Debug, sqlx::FromRow)]
struct SubmissionRow {
    id:                 String,
    parent_name:        Option<String>,
    parent_email:       Option<String>,
    phone:              Option<String>,
    child_name:         Option<String>,
    gender:             Option<String>,
    child_dob:          Option<String>,
    grade_applying:     Option<String>,
    campus:             Option<String>,
    test_date:          Option<String>,
    notes:              Option<String>,
    image_base64:       Option<String>,
    email_to:           Vec<String>,
    status:             String,
    email_sent:         bool,
    email_sent_at:      Option<DateTime<Utc>>,
    email_error:        Option<String>,
    email_attempted_at: Option<DateTime<Utc>>,
    created_at:         DateTime<Utc>,
    updated_at:         Option<DateTime<Utc>>,
}

impl SubmissionRow {
    /// ドメインモデルに変換する
    fn into_submission(self) -> Result<Submission, InfraError> {
        let row = self;
        let status: AdmissionStatus = row.status.parse()?;
        let delivery = DeliveryState::from_columns(
            row.email_sent,
            row.email_sent_at,
            row.email_error,
            row.email_attempted_at,
            row.updated_at.unwrap_or(row.created_at),
        );

        Ok(Submission::from_db(SubmissionRecord {
            id: SubmissionId::parse(&row.id)?,
            form: AdmissionForm {
                parent_name:    row.parent_name,
                parent_email:   row.parent_email,
                phone:          row.phone,
                child_name:     row.child_name,
                gender:         row.gender,
                child_dob:      row.child_dob,
                grade_applying: row.grade_applying,
                campus:         row.campus,
                test_date:      row.test_date,
                notes:          row.notes,
                image_base64:   row.image_base64,
                email_to:       row.email_to,
            },
            status,
            delivery,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, parent_name, parent_email, phone, child_name, gender, child_dob,
        grade_applying, campus, test_date, notes, image_base64, email_to,
        status, email_sent, email_sent_at, email_error, email_attempted_at,
        created_at, updated_at
    FROM admission_submissions
"#;

/// PostgreSQL 実装の SubmissionRepository
#[derive(Debug, Clone)]
pub struct PostgresSubmissionRepository {
    pool: PgPool,
}

impl PostgresSubmissionRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepository for PostgresSubmissionRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(submission_id = %submission.id()))]
    async fn insert(&self, submission: &Submission) -> Result<(), InfraError> {
        let form = submission.form();
        let delivery = submission.delivery();
        let (email_sent_at, email_attempted_at) = match delivery {
            DeliveryState::Unsent => (None, None),
            DeliveryState::Sent { sent_at } => (Some(*sent_at), None),
            DeliveryState::Failed { attempted_at, .. } => (None, Some(*attempted_at)),
        };

        sqlx::query(
            r#"
            INSERT INTO admission_submissions (
                id, parent_name, parent_email, phone, child_name, gender, child_dob,
                grade_applying, campus, test_date, notes, image_base64, email_to,
                status, email_sent, email_sent_at, email_error, email_attempted_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(submission.id().as_str())
        .bind(&form.parent_name)
        .bind(&form.parent_email)
        .bind(&form.phone)
        .bind(&form.child_name)
        .bind(&form.gender)
        .bind(&form.child_dob)
        .bind(&form.grade_applying)
        .bind(&form.campus)
        .bind(&form.test_date)
        .bind(&form.notes)
        .bind(&form.image_base64)
        .bind(&form.email_to)
        .bind(submission.status().to_string())
        .bind(delivery.email_sent())
        .bind(email_sent_at)
        .bind(delivery.email_error())
        .bind(email_attempted_at)
        .bind(submission.created_at())
        .bind(submission.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(submission_id = %id))]
    async fn find_by_id(&self, id: &SubmissionId) -> Result<Option<Submission>, InfraError> {
        let row: Option<SubmissionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = $1"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(SubmissionRow::into_submission).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_unsent(&self) -> Result<Vec<Submission>, InfraError> {
        let rows: Vec<SubmissionRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE email_sent = false ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubmissionRow::into_submission).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(submission_id = %id))]
    async fn mark_email_sent(&self, id: &SubmissionId) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE admission_submissions
            SET email_sent = true,
                email_sent_at = now(),
                email_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(submission_id = %id))]
    async fn record_email_error(
        &self,
        id: &SubmissionId,
        message: &str,
    ) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE admission_submissions
            SET email_error = $2,
                email_attempted_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(submission_id = %id, status = %status))]
    async fn update_status(
        &self,
        id: &SubmissionId,
        status: AdmissionStatus,
    ) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE admission_submissions
            SET status = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
