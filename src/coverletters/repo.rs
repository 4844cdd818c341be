use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{CoverLetter, NewCoverLetter};

const COLUMNS: &str = "id, user_id, input_full_name, job_title, company_name, tone, \
     job_description, extra_notes, resume_text, ai_draft, edited_final, created_at, updated_at";

// Every lookup below is scoped by `user_id`; a row owned by someone else is
// indistinguishable from a missing one.
impl CoverLetter {
    pub async fn insert(db: &PgPool, user_id: Uuid, new: &NewCoverLetter) -> sqlx::Result<Self> {
        sqlx::query_as::<_, CoverLetter>(&format!(
            r#"
            INSERT INTO cover_letters
                (user_id, input_full_name, job_title, company_name, tone,
                 job_description, extra_notes, resume_text, ai_draft)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.input_full_name)
        .bind(&new.job_title)
        .bind(&new.company_name)
        .bind(&new.tone)
        .bind(&new.job_description)
        .bind(&new.extra_notes)
        .bind(&new.resume_text)
        .bind(&new.ai_draft)
        .fetch_one(db)
        .await
    }

    /// Newest first.
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, CoverLetter>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM cover_letters
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn find_owned(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, CoverLetter>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM cover_letters
            WHERE id = $1 AND user_id = $2
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    pub async fn set_edited_final(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        edited_final: &str,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, CoverLetter>(&format!(
            r#"
            UPDATE cover_letters
            SET edited_final = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(edited_final)
        .fetch_optional(db)
        .await
    }

    pub async fn delete_owned(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM cover_letters WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
