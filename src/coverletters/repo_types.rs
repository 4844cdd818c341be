use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CoverLetter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub input_full_name: String,
    pub job_title: String,
    pub company_name: String,
    pub tone: String,
    pub job_description: String,
    pub extra_notes: Option<String>,
    pub resume_text: String,
    pub ai_draft: String,
    pub edited_final: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl CoverLetter {
    /// Text that goes into an export: the user's edit once there is one.
    pub fn export_body(&self) -> &str {
        self.edited_final.as_deref().unwrap_or(&self.ai_draft)
    }
}

/// Column values for a freshly generated letter.
#[derive(Debug, Clone)]
pub struct NewCoverLetter {
    pub input_full_name: String,
    pub job_title: String,
    pub company_name: String,
    pub tone: String,
    pub job_description: String,
    pub extra_notes: Option<String>,
    pub resume_text: String,
    pub ai_draft: String,
}

#[cfg(test)]
pub(crate) fn sample(edited_final: Option<&str>) -> CoverLetter {
    CoverLetter {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        input_full_name: "Ada Lovelace".into(),
        job_title: "Analyst".into(),
        company_name: "Engines Ltd".into(),
        tone: "professional".into(),
        job_description: "Analyse the analytical engine.".into(),
        extra_notes: None,
        resume_text: "Wrote the first published program.".into(),
        ai_draft: "Draft from the model.".into(),
        edited_final: edited_final.map(str::to_string),
        created_at: OffsetDateTime::now_utc(),
        updated_at: None,
    }
}
