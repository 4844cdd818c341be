use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::CoverLetter;

/// A cover letter as returned to its owner.
#[derive(Debug, Serialize)]
pub struct CoverLetterOut {
    pub id: Uuid,
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

impl From<CoverLetter> for CoverLetterOut {
    fn from(c: CoverLetter) -> Self {
        Self {
            id: c.id,
            input_full_name: c.input_full_name,
            job_title: c.job_title,
            company_name: c.company_name,
            tone: c.tone,
            job_description: c.job_description,
            extra_notes: c.extra_notes,
            resume_text: c.resume_text,
            ai_draft: c.ai_draft,
            edited_final: c.edited_final,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEditedFinalRequest {
    pub edited_final: String,
}
