use std::sync::Arc;

use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::Bytes;
use tracing::warn;

use crate::{
    errors::AppError,
    extract::{normalize_text, ResumeExtractor, ResumeKind},
    llm::{DraftRequest, Tone},
};

/// Largest résumé accepted, measured on the buffered upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// Body ceiling for the generate route: the résumé limit plus the text fields.
pub const GENERATE_BODY_LIMIT: usize = 2 * MAX_UPLOAD_BYTES;
const MIN_RESUME_CHARS: usize = 50;

const NAME_MAX: usize = 200;
const JOB_DESCRIPTION_MIN: usize = 20;
const JOB_DESCRIPTION_MAX: usize = 20_000;
const EXTRA_NOTES_MAX: usize = 5_000;
const EDITED_FINAL_MAX: usize = 30_000;

const UNUSABLE_RESUME: &str = "Could not extract usable text from resume";

#[derive(Debug)]
pub struct ResumeUpload {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Raw multipart fields of a generate request.
#[derive(Debug, Default)]
pub struct GenerateForm {
    pub input_full_name: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub tone: Option<String>,
    pub job_description: Option<String>,
    pub extra_notes: Option<String>,
}

/// Validated text fields; the résumé is still to be extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateInput {
    pub input_full_name: String,
    pub job_title: String,
    pub company_name: String,
    pub tone: Tone,
    pub job_description: String,
    pub extra_notes: Option<String>,
}

impl GenerateInput {
    pub fn into_draft_request(self, resume_text: String) -> DraftRequest {
        DraftRequest {
            input_full_name: self.input_full_name,
            job_title: self.job_title,
            company_name: self.company_name,
            tone: self.tone,
            job_description: self.job_description,
            resume_text,
            extra_notes: self.extra_notes,
        }
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::bad_input("Resume file too large (max 5MB)");
    }
    warn!(error = %e, "unreadable multipart body");
    AppError::bad_input("Invalid multipart body")
}

/// Buffers every known field. Unknown fields are skipped.
pub async fn read_generate_form(
    mut mp: Multipart,
) -> Result<(GenerateForm, Option<ResumeUpload>), AppError> {
    let mut form = GenerateForm::default();
    let mut resume = None;
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "resume" {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            resume = Some(ResumeUpload {
                content_type,
                bytes,
            });
            continue;
        }
        let slot = match name.as_str() {
            "input_full_name" => &mut form.input_full_name,
            "job_title" => &mut form.job_title,
            "company_name" => &mut form.company_name,
            "tone" => &mut form.tone,
            "job_description" => &mut form.job_description,
            "extra_notes" => &mut form.extra_notes,
            _ => continue,
        };
        *slot = Some(field.text().await.map_err(multipart_error)?);
    }
    Ok((form, resume))
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value.ok_or_else(|| AppError::bad_input(format!("Missing field: {field}")))
}

fn check_len(value: &str, field: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::bad_input(format!(
            "{field} must be {min}-{max} characters"
        )));
    }
    Ok(())
}

fn short_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    let value = required(value, field)?.trim().to_string();
    check_len(&value, field, 1, NAME_MAX)?;
    Ok(value)
}

pub fn validate_generate(form: GenerateForm) -> Result<GenerateInput, AppError> {
    let input_full_name = short_text(form.input_full_name, "input_full_name")?;
    let job_title = short_text(form.job_title, "job_title")?;
    let company_name = short_text(form.company_name, "company_name")?;

    let tone = required(form.tone, "tone")?
        .parse::<Tone>()
        .map_err(|_| AppError::bad_input("tone must be 'professional' or 'friendly'"))?;

    let job_description = required(form.job_description, "job_description")?;
    check_len(
        &job_description,
        "job_description",
        JOB_DESCRIPTION_MIN,
        JOB_DESCRIPTION_MAX,
    )?;

    let extra_notes = form.extra_notes.filter(|n| !n.trim().is_empty());
    if let Some(notes) = &extra_notes {
        check_len(notes, "extra_notes", 0, EXTRA_NOTES_MAX)?;
    }

    Ok(GenerateInput {
        input_full_name,
        job_title,
        company_name,
        tone,
        job_description,
        extra_notes,
    })
}

pub fn validate_edited_final(text: &str) -> Result<(), AppError> {
    check_len(text, "edited_final", 1, EDITED_FINAL_MAX)
}

/// Content type first, then size, both before the extractor sees a byte.
pub fn check_upload(upload: &ResumeUpload) -> Result<ResumeKind, AppError> {
    let kind = upload
        .content_type
        .as_deref()
        .and_then(ResumeKind::from_mime)
        .ok_or_else(|| AppError::bad_input("Resume must be a PDF or DOCX"))?;
    if upload.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::bad_input("Resume file too large (max 5MB)"));
    }
    Ok(kind)
}

/// Validates the upload, extracts on the blocking pool and normalizes the text.
pub async fn extract_resume(
    extractor: Arc<dyn ResumeExtractor>,
    upload: Option<ResumeUpload>,
) -> Result<String, AppError> {
    let upload = upload.ok_or_else(|| AppError::bad_input("Missing field: resume"))?;
    let kind = check_upload(&upload)?;

    let bytes = upload.bytes;
    let raw = tokio::task::spawn_blocking(move || extractor.extract(kind, &bytes))
        .await
        .map_err(|e| {
            warn!(error = %e, "resume extraction task failed");
            AppError::bad_input(UNUSABLE_RESUME)
        })?
        .map_err(|e| {
            warn!(error = %e, ?kind, "resume extraction failed");
            AppError::bad_input(UNUSABLE_RESUME)
        })?;

    let text = normalize_text(&raw);
    if text.chars().count() < MIN_RESUME_CHARS {
        return Err(AppError::bad_input(UNUSABLE_RESUME));
    }
    Ok(text)
}

pub fn export_title(input_full_name: &str) -> String {
    format!("{input_full_name} - Cover Letter")
}

/// `Cover_Letter_<company>_<title>.pdf` with anything outside `[A-Za-z0-9._-]`
/// replaced by `_`, so the value is safe inside a quoted header parameter.
pub fn export_filename(company_name: &str, job_title: &str) -> String {
    let raw = format!("Cover_Letter_{company_name}_{job_title}");
    let safe: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.pdf")
}
