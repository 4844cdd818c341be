use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{dto::OkResponse, extractors::CurrentUser},
    errors::AppError,
    state::AppState,
};

use super::{
    dto::{CoverLetterOut, UpdateEditedFinalRequest},
    repo_types::{CoverLetter, NewCoverLetter},
    services::{
        export_filename, export_title, extract_resume, read_generate_form, validate_edited_final,
        validate_generate, GENERATE_BODY_LIMIT,
    },
};

pub fn coverletter_routes() -> Router<AppState> {
    Router::new()
        .route("/coverletters", get(list_coverletters))
        .route(
            "/coverletters/generate",
            post(generate).layer(DefaultBodyLimit::max(GENERATE_BODY_LIMIT)),
        )
        .route(
            "/coverletters/:id",
            get(get_coverletter).delete(delete_coverletter),
        )
        .route("/coverletters/:id/edited", put(update_edited_final))
        .route("/coverletters/:id/pdf", get(export_pdf))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_coverletters(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CoverLetterOut>>, AppError> {
    let items = CoverLetter::list_by_user(&state.db, user.id).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[instrument(skip_all, fields(user_id = %user.id, cover_id = %cover_id))]
pub async fn get_coverletter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    WithRejection(Path(cover_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<CoverLetterOut>, AppError> {
    let letter = CoverLetter::find_owned(&state.db, user.id, cover_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(letter.into()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn generate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> Result<Json<CoverLetterOut>, AppError> {
    let (form, resume) = read_generate_form(mp).await?;
    let input = validate_generate(form)?;
    let resume_text = extract_resume(state.extractor.clone(), resume).await?;

    let request = input.into_draft_request(resume_text);
    let ai_draft = state.writer.draft(&request).await.map_err(|e| {
        error!(error = %e, "draft generation failed");
        AppError::Generation(e)
    })?;

    let new = NewCoverLetter {
        input_full_name: request.input_full_name,
        job_title: request.job_title,
        company_name: request.company_name,
        tone: request.tone.as_str().to_string(),
        job_description: request.job_description,
        extra_notes: request.extra_notes,
        resume_text: request.resume_text,
        ai_draft,
    };
    let letter = CoverLetter::insert(&state.db, user.id, &new).await?;
    info!(cover_id = %letter.id, "cover letter generated");
    Ok(Json(letter.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, cover_id = %cover_id))]
pub async fn update_edited_final(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    WithRejection(Path(cover_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateEditedFinalRequest>, AppError>,
) -> Result<Json<CoverLetterOut>, AppError> {
    validate_edited_final(&body.edited_final)?;
    let letter = CoverLetter::set_edited_final(&state.db, user.id, cover_id, &body.edited_final)
        .await?
        .ok_or(AppError::NotFound)?;
    info!("edited final saved");
    Ok(Json(letter.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, cover_id = %cover_id))]
pub async fn delete_coverletter(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    WithRejection(Path(cover_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<OkResponse>, AppError> {
    if !CoverLetter::delete_owned(&state.db, user.id, cover_id).await? {
        return Err(AppError::NotFound);
    }
    info!("cover letter deleted");
    Ok(Json(OkResponse::ok()))
}

#[instrument(skip_all, fields(user_id = %user.id, cover_id = %cover_id))]
pub async fn export_pdf(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    WithRejection(Path(cover_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let letter = CoverLetter::find_owned(&state.db, user.id, cover_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let title = export_title(&letter.input_full_name);
    let filename = export_filename(&letter.company_name, &letter.job_title);
    let body = letter.export_body().to_string();

    let renderer = state.renderer.clone();
    let pdf = tokio::task::spawn_blocking(move || renderer.render(&title, &body))
        .await
        .map_err(|e| {
            warn!(error = %e, "pdf render task failed");
            AppError::Internal(e.into())
        })??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    ))
}
