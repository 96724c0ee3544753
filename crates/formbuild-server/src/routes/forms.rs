//! Form routes: `/api/*`
//!
//! - `POST /api/save-form`: validate and store a form schema (client key required)
//! - `GET  /api/get-form/{form_id}`: render a stored form as HTML
//! - `POST /api/submit-form/{form_id}`: append a form-encoded answer to the form's CSV

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Path, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Serialize;
use tracing::debug;

use formbuild_core::render::{self, FormPage, PLACEHOLDER_TOKEN};
use formbuild_core::{FormDraft, FormId, FormIdError, RecorderError, Submission, validate};

use crate::error::AppError;
use crate::state::AppState;

/// Routes that require a client key. The caller attaches the gate.
pub fn gated_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/save-form", post(save_form))
}

/// Routes open to anyone holding a form link.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/get-form", get(missing_form_id))
        .route("/api/get-form/", get(missing_form_id))
        .route("/api/get-form/{form_id}", get(get_form))
        .route("/api/submit-form", post(missing_form_id))
        .route("/api/submit-form/", post(missing_form_id))
        .route("/api/submit-form/{form_id}", post(submit_form))
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: &'static str,
    pub id: String,
    pub path: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Validate a posted schema and store it under a new identifier.
async fn save_form(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FormDraft>, JsonRejection>,
) -> Result<Json<SaveResponse>, AppError> {
    let Json(draft) = payload.map_err(|rejection| {
        debug!(reason = %rejection, "unreadable form body");
        AppError::BadRequest("Invalid form structure".to_owned())
    })?;

    let form = validate(draft)?;
    let id = state.repository.create(&form).await?;

    Ok(Json(SaveResponse {
        message: "Form saved successfully",
        path: state.repository.form_path(&id).display().to_string(),
        id: id.to_string(),
    }))
}

/// Render a stored form into an HTML page.
async fn get_form(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id = FormId::parse(&raw_id)?;
    let form = state.repository.read(id.as_str()).await?;
    let submit_url = render::submit_url(&state.domain, &id);

    let html = state
        .renderer
        .render(&FormPage {
            form_id: &id,
            form: &form,
            submit_url: &submit_url,
            token: PLACEHOLDER_TOKEN,
        })
        .await?;

    Ok(Html(html))
}

/// Record a submitted answer and send the browser back where it came from.
async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    body: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<Html<String>, AppError> {
    let path_id = FormId::parse(&raw_id)?;
    let Form(fields) = body.map_err(|rejection| {
        debug!(reason = %rejection, "unreadable submission body");
        invalid_form_data()
    })?;

    let submission = match Submission::from_fields(fields) {
        Ok(submission) => submission,
        Err(RecorderError::InvalidId(FormIdError::Missing)) => return Err(invalid_form_data()),
        Err(e) => return Err(e.into()),
    };
    if submission.form_id != path_id {
        return Err(AppError::BadRequest("form identifier mismatch".to_owned()));
    }

    state.recorder.append(&submission).await?;

    Ok(Html(render::redirect_page(&submission.referrer)))
}

/// Reached when the identifier segment is absent from the path.
async fn missing_form_id() -> AppError {
    FormIdError::Missing.into()
}

fn invalid_form_data() -> AppError {
    AppError::BadRequest("Invalid form data".to_owned())
}
