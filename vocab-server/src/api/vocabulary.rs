//! Vocabulary metadata endpoints: form, CSV upload, term tags and template

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use vocab_common::db::{RegisteredIri, TermData, TermTypeData, VocabularyData};
use vocab_common::Error;

use crate::api::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::services::csv_ingest;
use crate::services::metadata::{self, MetadataForm, VocabularyEntry};
use crate::AppState;

/// Multipart field carrying the CSV file
const UPLOAD_FIELD: &str = "file";

/// Name of the downloadable template
const TEMPLATE_FILE_NAME: &str = "vocabtemplate.csv";

/// POST /api/vocabularies
pub async fn create_vocabulary(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(form): Json<MetadataForm>,
) -> ApiResult<(StatusCode, Json<VocabularyData>)> {
    let data = metadata::create_from_form(&state.db, user.guid, form.clone())
        .await
        .map_err(|e| ApiError::rejected(e, &form))?;

    Ok((StatusCode::CREATED, Json(data)))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_name: String,
    pub imported: usize,
    pub iris: Vec<RegisteredIri>,
}

/// POST /api/uploads/vocabulary (multipart, field `file`)
pub async fn upload_vocabulary(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| {
        Error::Format(format!("No '{}' field in upload", UPLOAD_FIELD))
    })?;
    csv_ingest::check_file_name(&file_name)?;

    info!(file = %file_name, bytes = bytes.len(), username = %user.username, "Vocabulary upload received");

    let report = csv_ingest::ingest_csv(&state.db, &state.config.iri_domain, &bytes, user.guid).await?;
    state.event_bus.dispatch_all(report.events);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_name,
            imported: report.iris.len(),
            iris: report.iris,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct VocabularyResponse {
    pub vocabulary_path: String,
    pub entries: Vec<VocabularyEntry>,
}

/// GET /api/vocabulary-paths/*vocabulary_path
///
/// The wildcard takes imported multi-segment paths such as `verbs/run`.
pub async fn get_vocabulary_path(
    State(state): State<AppState>,
    Path(vocabulary_path): Path<String>,
) -> ApiResult<Json<VocabularyResponse>> {
    let entries = metadata::vocabulary_view(&state.db, &vocabulary_path).await?;
    Ok(Json(VocabularyResponse {
        vocabulary_path,
        entries,
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// POST /api/vocabularies/:id/term-types
pub async fn add_term_type(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(vocabulary_data_id): Path<Uuid>,
    Json(request): Json<NameRequest>,
) -> ApiResult<(StatusCode, Json<TermTypeData>)> {
    let record = metadata::add_term_type(&state.db, user.guid, vocabulary_data_id, &request.name)
        .await
        .map_err(|e| ApiError::rejected(e, &request))?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/term-types/:id/terms
pub async fn add_term(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(term_type_data_id): Path<Uuid>,
    Json(request): Json<NameRequest>,
) -> ApiResult<(StatusCode, Json<TermData>)> {
    let record = metadata::add_term(&state.db, user.guid, term_type_data_id, &request.name)
        .await
        .map_err(|e| ApiError::rejected(e, &request))?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /vocabtemplate.csv
pub async fn download_template() -> ApiResult<impl IntoResponse> {
    let body = csv_ingest::template_csv()?;
    let disposition = format!("attachment; filename=\"{}\"", TEMPLATE_FILE_NAME);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
