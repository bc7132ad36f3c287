//! Users endpoint handlers

use std::path::{Path, PathBuf};

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::requests::{CreateUserRequest, ListUsersQuery, PaginatedResponse, UpdateUserRequest};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, ObjectIdPath};
use crate::domain::ingestion::{is_csv_mime, sanitize_filename};
use crate::domain::User;
use crate::infrastructure::user::BulkInsertSummary;

/// Multipart field carrying the CSV upload
pub const UPLOAD_FIELD: &str = "file";

const NO_CSV_FILE: &str = "Uploaded file is not a CSV file.";

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_user = request.validate().map_err(ApiError::validation)?;
    debug!(email = %new_user.email, "Creating user");

    let user = state
        .user_service
        .create_user(new_user)
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<PaginatedResponse<User>>, ApiError> {
    let Query(pairs) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let query = ListUsersQuery::from_pairs(pairs).map_err(ApiError::validation)?;

    let limit = query.limit;
    let page = query.page;
    let sort = query.sort.as_str();
    let sort_by = query.sort_by.clone();
    debug!(limit, page, sort, sort_by = %sort_by, "Listing users");

    let data = state
        .user_service
        .get_users(query.into_params())
        .await
        .map_err(ApiError::from)?;

    Ok(Json(PaginatedResponse {
        data,
        limit,
        page,
        sort,
        sort_by,
    }))
}

/// PATCH /users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    ObjectIdPath(id): ObjectIdPath,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let patch = request.validate().map_err(ApiError::validation)?;
    debug!(user_id = %id, "Updating user");

    let user = state
        .user_service
        .update_user(&id, patch)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(user))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    ObjectIdPath(id): ObjectIdPath,
) -> Result<Json<User>, ApiError> {
    debug!(user_id = %id, "Deleting user");

    let user = state
        .user_service
        .delete_user(&id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(user))
}

/// POST /users/upload
///
/// Only a `file` field declared as `text/csv` is accepted; anything else is
/// treated as if no file had been sent.
pub async fn upload_users(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BulkInsertSummary>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e.body_text(), "Upload is not multipart");
        ApiError::unprocessable(NO_CSV_FILE)
    })?;

    let mut saved = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let is_csv_file = field.name() == Some(UPLOAD_FIELD)
            && field.content_type().is_some_and(is_csv_mime);

        if is_csv_file {
            saved = Some(save_upload(&state.upload.dir, field).await?);
            break;
        }
        debug!(field = ?field.name(), content_type = ?field.content_type(), "Skipping upload field");
    }

    let path = saved.ok_or_else(|| ApiError::unprocessable(NO_CSV_FILE))?;
    let result = state.user_service.import_file(&path).await;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove upload");
    }

    Ok(Json(result.map_err(ApiError::from)?))
}

/// Stream a multipart field to a uniquely named file under `dir`
async fn save_upload(dir: &Path, mut field: Field<'_>) -> Result<PathBuf, ApiError> {
    let name = sanitize_filename(field.file_name().unwrap_or("upload.csv"));
    let path = dir.join(format!("{}-{}", uuid::Uuid::new_v4(), name));

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        warn!(dir = %dir.display(), error = %e, "Failed to create upload directory");
        ApiError::internal("Internal server error")
    })?;

    let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to create upload file");
        ApiError::internal("Internal server error")
    })?;

    let written = async {
        let mut size = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?
        {
            size += chunk.len();
            file.write_all(&chunk).await.map_err(|e| {
                warn!(path = %path.display(), error = %e, "Failed to write upload");
                ApiError::internal("Internal server error")
            })?;
        }
        file.flush()
            .await
            .map_err(|_| ApiError::internal("Internal server error"))?;
        Ok::<_, ApiError>(size)
    }
    .await;

    match written {
        Ok(size) => {
            debug!(path = %path.display(), bytes = size, "Upload saved");
            Ok(path)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            Err(e)
        }
    }
}
