// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading endpoints.

use axum::{
    extract::{Multipart, State},
    Json,
};
use visor_ifc_core::{ModelSource, SessionStatus};

use crate::error::ApiError;
use crate::types::{LoadResponse, LoadUrlRequest};
use crate::AppState;

/// Extract the `file` field and its file name from a multipart request.
async fn extract_file(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        tracing::debug!(field_name = %field_name, "Processing multipart field");

        if field_name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            tracing::debug!(size = bytes.len(), file_name = %file_name, "Extracted file from multipart");
            return Ok((file_name, bytes.to_vec()));
        }
    }

    tracing::warn!("No 'file' field found in multipart request");
    Err(ApiError::MissingFile)
}

/// POST /api/v1/model - Load an uploaded IFC file.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<LoadResponse>, ApiError> {
    let (name, bytes) = extract_file(&mut multipart).await?;
    if bytes.len() > state.config.max_file_bytes() {
        return Err(ApiError::FileTooLarge {
            max_mb: state.config.max_file_size_mb,
        });
    }
    open(&state, ModelSource::File { name, bytes }).await
}

/// POST /api/v1/model/url - Load an IFC file from a URL.
pub async fn load_url(
    State(state): State<AppState>,
    Json(request): Json<LoadUrlRequest>,
) -> Result<Json<LoadResponse>, ApiError> {
    open(&state, ModelSource::Url(request.url)).await
}

/// GET /api/v1/model - Session status.
pub async fn status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.visor.status())
}

/// Load `source`; a load already in flight answers `409 CONFLICT`.
async fn open(state: &AppState, source: ModelSource) -> Result<Json<LoadResponse>, ApiError> {
    let name = source.display_name();

    // A dropped request must not cancel a load halfway.
    let visor = state.visor.clone();
    tokio::spawn(async move { visor.session.open(source).await })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(LoadResponse {
        name,
        status: state.visor.status(),
    }))
}
