// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Record ledger endpoints.

use axum::{extract::State, http::StatusCode, response::Response, Json};
use visor_ifc_core::Record;

use super::download;
use super::selection::apply_form;
use crate::error::ApiError;
use crate::types::FormUpdate;
use crate::AppState;

/// POST /api/v1/records - Register the pending selection.
///
/// Fields in the body update the form before it is committed.
pub async fn register(
    State(state): State<AppState>,
    Json(update): Json<FormUpdate>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    if !update.is_empty() {
        apply_form(&state.visor, update).await;
    }
    let record = state.visor.register()?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/records
pub async fn list(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.visor.ledger.records())
}

/// GET /api/v1/records/export - Download the records as CSV.
pub async fn export(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(download(state.visor.export_csv()?))
}
