// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Activity log endpoints.

use axum::{
    extract::{Query, State},
    response::Response,
    Json,
};
use visor_ifc_core::{Command, Outcome};

use super::download;
use crate::error::ApiError;
use crate::types::{LogEntryView, LogQuery};
use crate::AppState;

/// GET /api/v1/log?filter= - Entries on display that match `filter`.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<LogEntryView>> {
    let filter = query.filter.unwrap_or_default();
    let entries = match state.visor.dispatch(Command::FilterLog(filter)).await {
        Outcome::Log(entries) => entries,
        _ => Vec::new(),
    };
    Json(entries.iter().map(LogEntryView::from).collect())
}

/// GET /api/v1/log/export - Download the session history as text.
pub async fn export(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(download(state.visor.export_log()?))
}
