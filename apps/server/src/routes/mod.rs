// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP route handlers.
//!
//! Handlers translate requests into [`Command`](visor_ifc_core::Command)
//! values or direct workflow calls. Refusals come back as a
//! [`Rejection`](visor_ifc_core::Rejection) carrying the logged message.

pub mod health;
pub mod log;
pub mod model;
pub mod records;
pub mod selection;
pub mod tree;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use visor_ifc_core::ExportArtifact;

use crate::Visor;

/// Serve an export as a file download.
pub(crate) fn download(artifact: ExportArtifact) -> Response {
    tracing::debug!(file_name = %artifact.file_name, bytes = artifact.body.len(), "Export");
    (
        [
            (header::CONTENT_TYPE, artifact.mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        artifact.body,
    )
        .into_response()
}

/// Message of the newest log entry, whatever the panel filter.
pub(crate) fn latest_message(visor: &Visor) -> Option<String> {
    visor.log.latest().map(|entry| entry.message)
}
