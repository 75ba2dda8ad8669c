// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Selection and record form endpoints.
//!
//! Every handler answers with the resulting [`SelectionResponse`]; failed
//! picks are not HTTP errors, the reason is in `message`.

use axum::{extract::State, Json};
use visor_ifc_core::{Command, SelectOptions};

use super::latest_message;
use crate::services::ScenePointer;
use crate::types::{FocusRequest, FormUpdate, PickRequest, SelectRequest, SelectionResponse};
use crate::{AppState, Visor};

pub(crate) fn snapshot(visor: &Visor) -> SelectionResponse {
    SelectionResponse {
        pending: visor.pending(),
        form: visor.form(),
        highlight: visor.viewer.highlighted(),
        message: latest_message(visor),
    }
}

/// Apply the fields present in `update` to the record form.
pub(crate) async fn apply_form(visor: &Visor, update: FormUpdate) {
    if let Some(date) = update.date {
        visor.dispatch(Command::SetDate(date)).await;
    }
    if let Some(status) = update.status {
        visor.dispatch(Command::SetStatus(status)).await;
    }
    if let Some(comment) = update.comment {
        visor.dispatch(Command::SetComment(comment)).await;
    }
}

/// POST /api/v1/selection/pick - Select the element under the pointer.
pub async fn pick(
    State(state): State<AppState>,
    Json(request): Json<PickRequest>,
) -> Json<SelectionResponse> {
    let pointer = ScenePointer {
        express_id: request.express_id,
    };
    let options = SelectOptions {
        focus: request.focus,
        ..SelectOptions::default()
    };
    state.visor.pick_from_scene(&pointer, options).await;
    Json(snapshot(&state.visor))
}

/// POST /api/v1/selection/element - Select an element from the spatial tree.
pub async fn select(
    State(state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> Json<SelectionResponse> {
    state
        .visor
        .dispatch(Command::SelectElement {
            model: request.model,
            element: request.element,
            focus: request.focus,
        })
        .await;
    Json(snapshot(&state.visor))
}

/// POST /api/v1/selection/focus - Zoom to the pending selection, or pick
/// and zoom when nothing is pending.
pub async fn focus(
    State(state): State<AppState>,
    Json(request): Json<FocusRequest>,
) -> Json<SelectionResponse> {
    let pointer = ScenePointer {
        express_id: request.express_id,
    };
    state.visor.dispatch(Command::FocusSelection(pointer)).await;
    Json(snapshot(&state.visor))
}

/// GET /api/v1/selection
pub async fn current(State(state): State<AppState>) -> Json<SelectionResponse> {
    Json(snapshot(&state.visor))
}

/// DELETE /api/v1/selection - Drop the pending selection.
pub async fn cancel(State(state): State<AppState>) -> Json<SelectionResponse> {
    state.visor.dispatch(Command::CancelSelection).await;
    Json(snapshot(&state.visor))
}

/// PUT /api/v1/selection/form
pub async fn update_form(
    State(state): State<AppState>,
    Json(update): Json<FormUpdate>,
) -> Json<SelectionResponse> {
    apply_form(&state.visor, update).await;
    Json(snapshot(&state.visor))
}
