// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use axum::{
    extract::{Query, State},
    Json,
};
use visor_ifc_core::{Command, Outcome, TreeView};

use crate::types::TreeQuery;
use crate::AppState;

/// GET /api/v1/tree?search= - Spatial tree of the loaded model.
pub async fn tree(State(state): State<AppState>, Query(query): Query<TreeQuery>) -> Json<TreeView> {
    let search = query.search.unwrap_or_default();
    match state.visor.dispatch(Command::FilterTree(search)).await {
        Outcome::Tree(view) => Json(view),
        _ => Json(TreeView::Unavailable),
    }
}
