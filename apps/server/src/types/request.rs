// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request types for the API.

use serde::Deserialize;
use visor_ifc_core::{ElementHandle, ModelHandle, RecordStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct LoadUrlRequest {
    pub url: String,
}

/// Pointer release over the scene, resolved by the client to an express id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PickRequest {
    /// `None` when the pointer hit nothing.
    #[serde(default)]
    pub express_id: Option<u32>,
    /// Zoom to the element once selected.
    #[serde(default)]
    pub focus: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FocusRequest {
    #[serde(default)]
    pub express_id: Option<u32>,
}

/// Element chosen from the spatial tree.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    pub model: ModelHandle,
    pub element: ElementHandle,
    #[serde(default)]
    pub focus: bool,
}

/// Partial update of the record form; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormUpdate {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl FormUpdate {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.status.is_none() && self.comment.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub search: Option<String>,
}
