// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Headless [`Viewer`] backed by [`StepIndex`].
//!
//! Rendering happens in the client. Picks arrive as the express id the
//! client resolved under its pointer, and highlights are kept so the client
//! can mirror them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use visor_ifc_core::{
    ElementHandle, ModelHandle, ModelSource, PickedElement, SpatialNode, Viewer, ViewerError,
};

use super::step_index::StepIndex;

/// What the client reports for a pointer release over the scene.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ScenePointer {
    /// Express id under the pointer, `None` when nothing was hit.
    pub express_id: Option<u32>,
}

/// The element currently flashed in the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub model: ModelHandle,
    pub element: ElementHandle,
    pub focus: bool,
}

pub struct StepViewer {
    models: RwLock<FxHashMap<ModelHandle, Arc<StepIndex>>>,
    next_model: AtomicU32,
    highlight: Mutex<Option<Highlight>>,
    http: OnceLock<reqwest::Client>,
    max_bytes: usize,
    fetch_timeout: Duration,
}

impl StepViewer {
    pub fn new(max_bytes: usize, fetch_timeout: Duration) -> Self {
        Self {
            models: RwLock::new(FxHashMap::default()),
            next_model: AtomicU32::new(1),
            highlight: Mutex::new(None),
            http: OnceLock::new(),
            max_bytes,
            fetch_timeout,
        }
    }

    pub fn highlighted(&self) -> Option<Highlight> {
        *self.highlight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn index(&self, model: ModelHandle) -> Result<Arc<StepIndex>, ViewerError> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&model)
            .cloned()
            .ok_or(ViewerError::UnknownModel(model))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ViewerError> {
        let client = self
            .http
            .get()
            .ok_or_else(|| ViewerError::Init("HTTP client not ready".into()))?;
        let response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ViewerError::Fetch(e.to_string()))?;
        if response
            .content_length()
            .is_some_and(|len| len as usize > self.max_bytes)
        {
            return Err(ViewerError::Fetch(format!(
                "model exceeds {} bytes",
                self.max_bytes
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ViewerError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl Viewer for StepViewer {
    type Pointer = ScenePointer;

    async fn initialize(&self) -> Result<(), ViewerError> {
        let client = reqwest::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
            .map_err(|e| ViewerError::Init(e.to_string()))?;
        let _ = self.http.set(client);
        tracing::debug!("STEP viewer initialised");
        Ok(())
    }

    async fn load(&self, source: &ModelSource) -> Result<ModelHandle, ViewerError> {
        let bytes = match source {
            ModelSource::Url(url) => self.fetch(url).await?,
            ModelSource::File { bytes, .. } => bytes.clone(),
        };
        if bytes.len() > self.max_bytes {
            return Err(ViewerError::Decode(format!(
                "model exceeds {} bytes",
                self.max_bytes
            )));
        }

        let index = tokio::task::spawn_blocking(move || {
            // Exporters write raw ISO 8859-1 into strings despite the standard.
            let content = String::from_utf8_lossy(&bytes);
            StepIndex::build(&content).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| ViewerError::Decode(e.to_string()))?
        .map_err(ViewerError::Decode)?;

        let model = ModelHandle(self.next_model.fetch_add(1, Ordering::Relaxed));
        tracing::info!(
            %model,
            entities = index.len(),
            geometry = index.has_geometry(),
            "Model indexed"
        );
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model, Arc::new(index));
        Ok(model)
    }

    async fn unload(&self, model: ModelHandle) -> Result<(), ViewerError> {
        let removed = self
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&model);
        let mut highlight = self.highlight.lock().unwrap_or_else(PoisonError::into_inner);
        if highlight.is_some_and(|h| h.model == model) {
            *highlight = None;
        }
        removed.map(|_| ()).ok_or(ViewerError::UnknownModel(model))
    }

    /// The newest loaded model that knows the reported express id.
    async fn pick_element(&self, pointer: &ScenePointer) -> Result<Option<PickedElement>, ViewerError> {
        let Some(id) = pointer.express_id else {
            return Ok(None);
        };
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        Ok(models
            .iter()
            .filter(|(_, index)| index.contains(id))
            .map(|(model, _)| *model)
            .max_by_key(|model| model.0)
            .map(|model| PickedElement {
                model,
                element: ElementHandle(id),
            }))
    }

    async fn stable_id(
        &self,
        model: ModelHandle,
        element: ElementHandle,
    ) -> Result<Option<String>, ViewerError> {
        let index = self.index(model)?;
        let info = index
            .entity(element.0)
            .ok_or(ViewerError::UnknownElement { model, element })?;
        Ok(info.global_id.clone())
    }

    async fn highlight(
        &self,
        model: ModelHandle,
        element: ElementHandle,
        focus: bool,
    ) -> Result<(), ViewerError> {
        if !self.index(model)?.contains(element.0) {
            return Err(ViewerError::UnknownElement { model, element });
        }
        tracing::debug!(%model, %element, focus, "Highlight");
        *self.highlight.lock().unwrap_or_else(PoisonError::into_inner) = Some(Highlight {
            model,
            element,
            focus,
        });
        Ok(())
    }

    fn has_renderable_geometry(&self, model: ModelHandle) -> bool {
        self.index(model).is_ok_and(|index| index.has_geometry())
    }

    async fn spatial_hierarchy(&self, model: ModelHandle) -> Result<SpatialNode, ViewerError> {
        self.index(model)?
            .spatial_tree(model)
            .ok_or_else(|| ViewerError::Decode("model has no IfcProject".into()))
    }
}
