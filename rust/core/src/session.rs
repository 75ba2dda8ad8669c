// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Which model is loaded, and single-flight loading.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{Error, Rejection, Result};
use crate::ledger::RecordLedger;
use crate::log::LogStore;
use crate::once::OnceInit;
use crate::selection::SelectionWorkflow;
use crate::viewer::{ModelHandle, ModelSource, SpatialNode, Viewer, ViewerError};

/// Snapshot of the session flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub loaded: bool,
    pub active_model: Option<ModelHandle>,
    pub is_loading: bool,
}

/// What the spatial tree panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "nodes", rename_all = "snake_case")]
pub enum TreeView {
    /// No model, or the tree could not be built.
    Unavailable,
    /// A search term matched nothing.
    NoMatches,
    /// The model has no children under its root.
    Empty,
    /// Top-level nodes under the project root.
    Nodes(Vec<SpatialNode>),
}

#[derive(Debug, Default)]
struct SessionState {
    loaded: bool,
    active: Option<ModelHandle>,
    spatial_tree: Option<SpatialNode>,
}

/// Held while a load is in flight; releases the flag on drop.
struct LoadGuard<'a>(&'a AtomicBool);

impl<'a> LoadGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadGuard(flag))
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Lifecycle of the loaded model.
pub struct ModelSession<V: Viewer> {
    viewer: Arc<V>,
    log: Arc<LogStore>,
    ledger: Arc<RecordLedger>,
    selection: Arc<SelectionWorkflow>,
    loading: AtomicBool,
    engine: OnceInit<std::result::Result<(), String>>,
    state: Mutex<SessionState>,
}

impl<V: Viewer> ModelSession<V> {
    pub fn new(
        viewer: Arc<V>,
        log: Arc<LogStore>,
        ledger: Arc<RecordLedger>,
        selection: Arc<SelectionWorkflow>,
    ) -> Self {
        Self {
            viewer,
            log,
            ledger,
            selection,
            loading: AtomicBool::new(false),
            engine: OnceInit::new(),
            state: Mutex::new(SessionState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state();
        SessionStatus {
            loaded: state.loaded,
            active_model: state.active,
            is_loading: self.is_loading(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub fn active_model(&self) -> Option<ModelHandle> {
        self.state().active
    }

    /// Replace the current model with `source`.
    ///
    /// Returns `false` when the load was rejected or failed; the reason is in
    /// the log.
    pub async fn load(&self, source: ModelSource) -> bool {
        self.open(source).await.is_ok()
    }

    /// Replace the current model with `source`, returning the new handle.
    ///
    /// A load already in flight rejects the call with
    /// [`Error::LoadInProgress`] without touching any state. Every rejection
    /// is also written to the log under its message.
    pub async fn open(&self, source: ModelSource) -> std::result::Result<ModelHandle, Rejection> {
        if source.is_empty() {
            return Err(self.reject("No IFC file was selected.", Error::EmptySource));
        }
        let Some(_guard) = LoadGuard::try_acquire(&self.loading) else {
            return Err(self.reject(
                "An IFC model is already loading. Wait for it to finish.",
                Error::LoadInProgress,
            ));
        };

        let name = source.display_name();
        self.log.info(format!("Loading {name}…"));
        tracing::info!(source = %name, "Loading model");

        // Records and selection belong to the outgoing model.
        self.selection.clear();
        self.ledger.reset();
        self.selection.reset_form();
        self.state().spatial_tree = None;

        self.unload_current().await;

        match self.materialize(&source).await {
            Ok(model) => {
                {
                    let mut state = self.state();
                    state.loaded = true;
                    state.active = Some(model);
                }
                self.log.success(format!("Model ready: {name}"));
                self.build_spatial_tree(model).await;
                Ok(model)
            }
            Err(e) => {
                tracing::error!(error = %e, source = %name, "Model load failed");
                Err(self.reject("Could not load the IFC model. Check the file.", e))
            }
        }
    }

    fn reject(&self, message: &'static str, error: Error) -> Rejection {
        self.log.error_with(message, &error);
        Rejection::new(message, error)
    }

    async fn materialize(&self, source: &ModelSource) -> Result<ModelHandle> {
        let viewer = &self.viewer;
        let engine = self
            .engine
            .get_or_init(|| async move { viewer.initialize().await.map_err(|e| e.to_string()) })
            .await;
        if let Err(message) = engine {
            return Err(ViewerError::Init(message.clone()).into());
        }
        Ok(self.viewer.load(source).await?)
    }

    /// Unload the active model, if any. The session ends up unloaded even
    /// when the viewer fails to release it.
    pub async fn unload_current(&self) {
        let Some(model) = self.state().active else {
            return;
        };
        if let Err(e) = self.viewer.unload(model).await {
            self.log
                .error_with("Could not fully unload the previous model.", &e);
        }
        let mut state = self.state();
        state.active = None;
        state.loaded = false;
        state.spatial_tree = None;
    }

    async fn build_spatial_tree(&self, model: ModelHandle) {
        match self.viewer.spatial_hierarchy(model).await {
            Ok(tree) => {
                self.state().spatial_tree = Some(tree);
                self.log.success("IFC tree generated.");
            }
            Err(e) => {
                self.log.error_with("Could not generate the IFC tree.", &e);
            }
        }
    }

    /// The spatial tree filtered by `search` (case-insensitive).
    pub fn spatial_tree(&self, search: &str) -> TreeView {
        let term = search.trim().to_lowercase();
        let state = self.state();
        let Some(root) = &state.spatial_tree else {
            return TreeView::Unavailable;
        };
        let nodes: Vec<SpatialNode> = root
            .children
            .iter()
            .filter_map(|child| child.filtered(&term))
            .collect();
        match (nodes.is_empty(), term.is_empty()) {
            (false, _) => TreeView::Nodes(nodes),
            (true, false) => TreeView::NoMatches,
            (true, true) => TreeView::Empty,
        }
    }
}
