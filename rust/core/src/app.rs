// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application aggregate and command dispatch.
//!
//! [`AppState`] owns one instance of every component for the life of the
//! process. User actions arrive as [`Command`] values and are handled by
//! [`AppState::dispatch`]; every outcome worth telling the user about is
//! written to the [`LogStore`].

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::config::LogConfig;
use crate::error::{Error, Rejection};
use crate::ledger::{Record, RecordLedger, RecordStatus};
use crate::log::{KeyValueStore, LogEntry, LogStore, PrivateLogFile};
use crate::selection::{PendingSelection, RecordForm, SelectionWorkflow};
use crate::session::{ModelSession, SessionStatus, TreeView};
use crate::viewer::{ElementHandle, ModelHandle, ModelSource, Viewer, ViewerError};

/// One user action.
#[derive(Debug)]
pub enum Command<P> {
    OpenModel(ModelSource),
    /// Pointer released over the scene.
    PickFromScene(P),
    /// Element chosen from the spatial tree.
    SelectElement {
        model: ModelHandle,
        element: ElementHandle,
        focus: bool,
    },
    /// Double click / double tap: zoom to the pending selection.
    FocusSelection(P),
    CancelSelection,
    SetDate(String),
    SetStatus(RecordStatus),
    SetComment(String),
    Register,
    ExportCsv,
    ExportLog,
    FilterLog(String),
    FilterTree(String),
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Handled; see the log for details.
    Done,
    /// Result of an `OpenModel`.
    Loaded(bool),
    Registered(Record),
    Artifact(ExportArtifact),
    Log(Vec<LogEntry>),
    Tree(TreeView),
}

/// A file offered to the user for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: &'static str,
    pub body: String,
}

/// How a selection is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    /// Move the camera to the element.
    pub focus: bool,
    /// Write a success entry once the element is pending.
    pub log_selection: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            focus: false,
            log_selection: true,
        }
    }
}

/// Everything the application holds, created once at startup.
pub struct AppState<V: Viewer> {
    pub viewer: Arc<V>,
    pub log: Arc<LogStore>,
    pub ledger: Arc<RecordLedger>,
    pub selection: Arc<SelectionWorkflow>,
    pub session: ModelSession<V>,
}

impl<V: Viewer> AppState<V> {
    /// Wire the components together and restore the persisted log.
    pub fn new(
        viewer: V,
        config: &LogConfig,
        store: Option<Arc<dyn KeyValueStore>>,
        log_file: PrivateLogFile,
    ) -> Self {
        let log = Arc::new(LogStore::open(config, store, log_file));
        Self::with_log(viewer, log)
    }

    pub fn with_log(viewer: V, log: Arc<LogStore>) -> Self {
        let viewer = Arc::new(viewer);
        let ledger = Arc::new(RecordLedger::new());
        let selection = Arc::new(SelectionWorkflow::new(ledger.clone()));
        let session = ModelSession::new(viewer.clone(), log.clone(), ledger.clone(), selection.clone());
        Self {
            viewer,
            log,
            ledger,
            selection,
            session,
        }
    }

    pub async fn dispatch(&self, command: Command<V::Pointer>) -> Outcome {
        match command {
            Command::OpenModel(source) => Outcome::Loaded(self.session.load(source).await),
            Command::PickFromScene(pointer) => {
                self.pick_from_scene(&pointer, SelectOptions::default()).await;
                Outcome::Done
            }
            Command::SelectElement {
                model,
                element,
                focus,
            } => {
                let options = SelectOptions {
                    focus,
                    ..SelectOptions::default()
                };
                self.select_element(model, element, options).await;
                Outcome::Done
            }
            Command::FocusSelection(pointer) => {
                self.focus_selection(&pointer).await;
                Outcome::Done
            }
            Command::CancelSelection => {
                self.selection.cancel();
                Outcome::Done
            }
            Command::SetDate(date) => {
                self.selection.set_date(date);
                Outcome::Done
            }
            Command::SetStatus(status) => {
                self.selection.set_status(status);
                Outcome::Done
            }
            Command::SetComment(comment) => {
                self.selection.set_comment(comment);
                Outcome::Done
            }
            Command::Register => self.register().map_or(Outcome::Done, Outcome::Registered),
            Command::ExportCsv => self.export_csv().map_or(Outcome::Done, Outcome::Artifact),
            Command::ExportLog => self.export_log().map_or(Outcome::Done, Outcome::Artifact),
            Command::FilterLog(filter) => {
                self.log.set_filter(&filter);
                Outcome::Log(self.log.visible())
            }
            Command::FilterTree(search) => Outcome::Tree(self.session.spatial_tree(&search)),
        }
    }

    /// Resolve what is under `pointer` and make it the pending selection.
    ///
    /// Ignored while no model is loaded or a load is in flight.
    pub async fn pick_from_scene(&self, pointer: &V::Pointer, options: SelectOptions) {
        let epoch = self.selection.epoch();
        if !self.accepts_selection() {
            return;
        }
        let picked = match self.viewer.pick_element(pointer).await {
            Ok(Some(picked)) => picked,
            Ok(None) => {
                self.log
                    .error_with("No element detected in the selection.", &Error::NothingPicked);
                return;
            }
            Err(e) => {
                self.log.error_with("Error while selecting the element.", &e);
                return;
            }
        };
        if !self.viewer.has_renderable_geometry(picked.model) {
            self.log.error_with(
                "Geometry is still being generated; wait a few seconds.",
                &Error::GeometryNotReady,
            );
            return;
        }
        self.select_at(epoch, picked.model, picked.element, options).await;
    }

    /// Highlight `element`, resolve its GlobalId and make it pending.
    ///
    /// Only elements of the active model are accepted; nothing happens while
    /// a load is in flight.
    pub async fn select_element(&self, model: ModelHandle, element: ElementHandle, options: SelectOptions) {
        let epoch = self.selection.epoch();
        if !self.accepts_selection() {
            return;
        }
        self.select_at(epoch, model, element, options).await;
    }

    fn accepts_selection(&self) -> bool {
        self.session.is_loaded() && !self.session.is_loading()
    }

    async fn select_at(&self, epoch: u64, model: ModelHandle, element: ElementHandle, options: SelectOptions) {
        if let Err(e) = self.try_select_element(epoch, model, element, options).await {
            match e {
                Error::MissingGuid => self.log.error("The selected element has no GUID."),
                Error::SelectionSuperseded => {
                    tracing::debug!(%model, %element, "Dropping selection for a replaced model");
                }
                other => self
                    .log
                    .error_with("Could not handle the element selection.", &other),
            }
        }
    }

    async fn try_select_element(
        &self,
        epoch: u64,
        model: ModelHandle,
        element: ElementHandle,
        options: SelectOptions,
    ) -> Result<(), Error> {
        if self.session.active_model() != Some(model) {
            return Err(ViewerError::UnknownModel(model).into());
        }
        self.flash(model, element, options.focus).await?;
        let guid = self.viewer.stable_id(model, element).await?;
        self.selection.set_pending_at(epoch, model, element, guid)?;
        if options.log_selection {
            if let Some(pending) = self.selection.pending() {
                self.log
                    .success(format!("Element {} ready to register.", pending.element_id));
            }
        }
        Ok(())
    }

    /// Highlight only when the model has geometry; otherwise say so and go on.
    async fn flash(&self, model: ModelHandle, element: ElementHandle, focus: bool) -> Result<(), Error> {
        if !self.viewer.has_renderable_geometry(model) {
            self.log
                .error("The model has not finished preparing its geometry.");
            return Ok(());
        }
        self.viewer.highlight(model, element, focus).await?;
        Ok(())
    }

    /// Zoom to the pending selection, or pick under `pointer` with focus.
    pub async fn focus_selection(&self, pointer: &V::Pointer) {
        if !self.accepts_selection() {
            return;
        }
        let Some(pending) = self.selection.pending() else {
            let options = SelectOptions {
                focus: true,
                log_selection: false,
            };
            self.pick_from_scene(pointer, options).await;
            return;
        };
        if let Err(e) = self.flash(pending.model, pending.element, true).await {
            self.log
                .error_with("Could not zoom to the selected element.", &e);
        }
    }

    /// Commit the form for the pending selection.
    ///
    /// A refusal is logged and returned with the message it was logged under.
    pub fn register(&self) -> Result<Record, Rejection> {
        match self.selection.commit_form() {
            Ok(record) => {
                self.log
                    .success(format!("Record saved for {}.", record.element_id));
                Ok(record)
            }
            Err(e @ Error::NoPendingSelection) => {
                self.log.error("Select an element before registering.");
                Err(Rejection::new("Select an element before registering.", e))
            }
            Err(e @ Error::InvalidDate(_)) => {
                self.log.error("Choose a valid date to register.");
                Err(Rejection::new("Choose a valid date to register.", e))
            }
            Err(e) => {
                self.log.error_with("Could not save the record.", &e);
                Err(Rejection::new("Could not save the record.", e))
            }
        }
    }

    pub fn export_csv(&self) -> Result<ExportArtifact, Rejection> {
        if self.ledger.is_empty() {
            self.log.error("There are no records to export.");
            return Err(Rejection::new(
                "There are no records to export.",
                Error::NothingToExport,
            ));
        }
        let artifact = ExportArtifact {
            file_name: format!("registros-ifc-{}.csv", export_millis()),
            mime: "text/csv;charset=utf-8",
            body: self.ledger.export_csv(),
        };
        self.log.success("CSV exported successfully.");
        Ok(artifact)
    }

    pub fn export_log(&self) -> Result<ExportArtifact, Rejection> {
        if self.log.history_len() == 0 {
            self.log.error("There are no events to export.");
            return Err(Rejection::new(
                "There are no events to export.",
                Error::NothingToExport,
            ));
        }
        Ok(ExportArtifact {
            file_name: format!("visor-ifc-log-{}.txt", export_millis()),
            mime: "text/plain;charset=utf-8",
            body: self.log.export_text(),
        })
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn pending(&self) -> Option<PendingSelection> {
        self.selection.pending()
    }

    pub fn form(&self) -> RecordForm {
        self.selection.form()
    }
}

fn export_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}
