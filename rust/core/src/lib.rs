// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Visor-IFC Core
//!
//! Selection-to-record workflow for IFC model viewers: pick an element, tag
//! it with a construction status, export the records as CSV. A persisted
//! activity log records every step.
//!
//! ## Overview
//!
//! - **[`LogStore`]**: append-only log with a capped display panel, a capped
//!   durable copy in a [`KeyValueStore`] and an append-only [`PrivateLogFile`]
//! - **[`SelectionWorkflow`]**: at most one pending selection plus the
//!   record form
//! - **[`RecordLedger`]**: committed records of the loaded model, CSV export
//! - **[`ModelSession`]**: single-flight model loading
//! - **[`AppState`]**: the aggregate, driven by [`Command`] values
//!
//! Rendering, IFC decoding and picking stay behind the [`Viewer`] trait.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use visor_ifc_core::{AppState, Command, LogConfig, MemoryStore, ModelSource, PrivateLogFile};
//!
//! let app = AppState::new(viewer, &LogConfig::default(), Some(Arc::new(MemoryStore::new())),
//!     PrivateLogFile::new("/var/lib/visor", "visor-ifc-logs", "visor-ifc-log.txt"));
//!
//! app.dispatch(Command::OpenModel(ModelSource::Url("https://example.com/house.ifc".into()))).await;
//! app.dispatch(Command::PickFromScene(pointer)).await;
//! app.dispatch(Command::Register).await;
//! if let Outcome::Artifact(csv) = app.dispatch(Command::ExportCsv).await {
//!     std::fs::write(&csv.file_name, csv.body)?;
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod ledger;
pub mod log;
pub mod once;
pub mod selection;
pub mod session;
pub mod viewer;

pub use app::{AppState, Command, ExportArtifact, Outcome, SelectOptions};
pub use config::LogConfig;
pub use error::{Error, ErrorCategory, Rejection, Result, StorageError};
pub use ledger::{Record, RecordLedger, RecordStatus};
pub use log::{
    DurableLog, JsonFileStore, KeyValueStore, LogEntry, LogKind, LogStore, MemoryStore,
    PrivateLogFile,
};
pub use once::OnceInit;
pub use selection::{PendingSelection, RecordForm, SelectionWorkflow};
pub use session::{ModelSession, SessionStatus, TreeView};
pub use viewer::{
    ElementHandle, ModelHandle, ModelSource, PickedElement, SpatialNode, Viewer, ViewerError,
};
