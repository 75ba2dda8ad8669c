// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::viewer::ViewerError;

pub type Result<T> = std::result::Result<T, Error>;

/// How a failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing user input. Reported, no state change.
    UserInput,
    /// The viewer or parser failed. Reported with detail, operation aborted.
    ExternalService,
    /// Storage failed. Degraded silently with a warning.
    Persistence,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("no element is selected")]
    NoPendingSelection,

    #[error("invalid record date: {0:?}")]
    InvalidDate(String),

    #[error("the selected file is empty")]
    EmptySource,

    #[error("a model is already loading")]
    LoadInProgress,

    #[error("the model changed while the selection was resolved")]
    SelectionSuperseded,

    #[error("nothing to export")]
    NothingToExport,

    #[error("element has no GlobalId")]
    MissingGuid,

    #[error("no element under the pointer")]
    NothingPicked,

    #[error("model geometry is not ready yet")]
    GeometryNotReady,

    #[error("viewer error: {0}")]
    Viewer(#[from] ViewerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NoPendingSelection
            | Error::InvalidDate(_)
            | Error::EmptySource
            | Error::LoadInProgress
            | Error::SelectionSuperseded
            | Error::NothingToExport => ErrorCategory::UserInput,
            Error::MissingGuid
            | Error::NothingPicked
            | Error::GeometryNotReady
            | Error::Viewer(_) => ErrorCategory::ExternalService,
            Error::Storage(_) => ErrorCategory::Persistence,
        }
    }
}

/// Failures of the durable key-value store and the private log file.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage unavailable")]
    Unavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A refused or failed user action, with the message it was logged under.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Rejection {
    pub message: &'static str,
    #[source]
    pub error: Error,
}

impl Rejection {
    pub fn new(message: &'static str, error: Error) -> Self {
        Self { message, error }
    }
}

/// Render an error and its source chain, one cause per line.
pub fn error_detail(err: &(dyn std::error::Error + 'static)) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str("\ncaused by: ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(Error::NoPendingSelection.category(), ErrorCategory::UserInput);
        assert_eq!(Error::InvalidDate(String::new()).category(), ErrorCategory::UserInput);
        assert_eq!(Error::MissingGuid.category(), ErrorCategory::ExternalService);
        assert_eq!(
            Error::Storage(StorageError::Unavailable).category(),
            ErrorCategory::Persistence
        );
    }

    #[test]
    fn test_error_detail_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.ifc");
        let err = Error::Storage(StorageError::Io(io));
        let detail = error_detail(&err);
        assert!(detail.starts_with("storage error: I/O error: missing.ifc"));
        assert!(detail.contains("caused by: I/O error: missing.ifc"));
    }
}
