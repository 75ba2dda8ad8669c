// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pending selection and the record form.
//!
//! At most one picked element waits for its record. A new pick replaces it;
//! committing, cancelling or loading another model clears it.
//!
//! Every model change bumps the selection epoch. A pick resolved against an
//! older epoch is refused, so a selection never outlives its model.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::error::{Error, Result};
use crate::ledger::{format_date, parse_date, Record, RecordLedger, RecordStatus};
use crate::viewer::{ElementHandle, ModelHandle};

/// A picked element awaiting user-entered metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSelection {
    pub model: ModelHandle,
    pub element: ElementHandle,
    pub element_id: String,
}

/// Values typed into the record form, kept between picks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordForm {
    /// Raw date input, `YYYY-MM-DD` when valid.
    pub date: String,
    pub status: RecordStatus,
    pub comment: String,
}

#[derive(Debug)]
struct SelectionState {
    epoch: u64,
    pending: Option<PendingSelection>,
    form: RecordForm,
}

/// Empty ⇄ Pending state machine feeding the [`RecordLedger`].
#[derive(Debug)]
pub struct SelectionWorkflow {
    ledger: Arc<RecordLedger>,
    state: Mutex<SelectionState>,
}

/// Today's date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

impl SelectionWorkflow {
    pub fn new(ledger: Arc<RecordLedger>) -> Self {
        Self {
            ledger,
            state: Mutex::new(SelectionState {
                epoch: 0,
                pending: None,
                form: fresh_form(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `element` the pending selection, replacing any previous one.
    ///
    /// Fails with [`Error::MissingGuid`] when the element has no usable
    /// GlobalId; the previous selection is kept in that case. The GlobalId is
    /// stored exactly as given.
    pub fn set_pending(
        &self,
        model: ModelHandle,
        element: ElementHandle,
        element_id: Option<String>,
    ) -> Result<()> {
        let epoch = self.epoch();
        self.set_pending_at(epoch, model, element, element_id)
    }

    /// [`set_pending`](Self::set_pending) for a pick that started at `epoch`.
    ///
    /// Fails with [`Error::SelectionSuperseded`] when the model changed since.
    pub fn set_pending_at(
        &self,
        epoch: u64,
        model: ModelHandle,
        element: ElementHandle,
        element_id: Option<String>,
    ) -> Result<()> {
        let element_id = element_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(Error::MissingGuid)?;

        let mut state = self.state();
        if state.epoch != epoch {
            return Err(Error::SelectionSuperseded);
        }
        state.pending = Some(PendingSelection {
            model,
            element,
            element_id,
        });
        if state.form.date.trim().is_empty() {
            state.form.date = format_date(today());
        }
        Ok(())
    }

    /// Current selection epoch; read it before resolving a pick.
    pub fn epoch(&self) -> u64 {
        self.state().epoch
    }

    pub fn pending(&self) -> Option<PendingSelection> {
        self.state().pending.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state().pending.is_some()
    }

    /// Turn the pending selection into a record and push it to the ledger.
    ///
    /// On success the selection goes back to empty and the comment buffer is
    /// cleared. On error nothing changes.
    pub fn commit(&self, date: &str, status: RecordStatus, comment: &str) -> Result<Record> {
        let mut state = self.state();
        let pending = state.pending.as_ref().ok_or(Error::NoPendingSelection)?;
        if date.trim().is_empty() {
            return Err(Error::InvalidDate(date.to_string()));
        }
        let date = parse_date(date).ok_or_else(|| Error::InvalidDate(date.to_string()))?;

        let record = Record {
            element_id: pending.element_id.clone(),
            date,
            status,
            comment: comment.trim().to_string(),
        };
        self.ledger.commit(record.clone());
        state.pending = None;
        state.form.comment.clear();
        Ok(record)
    }

    /// [`commit`](Self::commit) with the values currently in the form.
    pub fn commit_form(&self) -> Result<Record> {
        let form = self.form();
        self.commit(&form.date, form.status, &form.comment)
    }

    pub fn cancel(&self) {
        self.state().pending = None;
    }

    /// Drop the pending selection and start a new epoch; used when a model
    /// load starts.
    pub fn clear(&self) {
        let mut state = self.state();
        state.pending = None;
        state.epoch += 1;
    }

    pub fn form(&self) -> RecordForm {
        self.state().form.clone()
    }

    pub fn set_date(&self, date: impl Into<String>) {
        self.state().form.date = date.into();
    }

    pub fn set_status(&self, status: RecordStatus) {
        self.state().form.status = status;
    }

    pub fn set_comment(&self, comment: impl Into<String>) {
        self.state().form.comment = comment.into();
    }

    /// Today, built, no comment.
    pub fn reset_form(&self) {
        self.state().form = fresh_form();
    }
}

fn fresh_form() -> RecordForm {
    RecordForm {
        date: format_date(today()),
        status: RecordStatus::Built,
        comment: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow() -> (Arc<RecordLedger>, SelectionWorkflow) {
        let ledger = Arc::new(RecordLedger::new());
        let workflow = SelectionWorkflow::new(ledger.clone());
        (ledger, workflow)
    }

    fn pick(workflow: &SelectionWorkflow, element: u32, guid: &str) {
        workflow
            .set_pending(ModelHandle(1), ElementHandle(element), Some(guid.into()))
            .unwrap();
    }

    #[test]
    fn test_last_pick_wins() {
        let (_, workflow) = workflow();
        pick(&workflow, 10, "guid-a");
        pick(&workflow, 11, "guid-b");
        pick(&workflow, 11, "guid-b");
        pick(&workflow, 12, "guid-c");

        let pending = workflow.pending().unwrap();
        assert_eq!(pending.element, ElementHandle(12));
        assert_eq!(pending.element_id, "guid-c");
    }

    #[test]
    fn test_missing_guid_keeps_previous_selection() {
        let (_, workflow) = workflow();
        pick(&workflow, 10, "guid-a");

        let err = workflow
            .set_pending(ModelHandle(1), ElementHandle(11), Some("  ".into()))
            .unwrap_err();
        assert!(matches!(err, Error::MissingGuid));
        assert!(workflow
            .set_pending(ModelHandle(1), ElementHandle(11), None)
            .is_err());
        assert_eq!(workflow.pending().unwrap().element_id, "guid-a");
    }

    #[test]
    fn test_commit_requires_pending_selection() {
        let (ledger, workflow) = workflow();
        let err = workflow.commit("2024-05-14", RecordStatus::Built, "").unwrap_err();
        assert!(matches!(err, Error::NoPendingSelection));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_commit_rejects_bad_dates() {
        let (ledger, workflow) = workflow();
        pick(&workflow, 10, "guid-a");

        for bad in ["", "   ", "2024-13-01", "yesterday"] {
            let err = workflow.commit(bad, RecordStatus::Built, "x").unwrap_err();
            assert!(matches!(err, Error::InvalidDate(_)), "{bad:?}");
        }
        assert!(ledger.is_empty());
        assert!(workflow.is_pending());
    }

    #[test]
    fn test_commit_pushes_record_and_clears() {
        let (ledger, workflow) = workflow();
        pick(&workflow, 10, "guid-a");
        workflow.set_comment("north façade");

        let record = workflow
            .commit("2024-05-14", RecordStatus::Pending, "  north façade ")
            .unwrap();
        assert_eq!(record.element_id, "guid-a");
        assert_eq!(record.comment, "north façade");
        assert_eq!(ledger.records(), vec![record]);
        assert!(!workflow.is_pending());
        assert!(workflow.form().comment.is_empty());
    }

    #[test]
    fn test_pick_defaults_empty_date_to_today() {
        let (_, workflow) = workflow();
        workflow.set_date("");
        pick(&workflow, 10, "guid-a");
        assert_eq!(workflow.form().date, format_date(today()));

        workflow.set_date("2023-12-31");
        pick(&workflow, 11, "guid-b");
        assert_eq!(workflow.form().date, "2023-12-31");
    }

    #[test]
    fn test_commit_form_uses_buffer() {
        let (ledger, workflow) = workflow();
        pick(&workflow, 10, "guid-a");
        workflow.set_date("2024-06-01");
        workflow.set_status(RecordStatus::Pending);
        workflow.set_comment("awaiting inspection");

        let record = workflow.commit_form().unwrap();
        assert_eq!(format_date(record.date), "2024-06-01");
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(ledger.len(), 1);
        // Date and status stay for the next record.
        assert_eq!(workflow.form().date, "2024-06-01");
        assert_eq!(workflow.form().status, RecordStatus::Pending);
    }

    #[test]
    fn test_guid_is_kept_byte_exact() {
        let (_, workflow) = workflow();
        pick(&workflow, 10, " 2O2Fr$t4X7Zf8NOew3FLOH");
        assert_eq!(workflow.pending().unwrap().element_id, " 2O2Fr$t4X7Zf8NOew3FLOH");
    }

    #[test]
    fn test_pick_from_previous_epoch_is_refused() {
        let (_, workflow) = workflow();
        pick(&workflow, 10, "guid-a");
        let started = workflow.epoch();

        workflow.clear();
        let err = workflow
            .set_pending_at(started, ModelHandle(1), ElementHandle(11), Some("guid-b".into()))
            .unwrap_err();
        assert!(matches!(err, Error::SelectionSuperseded));
        assert!(workflow.pending().is_none());

        workflow
            .set_pending_at(workflow.epoch(), ModelHandle(2), ElementHandle(11), Some("guid-b".into()))
            .unwrap();
        assert_eq!(workflow.pending().unwrap().model, ModelHandle(2));
    }

    #[test]
    fn test_cancel() {
        let (_, workflow) = workflow();
        pick(&workflow, 10, "guid-a");
        workflow.cancel();
        assert!(workflow.pending().is_none());
        workflow.cancel();
        assert!(workflow.pending().is_none());
    }
}
