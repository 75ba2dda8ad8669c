// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Business logic services.

pub mod step_index;
pub mod step_parser;
pub mod step_viewer;

pub use step_viewer::{Highlight, ScenePointer, StepViewer};
