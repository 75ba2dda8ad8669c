// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary to the model viewer and IFC parser.
//!
//! Rendering, geometry decoding and picking live behind [`Viewer`]. The core
//! only holds opaque [`ModelHandle`] / [`ElementHandle`] values and asks the
//! viewer about them.

use std::fmt;
use std::future::Future;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle of a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelHandle(pub u32);

/// Opaque handle of an element inside a model (the STEP express id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u32);

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model {}", self.0)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a model comes from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    Url(String),
    File { name: String, bytes: Vec<u8> },
}

impl ModelSource {
    /// Human readable name used in log messages.
    ///
    /// URLs resolve to their last non-empty path segment, percent-decoded.
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::Url(raw) => url_display_name(raw),
            ModelSource::File { name, .. } if !name.trim().is_empty() => name.clone(),
            ModelSource::File { .. } => "IFC file".into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ModelSource::Url(raw) => raw.trim().is_empty(),
            ModelSource::File { bytes, .. } => bytes.is_empty(),
        }
    }
}

fn url_display_name(raw: &str) -> String {
    let last_segment = match url::Url::parse(raw) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_owned),
        // Relative paths have no base here, take the raw path instead.
        Err(url::ParseError::RelativeUrlWithoutBase) => raw
            .split(['?', '#'])
            .next()
            .and_then(|path| path.split('/').filter(|s| !s.is_empty()).last())
            .map(str::to_owned),
        Err(_) => None,
    };

    match last_segment {
        Some(segment) => percent_decode_str(&segment)
            .decode_utf8()
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| segment.clone()),
        None => raw.to_string(),
    }
}

/// Result of a successful pick in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedElement {
    pub model: ModelHandle,
    pub element: ElementHandle,
}

/// Node of a model's spatial hierarchy (project, site, building, storey, elements).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialNode {
    pub model: ModelHandle,
    pub element: ElementHandle,
    pub name: Option<String>,
    pub ifc_type: Option<String>,
    #[serde(default)]
    pub children: Vec<SpatialNode>,
}

impl SpatialNode {
    /// `Name (Type)`, with `Unnamed` standing in for a missing name.
    pub fn label(&self) -> String {
        let name = self
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Unnamed");
        match self.ifc_type.as_deref() {
            Some(ty) if !ty.is_empty() => format!("{name} ({ty})"),
            _ => name.to_string(),
        }
    }

    /// Copy of this subtree keeping nodes whose label contains `term`
    /// (lowercased) and the ancestors of such nodes.
    ///
    /// An empty term keeps everything.
    pub fn filtered(&self, term: &str) -> Option<SpatialNode> {
        let children: Vec<SpatialNode> = self
            .children
            .iter()
            .filter_map(|child| child.filtered(term))
            .collect();
        let label_matches = term.is_empty() || self.label().to_lowercase().contains(term);
        if !label_matches && children.is_empty() {
            return None;
        }
        Some(SpatialNode {
            children,
            ..self.clone()
        })
    }
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("engine initialisation failed: {0}")]
    Init(String),

    #[error("could not decode model: {0}")]
    Decode(String),

    #[error("could not fetch model: {0}")]
    Fetch(String),

    #[error("unknown {0}")]
    UnknownModel(ModelHandle),

    #[error("unknown element {element} in {model}")]
    UnknownElement {
        model: ModelHandle,
        element: ElementHandle,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The 3D viewer / IFC parser collaborator.
///
/// `Pointer` is whatever a pointer event carries for the implementation to
/// resolve a pick (screen coordinates, a ray, an express id reported by a
/// client).
pub trait Viewer: Send + Sync + 'static {
    type Pointer: Send + Sync;

    /// One-time engine setup. Called before the first load.
    fn initialize(&self) -> impl Future<Output = Result<(), ViewerError>> + Send;

    fn load(
        &self,
        source: &ModelSource,
    ) -> impl Future<Output = Result<ModelHandle, ViewerError>> + Send;

    fn unload(&self, model: ModelHandle) -> impl Future<Output = Result<(), ViewerError>> + Send;

    fn pick_element(
        &self,
        pointer: &Self::Pointer,
    ) -> impl Future<Output = Result<Option<PickedElement>, ViewerError>> + Send;

    /// The element's GlobalId, if it carries one.
    fn stable_id(
        &self,
        model: ModelHandle,
        element: ElementHandle,
    ) -> impl Future<Output = Result<Option<String>, ViewerError>> + Send;

    fn highlight(
        &self,
        model: ModelHandle,
        element: ElementHandle,
        focus: bool,
    ) -> impl Future<Output = Result<(), ViewerError>> + Send;

    fn has_renderable_geometry(&self, model: ModelHandle) -> bool;

    fn spatial_hierarchy(
        &self,
        model: ModelHandle,
    ) -> impl Future<Output = Result<SpatialNode, ViewerError>> + Send;
}
