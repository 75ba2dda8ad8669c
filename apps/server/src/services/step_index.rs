// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lightweight index over an IFC STEP file.
//!
//! Only what the selection workflow needs is kept: type, GlobalId and Name
//! of every rooted entity, the decomposition and containment relations, and
//! whether the file carries any shape representation.

use rustc_hash::{FxHashMap, FxHashSet};
use visor_ifc_core::{ElementHandle, ModelHandle, SpatialNode};

use super::step_parser::{parse_entity, EntityScanner, ParseError};

const AGGREGATES: &str = "IFCRELAGGREGATES";
const CONTAINED: &str = "IFCRELCONTAINEDINSPATIALSTRUCTURE";
const PROJECT: &str = "IFCPROJECT";
const SHAPE: &str = "IFCSHAPEREPRESENTATION";

/// An IfcRoot GlobalId is always 22 characters of the IFC base64 alphabet.
const GLOBAL_ID_LEN: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub type_name: String,
    pub global_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default)]
pub struct StepIndex {
    entities: FxHashMap<u32, EntityInfo>,
    /// Spatial or element parent → children, in file order.
    children: FxHashMap<u32, Vec<u32>>,
    project: Option<u32>,
    shape_representations: usize,
    skipped: usize,
}

impl StepIndex {
    /// Scan `content` and index its entities.
    ///
    /// Malformed instances are skipped and counted; a file without a single
    /// entity is rejected.
    pub fn build(content: &str) -> Result<Self, IndexError> {
        if !content.trim_start().starts_with("ISO-10303-21") {
            return Err(IndexError::NotStep);
        }

        let mut index = StepIndex::default();
        let mut aggregates = Vec::new();
        let mut contained = Vec::new();
        let mut scanner = EntityScanner::new(content);

        while let Some((id, type_name, start, end)) = scanner.next_entity() {
            let upper = type_name.to_ascii_uppercase();
            if upper == SHAPE {
                index.shape_representations += 1;
            }
            let line = &content[start..end];
            // Rooted entities open with their GlobalId string.
            let rooted = line
                .find('(')
                .is_some_and(|open| line[open + 1..].trim_start().starts_with('\''));
            if !rooted {
                continue;
            }

            let args = match parse_entity(line) {
                Ok((_, _, args)) => args,
                Err(ParseError { id, reason }) => {
                    tracing::debug!(id, reason = %reason, "Skipping malformed entity");
                    index.skipped += 1;
                    continue;
                }
            };

            match upper.as_str() {
                AGGREGATES => {
                    if let Some(parent) = args.get(4).and_then(|t| t.as_ref_id()) {
                        let kids = args.get(5).map(|t| t.ref_list()).unwrap_or_default();
                        aggregates.push((parent, kids));
                    }
                }
                CONTAINED => {
                    if let Some(parent) = args.get(5).and_then(|t| t.as_ref_id()) {
                        let kids = args.get(4).map(|t| t.ref_list()).unwrap_or_default();
                        contained.push((parent, kids));
                    }
                }
                PROJECT if index.project.is_none() => index.project = Some(id),
                _ => {}
            }

            let global_id = args
                .first()
                .and_then(|t| t.as_text())
                .filter(|g| g.len() == GLOBAL_ID_LEN);
            let name = args
                .get(2)
                .and_then(|t| t.as_text())
                .filter(|n| !n.trim().is_empty());
            index.entities.insert(
                id,
                EntityInfo {
                    type_name: upper,
                    global_id,
                    name,
                },
            );
        }

        // Decomposition first, then contained elements.
        for (parent, kids) in aggregates.into_iter().chain(contained) {
            index.children.entry(parent).or_default().extend(kids);
        }

        if index.entities.is_empty() {
            return Err(IndexError::Empty);
        }
        tracing::debug!(
            entities = index.entities.len(),
            shapes = index.shape_representations,
            skipped = index.skipped,
            "Indexed STEP content"
        );
        Ok(index)
    }

    pub fn entity(&self, id: u32) -> Option<&EntityInfo> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn has_geometry(&self) -> bool {
        self.shape_representations > 0
    }

    /// Spatial hierarchy from the IfcProject down to contained elements.
    pub fn spatial_tree(&self, model: ModelHandle) -> Option<SpatialNode> {
        let root = self.project?;
        let mut visited = FxHashSet::default();
        Some(self.node(model, root, &mut visited))
    }

    fn node(&self, model: ModelHandle, id: u32, visited: &mut FxHashSet<u32>) -> SpatialNode {
        visited.insert(id);
        let info = self.entities.get(&id);
        let children = self
            .children
            .get(&id)
            .map(|kids| {
                kids.iter()
                    .copied()
                    .filter(|kid| self.entities.contains_key(kid))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
            .into_iter()
            .filter_map(|kid| {
                if visited.contains(&kid) {
                    None
                } else {
                    Some(self.node(model, kid, visited))
                }
            })
            .collect();

        SpatialNode {
            model,
            element: ElementHandle(id),
            name: info.and_then(|i| i.name.clone()),
            ifc_type: info.map(|i| i.type_name.clone()),
            children,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("content is not an ISO 10303-21 file")]
    NotStep,
    #[error("no IFC entities found")]
    Empty,
}
