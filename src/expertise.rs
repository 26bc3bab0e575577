//! Expertise area hierarchy
//!
//! Areas form a forest: each area names an optional parent, and following
//! parents always ends at a root. Areas are addressed by their integer id
//! everywhere else in the crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AreaId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertiseArea {
    pub id: AreaId,
    pub label: String,
    #[serde(default)]
    pub parent: Option<AreaId>,
}

/// Label of an area together with its chain of ancestors, root last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaPath {
    pub label: String,
    pub parent_expertise_area: Option<Box<AreaPath>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("duplicate expertise area id {0}")]
    DuplicateArea(AreaId),

    #[error("expertise area label '{0}' is used more than once")]
    DuplicateLabel(String),

    #[error("expertise area {area} references unknown parent {parent}")]
    UnknownParent { area: AreaId, parent: AreaId },

    #[error("expertise area {0} is part of a parent cycle")]
    Cycle(AreaId),
}

#[derive(Debug, Clone, Default)]
pub struct ExpertiseAreaHierarchy {
    areas: BTreeMap<AreaId, ExpertiseArea>,
}

impl ExpertiseAreaHierarchy {
    /// Build a hierarchy, rejecting duplicate ids or labels, dangling parents
    /// and cycles. Labels compare ignoring ASCII case.
    pub fn new(areas: Vec<ExpertiseArea>) -> Result<Self, HierarchyError> {
        let mut map: BTreeMap<AreaId, ExpertiseArea> = BTreeMap::new();
        for area in areas {
            if map
                .values()
                .any(|known| known.label.eq_ignore_ascii_case(&area.label))
            {
                return Err(HierarchyError::DuplicateLabel(area.label));
            }
            let id = area.id;
            if map.insert(id, area).is_some() {
                return Err(HierarchyError::DuplicateArea(id));
            }
        }

        for area in map.values() {
            if let Some(parent) = area.parent {
                if !map.contains_key(&parent) {
                    return Err(HierarchyError::UnknownParent {
                        area: area.id,
                        parent,
                    });
                }
            }
        }

        let hierarchy = Self { areas: map };
        for id in hierarchy.areas.keys() {
            // A walk longer than the number of areas must have revisited one.
            let mut steps = 0;
            let mut current = hierarchy.areas[id].parent;
            while let Some(parent) = current {
                steps += 1;
                if steps > hierarchy.areas.len() {
                    return Err(HierarchyError::Cycle(*id));
                }
                current = hierarchy.areas[&parent].parent;
            }
        }

        Ok(hierarchy)
    }

    pub fn get(&self, id: AreaId) -> Option<&ExpertiseArea> {
        self.areas.get(&id)
    }

    pub fn contains(&self, id: AreaId) -> bool {
        self.areas.contains_key(&id)
    }

    pub fn label(&self, id: AreaId) -> Option<&str> {
        self.areas.get(&id).map(|a| a.label.as_str())
    }

    pub fn find_by_label(&self, label: &str) -> Option<&ExpertiseArea> {
        self.areas
            .values()
            .find(|a| a.label.eq_ignore_ascii_case(label))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpertiseArea> {
        self.areas.values()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// The area itself followed by its ancestors up to the root.
    pub fn lineage(&self, id: AreaId) -> Vec<&ExpertiseArea> {
        let mut chain = Vec::new();
        let mut current = self.areas.get(&id);
        while let Some(area) = current {
            chain.push(area);
            current = area.parent.and_then(|p| self.areas.get(&p));
        }
        chain
    }

    pub fn root_of(&self, id: AreaId) -> Option<&ExpertiseArea> {
        self.lineage(id).last().copied()
    }

    /// Nested label/parent view of an area, built from the root downwards.
    pub fn path(&self, id: AreaId) -> Option<AreaPath> {
        let lineage = self.lineage(id);
        let mut path: Option<AreaPath> = None;
        for area in lineage.into_iter().rev() {
            path = Some(AreaPath {
                label: area.label.clone(),
                parent_expertise_area: path.map(Box::new),
            });
        }
        path
    }
}
