//! Per-version label class registry.
//!
//! A registry is a snapshot of a version's classes loaded once at the start
//! of a save and threaded through every annotation of that save. Allocation
//! is a pure function of the snapshot plus the label names seen so far:
//! new names get `max(existing) + 1` (or 0), in first-seen order.

use std::collections::{BTreeMap, HashMap};

use rusqlite::Connection;
use tracing::debug;

use crate::catalog::labels;
use crate::error::LabelforgeError;
use crate::model::{ClassId, LabelClass, VersionId};

/// Outcome of resolving a label name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The name already had a class id.
    Existing(ClassId),
    /// A new class was allocated and must be persisted.
    Allocated(LabelClass),
}

impl Resolution {
    pub fn class_id(&self) -> ClassId {
        match self {
            Resolution::Existing(id) => *id,
            Resolution::Allocated(class) => class.class_id,
        }
    }
}

/// Snapshot of a version's label classes.
#[derive(Clone, Debug)]
pub struct LabelRegistry {
    version_id: VersionId,
    by_name: HashMap<String, ClassId>,
    by_id: BTreeMap<ClassId, String>,
    next: ClassId,
    allocated: usize,
}

impl LabelRegistry {
    /// Build a registry from already-loaded classes.
    pub fn from_classes(version_id: VersionId, classes: &[LabelClass]) -> Self {
        let by_id: BTreeMap<ClassId, String> = classes
            .iter()
            .map(|c| (c.class_id, c.name.clone()))
            .collect();
        let by_name = classes
            .iter()
            .map(|c| (c.name.clone(), c.class_id))
            .collect();
        let next = by_id
            .keys()
            .next_back()
            .map(ClassId::next)
            .unwrap_or(ClassId::FIRST);

        Self {
            version_id,
            by_name,
            by_id,
            next,
            allocated: 0,
        }
    }

    /// Load the registry of `version_id` from the catalog.
    pub fn load(conn: &Connection, version_id: VersionId) -> Result<Self, LabelforgeError> {
        let classes = labels::load_label_classes(conn, version_id)?;
        Ok(Self::from_classes(version_id, &classes))
    }

    /// Resolve `name`, allocating the next class id if it is new.
    pub fn resolve(&mut self, name: &str) -> Resolution {
        if let Some(id) = self.by_name.get(name) {
            return Resolution::Existing(*id);
        }

        let class_id = self.next;
        self.next = class_id.next();
        self.allocated += 1;
        self.by_name.insert(name.to_string(), class_id);
        self.by_id.insert(class_id, name.to_string());

        Resolution::Allocated(LabelClass {
            class_id,
            version_id: self.version_id,
            name: name.to_string(),
        })
    }

    /// Resolve `name` and insert a row for it if it was new.
    pub fn resolve_and_persist(
        &mut self,
        conn: &Connection,
        name: &str,
    ) -> Result<ClassId, LabelforgeError> {
        match self.resolve(name) {
            Resolution::Existing(id) => Ok(id),
            Resolution::Allocated(class) => {
                labels::insert_label_class(conn, &class)?;
                debug!(
                    version_id = %class.version_id,
                    class_id = %class.class_id,
                    name = %class.name,
                    "registered label class"
                );
                Ok(class.class_id)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, class_id: ClassId) -> Option<&str> {
        self.by_id.get(&class_id).map(String::as_str)
    }

    /// Class names sorted by ascending class id.
    pub fn names_in_order(&self) -> Vec<String> {
        self.by_id.values().cloned().collect()
    }

    /// Returns true if the ids are exactly `0..len`, so position equals class id.
    pub fn is_contiguous(&self) -> bool {
        self.by_id
            .keys()
            .enumerate()
            .all(|(idx, id)| id.as_u32() as usize == idx)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of classes allocated since this snapshot was taken.
    pub fn allocated_count(&self) -> usize {
        self.allocated
    }
}
