use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::MediaUnit;

/// A keyed collection of media units with a materialized total size.
///
/// `total_size` equals the sum of the contained units' sizes after every
/// mutation; all mutation goes through methods that settle the figure in the
/// same step. Keys are the units' relative paths and are unique — inserting
/// an existing key replaces the unit and adjusts the total by the delta.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<PathBuf, MediaUnit>,
    total_size: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&MediaUnit> {
        self.entries.get(path)
    }

    pub fn keys(&self) -> btree_map::Keys<'_, PathBuf, MediaUnit> {
        self.entries.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, MediaUnit> {
        self.entries.iter()
    }

    /// Some key of the catalog, with no ordering contract. Used when any
    /// victim will do.
    pub fn any_path(&self) -> Option<PathBuf> {
        self.entries.keys().next().cloned()
    }

    /// Paths in case-insensitive order, for display and stable batch
    /// execution.
    pub fn sorted_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.entries.keys().cloned().collect();
        paths.sort_by(|a, b| {
            let left = a.to_string_lossy().to_lowercase();
            let right = b.to_string_lossy().to_lowercase();
            left.cmp(&right).then_with(|| a.cmp(b))
        });
        paths
    }

    /// Inserts a unit under its own path, returning the replaced unit if the
    /// key was already present.
    pub fn insert(&mut self, unit: MediaUnit) -> Option<MediaUnit> {
        let size = unit.size_bytes;
        let previous = self.entries.insert(unit.path.clone(), unit);
        if let Some(previous) = &previous {
            self.total_size = self.total_size.saturating_sub(previous.size_bytes);
        }
        self.total_size = self.total_size.saturating_add(size);
        previous
    }

    pub fn remove(&mut self, path: &Path) -> Option<MediaUnit> {
        let removed = self.entries.remove(path);
        if let Some(removed) = &removed {
            self.total_size = self.total_size.saturating_sub(removed.size_bytes);
        }
        removed
    }

    /// Moves one unit into `dest`, settling both totals. A missing key is an
    /// internal invariant violation.
    pub fn move_to(&mut self, path: &Path, dest: &mut Catalog) -> Result<()> {
        let unit = self.remove(path).ok_or_else(|| Error::NotFound {
            path: path.to_path_buf(),
        })?;
        dest.insert(unit);
        Ok(())
    }

    /// Moves every unit whose path is absent from `reference` into a new
    /// catalog and returns it. Afterwards `self` holds exactly the paths it
    /// shares with `reference`.
    pub fn partition(&mut self, reference: &Catalog) -> Catalog {
        let exiled: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|path| !reference.contains(path.as_path()))
            .cloned()
            .collect();

        let mut result = Catalog::new();
        for path in exiled {
            if let Some(unit) = self.remove(&path) {
                result.insert(unit);
            }
        }
        result
    }
}

impl FromIterator<MediaUnit> for Catalog {
    fn from_iter<I: IntoIterator<Item = MediaUnit>>(units: I) -> Self {
        let mut catalog = Catalog::new();
        for unit in units {
            catalog.insert(unit);
        }
        catalog
    }
}
