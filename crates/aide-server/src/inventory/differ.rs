//! Disk versus database inventory comparison

use serde::Serialize;
use std::collections::HashSet;

/// Keys present on only one side.
///
/// `disk_only` are ingestion candidates. `db_only` are registered images
/// whose file is missing; they are reported and never removed automatically,
/// since an unmounted volume looks exactly like a deleted file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryDiff {
    pub disk_only: HashSet<String>,
    pub db_only: HashSet<String>,
}

pub fn diff(disk_keys: &HashSet<String>, db_keys: &HashSet<String>) -> InventoryDiff {
    InventoryDiff {
        disk_only: disk_keys.difference(db_keys).cloned().collect(),
        db_only: db_keys.difference(disk_keys).cloned().collect(),
    }
}

impl InventoryDiff {
    pub fn is_consistent(&self) -> bool {
        self.disk_only.is_empty() && self.db_only.is_empty()
    }

    /// `disk_only`, sorted for stable presentation.
    pub fn sorted_disk_only(&self) -> Vec<String> {
        sorted(&self.disk_only)
    }

    /// `db_only`, sorted for stable presentation.
    pub fn sorted_db_only(&self) -> Vec<String> {
        sorted(&self.db_only)
    }
}

fn sorted(keys: &HashSet<String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.iter().cloned().collect();
    keys.sort();
    keys
}
