use crate::error::{Result, StoreError};
use crate::item::IndexableItem;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUGGESTION_SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    schema_version: u32,
    items: Vec<IndexableItem>,
}

/// Load a committed generation written by [`save_snapshot`].
pub fn load_snapshot(path: &Path) -> Result<Vec<IndexableItem>> {
    let bytes = std::fs::read(path)?;
    let persisted: PersistedSnapshot = serde_json::from_slice(&bytes)?;
    if persisted.schema_version != SUGGESTION_SNAPSHOT_SCHEMA_VERSION {
        return Err(StoreError::Other(format!(
            "Unsupported suggestion snapshot schema_version {} (expected {SUGGESTION_SNAPSHOT_SCHEMA_VERSION})",
            persisted.schema_version
        )));
    }
    Ok(persisted.items)
}

/// Write `items` next to `path` and rename into place.
pub fn save_snapshot<'a>(
    path: &Path,
    items: impl IntoIterator<Item = &'a IndexableItem>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let persisted = PersistedSnapshot {
        schema_version: SUGGESTION_SNAPSHOT_SCHEMA_VERSION,
        items: items.into_iter().cloned().collect(),
    };
    let bytes = serde_json::to_vec(&persisted)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
