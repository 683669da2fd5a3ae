use crate::engine;
use crate::error::Result;
use crate::store;
use std::path::Path;

/// Scans `blobs/` for files whose id has no matching catalog entry and deletes them.
pub fn gc(repo_dir: &Path, passphrase: &str) -> Result<Vec<String>> {
    let unlocked = engine::unlock(repo_dir, passphrase)?;
    let known: std::collections::HashSet<&str> =
        unlocked.catalog.files.iter().map(|f| f.id.as_str()).collect();

    let mut removed = Vec::new();
    for id in store::list_blob_ids(repo_dir)? {
        if !known.contains(id.as_str()) {
            store::delete_blob(repo_dir, &id)?;
            removed.push(id);
        }
    }
    Ok(removed)
}
