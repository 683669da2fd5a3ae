use crate::catalog::{self, FileEntry};
use crate::crypto;
use crate::engine;
use crate::error::Result;
use crate::keys::{self, FileKey};
use crate::store;
use crate::timestamp;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

/// A folder-add task: a source file on the host filesystem and its logical path inside the
/// vault.
pub struct AddTask {
    pub source_path: PathBuf,
    pub relpath: String,
}

pub struct BulkAddReport {
    pub added_ids: Vec<String>,
    pub failures: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

pub struct BulkRemoveReport {
    pub removed_ids: Vec<String>,
    pub not_found: Vec<String>,
    pub failures: Vec<(String, String)>,
}

enum TaskOutcome {
    Done {
        entry: FileEntry,
        blob_id: String,
    },
    Failed {
        source_path: PathBuf,
        message: String,
    },
}

/// Unlocks once, then runs each add task in a worker-pool thread. Workers produce immutable
/// entries and blob files; no shared mutable catalog is exposed to them. After all tasks
/// finish (or cancellation is observed), a single critical section appends the completed
/// entries — in completion order — re-encrypts, and atomically persists the catalog.
///
/// Failed tasks leave their (if any) partial blob as an orphan and are reported, never rolled
/// back. A caller-triggered cancellation skips the catalog commit entirely; blobs already
/// written by completed tasks become orphans.
pub fn bulk_add(
    repo_dir: &Path,
    passphrase: &str,
    tasks: Vec<AddTask>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<BulkAddReport> {
    let unlocked = engine::unlock(repo_dir, passphrase)?;
    let master = Arc::new(unlocked.master_key);
    let (header, _) = store::read_catalog(repo_dir)?;
    let salt = header.salt;

    let (tx, rx) = mpsc::channel::<TaskOutcome>();
    let cancel = cancel.unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

    rayon::scope(|scope| {
        for task in tasks {
            let tx = tx.clone();
            let master = Arc::clone(&master);
            let cancel = Arc::clone(&cancel);
            scope.spawn(move |_| {
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                let outcome = run_add_task(repo_dir, &master, &task);
                let _ = tx.send(outcome);
            });
        }
    });
    drop(tx);

    let mut catalog = unlocked.catalog;
    let mut added_ids = Vec::new();
    let mut failures = Vec::new();
    for outcome in rx {
        match outcome {
            TaskOutcome::Done { entry, blob_id } => {
                added_ids.push(blob_id);
                catalog.files.push(entry);
            }
            TaskOutcome::Failed {
                source_path,
                message,
            } => failures.push((source_path, message)),
        }
    }

    if cancel.load(Ordering::SeqCst) {
        return Ok(BulkAddReport {
            added_ids: Vec::new(),
            failures,
            cancelled: true,
        });
    }

    engine_persist(repo_dir, &master, &unlocked.kdf_params, &salt, &catalog)?;
    tracing::info!(
        repo = %repo_dir.display(),
        added = added_ids.len(),
        failed = failures.len(),
        "bulk add committed"
    );

    Ok(BulkAddReport {
        added_ids,
        failures,
        cancelled: false,
    })
}

fn run_add_task(
    repo_dir: &Path,
    master: &crate::keys::MasterKey,
    task: &AddTask,
) -> TaskOutcome {
    let fail = |msg: String| TaskOutcome::Failed {
        source_path: task.source_path.clone(),
        message: msg,
    };

    if let Err(e) = catalog::validate_relpath(&task.relpath) {
        return fail(e.to_string());
    }

    let name = match task.source_path.file_name() {
        Some(n) => n.to_string_lossy().to_string(),
        None => return fail("source path has no file name".into()),
    };

    let plaintext = match std::fs::read(&task.source_path) {
        Ok(b) => b,
        Err(e) => return fail(e.to_string()),
    };

    let id = uuid::Uuid::new_v4().to_string();
    let file_key = FileKey::generate();
    let (nonce, ciphertext) = match crypto::aead_encrypt(file_key.as_bytes(), &plaintext) {
        Ok(v) => v,
        Err(e) => return fail(e.to_string()),
    };
    if let Err(e) = store::write_blob(repo_dir, &id, &nonce, &ciphertext) {
        return fail(e.to_string());
    }

    let wrap = match keys::wrap_file_key(master, &file_key) {
        Ok(w) => w,
        Err(e) => return fail(e.to_string()),
    };
    let (created_at, modified_at) = timestamp::source_timestamps(&task.source_path)
        .unwrap_or_else(|_| (timestamp::now_iso(), timestamp::now_iso()));

    TaskOutcome::Done {
        blob_id: id.clone(),
        entry: FileEntry {
            id: id.clone(),
            name,
            relpath: task.relpath.clone(),
            blob: format!("{}/{}.bin", store::BLOBS_DIR_NAME, id),
            size: plaintext.len() as u64,
            created_at,
            modified_at,
            mimetype: None,
            file_key_wrap: wrap,
        },
    }
}

fn engine_persist(
    repo_dir: &Path,
    master: &crate::keys::MasterKey,
    kdf_params: &crate::config::KdfParams,
    salt: &[u8; 16],
    catalog: &crate::catalog::InnerCatalog,
) -> Result<()> {
    let bytes = crate::codec::catalog_to_bytes(catalog)?;
    let (nonce, ciphertext) = crypto::aead_encrypt(master.as_bytes(), &bytes)?;
    let header = crate::codec::Header {
        t_cost: kdf_params.t_cost,
        m_cost_kib: kdf_params.m_cost_kib,
        parallelism: kdf_params.parallelism,
        salt: *salt,
        nonce,
    };
    store::write_catalog_atomic(repo_dir, &header, &ciphertext)
}

/// Unlocks once, deletes each blob in parallel (a missing blob counts as success), then under
/// a single critical section drops whichever entries were actually deleted and persists the
/// catalog. A blob-deletion failure never discards an already-applied mutation: it is reported
/// in `failures` and its entry is left in the catalog, mirroring `bulk_add`'s failure-tolerant
/// commit policy rather than aborting the whole batch.
pub fn bulk_remove(repo_dir: &Path, passphrase: &str, ids: &[String]) -> Result<BulkRemoveReport> {
    let unlocked = engine::unlock(repo_dir, passphrase)?;
    let (header, _) = store::read_catalog(repo_dir)?;
    let salt = header.salt;

    let mut catalog = unlocked.catalog;
    let mut not_found = Vec::new();
    let mut handled: Vec<String> = Vec::new();
    for id in ids {
        if catalog.find(id).is_none() {
            not_found.push(id.clone());
        } else {
            handled.push(id.clone());
        }
    }

    let delete_results: Vec<Result<()>> = {
        use rayon::prelude::*;
        handled
            .par_iter()
            .map(|id| store::delete_blob(repo_dir, id))
            .collect()
    };

    let mut removed_ids = Vec::new();
    let mut failures = Vec::new();
    for (id, result) in handled.into_iter().zip(delete_results) {
        match result {
            Ok(()) => {
                catalog.files.retain(|f| f.id != id);
                removed_ids.push(id);
            }
            Err(e) => failures.push((id, e.to_string())),
        }
    }

    engine_persist(repo_dir, &unlocked.master_key, &unlocked.kdf_params, &salt, &catalog)?;
    tracing::info!(
        repo = %repo_dir.display(),
        removed = removed_ids.len(),
        failed = failures.len(),
        "bulk remove committed"
    );

    Ok(BulkRemoveReport {
        removed_ids,
        not_found,
        failures,
    })
}
