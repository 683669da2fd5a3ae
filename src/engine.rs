use crate::catalog::{self, FileEntry, InnerCatalog};
use crate::codec::{self, Header};
use crate::config::KdfParams;
use crate::crypto;
use crate::error::{Result, VaultError};
use crate::keys::{self, FileKey, MasterKey};
use crate::store;
use crate::timestamp;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of `unlock`: the decrypted catalog, the derived master key (held only for the
/// caller's operation or session), and the KDF params echoed from the header so a
/// subsequent re-encrypt does not need a second derivation.
pub struct Unlocked {
    pub catalog: InnerCatalog,
    pub master_key: MasterKey,
    pub kdf_params: KdfParams,
}

fn persist_catalog(
    repo_dir: &Path,
    master: &MasterKey,
    kdf_params: &KdfParams,
    salt: &[u8; 16],
    catalog: &InnerCatalog,
) -> Result<()> {
    let bytes = codec::catalog_to_bytes(catalog)?;
    let (nonce, ciphertext) = crypto::aead_encrypt(master.as_bytes(), &bytes)?;
    let header = Header {
        t_cost: kdf_params.t_cost,
        m_cost_kib: kdf_params.m_cost_kib,
        parallelism: kdf_params.parallelism,
        salt: *salt,
        nonce,
    };
    store::write_catalog_atomic(repo_dir, &header, &ciphertext)?;
    info!(repo = %repo_dir.display(), files = catalog.files.len(), "catalog committed");
    Ok(())
}

pub fn init(
    repo_dir: &Path,
    passphrase: &str,
    kdf_params: KdfParams,
    overwrite: bool,
) -> Result<()> {
    store::ensure_repo_layout(repo_dir)?;
    warn_on_stale_tmp(repo_dir);
    if store::catalog_exists(repo_dir) && !overwrite {
        return Err(VaultError::AlreadyExists);
    }

    let salt = crypto::random_bytes::<16>();
    debug!(t_cost = kdf_params.t_cost, m_cost_kib = kdf_params.m_cost_kib, "deriving master key");
    let master = MasterKey::derive(
        passphrase,
        &salt,
        kdf_params.t_cost,
        kdf_params.m_cost_kib,
        kdf_params.parallelism,
    )?;
    let empty = InnerCatalog::empty();
    persist_catalog(repo_dir, &master, &kdf_params, &salt, &empty)
}

/// Reads the header, derives the master key from header parameters + salt, and AEAD-decrypts
/// the inner catalog.
pub fn unlock(repo_dir: &Path, passphrase: &str) -> Result<Unlocked> {
    warn_on_stale_tmp(repo_dir);
    let (header, ciphertext) = store::read_catalog(repo_dir)?;
    debug!(t_cost = header.t_cost, m_cost_kib = header.m_cost_kib, "deriving master key");
    let master = MasterKey::derive(
        passphrase,
        &header.salt,
        header.t_cost,
        header.m_cost_kib,
        header.parallelism,
    )?;
    let plaintext = crypto::aead_decrypt(master.as_bytes(), &header.nonce, &ciphertext)?;
    let catalog = codec::catalog_from_bytes(&plaintext)?;

    Ok(Unlocked {
        catalog,
        master_key: master,
        kdf_params: KdfParams {
            t_cost: header.t_cost,
            m_cost_kib: header.m_cost_kib,
            parallelism: header.parallelism,
        },
    })
}

/// Logs once, at `warn`, if a leftover `vault.tmp` from a prior interrupted atomic swap is
/// found. Purely diagnostic: the swap protocol already guarantees `vault.enc` itself is never
/// left partial, so this never blocks the operation.
fn warn_on_stale_tmp(repo_dir: &Path) {
    if repo_dir.join("vault.tmp").is_file() {
        tracing::warn!(repo = %repo_dir.display(), "stale vault.tmp present from an interrupted write; harmless, safe to delete");
    }
}

fn unlock_with_salt(repo_dir: &Path, passphrase: &str) -> Result<(Unlocked, [u8; 16])> {
    warn_on_stale_tmp(repo_dir);
    let (header, ciphertext) = store::read_catalog(repo_dir)?;
    debug!(t_cost = header.t_cost, m_cost_kib = header.m_cost_kib, "deriving master key");
    let master = MasterKey::derive(
        passphrase,
        &header.salt,
        header.t_cost,
        header.m_cost_kib,
        header.parallelism,
    )?;
    let plaintext = crypto::aead_decrypt(master.as_bytes(), &header.nonce, &ciphertext)?;
    let catalog = codec::catalog_from_bytes(&plaintext)?;
    let kdf_params = KdfParams {
        t_cost: header.t_cost,
        m_cost_kib: header.m_cost_kib,
        parallelism: header.parallelism,
    };
    Ok((
        Unlocked {
            catalog,
            master_key: master,
            kdf_params,
        },
        header.salt,
    ))
}

/// Encrypts `source_path`'s bytes under a fresh per-file key, writes the blob, appends a new
/// catalog entry, and atomically persists the catalog. The blob is durable on disk before
/// this returns success.
pub fn add(
    repo_dir: &Path,
    passphrase: &str,
    source_path: &Path,
    relpath: Option<String>,
) -> Result<String> {
    let (mut unlocked, salt) = unlock_with_salt(repo_dir, passphrase)?;

    let name = source_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| VaultError::Internal("source path has no file name".into()))?;
    let relpath = relpath.unwrap_or_else(|| name.clone());
    catalog::validate_relpath(&relpath)?;

    let plaintext = std::fs::read(source_path)?;
    let id = Uuid::new_v4().to_string();

    let file_key = FileKey::generate();
    let (nonce, ciphertext) = crypto::aead_encrypt(file_key.as_bytes(), &plaintext)?;
    store::write_blob(repo_dir, &id, &nonce, &ciphertext)?;

    let wrap = keys::wrap_file_key(&unlocked.master_key, &file_key)?;
    let (created_at, modified_at) = timestamp::source_timestamps(source_path)
        .unwrap_or_else(|_| (timestamp::now_iso(), timestamp::now_iso()));

    unlocked.catalog.files.push(FileEntry {
        id: id.clone(),
        name,
        relpath,
        blob: format!("{}/{}.bin", store::BLOBS_DIR_NAME, id),
        size: plaintext.len() as u64,
        created_at,
        modified_at,
        mimetype: None,
        file_key_wrap: wrap,
    });

    persist_catalog(
        repo_dir,
        &unlocked.master_key,
        &unlocked.kdf_params,
        &salt,
        &unlocked.catalog,
    )?;
    Ok(id)
}

/// Decrypts the entry's blob and writes the plaintext to `output_path`. Does not modify the
/// catalog.
pub fn extract(repo_dir: &Path, passphrase: &str, id: &str, output_path: &Path) -> Result<()> {
    let unlocked = unlock(repo_dir, passphrase)?;
    let entry = unlocked
        .catalog
        .find(id)
        .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

    let file_key = keys::unwrap_file_key(&unlocked.master_key, &entry.file_key_wrap)?;
    let blob = store::read_blob(repo_dir, id)?;
    if blob.len() < crypto::NONCE_LEN + crypto::TAG_LEN {
        return Err(VaultError::CorruptBlob);
    }
    let (nonce, ciphertext) = blob.split_at(crypto::NONCE_LEN);
    let mut nonce_arr = [0u8; crypto::NONCE_LEN];
    nonce_arr.copy_from_slice(nonce);

    let plaintext = crypto::aead_decrypt(file_key.as_bytes(), &nonce_arr, ciphertext)
        .map_err(|e| match e {
            VaultError::AuthenticationFailure => VaultError::CorruptBlob,
            other => other,
        })?;
    std::fs::write(output_path, plaintext)?;
    Ok(())
}

/// Overwrites the blob with a fresh per-file key and updates `size`/`file_key_wrap`.
/// `created_at` and `modified_at` are left untouched.
pub fn update(repo_dir: &Path, passphrase: &str, id: &str, new_bytes: &[u8]) -> Result<()> {
    let (mut unlocked, salt) = unlock_with_salt(repo_dir, passphrase)?;

    let file_key = FileKey::generate();
    let (nonce, ciphertext) = crypto::aead_encrypt(file_key.as_bytes(), new_bytes)?;
    let wrap = keys::wrap_file_key(&unlocked.master_key, &file_key)?;

    let entry = unlocked
        .catalog
        .find_mut(id)
        .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
    store::overwrite_blob(repo_dir, id, &nonce, &ciphertext)?;
    entry.size = new_bytes.len() as u64;
    entry.file_key_wrap = wrap;

    persist_catalog(
        repo_dir,
        &unlocked.master_key,
        &unlocked.kdf_params,
        &salt,
        &unlocked.catalog,
    )
}

/// Renames an entry in place; the blob is untouched.
pub fn rename(repo_dir: &Path, passphrase: &str, id: &str, new_name: &str) -> Result<()> {
    let (mut unlocked, salt) = unlock_with_salt(repo_dir, passphrase)?;
    let entry = unlocked
        .catalog
        .find_mut(id)
        .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
    entry.name = new_name.to_string();

    persist_catalog(
        repo_dir,
        &unlocked.master_key,
        &unlocked.kdf_params,
        &salt,
        &unlocked.catalog,
    )
}

/// Deletes the blob (absence is not an error), drops the entry, and persists the catalog.
pub fn remove(repo_dir: &Path, passphrase: &str, id: &str) -> Result<()> {
    let (mut unlocked, salt) = unlock_with_salt(repo_dir, passphrase)?;
    if unlocked.catalog.find(id).is_none() {
        return Err(VaultError::NotFound(id.to_string()));
    }
    store::delete_blob(repo_dir, id)?;
    unlocked.catalog.files.retain(|f| f.id != id);

    persist_catalog(
        repo_dir,
        &unlocked.master_key,
        &unlocked.kdf_params,
        &salt,
        &unlocked.catalog,
    )
}

/// Draws a fresh salt, derives a new master key (optionally under a new passphrase/KDF
/// params), rewraps every per-file key under it, and atomically persists. Blob files are not
/// touched; a failure partway through leaves the old catalog intact via the atomic rename.
pub fn rotate_master(
    repo_dir: &Path,
    passphrase: &str,
    new_passphrase: Option<&str>,
    new_kdf_params: Option<KdfParams>,
) -> Result<()> {
    let unlocked = unlock(repo_dir, passphrase)?;
    let mut catalog = unlocked.catalog;
    let old_master = unlocked.master_key;

    let new_kdf_params = new_kdf_params.unwrap_or(unlocked.kdf_params);
    let new_salt = crypto::random_bytes::<16>();
    let new_master = MasterKey::derive(
        new_passphrase.unwrap_or(passphrase),
        &new_salt,
        new_kdf_params.t_cost,
        new_kdf_params.m_cost_kib,
        new_kdf_params.parallelism,
    )?;

    for entry in catalog.files.iter_mut() {
        let file_key = keys::unwrap_file_key(&old_master, &entry.file_key_wrap)?;
        entry.file_key_wrap = keys::wrap_file_key(&new_master, &file_key)?;
    }

    persist_catalog(repo_dir, &new_master, &new_kdf_params, &new_salt, &catalog)
}
