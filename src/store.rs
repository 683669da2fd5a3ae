use crate::codec::{self, Header};
use crate::error::{Result, VaultError};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const CATALOG_FILE_NAME: &str = "vault.enc";
pub const BLOBS_DIR_NAME: &str = "blobs";

pub fn catalog_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join(CATALOG_FILE_NAME)
}

pub fn blobs_dir(repo_dir: &Path) -> PathBuf {
    repo_dir.join(BLOBS_DIR_NAME)
}

pub fn blob_path(repo_dir: &Path, id: &str) -> PathBuf {
    blobs_dir(repo_dir).join(format!("{id}.bin"))
}

/// Reads and unpacks the catalog header, returning the header and the ciphertext-with-tag.
pub fn read_catalog(repo_dir: &Path) -> Result<(Header, Vec<u8>)> {
    let path = catalog_path(repo_dir);
    let data = fs::read(&path).map_err(VaultError::IoFailure)?;
    let (header, ciphertext) = codec::unpack_header(&data)?;
    Ok((header, ciphertext.to_vec()))
}

/// Writes the header + ciphertext atomically: serialize to a sibling temp file, then rename
/// over the target. A crash or failure between the two leaves the old catalog intact.
pub fn write_catalog_atomic(repo_dir: &Path, header: &Header, ciphertext: &[u8]) -> Result<()> {
    let target = catalog_path(repo_dir);
    let tmp = repo_dir.join("vault.tmp");

    {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)?;
        f.write_all(&codec::pack_header(header))?;
        f.write_all(ciphertext)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, &target)?;
    Ok(())
}

pub fn write_blob(repo_dir: &Path, id: &str, nonce: &[u8], ciphertext: &[u8]) -> Result<()> {
    let path = blob_path(repo_dir, id);
    let mut f = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&path)?;
    f.write_all(nonce)?;
    f.write_all(ciphertext)?;
    f.sync_all()?;
    Ok(())
}

/// Overwrites an existing blob in place (used by `update`, where the id is already taken).
pub fn overwrite_blob(repo_dir: &Path, id: &str, nonce: &[u8], ciphertext: &[u8]) -> Result<()> {
    let path = blob_path(repo_dir, id);
    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&path)?;
    f.write_all(nonce)?;
    f.write_all(ciphertext)?;
    f.sync_all()?;
    Ok(())
}

pub fn read_blob(repo_dir: &Path, id: &str) -> Result<Vec<u8>> {
    let path = blob_path(repo_dir, id);
    let mut f = File::open(&path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Deletes a blob; a missing file is not an error.
pub fn delete_blob(repo_dir: &Path, id: &str) -> Result<()> {
    let path = blob_path(repo_dir, id);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VaultError::IoFailure(e)),
    }
}

pub fn ensure_repo_layout(repo_dir: &Path) -> Result<()> {
    fs::create_dir_all(repo_dir)?;
    fs::create_dir_all(blobs_dir(repo_dir))?;
    Ok(())
}

pub fn catalog_exists(repo_dir: &Path) -> bool {
    catalog_path(repo_dir).is_file()
}

/// Orphan blobs: files under `blobs/` with no matching catalog entry. Tolerated by the data
/// model, never read implicitly; surfaced only by `gc`.
pub fn list_blob_ids(repo_dir: &Path) -> Result<Vec<String>> {
    let dir = blobs_dir(repo_dir);
    let mut ids = Vec::new();
    if !dir.is_dir() {
        return Ok(ids);
    }
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if let Some(id) = name.strip_suffix(".bin") {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_catalog_roundtrips() {
        let dir = tempdir().unwrap();
        ensure_repo_layout(dir.path()).unwrap();
        let header = Header {
            t_cost: 1,
            m_cost_kib: 8,
            parallelism: 1,
            salt: [1u8; 16],
            nonce: [2u8; 12],
        };
        write_catalog_atomic(dir.path(), &header, b"ciphertext-bytes").unwrap();
        let (back, ct) = read_catalog(dir.path()).unwrap();
        assert_eq!(back.t_cost, 1);
        assert_eq!(ct, b"ciphertext-bytes");
    }

    #[test]
    fn swap_never_leaves_truncated_catalog_on_disk() {
        let dir = tempdir().unwrap();
        ensure_repo_layout(dir.path()).unwrap();
        let header = Header {
            t_cost: 1,
            m_cost_kib: 8,
            parallelism: 1,
            salt: [0u8; 16],
            nonce: [0u8; 12],
        };
        write_catalog_atomic(dir.path(), &header, b"first").unwrap();
        write_catalog_atomic(dir.path(), &header, b"second").unwrap();
        let (_, ct) = read_catalog(dir.path()).unwrap();
        assert_eq!(ct, b"second");
        assert!(!dir.path().join("vault.tmp").exists());
    }

    #[test]
    fn delete_missing_blob_is_not_an_error() {
        let dir = tempdir().unwrap();
        ensure_repo_layout(dir.path()).unwrap();
        assert!(delete_blob(dir.path(), "nope").is_ok());
    }

    #[test]
    fn blob_roundtrips() {
        let dir = tempdir().unwrap();
        ensure_repo_layout(dir.path()).unwrap();
        write_blob(dir.path(), "abc", &[1u8; 12], b"ct").unwrap();
        let raw = read_blob(dir.path(), "abc").unwrap();
        assert_eq!(&raw[..12], &[1u8; 12]);
        assert_eq!(&raw[12..], b"ct");
    }
}
