use crate::catalog::InnerCatalog;
use crate::config::KdfParams;
use crate::crypto;
#[cfg(test)]
use crate::engine;
use crate::error::{Result, VaultError};
use crate::keys::{self, FileKey, MasterKey};
use crate::store;
use crate::timestamp;
use std::path::{Path, PathBuf};

/// An unlocked vault handle cached by a consumer across several operations so the KDF
/// derivation and catalog header read happen only once. The engine itself stays stateless.
/// Dropping the handle zeroizes the master key.
pub struct VaultHandle {
    repo_dir: PathBuf,
    master_key: MasterKey,
    kdf_params: KdfParams,
    salt: [u8; 16],
    catalog: InnerCatalog,
}

impl VaultHandle {
    pub fn unlock(repo_dir: &Path, passphrase: &str) -> Result<Self> {
        let (header, ciphertext) = store::read_catalog(repo_dir)?;
        let master_key = MasterKey::derive(
            passphrase,
            &header.salt,
            header.t_cost,
            header.m_cost_kib,
            header.parallelism,
        )?;
        let plaintext = crypto::aead_decrypt(master_key.as_bytes(), &header.nonce, &ciphertext)?;
        let catalog = crate::codec::catalog_from_bytes(&plaintext)?;

        Ok(Self {
            repo_dir: repo_dir.to_path_buf(),
            master_key,
            kdf_params: KdfParams {
                t_cost: header.t_cost,
                m_cost_kib: header.m_cost_kib,
                parallelism: header.parallelism,
            },
            salt: header.salt,
            catalog,
        })
    }

    /// Flat file list; callers wanting a tree split `relpath` on `/` themselves.
    pub fn list(&self) -> &[crate::catalog::FileEntry] {
        &self.catalog.files
    }

    fn persist(&self) -> Result<()> {
        let bytes = crate::codec::catalog_to_bytes(&self.catalog)?;
        let (nonce, ciphertext) = crypto::aead_encrypt(self.master_key.as_bytes(), &bytes)?;
        let header = crate::codec::Header {
            t_cost: self.kdf_params.t_cost,
            m_cost_kib: self.kdf_params.m_cost_kib,
            parallelism: self.kdf_params.parallelism,
            salt: self.salt,
            nonce,
        };
        store::write_catalog_atomic(&self.repo_dir, &header, &ciphertext)
    }

    pub fn add(&mut self, source_path: &Path, relpath: Option<String>) -> Result<String> {
        let name = source_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| VaultError::Internal("source path has no file name".into()))?;
        let relpath = relpath.unwrap_or_else(|| name.clone());
        crate::catalog::validate_relpath(&relpath)?;

        let plaintext = std::fs::read(source_path)?;
        let id = uuid::Uuid::new_v4().to_string();

        let file_key = FileKey::generate();
        let (nonce, ciphertext) = crypto::aead_encrypt(file_key.as_bytes(), &plaintext)?;
        store::write_blob(&self.repo_dir, &id, &nonce, &ciphertext)?;

        let wrap = keys::wrap_file_key(&self.master_key, &file_key)?;
        let (created_at, modified_at) = timestamp::source_timestamps(source_path)
            .unwrap_or_else(|_| (timestamp::now_iso(), timestamp::now_iso()));

        self.catalog.files.push(crate::catalog::FileEntry {
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

        self.persist()?;
        Ok(id)
    }

    pub fn extract(&self, id: &str, output_path: &Path) -> Result<()> {
        let entry = self
            .catalog
            .find(id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        let file_key = keys::unwrap_file_key(&self.master_key, &entry.file_key_wrap)?;
        let blob = store::read_blob(&self.repo_dir, id)?;
        if blob.len() < crypto::NONCE_LEN + crypto::TAG_LEN {
            return Err(VaultError::CorruptBlob);
        }
        let (nonce, ct) = blob.split_at(crypto::NONCE_LEN);
        let mut nonce_arr = [0u8; crypto::NONCE_LEN];
        nonce_arr.copy_from_slice(nonce);
        let plaintext = crypto::aead_decrypt(file_key.as_bytes(), &nonce_arr, ct).map_err(|e| {
            match e {
                VaultError::AuthenticationFailure => VaultError::CorruptBlob,
                other => other,
            }
        })?;
        std::fs::write(output_path, plaintext)?;
        Ok(())
    }

    pub fn rename(&mut self, id: &str, new_name: &str) -> Result<()> {
        let entry = self
            .catalog
            .find_mut(id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        entry.name = new_name.to_string();
        self.persist()
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        if self.catalog.find(id).is_none() {
            return Err(VaultError::NotFound(id.to_string()));
        }
        store::delete_blob(&self.repo_dir, id)?;
        self.catalog.files.retain(|f| f.id != id);
        self.persist()
    }
}
