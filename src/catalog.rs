use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// An AEAD-wrapped 32-byte key, carried on a file entry as base64 text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyWrap {
    pub nonce: String,
    pub ct: String,
}

impl KeyWrap {
    pub fn new(nonce: &[u8], ct: &[u8]) -> Self {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        Self {
            nonce: STANDARD.encode(nonce),
            ct: STANDARD.encode(ct),
        }
    }

    pub fn decode(&self) -> crate::error::Result<(Vec<u8>, Vec<u8>)> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let nonce = STANDARD
            .decode(&self.nonce)
            .map_err(|_| crate::error::VaultError::CorruptCatalog)?;
        let ct = STANDARD
            .decode(&self.ct)
            .map_err(|_| crate::error::VaultError::CorruptCatalog)?;
        Ok((nonce, ct))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub relpath: String,
    pub blob: String,
    pub size: u64,
    pub created_at: String,
    pub modified_at: String,
    #[serde(default)]
    pub mimetype: Option<String>,
    pub file_key_wrap: KeyWrap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InnerCatalog {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl InnerCatalog {
    pub fn empty() -> Self {
        Self {
            version: SCHEMA_VERSION,
            files: Vec::new(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|f| f.id == id)
    }

    pub fn check_unique_ids(&self) -> crate::error::Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(self.files.len());
        for f in &self.files {
            if !seen.insert(f.id.as_str()) {
                return Err(crate::error::VaultError::CorruptCatalog);
            }
        }
        Ok(())
    }
}

/// `relpath` must be relative, use `/` separators, and contain no `..` component.
pub fn validate_relpath(relpath: &str) -> crate::error::Result<()> {
    if relpath.starts_with('/') || relpath.is_empty() {
        return Err(crate::error::VaultError::InvalidRelpath(relpath.to_string()));
    }
    if relpath.split('/').any(|part| part == "..") {
        return Err(crate::error::VaultError::InvalidRelpath(relpath.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_has_schema_version() {
        let c = InnerCatalog::empty();
        assert_eq!(c.version, SCHEMA_VERSION);
        assert!(c.files.is_empty());
    }

    #[test]
    fn keywrap_roundtrips_through_base64() {
        let kw = KeyWrap::new(b"123456789012", b"some ciphertext bytes");
        let (nonce, ct) = kw.decode().unwrap();
        assert_eq!(nonce, b"123456789012");
        assert_eq!(ct, b"some ciphertext bytes");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let entry = |id: &str| FileEntry {
            id: id.to_string(),
            name: "a".into(),
            relpath: "a".into(),
            blob: format!("blobs/{id}.bin"),
            size: 0,
            created_at: "2024-01-01T00:00:00Z".into(),
            modified_at: "2024-01-01T00:00:00Z".into(),
            mimetype: None,
            file_key_wrap: KeyWrap::new(b"nonce123456x", b"ct"),
        };
        let c = InnerCatalog {
            version: 1,
            files: vec![entry("dup"), entry("dup")],
        };
        assert!(c.check_unique_ids().is_err());
    }

    #[test]
    fn relpath_rejects_absolute_and_traversal() {
        assert!(validate_relpath("/etc/passwd").is_err());
        assert!(validate_relpath("a/../b").is_err());
        assert!(validate_relpath("a/b").is_ok());
    }
}
