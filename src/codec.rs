use crate::catalog::InnerCatalog;
use crate::error::{Result, VaultError};

const MAGIC: &[u8; 4] = b"EFS1";
const VERSION: u8 = 0x01;

/// magic(4) + version(1) + t_cost(4) + m_cost(4) + parallelism(4) + salt(16) + nonce(12).
pub const HEADER_SIZE: usize = 4 + 1 + 4 + 4 + 4 + 16 + 12;

#[derive(Debug, Clone)]
pub struct Header {
    pub t_cost: u32,
    pub m_cost_kib: u32,
    pub parallelism: u32,
    pub salt: [u8; 16],
    pub nonce: [u8; 12],
}

/// Packs the fixed header; the caller appends the ciphertext.
pub fn pack_header(h: &Header) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    let mut off = 0;

    out[off..off + 4].copy_from_slice(MAGIC);
    off += 4;
    out[off] = VERSION;
    off += 1;
    out[off..off + 4].copy_from_slice(&h.t_cost.to_be_bytes());
    off += 4;
    out[off..off + 4].copy_from_slice(&h.m_cost_kib.to_be_bytes());
    off += 4;
    out[off..off + 4].copy_from_slice(&h.parallelism.to_be_bytes());
    off += 4;
    out[off..off + 16].copy_from_slice(&h.salt);
    off += 16;
    out[off..off + 12].copy_from_slice(&h.nonce);
    out
}

/// Unpacks the fixed header from the front of `data`, returning the header and the remaining
/// ciphertext slice.
pub fn unpack_header(data: &[u8]) -> Result<(Header, &[u8])> {
    if data.len() < HEADER_SIZE {
        return Err(VaultError::CorruptVault);
    }
    let mut off = 0;

    let magic = &data[off..off + 4];
    off += 4;
    if magic != MAGIC {
        return Err(VaultError::BadMagic);
    }

    let version = data[off];
    off += 1;
    if version != VERSION {
        return Err(VaultError::UnsupportedVersion);
    }

    let t_cost = u32::from_be_bytes(data[off..off + 4].try_into().unwrap());
    off += 4;
    let m_cost_kib = u32::from_be_bytes(data[off..off + 4].try_into().unwrap());
    off += 4;
    let parallelism = u32::from_be_bytes(data[off..off + 4].try_into().unwrap());
    off += 4;

    let mut salt = [0u8; 16];
    salt.copy_from_slice(&data[off..off + 16]);
    off += 16;

    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&data[off..off + 12]);
    off += 12;

    if t_cost == 0 || m_cost_kib == 0 || parallelism == 0 {
        return Err(VaultError::CorruptVault);
    }

    Ok((
        Header {
            t_cost,
            m_cost_kib,
            parallelism,
            salt,
            nonce,
        },
        &data[off..],
    ))
}

/// Deterministic, compact encoding of the inner catalog — `serde_json` preserves struct
/// field declaration order, so the byte output is stable for a given catalog value.
pub fn catalog_to_bytes(catalog: &InnerCatalog) -> Result<Vec<u8>> {
    serde_json::to_vec(catalog).map_err(|e| VaultError::Internal(format!("encode catalog: {e}")))
}

pub fn catalog_from_bytes(bytes: &[u8]) -> Result<InnerCatalog> {
    let catalog: InnerCatalog =
        serde_json::from_slice(bytes).map_err(|_| VaultError::CorruptCatalog)?;
    catalog.check_unique_ids()?;
    Ok(catalog)
}
