use crate::catalog::KeyWrap;
use crate::crypto::{self, KEY_LEN, NONCE_LEN};
use crate::error::{Result, VaultError};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 32-byte key derived from the passphrase at every unlock. Never persisted; zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn derive(
        passphrase: &str,
        salt: &[u8; 16],
        t_cost: u32,
        m_cost_kib: u32,
        parallelism: u32,
    ) -> Result<Self> {
        let bytes = crypto::derive_master_key(passphrase, salt, t_cost, m_cost_kib, parallelism)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// 32 random bytes used to AEAD-encrypt a single file's plaintext. Exists only in memory and
/// inside its wrap ciphertext; zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct FileKey([u8; KEY_LEN]);

impl FileKey {
    pub fn generate() -> Self {
        Self(crypto::random_bytes::<KEY_LEN>())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Wraps a per-file key under the master key.
pub fn wrap_file_key(master: &MasterKey, file_key: &FileKey) -> Result<KeyWrap> {
    let (nonce, ct) = crypto::aead_encrypt(master.as_bytes(), file_key.as_bytes())?;
    Ok(KeyWrap::new(&nonce, &ct))
}

/// Unwraps a per-file key under the master key. Fails `AuthenticationFailure` if the wrong
/// master key is supplied.
pub fn unwrap_file_key(master: &MasterKey, wrap: &KeyWrap) -> Result<FileKey> {
    let (mut nonce, ct) = wrap.decode()?;
    if nonce.len() != NONCE_LEN {
        nonce.zeroize();
        return Err(VaultError::CorruptCatalog);
    }
    let mut nonce_arr = [0u8; NONCE_LEN];
    nonce_arr.copy_from_slice(&nonce);
    nonce.zeroize();

    let mut plain = crypto::aead_decrypt(master.as_bytes(), &nonce_arr, &ct)?;
    if plain.len() != KEY_LEN {
        plain.zeroize();
        return Err(VaultError::CorruptCatalog);
    }
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&plain);
    plain.zeroize();
    Ok(FileKey(out))
}
