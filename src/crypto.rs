use crate::error::{Result, VaultError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha3::{Digest, Sha3_512};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut b = [0u8; N];
    rand::thread_rng().fill_bytes(&mut b);
    b
}

/// Kmaster = Argon2id(SHA3-512(passphrase), salt, t_cost, m_cost_kib, parallelism) -> 32 bytes.
/// The SHA3-512 pre-hash normalizes arbitrary-length passphrases to Argon2's 64-byte secret.
pub fn derive_master_key(
    passphrase: &str,
    salt: &[u8; 16],
    t_cost: u32,
    m_cost_kib: u32,
    parallelism: u32,
) -> Result<[u8; KEY_LEN]> {
    let mut prehash = Sha3_512::new();
    prehash.update(passphrase.as_bytes());
    let prehash = prehash.finalize();

    // Rejected params (e.g. m_cost too small for parallelism) are implausible header fields,
    // not an internal bug — spec.md §7 names this condition `CorruptVault`.
    let params =
        Params::new(m_cost_kib, t_cost, parallelism, Some(KEY_LEN)).map_err(|_| VaultError::CorruptVault)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; KEY_LEN];
    argon2
        .hash_password_into(&prehash, salt, &mut out)
        .map_err(|e| VaultError::Internal(format!("argon2 derivation failed: {e}")))?;
    Ok(out)
}

/// AES-256-GCM encrypt with empty associated data; returns a fresh random nonce and the
/// ciphertext-with-tag.
pub fn aead_encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce_bytes = random_bytes::<NONCE_LEN>();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ct = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| VaultError::Internal("aead encryption failed".into()))?;
    Ok((nonce_bytes, ct))
}

pub fn aead_decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let salt = [7u8; 16];
        let a = derive_master_key("correct horse", &salt, 1, 8, 1).unwrap();
        let b = derive_master_key("correct horse", &salt, 1, 8, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derive_differs_by_passphrase() {
        let salt = [7u8; 16];
        let a = derive_master_key("correct horse", &salt, 1, 8, 1).unwrap();
        let b = derive_master_key("wrong", &salt, 1, 8, 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn aead_roundtrip() {
        let key = random_bytes::<KEY_LEN>();
        let (nonce, ct) = aead_encrypt(&key, b"hello").unwrap();
        let pt = aead_decrypt(&key, &nonce, &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn aead_rejects_wrong_key() {
        let key = random_bytes::<KEY_LEN>();
        let other = random_bytes::<KEY_LEN>();
        let (nonce, ct) = aead_encrypt(&key, b"hello").unwrap();
        assert!(matches!(
            aead_decrypt(&other, &nonce, &ct),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn nonces_are_not_reused_across_many_encryptions() {
        let key = random_bytes::<KEY_LEN>();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..256 {
            let (nonce, _) = aead_encrypt(&key, b"x").unwrap();
            assert!(seen.insert(nonce));
        }
    }
}
