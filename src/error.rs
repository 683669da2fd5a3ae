use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Error kinds returned by the vault engine. Distinguishable by variant, never by message —
/// in particular `AuthenticationFailure` covers both a wrong passphrase and a tampered
/// ciphertext so callers cannot tell the two apart.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("catalog magic bytes are not recognized")]
    BadMagic,

    #[error("catalog version is not supported")]
    UnsupportedVersion,

    #[error("catalog is corrupt or truncated")]
    CorruptVault,

    #[error("authentication failed")]
    AuthenticationFailure,

    #[error("inner catalog is corrupt")]
    CorruptCatalog,

    #[error("blob is corrupt or truncated")]
    CorruptBlob,

    #[error("no entry with id {0}")]
    NotFound(String),

    #[error("repository already initialized")]
    AlreadyExists,

    #[error("invalid relpath {0:?}: must be relative, non-empty, and contain no .. components")]
    InvalidRelpath(String),

    #[error("filesystem error: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
