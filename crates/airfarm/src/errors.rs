use thiserror::Error;

/// Failures of the wallet custody subsystem.
///
/// These are carried inside `eyre::Report` at the boundaries and can be
/// recovered with `Report::downcast_ref` where callers need to distinguish
/// them (the CLI does, to tell "wrong passphrase" apart from plain I/O).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Wrong passphrase or tampered ciphertext at decrypt time.
    ///
    /// Fatal to vault construction: the process must not proceed with an
    /// empty or wrong wallet set.
    #[error("wallet storage authentication failed: wrong passphrase or tampered ciphertext")]
    Authentication,

    /// The storage file decrypted (or read) but does not have the expected
    /// structure. Same fatality as `Authentication`.
    #[error("wallet storage is corrupt: {0}")]
    CorruptStorage(String),

    /// I/O failure while writing the storage file. The in-memory wallet set
    /// is still valid and re-persisting is safe.
    #[error("failed to persist wallet storage: {0}")]
    Persistence(String),

    /// Another process holds the instance lock.
    #[error("another airfarm instance is already running")]
    InstanceBusy,
}
