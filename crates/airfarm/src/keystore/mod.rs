pub mod crypto;

use crate::{errors::VaultError, fsutil, wallet::WalletRecord};
use eyre::Context as _;
use secrecy::SecretString;
use std::{fs, path::PathBuf};
use zeroize::{Zeroize as _, Zeroizing};

/// On-disk plaintext form of one wallet, as wrapped by the encrypted
/// container: `address` is `0x` + 40 hex, `private_key` is `0x` + 64 hex.
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredWallet {
    address: String,
    private_key: String,
}

/// Encrypted custody of the managed wallet set.
///
/// The vault exclusively owns the in-memory set and the only handle to the
/// encrypted storage file. Construction either fully loads the set (an
/// absent file is an empty set, not an error) or fails outright; there is no
/// partially initialized state.
///
/// Mutations update memory first; persistence is explicit. `create_wallet`
/// alone does not touch disk — a caller generating wallets in a loop owns
/// the final [`WalletVault::persist`] call, and `create_multiple_wallets`'
/// return value is only durable once that method returns.
pub struct WalletVault {
    storage_path: PathBuf,
    key: Zeroizing<[u8; 32]>,
    wallets: Vec<WalletRecord>,
}

impl std::fmt::Debug for WalletVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletVault")
            .field("storage_path", &self.storage_path)
            .field("wallets", &self.wallets.len())
            .finish_non_exhaustive()
    }
}

impl WalletVault {
    /// Open the vault at `storage_path`, deriving the key from `passphrase`.
    ///
    /// Fails with [`VaultError::Authentication`] on a wrong passphrase or
    /// tampered file, [`VaultError::CorruptStorage`] when the decrypted
    /// bytes do not parse. Callers must treat either as fatal.
    pub fn open(storage_path: PathBuf, passphrase: &SecretString) -> eyre::Result<Self> {
        let key = crypto::derive_vault_key(passphrase, crypto::KDF_SALT, crypto::KDF_ITERATIONS);
        let mut vault = Self {
            storage_path,
            key,
            wallets: vec![],
        };
        vault.load()?;
        Ok(vault)
    }

    /// Generate a new random key-pair and append it to the in-memory set.
    ///
    /// Does not persist; see the type-level contract.
    pub fn create_wallet(&mut self) -> WalletRecord {
        let record = WalletRecord::random();
        tracing::info!(address = %record.address(), "created new wallet");
        self.wallets.push(record.clone());
        record
    }

    /// Create `count` wallets, then persist the whole set exactly once.
    ///
    /// `count == 0` returns an empty vec and still writes the (empty or
    /// unchanged) set, so a fresh vault ends up with a valid storage file.
    pub fn create_multiple_wallets(&mut self, count: u32) -> eyre::Result<Vec<WalletRecord>> {
        let mut created = Vec::with_capacity(count as usize);
        for i in 1..=count {
            let record = self.create_wallet();
            tracing::info!(address = %record.address(), "created wallet {i}/{count}");
            created.push(record);
        }
        self.persist()?;
        Ok(created)
    }

    /// The full current set, insertion order preserved.
    pub fn wallets(&self) -> &[WalletRecord] {
        &self.wallets
    }

    pub fn wallet_addresses(&self) -> Vec<String> {
        self.wallets.iter().map(|w| w.address().to_owned()).collect()
    }

    /// Case-insensitive exact match on the hex address; first match wins.
    pub fn wallet_by_address(&self, address: &str) -> Option<&WalletRecord> {
        self.wallets
            .iter()
            .find(|w| w.address().eq_ignore_ascii_case(address))
    }

    /// Serialize, encrypt and atomically overwrite the storage file.
    ///
    /// On [`VaultError::Persistence`] the in-memory set is still correct but
    /// out of sync with disk; re-persisting the same set is safe.
    pub fn persist(&self) -> eyre::Result<()> {
        let mut stored: Vec<StoredWallet> = self
            .wallets
            .iter()
            .map(|w| {
                let key_hex = w.private_key_hex();
                StoredWallet {
                    address: w.address().to_owned(),
                    private_key: String::clone(&key_hex),
                }
            })
            .collect();

        let mut plaintext = serde_json::to_vec(&stored).context("serialize wallet set")?;
        for s in &mut stored {
            s.private_key.zeroize();
        }

        let boxv = crypto::encrypt(&self.key, &plaintext)?;
        plaintext.zeroize();

        let body = serde_json::to_vec(&boxv).context("serialize encrypted container")?;
        fsutil::write_atomic(&self.storage_path, &body, fsutil::MODE_FILE_PRIVATE)
            .map_err(|e| VaultError::Persistence(format!("{e:#}")))?;

        tracing::info!(count = self.wallets.len(), "saved wallets to encrypted storage");
        Ok(())
    }

    fn load(&mut self) -> eyre::Result<()> {
        if !self.storage_path.exists() {
            tracing::info!("no existing wallet storage found");
            return Ok(());
        }

        let body = fs::read(&self.storage_path)
            .with_context(|| format!("read {}", self.storage_path.display()))?;
        let boxv: crypto::CryptoBox = serde_json::from_slice(&body)
            .map_err(|e| VaultError::CorruptStorage(format!("not an encrypted container: {e}")))?;

        let plaintext = Zeroizing::new(crypto::decrypt(&self.key, &boxv)?);
        let mut stored: Vec<StoredWallet> = serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::CorruptStorage(format!("wallet records did not parse: {e}")))?;

        let mut wallets = Vec::with_capacity(stored.len());
        for s in &stored {
            // The address is always re-derived from the key; a persisted
            // address field is never trusted on its own.
            let record = WalletRecord::from_private_key_hex(&s.private_key)
                .map_err(|e| VaultError::CorruptStorage(format!("invalid private key: {e:#}")))?;
            if !record.address().eq_ignore_ascii_case(&s.address) {
                tracing::warn!(
                    stored = %s.address,
                    derived = %record.address(),
                    "stored address does not match its key; using derived address"
                );
            }
            wallets.push(record);
        }
        for s in &mut stored {
            s.private_key.zeroize();
        }

        self.wallets = wallets;
        tracing::info!(count = self.wallets.len(), "loaded wallets from encrypted storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::ContextCompat as _;

    fn passphrase(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    fn vault_path(td: &tempfile::TempDir) -> PathBuf {
        td.path().join("wallets.enc")
    }

    #[test]
    fn absent_storage_yields_empty_set() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let vault = WalletVault::open(vault_path(&td), &passphrase("pw"))?;
        assert!(vault.wallets().is_empty());
        Ok(())
    }

    #[test]
    fn create_multiple_wallets_persists_and_reloads_in_order() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let p = vault_path(&td);

        let mut vault = WalletVault::open(p.clone(), &passphrase("pw"))?;
        let created = vault.create_multiple_wallets(3)?;
        assert_eq!(created.len(), 3);
        for w in &created {
            assert!(w.address().starts_with("0x"));
            assert_eq!(w.address().len(), 42);
        }
        let addresses: std::collections::BTreeSet<&str> =
            created.iter().map(WalletRecord::address).collect();
        assert_eq!(addresses.len(), 3, "addresses must be distinct");

        let reopened = WalletVault::open(p, &passphrase("pw"))?;
        assert_eq!(
            reopened.wallet_addresses(),
            vault.wallet_addresses(),
            "order and content must survive the round-trip"
        );
        Ok(())
    }

    #[test]
    fn zero_count_still_produces_decryptable_empty_storage() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let p = vault_path(&td);

        let mut vault = WalletVault::open(p.clone(), &passphrase("pw"))?;
        let created = vault.create_multiple_wallets(0)?;
        assert!(created.is_empty());
        assert!(p.exists(), "persist must run even for zero wallets");

        let reopened = WalletVault::open(p, &passphrase("pw"))?;
        assert!(reopened.wallets().is_empty());
        Ok(())
    }

    #[test]
    fn wrong_passphrase_fails_authentication() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let p = vault_path(&td);

        WalletVault::open(p.clone(), &passphrase("right"))?.create_multiple_wallets(1)?;

        let err = WalletVault::open(p, &passphrase("wrong"))
            .err()
            .context("wrong passphrase must fail construction")?;
        assert_eq!(
            err.downcast_ref::<VaultError>(),
            Some(&VaultError::Authentication)
        );
        Ok(())
    }

    #[test]
    fn corrupting_one_byte_is_fatal() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let p = vault_path(&td);

        WalletVault::open(p.clone(), &passphrase("pw"))?.create_multiple_wallets(2)?;

        let mut body = fs::read(&p).context("read storage")?;
        // Flip a byte in the middle of the container; depending on where it
        // lands this reads as tampering or as a corrupt container, and both
        // must be fatal.
        let mid = body.len() / 2;
        let byte = body.get_mut(mid).context("storage is non-empty")?;
        *byte ^= 0x01;
        fs::write(&p, &body).context("write corrupted storage")?;

        let err = WalletVault::open(p, &passphrase("pw"))
            .err()
            .context("corrupted storage must fail construction")?;
        assert!(
            matches!(
                err.downcast_ref::<VaultError>(),
                Some(&VaultError::Authentication | &VaultError::CorruptStorage(_))
            ),
            "unexpected error: {err:#}"
        );
        Ok(())
    }

    #[test]
    fn lookup_is_case_insensitive() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let mut vault = WalletVault::open(vault_path(&td), &passphrase("pw"))?;
        let w = vault.create_wallet();

        let upper = w.address().to_uppercase().replace("0X", "0x");
        let lower = w.address().to_lowercase();
        for needle in [upper.as_str(), lower.as_str(), w.address()] {
            let found = vault
                .wallet_by_address(needle)
                .with_context(|| format!("lookup failed for {needle}"))?;
            assert_eq!(found.address(), w.address());
        }
        assert!(vault.wallet_by_address("0xdeadbeef").is_none());
        Ok(())
    }

    #[test]
    fn create_wallet_alone_does_not_persist() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let p = vault_path(&td);

        let mut vault = WalletVault::open(p.clone(), &passphrase("pw"))?;
        vault.create_wallet();
        assert!(!p.exists(), "create_wallet must not write the storage file");

        vault.persist()?;
        let reopened = WalletVault::open(p, &passphrase("pw"))?;
        assert_eq!(reopened.wallets().len(), 1);
        Ok(())
    }

    #[test]
    fn loaded_addresses_are_derived_from_keys_not_the_stored_field() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let p = vault_path(&td);
        let pw = passphrase("pw");

        // Hand-craft a storage file whose address field is garbage while the
        // key is valid; the vault must come up with the derived address.
        let key = crypto::derive_vault_key(&pw, crypto::KDF_SALT, crypto::KDF_ITERATIONS);
        let stored = vec![StoredWallet {
            address: "0x0000000000000000000000000000000000000bad".to_owned(),
            private_key: "0x0000000000000000000000000000000000000000000000000000000000000001"
                .to_owned(),
        }];
        let plaintext = serde_json::to_vec(&stored).context("serialize")?;
        let boxv = crypto::encrypt(&key, &plaintext).context("encrypt")?;
        fs::write(&p, serde_json::to_vec(&boxv).context("serialize container")?)
            .context("write storage")?;

        let vault = WalletVault::open(p, &pw)?;
        assert_eq!(
            vault.wallet_addresses(),
            vec!["0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".to_owned()]
        );
        Ok(())
    }

    #[test]
    fn persisted_file_is_ciphertext_only() -> eyre::Result<()> {
        let td = tempfile::tempdir().context("tempdir")?;
        let p = vault_path(&td);

        let mut vault = WalletVault::open(p.clone(), &passphrase("pw"))?;
        let created = vault.create_multiple_wallets(1)?;
        let w = created.first().context("one wallet created")?;

        let body = fs::read_to_string(&p).context("read storage")?;
        let key_hex = w.private_key_hex();
        let bare_key = key_hex.strip_prefix("0x").unwrap_or(&key_hex);
        assert!(!body.contains(bare_key), "private key leaked to disk");
        assert!(
            !body.to_lowercase().contains(&w.address().to_lowercase()),
            "plaintext address leaked to disk"
        );
        Ok(())
    }
}
