use crate::errors::VaultError;
use aes_gcm::{
    aead::{Aead as _, KeyInit as _},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use eyre::Context as _;
use pbkdf2::pbkdf2_hmac;
use rand::Rng as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

/// PBKDF2 rounds for the vault key. Frozen: changing this silently would
/// lock existing installations out of their own storage.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Fixed KDF salt shared by all installations.
///
/// Two installations with the same passphrase derive the same key; each
/// installation's ciphertext stays local, so this is tolerable for now.
/// The `v` field on [`CryptoBox`] keeps a migration path open.
pub const KDF_SALT: &[u8] = b"airfarm_wallet_salt_v1";

const FORMAT_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// Self-describing AES-256-GCM container: version, nonce and ciphertext+tag,
/// transportable as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoBox {
    pub v: u8,
    pub nonce_b64: String,
    pub ct_b64: String,
}

/// Derive the 32-byte vault key from the master passphrase.
///
/// Pure and deterministic: same passphrase, salt and rounds always yield the
/// same key.
pub fn derive_vault_key(
    passphrase: &SecretString,
    salt: &[u8],
    iterations: u32,
) -> Zeroizing<[u8; 32]> {
    let mut out = Zeroizing::new([0_u8; 32]);
    pbkdf2_hmac::<Sha256>(
        passphrase.expose_secret().as_bytes(),
        salt,
        iterations,
        &mut *out,
    );
    out
}

pub fn encrypt(key32: &[u8; 32], plaintext: &[u8]) -> eyre::Result<CryptoBox> {
    let cipher = Aes256Gcm::new_from_slice(key32).context("aes init")?;
    let mut nonce = [0_u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    let ct = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| eyre::eyre!("aes encrypt: {e}"))?;

    Ok(CryptoBox {
        v: FORMAT_VERSION,
        nonce_b64: base64::engine::general_purpose::STANDARD.encode(nonce),
        ct_b64: base64::engine::general_purpose::STANDARD.encode(ct),
    })
}

/// Decrypt and authenticate a [`CryptoBox`].
///
/// A wrong key or any tampering of the ciphertext fails with
/// [`VaultError::Authentication`]; corrupted plaintext is never returned.
/// A malformed container (bad base64, wrong nonce length, unknown version)
/// fails with [`VaultError::CorruptStorage`].
pub fn decrypt(key32: &[u8; 32], b: &CryptoBox) -> eyre::Result<Vec<u8>> {
    if b.v != FORMAT_VERSION {
        return Err(
            VaultError::CorruptStorage(format!("unsupported storage format version {}", b.v))
                .into(),
        );
    }
    let cipher = Aes256Gcm::new_from_slice(key32).context("aes init")?;
    let nonce = base64::engine::general_purpose::STANDARD
        .decode(&b.nonce_b64)
        .map_err(|e| VaultError::CorruptStorage(format!("nonce is not valid base64: {e}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::CorruptStorage("invalid nonce length".to_owned()).into());
    }
    let ct = base64::engine::general_purpose::STANDARD
        .decode(&b.ct_b64)
        .map_err(|e| VaultError::CorruptStorage(format!("ciphertext is not valid base64: {e}")))?;

    // The AEAD error is deliberately opaque; do not leak why it failed.
    let pt = cipher
        .decrypt(Nonce::from_slice(&nonce), ct.as_ref())
        .map_err(|_| VaultError::Authentication)?;
    Ok(pt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::ContextCompat as _;

    fn test_key(fill: u8) -> [u8; 32] {
        [fill; 32]
    }

    #[test]
    fn aes_gcm_roundtrip() -> eyre::Result<()> {
        let key = test_key(7);
        let pt = b"wallet set bytes".to_vec();
        let boxv = encrypt(&key, &pt).context("encrypt")?;
        let out = decrypt(&key, &boxv).context("decrypt")?;
        assert_eq!(out, pt);
        Ok(())
    }

    #[test]
    fn wrong_key_fails_authentication() -> eyre::Result<()> {
        let boxv = encrypt(&test_key(7), b"secret").context("encrypt")?;
        let err = decrypt(&test_key(8), &boxv)
            .err()
            .context("wrong key must fail")?;
        assert_eq!(
            err.downcast_ref::<VaultError>(),
            Some(&VaultError::Authentication)
        );
        Ok(())
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() -> eyre::Result<()> {
        let key = test_key(7);
        let mut boxv = encrypt(&key, b"secret").context("encrypt")?;
        let mut ct = base64::engine::general_purpose::STANDARD
            .decode(&boxv.ct_b64)
            .context("decode ct")?;
        let first = ct.first_mut().context("ciphertext is non-empty")?;
        *first ^= 0xff;
        boxv.ct_b64 = base64::engine::general_purpose::STANDARD.encode(ct);

        let err = decrypt(&key, &boxv).err().context("tamper must fail")?;
        assert_eq!(
            err.downcast_ref::<VaultError>(),
            Some(&VaultError::Authentication)
        );
        Ok(())
    }

    #[test]
    fn unknown_version_fails_corrupt() -> eyre::Result<()> {
        let key = test_key(7);
        let mut boxv = encrypt(&key, b"secret").context("encrypt")?;
        boxv.v = 9;
        let err = decrypt(&key, &boxv).err().context("version must fail")?;
        assert!(matches!(
            err.downcast_ref::<VaultError>(),
            Some(VaultError::CorruptStorage(_))
        ));
        Ok(())
    }

    #[test]
    fn derive_vault_key_is_deterministic() {
        let passphrase = SecretString::from("correct horse battery staple".to_owned());
        let k1 = derive_vault_key(&passphrase, KDF_SALT, KDF_ITERATIONS);
        let k2 = derive_vault_key(&passphrase, KDF_SALT, KDF_ITERATIONS);
        assert_eq!(*k1, *k2);
    }

    #[test]
    fn derive_vault_key_differs_per_passphrase() {
        let k1 = derive_vault_key(
            &SecretString::from("alpha".to_owned()),
            KDF_SALT,
            KDF_ITERATIONS,
        );
        let k2 = derive_vault_key(
            &SecretString::from("beta".to_owned()),
            KDF_SALT,
            KDF_ITERATIONS,
        );
        assert_ne!(*k1, *k2);
    }
}
