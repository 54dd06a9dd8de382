use alloy::signers::local::PrivateKeySigner;
use eyre::Context as _;
use std::fmt;
use zeroize::Zeroizing;

/// One unit of custody: an EVM account address plus its signing key.
///
/// The address is always derived from the key, never assigned independently.
/// `Debug` prints the address only; the key has no display path out of this
/// type except [`WalletRecord::private_key_hex`], which the keystore uses for
/// encrypted persistence.
#[derive(Clone)]
pub struct WalletRecord {
    address: String,
    signer: PrivateKeySigner,
}

impl WalletRecord {
    /// Generate a fresh key-pair from the OS CSPRNG.
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    /// Rebuild a record from a stored private key, re-deriving the address.
    ///
    /// Accepts the key with or without a `0x` prefix.
    pub fn from_private_key_hex(hex_key: &str) -> eyre::Result<Self> {
        let raw = hex_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = Zeroizing::new(hex::decode(raw).context("decode private key hex")?);
        if bytes.len() != 32 {
            eyre::bail!("private key must be 32 bytes, got {}", bytes.len());
        }
        let signer =
            PrivateKeySigner::from_slice(&bytes).context("parse secp256k1 private key")?;
        Ok(Self::from_signer(signer))
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address().to_checksum(None);
        Self { address, signer }
    }

    /// EIP-55 checksummed address, `0x` + 40 hex characters.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub const fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub(crate) fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(self.signer.to_bytes())))
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
