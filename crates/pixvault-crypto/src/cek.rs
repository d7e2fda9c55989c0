//! Per-object content keys and passphrase wrapping
//!
//! Every encrypted object gets a fresh 256-bit content key.  The object (and
//! its thumbnail) are sealed under that key; the key itself is sealed under
//! the verified raw vault passphrase and persisted base64-encoded next to
//! the ciphertext.  Only the wrapped form ever leaves memory.
//!
//! Both seals use the [`crate::aead`] frame with the key material hex-encoded
//! as the passphrase input, so content frames and wrapped-key frames share a
//! single self-contained format.

use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use pixvault_core::{VaultError, VaultResult};

use crate::aead::{self, KdfParams};
use crate::KEY_SIZE;

/// A per-object 256-bit content encryption key. Zeroized on drop.
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Hex form of the key, used as the passphrase input to the AEAD frame.
    fn encoded(&self) -> SecretString {
        SecretString::from(hex::encode(self.bytes))
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit content key.
pub fn generate_content_key() -> ContentKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    ContentKey::from_bytes(bytes)
}

/// Seal a media buffer under a content key.
pub fn protect(plaintext: &[u8], key: &ContentKey, params: &KdfParams) -> VaultResult<Vec<u8>> {
    aead::encrypt(plaintext, &key.encoded(), params)
}

/// Open a media frame sealed with [`protect`].
pub fn reveal(framed: &[u8], key: &ContentKey, params: &KdfParams) -> VaultResult<Vec<u8>> {
    aead::decrypt(framed, &key.encoded(), params)
}

/// Wrap (encrypt) a content key under the raw vault passphrase.
///
/// The passphrase here must be the verified raw passphrase from an active
/// vault session, never the stored login verifier: the verifier is a public
/// artifact of the same secret, and keying content to it would tie every
/// wrapped key to the hashing scheme.
pub fn wrap_content_key(
    key: &ContentKey,
    passphrase: &SecretString,
    params: &KdfParams,
) -> VaultResult<String> {
    let framed = aead::encrypt(key.encoded().expose_secret().as_bytes(), passphrase, params)?;
    Ok(BASE64.encode(framed))
}

/// Unwrap (decrypt) a content key with the raw vault passphrase.
///
/// Fails with the generic [`VaultError::Decryption`] on a wrong passphrase,
/// corrupted transport encoding, or a tampered frame.
pub fn unwrap_content_key(
    wrapped: &str,
    passphrase: &SecretString,
    params: &KdfParams,
) -> VaultResult<ContentKey> {
    let framed = BASE64.decode(wrapped).map_err(|_| VaultError::Decryption)?;
    let mut encoded = aead::decrypt(&framed, passphrase, params)?;

    let decoded = hex::decode(&encoded);
    encoded.zeroize();
    let mut decoded = decoded.map_err(|_| VaultError::Decryption)?;
    if decoded.len() != KEY_SIZE {
        decoded.zeroize();
        return Err(VaultError::Decryption);
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&decoded);
    decoded.zeroize();

    Ok(ContentKey::from_bytes(bytes))
}
