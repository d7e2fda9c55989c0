//! Passphrase-keyed authenticated encryption
//!
//! Encrypted frame format (binary):
//! ```text
//! [16 bytes: KDF salt][12 bytes: IV][16 bytes: GCM tag][N bytes: ciphertext]
//! ```
//!
//! All prefix fields are fixed-width so the receiver slices deterministically
//! without a length prefix.  The key is derived from the passphrase and the
//! frame's salt via PBKDF2-HMAC-SHA256; a frame that is too short to contain
//! the prefix is rejected before any derivation work is spent.

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce, Tag};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroizing;

use pixvault_core::{VaultError, VaultResult};

use crate::{IV_SIZE, KEY_SIZE, SALT_SIZE, TAG_SIZE};

/// PBKDF2 work factor for a derivation site.
///
/// This is a compatibility-breaking parameter: a frame produced under one
/// iteration count cannot be opened under another.  The default is the
/// content/key-wrap site count; the login-verifier site uses its own
/// (see [`crate::passphrase`]).
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 15000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { iterations: 15_000 }
    }
}

/// Derive a 256-bit AES key from a passphrase and salt.
///
/// The salt does not need to be secret; it is stored in the frame prefix.
pub(crate) fn derive_key(
    passphrase: &SecretString,
    salt: &[u8],
    iterations: u32,
) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(
        passphrase.expose_secret().as_bytes(),
        salt,
        iterations,
        key.as_mut_slice(),
    );
    key
}

/// Encrypt a buffer under a passphrase into a self-contained frame.
///
/// A fresh random salt and IV are generated per call, so encrypting the
/// same plaintext twice never yields the same frame.
pub fn encrypt(
    plaintext: &[u8],
    passphrase: &SecretString,
    params: &KdfParams,
) -> VaultResult<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt, params.iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));

    let mut buf = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buf)
        .map_err(|_| anyhow::anyhow!("AEAD encryption failed"))?;

    let mut framed = Vec::with_capacity(SALT_SIZE + IV_SIZE + TAG_SIZE + buf.len());
    framed.extend_from_slice(&salt);
    framed.extend_from_slice(&iv);
    framed.extend_from_slice(&tag);
    framed.extend_from_slice(&buf);
    Ok(framed)
}

/// Decrypt a frame produced by [`encrypt`].
///
/// Fails with the generic [`VaultError::Decryption`] on short/malformed
/// framing and on tag verification failure alike; callers cannot tell a
/// wrong passphrase from corrupted ciphertext.
pub fn decrypt(
    framed: &[u8],
    passphrase: &SecretString,
    params: &KdfParams,
) -> VaultResult<Vec<u8>> {
    // Length preflight comes before the (expensive) key derivation.
    if framed.len() < SALT_SIZE + IV_SIZE + TAG_SIZE {
        return Err(VaultError::Decryption);
    }

    let (salt, rest) = framed.split_at(SALT_SIZE);
    let (iv, rest) = rest.split_at(IV_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let key = derive_key(passphrase, salt, params.iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));

    let mut buf = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buf, Tag::from_slice(tag))
        .map_err(|_| VaultError::Decryption)?;

    Ok(buf)
}
