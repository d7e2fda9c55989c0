//! Vault passphrase hashing and verification
//!
//! Stored encoding: `salt_hex:verifier_hex` with a 16-byte random salt and a
//! 32-byte PBKDF2-SHA256 verifier.  The verifier only gates unlock; it is
//! never key material.  Content-key wrapping derives from the raw passphrase
//! at a separate site (see [`crate::cek`]).

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use pixvault_core::{VaultError, VaultResult};

use crate::{KEY_SIZE, SALT_SIZE};

/// Default PBKDF2 iteration count for the verifier site.
///
/// Compatibility-breaking: verifiers stored under one count never verify
/// under another.
pub const VERIFIER_ITERATIONS: u32 = 100_000;

fn derive_verifier(passphrase: &SecretString, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut verifier = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(
        passphrase.expose_secret().as_bytes(),
        salt,
        iterations,
        verifier.as_mut_slice(),
    );
    verifier
}

/// Hash a passphrase for persisted storage.
pub fn hash_passphrase(passphrase: &SecretString, iterations: u32) -> String {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let verifier = derive_verifier(passphrase, &salt, iterations);
    format!("{}:{}", hex::encode(salt), hex::encode(verifier.as_slice()))
}

/// Verify a passphrase against a stored `salt_hex:verifier_hex` hash.
///
/// The comparison is constant-time over the full verifier length; a
/// mismatching first byte costs the same as a mismatching last byte.
pub fn verify_passphrase(
    passphrase: &SecretString,
    stored: &str,
    iterations: u32,
) -> VaultResult<bool> {
    let (salt_hex, verifier_hex) = stored
        .split_once(':')
        .ok_or_else(|| VaultError::Validation("malformed stored passphrase hash".into()))?;
    let salt = hex::decode(salt_hex)
        .map_err(|_| VaultError::Validation("malformed stored passphrase hash".into()))?;
    let expected = hex::decode(verifier_hex)
        .map_err(|_| VaultError::Validation("malformed stored passphrase hash".into()))?;
    if expected.len() != KEY_SIZE {
        return Err(VaultError::Validation("malformed stored passphrase hash".into()));
    }

    let derived = derive_verifier(passphrase, &salt, iterations);
    Ok(bool::from(derived.as_slice().ct_eq(expected.as_slice())))
}
