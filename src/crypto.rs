//! RSA-4096 signer: lazy key generation, PKCS8/SPKI PEM persistence, and
//! PSS/MGF1-SHA256 signing with the maximal salt length. Grounded on the
//! teacher's `security::certificate::CertificateAuthority` (PKCS8 keygen,
//! PEM persistence) re-targeted from `pkcs1v15` to the PSS scheme used by
//! `examples/original_source/EcoWipe/core/security_engine.py`.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::{info, warn};

use crate::config::RSA_KEY_BITS;
use crate::error::{WipeError, WipeResult};

const PRIVATE_KEY_FILE: &str = "private_key.pem";
const PUBLIC_KEY_FILE: &str = "public_key.pem";

/// Maximal PSS salt length for SHA-256 over an `RSA_KEY_BITS`-bit modulus:
/// `key_size_bytes - hash_len - 2`, per RFC 8017 §9.1.1. `SigningKey::new`
/// defaults to a salt equal to the digest size (32 bytes), which is a
/// smaller, non-maximal salt -- spec §4.6 calls for `salt_length = max`.
const PSS_SALT_LEN: usize = RSA_KEY_BITS / 8 - 32 - 2;

/// Holds the operator's signing keypair. Generated once and persisted to
/// `key_dir`; subsequent runs load the existing pair. A corrupted key file is
/// a fatal startup error -- this crate never silently regenerates a keypair
/// whose certificates might already be in circulation.
pub struct Signer {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl Signer {
    /// Load the keypair from `key_dir`, generating and persisting a fresh
    /// RSA-4096 pair if neither file exists yet.
    pub fn load_or_generate(key_dir: &Path) -> WipeResult<Self> {
        let private_path = key_dir.join(PRIVATE_KEY_FILE);
        let public_path = key_dir.join(PUBLIC_KEY_FILE);

        if private_path.exists() && public_path.exists() {
            return Self::load(&private_path, &public_path);
        }

        info!(dir = %key_dir.display(), "no existing keypair found, generating RSA-{RSA_KEY_BITS}");
        let signer = Self::generate()?;
        signer.persist(&private_path, &public_path)?;
        Ok(signer)
    }

    fn generate() -> WipeResult<Self> {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| WipeError::security_violation(format!("failed to generate keypair: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self { private_key, public_key })
    }

    fn load(private_path: &Path, public_path: &Path) -> WipeResult<Self> {
        let private_pem = fs::read_to_string(private_path)
            .map_err(|e| WipeError::security_violation(format!("cannot read private key: {e}")))?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&private_pem)
            .map_err(|e| WipeError::security_violation(format!("corrupted private key file: {e}")))?;

        let public_pem = fs::read_to_string(public_path)
            .map_err(|e| WipeError::security_violation(format!("cannot read public key: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_pem(&public_pem)
            .map_err(|e| WipeError::security_violation(format!("corrupted public key file: {e}")))?;

        Ok(Self { private_key, public_key })
    }

    fn persist(&self, private_path: &Path, public_path: &Path) -> WipeResult<()> {
        let private_pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| WipeError::security_violation(format!("failed to encode private key: {e}")))?;
        let public_pem = self
            .public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| WipeError::security_violation(format!("failed to encode public key: {e}")))?;

        fs::write(private_path, private_pem.as_bytes())
            .map_err(|e| WipeError::security_violation(format!("failed to write private key: {e}")))?;
        fs::write(public_path, public_pem.as_bytes())
            .map_err(|e| WipeError::security_violation(format!("failed to write public key: {e}")))?;
        Ok(())
    }

    /// Sign `data` with RSA-PSS/MGF1-SHA256 using the maximum possible salt
    /// length, returning the signature base64-encoded.
    pub fn sign(&self, data: &[u8]) -> WipeResult<String> {
        let signing_key = SigningKey::<Sha256>::new_with_salt_len(self.private_key.clone(), PSS_SALT_LEN);
        let mut rng = OsRng;
        let signature = signing_key.sign_with_rng(&mut rng, data);
        Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
    }

    /// Verify a base64-encoded PSS signature. Never panics or propagates an
    /// error for a bad signature -- only `Ok(false)`.
    pub fn verify(&self, data: &[u8], signature_b64: &str) -> bool {
        let verifying_key = VerifyingKey::<Sha256>::new(self.public_key.clone());

        let raw = match general_purpose::STANDARD.decode(signature_b64) {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!("signature is not valid base64");
                return false;
            }
        };

        let signature = match rsa::pss::Signature::try_from(raw.as_slice()) {
            Ok(sig) => sig,
            Err(_) => {
                warn!("signature bytes are not a valid PSS signature");
                return false;
            }
        };

        verifying_key.verify(data, &signature).is_ok()
    }

    pub fn public_key_pem(&self) -> WipeResult<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| WipeError::security_violation(format!("failed to encode public key: {e}")))
    }

    pub fn key_paths(key_dir: &Path) -> (PathBuf, PathBuf) {
        (key_dir.join(PRIVATE_KEY_FILE), key_dir.join(PUBLIC_KEY_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Signer::generate().unwrap();
        let signature = signer.sign(b"payload hash bytes").unwrap();
        assert!(signer.verify(b"payload hash bytes", &signature));
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let signer = Signer::generate().unwrap();
        let signature = signer.sign(b"original").unwrap();
        assert!(!signer.verify(b"tampered", &signature));
    }

    #[test]
    fn verify_rejects_garbage_signature() {
        let signer = Signer::generate().unwrap();
        assert!(!signer.verify(b"payload", "not-a-real-signature"));
    }

    #[test]
    fn generate_then_load_round_trips_keys() {
        let dir = std::env::temp_dir().join(format!("ecowipe_test_keys_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let signer = Signer::load_or_generate(&dir).unwrap();
        let signature = signer.sign(b"hello").unwrap();

        let reloaded = Signer::load_or_generate(&dir).unwrap();
        assert!(reloaded.verify(b"hello", &signature));

        let _ = fs::remove_dir_all(&dir);
    }
}
