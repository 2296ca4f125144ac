//! Head signing and signature verification.
//!
//! Signers sign the digest they are handed as-is. The head digest is already
//! a hash, so no pre-hashing happens here.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{Result, TrustlogError};

/// Produces signatures over head digests.
pub trait HeadSigner: Send + Sync {
    /// Sign `digest` without hashing it again.
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>>;

    /// Raw public key bytes.
    fn public_key(&self) -> Vec<u8>;
}

/// Checks signatures over head digests.
pub trait HeadVerifier: Send + Sync {
    /// Returns true if `signature` is valid for `digest`.
    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 [`HeadSigner`].
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Build from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = seed.try_into().map_err(|_| {
            TrustlogError::InvalidKey(format!("expected 32-byte seed, got {} bytes", seed.len()))
        })?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    /// Build from a hex-encoded seed. Surrounding whitespace is ignored.
    pub fn from_hex(seed_hex: &str) -> Result<Self> {
        let seed = hex::decode(seed_hex.trim())
            .map_err(|e| TrustlogError::InvalidKey(format!("seed is not hex: {}", e)))?;
        Self::from_seed(&seed)
    }

    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// The 32-byte seed.
    pub fn seed(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    /// Verifier for this key.
    pub fn verifier(&self) -> Ed25519Verifier {
        Ed25519Verifier {
            key: self.key.verifying_key(),
        }
    }
}

impl HeadSigner for Ed25519Signer {
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self
            .key
            .try_sign(digest)
            .map_err(|e| TrustlogError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }
}

/// Ed25519 [`HeadVerifier`].
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Build from a 32-byte public key.
    pub fn from_bytes(public_key: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = public_key.try_into().map_err(|_| {
            TrustlogError::InvalidKey(format!(
                "expected 32-byte public key, got {} bytes",
                public_key.len()
            ))
        })?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| TrustlogError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Build from a hex-encoded public key.
    pub fn from_hex(public_key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(public_key_hex.trim())
            .map_err(|e| TrustlogError::InvalidKey(format!("public key is not hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Raw public key bytes.
    pub fn public_key(&self) -> Vec<u8> {
        self.key.to_bytes().to_vec()
    }
}

impl HeadVerifier for Ed25519Verifier {
    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.key.verify(digest, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519Signer::from_seed(&[7u8; 32]).unwrap();
        let verifier = signer.verifier();

        let sig = signer.sign(b"digest").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verifier.verify(b"digest", &sig));
        assert!(!verifier.verify(b"other", &sig));
        assert!(!verifier.verify(b"digest", &sig[..63]));
    }

    #[test]
    fn test_wrong_key_lengths_rejected() {
        assert!(matches!(
            Ed25519Signer::from_seed(&[1u8; 31]),
            Err(TrustlogError::InvalidKey(_))
        ));
        assert!(matches!(
            Ed25519Verifier::from_bytes(&[1u8; 33]),
            Err(TrustlogError::InvalidKey(_))
        ));
        assert!(Ed25519Signer::from_hex("zz").is_err());
    }

    #[test]
    fn test_hex_roundtrip() {
        let signer = Ed25519Signer::generate();
        let restored = Ed25519Signer::from_hex(&hex::encode(signer.seed())).unwrap();
        assert_eq!(signer.public_key(), restored.public_key());

        let verifier = Ed25519Verifier::from_hex(&hex::encode(signer.public_key())).unwrap();
        let sig = restored.sign(b"x").unwrap();
        assert!(verifier.verify(b"x", &sig));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let signer = Ed25519Signer::from_seed(&[3u8; 32]).unwrap();
        assert_eq!(signer.sign(b"d").unwrap(), signer.sign(b"d").unwrap());
    }
}
