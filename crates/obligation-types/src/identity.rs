//! Party identities: named ed25519 signing keys.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::{ObligationError, PartyId, Result, TransitionId, TransitionSignature};

/// A party's signing identity. The [`PartyId`] is its public key.
pub struct PartyIdentity {
    name: String,
    signing_key: SigningKey,
}

impl PartyIdentity {
    /// Generate a fresh random identity.
    #[must_use]
    pub fn generate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic identity from a 32-byte seed.
    #[must_use]
    pub fn from_seed(name: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            name: name.into(),
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn party(&self) -> PartyId {
        PartyId(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a transition id.
    #[must_use]
    pub fn sign(&self, txid: &TransitionId) -> TransitionSignature {
        let signature = self.signing_key.sign(txid.as_bytes());
        TransitionSignature {
            signer: self.party(),
            signature: signature.to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for PartyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("PartyIdentity")
            .field("name", &self.name)
            .field("party", &self.party())
            .finish_non_exhaustive()
    }
}

/// Verify an ed25519 `signature` by `signer` over `message`.
pub(crate) fn verify_signature(signer: &PartyId, message: &[u8], signature: &[u8]) -> Result<()> {
    let invalid = || ObligationError::InvalidSignature { signer: *signer };
    let key = VerifyingKey::from_bytes(signer.as_bytes()).map_err(|_| invalid())?;
    let signature = Signature::from_slice(signature).map_err(|_| invalid())?;
    key.verify(message, &signature).map_err(|_| invalid())
}
