//! Seam to the external possession-proof verifier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Public inputs of a possession proof, in circuit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    #[serde(with = "hex::serde")]
    pub commitment: [u8; 32],
    #[serde(with = "hex::serde")]
    pub randomness: [u8; 32],
    #[serde(with = "hex::serde")]
    pub identity_key: [u8; 32],
    #[serde(with = "hex::serde")]
    pub identity_aux: [u8; 32],
    #[serde(with = "hex::serde")]
    pub fingerprint: [u8; 32],
}

impl PublicInputs {
    pub fn to_array(&self) -> [[u8; 32]; 5] {
        [
            self.commitment,
            self.randomness,
            self.identity_key,
            self.identity_aux,
            self.fingerprint,
        ]
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProofRejection(pub String);

/// Stateless proof check. Implementations must not mutate market state.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &[u8], inputs: &[[u8; 32]; 5]) -> Result<(), ProofRejection>;
}

/// Development verifier: a proof is valid iff it equals the blake3 digest of
/// the concatenated public inputs. Carries no possession guarantee.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestVerifier;

impl DigestVerifier {
    pub fn prove(inputs: &[[u8; 32]; 5]) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        for input in inputs {
            hasher.update(input);
        }
        hasher.finalize().as_bytes().to_vec()
    }
}

impl ProofVerifier for DigestVerifier {
    fn verify(&self, proof: &[u8], inputs: &[[u8; 32]; 5]) -> Result<(), ProofRejection> {
        if proof.len() != 32 {
            return Err(ProofRejection(format!(
                "expected 32-byte proof, got {} bytes",
                proof.len()
            )));
        }
        if proof != Self::prove(inputs).as_slice() {
            return Err(ProofRejection("digest mismatch".to_string()));
        }
        Ok(())
    }
}
