pub mod error;
pub mod randomness;
pub mod scheduler;
pub mod types;
pub mod verifier;

pub use error::{ChallengeError, Result};
pub use randomness::{sample_index, Blake3Randomness, RandomnessSource};
pub use scheduler::{
    AdvanceOutcome, CallBudget, ChallengeScheduler, ChallengeTargets, ObligationOracle,
};
pub use types::{ChallengeConfig, ChallengeSlot, ChallengeTarget, SlotStatus};
pub use verifier::{DigestVerifier, ProofRejection, ProofVerifier, PublicInputs};
