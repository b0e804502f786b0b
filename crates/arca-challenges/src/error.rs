use arca_types::AccountId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Challenge slot {0} does not exist")]
    SlotOutOfRange(usize),

    #[error("Challenge slot {0} is idle")]
    SlotIdle(usize),

    #[error("Caller {caller} is not the target of slot {slot}")]
    NotTarget { slot: usize, caller: AccountId },

    #[error("Challenge deadline {deadline} of slot {slot} passed at height {height}")]
    DeadlinePassed { slot: usize, deadline: u64, height: u64 },

    #[error("Proof rejected: {0}")]
    ProofRejected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, ChallengeError>;
