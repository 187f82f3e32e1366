use std::io;

use thiserror::Error;

use crate::{simulation::RoundPhase, Action};

/// Errors raised by the round engine.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("{action} is only allowed in {expected} phase, the round is {actual}")]
    WrongPhase {
        action: &'static str,
        expected: RoundPhase,
        actual: RoundPhase,
    },
    #[error("{0} is not allowed in the current state")]
    NotAllowed(Action),
    #[error("hand cannot be split")]
    NotSplittable,
    #[error("shoe exhausted, penetration must be below 1.0")]
    ShoeExhausted,
    #[error("round is not complete")]
    NotComplete,
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("a shoe needs at least one deck")]
    NoDecks,
    #[error("penetration must be in (0, 1), got {0}")]
    Penetration(f64),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),
    #[error("no valid actions")]
    NoValidActions,
}

/// Failures reading or writing Q-tables and agent checkpoints.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported q-table version {0}")]
    UnsupportedVersion(u32),
    #[error("corrupt file: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
