use thiserror::Error;

use crate::atom::AtomId;

#[derive(Error, Debug)]
pub enum AtomError {
    #[error("index {index} out of bounds for outgoing set of size {arity}")]
    OutgoingIndexOutOfBounds { index: usize, arity: usize },
}

#[derive(Error, Debug)]
pub enum AtomSpaceError {
    #[error("atom {0} is not in the atomspace")]
    UnknownAtom(AtomId),
}

#[derive(Error, Debug)]
pub enum EcanError {
    #[error("{name} must be between 0 and 1, got {value}")]
    InvalidPercentage { name: &'static str, value: f64 },
    #[error("update interval must be at least {min}ms, got {value}ms")]
    IntervalTooShort { value: u64, min: u64 },
    #[error("ECAN scheduler needs a tokio runtime")]
    NoRuntime,
    #[error("invalid ECAN config: {0}")]
    Config(#[from] serde_json::Error),
}
