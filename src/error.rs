use thiserror::Error;

pub type Result<T, E = TreeError> = std::result::Result<T, E>;

/// Precondition violations reported by the mutating tree operations.
/// A failed operation leaves every tree involved unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("key is already present in the tree")]
    DuplicateKey,

    #[error("key not found")]
    KeyNotFound,

    #[error("key ranges of the joined trees are not separated by the mediator key")]
    OverlappingRanges,
}
