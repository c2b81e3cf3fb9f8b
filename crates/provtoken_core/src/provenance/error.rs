use thiserror::Error;

use crate::provenance::infrastructure::token::TokenState;

#[derive(Debug, Error, PartialEq)]
pub enum ProvenanceError {
    #[error("Provenance error, internal provtoken API error")]
    InternalProvenanceError,

    #[error("Provenance error, proposal not found (id: {0})")]
    ProposalNotFound(String),

    #[error(
        "Provenance error, acceptor does not match intended recipient (expected: {expected}, actual: {actual})"
    )]
    RecipientMismatch { expected: String, actual: String },

    #[error("Provenance error, proposal no longer pending (id: {0}, state: {1:?})")]
    ProposalNotPending(String, TokenState),

    #[error("Provenance error, proposal content is not a consent payload (id: {0})")]
    MalformedProposal(String),

    #[error("Provenance error, serialization failed: {0}")]
    Serialization(String),

    #[error("Provenance error, invalid import: {0}")]
    InvalidImport(String),

    #[error("Provenance error, expiry out of range (expires in: {0})")]
    InvalidExpiry(String),
}

impl From<serde_json::Error> for ProvenanceError {
    fn from(err: serde_json::Error) -> Self {
        ProvenanceError::Serialization(err.to_string())
    }
}
