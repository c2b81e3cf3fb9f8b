//! Infrastructure shared by the provenance services.
//!
//! - **Naming**: participant identifiers and the anonymous sentinel
//! - **Token**: the provenance token data model
//! - **Digest**: integrity digest over a token's immutable fields
//! - **Ids**: token identifier generation

pub mod digest;
pub mod ids;
pub mod naming;
pub mod token;
