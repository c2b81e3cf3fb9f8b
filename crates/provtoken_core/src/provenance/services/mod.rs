//! Core services of the provenance stack.
//!
//! - **Store**: owns every token, keyed by id
//! - **Chain**: reconstructs token lineage from parent links
//! - **Verifier**: integrity, expiry and lineage checks with a trust score
//! - **Consent**: two-party propose/accept/reject protocol on top of the store

pub mod chain;
pub mod consent;
pub mod store;
pub mod verifier;
