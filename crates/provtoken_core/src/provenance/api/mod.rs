//! Request and response types of the provenance services.
pub mod types;

pub use types::*;
