//! Provenance tokens with bilateral consent.
//!
//! Issues, links, and verifies small provenance records ("tokens") describing an
//! action, its participants, context and rationale, and layers a two-party
//! propose/accept/reject workflow on top of them. See [`provenance`] for the
//! service stack.
pub mod provenance;
#[cfg(feature = "provtoken_tracing")]
pub mod provtoken_tracing;

#[cfg(test)]
mod tests;
