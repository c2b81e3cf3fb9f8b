//! Provenance module.
//!
//! Issues, links and verifies provenance tokens, and runs a bilateral consent
//! protocol on top of them.
//!
//! ## Service Components
//!
//! - **Store**: owns every token and is the only place tokens are mutated
//! - **Chain**: reconstructs a token's lineage by following parent links
//! - **Verifier**: recomputes digests, checks expiry and parents, scores trust
//! - **Consent**: propose/accept/reject between two participants
//!
//! Each component is a `tower::Service` speaking the request/response pairs of
//! [`api`]. Higher components are generic over the services they call, so any
//! layer can be wrapped or replaced.
//!
//! ## Default Service Stacks
//!
//! - `ChainDefaultStack`: chain walker over the in-memory store
//! - `VerifierDefaultStack`: verifier over the in-memory store and default chain walker
//! - `ConsentDefaultStack`: consent orchestrator over the three above
//!
//! [`init_provenance`] builds all four sharing a single store.
pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod services;

use config::ProvenanceConfig;
use services::{
    chain::ChainService, consent::ConsentService, store::TokenStoreService,
    verifier::VerifierService,
};

pub type ChainDefaultStack = ChainService<TokenStoreService>;

pub type VerifierDefaultStack = VerifierService<TokenStoreService, ChainDefaultStack>;

pub type ConsentDefaultStack =
    ConsentService<TokenStoreService, ChainDefaultStack, VerifierDefaultStack>;

/// Services built by [`init_provenance`], all backed by the same store.
#[derive(Debug, Clone)]
pub struct ProvenanceStack {
    pub store: TokenStoreService,
    pub chain: ChainDefaultStack,
    pub verifier: VerifierDefaultStack,
    pub consent: ConsentDefaultStack,
}

/// Initialize a complete provenance stack over a fresh in-memory store.
pub fn init_provenance(config: &ProvenanceConfig) -> ProvenanceStack {
    let store = TokenStoreService::new(config);
    let chain = ChainService::new(store.clone());
    let verifier = VerifierService::new(store.clone(), chain.clone(), config);
    let consent = ConsentService::new(store.clone(), chain.clone(), verifier.clone());
    ProvenanceStack { store, chain, verifier, consent }
}
