//! Verifier service.
//!
//! A token is valid when its recomputed digest matches, it has not expired and
//! its immediate parent (if any) is in the store. Whether the actor is
//! identified only weighs on the trust score, never on validity.
//!
//! Single-token verification looks one hop up the lineage. `VerifyChain`
//! verifies every token along the full lineage instead.
use std::{future::Future, pin::Pin, task::Poll};

use chrono::Utc;
use tower::Service;
#[cfg(feature = "provtoken_tracing")]
use tracing::{debug, info};

use crate::provenance::{
    api::types::{
        ChainRequest, ChainResponse, ChainVerification, StoreRequest, StoreResponse, TokenRef,
        VerificationDetails, VerificationResult, VerifyRequest, VerifyResponse,
    },
    config::ProvenanceConfig,
    error::ProvenanceError,
    infrastructure::{
        digest::digest_token,
        naming::{StoreId, is_identified},
        token::Token,
    },
    services::store::fetch_token,
};

#[derive(Debug, Clone)]
pub struct VerifierService<S, C> {
    store: S,
    chain: C,
    anonymous_actor: String,
}

impl<S, C> VerifierService<S, C> {
    pub fn new(store: S, chain: C, config: &ProvenanceConfig) -> Self {
        Self { store, chain, anonymous_actor: config.anonymous_actor.clone() }
    }
}

impl<S, C> VerifierService<S, C>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError> + StoreId,
    C: Service<ChainRequest, Response = ChainResponse, Error = ProvenanceError>,
{
    async fn verify(&mut self, target: TokenRef) -> Result<VerificationResult, ProvenanceError> {
        let token = match target {
            TokenRef::Id(id) => match fetch_token(&mut self.store, id).await? {
                Some(token) => token,
                None => return Ok(VerificationResult::not_found()),
            },
            TokenRef::Token(token) => *token,
        };
        self.verify_token(&token).await
    }

    async fn verify_token(&mut self, token: &Token) -> Result<VerificationResult, ProvenanceError> {
        // A digest that cannot be recomputed cannot match.
        let signature_valid = digest_token(token).is_ok_and(|digest| digest == token.digest);
        let not_expired = !token.is_expired_at(Utc::now());
        let chain_intact = match &token.parent_id {
            Some(parent_id) => fetch_token(&mut self.store, parent_id.clone()).await?.is_some(),
            None => true,
        };
        let actor_trusted = is_identified(&token.actor, &self.anonymous_actor);

        let details =
            VerificationDetails { signature_valid, not_expired, chain_intact, actor_trusted };
        #[cfg(feature = "provtoken_tracing")]
        debug!("[verifier-{}] {}: {:?}", self.store.store_id(), token.id, details);
        Ok(VerificationResult::from_details(details))
    }

    async fn verify_chain(
        &mut self,
        id: String,
    ) -> Result<Option<ChainVerification>, ProvenanceError> {
        let ChainResponse::Chain(chain) = self.chain.call(ChainRequest::GetChain(id)).await?;
        let Some(chain) = chain else {
            return Ok(None);
        };
        let mut results = Vec::with_capacity(chain.len());
        for token in &chain.tokens {
            results.push(self.verify_token(token).await?);
        }
        let all_valid = chain.is_intact() && results.iter().all(|result| result.valid);
        Ok(Some(ChainVerification { chain, results, all_valid }))
    }
}

impl<S, C> Service<VerifyRequest> for VerifierService<S, C>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError>
        + Clone
        + Send
        + StoreId
        + 'static,
    S::Future: Send,
    C: Service<ChainRequest, Response = ChainResponse, Error = ProvenanceError>
        + Clone
        + Send
        + 'static,
    C::Future: Send,
{
    type Response = VerifyResponse;
    type Error = ProvenanceError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: VerifyRequest) -> Self::Future {
        let mut this = self.clone();
        Box::pin(async move {
            match request {
                VerifyRequest::Verify(target) => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[verifier-{}] Verify: {:?}", this.store.store_id(), target);
                    this.verify(target).await.map(VerifyResponse::Verification)
                }
                VerifyRequest::VerifyChain(id) => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[verifier-{}] VerifyChain: {}", this.store.store_id(), id);
                    this.verify_chain(id).await.map(VerifyResponse::ChainVerification)
                }
            }
        })
    }
}
