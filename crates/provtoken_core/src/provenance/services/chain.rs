//! Chain service reconstructing token lineage.
//!
//! Starting from a token, parent links are followed until a root, a parent
//! missing from the store, or an already visited token. Chains are derived on
//! demand and never stored.
use std::{collections::HashSet, future::Future, pin::Pin, task::Poll};

use tower::Service;
#[cfg(feature = "provtoken_tracing")]
use tracing::{debug, info};

use crate::provenance::{
    api::types::{Chain, ChainEnd, ChainRequest, ChainResponse, StoreRequest, StoreResponse},
    error::ProvenanceError,
    infrastructure::naming::StoreId,
    services::store::fetch_token,
};

#[derive(Debug, Clone)]
pub struct ChainService<S> {
    store: S,
}

impl<S> ChainService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ChainService<S>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError> + StoreId,
{
    /// Walk parent links from `id` back to the earliest reachable ancestor.
    ///
    /// Returns `None` if `id` itself is unknown. Tokens are returned from the
    /// earliest ancestor to the requested one.
    async fn chain(&mut self, id: String) -> Result<Option<Chain>, ProvenanceError> {
        let Some(mut token) = fetch_token(&mut self.store, id).await? else {
            return Ok(None);
        };
        let mut visited = HashSet::from([token.id.clone()]);
        let mut tokens = Vec::new();
        let end = loop {
            let parent_id = token.parent_id.clone();
            tokens.push(token);
            let Some(parent_id) = parent_id else {
                break ChainEnd::Root;
            };
            if !visited.insert(parent_id.clone()) {
                #[cfg(feature = "provtoken_tracing")]
                debug!("[chain-{}] cycle detected at {}", self.store.store_id(), parent_id);
                break ChainEnd::Cycle(parent_id);
            }
            match fetch_token(&mut self.store, parent_id.clone()).await? {
                Some(parent) => token = parent,
                None => break ChainEnd::MissingParent(parent_id),
            }
        };
        tokens.reverse();
        Ok(Some(Chain { tokens, end }))
    }
}

impl<S> StoreId for ChainService<S>
where
    S: StoreId,
{
    fn store_id(&self) -> String {
        self.store.store_id()
    }
}

impl<S> Service<ChainRequest> for ChainService<S>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError>
        + Clone
        + Send
        + StoreId
        + 'static,
    S::Future: Send,
{
    type Response = ChainResponse;
    type Error = ProvenanceError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ChainRequest) -> Self::Future {
        let mut this = self.clone();
        Box::pin(async move {
            match request {
                ChainRequest::GetChain(id) => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[chain-{}] GetChain: {}", this.store.store_id(), id);
                    this.chain(id).await.map(ChainResponse::Chain)
                }
            }
        })
    }
}
