//! Token store service.
//!
//! The store exclusively owns the tokens: callers only ever receive clones, and
//! every mutation goes through a [`StoreRequest`].
use std::{future::Future, pin::Pin, sync::Arc, task::Poll};

use chrono::Utc;
use dashmap::DashMap;
use tower::Service;
#[cfg(feature = "provtoken_tracing")]
use tracing::{debug, info};

use crate::provenance::{
    api::types::{StoreRequest, StoreResponse},
    config::ProvenanceConfig,
    error::ProvenanceError,
    infrastructure::{
        digest::digest_token,
        ids::new_id,
        naming::StoreId,
        token::{Provenance, Token, TokenDraft, TokenFilter, TokenState},
    },
};

type TokenMap = DashMap<String, Token>;

/// In-memory token store keyed by token id.
#[derive(Debug, Clone)]
pub struct TokenStoreService {
    store_id: String,
    anonymous_actor: String,
    tokens: Arc<TokenMap>,
}

impl Default for TokenStoreService {
    fn default() -> Self {
        Self::new(&ProvenanceConfig::default())
    }
}

impl TokenStoreService {
    pub fn new(config: &ProvenanceConfig) -> Self {
        Self {
            store_id: config.store_id.clone(),
            anonymous_actor: config.anonymous_actor.clone(),
            tokens: Arc::new(DashMap::new()),
        }
    }

    /// Mint a token from the draft.
    ///
    /// The parent is not required to exist, dangling parents only show up at
    /// verification time.
    async fn create(&self, draft: TokenDraft) -> Result<Token, ProvenanceError> {
        let created_at = Utc::now();
        let expires_at = draft
            .expires_in
            .map(|expires_in| {
                created_at
                    .checked_add_signed(expires_in)
                    .ok_or_else(|| ProvenanceError::InvalidExpiry(expires_in.to_string()))
            })
            .transpose()?;
        let mut token = Token {
            id: new_id(),
            kind: draft.kind,
            actor: draft.actor.unwrap_or_else(|| self.anonymous_actor.clone()),
            provenance: Provenance {
                content: draft.content,
                linked: draft.linked,
                context: draft.context,
                reason: draft.reason,
            },
            created_at,
            state: TokenState::Created,
            digest: String::new(),
            parent_id: draft.parent_id,
            expires_at,
            metadata: draft.metadata,
        };
        token.digest = digest_token(&token)?;
        self.tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn get(&self, id: &str) -> Option<Token> {
        self.tokens.get(id).map(|token| token.value().clone())
    }

    async fn set_state(&self, id: &str, state: TokenState) -> Option<Token> {
        let mut token = self.tokens.get_mut(id)?;
        #[cfg(feature = "provtoken_tracing")]
        debug!("[store-{}] {} state {:?} -> {:?}", self.store_id, id, token.state, state);
        token.state = state;
        Some(token.value().clone())
    }

    async fn list(&self, filter: &TokenFilter) -> Vec<Token> {
        self.tokens
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().to_owned())
            .collect()
    }

    async fn export(&self) -> Result<String, ProvenanceError> {
        let entries: Vec<(String, Token)> = self
            .tokens
            .iter()
            .map(|entry| (entry.key().to_owned(), entry.value().to_owned()))
            .collect();
        Ok(serde_json::to_string(&entries)?)
    }

    /// Restore exported entries. The blob is parsed in full before anything is
    /// inserted, so a malformed blob leaves the store untouched.
    async fn import(&self, blob: &str) -> Result<usize, ProvenanceError> {
        let entries: Vec<(String, Token)> = serde_json::from_str(blob)
            .map_err(|err| ProvenanceError::InvalidImport(err.to_string()))?;
        let count = entries.len();
        for (id, token) in entries {
            self.tokens.insert(id, token);
        }
        Ok(count)
    }
}

impl StoreId for TokenStoreService {
    fn store_id(&self) -> String {
        self.store_id.to_owned()
    }
}

impl Service<StoreRequest> for TokenStoreService {
    type Response = StoreResponse;
    type Error = ProvenanceError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: StoreRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            match request {
                StoreRequest::Create(draft) => {
                    let token = this.create(draft).await?;
                    #[cfg(feature = "provtoken_tracing")]
                    info!(
                        "[store-{}] Create: id: {}, kind: {:?}, actor: {}, parent: {:?}",
                        this.store_id, token.id, token.kind, token.actor, token.parent_id
                    );
                    Ok(StoreResponse::Created(token))
                }
                StoreRequest::Get(id) => {
                    #[cfg(feature = "provtoken_tracing")]
                    debug!("[store-{}] Get: {}", this.store_id, id);
                    Ok(StoreResponse::Token(this.get(&id).await))
                }
                StoreRequest::SetState { id, state } => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[store-{}] SetState: id: {}, state: {:?}", this.store_id, id, state);
                    Ok(StoreResponse::Token(this.set_state(&id, state).await))
                }
                StoreRequest::List(filter) => {
                    #[cfg(feature = "provtoken_tracing")]
                    debug!("[store-{}] List: {:?}", this.store_id, filter);
                    Ok(StoreResponse::Tokens(this.list(&filter).await))
                }
                StoreRequest::Export => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[store-{}] Export: {} tokens", this.store_id, this.tokens.len());
                    this.export().await.map(StoreResponse::Export)
                }
                StoreRequest::Import(blob) => {
                    let count = this.import(&blob).await?;
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[store-{}] Import: {} tokens", this.store_id, count);
                    Ok(StoreResponse::Imported(count))
                }
            }
        })
    }
}

/// Look up a token through any store service.
pub(crate) async fn fetch_token<S>(
    store: &mut S,
    id: String,
) -> Result<Option<Token>, ProvenanceError>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError>,
{
    match store.call(StoreRequest::Get(id)).await? {
        StoreResponse::Token(token) => Ok(token),
        _ => Err(ProvenanceError::InternalProvenanceError),
    }
}

/// Create a token through any store service.
pub(crate) async fn create_token<S>(
    store: &mut S,
    draft: TokenDraft,
) -> Result<Token, ProvenanceError>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError>,
{
    match store.call(StoreRequest::Create(draft)).await? {
        StoreResponse::Created(token) => Ok(token),
        _ => Err(ProvenanceError::InternalProvenanceError),
    }
}

/// Update a token state through any store service.
pub(crate) async fn update_state<S>(
    store: &mut S,
    id: String,
    state: TokenState,
) -> Result<Option<Token>, ProvenanceError>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError>,
{
    match store.call(StoreRequest::SetState { id, state }).await? {
        StoreResponse::Token(token) => Ok(token),
        _ => Err(ProvenanceError::InternalProvenanceError),
    }
}
