//! Consent service orchestrating bilateral consent over the token store.
//!
//! A proposal is a `bilateral_consent` token moved to `PROPOSED`. The recipient
//! answers with a decision token whose parent is the proposal, and both tokens
//! end up `ACCEPTED` or `REJECTED`. Decided proposals cannot be decided again.
//!
//! Each decision (check, create, two state writes) runs under a single lock, so
//! concurrent accept and reject calls on one proposal cannot both succeed.
use std::{future::Future, pin::Pin, sync::Arc, task::Poll};

use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tower::Service;
#[cfg(feature = "provtoken_tracing")]
use tracing::{debug, info};

use crate::provenance::{
    api::types::{
        Chain, ChainRequest, ChainResponse, ConsentReply, ConsentRequest, ConsentResponse,
        Proposal, StoreRequest, StoreResponse, TokenRef, VerificationResult, VerifyRequest,
        VerifyResponse,
    },
    error::ProvenanceError,
    infrastructure::{
        naming::StoreId,
        token::{
            ConsentPayload, DecisionAction, DecisionPayload, Fields, Token, TokenDraft, TokenKind,
            TokenState,
        },
    },
    services::store::{create_token, fetch_token, update_state},
};

const CONSENT_TYPE: &str = "bilateral";

fn consent_metadata(timestamp_key: &str) -> Fields {
    Fields::from_iter([
        ("consentType".to_string(), json!(CONSENT_TYPE)),
        (timestamp_key.to_string(), json!(Utc::now().to_rfc3339())),
    ])
}

#[derive(Debug, Clone)]
pub struct ConsentService<S, C, V> {
    store: S,
    chain: C,
    verifier: V,
    /// Proposals created by this service, keyed by proposal token id
    proposals: Arc<DashMap<String, Proposal>>,
    /// Serializes decisions
    decisions: Arc<Mutex<()>>,
}

impl<S, C, V> ConsentService<S, C, V> {
    pub fn new(store: S, chain: C, verifier: V) -> Self {
        Self {
            store,
            chain,
            verifier,
            proposals: Arc::new(DashMap::new()),
            decisions: Arc::new(Mutex::new(())),
        }
    }
}

impl<S, C, V> ConsentService<S, C, V>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvenanceError> + StoreId,
    C: Service<ChainRequest, Response = ChainResponse, Error = ProvenanceError>,
    V: Service<VerifyRequest, Response = VerifyResponse, Error = ProvenanceError>,
{
    async fn propose(
        &mut self,
        from: String,
        to: String,
        action: String,
        purpose: String,
        context: Option<Fields>,
        expires_in: Option<TimeDelta>,
    ) -> Result<Proposal, ProvenanceError> {
        let mut draft = TokenDraft::new(
            TokenKind::BilateralConsent,
            ConsentPayload { action, from: from.clone(), to: to.clone() },
            purpose,
        )
        .with_linked(vec![from.clone(), to])
        .with_actor(from)
        .with_metadata(consent_metadata("proposedAt"));
        draft.context = context;
        draft.expires_in = expires_in;

        let token = create_token(&mut self.store, draft).await?;
        let token = update_state(&mut self.store, token.id, TokenState::Proposed)
            .await?
            .ok_or(ProvenanceError::InternalProvenanceError)?;
        let proposal = Proposal { token };
        self.proposals.insert(proposal.id().to_string(), proposal.clone());
        Ok(proposal)
    }

    /// Current token of a proposal that is still awaiting a decision.
    async fn pending_proposal(&mut self, proposal_id: &str) -> Result<Token, ProvenanceError> {
        if !self.proposals.contains_key(proposal_id) {
            return Err(ProvenanceError::ProposalNotFound(proposal_id.to_string()));
        }
        let token = fetch_token(&mut self.store, proposal_id.to_string())
            .await?
            .ok_or_else(|| ProvenanceError::ProposalNotFound(proposal_id.to_string()))?;
        match token.state {
            TokenState::Proposed => Ok(token),
            state => Err(ProvenanceError::ProposalNotPending(proposal_id.to_string(), state)),
        }
    }

    /// Mint the decision token for `proposal` and move both tokens to `state`.
    async fn record_decision(
        &mut self,
        proposal: Token,
        payload: DecisionPayload,
        actor: String,
        reason: String,
        state: TokenState,
    ) -> Result<Token, ProvenanceError> {
        let timestamp_key = match payload.action {
            DecisionAction::ConsentAccepted => "acceptedAt",
            DecisionAction::ConsentRejected => "rejectedAt",
        };
        let mut draft = TokenDraft::new(TokenKind::BilateralConsent, payload, reason)
            .with_actor(actor)
            .with_parent(proposal.id.clone())
            .with_metadata(consent_metadata(timestamp_key));
        draft.linked = proposal.provenance.linked;
        draft.context = proposal.provenance.context;

        let decision = create_token(&mut self.store, draft).await?;
        let decision = update_state(&mut self.store, decision.id, state)
            .await?
            .ok_or(ProvenanceError::InternalProvenanceError)?;
        let proposal = update_state(&mut self.store, proposal.id, state)
            .await?
            .ok_or(ProvenanceError::InternalProvenanceError)?;
        #[cfg(feature = "provtoken_tracing")]
        debug!(
            "[consent-{}] proposal {} -> {:?} by decision {}",
            self.store.store_id(),
            proposal.id,
            state,
            decision.id
        );
        self.proposals.insert(proposal.id.clone(), Proposal { token: proposal });
        Ok(decision)
    }

    async fn accept(
        &mut self,
        proposal_id: String,
        acceptor: String,
    ) -> Result<ConsentResponse, ProvenanceError> {
        let decisions = self.decisions.clone();
        let _guard = decisions.lock().await;

        let proposal = self.pending_proposal(&proposal_id).await?;
        let payload = proposal
            .consent_payload()
            .ok_or_else(|| ProvenanceError::MalformedProposal(proposal_id.clone()))?;
        if payload.to != acceptor {
            return Err(ProvenanceError::RecipientMismatch {
                expected: payload.to.clone(),
                actual: acceptor,
            });
        }
        let decision = DecisionPayload {
            action: DecisionAction::ConsentAccepted,
            original_action: payload.action.clone(),
        };
        let reason = format!("Accepted: {}", proposal.provenance.reason);
        let token = self
            .record_decision(proposal, decision, acceptor, reason, TokenState::Accepted)
            .await?;
        Ok(ConsentResponse { proposal_id, accepted: true, token, reason: None })
    }

    async fn reject(
        &mut self,
        proposal_id: String,
        rejector: String,
        reason: Option<String>,
    ) -> Result<ConsentResponse, ProvenanceError> {
        let decisions = self.decisions.clone();
        let _guard = decisions.lock().await;

        let proposal = self.pending_proposal(&proposal_id).await?;
        let payload = proposal
            .consent_payload()
            .ok_or_else(|| ProvenanceError::MalformedProposal(proposal_id.clone()))?;
        let decision = DecisionPayload {
            action: DecisionAction::ConsentRejected,
            original_action: payload.action.clone(),
        };
        let reason = reason.unwrap_or_else(|| format!("Rejected: {}", proposal.provenance.reason));
        let token = self
            .record_decision(proposal, decision, rejector, reason.clone(), TokenState::Rejected)
            .await?;
        Ok(ConsentResponse { proposal_id, accepted: false, token, reason: Some(reason) })
    }

    async fn consent_chain(&mut self, token_id: String) -> Result<Option<Chain>, ProvenanceError> {
        let ChainResponse::Chain(chain) = self.chain.call(ChainRequest::GetChain(token_id)).await?;
        Ok(chain)
    }

    async fn verify_consent(
        &mut self,
        token_id: String,
    ) -> Result<VerificationResult, ProvenanceError> {
        match self.verifier.call(VerifyRequest::Verify(TokenRef::Id(token_id))).await? {
            VerifyResponse::Verification(result) => Ok(result),
            _ => Err(ProvenanceError::InternalProvenanceError),
        }
    }

    /// Proposals of this service, with their tokens re-read from the store so
    /// that direct state updates (e.g. revocation) are reflected.
    async fn list_proposals(
        &mut self,
        state: Option<TokenState>,
    ) -> Result<Vec<Proposal>, ProvenanceError> {
        let known: Vec<Proposal> =
            self.proposals.iter().map(|entry| entry.value().to_owned()).collect();
        let mut proposals = Vec::with_capacity(known.len());
        for proposal in known {
            let token = fetch_token(&mut self.store, proposal.id().to_string())
                .await?
                .unwrap_or(proposal.token);
            if state.is_none_or(|state| state == token.state) {
                proposals.push(Proposal { token });
            }
        }
        Ok(proposals)
    }
}

impl<S, C, V> StoreId for ConsentService<S, C, V>
where
    S: StoreId,
{
    fn store_id(&self) -> String {
        self.store.store_id()
    }
}

impl<S, C, V> Service<ConsentRequest> for ConsentService<S, C, V>
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
    V: Service<VerifyRequest, Response = VerifyResponse, Error = ProvenanceError>
        + Clone
        + Send
        + 'static,
    V::Future: Send,
{
    type Response = ConsentReply;
    type Error = ProvenanceError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ConsentRequest) -> Self::Future {
        let mut this = self.clone();
        Box::pin(async move {
            match request {
                ConsentRequest::Propose { from, to, action, purpose, context, expires_in } => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!(
                        "[consent-{}] Propose: from: {}, to: {}, action: {}",
                        this.store.store_id(),
                        from,
                        to,
                        action
                    );
                    this.propose(from, to, action, purpose, context, expires_in)
                        .await
                        .map(ConsentReply::Proposal)
                }
                ConsentRequest::Accept { proposal_id, acceptor } => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!(
                        "[consent-{}] Accept: proposal: {}, acceptor: {}",
                        this.store.store_id(),
                        proposal_id,
                        acceptor
                    );
                    this.accept(proposal_id, acceptor).await.map(ConsentReply::Decision)
                }
                ConsentRequest::Reject { proposal_id, rejector, reason } => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!(
                        "[consent-{}] Reject: proposal: {}, rejector: {}, reason: {:?}",
                        this.store.store_id(),
                        proposal_id,
                        rejector,
                        reason
                    );
                    this.reject(proposal_id, rejector, reason).await.map(ConsentReply::Decision)
                }
                ConsentRequest::GetConsentChain(token_id) => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[consent-{}] GetConsentChain: {}", this.store.store_id(), token_id);
                    this.consent_chain(token_id).await.map(ConsentReply::Chain)
                }
                ConsentRequest::VerifyConsent(token_id) => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[consent-{}] VerifyConsent: {}", this.store.store_id(), token_id);
                    this.verify_consent(token_id).await.map(ConsentReply::Verification)
                }
                ConsentRequest::ListProposals(state) => {
                    #[cfg(feature = "provtoken_tracing")]
                    info!("[consent-{}] ListProposals: {:?}", this.store.store_id(), state);
                    this.list_proposals(state).await.map(ConsentReply::Proposals)
                }
            }
        })
    }
}

/// A proposal together with the decisions its recipient can take.
///
/// Returned by [`ConsentService::request_consent`]. Both decisions are made in
/// the name of the proposal's recipient.
#[derive(Debug, Clone)]
pub struct PendingConsent<S, C, V> {
    service: ConsentService<S, C, V>,
    proposal: Proposal,
    recipient: String,
}

impl<S, C, V> ConsentService<S, C, V>
where
    Self: Service<ConsentRequest, Response = ConsentReply, Error = ProvenanceError> + Clone,
{
    /// Propose `action` from `from` to `to` and return a handle deciding it.
    pub async fn request_consent(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        action: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Result<PendingConsent<S, C, V>, ProvenanceError> {
        let recipient = to.into();
        let mut service = self.clone();
        let reply = service
            .call(ConsentRequest::Propose {
                from: from.into(),
                to: recipient.clone(),
                action: action.into(),
                purpose: purpose.into(),
                context: None,
                expires_in: None,
            })
            .await?;
        match reply {
            ConsentReply::Proposal(proposal) => Ok(PendingConsent { service, proposal, recipient }),
            _ => Err(ProvenanceError::InternalProvenanceError),
        }
    }
}

impl<S, C, V> PendingConsent<S, C, V>
where
    ConsentService<S, C, V>:
        Service<ConsentRequest, Response = ConsentReply, Error = ProvenanceError> + Clone,
{
    pub fn proposal(&self) -> &Proposal {
        &self.proposal
    }

    pub async fn accept(&self) -> Result<ConsentResponse, ProvenanceError> {
        self.decide(ConsentRequest::Accept {
            proposal_id: self.proposal.id().to_string(),
            acceptor: self.recipient.clone(),
        })
        .await
    }

    pub async fn reject(&self, reason: Option<String>) -> Result<ConsentResponse, ProvenanceError> {
        self.decide(ConsentRequest::Reject {
            proposal_id: self.proposal.id().to_string(),
            rejector: self.recipient.clone(),
            reason,
        })
        .await
    }

    async fn decide(&self, request: ConsentRequest) -> Result<ConsentResponse, ProvenanceError> {
        let mut service = self.service.clone();
        match service.call(request).await? {
            ConsentReply::Decision(response) => Ok(response),
            _ => Err(ProvenanceError::InternalProvenanceError),
        }
    }
}
