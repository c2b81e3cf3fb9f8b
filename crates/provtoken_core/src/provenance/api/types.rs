//! Provenance API type definitions.
//!
//! Each service of the stack speaks one request/response pair:
//!
//! - **Store**: token creation, lookup, state updates, listing, export/import
//! - **Chain**: lineage reconstruction by following parent links
//! - **Verify**: digest, expiry and chain checks with a trust score
//! - **Consent**: the bilateral propose/accept/reject protocol
//!
//! Lookups that miss are reported as `None` inside the response, never as
//! errors. Only the consent protocol fails hard on unknown proposals.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::provenance::infrastructure::token::{
    Fields, Token, TokenDraft, TokenFilter, TokenState,
};

/// Token store request types.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    /// Mint, digest and persist a new token.
    Create(TokenDraft),
    /// Look up a token by id.
    Get(String),
    /// Overwrite the lifecycle state of a token.
    SetState { id: String, state: TokenState },
    /// List all tokens matching the filter, in no particular order.
    List(TokenFilter),
    /// Dump the whole store as a JSON array of `[id, token]` pairs.
    Export,
    /// Restore `[id, token]` pairs, overwriting on id collision. No validation
    /// of digest, state or structure is performed.
    Import(String),
}

/// Token store response types.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreResponse {
    /// The freshly created token.
    Created(Token),
    /// Result of `Get` or `SetState`, `None` if the id is unknown.
    Token(Option<Token>),
    Tokens(Vec<Token>),
    Export(String),
    /// Number of entries restored.
    Imported(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainRequest {
    /// Reconstruct the lineage ending at the given token id.
    GetChain(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainResponse {
    /// `None` if the requested id is not in the store.
    Chain(Option<Chain>),
}

/// How a chain walk ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ChainEnd {
    /// The earliest token has no parent.
    Root,
    /// The earliest token references a parent absent from the store.
    MissingParent(String),
    /// Following parents led back to an already visited token.
    Cycle(String),
}

/// Lineage of a token, ordered from earliest ancestor to the requested token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub tokens: Vec<Token>,
    pub end: ChainEnd,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Earliest reachable ancestor.
    pub fn origin(&self) -> Option<&Token> {
        self.tokens.first()
    }

    /// The token the chain was requested for.
    pub fn current(&self) -> Option<&Token> {
        self.tokens.last()
    }

    /// True if the walk reached a root token.
    pub fn is_intact(&self) -> bool {
        self.end == ChainEnd::Root
    }
}

/// Token to verify, either already in hand or looked up by id.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenRef {
    Id(String),
    Token(Box<Token>),
}

impl From<&str> for TokenRef {
    fn from(id: &str) -> Self {
        TokenRef::Id(id.to_string())
    }
}

impl From<String> for TokenRef {
    fn from(id: String) -> Self {
        TokenRef::Id(id)
    }
}

impl From<Token> for TokenRef {
    fn from(token: Token) -> Self {
        TokenRef::Token(Box::new(token))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyRequest {
    /// Check a single token: digest, expiry, immediate parent, actor.
    Verify(TokenRef),
    /// Check every token along the lineage of the given id.
    VerifyChain(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyResponse {
    Verification(VerificationResult),
    /// `None` if the requested id is not in the store.
    ChainVerification(Option<ChainVerification>),
}

/// Individual checks behind a verification verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDetails {
    /// Recomputed digest equals the stored one.
    pub signature_valid: bool,
    /// No expiry, or expiry strictly in the future.
    pub not_expired: bool,
    /// No parent, or the immediate parent is in the store.
    pub chain_intact: bool,
    /// Actor is not the anonymous sentinel.
    pub actor_trusted: bool,
}

impl VerificationDetails {
    /// Weighted score in tenths: digest 4, expiry 3, chain 2, actor 1.
    pub fn trust_score(&self) -> f64 {
        let tenths = 4 * u8::from(self.signature_valid)
            + 3 * u8::from(self.not_expired)
            + 2 * u8::from(self.chain_intact)
            + u8::from(self.actor_trusted);
        f64::from(tenths) / 10.0
    }

    /// Validity ignores the actor; only the trust score accounts for it.
    pub fn is_valid(&self) -> bool {
        self.signature_valid && self.not_expired && self.chain_intact
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    pub trust_score: f64,
    pub details: VerificationDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResult {
    pub fn from_details(details: VerificationDetails) -> Self {
        Self {
            valid: details.is_valid(),
            trust_score: details.trust_score(),
            details,
            error: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            valid: false,
            trust_score: 0.0,
            details: VerificationDetails::default(),
            error: Some("not found".to_string()),
        }
    }
}

/// Per-token verification of a whole lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub chain: Chain,
    /// One result per chain token, in chain order.
    pub results: Vec<VerificationResult>,
    /// Every token is valid and the walk reached a root.
    pub all_valid: bool,
}

/// A pending or decided consent proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub token: Token,
}

impl Proposal {
    pub fn id(&self) -> &str {
        &self.token.id
    }

    pub fn state(&self) -> TokenState {
        self.token.state
    }
}

/// Outcome of accepting or rejecting a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentResponse {
    pub proposal_id: String,
    pub accepted: bool,
    /// The decision token, child of the proposal token.
    pub token: Token,
    /// Effective rejection reason, unset on acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Consent orchestrator request types.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsentRequest {
    /// `from` proposes `action` to `to`, for `purpose`.
    Propose {
        from: String,
        to: String,
        action: String,
        purpose: String,
        context: Option<Fields>,
        expires_in: Option<TimeDelta>,
    },
    /// The recipient agrees to a pending proposal.
    Accept { proposal_id: String, acceptor: String },
    /// Any participant declines a pending proposal.
    Reject { proposal_id: String, rejector: String, reason: Option<String> },
    /// Lineage of a proposal or decision token.
    GetConsentChain(String),
    /// Verification of a proposal or decision token.
    VerifyConsent(String),
    /// Proposals known to this orchestrator, optionally by current state.
    ListProposals(Option<TokenState>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsentReply {
    Proposal(Proposal),
    Decision(ConsentResponse),
    Chain(Option<Chain>),
    Verification(VerificationResult),
    Proposals(Vec<Proposal>),
}
