//! Provenance token data model.
//!
//! A [`Token`] records one action: who performed it (`actor`), what it was and
//! who took part ([`Provenance`]), when it happened, and optionally which token
//! it follows from (`parent_id`). The digest covers the immutable fields only,
//! see [`crate::provenance::infrastructure::digest`].
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form structured map used for context and metadata.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    BilateralConsent,
    UnilateralAction,
    Verification,
    Revocation,
    Delegation,
    Audit,
    Threat,
}

/// Lifecycle tag of a token.
///
/// Tokens are born `Created`. Nothing moves a token between states on its own:
/// expiry is checked against `expires_at` at verification time and never
/// rewrites the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenState {
    Created,
    Proposed,
    Accepted,
    Rejected,
    Expired,
    Revoked,
}

/// Content of a consent proposal: `from` asks `to` to agree to `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsentPayload {
    pub action: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    ConsentAccepted,
    ConsentRejected,
}

/// Content of the token answering a consent proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecisionPayload {
    pub action: DecisionAction,
    pub original_action: String,
}

/// The action a token records.
///
/// Serialized untagged: a JSON object shaped exactly like a consent or decision
/// payload deserializes into the typed variant, any other object into
/// `Structured`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Consent(ConsentPayload),
    Decision(DecisionPayload),
    Text(String),
    Structured(Fields),
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<ConsentPayload> for Content {
    fn from(payload: ConsentPayload) -> Self {
        Content::Consent(payload)
    }
}

impl From<DecisionPayload> for Content {
    fn from(payload: DecisionPayload) -> Self {
        Content::Decision(payload)
    }
}

impl From<Fields> for Content {
    fn from(fields: Fields) -> Self {
        Content::Structured(fields)
    }
}

/// The four-part record every token carries: the action, its participants,
/// its environment and its rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Fields>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub kind: TokenKind,
    pub actor: String,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
    pub state: TokenState,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Fields>,
}

impl Token {
    /// A token without `expires_at` never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn consent_payload(&self) -> Option<&ConsentPayload> {
        match &self.provenance.content {
            Content::Consent(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Creation input for a token.
///
/// Only `kind`, `content` and `reason` are mandatory; the store fills in the
/// id, timestamps, state and digest.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenDraft {
    pub kind: TokenKind,
    pub content: Content,
    pub reason: String,
    pub linked: Option<Vec<String>>,
    pub context: Option<Fields>,
    pub actor: Option<String>,
    pub parent_id: Option<String>,
    /// Lifetime from creation. Negative values yield an already expired token.
    pub expires_in: Option<TimeDelta>,
    pub metadata: Option<Fields>,
}

impl TokenDraft {
    pub fn new(kind: TokenKind, content: impl Into<Content>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            reason: reason.into(),
            linked: None,
            context: None,
            actor: None,
            parent_id: None,
            expires_in: None,
            metadata: None,
        }
    }

    pub fn with_linked(self, linked: Vec<String>) -> Self {
        Self { linked: Some(linked), ..self }
    }

    pub fn with_context(self, context: Fields) -> Self {
        Self { context: Some(context), ..self }
    }

    pub fn with_actor(self, actor: impl Into<String>) -> Self {
        Self { actor: Some(actor.into()), ..self }
    }

    pub fn with_parent(self, parent_id: impl Into<String>) -> Self {
        Self { parent_id: Some(parent_id.into()), ..self }
    }

    pub fn with_expires_in(self, expires_in: TimeDelta) -> Self {
        Self { expires_in: Some(expires_in), ..self }
    }

    pub fn with_metadata(self, metadata: Fields) -> Self {
        Self { metadata: Some(metadata), ..self }
    }
}

/// Predicates for listing tokens. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenFilter {
    pub kind: Option<TokenKind>,
    pub state: Option<TokenState>,
    pub actor: Option<String>,
}

impl TokenFilter {
    pub fn with_kind(self, kind: TokenKind) -> Self {
        Self { kind: Some(kind), ..self }
    }

    pub fn with_state(self, state: TokenState) -> Self {
        Self { state: Some(state), ..self }
    }

    pub fn with_actor(self, actor: impl Into<String>) -> Self {
        Self { actor: Some(actor.into()), ..self }
    }

    pub fn matches(&self, token: &Token) -> bool {
        self.kind.is_none_or(|kind| kind == token.kind)
            && self.state.is_none_or(|state| state == token.state)
            && self.actor.as_ref().is_none_or(|actor| *actor == token.actor)
    }
}
