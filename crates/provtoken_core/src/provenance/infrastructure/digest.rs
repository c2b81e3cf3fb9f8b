//! Integrity digest over a token's immutable fields.
//!
//! The digest is SHA-256 over the JSON encoding of `id, kind, actor,
//! provenance, createdAt, parentId`, with object keys sorted at every level.
//! `state`, `expiresAt` and
//! `metadata` are left out so that legitimate state updates never invalidate
//! a token. This is an integrity check, not a signature: anyone
//! holding the fields can recompute it.
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::provenance::{
    error::ProvenanceError,
    infrastructure::token::{Provenance, Token, TokenKind},
};

/// The fields covered by the digest, borrowed from a token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFields<'a> {
    pub id: &'a str,
    pub kind: TokenKind,
    pub actor: &'a str,
    pub provenance: &'a Provenance,
    pub created_at: &'a DateTime<Utc>,
    pub parent_id: Option<&'a str>,
}

impl<'a> From<&'a Token> for CanonicalFields<'a> {
    fn from(token: &'a Token) -> Self {
        Self {
            id: &token.id,
            kind: token.kind,
            actor: &token.actor,
            provenance: &token.provenance,
            created_at: &token.created_at,
            parent_id: token.parent_id.as_deref(),
        }
    }
}

/// Rebuilds every object with its keys in sorted order.
///
/// `serde_json::Map` only sorts while its `preserve_order` feature is off, and
/// any crate in the build can turn it on.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(entries.into_iter().map(|(key, value)| (key, sort_keys(value))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Computes the lowercase hex SHA-256 digest of the canonical fields.
///
/// Equal fields produce equal digests whatever order their maps were built in.
pub fn digest(fields: &CanonicalFields<'_>) -> Result<String, ProvenanceError> {
    let encoded = serde_json::to_vec(&sort_keys(serde_json::to_value(fields)?))?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

pub fn digest_token(token: &Token) -> Result<String, ProvenanceError> {
    digest(&CanonicalFields::from(token))
}
