//! Configuration shared by the provenance services.
use serde::Deserialize;

use crate::provenance::infrastructure::naming::ANONYMOUS_ACTOR;

/// Settings for a provenance service stack.
///
/// Passed to [`crate::provenance::init_provenance`], which hands the relevant
/// fields to each service it builds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvenanceConfig {
    /// Label for this store instance, used as a log prefix.
    pub store_id: String,
    /// Actor recorded on tokens created without one. Tokens carrying this
    /// actor are never counted as coming from a trusted actor.
    pub anonymous_actor: String,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self { store_id: String::new(), anonymous_actor: ANONYMOUS_ACTOR.to_string() }
    }
}

impl ProvenanceConfig {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self { store_id: store_id.into(), ..Self::default() }
    }

    pub fn with_anonymous_actor(self, anonymous_actor: impl Into<String>) -> Self {
        Self { anonymous_actor: anonymous_actor.into(), ..self }
    }
}
