//! Participant naming.
//!
//! Participant identifiers (typically DIDs) are opaque to this crate: their
//! parsing and formatting belong to the identity layer. The services only
//! compare them for equality, against the anonymous sentinel or against the
//! intended recipient of a proposal.

/// Actor recorded on tokens created without an explicit actor.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// Trait for services bound to a named store instance.
///
/// The store id labels log lines so output from several stores in the same
/// process can be told apart.
pub trait StoreId {
    fn store_id(&self) -> String;
}

/// Returns true if `actor` identifies a known party, i.e. is not the anonymous sentinel.
pub fn is_identified(actor: &str, anonymous_actor: &str) -> bool {
    actor != anonymous_actor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_naming_identified_actor() {
        assert!(is_identified("did:example:alice", ANONYMOUS_ACTOR));
        assert!(!is_identified(ANONYMOUS_ACTOR, ANONYMOUS_ACTOR));
        assert!(is_identified(ANONYMOUS_ACTOR, "did:anon"));
    }
}
