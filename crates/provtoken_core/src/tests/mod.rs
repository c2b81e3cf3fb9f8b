
mod consent;

use fixtures::{Participants, action_draft};
use tower::Service;

use crate::provenance::{
    api::{ChainEnd, StoreRequest, StoreResponse},
    config::ProvenanceConfig,
    infrastructure::token::{TokenFilter, TokenKind, TokenState},
    init_provenance,
};

#[tokio::test]
async fn integration_init_provenance_shares_store() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::new("node-1"));

    let root = create!(stack.store, action_draft("did:example:alice", "root", None));
    let child =
        create!(stack.store, action_draft("did:example:bob", "child", Some(root.id.as_str())));

    let chain = chain!(stack.chain, child.id).unwrap();
    assert_eq!(chain.len(), 2);
    assert!(verify!(stack.verifier, child.id.clone()).valid);

    let participants = Participants::new("did:example:alice", "did:example:bob");
    let proposal = propose!(stack.consent, participants, "share-x", "reason");
    assert_state!(stack.store, proposal.id(), TokenState::Proposed);
}

#[tokio::test]
async fn integration_chain_three_generations() {
    // A <- B <- C
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());

    let a = create!(stack.store, action_draft("alice", "a", None));
    let b = create!(stack.store, action_draft("alice", "b", Some(a.id.as_str())));
    let c = create!(stack.store, action_draft("alice", "c", Some(b.id.as_str())));

    let chain = chain!(stack.chain, c.id).unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.origin(), Some(&a));
    assert_eq!(chain.current(), Some(&c));
    assert_eq!(chain.tokens, vec![a, b, c]);
    assert_eq!(chain.end, ChainEnd::Root);

    assert_eq!(chain!(stack.chain, "missing"), None);
}

#[tokio::test]
async fn integration_export_import_between_stores() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut source = init_provenance(&ProvenanceConfig::new("source"));
    let mut target = init_provenance(&ProvenanceConfig::new("target"));

    let participants = Participants::new("alice", "bob");
    let proposal = propose!(source.consent, participants, "share-x", "reason");
    let response = accept!(source.consent, proposal.id(), "bob").unwrap();

    let StoreResponse::Export(blob) = source.store.call(StoreRequest::Export).await.unwrap() else {
        panic!("Expected StoreResponse::Export");
    };
    assert_eq!(
        target.store.call(StoreRequest::Import(blob)).await.unwrap(),
        StoreResponse::Imported(2)
    );

    // Restored tokens keep their digests, state and lineage.
    assert_state!(target.store, proposal.id(), TokenState::Accepted);
    let result = verify!(target.verifier, response.token.id.clone());
    assert!(result.valid);
    assert_eq!(result.trust_score, 1.0);
    assert_eq!(chain!(target.chain, response.token.id).unwrap().len(), 2);
}

#[tokio::test]
async fn integration_list_by_kind_and_state() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());
    create!(stack.store, action_draft("alice", "one", None));
    create!(stack.store, action_draft("bob", "two", None));
    let participants = Participants::new("alice", "bob");
    let proposal = propose!(stack.consent, participants, "share-x", "reason");
    reject!(stack.consent, proposal.id(), "bob", None).unwrap();

    let StoreResponse::Tokens(consent_tokens) = stack
        .store
        .call(StoreRequest::List(
            TokenFilter::default()
                .with_kind(TokenKind::BilateralConsent)
                .with_state(TokenState::Rejected),
        ))
        .await
        .unwrap()
    else {
        panic!("Expected StoreResponse::Tokens");
    };
    assert_eq!(consent_tokens.len(), 2);

    let StoreResponse::Tokens(alice_tokens) = stack
        .store
        .call(StoreRequest::List(TokenFilter::default().with_actor("alice")))
        .await
        .unwrap()
    else {
        panic!("Expected StoreResponse::Tokens");
    };
    assert_eq!(alice_tokens.len(), 2);
}
