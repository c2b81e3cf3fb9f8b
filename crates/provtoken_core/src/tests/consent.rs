use tower::Service;

use super::fixtures::Participants;
use crate::provenance::{
    api::{ConsentReply, ConsentRequest},
    config::ProvenanceConfig,
    error::ProvenanceError,
    infrastructure::token::TokenState,
    init_provenance,
};

#[tokio::test]
async fn integration_consent_round_trip() {
    // flowchart LR
    //     P["proposal (alice)"] <-- parent --- A["acceptance (bob)"]
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());
    let participants = Participants::new("alice", "bob");

    let proposal = propose!(stack.consent, participants, "share-x", "reason");
    let response = accept!(stack.consent, proposal.id(), "bob").unwrap();

    assert!(response.accepted);
    assert_state!(stack.store, proposal.id(), TokenState::Accepted);
    assert_state!(stack.store, response.token.id, TokenState::Accepted);

    let ConsentReply::Chain(Some(chain)) = stack
        .consent
        .call(ConsentRequest::GetConsentChain(response.token.id.clone()))
        .await
        .unwrap()
    else {
        panic!("Expected ConsentReply::Chain(Some(_))");
    };
    assert_eq!(chain.origin().map(|token| token.id.as_str()), Some(proposal.id()));
    assert_eq!(chain.current(), Some(&response.token));

    let ConsentReply::Verification(result) = stack
        .consent
        .call(ConsentRequest::VerifyConsent(proposal.id().to_string()))
        .await
        .unwrap()
    else {
        panic!("Expected ConsentReply::Verification");
    };
    assert!(result.valid);
}

#[tokio::test]
async fn integration_consent_wrong_recipient() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());
    let participants = Participants::new("alice", "bob");
    let proposal = propose!(stack.consent, participants, "share-x", "reason");

    let error = accept!(stack.consent, proposal.id(), "carol").unwrap_err();
    assert_eq!(
        error,
        ProvenanceError::RecipientMismatch {
            expected: "bob".to_string(),
            actual: "carol".to_string()
        }
    );
    assert!(error.to_string().contains("acceptor does not match intended recipient"));

    // Nothing was written.
    assert_state!(stack.store, proposal.id(), TokenState::Proposed);
    let ConsentReply::Chain(Some(chain)) = stack
        .consent
        .call(ConsentRequest::GetConsentChain(proposal.id().to_string()))
        .await
        .unwrap()
    else {
        panic!("Expected ConsentReply::Chain(Some(_))");
    };
    assert_eq!(chain.len(), 1);

    // The intended recipient can still accept.
    assert!(accept!(stack.consent, proposal.id(), "bob").unwrap().accepted);
}

#[tokio::test]
async fn integration_consent_reject_path() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());
    let participants = Participants::new("alice", "bob");
    let proposal = propose!(stack.consent, participants, "share-x", "reason");

    let response =
        reject!(stack.consent, proposal.id(), "bob", Some("no thanks".to_string())).unwrap();
    assert!(!response.accepted);
    assert_eq!(response.reason.as_deref(), Some("no thanks"));
    assert_eq!(response.token.parent_id.as_deref(), Some(proposal.id()));
    assert_state!(stack.store, proposal.id(), TokenState::Rejected);
    assert_state!(stack.store, response.token.id, TokenState::Rejected);
}

#[tokio::test]
async fn integration_consent_unknown_proposal() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());
    assert_eq!(
        accept!(stack.consent, "missing", "bob").unwrap_err(),
        ProvenanceError::ProposalNotFound("missing".to_string())
    );
    assert_eq!(
        reject!(stack.consent, "missing", "bob", None).unwrap_err(),
        ProvenanceError::ProposalNotFound("missing".to_string())
    );
}

#[tokio::test]
async fn integration_consent_proposals_are_per_orchestrator() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());
    let participants = Participants::new("alice", "bob");
    let proposal = propose!(stack.consent, participants, "share-x", "reason");

    // A second orchestrator over the same store does not know the proposal.
    let mut other = crate::provenance::services::consent::ConsentService::new(
        stack.store.clone(),
        stack.chain.clone(),
        stack.verifier.clone(),
    );
    assert_eq!(
        accept!(other, proposal.id(), "bob").unwrap_err(),
        ProvenanceError::ProposalNotFound(proposal.id().to_string())
    );

    let ConsentReply::Proposals(listed) =
        stack.consent.call(ConsentRequest::ListProposals(None)).await.unwrap()
    else {
        panic!("Expected ConsentReply::Proposals");
    };
    assert_eq!(listed.len(), 1);
    let ConsentReply::Proposals(listed) =
        other.call(ConsentRequest::ListProposals(None)).await.unwrap()
    else {
        panic!("Expected ConsentReply::Proposals");
    };
    assert!(listed.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_consent_concurrent_decisions() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let stack = init_provenance(&ProvenanceConfig::default());

    for _ in 0..20 {
        let pending =
            stack.consent.request_consent("alice", "bob", "share-x", "reason").await.unwrap();
        let accepting = pending.clone();
        let rejecting = pending.clone();
        let (accepted, rejected) = futures::future::join(
            tokio::spawn(async move { accepting.accept().await }),
            tokio::spawn(async move { rejecting.reject(None).await }),
        )
        .await;
        let (accepted, rejected) = (accepted.unwrap(), rejected.unwrap());

        // Exactly one decision wins, and the proposal reflects it.
        assert!(accepted.is_ok() != rejected.is_ok());
        let mut store = stack.store.clone();
        let expected = if accepted.is_ok() { TokenState::Accepted } else { TokenState::Rejected };
        assert_state!(store, pending.proposal().id(), expected);
        let loser = accepted.err().or(rejected.err());
        assert_eq!(
            loser,
            Some(ProvenanceError::ProposalNotPending(pending.proposal().id().to_string(), expected))
        );
    }
}

#[tokio::test]
async fn integration_consent_request_helper() {
    #[cfg(feature = "provtoken_tracing")]
    crate::provtoken_tracing::init();
    let mut stack = init_provenance(&ProvenanceConfig::default());

    let pending = stack.consent.request_consent("alice", "bob", "share-x", "reason").await.unwrap();
    assert_eq!(pending.proposal().state(), TokenState::Proposed);
    let response = pending.accept().await.unwrap();
    assert!(response.accepted);
    assert_eq!(response.token.actor, "bob");

    let pending = stack.consent.request_consent("alice", "bob", "share-y", "reason").await.unwrap();
    let response = pending.reject(Some("not now".to_string())).await.unwrap();
    assert!(!response.accepted);
    assert_eq!(response.reason.as_deref(), Some("not now"));
    assert_state!(stack.store, pending.proposal().id(), TokenState::Rejected);
}
