//! Issuance tests: defaults, prefix anchoring, deterministic serialization,
//! and path resolution for minted locations.

use std::sync::Arc;

use chrono::Utc;
use stowage_cache::FileCache;
use stowage_client::{
    AgentConfig, CapabilityPolicy, ClientError, IssueRequest, Method, StowageClient,
    DEFAULT_EXPIRY_SECS,
};
use stowage_crypto::{Ed25519Signer, Ed25519Verifier};

fn test_client() -> (StowageClient, Ed25519Verifier, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FileCache::new(dir.path().join("cache")).unwrap());
    let signer = Ed25519Signer::from_bytes(&[3u8; 32]);
    let verifier = signer.verifier();
    let config = AgentConfig::new(
        "http://127.0.0.1:9".parse().unwrap(),
        "C1",
        "nonce-1",
    );
    let client = StowageClient::new(config, Arc::new(signer), cache).unwrap();
    (client, verifier, dir)
}

#[test]
fn issue_applies_defaults() {
    let (client, _, _dir) = test_client();
    let before = Utc::now().timestamp();

    let location = client.issue(IssueRequest::new("/clients/C1")).unwrap();
    let policy: CapabilityPolicy = serde_json::from_slice(location.policy()).unwrap();

    assert_eq!(policy.path_prefix, "/clients/C1");
    assert_eq!(policy.path_template, "/");
    assert!(!policy.public);
    let expected: std::collections::BTreeSet<Method> =
        [Method::Get, Method::Put].into_iter().collect();
    assert_eq!(policy.methods, expected);
    assert!(policy.expires >= before + DEFAULT_EXPIRY_SECS);
    assert!(policy.expires <= Utc::now().timestamp() + DEFAULT_EXPIRY_SECS);
}

#[test]
fn issue_forces_absolute_prefix() {
    let (client, _, _dir) = test_client();
    let location = client.issue(IssueRequest::new("clients/C1")).unwrap();
    assert_eq!(location.path_prefix(), "/clients/C1");

    let policy: CapabilityPolicy = serde_json::from_slice(location.policy()).unwrap();
    assert_eq!(policy.path_prefix, "/clients/C1");
}

#[test]
fn issue_rejects_empty_method_set() {
    let (client, _, _dir) = test_client();
    let result = client.issue(IssueRequest::new("/clients/C1").methods(vec![]));
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[test]
fn policy_blob_reserializes_byte_identically() {
    let (client, _, _dir) = test_client();
    let location = client
        .issue(
            IssueRequest::new("/clients/C1")
                .methods(vec![Method::Put, Method::Get])
                .expires_at(1_754_265_600),
        )
        .unwrap();

    let decoded: CapabilityPolicy = serde_json::from_slice(location.policy()).unwrap();
    let reserialized = decoded.to_canonical().unwrap();
    assert_eq!(reserialized.as_bytes(), location.policy());
}

#[test]
fn signature_verifies_over_the_policy_blob() {
    let (client, verifier, _dir) = test_client();
    let location = client.issue(IssueRequest::new("/clients/C1")).unwrap();

    let decoded: CapabilityPolicy = serde_json::from_slice(location.policy()).unwrap();
    let canonical = decoded.to_canonical().unwrap();
    verifier.verify(&canonical, location.signature()).unwrap();
}

#[test]
fn to_path_joins_prefix_and_expanded_template() {
    let (client, _, _dir) = test_client();
    let location = client
        .issue(IssueRequest::new("/clients/C1").template("/collections/{collection}"))
        .unwrap();

    assert_eq!(
        location.to_path(&[("collection", "hunts")]).unwrap(),
        "/clients/C1/collections/hunts"
    );
}

#[test]
fn expand_path_merges_agent_identity() {
    let (client, _, _dir) = test_client();
    let location = client
        .issue(IssueRequest::new("/uploads").template("/{client_id}/{nonce}/logs"))
        .unwrap();

    assert_eq!(location.to_path(&[]).unwrap(), "/uploads/C1/nonce-1/logs");
}

#[test]
fn identity_fields_win_over_caller_parameters() {
    let (client, _, _dir) = test_client();
    let location = client
        .issue(IssueRequest::new("/uploads").template("/{client_id}"))
        .unwrap();

    assert_eq!(
        location.to_path(&[("client_id", "impostor")]).unwrap(),
        "/uploads/C1"
    );
}

#[test]
fn unbound_template_parameter_is_an_error() {
    let (client, _, _dir) = test_client();
    let location = client
        .issue(IssueRequest::new("/uploads").template("/{flow_id}/status"))
        .unwrap();

    match location.to_path(&[]).unwrap_err() {
        ClientError::Template { key, .. } => assert_eq!(key, "flow_id"),
        other => panic!("expected Template error, got: {other:?}"),
    }
}

#[test]
fn canonical_sub_location_freezes_the_expanded_path() {
    let (client, _, _dir) = test_client();
    let location = client
        .issue(IssueRequest::new("/clients/C1").template("/collections/{collection}"))
        .unwrap();

    let sub = location
        .canonical_sub_location(&[("collection", "hunts")])
        .unwrap();
    assert_eq!(sub.path_prefix(), "/clients/C1/collections/hunts");
    assert_eq!(sub.to_path(&[]).unwrap(), "/clients/C1/collections/hunts");
    // The original is untouched.
    assert_eq!(location.path_prefix(), "/clients/C1");
    assert_eq!(sub.policy(), location.policy());
}

#[test]
fn request_parts_are_deterministic() {
    let (client, _, _dir) = test_client();
    let location = client
        .issue(IssueRequest::new("/clients/C1").expires_at(1_754_265_600))
        .unwrap();

    let first = location.request_parts(&[], None).unwrap();
    let second = location.request_parts(&[], None).unwrap();
    assert_eq!(first.url, second.url);
    assert_eq!(first.path, "/clients/C1");
    assert_eq!(first.headers, second.headers);
    assert_eq!(
        first.headers.get("cache-control").unwrap(),
        "private"
    );
    assert!(first.headers.contains_key("x-rekall-policy"));
    assert!(first.headers.contains_key("x-rekall-signature"));
}

#[test]
fn if_modified_since_renders_as_http_date() {
    let (client, _, _dir) = test_client();
    let location = client.issue(IssueRequest::new("/clients/C1")).unwrap();

    let when = chrono::DateTime::from_timestamp(1_754_265_600, 0).unwrap();
    let parts = location.request_parts(&[], Some(when)).unwrap();
    assert_eq!(
        parts.headers.get("if-modified-since").unwrap(),
        "Mon, 04 Aug 2025 00:00:00 GMT"
    );
}
