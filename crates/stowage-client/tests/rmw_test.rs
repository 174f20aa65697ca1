//! Read-modify-write protocol tests: commit, replay under contention,
//! unconditional create, attempt exhaustion, and scratch-file cleanup.

mod support;

use std::cell::Cell;
use std::cell::RefCell;
use std::path::PathBuf;

use stowage_cache::GenerationCache;
use stowage_client::{BackoffPolicy, ClientError};
use support::Harness;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, Request, ResponseTemplate};

/// Matches requests that carry no `If-Match` precondition.
struct NoIfMatch;

impl wiremock::Match for NoIfMatch {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("if-match")
    }
}

#[test]
fn modify_existing_object_commits_the_new_generation() {
    let harness = Harness::start();
    let location = harness.location("/clients/C1");
    let url = harness.url("/clients/C1");

    harness.mount(
        Mock::given(method("GET"))
            .and(path("/clients/C1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"gen-1\"")
                    .set_body_bytes(b"count=1".to_vec()),
            )
            .expect(1),
    );
    harness.mount(
        Mock::given(method("PUT"))
            .and(path("/clients/C1"))
            .and(header("if-match", "gen-1"))
            .and(wiremock::matchers::body_bytes(b"count=2".to_vec()))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"gen-2\""))
            .expect(1),
    );

    let status = location
        .read_modify_write_with(&BackoffPolicy::immediate(), |data| {
            assert_eq!(data, b"count=1");
            Ok(b"count=2".to_vec())
        })
        .unwrap();
    assert!(status.is_success());

    assert_eq!(harness.cache.generation(&url).as_deref(), Some("gen-2"));
    let committed = harness.cache.local_file(&url, "gen-2").unwrap();
    assert_eq!(std::fs::read(committed).unwrap(), b"count=2");
}

#[test]
fn missing_object_is_created_without_a_precondition() {
    let harness = Harness::start();
    let location = harness.location("/clients/C1");
    let url = harness.url("/clients/C1");

    harness.mount(
        Mock::given(method("GET"))
            .and(path("/clients/C1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1),
    );
    harness.mount(
        Mock::given(method("PUT"))
            .and(path("/clients/C1"))
            .and(NoIfMatch)
            .respond_with(ResponseTemplate::new(201).insert_header("ETag", "\"gen-1\""))
            .expect(1),
    );

    let status = location
        .read_modify_write_with(&BackoffPolicy::immediate(), |data| {
            assert!(data.is_empty(), "scratch content starts empty");
            Ok(b"fresh".to_vec())
        })
        .unwrap();
    assert!(status.is_success());

    assert_eq!(harness.cache.generation(&url).as_deref(), Some("gen-1"));
    let committed = harness.cache.local_file(&url, "gen-1").unwrap();
    assert_eq!(std::fs::read(committed).unwrap(), b"fresh");
}

#[test]
fn lost_race_replays_the_transformation_on_fresh_content() {
    let harness = Harness::start();
    let location = harness.location("/clients/C1");
    let url = harness.url("/clients/C1");

    // First round observes gen-1; the upload loses to a competing writer.
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/clients/C1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"gen-1\"")
                    .set_body_bytes(b"base".to_vec()),
            )
            .up_to_n_times(1)
            .expect(1),
    );
    harness.mount(
        Mock::given(method("PUT"))
            .and(path("/clients/C1"))
            .and(header("if-match", "gen-1"))
            .respond_with(ResponseTemplate::new(412))
            .expect(1),
    );
    // Second round re-reads the competitor's content and wins.
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/clients/C1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"gen-2\"")
                    .set_body_bytes(b"competitor".to_vec()),
            )
            .expect(1),
    );
    harness.mount(
        Mock::given(method("PUT"))
            .and(path("/clients/C1"))
            .and(header("if-match", "gen-2"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"gen-3\""))
            .expect(1),
    );

    let replays = Cell::new(0u32);
    let status = location
        .read_modify_write_with(&BackoffPolicy::immediate(), |data| {
            replays.set(replays.get() + 1);
            Ok([data, b"+me".as_slice()].concat())
        })
        .unwrap();
    assert!(status.is_success());
    assert_eq!(replays.get(), 2, "callback must replay once per attempt");

    assert_eq!(harness.cache.generation(&url).as_deref(), Some("gen-3"));
    let committed = harness.cache.local_file(&url, "gen-3").unwrap();
    assert_eq!(std::fs::read(committed).unwrap(), b"competitor+me");
}

#[test]
fn exhausted_attempts_surface_a_conflict() {
    let harness = Harness::start();
    let location = harness.location("/clients/C1");

    harness.mount(
        Mock::given(method("GET"))
            .and(path("/clients/C1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(5),
    );
    harness.mount(
        Mock::given(method("PUT"))
            .and(path("/clients/C1"))
            .respond_with(ResponseTemplate::new(412))
            .expect(5),
    );

    let attempts = Cell::new(0u32);
    let err = location
        .read_modify_write_with(&BackoffPolicy::immediate(), |_| {
            attempts.set(attempts.get() + 1);
            Ok(b"doomed".to_vec())
        })
        .unwrap_err();

    match err {
        ClientError::Conflict { attempts: budget, .. } => assert_eq!(budget, 5),
        other => panic!("expected Conflict, got: {other:?}"),
    }
    assert_eq!(attempts.get(), 5, "one transformation per attempt");
}

#[test]
fn callback_failure_removes_the_scratch_file() {
    let harness = Harness::start();
    let location = harness.location("/clients/C1");

    harness.mount(
        Mock::given(method("GET"))
            .and(path("/clients/C1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1),
    );

    let seen_path: RefCell<Option<PathBuf>> = RefCell::new(None);
    let err = location
        .read_modify_write_local_with(&BackoffPolicy::immediate(), |scratch| {
            *seen_path.borrow_mut() = Some(scratch.to_path_buf());
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "transformation rejected the content",
            )))
        })
        .unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));

    let scratch = seen_path.borrow().clone().expect("callback must have run");
    assert!(
        !scratch.exists(),
        "scratch file must be removed on the error path"
    );
}

#[test]
fn failed_upload_never_advances_the_cached_generation() {
    let harness = Harness::start();
    let location = harness.location("/clients/C1");
    let url = harness.url("/clients/C1");

    harness.mount(
        Mock::given(method("GET"))
            .and(path("/clients/C1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"gen-1\"")
                    .set_body_bytes(b"base".to_vec()),
            )
            .expect(1),
    );
    harness.mount(
        Mock::given(method("PUT"))
            .and(path("/clients/C1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .expect(1),
    );

    let err = location
        .read_modify_write_with(&BackoffPolicy::immediate(), |data| {
            Ok([data, b"+edit".as_slice()].concat())
        })
        .unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 500, .. }));

    assert_eq!(
        harness.cache.generation(&url).as_deref(),
        Some("gen-1"),
        "cache must only ever hold server-confirmed generations"
    );
}
