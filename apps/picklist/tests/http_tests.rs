//! Integration tests for the HTTP fetcher.
//!
//! Uses wiremock to mock the backend, plus one end-to-end run against the
//! fixture server on an ephemeral port.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use picklist::dataset::Dataset;
use picklist::error::FetchError;
use picklist::fetcher::{FetcherRegistry, PageFetcher};
use picklist::http::HttpFetcher;
use picklist::server::{ServerState, router};
use picklist_core::{
    Collection, DependencyFilter, FilterValue, PageOutcome, PageRequest, SelectOption,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[tokio::test]
async fn test_fetch_posts_query_and_normalizes_records() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/people-records/page"))
        .and(body_partial_json(json!({
            "search_term": "ada",
            "page": 1,
            "page_size": 2,
            "filters": [{"field": "institution_id", "value": 7}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": 11, "full_name": "Ada Lovelace", "email": "ada@example.org"},
                {"full_name": "No Id"},
                {"id": "12", "full_name": "Ada Yonath"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(mock_server.uri());
    let request = PageRequest::page(Collection::PeopleRecords, "ada", 1, 2).with_filters(vec![
        DependencyFilter::new("institution_id", FilterValue::Number(7)),
    ]);
    let records = fetcher.fetch_records(&request).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "11");
    assert_eq!(records[0].name, "Ada Lovelace");
    assert_eq!(records[0].field("email"), Some("ada@example.org"));
    assert_eq!(records[1].id, "12");
}

#[tokio::test]
async fn test_api_key_is_sent_as_bearer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/institutions/page"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(mock_server.uri()).with_api_key("s3cret");
    let records = fetcher
        .fetch_records(&PageRequest::page(Collection::Institutions, "", 0, 10))
        .await
        .unwrap();
    assert!(records.is_empty());
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn test_server_error_is_status_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/locations/page"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(mock_server.uri());
    let result = fetcher
        .fetch_records(&PageRequest::page(Collection::Locations, "", 0, 10))
        .await;
    assert!(matches!(result, Err(FetchError::Status(500))));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/locations/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(mock_server.uri());
    let result = fetcher
        .fetch_records(&PageRequest::page(Collection::Locations, "", 0, 10))
        .await;
    assert!(matches!(result, Err(FetchError::Decode(_))));
}

#[tokio::test]
async fn test_registry_degrades_failures_to_failed_outcome() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let mut registry = FetcherRegistry::new();
    registry.register_all(Arc::new(HttpFetcher::new(mock_server.uri())));
    let outcome = registry
        .fetch(&PageRequest::page(Collection::Institutions, "", 0, 10))
        .await;
    assert!(outcome.is_failure());
    assert!(outcome.into_page().data.is_empty());
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn test_fetcher_against_fixture_server() {
    let dataset = Dataset::new().with(
        Collection::AcademicTerms,
        (1..=12)
            .map(|i| {
                SelectOption::new(i.to_string(), format!("Term {}", i))
                    .with_field("label", format!("Term {}", i))
            })
            .collect(),
    );
    let state = ServerState::new(Arc::new(dataset), Some("key".into()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    let fetcher = HttpFetcher::new(format!("http://{}", addr)).with_api_key("key");
    assert_eq!(fetcher.health().await.unwrap().status, "ok");

    let registry =
        FetcherRegistry::new().with(Collection::AcademicTerms, Arc::new(fetcher));

    let first = registry
        .fetch(&PageRequest::page(Collection::AcademicTerms, "", 0, 10))
        .await;
    let PageOutcome::Page(first) = first else {
        panic!("expected a page, got {:?}", first);
    };
    assert_eq!(first.count, 10);
    assert!(first.has_more);

    let second = registry
        .fetch(&PageRequest::page(Collection::AcademicTerms, "", 1, 10))
        .await
        .into_page();
    assert_eq!(second.count, 2);
    assert!(!second.has_more);
    assert_eq!(second.data[0].name, "Term 11");
}
