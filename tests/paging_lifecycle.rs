//! Integration tests for the paging lifecycle: refresh, append, end-of-list,
//! failure handling, and per-list independence.
//!
//! Each test runs a real `CatalogClient` against a wiremock server and an
//! in-memory SQLite store, exercising the refresh/append protocol end-to-end.

use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marquee::catalog::CatalogClient;
use marquee::session::{Intent, LoadPhase, MessageKey, Pager};
use marquee::store::{ListKey, Store};

fn page_body(page: i64, total_pages: i64, titles: &[(i64, &str)]) -> String {
    let results: Vec<String> = titles
        .iter()
        .map(|(id, name)| {
            format!(
                r#"{{"id": {}, "title": "{}", "vote_average": 7.0, "popularity": 1.0}}"#,
                id, name
            )
        })
        .collect();
    format!(
        r#"{{"page": {}, "total_pages": {}, "results": [{}]}}"#,
        page,
        total_pages,
        results.join(", ")
    )
}

async fn test_pager(server: &MockServer) -> Pager<CatalogClient> {
    let store = Store::open(":memory:").await.unwrap();
    let client = CatalogClient::new(
        reqwest::Client::new(),
        Url::parse(&format!("{}/", server.uri())).unwrap(),
        None,
    );
    Pager::new(store, client)
}

/// Pager whose remote points at nothing: every fetch is a connect failure.
async fn offline_pager(store: Store) -> Pager<CatalogClient> {
    let client = CatalogClient::new(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:1/").unwrap(),
        None,
    );
    Pager::new(store, client)
}

async fn cached_ids(pager: &Pager<CatalogClient>, list: &ListKey) -> Vec<i64> {
    pager
        .store()
        .cached_titles(list, 100, 0)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect()
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_caches_exactly_page_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page_body(1, 2, &[(1, "A"), (2, "B"), (3, "C")])),
        )
        .mount(&server)
        .await;

    let pager = test_pager(&server).await;
    let list = ListKey::Upcoming;

    let state = pager.refresh(&list).await.unwrap();
    assert_eq!(state.phase, LoadPhase::Loaded { end_reached: false });
    assert_eq!(cached_ids(&pager, &list).await, vec![1, 2, 3]);

    // The boundary item's cursor has no previous page after a refresh.
    let boundary = pager.store().last_cached(&list).await.unwrap().unwrap();
    let key = pager
        .store()
        .remote_key(&list, boundary.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(key.prev_page, None);
    assert_eq!(key.next_page, Some(2));
}

// ============================================================================
// Append
// ============================================================================

#[tokio::test]
async fn test_append_then_end_of_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page_body(1, 2, &[(1, "A"), (2, "B"), (3, "C")])),
        )
        .mount(&server)
        .await;
    // Page 2 must be requested exactly once: the post-end append issues no fetch.
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(2, 2, &[(4, "D"), (5, "E")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let pager = test_pager(&server).await;
    let list = ListKey::Upcoming;

    pager.refresh(&list).await.unwrap();
    let state = pager.load_more(&list).await.unwrap();
    assert_eq!(state.phase, LoadPhase::Loaded { end_reached: true });
    assert_eq!(cached_ids(&pager, &list).await, vec![1, 2, 3, 4, 5]);

    // Appending past the last page is a no-op: state unchanged, no request.
    let state = pager.load_more(&list).await.unwrap();
    assert_eq!(state.cached_count, 5);
    assert!(state.phase.end_reached());
    assert_eq!(cached_ids(&pager, &list).await, vec![1, 2, 3, 4, 5]);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_offline_refresh_keeps_cache_and_flags_offline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page_body(1, 1, &[(1, "A"), (2, "B"), (3, "C")])),
        )
        .mount(&server)
        .await;

    let pager = test_pager(&server).await;
    let list = ListKey::Upcoming;
    pager.refresh(&list).await.unwrap();

    // Same durable store, but the network is gone.
    let offline = offline_pager(pager.store().clone()).await;
    offline.attach(&list).await.unwrap();
    let state = offline.refresh(&list).await.unwrap();

    let error = state.error.expect("offline refresh should surface an error");
    assert_eq!(error.key, MessageKey::Offline);
    assert!(error.retryable);
    assert!(error.offline_fallback);
    // Previously cached items remain readable; no blanking.
    assert_eq!(cached_ids(&offline, &list).await, vec![1, 2, 3]);
    assert_eq!(state.cached_count, 3);
}

#[tokio::test]
async fn test_failed_append_preserves_cursors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/popular"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(1, 3, &[(1, "A"), (2, "B")])),
        )
        .mount(&server)
        .await;
    // Page 2 is broken on the server side.
    Mock::given(method("GET"))
        .and(path("/movie/popular"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pager = test_pager(&server).await;
    let list = ListKey::Popular;
    pager.refresh(&list).await.unwrap();

    let state = pager.load_more(&list).await.unwrap();
    assert!(state.error.is_some());

    // Cursor table untouched: the boundary cursor still points at page 2.
    let key = pager.store().remote_key(&list, 2).await.unwrap().unwrap();
    assert_eq!(key.next_page, Some(2));
    assert_eq!(cached_ids(&pager, &list).await, vec![1, 2]);
}

#[tokio::test]
async fn test_retry_intent_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    // First request fails with a client error (no internal retries), then the
    // endpoint starts working.
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body(1, 1, &[(1, "A")])))
        .mount(&server)
        .await;

    let pager = test_pager(&server).await;
    let list = ListKey::Upcoming;

    let state = pager.handle(&list, Intent::Refresh).await.unwrap();
    assert!(state.error.is_some());
    assert!(!state.is_retry);

    let state = pager.handle(&list, Intent::Retry).await.unwrap();
    assert!(state.is_retry);
    assert!(state.error.is_none());
    assert_eq!(state.cached_count, 1);
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_change_query_caches_search_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .and(query_param("query", "solaris"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body(1, 1, &[(7, "Solaris")])))
        .mount(&server)
        .await;

    let pager = test_pager(&server).await;
    let state = pager
        .handle(&ListKey::Upcoming, Intent::ChangeQuery("solaris".to_string()))
        .await
        .unwrap();

    assert_eq!(state.list, ListKey::Search("solaris".to_string()));
    assert_eq!(state.cached_count, 1);
    assert!(state.phase.end_reached());
    // The fixed lists are untouched by the search session.
    assert_eq!(
        pager
            .store()
            .cached_count(&ListKey::Upcoming)
            .await
            .unwrap(),
        0
    );
}

// ============================================================================
// Per-List Independence
// ============================================================================

#[tokio::test]
async fn test_concurrent_refreshes_do_not_interleave() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page_body(1, 1, &[(1, "A"), (2, "B"), (3, "C")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/top_rated"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(1, 1, &[(10, "X"), (11, "Y")])),
        )
        .mount(&server)
        .await;

    let pager = test_pager(&server).await;
    let upcoming = ListKey::Upcoming;
    let top_rated = ListKey::TopRated;

    let (a, b) = tokio::join!(pager.refresh(&upcoming), pager.refresh(&top_rated));
    let a = a.unwrap();
    let b = b.unwrap();

    // Each list's state matches its own fetch result; neither clear+insert
    // bled into the other's partition.
    assert_eq!(a.cached_count, 3);
    assert_eq!(b.cached_count, 2);
    assert_eq!(cached_ids(&pager, &upcoming).await, vec![1, 2, 3]);
    assert_eq!(cached_ids(&pager, &top_rated).await, vec![10, 11]);
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn test_session_resumes_after_reopen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(1, 2, &[(1, "A"), (2, "B")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/upcoming"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body(2, 2, &[(3, "C")])))
        .mount(&server)
        .await;

    let dir = std::env::temp_dir().join("marquee_test_resume");
    std::fs::create_dir_all(&dir).unwrap();
    let db_path = dir.join("catalog.db");
    std::fs::remove_file(&db_path).ok();
    let db_path_str = db_path.to_str().unwrap();

    let list = ListKey::Upcoming;
    {
        let store = Store::open(db_path_str).await.unwrap();
        let client = CatalogClient::new(
            reqwest::Client::new(),
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            None,
        );
        let pager = Pager::new(store, client);
        pager.refresh(&list).await.unwrap();
        // Process "dies" here with page 1 cached and a cursor to page 2.
    }

    let store = Store::open(db_path_str).await.unwrap();
    let client = CatalogClient::new(
        reqwest::Client::new(),
        Url::parse(&format!("{}/", server.uri())).unwrap(),
        None,
    );
    let pager = Pager::new(store, client);

    let state = pager.attach(&list).await.unwrap();
    assert_eq!(state.cached_count, 2);
    assert!(!state.phase.end_reached());

    // Resumes from the stored cursor without refetching page 1.
    let state = pager.load_more(&list).await.unwrap();
    assert!(state.phase.end_reached());
    assert_eq!(cached_ids(&pager, &list).await, vec![1, 2, 3]);

    std::fs::remove_dir_all(&dir).ok();
}
