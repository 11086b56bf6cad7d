//! Integration tests for the page loader
//!
//! These tests use wiremock to stand up a mock teletext server and drive
//! the HTTP fetcher and the loader end-to-end.

use std::time::Duration;
use teletekst::config::{Config, FetchConfig};
use teletekst::decoder::{COLS, GRID_SIZE};
use teletekst::loader::{FetchError, HttpFetcher, LoadPriority, PageFetcher, PageLoader};
use teletekst::page::PageId;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a page with the given header lines and first body row
fn teletext_page(header: &str, first_row: &str) -> Vec<u8> {
    let mut bytes = format!("{}<pre>", header).into_bytes();
    let text = &first_row.as_bytes()[..first_row.len().min(COLS)];
    let mut grid = vec![b' '; GRID_SIZE];
    grid[..text.len()].copy_from_slice(text);
    bytes.extend(grid);
    bytes
}

fn create_test_config(server: &MockServer) -> Config {
    Config {
        fetch: FetchConfig {
            base_url: format!("{}/page/", server.uri()),
            user_agent: "TeletekstTest/1.0".to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 2,
        },
        ..Config::default()
    }
}

fn create_loader(server: &MockServer) -> PageLoader<HttpFetcher> {
    let config = create_test_config(server);
    let fetcher = HttpFetcher::new(&config.fetch).expect("Failed to build fetcher");
    PageLoader::new(&config, fetcher).expect("Failed to create loader")
}

async fn mount_page(server: &MockServer, id: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/page/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn test_http_fetcher_returns_body() {
    let mock_server = MockServer::start().await;
    let body = teletext_page("pn=n_102\n", "");
    mount_page(&mock_server, "101-0", body.clone()).await;

    let fetcher = HttpFetcher::new(&create_test_config(&mock_server).fetch)
        .expect("Failed to build fetcher");
    let bytes = fetcher
        .fetch(&PageId::normalize("101"))
        .await
        .expect("Fetch failed");

    assert_eq!(bytes, body);
}

#[tokio::test]
async fn test_http_fetcher_maps_status_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page/404-0"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(&create_test_config(&mock_server).fetch)
        .expect("Failed to build fetcher");
    let result = fetcher.fetch(&PageId::normalize("404")).await;

    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_http_fetcher_rejects_empty_body() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "102-0", Vec::new()).await;

    let fetcher = HttpFetcher::new(&create_test_config(&mock_server).fetch)
        .expect("Failed to build fetcher");
    let result = fetcher.fetch(&PageId::normalize("102")).await;

    assert!(matches!(result, Err(FetchError::Empty { .. })));
}

#[tokio::test]
async fn test_load_with_preload_cascade() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "101-0",
        teletext_page(
            "pn=p_100\npn=n_102\nftl=200\n",
            " Nieuws 104 Sport 601 Weer 703",
        ),
    )
    .await;
    for id in ["100-0", "102-0", "200-0", "104-0", "601-0", "703-0"] {
        mount_page(&mock_server, id, teletext_page("", "")).await;
    }

    let loader = create_loader(&mock_server);

    let page = loader
        .load_async("101", LoadPriority::High)
        .await
        .expect("Page not loaded");

    assert_eq!(page.page_id().as_str(), "101-0");
    assert!(page.html_data().contains(r#"<a href="http://foo.bar/#104-0">104</a>"#));
    assert_eq!(
        page.linked_page_ids(),
        &[
            PageId::normalize("104"),
            PageId::normalize("601"),
            PageId::normalize("703")
        ]
    );

    // Wait for the background preloads to drain
    for _ in 0..200 {
        if requested_paths(&mock_server).await.len() >= 7 && loader.queue_len() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        requested_paths(&mock_server).await,
        vec![
            "/page/101-0",
            "/page/102-0",
            "/page/100-0",
            "/page/200-0",
            "/page/104-0",
            "/page/601-0",
            "/page/703-0",
        ]
    );
    for id in ["100", "102", "200", "104", "601", "703"] {
        assert!(loader.cached(id).is_some(), "{} not cached", id);
    }

    // A second foreground load is served from cache without network traffic
    let again = loader.load_async("101-0", LoadPriority::High).await;
    assert!(again.is_some());
    assert_eq!(requested_paths(&mock_server).await.len(), 7);
    assert_eq!(loader.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_missing_page_delivers_none() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let loader = create_loader(&mock_server);

    let page = loader.load_async("999", LoadPriority::High).await;

    assert!(page.is_none());
    assert!(loader.cached("999").is_none());
    assert_eq!(loader.stats().fetch_failures, 1);
}

#[tokio::test]
async fn test_undecodable_page_delivers_none() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "300-0", b"pn=n_301\nno body marker".to_vec()).await;

    let loader = create_loader(&mock_server);

    assert!(loader.load_async("300", LoadPriority::High).await.is_none());
    assert_eq!(loader.stats().decode_failures, 1);

    // Nothing was decoded, so nothing is preloaded
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(requested_paths(&mock_server).await, vec!["/page/300-0"]);
}
