use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Creates a mock site serving each `(path, html)` pair.
///
/// Unknown paths get wiremock's default 404.
pub async fn mock_site(pages: &[(&str, &str)]) -> MockServer {
    let server = MockServer::start().await;
    for (url_path, body) in pages {
        Mock::given(method("GET"))
            .and(path(*url_path))
            .respond_with(html(body))
            .mount(&server)
            .await;
    }
    server
}

/// Mounts a page that fails with `status` for the first `failures` requests, then serves `body`.
pub async fn mount_flaky_page(server: &MockServer, url_path: &str, failures: u64, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(failures)
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(html(body))
        .with_priority(2)
        .mount(server)
        .await;
}

/// Creates a mock HTTP server that redirects `from` to `to` on the same server.
pub async fn mount_redirect(server: &MockServer, from: &str, to: &str) {
    Mock::given(method("GET"))
        .and(path(from))
        .respond_with(ResponseTemplate::new(301).insert_header("location", to))
        .mount(server)
        .await;
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("<p>delayed response</p>").set_delay(Duration::from_millis(delay_ms)))
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server whose page body is `size` bytes long.
pub async fn mock_large_page(size: usize) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html(&"a".repeat(size)))
        .mount(&server)
        .await;

    server
}
