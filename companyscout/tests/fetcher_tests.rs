mod common;

use std::time::Duration;

use companyscout::config::{BackoffStrategy, RetryConfig};
use companyscout::fetcher::{FetchFailure, HttpTransport, PageFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use common::scripted::{Reply, ScriptedTransport};
use common::wiremock_helpers::{
    mock_error_server, mock_large_page, mock_site, mock_timeout_server, mount_flaky_page, mount_redirect,
};
use common::{fast_retry, http_config};

const URL: &str = "https://acme.test/";

fn retry(max_retries: u32, strategy: BackoffStrategy) -> RetryConfig {
    RetryConfig {
        max_retries,
        backoff_strategy: strategy,
        backoff_base_delay_ms: 1000,
        backoff_max_delay_ms: 30_000,
        retryable_statuses: vec![408, 429, 500, 502, 503, 504],
    }
}

// ============ Retry behaviour (scripted transport, paused clock) ============

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_success_takes_three_attempts() {
    let transport = ScriptedTransport::new().on(
        URL,
        vec![Reply::Status(503), Reply::Timeout, Reply::Page("<p>ok</p>".into())],
    );
    let fetcher = PageFetcher::new(transport, retry(3, BackoffStrategy::Exponential));

    let page = fetcher.fetch(URL).await.unwrap();

    assert_eq!(page.body, "<p>ok</p>");
    assert_eq!(page.status, 200);
    assert_eq!(fetcher.transport().request_count(URL), 3);
}

#[tokio::test(start_paused = true)]
async fn test_all_attempts_failing_gives_max_retries_exceeded() {
    let transport = ScriptedTransport::new().on(URL, vec![Reply::Refused]);
    let fetcher = PageFetcher::new(transport, retry(3, BackoffStrategy::Exponential));

    let err = fetcher.fetch(URL).await.unwrap_err();

    match err {
        FetchFailure::MaxRetriesExceeded { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchFailure::NetworkError(_)));
        }
        other => panic!("expected MaxRetriesExceeded, got {:?}", other),
    }
    assert_eq!(fetcher.transport().request_count(URL), 3);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_strictly_increase() {
    let transport = ScriptedTransport::new().on(URL, vec![Reply::Status(502)]);
    let fetcher = PageFetcher::new(transport, retry(4, BackoffStrategy::Exponential));

    let err = fetcher.fetch(URL).await.unwrap_err();
    assert_eq!(err.code(), "MAX_RETRIES_EXCEEDED");

    let gaps = fetcher.transport().gaps();
    assert_eq!(
        gaps,
        vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert!(gaps.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_linear_backoff_delays() {
    let transport = ScriptedTransport::new().on(URL, vec![Reply::Timeout]);
    let fetcher = PageFetcher::new(transport, retry(3, BackoffStrategy::Linear));

    let err = fetcher.fetch(URL).await.unwrap_err();
    assert!(matches!(
        err,
        FetchFailure::MaxRetriesExceeded { ref last, .. } if **last == FetchFailure::Timeout
    ));
    assert_eq!(
        fetcher.transport().gaps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_status_fails_after_one_attempt() {
    let transport = ScriptedTransport::new().on(URL, vec![Reply::Status(404)]);
    let fetcher = PageFetcher::new(transport, retry(3, BackoffStrategy::Exponential));

    let err = fetcher.fetch(URL).await.unwrap_err();

    assert_eq!(err, FetchFailure::HttpError { status: 404 });
    assert_eq!(fetcher.transport().request_count(URL), 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_ceiling_never_sleeps() {
    let transport = ScriptedTransport::new().on(URL, vec![Reply::Status(500)]);
    let fetcher = PageFetcher::new(transport, retry(1, BackoffStrategy::Exponential));

    let started = tokio::time::Instant::now();
    let err = fetcher.fetch(URL).await.unwrap_err();

    assert!(matches!(err, FetchFailure::MaxRetriesExceeded { attempts: 1, .. }));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

// ============ Real HTTP (wiremock) ============

#[tokio::test]
async fn test_http_fetch_serves_page() {
    let server = mock_site(&[("/", "<title>Acme</title>")]).await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    let page = fetcher.fetch(&server.uri()).await.unwrap();

    assert_eq!(page.status, 200);
    assert!(page.body.contains("<title>Acme</title>"));
}

#[tokio::test]
async fn test_http_503_is_retried_until_ceiling() {
    let server = mock_error_server(503).await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    let err = fetcher.fetch(&format!("{}/home", server.uri())).await.unwrap_err();

    assert_eq!(
        err,
        FetchFailure::MaxRetriesExceeded {
            attempts: 3,
            last: Box::new(FetchFailure::HttpError { status: 503 }),
        }
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_http_404_is_not_retried() {
    let server = mock_error_server(404).await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    let err = fetcher.fetch(&format!("{}/missing", server.uri())).await.unwrap_err();

    assert_eq!(err, FetchFailure::HttpError { status: 404 });
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_http_flaky_page_recovers() {
    let server = mock_site(&[]).await;
    mount_flaky_page(&server, "/about", 2, 502, "<p>Founded in 1987.</p>").await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    let page = fetcher.fetch(&format!("{}/about", server.uri())).await.unwrap();

    assert!(page.body.contains("1987"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_http_redirect_reports_effective_url() {
    let server = mock_site(&[("/en/home", "<p>Welcome</p>")]).await;
    mount_redirect(&server, "/", "/en/home").await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    let page = fetcher.fetch(&server.uri()).await.unwrap();

    assert_eq!(page.url.path(), "/en/home");
    assert!(page.body.contains("Welcome"));
}

#[tokio::test]
async fn test_http_timeout_is_transient() {
    let server = mock_timeout_server(2_500).await;
    let mut retry = fast_retry();
    retry.max_retries = 1;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(1)).unwrap(), retry);

    let err = fetcher.fetch(&server.uri()).await.unwrap_err();

    match err {
        FetchFailure::MaxRetriesExceeded { attempts, last } => {
            assert_eq!(attempts, 1);
            assert_eq!(*last, FetchFailure::Timeout);
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_oversized_body_is_rejected_without_retry() {
    let server = mock_large_page(200 * 1024).await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    let err = fetcher.fetch(&server.uri()).await.unwrap_err();

    assert!(matches!(err, FetchFailure::NetworkError(ref msg) if msg.contains("exceeds")));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_http_sends_configured_user_agent() {
    let server = mock_site(&[]).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(wiremock::matchers::header("user-agent", "companyscout-tests/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    assert!(fetcher.fetch(&server.uri()).await.is_ok());
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop a listener so nothing is accepting on the port
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut retry = fast_retry();
    retry.max_retries = 2;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(2)).unwrap(), retry);

    let err = fetcher.fetch(&format!("http://127.0.0.1:{}/", port)).await.unwrap_err();

    assert!(matches!(
        err,
        FetchFailure::MaxRetriesExceeded { attempts: 2, ref last } if matches!(**last, FetchFailure::NetworkError(_))
    ));
}

#[tokio::test]
async fn test_http_body_decoded_with_declared_charset() {
    let server = mock_site(&[]).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"<p>Caf\xe9 Zo\xeb, est. 1987</p>".to_vec(), "text/html; charset=windows-1252"),
        )
        .mount(&server)
        .await;
    let fetcher = PageFetcher::new(HttpTransport::new(&http_config(5)).unwrap(), fast_retry());

    let page = fetcher.fetch(&server.uri()).await.unwrap();

    assert_eq!(page.body, "<p>Café Zoë, est. 1987</p>");
}
