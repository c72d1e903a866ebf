use std::time::Duration;

use importer_engine::{FailureKind, FetchSettings, Fetcher, ReqwestFetcher};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(route: &str, response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn asset_bytes_and_metadata() {
    let server = serve(
        "/logo.png",
        ResponseTemplate::new(200).set_body_raw(b"\x89PNG".to_vec(), "image/png"),
    )
    .await;
    let url = format!("{}/logo.png", server.uri());

    let output = ReqwestFetcher::new(FetchSettings::default())
        .fetch(&url)
        .await
        .unwrap();

    assert_eq!(output.bytes, b"\x89PNG");
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.content_type.as_deref(), Some("image/png"));
    assert_eq!(output.metadata.byte_len, 4);
}

#[tokio::test]
async fn redirects_are_followed_up_to_the_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old.jpg"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new.jpg", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"jpg".to_vec(), "image/jpeg"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/loop", server.uri())),
        )
        .mount(&server)
        .await;
    let fetcher = ReqwestFetcher::new(FetchSettings {
        redirect_limit: 2,
        ..FetchSettings::default()
    });

    let moved = fetcher
        .fetch(&format!("{}/old.jpg", server.uri()))
        .await
        .unwrap();
    assert_eq!(moved.metadata.final_url, format!("{}/new.jpg", server.uri()));
    assert_eq!(moved.bytes, b"jpg");

    let err = fetcher
        .fetch(&format!("{}/loop", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::RedirectLimitExceeded);
}

#[tokio::test]
async fn status_and_url_failures_are_classified() {
    let server = serve("/missing.png", ResponseTemplate::new(404)).await;
    let fetcher = ReqwestFetcher::new(FetchSettings::default());

    let missing = fetcher
        .fetch(&format!("{}/missing.png", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(missing.kind, FailureKind::HttpStatus(404));

    let invalid = fetcher.fetch("cdn.example/no-scheme.png").await.unwrap_err();
    assert_eq!(invalid.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = serve(
        "/slow.mp4",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_millis(250))
            .set_body_string("slow"),
    )
    .await;
    let fetcher = ReqwestFetcher::new(FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    });

    let err = fetcher
        .fetch(&format!("{}/slow.mp4", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let server = serve(
        "/huge.gif",
        ResponseTemplate::new(200).set_body_raw(vec![0u8; 64], "image/gif"),
    )
    .await;
    let fetcher = ReqwestFetcher::new(FetchSettings {
        max_bytes: 16,
        ..FetchSettings::default()
    });

    let err = fetcher
        .fetch(&format!("{}/huge.gif", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 16,
            actual: Some(64)
        }
    );
}

#[tokio::test]
async fn feed_requests_negotiate_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .and(header_regex("accept", r"^application/feed\+json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/feed+json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;
    let fetcher = ReqwestFetcher::new(FetchSettings::for_feeds());

    let feed = fetcher
        .fetch(&format!("{}/feed.json", server.uri()))
        .await
        .unwrap();
    assert_eq!(feed.bytes, b"{}");

    let err = fetcher
        .fetch(&format!("{}/page", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "text/html".to_string()
        }
    );
}
