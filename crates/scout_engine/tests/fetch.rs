use std::sync::Once;
use std::time::Duration;

use scout_engine::{FailureKind, FetchSettings, FileDownloader, PageFetcher, PART_SUFFIX};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(desk_logging::initialize_for_tests);
}

#[tokio::test]
async fn page_fetcher_returns_html_bytes() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(FetchSettings::default());
    let url = Url::parse(&format!("{}/doc", server.uri())).unwrap();

    let page = fetcher.fetch_page(&url).await.expect("fetch ok");
    assert_eq!(page.bytes, b"<html>ok</html>");
    assert!(page.content_type.unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn page_fetcher_fails_on_http_status() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(FetchSettings::default());
    let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
    let err = fetcher.fetch_page(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn page_fetcher_rejects_non_page_content() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-", "application/pdf"))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(FetchSettings::default());
    let url = Url::parse(&format!("{}/blob", server.uri())).unwrap();
    let err = fetcher.fetch_page(&url).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "application/pdf".to_string()
        }
    );
}

#[tokio::test]
async fn page_fetcher_times_out_on_slow_response() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = PageFetcher::new(settings);
    let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();
    let err = fetcher.fetch_page(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn downloader_writes_the_final_file_without_partial_leftovers() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/paper.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.7", "application/pdf"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let downloader = FileDownloader::new(FetchSettings::default());
    let url = Url::parse(&format!("{}/files/paper.pdf", server.uri())).unwrap();

    let written = downloader
        .download(&url, dir.path(), "paper.pdf")
        .await
        .expect("download ok");

    assert_eq!(written, dir.path().join("paper.pdf"));
    assert_eq!(std::fs::read(&written).expect("read"), b"%PDF-1.7");
    assert!(!dir.path().join(format!("paper.pdf{PART_SUFFIX}")).exists());
}

#[tokio::test]
async fn downloader_rejects_oversized_documents() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/huge.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("0123456789ab", "application/pdf"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let downloader = FileDownloader::new(settings);
    let url = Url::parse(&format!("{}/files/huge.pdf", server.uri())).unwrap();

    let err = downloader
        .download(&url, dir.path(), "huge.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { .. }));
    // Rejected before any bytes hit the disk: neither artifact exists.
    assert!(!dir.path().join("huge.pdf").exists());
    assert!(!dir.path().join(format!("huge.pdf{PART_SUFFIX}")).exists());
}
