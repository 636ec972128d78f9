//! Upload contract tests for the remote review client.
//!
//! Uses wiremock to stand in for the remote review service.

use digestor::remote::PaperMetadata;
use digestor::{RemoteError, RemoteReviewClient, SourceDocument};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn paper() -> SourceDocument {
    SourceDocument::new("attention.pdf", b"%PDF-1.4 fake body".to_vec())
}

#[tokio::test]
async fn successful_upload_is_normalised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/c1/upload"))
        .and(body_string_contains("name=\"files\""))
        .and(body_string_contains("filename=\"attention.pdf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "file_name": "attention.pdf",
                "paper_id": 101,
                "analysis_id": "a-9",
                "metadata": {"author": "Vaswani", "title": "Attention Is All You Need", "year": null},
                "message": "Paper analysed"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemoteReviewClient::new(&server.uri());
    let reviews = client.upload(&paper(), "c1").await.unwrap();

    assert_eq!(reviews.len(), 1);
    let review = &reviews[0];
    assert_eq!(review.file_name, "attention.pdf");
    assert_eq!(review.paper_id, "101");
    assert_eq!(review.analysis_id, "a-9");
    assert_eq!(
        review.metadata,
        Some(PaperMetadata {
            author: Some("Vaswani".into()),
            title: Some("Attention Is All You Need".into()),
            year: None,
        })
    );
    assert_eq!(review.message, "Paper analysed");
}

#[tokio::test]
async fn server_error_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("{\"detail\":\"boom\"}"))
        .mount(&server)
        .await;

    let err = RemoteReviewClient::new(&server.uri())
        .upload(&paper(), "c1")
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Transport { status: 500 }));
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "Upload failed with status 500");
}

#[tokio::test]
async fn non_200_success_is_still_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"results": []})))
        .mount(&server)
        .await;

    let err = RemoteReviewClient::new(&server.uri())
        .upload(&paper(), "c1")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(201));
}

#[tokio::test]
async fn non_json_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = RemoteReviewClient::new(&server.uri())
        .upload(&paper(), "c1")
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::ResponseParse(_)));
    assert_eq!(err.to_string(), "Failed to parse server response");
}

#[tokio::test]
async fn json_missing_results_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let err = RemoteReviewClient::new(&server.uri())
        .upload(&paper(), "c1")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::ResponseParse(_)));
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    // Grab a free port and release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = RemoteReviewClient::new(&uri)
        .upload(&paper(), "c1")
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Network(_)));
    assert!(err.to_string().starts_with("Network error during upload"));
}
