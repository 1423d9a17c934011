//! Token lifecycle integration tests

use super::*;
use kpi_analytics_integration::{
    AnalyticsClient, AnalyticsError, AuthError, FileTokenStorage, HistQuery, Token, TokenManager,
    TokenStorage,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header};

#[tokio::test]
async fn test_token_request_shape() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "client_id": "test-client",
            "client_secret": "test-secret",
            "audience": "https://analytics.example.com",
            "grant_type": "client_credentials"
        })))
        .respond_with(token_response("issued-token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let token = client.token_manager().get_valid_token().await.unwrap();

    assert_eq!(token.secret(), "issued-token");
    server.verify().await;
}

#[tokio::test]
async fn test_concurrent_fetches_issue_one_token_request() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("shared-token").set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;
    hist_mock(ResponseTemplate::new(200).set_body_json(hist_body()))
        .expect(8)
        .mount(&server)
        .await;

    let client = Arc::new(
        AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap(),
    );

    let fetches = (0..8).map(|_| {
        let client = client.clone();
        async move { client.fetch_hist_data(&HistQuery::default()).await }
    });
    let results = futures::future::join_all(fetches).await;

    for result in results {
        assert_eq!(
            result
                .unwrap()
                .get_values_by_kpi_type("PREDICTED_WAITING_TIME")
                .unwrap(),
            vec![120, 0]
        );
    }

    for request in server.received_requests().await.unwrap() {
        if request.url.path() == HIST_PATH {
            assert_eq!(
                request.headers.get("authorization").unwrap(),
                "Bearer shared-token"
            );
        }
    }
    server.verify().await;
}

#[tokio::test]
async fn test_cached_token_reused_across_instances() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("persisted-token"))
        .expect(1)
        .mount(&server)
        .await;

    let first = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let issued = first.token_manager().get_valid_token().await.unwrap();

    let second = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let reused = second.token_manager().get_valid_token().await.unwrap();

    assert_eq!(issued, reused);
    server.verify().await;
}

#[tokio::test]
async fn test_corrupt_cache_is_replaced() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("token.json");
    std::fs::write(&cache, b"access_token=garbage").unwrap();

    token_mock(token_response("fresh-token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let token = client.token_manager().get_valid_token().await.unwrap();

    let stored = FileTokenStorage::new(&cache).load().await.unwrap();
    assert_eq!(stored, token);
    assert_eq!(stored.secret(), "fresh-token");
}

#[tokio::test]
async fn test_out_of_range_cache_lifetime_is_replaced() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("token.json");
    std::fs::write(
        &cache,
        br#"{"version":1,"access_token":"abc","expires_in":10000000000000,"created_at":"2025-06-15T15:30:00Z"}"#,
    )
    .unwrap();

    token_mock(token_response("bounded-token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let token = client.token_manager().get_valid_token().await.unwrap();

    assert_eq!(token.secret(), "bounded-token");
    assert_eq!(FileTokenStorage::new(&cache).load().await.unwrap(), token);
}

#[tokio::test]
async fn test_expired_cache_triggers_refresh() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = FileTokenStorage::new(dir.path().join("token.json"));
    storage
        .save(&Token::new(
            "expired-token",
            chrono::Utc::now() - chrono::Duration::hours(2),
            3600,
        ))
        .await
        .unwrap();

    token_mock(token_response("renewed-token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let token = client.token_manager().get_valid_token().await.unwrap();

    assert_eq!(token.secret(), "renewed-token");
    server.verify().await;
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(ResponseTemplate::new(401).set_body_json(json!({
        "error": "access_denied",
        "error_description": "Unauthorized"
    })))
    .mount(&server)
    .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let err = client.fetch_hist_data(&HistQuery::default()).await.unwrap_err();

    match err {
        AnalyticsError::Auth(AuthError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "access_denied: Unauthorized");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!dir.path().join("token.json").exists());
    assert!(client.token_manager().cached_token().await.is_none());
}
