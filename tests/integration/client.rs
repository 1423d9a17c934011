//! Authenticated request client integration tests

use super::*;
use kpi_analytics_integration::{
    AnalyticsClient, AnalyticsError, AuthScheme, HistQuery, HttpMethod, NetworkError,
};
use std::time::Duration;
use wiremock::matchers::{header, query_param};

#[tokio::test]
async fn test_fetch_hist_data_end_to_end() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("e2e-token")).mount(&server).await;
    Mock::given(method("GET"))
        .and(path(HIST_PATH))
        .and(header("authorization", "Bearer e2e-token"))
        .and(header("xovis-api-version", "1"))
        .and(query_param("from", "2025-06-15T00:00:00Z"))
        .and(query_param("to", "2025-06-16T00:00:00Z"))
        .and(query_param("granularity", "PT15M"))
        .and(query_param("tags", "security"))
        .and(query_param("aggregation_type", "AVG"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hist_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();
    let query = HistQuery::new("2025-06-15T00:00:00Z", "2025-06-16T00:00:00Z")
        .granularity("PT15M")
        .tags("security")
        .aggregation_type("AVG");

    let response = client.fetch_hist_data(&query).await.unwrap();

    assert_eq!(
        response.get_values_by_kpi_type("PREDICTED_WAITING_TIME").unwrap(),
        vec![120, 0]
    );
    assert_eq!(response.configs[0].source_name, "Security");
    assert_eq!(response.timestamps()[1].timestamp(), 1_750_000_000);
    server.verify().await;
}

#[tokio::test]
async fn test_query_params_overwrite_endpoint_params() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("t")).mount(&server).await;
    hist_mock(ResponseTemplate::new(200).set_body_json(hist_body()))
        .mount(&server)
        .await;

    let config = test_config(&server, dir.path())
        .hist_endpoint(format!("{}{}?from=stale&site=zrh", server.uri(), HIST_PATH))
        .build()
        .unwrap();
    let client = AnalyticsClient::new(config).unwrap();

    client
        .fetch_hist_data(&HistQuery::new("fresh", "later"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let hist = requests
        .iter()
        .find(|r| r.url.path() == HIST_PATH)
        .unwrap();
    let from: Vec<String> = hist
        .url
        .query_pairs()
        .filter(|(k, _)| k == "from")
        .map(|(_, v)| v.into_owned())
        .collect();

    assert_eq!(from, vec!["fresh".to_string()]);
    assert!(hist.url.query_pairs().any(|(k, v)| k == "site" && v == "zrh"));
}

#[tokio::test]
async fn test_error_body_is_bounded() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("t")).mount(&server).await;
    hist_mock(ResponseTemplate::new(500).set_body_string("e".repeat(10_000)))
        .mount(&server)
        .await;

    let config = test_config(&server, dir.path())
        .max_error_body_bytes(64)
        .build()
        .unwrap();
    let client = AnalyticsClient::new(config).unwrap();

    let err = client.fetch_hist_data(&HistQuery::default()).await.unwrap_err();
    assert!(err.is_retryable());
    match err {
        AnalyticsError::Network(NetworkError::UnexpectedStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, format!("{}...", "e".repeat(64)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_oversized_success_body_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("t")).mount(&server).await;
    hist_mock(ResponseTemplate::new(200).set_body_json(hist_body()))
        .mount(&server)
        .await;

    let config = test_config(&server, dir.path())
        .max_response_bytes(128)
        .build()
        .unwrap();
    let client = AnalyticsClient::new(config).unwrap();

    let err = client.fetch_hist_data(&HistQuery::default()).await.unwrap_err();
    assert!(matches!(
        err,
        AnalyticsError::Network(NetworkError::ResponseTooLarge { .. })
    ));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("t")).mount(&server).await;
    hist_mock(
        ResponseTemplate::new(200)
            .set_body_json(hist_body())
            .set_delay(Duration::from_secs(2)),
    )
    .mount(&server)
    .await;

    let config = test_config(&server, dir.path())
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let client = AnalyticsClient::new(config).unwrap();

    let err = client.fetch_hist_data(&HistQuery::default()).await.unwrap_err();
    assert!(matches!(
        err,
        AnalyticsError::Network(NetworkError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_redirect_not_followed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("t")).mount(&server).await;
    hist_mock(ResponseTemplate::new(302).insert_header("location", "https://elsewhere.example.com/"))
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();

    let err = client.fetch_hist_data(&HistQuery::default()).await.unwrap_err();
    assert!(matches!(
        err,
        AnalyticsError::Network(NetworkError::UnexpectedStatus { status: 302, .. })
    ));
}

#[tokio::test]
async fn test_send_authorized_schemes() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/basic"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/keyed"))
        .and(header("x-api-key", "k-123"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();

    let basic = client
        .send_authorized(
            HttpMethod::Get,
            &format!("{}/basic", server.uri()),
            None,
            &AuthScheme::basic("user", "pass"),
        )
        .await
        .unwrap();
    assert_eq!(basic.status, 200);

    let body = json!({"zone": "A"});
    let keyed = client
        .send_authorized(
            HttpMethod::Post,
            &format!("{}/keyed", server.uri()),
            Some(&body),
            &AuthScheme::api_key("X-Api-Key", "k-123"),
        )
        .await
        .unwrap();
    assert_eq!(keyed.status, 204);

    server.verify().await;
}

#[tokio::test]
async fn test_bearer_rejected_needs_reauth() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    token_mock(token_response("t")).mount(&server).await;
    hist_mock(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let client = AnalyticsClient::new(test_config(&server, dir.path()).build().unwrap()).unwrap();

    let err = client.fetch_hist_data(&HistQuery::default()).await.unwrap_err();
    assert!(err.needs_reauth());
    assert_eq!(err.error_code(), "ANALYTICS_NETWORK");
}
