use linkcode::{HttpLinkApi, LinkApi, LinkError, Platform};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_generate_link_code_sends_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/link-code"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "linkCode": "ABCD1234", "expiresIn": 300 })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&format!("{}/api", mock_server.uri()))
        .unwrap()
        .with_token("test-token");
    let code = api.generate_link_code().await.unwrap();

    assert_eq!(code.code, "ABCD1234");
    assert_eq!(code.expires_in.map(|d| d.as_secs()), Some(300));
}

#[tokio::test]
async fn test_generate_link_code_accepts_snake_case_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/link-code"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "data": { "link_code": 48213907 } })),
        )
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri()).unwrap();
    let code = api.generate_link_code().await.unwrap();
    assert_eq!(code.code, "48213907");
    assert_eq!(code.expires_in, None);
}

#[tokio::test]
async fn test_generate_link_code_server_error_is_uniform() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/link-code"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({ "message": "slow down", "code": "RATE_LIMITED" })),
        )
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri()).unwrap();
    let err = api.generate_link_code().await.unwrap_err();

    assert!(matches!(err, LinkError::CodeGeneration(_)));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("429"));
    assert!(!err.to_string().contains("RATE_LIMITED"));
}

#[tokio::test]
async fn test_generate_link_code_bad_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/link-code"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri()).unwrap();
    let err = api.generate_link_code().await.unwrap_err();
    assert!(matches!(err, LinkError::CodeGeneration(_)));
}

#[tokio::test]
async fn test_check_link_status_finds_synonym() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/links/user-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "links": [
                { "platform": "steam", "externalId": "76561198000000000" },
                { "platform": "MC", "externalId": "069a79f4", "platformUsername": "Notch" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri()).unwrap();
    let report = api.check_link_status("user-42").await.unwrap();

    assert_eq!(report.links.len(), 2);
    let link = report.find(&Platform::Minecraft).unwrap();
    assert_eq!(link.display_name(), "Notch");
    assert!(!report.is_linked(&Platform::Discord));
}

#[tokio::test]
async fn test_check_link_status_encodes_user_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/links/a%20b%2Fc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "links": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri()).unwrap();
    let report = api.check_link_status("a b/c").await.unwrap();
    assert!(report.links.is_empty());
}

#[tokio::test]
async fn test_check_link_status_custom_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/users/user-42/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accounts": [{ "type": "discord", "id": 1234 }]
        })))
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri())
        .unwrap()
        .with_paths("v2/codes".to_string(), "v2/users/{user_id}/accounts".to_string());
    let report = api.check_link_status("user-42").await.unwrap();
    assert_eq!(report.find(&Platform::Discord).unwrap().external_id, "1234");
}

#[tokio::test]
async fn test_check_link_status_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/links/user-42"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "database down" })))
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri()).unwrap();
    let err = api.check_link_status("user-42").await.unwrap_err();
    match err {
        LinkError::Api { status, message } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(message, "database down");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_check_link_status_rows_with_their_own_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/links/user-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "links": [{
                "id": 17,
                "platform": "minecraft",
                "externalId": "069a79f4",
                "username": "user-42",
                "platformUsername": "Notch"
            }]
        })))
        .mount(&mock_server)
        .await;

    let api = HttpLinkApi::new(&mock_server.uri()).unwrap();
    let report = api.check_link_status("user-42").await.unwrap();

    let link = report.find(&Platform::Minecraft).unwrap();
    assert_eq!(link.external_id, "069a79f4");
    assert_eq!(link.display_name(), "Notch");
}
