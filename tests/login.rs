//! End-to-end tests for the ClientLogin flow against a mock server.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clientlogin::{AuthError, Config, Credentials, TokenAuthHandler};

const SERVICE_NAME: &str = "adwords";

fn handler_for(server: &MockServer) -> TokenAuthHandler {
    TokenAuthHandler::new(Arc::new(Config::default()), server.uri(), SERVICE_NAME)
        .expect("handler")
}

fn login_credentials() -> Credentials {
    let mut credentials = Credentials::from_login("a@example.com", "pw");
    credentials.set("extra", "x");
    credentials
}

#[tokio::test]
async fn successful_login_fills_headers_and_caches_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("accountType=GOOGLE"))
        .and(body_string_contains("Email=a%40example.com"))
        .and(body_string_contains("Passwd=pw"))
        .and(body_string_contains("service=adwords"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Auth=TOK123\nOther=y"))
        .expect(1)
        .mount(&server)
        .await;

    let handler = handler_for(&server);
    let credentials = login_credentials();

    let headers = handler.headers(&credentials).await.expect("headers");
    assert_eq!(headers.len(), 2);
    assert_eq!(headers.get("extra").map(String::as_str), Some("x"));
    assert_eq!(headers.get("authToken").map(String::as_str), Some("TOK123"));

    // Second call is served from the cache; the mock allows one request.
    let again = handler.headers(&credentials).await.expect("cached headers");
    assert_eq!(again, headers);

    let auth = handler.auth_string(&credentials).await.expect("auth string");
    assert_eq!(auth, "GoogleLogin auth=TOK123");
}

#[tokio::test]
async fn watched_field_change_triggers_regeneration() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Auth=TOK123"))
        .expect(2)
        .mount(&server)
        .await;

    let handler = Arc::new(handler_for(&server));
    let mut credentials = login_credentials();
    credentials.subscribe(handler.clone());

    handler.headers(&credentials).await.expect("first headers");

    credentials.set("password", "changed");
    handler.headers(&credentials).await.expect("regenerated headers");
}

#[tokio::test]
async fn unrelated_field_change_keeps_cached_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Auth=TOK123"))
        .expect(1)
        .mount(&server)
        .await;

    let handler = Arc::new(handler_for(&server));
    let mut credentials = login_credentials();
    credentials.subscribe(handler.clone());

    handler.headers(&credentials).await.expect("first headers");

    credentials.set("extra", "changed");
    let headers = handler.headers(&credentials).await.expect("cached headers");
    assert_eq!(headers.get("extra").map(String::as_str), Some("changed"));
    assert_eq!(headers.get("authToken").map(String::as_str), Some("TOK123"));
}

#[tokio::test]
async fn configured_token_skips_the_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Auth=UNUSED"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.authentication.auth_token = Some("CONFIG_TOKEN".to_string());
    let handler =
        TokenAuthHandler::new(Arc::new(config), server.uri(), SERVICE_NAME).expect("handler");

    let headers = handler
        .headers(&login_credentials())
        .await
        .expect("headers");
    assert_eq!(
        headers.get("authToken").map(String::as_str),
        Some("CONFIG_TOKEN")
    );
}

#[tokio::test]
async fn rejected_login_surfaces_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Error=BadAuthentication"))
        .expect(1)
        .mount(&server)
        .await;

    let handler = handler_for(&server);
    let err = handler
        .headers(&login_credentials())
        .await
        .expect_err("login should fail");

    assert_eq!(err.server_error(), Some("BadAuthentication"));
    match err {
        AuthError::LoginFailed {
            email,
            status,
            info,
            ..
        } => {
            assert_eq!(email, "a@example.com");
            assert_eq!(status, 403);
            assert_eq!(info, None);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rejection_with_info_keeps_both_attributes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("Error=BadAuthentication\nInfo=InvalidSecondFactor"),
        )
        .mount(&server)
        .await;

    let handler = handler_for(&server);
    let err = handler
        .headers(&login_credentials())
        .await
        .expect_err("login should fail");

    assert_eq!(err.server_error(), Some("BadAuthentication"));
    assert_eq!(err.server_info(), Some("InvalidSecondFactor"));
    assert_eq!(
        err.to_string(),
        "login failed for email a@example.com: HTTP code 403. \
         Error: BadAuthentication. Info: InvalidSecondFactor."
    );
}

#[tokio::test]
async fn duplicate_auth_keys_keep_the_last_value() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Auth=TOK1\nAuth=TOK2"))
        .mount(&server)
        .await;

    let handler = handler_for(&server);
    let headers = handler
        .headers(&login_credentials())
        .await
        .expect("headers");
    assert_eq!(headers.get("authToken").map(String::as_str), Some("TOK2"));
}

#[tokio::test]
async fn success_status_without_auth_key_fails_with_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("SID=abc"))
        .mount(&server)
        .await;

    let handler = handler_for(&server);
    let err = handler
        .headers(&login_credentials())
        .await
        .expect_err("missing Auth key should fail");

    // No Error field, so the whole body is carried as the error string.
    assert_eq!(err.server_error(), Some("SID=abc"));
}

#[tokio::test]
async fn empty_auth_value_is_a_failed_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Auth="))
        .expect(2)
        .mount(&server)
        .await;

    let handler = handler_for(&server);
    let credentials = login_credentials();

    let err = handler
        .headers(&credentials)
        .await
        .expect_err("empty token should fail");
    // No Error field, so the raw body is carried as the error string.
    assert_eq!(err.server_error(), Some("Auth="));

    // The empty value was not cached; the next call logs in again.
    let err = handler
        .headers(&credentials)
        .await
        .expect_err("still failing");
    assert_eq!(err.server_error(), Some("Auth="));
}

#[tokio::test]
async fn concurrent_callers_share_one_login_request() {
    let server = MockServer::start().await;

    // The delay keeps the first login in flight while the second caller
    // arrives; the mock allows exactly one request.
    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Auth=TOK123")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handler = Arc::new(handler_for(&server));
    let credentials = login_credentials();

    let first = {
        let handler = handler.clone();
        let credentials = credentials.clone();
        tokio::spawn(async move { handler.headers(&credentials).await })
    };
    let second = {
        let handler = handler.clone();
        let credentials = credentials.clone();
        tokio::spawn(async move { handler.headers(&credentials).await })
    };

    let first = first.await.expect("join").expect("first headers");
    let second = second.await.expect("join").expect("second headers");
    assert_eq!(first.get("authToken").map(String::as_str), Some("TOK123"));
    assert_eq!(second, first);
}

#[tokio::test]
async fn failed_attempt_is_not_cached() {
    let server = MockServer::start().await;

    // First request is rejected, the next one succeeds.
    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Error=ServiceUnavailable"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/accounts/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Auth=TOK123"))
        .expect(1)
        .mount(&server)
        .await;

    let handler = handler_for(&server);
    let credentials = login_credentials();

    let err = handler
        .headers(&credentials)
        .await
        .expect_err("first attempt should fail");
    assert_eq!(err.server_error(), Some("ServiceUnavailable"));

    let headers = handler.headers(&credentials).await.expect("retry succeeds");
    assert_eq!(headers.get("authToken").map(String::as_str), Some("TOK123"));
}
