//! HTTP behaviour of the platform client against a mock backend.

use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use periskon::api::client::ApiClient;
use periskon::api::models::{Session, SessionUser, SignUpOutcome};
use periskon::error::{ApiError, AuthError};
use periskon::session::{self, LoginForm, SignupForm};
use periskon::sync::{self, Outgoing};

const ANON: &str = "anon-key";

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), ANON).unwrap()
}

fn session(expires_at: i64) -> Session {
    Session {
        access_token: "user-token".into(),
        refresh_token: "refresh-1".into(),
        expires_at,
        user: SessionUser { id: "u1".into(), email: Some("ana@example.com".into()) },
    }
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "fresh-token",
        "refresh_token": "refresh-2",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": "u1", "email": "ana@example.com" }
    })
}

#[tokio::test]
async fn sign_in_posts_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", ANON))
        .and(body_partial_json(json!({ "email": "ana@example.com", "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let form = LoginForm { email: " ana@example.com ".into(), password: "hunter22".into() };
    let before = Utc::now().timestamp();
    let s = session::sign_in(&client(&server), &form).await.unwrap();
    assert_eq!(s.access_token, "fresh-token");
    assert_eq!(s.user.id, "u1");
    assert!(s.expires_at >= before + 3600);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let form = LoginForm { email: "ana@example.com".into(), password: "wrongpass".into() };
    let err = session::sign_in(&client(&server), &form).await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::InvalidCredentials)));
}

#[tokio::test]
async fn invalid_form_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let form = LoginForm { email: "not-an-email".into(), password: "123".into() };
    let err = session::sign_in(&client(&server), &form).await.unwrap_err();
    let AuthError::Validation(errors) = err else { panic!("expected validation error") };
    assert_eq!(errors.for_field("email"), Some("Please enter a valid email address"));
    assert_eq!(errors.for_field("password"), Some("Password must be at least 6 characters"));
}

fn signup_form() -> SignupForm {
    SignupForm {
        name: "Ana Ruiz".into(),
        email: "ana@example.com".into(),
        password: "hunter22".into(),
        phone: "5550001111".into(),
    }
}

#[tokio::test]
async fn sign_up_creates_profile_with_user_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({ "data": { "display_name": "Ana Ruiz", "phone_number": "5550001111" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(header("Authorization", "Bearer fresh-token"))
        .and(body_partial_json(json!({ "id": "u1", "display_name": "Ana Ruiz", "phone_number": "5550001111" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = session::sign_up(&client(&server), &signup_form()).await.unwrap();
    assert!(matches!(outcome, SignUpOutcome::SignedIn(s) if s.user.id == "u1"));
}

#[tokio::test]
async fn sign_up_without_session_needs_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u9", "email": "ana@example.com" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(header("Authorization", format!("Bearer {}", ANON).as_str()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = session::sign_up(&client(&server), &signup_form()).await.unwrap();
    assert_eq!(outcome, SignUpOutcome::ConfirmationRequired { user_id: "u9".into() });
}

#[tokio::test]
async fn duplicate_account_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 422,
            "error_code": "user_already_exists",
            "msg": "User already registered"
        })))
        .mount(&server)
        .await;

    let err = session::sign_up(&client(&server), &signup_form()).await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::DuplicateAccount)));
}

#[tokio::test]
async fn restore_keeps_fresh_session_without_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let now = 1_700_000_000;
    let s = session(now + 3600);
    let restored = session::restore(&client(&server), s.clone(), now).await.unwrap();
    assert_eq!(restored, Some(s));
}

#[tokio::test]
async fn restore_refreshes_expiring_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let now = Utc::now().timestamp();
    let restored = session::restore(&client(&server), session(now + 10), now).await.unwrap();
    assert_eq!(restored.map(|s| s.access_token), Some("fresh-token".to_string()));
}

#[tokio::test]
async fn restore_drops_session_with_revoked_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Already Used"
        })))
        .mount(&server)
        .await;

    let now = Utc::now().timestamp();
    let restored = session::restore(&client(&server), session(now - 5), now).await.unwrap();
    assert_eq!(restored, None);
}

#[tokio::test]
async fn conversations_are_unwrapped_from_memberships() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_participants"))
        .and(query_param("user_id", "eq.u1"))
        .and(header("Authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "chat_id": "c1",
                "chats": {
                    "id": "c1",
                    "name": null,
                    "is_group": false,
                    "last_message": "hi",
                    "last_message_at": "2024-03-01T10:00:00Z",
                    "created_at": "2024-02-01T10:00:00Z",
                    "chat_labels": [{ "labels": { "id": "l1", "name": "Demo", "color": "#f97316" } }],
                    "chat_participants": [
                        { "profiles": { "id": "u2", "display_name": "Bea Ortiz", "avatar_url": null, "phone_number": null } }
                    ]
                }
            },
            { "chat_id": "c-hidden", "chats": null }
        ])))
        .mount(&server)
        .await;

    let chats = client(&server).conversations("user-token", "u1").await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].display_name(), "Bea Ortiz");
    assert!(chats[0].has_label("Demo"));
}

#[tokio::test]
async fn thread_fetch_asks_for_ordered_expanded_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .and(query_param("chat_id", "eq.c1"))
        .and(query_param("order", "created_at.asc"))
        .and(query_param("select", "*,sender:sender_id(id,display_name,avatar_url)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "m1",
                "chat_id": "c1",
                "sender_id": "u2",
                "content": "hello",
                "created_at": "2024-03-01T10:00:00Z",
                "is_read": false,
                "sender": { "id": "u2", "display_name": "Bea Ortiz", "avatar_url": null }
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = sync::fetch_thread(&client(&server), &session(0), "c1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sender.as_ref().and_then(|s| s.display_name.as_deref()), Some("Bea Ortiz"));
}

#[tokio::test]
async fn deliver_inserts_then_moves_preview() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .and(body_partial_json(json!({ "content": "on my way", "chat_id": "c1", "sender_id": "u1", "is_read": false })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/chats"))
        .and(query_param("id", "eq.c1"))
        .and(body_partial_json(json!({ "last_message": "on my way" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let out = Outgoing::new("c1", "u1", "on my way").unwrap();
    sync::deliver(&client(&server), &session(0), &out).await.unwrap();
}

#[tokio::test]
async fn failed_insert_skips_preview_update() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "permission denied for table messages" })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH")).respond_with(ResponseTemplate::new(204)).expect(0).mount(&server).await;

    let out = Outgoing::new("c1", "u1", "hello").unwrap();
    let err = sync::deliver(&client(&server), &session(0), &out).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 403, .. }));
}

#[tokio::test]
async fn stale_preview_after_insert_still_counts_as_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/chats"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .expect(1)
        .mount(&server)
        .await;

    let out = Outgoing::new("c1", "u1", "hello").unwrap();
    assert!(sync::deliver(&client(&server), &session(0), &out).await.is_ok());
}
