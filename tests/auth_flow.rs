//! End-to-end tests for the authentication/authorization pipeline.
//!
//! Drives a real axum Router (via `tower::ServiceExt::oneshot`) backed by the
//! in-memory store, covering the full token lifecycle: issue → authenticate →
//! renew → expire (419) → revoke (401), plus parameterized-role authorization
//! and all three token extraction locations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Router};
use chrono::{Duration, Utc};
use tower::ServiceExt;

use passgate::config::{AuthConfig, TokenLocation};
use passgate::middleware::{authn, authz, AuthState};
use passgate::models::token::{AuthContext, TokenRecord};
use passgate::store::memory::MemoryTokenStore;
use passgate::store::{StoreError, TokenStore};

const AUTHENTICATION_TIMEOUT: u16 = 419;

fn test_config() -> AuthConfig {
    AuthConfig::new("integration-secret")
}

async fn whoami(ctx: AuthContext) -> String {
    ctx.user_key
}

fn app(auth: Arc<AuthState>) -> Router {
    Router::new()
        .route("/open", get(|| async { "ok" }))
        .route("/whoami", get(whoami))
        .route(
            "/admin",
            get(|| async { "admin ok" }).route_layer(middleware::from_fn(
                authz::require_roles(&["admin"]),
            )),
        )
        .route(
            "/business/:business_id/staff",
            get(|| async { "staff" }).route_layer(middleware::from_fn(authz::require_roles(&[
                "admin",
                "manager-at-{{:business_id}}",
            ]))),
        )
        .route(
            "/reports",
            get(|| async { "reports" }).route_layer(middleware::from_fn(
                authz::require_roles(&["viewer-of-{{?region}}"]),
            )),
        )
        .layer(middleware::from_fn_with_state(auth, authn::authenticate))
}

async fn get_status(app: &Router, uri: &str) -> StatusCode {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    response.status()
}

async fn login(auth: &AuthState, user_key: &str, roles: &[&str]) -> String {
    auth.login(
        user_key,
        roles.iter().map(|r| r.to_string()).collect(),
        serde_json::json!({ "name": user_key }),
        false,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn anonymous_request_passes_open_routes() {
    let auth = AuthState::new(&test_config(), Arc::new(MemoryTokenStore::new())).unwrap();
    let app = app(auth);

    assert_eq!(get_status(&app, "/open").await, StatusCode::OK);
}

#[tokio::test]
async fn anonymous_request_rejected_on_protected_routes() {
    let auth = AuthState::new(&test_config(), Arc::new(MemoryTokenStore::new())).unwrap();
    let app = app(auth);

    assert_eq!(get_status(&app, "/admin").await, StatusCode::UNAUTHORIZED);
    assert_eq!(get_status(&app, "/whoami").await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_token_is_treated_as_anonymous() {
    let auth = AuthState::new(&test_config(), Arc::new(MemoryTokenStore::new())).unwrap();
    let app = app(auth);

    // Not an error on open routes, unauthorized on protected ones.
    assert_eq!(get_status(&app, "/open?token=forged").await, StatusCode::OK);
    assert_eq!(
        get_status(&app, "/admin?token=forged").await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn valid_token_attaches_context_and_authorizes() {
    let auth = AuthState::new(&test_config(), Arc::new(MemoryTokenStore::new())).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;
    let app = app(auth);

    assert_eq!(
        get_status(&app, &format!("/admin?token={}", token)).await,
        StatusCode::OK
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/whoami?token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"u1");
}

#[tokio::test]
async fn insufficient_role_is_forbidden() {
    let auth = AuthState::new(&test_config(), Arc::new(MemoryTokenStore::new())).unwrap();
    let token = login(&auth, "u1", &["manager"]).await;
    let app = app(auth);

    assert_eq!(
        get_status(&app, &format!("/admin?token={}", token)).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn path_parameterized_role_matches_only_its_resource() {
    let auth = AuthState::new(&test_config(), Arc::new(MemoryTokenStore::new())).unwrap();
    let token = login(&auth, "u1", &["manager-at-123456789"]).await;
    let app = app(auth);

    assert_eq!(
        get_status(&app, &format!("/business/123456789/staff?token={}", token)).await,
        StatusCode::OK
    );
    assert_eq!(
        get_status(&app, &format!("/business/42/staff?token={}", token)).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn query_parameterized_role_binds_from_query_string() {
    let auth = AuthState::new(&test_config(), Arc::new(MemoryTokenStore::new())).unwrap();
    let token = login(&auth, "u1", &["viewer-of-eu"]).await;
    let app = app(auth);

    assert_eq!(
        get_status(&app, &format!("/reports?region=eu&token={}", token)).await,
        StatusCode::OK
    );
    assert_eq!(
        get_status(&app, &format!("/reports?region=us&token={}", token)).await,
        StatusCode::FORBIDDEN
    );
    // Absent parameter resolves to "viewer-of-", which nobody holds.
    assert_eq!(
        get_status(&app, &format!("/reports?token={}", token)).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn expired_token_gets_authentication_timeout() {
    let store = Arc::new(MemoryTokenStore::new());
    let auth = AuthState::new(&test_config(), store.clone()).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;
    let app = app(auth);

    // Simulate the expiration window passing.
    let mut record = store.get(&token).unwrap();
    record.expire_at = Utc::now() - Duration::seconds(1);
    store.put(record);

    let status = get_status(&app, &format!("/admin?token={}", token)).await;
    assert_eq!(status.as_u16(), AUTHENTICATION_TIMEOUT);

    // Also 419 on open routes: an expired session is an error, not anonymity.
    let status = get_status(&app, &format!("/open?token={}", token)).await;
    assert_eq!(status.as_u16(), AUTHENTICATION_TIMEOUT);
}

#[tokio::test]
async fn revoked_token_is_unauthorized() {
    let store = Arc::new(MemoryTokenStore::new());
    let auth = AuthState::new(&test_config(), store).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;

    auth.lifecycle().revoke(&token).await.unwrap();

    let app = app(auth);
    assert_eq!(
        get_status(&app, &format!("/admin?token={}", token)).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get_status(&app, &format!("/open?token={}", token)).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn relogin_with_revoke_existing_invalidates_prior_session() {
    let store = Arc::new(MemoryTokenStore::new());
    let auth = AuthState::new(&test_config(), store.clone()).unwrap();

    let first = login(&auth, "u1", &["admin"]).await;
    let second = auth
        .login("u1", vec!["admin".into()], serde_json::Value::Null, true)
        .await
        .unwrap();

    assert!(store.get(&first).unwrap().is_revoked);

    let app = app(auth);
    assert_eq!(
        get_status(&app, &format!("/admin?token={}", first)).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get_status(&app, &format!("/admin?token={}", second)).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn logout_revokes_current_or_all_sessions() {
    let store = Arc::new(MemoryTokenStore::new());
    let auth = AuthState::new(&test_config(), store.clone()).unwrap();

    let a = login(&auth, "u1", &["admin"]).await;
    let b = login(&auth, "u1", &["admin"]).await;

    let ctx = AuthContext::from(&store.get(&a).unwrap());
    auth.logout(&ctx, false).await.unwrap();
    assert!(store.get(&a).unwrap().is_revoked);
    assert!(!store.get(&b).unwrap().is_revoked);

    let ctx = AuthContext::from(&store.get(&b).unwrap());
    auth.logout(&ctx, true).await.unwrap();
    assert!(store.get(&b).unwrap().is_revoked);
}

#[tokio::test]
async fn near_expiry_request_triggers_sliding_renewal() {
    let store = Arc::new(MemoryTokenStore::new());
    let auth = AuthState::new(&test_config(), store.clone()).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;

    // Put the record inside the 5-minute renewal threshold.
    let mut record = store.get(&token).unwrap();
    record.expire_at = Utc::now() + Duration::minutes(2);
    store.put(record);
    let before = store.get(&token).unwrap().expire_at;

    let app = app(auth);
    assert_eq!(
        get_status(&app, &format!("/admin?token={}", token)).await,
        StatusCode::OK
    );

    // Renewal is fire-and-forget; give the spawned task a moment.
    let mut renewed = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if store.get(&token).unwrap().expire_at > before {
            renewed = true;
            break;
        }
    }
    assert!(renewed, "expire_at was not extended");
    assert!(store.get(&token).unwrap().expire_at <= Utc::now() + Duration::minutes(10));
}

#[tokio::test]
async fn fresh_token_is_not_renewed() {
    let store = Arc::new(MemoryTokenStore::new());
    let auth = AuthState::new(&test_config(), store.clone()).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;
    let before = store.get(&token).unwrap().expire_at;

    let app = app(auth);
    assert_eq!(
        get_status(&app, &format!("/admin?token={}", token)).await,
        StatusCode::OK
    );

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(store.get(&token).unwrap().expire_at, before);
}

// ── Store failure propagation ───────────────────────────────

/// Wrapper that can be switched into outage mode after login.
struct FlakyStore {
    inner: MemoryTokenStore,
    down: AtomicBool,
}

#[async_trait::async_trait]
impl TokenStore for FlakyStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<TokenRecord>, StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.find_by_token(token).await
    }
    async fn find_by_user_key(&self, user_key: &str) -> Result<Vec<TokenRecord>, StoreError> {
        self.inner.find_by_user_key(user_key).await
    }
    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }
    async fn update(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.inner.update(record).await
    }
}

#[tokio::test]
async fn store_outage_is_an_error_not_anonymous_access() {
    let store = Arc::new(FlakyStore {
        inner: MemoryTokenStore::new(),
        down: AtomicBool::new(false),
    });
    let auth = AuthState::new(&test_config(), store.clone()).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;
    let app = app(auth);

    store.down.store(true, Ordering::SeqCst);

    // Even on an open route the outage surfaces; it must never downgrade an
    // authenticated caller to anonymous.
    assert_eq!(
        get_status(&app, &format!("/open?token={}", token)).await,
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        get_status(&app, &format!("/admin?token={}", token)).await,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// ── Alternate token locations ───────────────────────────────

#[tokio::test]
async fn token_extracted_from_cookie() {
    let mut cfg = test_config();
    cfg.token_location = TokenLocation::Cookie;
    cfg.token_field = "session".to_string();

    let auth = AuthState::new(&cfg, Arc::new(MemoryTokenStore::new())).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;
    let app = app(auth);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin")
                .header("cookie", format!("theme=dark; session={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_extracted_from_json_body() {
    let mut cfg = test_config();
    cfg.token_location = TokenLocation::Body;

    let auth = AuthState::new(&cfg, Arc::new(MemoryTokenStore::new())).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;

    let router = Router::new()
        .route(
            "/admin",
            post(|| async { "admin ok" })
                .route_layer(middleware::from_fn(authz::require_roles(&["admin"]))),
        )
        .layer(middleware::from_fn_with_state(auth, authn::authenticate));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin")
                .header("content-type", "application/json")
                .body(Body::from(format!(r#"{{"token":"{}"}}"#, token)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_extracted_from_form_body() {
    let mut cfg = test_config();
    cfg.token_location = TokenLocation::Body;

    let auth = AuthState::new(&cfg, Arc::new(MemoryTokenStore::new())).unwrap();
    let token = login(&auth, "u1", &["admin"]).await;

    let router = Router::new()
        .route(
            "/admin",
            post(|| async { "admin ok" })
                .route_layer(middleware::from_fn(authz::require_roles(&["admin"]))),
        )
        .layer(middleware::from_fn_with_state(auth, authn::authenticate));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(format!("token={}&other=1", token)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
