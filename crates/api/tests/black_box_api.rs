use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::json;

use storefront_api::app::{build_app, services::AppServices};
use storefront_auth::{HashingParams, PasswordHasher, Role, SigningKey, TokenIssuer, default_access_ttl};
use storefront_core::AccountId;
use storefront_infra::{
    AdminFederation, AuthService, ExternalIdentity, FederationAdapter, FederationError, IdentityProvider,
    InMemoryIdentityStore, InMemoryTokenLedger, LedgerError, NewTokenRecord, Rotation, TokenLedger, TokenRecord,
};

const SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    auth: AuthService,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: AppServices) -> Self {
        let auth = services.auth.clone();

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, auth, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed(&self, role: Role, email: &str, password: &str) -> String {
        self.auth
            .ensure_account(role, email, password, "Seeded", Utc::now())
            .await
            .unwrap()
            .id
            .to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Provider accepting exactly one code.
struct FakeGoogle {
    code: &'static str,
    identity: ExternalIdentity,
}

#[async_trait]
impl IdentityProvider for FakeGoogle {
    fn authorization_url(&self, role: Role, state: &str) -> String {
        format!("https://accounts.example.test/auth?state={state}&redirect_uri=cb%2F{role}")
    }

    async fn exchange(&self, _role: Role, code: &str) -> Result<ExternalIdentity, FederationError> {
        if code == self.code {
            Ok(self.identity.clone())
        } else {
            Err(FederationError::Exchange("invalid_grant".to_string()))
        }
    }
}

/// Ledger whose backing store is unreachable.
struct UnreachableLedger;

#[async_trait]
impl TokenLedger for UnreachableLedger {
    async fn create(&self, _: NewTokenRecord, _: DateTime<Utc>) -> Result<TokenRecord, LedgerError> {
        Err(LedgerError::Storage("connection refused".to_string()))
    }
    async fn find_by_access(&self, _: &str) -> Result<TokenRecord, LedgerError> {
        Err(LedgerError::Storage("connection refused".to_string()))
    }
    async fn find_by_refresh(&self, _: &str) -> Result<TokenRecord, LedgerError> {
        Err(LedgerError::Storage("connection refused".to_string()))
    }
    async fn rotate(&self, _: &TokenRecord, _: Rotation, _: DateTime<Utc>) -> Result<TokenRecord, LedgerError> {
        Err(LedgerError::Storage("connection refused".to_string()))
    }
    async fn revoke_all(&self, _: AccountId) -> Result<u64, LedgerError> {
        Err(LedgerError::Storage("connection refused".to_string()))
    }
}

fn auth_service(access_ttl: ChronoDuration) -> AuthService {
    auth_service_with_ledger(access_ttl, Arc::new(InMemoryTokenLedger::new()))
}

fn auth_service_with_ledger(access_ttl: ChronoDuration, ledger: Arc<dyn TokenLedger>) -> AuthService {
    let issuer = TokenIssuer::new(SigningKey::new(SECRET).unwrap(), access_ttl).unwrap();
    let hasher = PasswordHasher::new(HashingParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap();
    AuthService::new(Arc::new(InMemoryIdentityStore::new()), ledger, issuer, hasher)
}

async fn server() -> TestServer {
    TestServer::spawn(AppServices::new(auth_service(default_access_ttl()), None)).await
}

async fn server_with_google(email: &str, name: &str, policy: AdminFederation) -> TestServer {
    let auth = auth_service(default_access_ttl());
    let provider = FakeGoogle {
        code: "good-code",
        identity: ExternalIdentity {
            email: email.to_string(),
            name: name.to_string(),
        },
    };
    let federation = FederationAdapter::new(auth.clone(), Arc::new(provider), policy);
    TestServer::spawn(AppServices::new(auth, Some(federation))).await
}

async fn login(client: &reqwest::Client, srv: &TestServer, role: &str, email: &str, password: &str) -> serde_json::Value {
    let res = client
        .post(srv.url(&format!("/auth/{role}/login")))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn get_status(client: &reqwest::Client, url: String, token: &str) -> StatusCode {
    client.get(url).bearer_auth(token).send().await.unwrap().status()
}

#[tokio::test]
async fn health_is_public() {
    let srv = server().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn consumer_session_is_role_scoped_and_expires() {
    let auth = auth_service(ChronoDuration::seconds(2));
    let srv = TestServer::spawn(AppServices::new(auth, None)).await;
    let id = srv.seed(Role::Consumer, "c@x.com", "pw").await;
    let client = reqwest::Client::new();

    let tokens = login(&client, &srv, "consumer", "c@x.com", "pw").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();
    assert!(tokens["refresh_token"].as_str().is_some());
    assert!(tokens["expires_at"].as_str().is_some());

    assert_eq!(get_status(&client, srv.url("/consumer/home"), &access).await, StatusCode::OK);
    assert_eq!(get_status(&client, srv.url("/admin/dashboard"), &access).await, StatusCode::FORBIDDEN);
    assert_eq!(get_status(&client, srv.url("/supplier/portal"), &access).await, StatusCode::FORBIDDEN);

    let res = client.get(srv.url("/whoami")).bearer_auth(&access).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["account_id"], id);
    assert_eq!(body["role"], "consumer");

    tokio::time::sleep(std::time::Duration::from_millis(3100)).await;

    let res = client.get(srv.url("/consumer/home")).bearer_auth(&access).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn login_failures() {
    let srv = server().await;
    srv.seed(Role::Supplier, "s@x.com", "right").await;
    let client = reqwest::Client::new();

    // Wrong password and unknown email look the same.
    for (email, password) in [("s@x.com", "wrong"), ("nobody@x.com", "right")] {
        let res = client
            .post(srv.url("/auth/supplier/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_credentials");
    }

    // Accounts are per role.
    let res = client
        .post(srv.url("/auth/consumer/login"))
        .json(&json!({ "email": "s@x.com", "password": "right" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/auth/root/login"))
        .json(&json!({ "email": "s@x.com", "password": "right" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_role");

    let res = client
        .post(srv.url("/auth/supplier/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/auth/supplier/login"))
        .json(&json!({ "email": "s@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_require_bearer() {
    let srv = server().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_credentials");

    let res = client
        .get(srv.url("/whoami"))
        .header("authorization", "Basic dXNlcjpwdw==")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(get_status(&client, srv.url("/whoami"), "garbage").await, StatusCode::UNAUTHORIZED);

    // Correctly signed but never issued through login.
    let issuer = TokenIssuer::new(SigningKey::new(SECRET).unwrap(), default_access_ttl()).unwrap();
    let forged = issuer
        .issue_access(AccountId::new(), Role::Admin, Utc::now())
        .unwrap()
        .token;
    let res = client.get(srv.url("/admin/dashboard")).bearer_auth(&forged).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "token_revoked");
}

#[tokio::test]
async fn refresh_rotates_and_old_values_stop_working() {
    let srv = server().await;
    srv.seed(Role::Consumer, "c@x.com", "pw").await;
    let client = reqwest::Client::new();

    let first = login(&client, &srv, "consumer", "c@x.com", "pw").await;
    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": first["refresh_token"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let second: serde_json::Value = res.json().await.unwrap();
    assert_ne!(second["access_token"], first["access_token"]);
    assert_ne!(second["refresh_token"], first["refresh_token"]);

    let new_access = second["access_token"].as_str().unwrap();
    let old_access = first["access_token"].as_str().unwrap();
    assert_eq!(get_status(&client, srv.url("/consumer/home"), new_access).await, StatusCode::OK);
    assert_eq!(
        get_status(&client, srv.url("/consumer/home"), old_access).await,
        StatusCode::UNAUTHORIZED
    );

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": first["refresh_token"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    for body in [json!({ "refresh_token": "" }), json!({})] {
        let res = client.post(srv.url("/auth/refresh")).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn revoke_kills_every_session_of_the_caller() {
    let srv = server().await;
    srv.seed(Role::Consumer, "c@x.com", "pw").await;
    srv.seed(Role::Consumer, "other@x.com", "pw").await;
    let client = reqwest::Client::new();

    let a = login(&client, &srv, "consumer", "c@x.com", "pw").await;
    let b = login(&client, &srv, "consumer", "c@x.com", "pw").await;
    let other = login(&client, &srv, "consumer", "other@x.com", "pw").await;

    let res = client
        .post(srv.url("/auth/revoke"))
        .bearer_auth(a["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    for s in [&a, &b] {
        assert_eq!(
            get_status(&client, srv.url("/consumer/home"), s["access_token"].as_str().unwrap()).await,
            StatusCode::UNAUTHORIZED
        );
        let res = client
            .post(srv.url("/auth/refresh"))
            .json(&json!({ "refresh_token": s["refresh_token"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(
        get_status(&client, srv.url("/consumer/home"), other["access_token"].as_str().unwrap()).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn admin_deactivates_account() {
    let srv = server().await;
    srv.seed(Role::Admin, "admin@x.com", "admin-pw").await;
    let consumer_id = srv.seed(Role::Consumer, "c@x.com", "pw").await;
    let client = reqwest::Client::new();

    let admin = login(&client, &srv, "admin", "admin@x.com", "admin-pw").await;
    let consumer = login(&client, &srv, "consumer", "c@x.com", "pw").await;
    let consumer_access = consumer["access_token"].as_str().unwrap();

    // Consumers cannot use the admin endpoint.
    let res = client
        .delete(srv.url(&format!("/admin/accounts/consumer/{consumer_id}")))
        .bearer_auth(consumer_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(srv.url(&format!("/admin/accounts/consumer/{consumer_id}")))
        .bearer_auth(admin["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["deleted_at"].is_string());
    assert!(body.get("password_hash").is_none());

    assert_eq!(
        get_status(&client, srv.url("/consumer/home"), consumer_access).await,
        StatusCode::UNAUTHORIZED
    );
    let res = client
        .post(srv.url("/auth/consumer/login"))
        .json(&json!({ "email": "c@x.com", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .delete(srv.url("/admin/accounts/consumer/not-a-uuid"))
        .bearer_auth(admin["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn google_login_redirects_with_role_state() {
    let srv = server_with_google("g@x.com", "G", AdminFederation::Disabled).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let res = client.get(srv.url("/auth/google/login/supplier")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = res.headers()["location"].to_str().unwrap();
    assert!(location.contains("state=supplier"));

    let res = client.get(srv.url("/auth/google/login/root")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn google_callback_creates_account_and_issues_tokens() {
    let srv = server_with_google("new@x.com", "New Person", AdminFederation::Disabled).await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/auth/google/callback/consumer?code=good-code&state=consumer"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["login_method"], "google");
    assert_eq!(body["role"], "consumer");
    assert_eq!(body["email"], "new@x.com");
    assert_eq!(body["name"], "New Person");

    let access = body["access_token"].as_str().unwrap();
    assert_eq!(get_status(&client, srv.url("/consumer/home"), access).await, StatusCode::OK);

    // The federated account has no password.
    let res = client
        .post(srv.url("/auth/consumer/login"))
        .json(&json!({ "email": "new@x.com", "password": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn google_callback_failures() {
    let srv = server_with_google("boss@x.com", "Boss", AdminFederation::Disabled).await;
    let client = reqwest::Client::new();

    let cases = [
        ("/auth/google/callback/consumer?state=consumer", StatusCode::BAD_REQUEST),
        ("/auth/google/callback/consumer?code=good-code&state=supplier", StatusCode::BAD_REQUEST),
        ("/auth/google/callback/consumer?code=good-code", StatusCode::BAD_REQUEST),
        ("/auth/google/callback/consumer?code=stale&state=consumer", StatusCode::BAD_GATEWAY),
        ("/auth/google/callback/admin?code=good-code&state=admin", StatusCode::FORBIDDEN),
    ];
    for (path, expected) in cases {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), expected, "{path}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert!(body["error"].is_string(), "{path}");
    }
}

#[tokio::test]
async fn admin_federation_allow_list() {
    let policy = AdminFederation::AllowList(vec!["boss@x.com".to_string()]);
    let srv = server_with_google("boss@x.com", "Boss", policy).await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/auth/google/callback/admin?code=good-code&state=admin"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let access = body["access_token"].as_str().unwrap();
    assert_eq!(get_status(&client, srv.url("/admin/dashboard"), access).await, StatusCode::OK);
}

#[tokio::test]
async fn google_routes_without_provider_are_not_found() {
    let srv = server().await;
    let res = reqwest::get(srv.url("/auth/google/login/consumer")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ledger_outage_is_a_server_error_on_writes_and_fails_closed_on_reads() {
    let auth = auth_service_with_ledger(default_access_ttl(), Arc::new(UnreachableLedger));
    let srv = TestServer::spawn(AppServices::new(auth, None)).await;
    srv.seed(Role::Consumer, "c@x.com", "pw").await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/auth/consumer/login"))
        .json(&json!({ "email": "c@x.com", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "storage_error");

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": "whatever" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // A well-formed token still cannot be checked against the ledger.
    let token = TokenIssuer::new(SigningKey::new(SECRET).unwrap(), default_access_ttl())
        .unwrap()
        .issue_access(AccountId::new(), Role::Consumer, Utc::now())
        .unwrap()
        .token;
    assert_eq!(
        get_status(&client, srv.url("/consumer/home"), &token).await,
        StatusCode::UNAUTHORIZED
    );
}
