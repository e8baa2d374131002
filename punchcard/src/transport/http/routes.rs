//! HTTP route handlers.
//!
//! `/ping` and `/login` are public. Everything under `/pack/` runs behind the
//! bearer-token middleware, which resolves the principal and injects it as a
//! typed extension; handlers pass it to the core explicitly.

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::auth::{AuthError, Login, TokenAuthority, UserDirectory};
use crate::service::{PackError, PackService};

/// Authenticated principal, resolved by the token middleware.
#[derive(Debug, Clone)]
pub struct Principal(pub String);

#[derive(Clone)]
pub struct AppState {
    pub packs: Arc<PackService>,
    pub tokens: Arc<TokenAuthority>,
    pub users: Arc<UserDirectory>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize, Default)]
struct NewPackRequest {
    amount: Option<u32>,
}

fn error_body(message: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message.to_string() }))
}

fn pack_error(err: PackError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        PackError::NotFound | PackError::NoActivePack => StatusCode::NOT_FOUND,
        PackError::Exhausted | PackError::AlreadyActive(_) => StatusCode::CONFLICT,
        PackError::CorruptRecord(_) | PackError::Persistence(_) => {
            tracing::error!(error = %err, "pack operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, error_body(err))
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the principal from the Authorization header or reject with 401.
async fn require_principal(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(token) = bearer_token(&request) else {
        return (StatusCode::UNAUTHORIZED, error_body("invalid authorization header"))
            .into_response();
    };

    let principal = match state.tokens.verify(token) {
        Ok(principal) => principal,
        Err(e) => {
            tracing::debug!(error = %e, "rejected request token");
            return (StatusCode::UNAUTHORIZED, error_body("invalid token")).into_response();
        }
    };

    request.extensions_mut().insert(Principal(principal));
    next.run(request).await
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "pong" }))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let login = match state.users.login(&request.username, &request.password) {
        Ok(login) => login,
        Err(AuthError::InvalidCredentials) => {
            return (StatusCode::UNAUTHORIZED, error_body("auth failed"));
        }
        Err(e) => {
            tracing::error!(error = %e, "login failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body("login failed"));
        }
    };

    let token = match state.tokens.mint(&request.username) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "failed to mint token");
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body("login failed"));
        }
    };

    let message = match login {
        Login::Registered => format!("user {} created", request.username),
        Login::Authenticated => "authenticated".to_string(),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": message, "jwt": token })),
    )
}

async fn new_pack(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Option<Json<NewPackRequest>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    match state.packs.new_pack(&principal, request.amount).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "remaining": receipt.remaining,
                "created_at": receipt.created_at,
            })),
        ),
        Err(e) => pack_error(e),
    }
}

async fn use_pack(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.packs.use_pack(&principal).await {
        Ok(remaining) => (
            StatusCode::OK,
            Json(serde_json::json!({ "remaining": remaining })),
        ),
        Err(e) => pack_error(e),
    }
}

async fn remaining(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.packs.remaining(&principal) {
        Ok(remaining) => (
            StatusCode::OK,
            Json(serde_json::json!({ "remaining": remaining })),
        ),
        Err(e) => pack_error(e),
    }
}

async fn details(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.packs.details(&principal) {
        Ok(receipt) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "remaining": receipt.remaining,
                "created_at": receipt.created_at,
            })),
        ),
        Err(e) => pack_error(e),
    }
}

async fn history(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.packs.history(&principal) {
        Ok(history) => (
            StatusCode::OK,
            Json(serde_json::json!({ "history": history })),
        ),
        Err(e) => pack_error(e),
    }
}

pub fn routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/pack/new", post(new_pack))
        .route("/pack/use", post(use_pack))
        .route("/pack/remaining", get(remaining))
        .route("/pack/details", get(details))
        .route("/pack/history", get(history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_principal,
        ));

    Router::new()
        .route("/ping", get(ping))
        .route("/login", post(login))
        .merge(protected)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let store = Arc::new(MemoryStore::new());
        AppState {
            packs: Arc::new(PackService::new(
                Arc::clone(&store) as Arc<dyn crate::store::Store>
            )),
            tokens: Arc::new(TokenAuthority::new(b"test-secret")),
            users: Arc::new(UserDirectory::new(store)),
        }
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(
        state: &AppState,
        request: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let response = routes(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        (status, response_json(response).await)
    }

    async fn login_token(state: &AppState, username: &str) -> String {
        let (status, json) = send(
            state,
            Request::post("/login")
                .header("content-type", "application/json")
                .body(Body::from(format!(
                    r#"{{"username":"{username}","password":"hunter2"}}"#
                )))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        json["jwt"].as_str().unwrap().to_string()
    }

    fn authed(method: &str, uri: &str, token: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"));
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn ping_returns_pong() {
        let state = test_state();
        let (status, json) = send(
            &state,
            Request::get("/ping").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "pong");
    }

    #[tokio::test]
    async fn login_creates_user_and_returns_token() {
        let state = test_state();
        let (status, json) = send(
            &state,
            Request::post("/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"username":"alice","password":"hunter2"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "user alice created");
        assert!(json["jwt"].is_string());
    }

    #[tokio::test]
    async fn login_wrong_password_is_unauthorized() {
        let state = test_state();
        login_token(&state, "alice").await;

        let (status, json) = send(
            &state,
            Request::post("/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"username":"alice","password":"wrong"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "auth failed");
    }

    #[tokio::test]
    async fn login_empty_credentials_are_unauthorized() {
        let state = test_state();
        let (status, _) = send(
            &state,
            Request::post("/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"username":"","password":""}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn pack_routes_require_a_token() {
        let state = test_state();

        let (status, json) = send(
            &state,
            Request::get("/pack/remaining").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "invalid authorization header");

        let (status, json) = send(
            &state,
            Request::get("/pack/remaining")
                .header("authorization", "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "invalid token");
    }

    #[tokio::test]
    async fn new_pack_returns_remaining_and_created_at() {
        let state = test_state();
        let token = login_token(&state, "alice").await;

        let (status, json) = send(
            &state,
            authed("POST", "/pack/new", &token, Some(r#"{"amount":5}"#)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["remaining"], 5);
        assert!(json["created_at"].is_string());
    }

    #[tokio::test]
    async fn new_pack_without_body_defaults_to_ten() {
        let state = test_state();
        let token = login_token(&state, "alice").await;

        let (status, json) = send(&state, authed("POST", "/pack/new", &token, None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["remaining"], 10);
    }

    #[tokio::test]
    async fn new_pack_while_active_conflicts() {
        let state = test_state();
        let token = login_token(&state, "alice").await;
        send(&state, authed("POST", "/pack/new", &token, None)).await;

        let (status, json) = send(&state, authed("POST", "/pack/new", &token, None)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("alice"));
    }

    #[tokio::test]
    async fn use_without_pack_is_not_found() {
        let state = test_state();
        let token = login_token(&state, "alice").await;

        let (status, _) = send(&state, authed("POST", "/pack/use", &token, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn use_exhausted_pack_conflicts() {
        let state = test_state();
        let token = login_token(&state, "alice").await;
        send(
            &state,
            authed("POST", "/pack/new", &token, Some(r#"{"amount":1}"#)),
        )
        .await;
        send(&state, authed("POST", "/pack/use", &token, None)).await;

        let (status, _) = send(&state, authed("POST", "/pack/use", &token, None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn details_of_exhausted_pack_is_not_found() {
        let state = test_state();
        let token = login_token(&state, "alice").await;
        send(
            &state,
            authed("POST", "/pack/new", &token, Some(r#"{"amount":1}"#)),
        )
        .await;
        send(&state, authed("POST", "/pack/use", &token, None)).await;

        let (status, _) = send(&state, authed("GET", "/pack/details", &token, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn packs_are_scoped_to_the_token_principal() {
        let state = test_state();
        let alice = login_token(&state, "alice").await;
        let bob = login_token(&state, "bob").await;

        send(
            &state,
            authed("POST", "/pack/new", &alice, Some(r#"{"amount":5}"#)),
        )
        .await;

        let (status, _) = send(&state, authed("GET", "/pack/remaining", &bob, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn full_pack_lifecycle_over_http() {
        let state = test_state();
        let token = login_token(&state, "alice").await;

        let (status, json) = send(
            &state,
            authed("POST", "/pack/new", &token, Some(r#"{"amount":3}"#)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["remaining"], 3);

        for expected in [2, 1, 0] {
            let (status, json) =
                send(&state, authed("POST", "/pack/use", &token, None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["remaining"], expected);
        }

        let (status, json) = send(&state, authed("GET", "/pack/history", &token, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["history"].as_array().unwrap().len(), 3);

        let (status, _) = send(&state, authed("POST", "/pack/use", &token, None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Exhausted packs can be renewed; the history starts over.
        let (status, json) = send(
            &state,
            authed("POST", "/pack/new", &token, Some(r#"{"amount":5}"#)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["remaining"], 5);

        let (_, json) = send(&state, authed("GET", "/pack/history", &token, None)).await;
        assert_eq!(json["history"].as_array().unwrap().len(), 0);
    }
}
