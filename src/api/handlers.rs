use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use super::auth::{token_from_headers, AuthManager, SESSION_COOKIE};
use super::types::{parse_body, ApiResponse, LoginRequest, LoginResponse};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::promotion::PromotionCommitter;

/// Application state shared across handlers
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub auth: AuthManager,
    pub committer: PromotionCommitter,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: &ServerConfig) -> Self {
        let db = Arc::new(db);
        Self {
            auth: AuthManager::new(db.clone(), config.session_ttl),
            committer: PromotionCommitter::new(config.commit_attempts),
            db,
        }
    }
}

/// Health check endpoint
pub async fn health() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::ok(json!({ "status": "ok" })))
}

/// Login endpoint: returns the token and sets it as the session cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let req: LoginRequest = parse_body(body)?;
    let token = state.auth.authenticate(&req.username, &req.password).await?;
    let user = state.auth.resolve_token(&token).await?;

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token
    );
    let body = ApiResponse::ok(LoginResponse {
        token,
        username: user.username,
        role: user.role.as_str(),
    });

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Logout endpoint: revokes the session and clears the cookie
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response> {
    let token = token_from_headers(&headers).ok_or(ServerError::Unauthorized)?;
    state.auth.revoke_token(&token).await?;

    let cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    let body = ApiResponse::ok(json!({})).with_message("Logged out");
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

