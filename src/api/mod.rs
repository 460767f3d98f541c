pub mod admin;
pub mod auth;
pub mod handlers;
pub mod homeroom;
pub mod types;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// All routes, before state is attached
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health))
        // Auth endpoints
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        // Homeroom teacher endpoints
        .route(
            "/homeroom/my-students-for-promotion",
            get(homeroom::my_students_for_promotion),
        )
        .route("/homeroom/propose-students", patch(homeroom::propose_students))
        .route("/homeroom/promote-students", patch(homeroom::promote_students))
        // Admin endpoints
        .route("/admin/promote-students", get(admin::list_pending))
        .route("/admin/promote-students/process", patch(admin::process_promotions))
        .route("/admin/academic-years/active", get(admin::active_academic_year))
        .route(
            "/admin/academic-years/:id/activate",
            patch(admin::activate_academic_year),
        )
        .route("/admin/students/:id/class-history", get(admin::class_history))
        .route("/admin/class-history/:id", patch(admin::correct_class_history))
}

/// The full application with state and request tracing
pub fn app(state: Arc<AppState>) -> Router {
    router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::{app, AppState};
    use crate::config::ServerConfig;
    use crate::db::testing::test_db;

    pub async fn test_state() -> (TempDir, Arc<AppState>) {
        let (dir, db) = test_db().await;
        let state = Arc::new(AppState::new(db, &ServerConfig::default()));
        (dir, state)
    }

    /// Send one request through the router and decode the JSON envelope
    pub async fn send(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

#[cfg(test)]
mod tests {
    use super::auth::Role;
    use super::testing::*;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let (_dir, state) = test_state().await;
        let (status, body) = send(&state, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_logout_revokes() {
        let (_dir, state) = test_state().await;
        state.auth.register_user("admin", "secret", Role::Admin).await.unwrap();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(
                json!({"username": "admin", "password": "secret"}).to_string(),
            ))
            .unwrap();
        let response = super::app(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        let token = cookie
            .trim_start_matches("token=")
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let (status, _) = send(
            &state,
            Method::GET,
            "/admin/academic-years/active",
            Some(&token),
            None,
        )
        .await;
        // Authenticated, just no active year yet
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, Method::POST, "/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &state,
            Method::GET,
            "/admin/academic-years/active",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let (_dir, state) = test_state().await;
        state.auth.register_user("admin", "secret", Role::Admin).await.unwrap();

        let (status, body) = send(
            &state,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"username": "admin", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &state,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"username": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
