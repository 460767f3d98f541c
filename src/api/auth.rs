//! Authentication and authorization module.
//!
//! Provides password login, cookie/bearer session tokens and the
//! `CurrentUser` extractor used by every protected handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use sha2::{Digest, Sha256};

use super::AppState;
use crate::db::entities::{session, user};
use crate::db::now_unix;
use crate::error::{Result, ServerError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "token";

/// Account role
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Tutor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Tutor => "TUTOR",
            Role::Student => "STUDENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Role::Admin),
            "TUTOR" => Some(Role::Tutor),
            "STUDENT" => Some(Role::Student),
            _ => None,
        }
    }
}

/// The authenticated caller
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    /// Wrong role is a 403, not a 401: the session itself is valid
    pub fn require(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(ServerError::Forbidden)
        }
    }
}

/// Hash a password with salt
fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"homeroom-server-salt:");
    hasher.update(password.as_bytes());
    hex(&hasher.finalize())
}

fn hash_token(token: &str) -> String {
    hex(&Sha256::digest(token.as_bytes()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generate a session token
fn generate_token() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut hasher = Sha256::new();

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    hasher.update(timestamp.to_le_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(format!("{:?}", std::thread::current().id()).as_bytes());
    hasher.update(std::process::id().to_le_bytes());

    BASE64.encode(hasher.finalize())
}

/// Pull the session token from the `token` cookie or a Bearer header
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|h| h.to_str().ok()) {
        for part in cookie_header.split(';') {
            if let Some(token) = part.trim().strip_prefix("token=") {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Authentication manager backed by the `users` and `sessions` tables
pub struct AuthManager {
    db: Arc<DatabaseConnection>,
    session_ttl: Duration,
}

impl AuthManager {
    pub fn new(db: Arc<DatabaseConnection>, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    /// Create the bootstrap admin account if it is missing
    pub async fn ensure_admin_user(&self, username: &str, password: &str) -> Result<()> {
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?;
        if existing.is_none() {
            self.register_user(username, password, Role::Admin).await?;
            tracing::info!("Created bootstrap admin user '{}'", username);
        }
        Ok(())
    }

    pub async fn register_user(&self, username: &str, password: &str, role: Role) -> Result<user::Model> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ServerError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let user = user::ActiveModel {
            username: Set(username.trim().to_string()),
            password_hash: Set(hash_password(password)),
            role: Set(role.as_str().to_string()),
            created_at: Set(now_unix()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(user)
    }

    /// Verify credentials and open a session. Returns the raw token.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String> {
        let user = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?
            .ok_or(ServerError::Unauthorized)?;

        if user.password_hash != hash_password(password) {
            return Err(ServerError::Unauthorized);
        }

        let token = self.open_session(user.id).await?;
        tracing::debug!("User '{}' logged in", user.username);
        Ok(token)
    }

    /// Store a new session for `user_id` and return its raw token
    pub async fn open_session(&self, user_id: i32) -> Result<String> {
        let token = generate_token();
        let now = now_unix();
        session::ActiveModel {
            user_id: Set(user_id),
            token_hash: Set(hash_token(&token)),
            created_at: Set(now),
            expires_at: Set(now + self.session_ttl.as_secs() as i64),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(token)
    }

    /// Resolve a session token to its user. Unknown or expired tokens are 401.
    pub async fn resolve_token(&self, token: &str) -> Result<CurrentUser> {
        let (session, user) = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .find_also_related(user::Entity)
            .one(self.db.as_ref())
            .await?
            .ok_or(ServerError::Unauthorized)?;

        if session.expires_at <= now_unix() {
            return Err(ServerError::Unauthorized);
        }
        let user = user.ok_or(ServerError::Unauthorized)?;
        let role = Role::parse(&user.role).ok_or_else(|| {
            ServerError::Internal(format!("user {} has unknown role {:?}", user.id, user.role))
        })?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            role,
        })
    }

    /// Revoke a session token
    pub async fn revoke_token(&self, token: &str) -> Result<()> {
        session::Entity::delete_many()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Cleanup expired sessions
    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        let result = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(now_unix()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(ServerError::Unauthorized)?;
        state.auth.resolve_token(&token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_db;
    use axum::http::HeaderValue;

    #[test]
    fn test_password_hash() {
        let hash1 = hash_password("test123");
        let hash2 = hash_password("test123");
        let hash3 = hash_password("different");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=abc123"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn test_require_role() {
        let user = CurrentUser {
            id: 1,
            username: "wali".to_string(),
            role: Role::Tutor,
        };
        assert!(user.require(Role::Tutor).is_ok());
        assert!(matches!(user.require(Role::Admin), Err(ServerError::Forbidden)));
    }

    #[tokio::test]
    async fn test_login_and_resolve() {
        let (_dir, db) = test_db().await;
        let auth = AuthManager::new(Arc::new(db), Duration::from_secs(3600));
        auth.ensure_admin_user("admin", "admin123").await.unwrap();
        // Second call must not try to insert a duplicate
        auth.ensure_admin_user("admin", "admin123").await.unwrap();

        let token = auth.authenticate("admin", "admin123").await.unwrap();
        let current = auth.resolve_token(&token).await.unwrap();
        assert_eq!(current.username, "admin");
        assert_eq!(current.role, Role::Admin);

        assert!(matches!(
            auth.authenticate("admin", "wrong").await,
            Err(ServerError::Unauthorized)
        ));
        assert!(matches!(
            auth.authenticate("nobody", "admin123").await,
            Err(ServerError::Unauthorized)
        ));
        assert!(matches!(
            auth.resolve_token("bogus").await,
            Err(ServerError::Unauthorized)
        ));

        auth.revoke_token(&token).await.unwrap();
        assert!(auth.resolve_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let (_dir, db) = test_db().await;
        let auth = AuthManager::new(Arc::new(db), Duration::from_secs(0));
        auth.register_user("wali", "secret", Role::Tutor).await.unwrap();

        let token = auth.authenticate("wali", "secret").await.unwrap();
        assert!(matches!(
            auth.resolve_token(&token).await,
            Err(ServerError::Unauthorized)
        ));
        assert_eq!(auth.cleanup_expired_sessions().await.unwrap(), 1);
    }
}
