//! Identity gate: credential accounts and bearer sessions.
//!
//! Every cart, order and account operation resolves the acting user here
//! before touching any state. Sessions are opaque UUID tokens stored in
//! the database and presented as `Authorization: Bearer <token>`.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{is_unique_violation, ApiError, Result};
use crate::models::User;
use crate::AppState;

/// The resolved actor for a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub name: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthenticated)?;
        resolve_session(state.db.pool(), &token)
            .await?
            .ok_or(ApiError::Unauthenticated)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Look up the user behind a session token.
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<Option<CurrentUser>> {
    let row = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT u.id, u.email, u.name
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, email, name)| CurrentUser { id, email, name }))
}

pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<String> {
    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id) VALUES (?, ?)")
        .bind(&token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(token)
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| ApiError::PasswordHash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "a valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password)
         VALUES (?, ?, ?)
         RETURNING id, email, name, created_at",
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("this email is already registered")
        } else {
            e.into()
        }
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    req.validate()?;
    let hash = hash_password(&req.password)?;
    let user = create_user(state.db.pool(), &req.name, &req.email, &hash).await?;
    tracing::info!(user_id = user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "message": "registration complete, please sign in" })),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "a valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>> {
    req.validate()?;
    let pool = state.db.pool();

    let row = sqlx::query_as::<_, (i64, String, String, Option<String>)>(
        "SELECT id, email, name, password FROM users WHERE email = ?",
    )
    .bind(&req.email)
    .fetch_optional(pool)
    .await?;

    // A missing user, a passwordless account and a wrong password are
    // indistinguishable to the caller.
    let invalid = || ApiError::Validation("invalid email or password".to_string());
    let (id, email, name, stored) = row.ok_or_else(invalid)?;
    let hash = stored.ok_or_else(invalid)?;
    if !verify_password(&req.password, &hash) {
        return Err(invalid());
    }

    let token = create_session(pool, id).await?;
    Ok(Json(json!({
        "token": token,
        "user": { "id": id, "email": email, "name": name },
    })))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthenticated)?;
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(&token)
        .execute(state.db.pool())
        .await?;
    Ok(Json(json!({ "message": "signed out" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_db;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("hunter2secret").unwrap();
        assert!(verify_password("hunter2secret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn session_resolves_to_user() {
        let db = test_db().await;
        let hash = hash_password("secret123").unwrap();
        let user = create_user(db.pool(), "Alice", "alice@example.com", &hash)
            .await
            .unwrap();

        let token = create_session(db.pool(), user.id).await.unwrap();
        let actor = resolve_session(db.pool(), &token).await.unwrap().unwrap();
        assert_eq!(actor.id, user.id);
        assert_eq!(actor.email, "alice@example.com");

        assert!(resolve_session(db.pool(), "bogus-token")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = test_db().await;
        let hash = hash_password("secret123").unwrap();
        create_user(db.pool(), "Alice", "alice@example.com", &hash)
            .await
            .unwrap();

        let err = create_user(db.pool(), "Other", "alice@example.com", &hash)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
