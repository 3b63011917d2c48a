//! Account management: password change with re-verification.
//!
//! Existing sessions stay valid after a password change.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use validator::Validate;

use crate::auth::{self, CurrentUser};
use crate::error::{ApiError, Result};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "new password must be at least 6 characters"))]
    pub new_password: String,
    #[validate(length(min = 1, message = "password confirmation is required"))]
    pub confirm_password: String,
}

pub async fn change_password(
    pool: &SqlitePool,
    user_id: i64,
    req: &ChangePasswordRequest,
) -> Result<()> {
    if req.new_password != req.confirm_password {
        return Err(ApiError::Validation(
            "new password and confirmation do not match".to_string(),
        ));
    }

    let stored: Option<Option<String>> =
        sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    let stored = stored.ok_or(ApiError::NotFound("user"))?;

    // NULL hash means the account authenticates through an external
    // provider and has no local password.
    let hash = stored.ok_or_else(|| {
        ApiError::Validation("this account has no local password to change".to_string())
    })?;

    if !auth::verify_password(&req.current_password, &hash) {
        return Err(ApiError::Validation(
            "current password is incorrect".to_string(),
        ));
    }

    let new_hash = auth::hash_password(&req.new_password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    tracing::info!(user_id, "password changed");
    Ok(())
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>> {
    req.validate()?;
    change_password(state.db.pool(), user.id, &req).await?;
    Ok(Json(json!({ "message": "password updated" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_db;

    fn request(current: &str, new: &str) -> ChangePasswordRequest {
        ChangePasswordRequest {
            current_password: current.to_string(),
            new_password: new.to_string(),
            confirm_password: new.to_string(),
        }
    }

    async fn seed_password_user(pool: &SqlitePool, password: &str) -> i64 {
        let hash = auth::hash_password(password).unwrap();
        auth::create_user(pool, "Alice", "alice@example.com", &hash)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn change_password_happy_path() {
        let db = test_db().await;
        let pool = db.pool();
        let user = seed_password_user(pool, "oldsecret").await;

        change_password(pool, user, &request("oldsecret", "newsecret"))
            .await
            .unwrap();

        let hash: Option<String> = sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
            .bind(user)
            .fetch_one(pool)
            .await
            .unwrap();
        let hash = hash.unwrap();
        assert!(auth::verify_password("newsecret", &hash));
        assert!(!auth::verify_password("oldsecret", &hash));
    }

    #[tokio::test]
    async fn wrong_current_password_is_rejected() {
        let db = test_db().await;
        let pool = db.pool();
        let user = seed_password_user(pool, "oldsecret").await;

        let err = change_password(pool, user, &request("guessed", "newsecret"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn external_auth_account_cannot_change_password() {
        let db = test_db().await;
        let pool = db.pool();
        let user = crate::testing::seed_user(pool, "sso@example.com").await;

        let err = change_password(pool, user, &request("whatever", "newsecret"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let db = test_db().await;
        let err = change_password(db.pool(), 404, &request("a", "newsecret"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn mismatched_confirmation_is_rejected() {
        let db = test_db().await;
        let pool = db.pool();
        let user = seed_password_user(pool, "oldsecret").await;

        let req = ChangePasswordRequest {
            current_password: "oldsecret".to_string(),
            new_password: "newsecret".to_string(),
            confirm_password: "different".to_string(),
        };
        let err = change_password(pool, user, &req).await.unwrap_err();
        match err {
            ApiError::Validation(msg) => assert!(msg.contains("do not match")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn short_new_password_fails_validation() {
        let req = request("old", "short");
        assert!(req.validate().is_err());
    }
}
