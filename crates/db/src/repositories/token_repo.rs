//! Repository for the `user_tokens` credential table.

use sqlx::PgPool;

use crate::models::token::UserToken;

const COLUMNS: &str = "user_uid, token, created_at, updated_at";

pub struct TokenRepo;

impl TokenRepo {
    pub async fn find_by_user(pool: &PgPool, user_uid: &str) -> Result<Option<UserToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_tokens WHERE user_uid = $1");
        sqlx::query_as::<_, UserToken>(&query)
            .bind(user_uid)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace the token for a user.
    pub async fn upsert(pool: &PgPool, user_uid: &str, token: &str) -> Result<UserToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_tokens (user_uid, token) VALUES ($1, $2) \
             ON CONFLICT (user_uid) DO UPDATE SET token = EXCLUDED.token, updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserToken>(&query)
            .bind(user_uid)
            .bind(token)
            .fetch_one(pool)
            .await
    }
}
