//! Account store
//!
//! Credentials arrive already hashed by the client and are compared as
//! opaque strings.

use scorewave_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub user_id: i64,
    pub username: String,
}

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an account; a taken username is a `Conflict`
    async fn create_account(&self, username: &str, hashed_password: &str) -> Result<Account>;

    async fn is_username_available(&self, username: &str) -> Result<bool>;

    /// Identity for matching credentials, `None` otherwise
    async fn authenticate(&self, username: &str, hashed_password: &str) -> Result<Option<Account>>;
}

/// SQLite-backed account store (`users` table)
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[async_trait::async_trait]
impl AccountStore for SqliteAccountStore {
    async fn create_account(&self, username: &str, hashed_password: &str) -> Result<Account> {
        require("username", username)?;
        require("hashed_password", hashed_password)?;

        let result = sqlx::query("INSERT INTO users (username, hashed_password) VALUES (?, ?)")
            .bind(username)
            .bind(hashed_password)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                tracing::info!(username, "Account created");
                Ok(Account {
                    user_id: done.last_insert_rowid(),
                    username: username.to_string(),
                })
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(Error::Conflict(
                format!("Username '{}' is already taken", username),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_username_available(&self, username: &str) -> Result<bool> {
        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(taken.is_none())
    }

    async fn authenticate(&self, username: &str, hashed_password: &str) -> Result<Option<Account>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, username FROM users WHERE username = ? AND hashed_password = ?")
                .bind(username)
                .bind(hashed_password)
                .fetch_optional(&self.pool)
                .await?;

        if row.is_none() {
            tracing::debug!(username, "Authentication failed");
        }

        Ok(row.map(|(user_id, username)| Account { user_id, username }))
    }
}
