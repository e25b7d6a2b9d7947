use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use panaderia_core::domain::user::{User, UserId, UserRole, UserStatus};

use super::{parse_timestamp, RepositoryError, UserStore};
use crate::DbPool;

/// Registration payload. The password arrives already hashed; plain-text
/// passwords never reach the persistence layer.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
}

#[derive(Clone, Debug)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: Option<String>,
}

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for SqlUserRepository {
    async fn create(&self, user: NewUser) -> Result<UserId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (first_name, last_name, email, phone, password_hash, registered_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(UserId(result.last_insert_rowid()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, phone, role, status,
                    registered_at, last_login_at
             FROM users WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, phone, role, status,
                    registered_at, last_login_at, password_hash
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(|row| Ok((user_from_row(row)?, row.try_get("password_hash")?)))
            .transpose()
    }

    async fn email_in_use(
        &self,
        email: &str,
        exclude: Option<UserId>,
    ) -> Result<bool, RepositoryError> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(exclude.map(|id| id.0).unwrap_or(-1))
                .fetch_optional(&self.pool)
                .await?;

        Ok(existing.is_some())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<bool, RepositoryError> {
        let result = match &update.password_hash {
            Some(password_hash) => {
                sqlx::query(
                    "UPDATE users
                     SET first_name = ?, last_name = ?, email = ?, phone = ?, password_hash = ?
                     WHERE id = ?",
                )
                .bind(&update.first_name)
                .bind(&update.last_name)
                .bind(&update.email)
                .bind(&update.phone)
                .bind(password_hash)
                .bind(id.0)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE users SET first_name = ?, last_name = ?, email = ?, phone = ?
                     WHERE id = ?",
                )
                .bind(&update.first_name)
                .bind(&update.last_name)
                .bind(&update.email)
                .bind(&update.phone)
                .bind(id.0)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    let raw_role: String = row.try_get("role")?;
    let raw_status: String = row.try_get("status")?;
    let raw_registered_at: String = row.try_get("registered_at")?;
    let raw_last_login: Option<String> = row.try_get("last_login_at")?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        role: UserRole::from_str(&raw_role)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        status: UserStatus::from_str(&raw_status)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        registered_at: parse_timestamp(&raw_registered_at)?,
        last_login_at: raw_last_login.as_deref().map(parse_timestamp).transpose()?,
    })
}
