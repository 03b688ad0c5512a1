//! User account database operations

use chrono::Utc;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;
use vocab_common::db::User;
use vocab_common::{Error, Result};

/// Stored password material for a user
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user: User,
    pub password_hash: String,
    pub password_salt: String,
}

pub async fn insert_user<'e, E>(
    executor: E,
    username: &str,
    email: &str,
    password_hash: &str,
    password_salt: &str,
    token_hash: &str,
) -> Result<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = User {
        guid: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        is_admin: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO users (guid, username, email, password_hash, password_salt, is_admin, token_hash, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(user.guid.to_string())
    .bind(&user.username)
    .bind(&user.email)
    .bind(password_hash)
    .bind(password_salt)
    .bind(token_hash)
    .bind(user.created_at)
    .execute(executor)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::Duplicate(format!("User {} or email {} is already registered", username, email))
        }
        _ => Error::Database(e),
    })?;

    Ok(user)
}

pub async fn username_exists<'e, E>(executor: E, username: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(executor)
        .await?;
    Ok(count > 0)
}

pub async fn email_exists<'e, E>(executor: E, email: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(executor)
        .await?;
    Ok(count > 0)
}

pub async fn find_by_id<'e, E>(executor: E, guid: Uuid) -> Result<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE guid = ?", User::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(guid.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn find_by_token_hash<'e, E>(executor: E, token_hash: &str) -> Result<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE token_hash = ?", User::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(token_hash)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn load_credentials<'e, E>(executor: E, username: &str) -> Result<Option<StoredCredentials>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {}, password_hash, password_salt FROM users WHERE username = ?",
        User::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(row) => Ok(Some(StoredCredentials {
            user: User::from_row(&row)?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
        })),
        None => Ok(None),
    }
}

pub async fn set_token_hash<'e, E>(executor: E, guid: Uuid, token_hash: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE users SET token_hash = ? WHERE guid = ?")
        .bind(token_hash)
        .bind(guid.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Returns false if no such user exists
pub async fn set_admin<'e, E>(executor: E, username: &str, is_admin: bool) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE users SET is_admin = ? WHERE username = ?")
        .bind(is_admin)
        .bind(username)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Remove an account; its registrations keep existing without an owner
pub async fn delete_user<'e, E>(executor: E, username: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM users WHERE username = ?")
        .bind(username)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}
