//! User accounts and API tokens
//!
//! Tokens are handed out once and stored only as a hash; issuing a new token
//! invalidates the previous one.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use vocab_common::credentials::{generate_salt, generate_token, hash_password, hash_token, verify_password};
use vocab_common::db::{ReviewStatus, User};
use vocab_common::{Error, Result};

use crate::db::{iris, users};

/// Registration form
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirmation: &'a str,
}

/// An account together with a freshly issued plaintext token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user: User,
    pub token: String,
}

/// Account summary with registration counts by review state
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
}

pub async fn register(pool: &SqlitePool, account: NewAccount<'_>) -> Result<IssuedToken> {
    let username = account.username.trim();
    let email = account.email.trim();

    if username.is_empty() {
        return Err(Error::Validation("Username is required".to_string()));
    }
    if !email.contains('@') {
        return Err(Error::Validation(format!("'{}' is not an email address", email)));
    }
    if account.password.is_empty() {
        return Err(Error::Validation("Password is required".to_string()));
    }
    if account.password != account.password_confirmation {
        return Err(Error::Validation("Passwords do not match".to_string()));
    }

    if users::username_exists(pool, username).await? {
        return Err(Error::Duplicate(format!("User {} already exists", username)));
    }
    if users::email_exists(pool, email).await? {
        return Err(Error::Duplicate(format!("Email {} is already registered", email)));
    }

    let salt = generate_salt();
    let token = generate_token();
    let user = users::insert_user(
        pool,
        username,
        email,
        &hash_password(account.password, &salt),
        &salt,
        &hash_token(&token),
    )
    .await?;

    info!(username = %user.username, "User registered");
    Ok(IssuedToken { user, token })
}

/// Check credentials and rotate the account's token
pub async fn issue_token(pool: &SqlitePool, username: &str, password: &str) -> Result<IssuedToken> {
    let invalid = || Error::Unauthorized("Invalid username or password".to_string());

    let stored = users::load_credentials(pool, username)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(password, &stored.password_salt, &stored.password_hash) {
        warn!(username, "Rejected token request with wrong password");
        return Err(invalid());
    }

    let token = generate_token();
    users::set_token_hash(pool, stored.user.guid, &hash_token(&token)).await?;

    Ok(IssuedToken {
        user: stored.user,
        token,
    })
}

/// Resolve a bearer token to its account
pub async fn authenticate_token(pool: &SqlitePool, token: &str) -> Result<User> {
    users::find_by_token_hash(pool, &hash_token(token))
        .await?
        .ok_or_else(|| Error::Unauthorized("Invalid or expired token".to_string()))
}

pub async fn profile(pool: &SqlitePool, user: User) -> Result<Profile> {
    let registrations = iris::list_by_owner(pool, user.guid).await?;
    let count = |status: ReviewStatus| registrations.iter().filter(|i| i.status() == status).count();

    Ok(Profile {
        pending: count(ReviewStatus::Pending),
        accepted: count(ReviewStatus::Accepted),
        rejected: count(ReviewStatus::Rejected),
        user,
    })
}

pub async fn grant_admin(pool: &SqlitePool, username: &str) -> Result<()> {
    if !users::set_admin(pool, username, true).await? {
        return Err(Error::NotFound(format!("User {} not found", username)));
    }
    info!(username, "Administrator capability granted");
    Ok(())
}

/// Delete an account; its registrations stay with no owner
pub async fn remove_user(pool: &SqlitePool, username: &str) -> Result<()> {
    if !users::delete_user(pool, username).await? {
        return Err(Error::NotFound(format!("User {} not found", username)));
    }
    info!(username, "User removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::{self, IriSource};
    use vocab_common::db::init_memory_database;
    use vocab_common::IriComponents;

    fn account<'a>(username: &'a str, email: &'a str) -> NewAccount<'a> {
        NewAccount {
            username,
            email,
            password: "secret",
            password_confirmation: "secret",
        }
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let pool = init_memory_database().await.unwrap();

        let issued = register(&pool, account("alice", "alice@example.org")).await.unwrap();
        let user = authenticate_token(&pool, &issued.token).await.unwrap();

        assert_eq!(user.username, "alice");
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn test_register_rejects_taken_username_and_email() {
        let pool = init_memory_database().await.unwrap();
        register(&pool, account("alice", "alice@example.org")).await.unwrap();

        let err = register(&pool, account("alice", "other@example.org")).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate(ref m) if m.contains("User alice")));

        let err = register(&pool, account("bob", "alice@example.org")).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate(ref m) if m.contains("Email alice@example.org")));
    }

    #[tokio::test]
    async fn test_register_requires_matching_passwords() {
        let pool = init_memory_database().await.unwrap();
        let mut new = account("alice", "alice@example.org");
        new.password_confirmation = "different";

        assert!(matches!(register(&pool, new).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_issue_token_rotates() {
        let pool = init_memory_database().await.unwrap();
        let first = register(&pool, account("alice", "alice@example.org")).await.unwrap();

        let second = issue_token(&pool, "alice", "secret").await.unwrap();

        assert!(authenticate_token(&pool, &second.token).await.is_ok());
        assert!(matches!(
            authenticate_token(&pool, &first.token).await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            issue_token(&pool, "alice", "wrong").await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_user_orphans_registrations() {
        let pool = init_memory_database().await.unwrap();
        let issued = register(&pool, account("alice", "alice@example.org")).await.unwrap();
        registry::create(
            &pool,
            "https://example.org/",
            IriSource::Components(IriComponents::new("adl", None, None)),
            issued.user.guid,
        )
        .await
        .unwrap();

        remove_user(&pool, "alice").await.unwrap();

        let iri = iris::find_by_address(&pool, "https://example.org/adl")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(iri.owner_id, None);
        assert!(matches!(remove_user(&pool, "alice").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_profile_counts() {
        let pool = init_memory_database().await.unwrap();
        let issued = register(&pool, account("alice", "alice@example.org")).await.unwrap();
        registry::create(
            &pool,
            "https://example.org/",
            IriSource::Components(IriComponents::new("adl", None, None)),
            issued.user.guid,
        )
        .await
        .unwrap();

        let profile = profile(&pool, issued.user).await.unwrap();
        assert_eq!((profile.pending, profile.accepted, profile.rejected), (1, 0, 0));
    }
}
