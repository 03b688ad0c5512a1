//! Registry operations
//!
//! Each mutating operation opens its own transaction and returns the events
//! that must be dispatched once it has committed.

pub mod accounts;
pub mod csv_ingest;
pub mod metadata;
pub mod registry;
pub mod review;

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use vocab_common::db::{init_memory_database, User};

    use crate::db::users;

    pub const DOMAIN: &str = "https://example.org/";

    pub async fn test_pool_with_user() -> (SqlitePool, User) {
        let pool = init_memory_database().await.unwrap();
        let user = users::insert_user(&pool, "alice", "alice@example.org", "hash", "salt", "token-a")
            .await
            .unwrap();
        (pool, user)
    }

    pub async fn add_admin(pool: &SqlitePool) -> User {
        let mut admin = users::insert_user(pool, "root", "root@example.org", "hash", "salt", "token-r")
            .await
            .unwrap();
        users::set_admin(pool, "root", true).await.unwrap();
        admin.is_admin = true;
        admin
    }
}
