//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and creates every table.
//! Schema creation is idempotent and runs on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to one connection: every connection to `:memory:` is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_registered_iris_table(pool).await?;
    create_vocabulary_data_table(pool).await?;
    create_term_type_data_table(pool).await?;
    create_term_data_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the users table
///
/// Passwords are stored as salted SHA-256; API tokens only as their hash.
pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            token_hash TEXT UNIQUE,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the registered_iris table
///
/// Absent term type and term are stored as `''` so that the composite
/// uniqueness constraint applies to them (NULLs never collide in SQLite).
pub async fn create_registered_iris_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS registered_iris (
            guid TEXT PRIMARY KEY,
            vocabulary_path TEXT NOT NULL,
            term_type TEXT NOT NULL DEFAULT ''
                CHECK (term_type IN ('', 'verbs', 'activityTypes', 'attachments', 'extensions')),
            term TEXT NOT NULL DEFAULT '',
            accepted INTEGER NOT NULL DEFAULT 0,
            reviewed INTEGER NOT NULL DEFAULT 0,
            full_iri TEXT NOT NULL UNIQUE,
            owner_id TEXT REFERENCES users(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (vocabulary_path, term_type, term, owner_id),
            CHECK (term = '' OR term_type <> '')
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_registered_iris_pending ON registered_iris(reviewed, accepted)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_registered_iris_owner ON registered_iris(owner_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the vocabulary_data table
///
/// Sequence fields are JSON arrays of strings.
pub async fn create_vocabulary_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vocabulary_data (
            guid TEXT PRIMARY KEY,
            base_iri_id TEXT UNIQUE REFERENCES registered_iris(guid) ON DELETE SET NULL,
            rdf_type TEXT NOT NULL DEFAULT '',
            dcterms_created TIMESTAMP,
            dcterms_modified TIMESTAMP,
            foaf_name TEXT NOT NULL DEFAULT '[]',
            prov_specialization_of TEXT NOT NULL DEFAULT '[]',
            prov_was_generated_by TEXT NOT NULL DEFAULT '',
            prov_was_revision_of TEXT NOT NULL DEFAULT '[]',
            skos_alt_label TEXT NOT NULL DEFAULT '[]',
            skos_broader TEXT NOT NULL DEFAULT '[]',
            skos_broad_match TEXT NOT NULL DEFAULT '[]',
            skos_definition TEXT NOT NULL DEFAULT '[]',
            skos_editorial_note TEXT NOT NULL DEFAULT '[]',
            skos_example TEXT NOT NULL DEFAULT '[]',
            skos_history_note TEXT NOT NULL DEFAULT '[]',
            skos_in_scheme TEXT NOT NULL DEFAULT '',
            skos_narrower TEXT NOT NULL DEFAULT '[]',
            skos_narrow_match TEXT NOT NULL DEFAULT '[]',
            skos_pref_label TEXT NOT NULL DEFAULT '[]',
            skos_related_match TEXT NOT NULL DEFAULT '[]',
            skos_scope_note TEXT NOT NULL DEFAULT '[]',
            xapi_closely_related_natural_language_term TEXT NOT NULL DEFAULT '[]',
            xapi_referenced_by TEXT NOT NULL DEFAULT '',
            xapi_third_party_label TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vocabulary_data_created ON vocabulary_data(dcterms_created)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vocabulary_data_modified ON vocabulary_data(dcterms_modified)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_term_type_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS term_type_data (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            vocabulary_data_id TEXT NOT NULL REFERENCES vocabulary_data(guid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_term_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS term_data (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            term_type_data_id TEXT NOT NULL REFERENCES term_type_data(guid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.expect("second schema creation should succeed");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "registered_iris",
                "schema_version",
                "term_data",
                "term_type_data",
                "users",
                "vocabulary_data"
            ]
        );
    }

    #[tokio::test]
    async fn test_term_requires_term_type_at_store_level() {
        let pool = init_memory_database().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO registered_iris (guid, vocabulary_path, term_type, term, full_iri, created_at, updated_at)
             VALUES ('g1', 'adl', '', 'run', 'https://example.org/adl/run', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "CHECK constraint should reject a term without a type");
    }
}
