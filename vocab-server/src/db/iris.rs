//! Registered IRI database operations

use chrono::Utc;
use sqlx::{Executor, Sqlite};
use uuid::Uuid;
use vocab_common::db::RegisteredIri;
use vocab_common::{Error, IriComponents, Result};

/// Insert a new pending registration
///
/// Unique violations on either the component tuple or the address surface
/// as `ConstraintViolation`.
pub async fn insert_iri<'e, E>(
    executor: E,
    components: &IriComponents,
    full_iri: &str,
    owner_id: Option<Uuid>,
) -> Result<RegisteredIri>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let iri = RegisteredIri {
        guid: Uuid::new_v4(),
        vocabulary_path: components.vocabulary_path.clone(),
        term_type: components.term_type,
        term: components.term.clone(),
        accepted: false,
        reviewed: false,
        full_iri: full_iri.to_string(),
        owner_id,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO registered_iris (
            guid, vocabulary_path, term_type, term, accepted, reviewed,
            full_iri, owner_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 0, 0, ?, ?, ?, ?)
        "#,
    )
    .bind(iri.guid.to_string())
    .bind(&iri.vocabulary_path)
    .bind(components.term_type_str())
    .bind(components.term_str())
    .bind(&iri.full_iri)
    .bind(owner_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .execute(executor)
    .await
    .map_err(|e| {
        Error::from_unique_violation(e, || format!("IRI {} is already registered", full_iri))
    })?;

    Ok(iri)
}

/// Whether any owner has registered this address
pub async fn address_exists<'e, E>(executor: E, full_iri: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registered_iris WHERE full_iri = ?")
        .bind(full_iri)
        .fetch_one(executor)
        .await?;

    Ok(count > 0)
}

pub async fn find_by_address<'e, E>(executor: E, full_iri: &str) -> Result<Option<RegisteredIri>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM registered_iris WHERE full_iri = ?",
        RegisteredIri::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(full_iri)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(RegisteredIri::from_row).transpose()
}

/// Registration owned by the given user
pub async fn find_owned<'e, E>(
    executor: E,
    guid: Uuid,
    owner_id: Uuid,
) -> Result<Option<RegisteredIri>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM registered_iris WHERE guid = ? AND owner_id = ?",
        RegisteredIri::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(guid.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(RegisteredIri::from_row).transpose()
}

/// Oldest pending registration matching the component tuple
pub async fn find_pending_by_components<'e, E>(
    executor: E,
    components: &IriComponents,
) -> Result<Option<RegisteredIri>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        SELECT {} FROM registered_iris
        WHERE vocabulary_path = ? AND term_type = ? AND term = ?
          AND reviewed = 0 AND accepted = 0
        ORDER BY created_at ASC
        LIMIT 1
        "#,
        RegisteredIri::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&components.vocabulary_path)
        .bind(components.term_type_str())
        .bind(components.term_str())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(RegisteredIri::from_row).transpose()
}

/// Record a review decision; only pending rows are updated
///
/// Returns false if the row was no longer pending.
pub async fn mark_reviewed<'e, E>(executor: E, guid: Uuid, accepted: bool) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE registered_iris
        SET accepted = ?, reviewed = 1, updated_at = ?
        WHERE guid = ? AND reviewed = 0
        "#,
    )
    .bind(accepted)
    .bind(Utc::now())
    .bind(guid.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_by_owner<'e, E>(executor: E, owner_id: Uuid) -> Result<Vec<RegisteredIri>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM registered_iris WHERE owner_id = ? ORDER BY created_at ASC",
        RegisteredIri::COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(owner_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.iter().map(RegisteredIri::from_row).collect()
}

pub async fn list_pending<'e, E>(executor: E) -> Result<Vec<RegisteredIri>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM registered_iris WHERE reviewed = 0 AND accepted = 0 ORDER BY created_at ASC",
        RegisteredIri::COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(executor).await?;

    rows.iter().map(RegisteredIri::from_row).collect()
}

const SEARCH_FILTER: &str = r#"
    accepted = 1
    AND (instr(vocabulary_path, ?1) > 0 OR instr(term_type, ?1) > 0 OR instr(term, ?1) > 0)
"#;

/// Number of accepted registrations whose path, term type or term contains `query`
pub async fn count_accepted_matching<'e, E>(executor: E, query: &str) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT COUNT(*) FROM registered_iris WHERE {}", SEARCH_FILTER);
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(query)
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// One page of accepted registrations matching `query`, ordered by address
pub async fn search_accepted<'e, E>(
    executor: E,
    query: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<RegisteredIri>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM registered_iris WHERE {} ORDER BY full_iri ASC LIMIT ?2 OFFSET ?3",
        RegisteredIri::COLUMNS,
        SEARCH_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(query)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

    rows.iter().map(RegisteredIri::from_row).collect()
}
