//! Term type and term tag operations

use chrono::Utc;
use sqlx::{Executor, Sqlite};
use uuid::Uuid;
use vocab_common::db::{TermData, TermTypeData};
use vocab_common::Result;

pub async fn insert_term_type<'e, E>(
    executor: E,
    vocabulary_data_id: Uuid,
    name: &str,
) -> Result<TermTypeData>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = TermTypeData {
        guid: Uuid::new_v4(),
        name: name.to_string(),
        vocabulary_data_id,
    };

    sqlx::query(
        "INSERT INTO term_type_data (guid, name, vocabulary_data_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(record.guid.to_string())
    .bind(&record.name)
    .bind(vocabulary_data_id.to_string())
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(record)
}

pub async fn insert_term<'e, E>(executor: E, term_type_data_id: Uuid, name: &str) -> Result<TermData>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = TermData {
        guid: Uuid::new_v4(),
        name: name.to_string(),
        term_type_data_id,
    };

    sqlx::query(
        "INSERT INTO term_data (guid, name, term_type_data_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(record.guid.to_string())
    .bind(&record.name)
    .bind(term_type_data_id.to_string())
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(record)
}

pub async fn find_term_type<'e, E>(executor: E, guid: Uuid) -> Result<Option<TermTypeData>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT guid, name, vocabulary_data_id FROM term_type_data WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(TermTypeData::from_row).transpose()
}

pub async fn list_term_types<'e, E>(executor: E, vocabulary_data_id: Uuid) -> Result<Vec<TermTypeData>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT guid, name, vocabulary_data_id FROM term_type_data WHERE vocabulary_data_id = ? ORDER BY name",
    )
    .bind(vocabulary_data_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(TermTypeData::from_row).collect()
}

pub async fn list_terms<'e, E>(executor: E, term_type_data_id: Uuid) -> Result<Vec<TermData>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT guid, name, term_type_data_id FROM term_data WHERE term_type_data_id = ? ORDER BY name",
    )
    .bind(term_type_data_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(TermData::from_row).collect()
}
