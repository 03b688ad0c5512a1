//! Vocabulary metadata database operations

use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;
use vocab_common::db::{VocabularyData, VocabularyMetadata};
use vocab_common::{Error, Result};

/// Insert metadata for a base IRI
///
/// A second record for the same base IRI is a `ConstraintViolation`.
pub async fn insert_vocabulary_data<'e, E>(
    executor: E,
    base_iri_id: Uuid,
    metadata: &VocabularyMetadata,
) -> Result<VocabularyData>
where
    E: Executor<'e, Database = Sqlite>,
{
    let data = VocabularyData {
        guid: Uuid::new_v4(),
        base_iri_id: Some(base_iri_id),
        metadata: metadata.clone(),
        created_at: Utc::now(),
    };
    let m = &data.metadata;

    let sql = format!(
        "INSERT INTO vocabulary_data ({}) VALUES ({})",
        VocabularyData::COLUMNS,
        vec!["?"; 26].join(", ")
    );

    sqlx::query(&sql)
        .bind(data.guid.to_string())
        .bind(base_iri_id.to_string())
        .bind(&m.rdf_type)
        .bind(m.dcterms_created)
        .bind(m.dcterms_modified)
        .bind(Json(&m.foaf_name))
        .bind(Json(&m.prov_specialization_of))
        .bind(&m.prov_was_generated_by)
        .bind(Json(&m.prov_was_revision_of))
        .bind(Json(&m.skos_alt_label))
        .bind(Json(&m.skos_broader))
        .bind(Json(&m.skos_broad_match))
        .bind(Json(&m.skos_definition))
        .bind(Json(&m.skos_editorial_note))
        .bind(Json(&m.skos_example))
        .bind(Json(&m.skos_history_note))
        .bind(&m.skos_in_scheme)
        .bind(Json(&m.skos_narrower))
        .bind(Json(&m.skos_narrow_match))
        .bind(Json(&m.skos_pref_label))
        .bind(Json(&m.skos_related_match))
        .bind(Json(&m.skos_scope_note))
        .bind(Json(&m.xapi_closely_related_natural_language_term))
        .bind(&m.xapi_referenced_by)
        .bind(Json(&m.xapi_third_party_label))
        .bind(data.created_at)
        .execute(executor)
        .await
        .map_err(|e| {
            Error::from_unique_violation(e, || {
                format!("IRI {} already has vocabulary data", base_iri_id)
            })
        })?;

    Ok(data)
}

pub async fn find<'e, E>(executor: E, guid: Uuid) -> Result<Option<VocabularyData>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM vocabulary_data WHERE guid = ?",
        VocabularyData::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(guid.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(VocabularyData::from_row).transpose()
}

pub async fn find_by_base_iri<'e, E>(executor: E, base_iri_id: Uuid) -> Result<Option<VocabularyData>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM vocabulary_data WHERE base_iri_id = ?",
        VocabularyData::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(base_iri_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(VocabularyData::from_row).transpose()
}

/// Metadata whose base IRI lives under the given vocabulary path, with its address
pub async fn list_for_vocabulary_path<'e, E>(
    executor: E,
    vocabulary_path: &str,
) -> Result<Vec<(String, VocabularyData)>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let columns = VocabularyData::COLUMNS
        .split(", ")
        .map(|c| format!("v.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        r#"
        SELECT {}, r.full_iri AS full_iri
        FROM vocabulary_data v
        JOIN registered_iris r ON r.guid = v.base_iri_id
        WHERE r.vocabulary_path = ?
        ORDER BY r.full_iri ASC
        "#,
        columns
    );
    let rows = sqlx::query(&sql)
        .bind(vocabulary_path)
        .fetch_all(executor)
        .await?;

    rows.iter()
        .map(|row| -> Result<(String, VocabularyData)> {
            let full_iri: String = row.try_get("full_iri")?;
            Ok((full_iri, VocabularyData::from_row(row)?))
        })
        .collect()
}
