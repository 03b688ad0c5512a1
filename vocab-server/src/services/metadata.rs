//! Vocabulary metadata forms and term tags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;
use vocab_common::db::{TermData, TermTypeData, VocabularyData, VocabularyMetadata};
use vocab_common::iri::MAX_SEGMENT_LEN;
use vocab_common::{Error, Result};

use crate::db::{iris, terms, vocabulary};

/// Scalar subset of the metadata accepted from the form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataForm {
    pub base_iri_id: Uuid,
    #[serde(default)]
    pub rdf_type: String,
    #[serde(default, rename = "skos_inScheme")]
    pub skos_in_scheme: String,
    #[serde(default, rename = "xapi_referencedBy")]
    pub xapi_referenced_by: String,
    #[serde(default, rename = "prov_wasGeneratedBy")]
    pub prov_was_generated_by: String,
    #[serde(default)]
    pub dcterms_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dcterms_modified: Option<DateTime<Utc>>,
}

impl MetadataForm {
    fn into_metadata(self) -> VocabularyMetadata {
        VocabularyMetadata {
            rdf_type: self.rdf_type,
            skos_in_scheme: self.skos_in_scheme,
            xapi_referenced_by: self.xapi_referenced_by,
            prov_was_generated_by: self.prov_was_generated_by,
            dcterms_created: self.dcterms_created,
            dcterms_modified: self.dcterms_modified,
            ..Default::default()
        }
    }
}

/// A term type tag with its terms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermTypeView {
    #[serde(flatten)]
    pub term_type: TermTypeData,
    pub terms: Vec<TermData>,
}

/// Metadata of one address under a vocabulary path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabularyEntry {
    pub address: String,
    #[serde(flatten)]
    pub data: VocabularyData,
    pub term_types: Vec<TermTypeView>,
}

/// Attach form metadata to an IRI the caller owns
pub async fn create_from_form(
    pool: &SqlitePool,
    owner_id: Uuid,
    form: MetadataForm,
) -> Result<VocabularyData> {
    let base_iri_id = form.base_iri_id;
    let mut tx = pool.begin().await?;

    let iri = iris::find_owned(&mut *tx, base_iri_id, owner_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("IRI {} is not one of yours", base_iri_id)))?;

    if vocabulary::find_by_base_iri(&mut *tx, iri.guid).await?.is_some() {
        return Err(Error::ConstraintViolation(format!(
            "IRI {} already has vocabulary data",
            iri.full_iri
        )));
    }

    let data = vocabulary::insert_vocabulary_data(&mut *tx, iri.guid, &form.into_metadata()).await?;
    tx.commit().await?;

    info!(address = %iri.full_iri, "Vocabulary data created");
    Ok(data)
}

/// Tag a vocabulary with a term type name
pub async fn add_term_type(
    pool: &SqlitePool,
    owner_id: Uuid,
    vocabulary_data_id: Uuid,
    name: &str,
) -> Result<TermTypeData> {
    let name = check_name(name)?;
    let mut tx = pool.begin().await?;

    require_owned_vocabulary(&mut tx, owner_id, vocabulary_data_id).await?;
    let record = terms::insert_term_type(&mut *tx, vocabulary_data_id, name).await?;

    tx.commit().await?;
    Ok(record)
}

/// Tag a term type with a term name
pub async fn add_term(
    pool: &SqlitePool,
    owner_id: Uuid,
    term_type_data_id: Uuid,
    name: &str,
) -> Result<TermData> {
    let name = check_name(name)?;
    let mut tx = pool.begin().await?;

    let term_type = terms::find_term_type(&mut *tx, term_type_data_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Term type {} not found", term_type_data_id)))?;
    require_owned_vocabulary(&mut tx, owner_id, term_type.vocabulary_data_id).await?;
    let record = terms::insert_term(&mut *tx, term_type.guid, name).await?;

    tx.commit().await?;
    Ok(record)
}

async fn require_owned_vocabulary(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    vocabulary_data_id: Uuid,
) -> Result<VocabularyData> {
    let not_found = || Error::NotFound(format!("Vocabulary data {} not found", vocabulary_data_id));

    let data = vocabulary::find(&mut *conn, vocabulary_data_id)
        .await?
        .ok_or_else(not_found)?;
    let base_iri_id = data.base_iri_id.ok_or_else(not_found)?;
    iris::find_owned(&mut *conn, base_iri_id, owner_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(data)
}

fn check_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_SEGMENT_LEN {
        return Err(Error::Validation(format!(
            "Name '{}' is longer than {} characters",
            name, MAX_SEGMENT_LEN
        )));
    }
    Ok(name)
}

/// All metadata recorded under a vocabulary path
pub async fn vocabulary_view(pool: &SqlitePool, vocabulary_path: &str) -> Result<Vec<VocabularyEntry>> {
    let records = vocabulary::list_for_vocabulary_path(pool, vocabulary_path).await?;
    if records.is_empty() {
        return Err(Error::NotFound(format!(
            "No vocabulary data for {}",
            vocabulary_path
        )));
    }

    let mut entries = Vec::with_capacity(records.len());
    for (address, data) in records {
        let mut term_types = Vec::new();
        for term_type in terms::list_term_types(pool, data.guid).await? {
            let terms = terms::list_terms(pool, term_type.guid).await?;
            term_types.push(TermTypeView { term_type, terms });
        }
        entries.push(VocabularyEntry {
            address,
            data,
            term_types,
        });
    }

    Ok(entries)
}
