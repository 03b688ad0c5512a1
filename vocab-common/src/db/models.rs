//! Database models

use crate::iri::{IriComponents, TermType};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

fn parse_guid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    Uuid::parse_str(&value)
        .map_err(|e| Error::Internal(format!("Invalid {} '{}': {}", column, value, e)))
}

fn parse_optional_guid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    value
        .map(|v| {
            Uuid::parse_str(&v)
                .map_err(|e| Error::Internal(format!("Invalid {} '{}': {}", column, v, e)))
        })
        .transpose()
}

/// Review state derived from the accepted/reviewed flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A registered identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredIri {
    pub guid: Uuid,
    pub vocabulary_path: String,
    pub term_type: Option<TermType>,
    pub term: Option<String>,
    pub accepted: bool,
    pub reviewed: bool,
    pub full_iri: String,
    /// None once the owning user has been deleted
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegisteredIri {
    pub const COLUMNS: &'static str = "guid, vocabulary_path, term_type, term, accepted, reviewed, \
         full_iri, owner_id, created_at, updated_at";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let term_type: String = row.try_get("term_type")?;
        let term: String = row.try_get("term")?;

        Ok(Self {
            guid: parse_guid(row, "guid")?,
            vocabulary_path: row.try_get("vocabulary_path")?,
            term_type: TermType::parse_choice(&term_type)?,
            term: Some(term).filter(|t| !t.is_empty()),
            accepted: row.try_get("accepted")?,
            reviewed: row.try_get("reviewed")?,
            full_iri: row.try_get("full_iri")?,
            owner_id: parse_optional_guid(row, "owner_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub fn components(&self) -> IriComponents {
        IriComponents::new(self.vocabulary_path.clone(), self.term_type, self.term.clone())
    }

    pub fn status(&self) -> ReviewStatus {
        match (self.reviewed, self.accepted) {
            (false, _) => ReviewStatus::Pending,
            (true, true) => ReviewStatus::Accepted,
            (true, false) => ReviewStatus::Rejected,
        }
    }
}

/// Descriptive metadata fields of a vocabulary or term
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyMetadata {
    pub rdf_type: String,
    pub dcterms_created: Option<DateTime<Utc>>,
    pub dcterms_modified: Option<DateTime<Utc>>,
    pub foaf_name: Vec<String>,
    #[serde(rename = "prov_specializationOf")]
    pub prov_specialization_of: Vec<String>,
    #[serde(rename = "prov_wasGeneratedBy")]
    pub prov_was_generated_by: String,
    #[serde(rename = "prov_wasRevisionOf")]
    pub prov_was_revision_of: Vec<String>,
    #[serde(rename = "skos_altLabel")]
    pub skos_alt_label: Vec<String>,
    pub skos_broader: Vec<String>,
    #[serde(rename = "skos_broadMatch")]
    pub skos_broad_match: Vec<String>,
    pub skos_definition: Vec<String>,
    #[serde(rename = "skos_editorialNote")]
    pub skos_editorial_note: Vec<String>,
    pub skos_example: Vec<String>,
    #[serde(rename = "skos_historyNote")]
    pub skos_history_note: Vec<String>,
    #[serde(rename = "skos_inScheme")]
    pub skos_in_scheme: String,
    pub skos_narrower: Vec<String>,
    #[serde(rename = "skos_narrowMatch")]
    pub skos_narrow_match: Vec<String>,
    #[serde(rename = "skos_prefLabel")]
    pub skos_pref_label: Vec<String>,
    #[serde(rename = "skos_relatedMatch")]
    pub skos_related_match: Vec<String>,
    #[serde(rename = "skos_scopeNote")]
    pub skos_scope_note: Vec<String>,
    #[serde(rename = "xapi_closelyRelatedNaturalLanguageTerm")]
    pub xapi_closely_related_natural_language_term: Vec<String>,
    #[serde(rename = "xapi_referencedBy")]
    pub xapi_referenced_by: String,
    #[serde(rename = "xapi_thirdPartyLabel")]
    pub xapi_third_party_label: Vec<String>,
}

/// Metadata record attached to at most one registered IRI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyData {
    pub guid: Uuid,
    /// None once the base IRI has been removed
    pub base_iri_id: Option<Uuid>,
    #[serde(flatten)]
    pub metadata: VocabularyMetadata,
    pub created_at: DateTime<Utc>,
}

impl VocabularyData {
    pub const COLUMNS: &'static str = "guid, base_iri_id, rdf_type, dcterms_created, dcterms_modified, \
         foaf_name, prov_specialization_of, prov_was_generated_by, prov_was_revision_of, \
         skos_alt_label, skos_broader, skos_broad_match, skos_definition, skos_editorial_note, \
         skos_example, skos_history_note, skos_in_scheme, skos_narrower, skos_narrow_match, \
         skos_pref_label, skos_related_match, skos_scope_note, \
         xapi_closely_related_natural_language_term, xapi_referenced_by, xapi_third_party_label, \
         created_at";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let list = |column: &str| -> Result<Vec<String>> {
            let Json(values): Json<Vec<String>> = row.try_get(column)?;
            Ok(values)
        };

        let metadata = VocabularyMetadata {
            rdf_type: row.try_get("rdf_type")?,
            dcterms_created: row.try_get("dcterms_created")?,
            dcterms_modified: row.try_get("dcterms_modified")?,
            foaf_name: list("foaf_name")?,
            prov_specialization_of: list("prov_specialization_of")?,
            prov_was_generated_by: row.try_get("prov_was_generated_by")?,
            prov_was_revision_of: list("prov_was_revision_of")?,
            skos_alt_label: list("skos_alt_label")?,
            skos_broader: list("skos_broader")?,
            skos_broad_match: list("skos_broad_match")?,
            skos_definition: list("skos_definition")?,
            skos_editorial_note: list("skos_editorial_note")?,
            skos_example: list("skos_example")?,
            skos_history_note: list("skos_history_note")?,
            skos_in_scheme: row.try_get("skos_in_scheme")?,
            skos_narrower: list("skos_narrower")?,
            skos_narrow_match: list("skos_narrow_match")?,
            skos_pref_label: list("skos_pref_label")?,
            skos_related_match: list("skos_related_match")?,
            skos_scope_note: list("skos_scope_note")?,
            xapi_closely_related_natural_language_term: list(
                "xapi_closely_related_natural_language_term",
            )?,
            xapi_referenced_by: row.try_get("xapi_referenced_by")?,
            xapi_third_party_label: list("xapi_third_party_label")?,
        };

        Ok(Self {
            guid: parse_guid(row, "guid")?,
            base_iri_id: parse_optional_guid(row, "base_iri_id")?,
            metadata,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Term type name scoped under a vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermTypeData {
    pub guid: Uuid,
    pub name: String,
    pub vocabulary_data_id: Uuid,
}

impl TermTypeData {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            guid: parse_guid(row, "guid")?,
            name: row.try_get("name")?,
            vocabulary_data_id: parse_guid(row, "vocabulary_data_id")?,
        })
    }
}

/// Term name scoped under a term type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermData {
    pub guid: Uuid,
    pub name: String,
    pub term_type_data_id: Uuid,
}

impl TermData {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            guid: parse_guid(row, "guid")?,
            name: row.try_get("name")?,
            term_type_data_id: parse_guid(row, "term_type_data_id")?,
        })
    }
}

/// Account record (credentials are never loaded into this type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub guid: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "guid, username, email, is_admin, created_at";

    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            guid: parse_guid(row, "guid")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(accepted: bool, reviewed: bool) -> RegisteredIri {
        RegisteredIri {
            guid: Uuid::new_v4(),
            vocabulary_path: "adl".to_string(),
            term_type: None,
            term: None,
            accepted,
            reviewed,
            full_iri: "https://example.org/adl".to_string(),
            owner_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_review_status() {
        assert_eq!(iri(false, false).status(), ReviewStatus::Pending);
        assert_eq!(iri(true, true).status(), ReviewStatus::Accepted);
        assert_eq!(iri(false, true).status(), ReviewStatus::Rejected);
    }

    #[test]
    fn test_metadata_serializes_vocabulary_field_names() {
        let metadata = VocabularyMetadata {
            skos_pref_label: vec!["Run".to_string()],
            ..Default::default()
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["skos_prefLabel"], serde_json::json!(["Run"]));
        assert!(value.get("xapi_closelyRelatedNaturalLanguageTerm").is_some());
    }
}
