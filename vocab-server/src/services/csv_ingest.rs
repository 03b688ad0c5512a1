//! CSV vocabulary import
//!
//! Each data row becomes one registered IRI plus its vocabulary metadata.
//! The whole upload is parsed and checked before anything is written, and
//! the writes share one transaction: a failing row rejects the batch.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;
use vocab_common::db::{RegisteredIri, VocabularyMetadata};
use vocab_common::events::VocabEvent;
use vocab_common::iri::{decompose_address_lenient, require_canonical};
use vocab_common::{Error, IriComponents, Result};

use crate::db::{iris, vocabulary};

/// Column order of an upload row and of the downloadable template
pub const COLUMNS: [&str; 24] = [
    "IRI",
    "rdf:type",
    "skos:prefLabel",
    "skos:altLabel",
    "xapi:thirdPartyLabel",
    "xapi:closelyRelatedNaturalLanguageTerm",
    "skos:inScheme",
    "xapi:referencedBy",
    "skos:editorialNote",
    "skos:scopeNote",
    "skos:definition",
    "skos:historyNote",
    "skos:broader",
    "skos:broadMatch",
    "skos:narrower",
    "skos:narrowMatch",
    "skos:relatedMatch",
    "dcterms:created",
    "dcterms:modified",
    "foaf:name",
    "prov:wasGeneratedBy",
    "prov:wasRevisionOf",
    "prov:specializationOf",
    "skos:example",
];

/// First cell of a header row
const HEADER_TOKEN: &str = "IRI";

const DATE_FORMAT: &str = "%m/%d/%Y";

/// One validated upload row
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// 1-based data row number
    pub row: usize,
    pub address: String,
    pub components: IriComponents,
    pub metadata: VocabularyMetadata,
}

/// Records written by a successful import
#[derive(Debug)]
pub struct IngestReport {
    pub iris: Vec<RegisteredIri>,
    pub events: Vec<VocabEvent>,
}

/// Uploads are recognised by name only
pub fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.to_ascii_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(Error::Format(format!(
            "Uploaded file '{}' is not a .csv file",
            file_name
        )))
    }
}

/// Parse a bracketed list cell such as `[a, "b", c]`
///
/// Empty cells and `[]` are empty lists; blank items are dropped and
/// matching quotes around an item are removed.
pub fn parse_list_cell(cell: &str) -> Result<Vec<String>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(Vec::new());
    }

    let inner = cell
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| Error::Format(format!("'{}' is not a bracketed list", cell)))?;

    Ok(inner
        .split(',')
        .map(|item| unquote(item.trim()))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}

fn unquote(item: &str) -> &str {
    for quote in ['"', '\''] {
        if item.len() >= 2 && item.starts_with(quote) && item.ends_with(quote) {
            return item[1..item.len() - 1].trim();
        }
    }
    item
}

/// Parse an `MM/DD/YYYY` date cell to UTC midnight; blank cells are unset
pub fn parse_date_cell(cell: &str) -> Result<Option<DateTime<Utc>>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }

    let date = NaiveDate::parse_from_str(cell, DATE_FORMAT).map_err(|e| {
        Error::Format(format!("'{}' is not a MM/DD/YYYY date ({})", cell, e))
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Internal(format!("no midnight on {}", date)))?;

    Ok(Some(Utc.from_utc_datetime(&midnight)))
}

/// Prefix an error message with the row it came from, keeping its kind
fn row_error(row: usize, err: Error) -> Error {
    let context = |msg: String| format!("Row {}: {}", row, msg);
    match err {
        Error::ConstraintViolation(m) => Error::ConstraintViolation(context(m)),
        Error::Validation(m) => Error::Validation(context(m)),
        Error::Format(m) => Error::Format(context(m)),
        Error::Duplicate(m) => Error::Duplicate(context(m)),
        other => other,
    }
}

/// Turn one record into a row, validating every cell
pub fn parse_row(domain: &str, row: usize, record: &csv::StringRecord) -> Result<ParsedRow> {
    if record.len() != COLUMNS.len() {
        return Err(row_error(
            row,
            Error::Format(format!(
                "expected {} columns, found {}",
                COLUMNS.len(),
                record.len()
            )),
        ));
    }

    let cell = |index: usize| record.get(index).unwrap_or_default();
    let list = |index: usize| {
        parse_list_cell(cell(index)).map_err(|e| {
            row_error(row, Error::Format(format!("{}: {}", COLUMNS[index], inner_message(e))))
        })
    };
    let date = |index: usize| {
        parse_date_cell(cell(index)).map_err(|e| {
            row_error(row, Error::Format(format!("{}: {}", COLUMNS[index], inner_message(e))))
        })
    };

    let address = cell(0).trim().to_string();
    if !address.starts_with(domain) {
        return Err(row_error(
            row,
            Error::Format(format!("IRI '{}' does not begin with {}", address, domain)),
        ));
    }
    let components = decompose_address_lenient(domain, &address).map_err(|e| row_error(row, e))?;
    components
        .validate_imported()
        .and_then(|_| require_canonical(domain, &address, &components))
        .map_err(|e| row_error(row, Error::Format(inner_message(e))))?;

    let metadata = VocabularyMetadata {
        rdf_type: cell(1).trim().to_string(),
        skos_pref_label: list(2)?,
        skos_alt_label: list(3)?,
        xapi_third_party_label: list(4)?,
        xapi_closely_related_natural_language_term: list(5)?,
        skos_in_scheme: cell(6).trim().to_string(),
        xapi_referenced_by: cell(7).trim().to_string(),
        skos_editorial_note: list(8)?,
        skos_scope_note: list(9)?,
        skos_definition: list(10)?,
        skos_history_note: list(11)?,
        skos_broader: list(12)?,
        skos_broad_match: list(13)?,
        skos_narrower: list(14)?,
        skos_narrow_match: list(15)?,
        skos_related_match: list(16)?,
        dcterms_created: date(17)?,
        dcterms_modified: date(18)?,
        foaf_name: list(19)?,
        prov_was_generated_by: cell(20).trim().to_string(),
        prov_was_revision_of: list(21)?,
        prov_specialization_of: list(22)?,
        skos_example: list(23)?,
    };

    Ok(ParsedRow {
        row,
        address,
        components,
        metadata,
    })
}

fn inner_message(err: Error) -> String {
    match err {
        Error::Format(m) | Error::Validation(m) => m,
        other => other.to_string(),
    }
}

/// Parse a whole upload; an optional `IRI` header row is skipped
pub fn parse_csv(domain: &str, bytes: &[u8]) -> Result<Vec<ParsedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if index == 0 && record.get(0).map(str::trim) == Some(HEADER_TOKEN) {
            debug!("Skipping CSV header row");
            continue;
        }
        rows.push(parse_row(domain, rows.len() + 1, &record)?);
    }

    Ok(rows)
}

/// Import an upload for `owner_id` in a single transaction
pub async fn ingest_csv(
    pool: &SqlitePool,
    domain: &str,
    bytes: &[u8],
    owner_id: Uuid,
) -> Result<IngestReport> {
    let rows = parse_csv(domain, bytes)?;
    if rows.is_empty() {
        return Err(Error::Format("Uploaded file has no data rows".to_string()));
    }

    let mut tx = pool.begin().await?;
    let mut seen = HashSet::new();
    let mut report = IngestReport {
        iris: Vec::with_capacity(rows.len()),
        events: Vec::with_capacity(rows.len()),
    };

    for parsed in &rows {
        if !seen.insert(parsed.address.as_str())
            || iris::address_exists(&mut *tx, &parsed.address).await?
        {
            return Err(row_error(
                parsed.row,
                Error::Duplicate(format!("IRI '{}' is already registered", parsed.address)),
            ));
        }

        let iri = iris::insert_iri(&mut *tx, &parsed.components, &parsed.address, Some(owner_id))
            .await
            .map_err(|e| row_error(parsed.row, e))?;
        vocabulary::insert_vocabulary_data(&mut *tx, iri.guid, &parsed.metadata)
            .await
            .map_err(|e| row_error(parsed.row, e))?;

        report.events.push(VocabEvent::iri_created(&iri.full_iri));
        report.iris.push(iri);
    }

    tx.commit().await?;

    info!(rows = report.iris.len(), owner = %owner_id, "Vocabulary CSV imported");

    Ok(report)
}

/// Header-only CSV describing the upload layout
pub fn template_csv() -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&COLUMNS)?;
    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("Failed to finish CSV template: {}", e)))
}
