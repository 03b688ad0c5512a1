//! IRI registration
//!
//! Creation never notifies anyone directly. Every successful create returns an
//! `IriCreated` event per record; the caller dispatches them after commit.

use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;
use vocab_common::db::RegisteredIri;
use vocab_common::events::VocabEvent;
use vocab_common::iri::{components_address, decompose_address, require_canonical};
use vocab_common::{Error, IriComponents, Result};

use crate::db::iris;

/// What a registration is created from
#[derive(Debug, Clone)]
pub enum IriSource {
    /// Structured components; the address is derived
    Components(IriComponents),
    /// An absolute address; the components are derived
    Address(String),
}

/// Records created by one submission, with the events to dispatch
#[derive(Debug)]
pub struct Registration {
    pub iris: Vec<RegisteredIri>,
    pub events: Vec<VocabEvent>,
}

/// Resolve a source into validated components and its canonical address
pub fn resolve(domain: &str, source: &IriSource) -> Result<(IriComponents, String)> {
    match source {
        IriSource::Components(components) => {
            components.validate()?;
            Ok((components.clone(), components_address(domain, components)))
        }
        IriSource::Address(address) => {
            let components = decompose_address(domain, address)?;
            components.validate()?;
            let canonical = require_canonical(domain, address, &components)?;
            Ok((components, canonical))
        }
    }
}

/// Insert one registration on an open connection or transaction
pub async fn register(
    conn: &mut SqliteConnection,
    components: &IriComponents,
    full_iri: &str,
    owner_id: Option<Uuid>,
) -> Result<(RegisteredIri, VocabEvent)> {
    let iri = iris::insert_iri(&mut *conn, components, full_iri, owner_id).await?;
    let event = VocabEvent::iri_created(&iri.full_iri);
    Ok((iri, event))
}

/// Create a single registration in its own transaction
pub async fn create(
    pool: &SqlitePool,
    domain: &str,
    source: IriSource,
    owner_id: Uuid,
) -> Result<Registration> {
    let (components, address) = resolve(domain, &source)?;

    let mut tx = pool.begin().await?;
    let (iri, event) = register(&mut tx, &components, &address, Some(owner_id)).await?;
    tx.commit().await?;

    info!(address = %iri.full_iri, owner = %owner_id, "IRI registered");

    Ok(Registration {
        iris: vec![iri],
        events: vec![event],
    })
}

/// Create several registrations atomically
///
/// The submission must be non-empty and must not repeat a component triple,
/// whether given as components or as an address.
/// Any failure rolls back every record of the batch.
pub async fn create_batch(
    pool: &SqlitePool,
    domain: &str,
    submissions: Vec<IriSource>,
    owner_id: Uuid,
) -> Result<Registration> {
    if submissions.is_empty() {
        return Err(Error::Validation(
            "At least one IRI must be submitted".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(submissions.len());
    for source in &submissions {
        let (components, address) = resolve(domain, source)?;
        if !seen.insert(components.clone()) {
            return Err(Error::ConstraintViolation(
                "Forms cannot have the same triple values as other forms in the form set"
                    .to_string(),
            ));
        }
        resolved.push((components, address));
    }

    let mut tx = pool.begin().await?;
    let mut registration = Registration {
        iris: Vec::with_capacity(resolved.len()),
        events: Vec::with_capacity(resolved.len()),
    };
    for (components, address) in &resolved {
        let (iri, event) = register(&mut tx, components, address, Some(owner_id)).await?;
        registration.iris.push(iri);
        registration.events.push(event);
    }
    tx.commit().await?;

    info!(
        count = registration.iris.len(),
        owner = %owner_id,
        "IRI batch registered"
    );

    Ok(registration)
}
