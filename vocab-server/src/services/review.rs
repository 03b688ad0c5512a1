//! Review workflow
//!
//! `pending -> accepted` or `pending -> rejected`; reviewed records never
//! change again. Records are addressed by their component tuple.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use vocab_common::config::RedirectConfig;
use vocab_common::db::{RegisteredIri, User};
use vocab_common::events::VocabEvent;
use vocab_common::{Error, IriComponents, Result};

use crate::db::{iris, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn is_accept(self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// Outcome of a review with the side effects it requests
#[derive(Debug)]
pub struct ReviewOutcome {
    pub iri: RegisteredIri,
    pub events: Vec<VocabEvent>,
}

/// Apply a decision to the pending record matching `components`
///
/// Fails with `PermissionDenied` for non-administrators and `NotFound` when
/// no pending record matches (including one that was already reviewed).
/// Only the pairing rule is checked: imported records may carry
/// multi-segment vocabulary paths.
pub async fn review(
    pool: &SqlitePool,
    redirect: &RedirectConfig,
    reviewer: &User,
    components: &IriComponents,
    decision: Decision,
) -> Result<ReviewOutcome> {
    if !reviewer.is_admin {
        return Err(Error::PermissionDenied(
            "Only administrators may review IRIs".to_string(),
        ));
    }
    components.check_pairing()?;

    let accepted = decision.is_accept();
    let mut tx = pool.begin().await?;

    let mut iri = iris::find_pending_by_components(&mut *tx, components)
        .await?
        .ok_or_else(|| not_pending(components))?;

    if !iris::mark_reviewed(&mut *tx, iri.guid, accepted).await? {
        return Err(not_pending(components));
    }

    let recipient_email = match iri.owner_id {
        Some(owner_id) => users::find_by_id(&mut *tx, owner_id).await?.map(|u| u.email),
        None => None,
    };

    tx.commit().await?;

    iri.accepted = accepted;
    iri.reviewed = true;

    info!(
        address = %iri.full_iri,
        reviewer = %reviewer.username,
        accepted,
        "IRI reviewed"
    );

    let mut events = Vec::with_capacity(2);
    if accepted {
        events.push(VocabEvent::RedirectRequested {
            title: iri.vocabulary_path.clone(),
            vocabulary_path: iri.vocabulary_path.clone(),
            jsonld_target: redirect.jsonld_target.clone(),
            html_target: redirect.html_target.clone(),
            timestamp: chrono::Utc::now(),
        });
    }
    events.push(VocabEvent::ReviewDecided {
        address: iri.full_iri.clone(),
        recipient_email,
        accepted,
        timestamp: chrono::Utc::now(),
    });

    Ok(ReviewOutcome { iri, events })
}

fn not_pending(components: &IriComponents) -> Error {
    let mut name = components.vocabulary_path.clone();
    if let Some(term_type) = components.term_type {
        name.push('/');
        name.push_str(term_type.as_str());
    }
    if let Some(term) = &components.term {
        name.push('/');
        name.push_str(term);
    }
    Error::NotFound(format!("No pending IRI matches {}", name))
}
