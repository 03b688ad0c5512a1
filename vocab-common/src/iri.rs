//! IRI identity model
//!
//! An address is `<domain prefix><vocabulary path>[/<term type>[/<term>]]`.
//! Composition and decomposition are pure; persistence lives in the server crate.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of the vocabulary path and term segments
pub const MAX_SEGMENT_LEN: usize = 50;

/// Segments an address may have after the domain prefix
pub const MAX_PATH_SEGMENTS: usize = 3;

/// Path separator used in every address
pub const SEPARATOR: char = '/';

/// Category a term belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TermType {
    Verbs,
    ActivityTypes,
    Attachments,
    Extensions,
}

impl TermType {
    pub const ALL: [TermType; 4] = [
        TermType::Verbs,
        TermType::ActivityTypes,
        TermType::Attachments,
        TermType::Extensions,
    ];

    /// Address segment and stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            TermType::Verbs => "verbs",
            TermType::ActivityTypes => "activityTypes",
            TermType::Attachments => "attachments",
            TermType::Extensions => "extensions",
        }
    }

    /// Parse a stored or submitted choice where the empty string means "none"
    pub fn parse_choice(value: &str) -> Result<Option<TermType>> {
        if value.is_empty() {
            Ok(None)
        } else {
            value.parse().map(Some)
        }
    }

    /// Stored form of an optional term type (`''` for none)
    pub fn choice_str(term_type: Option<TermType>) -> &'static str {
        term_type.map(|t| t.as_str()).unwrap_or("")
    }
}

impl FromStr for TermType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TermType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("'{}' is not a valid term type", s)))
    }
}

impl fmt::Display for TermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured identity of a registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IriComponents {
    pub vocabulary_path: String,
    pub term_type: Option<TermType>,
    pub term: Option<String>,
}

impl IriComponents {
    pub fn new(
        vocabulary_path: impl Into<String>,
        term_type: Option<TermType>,
        term: Option<String>,
    ) -> Self {
        Self {
            vocabulary_path: vocabulary_path.into(),
            // Empty terms are "no term"
            term: term.filter(|t| !t.is_empty()),
            term_type,
        }
    }

    /// Check the pairing and segment rules
    ///
    /// A term without a term type is a `ConstraintViolation`; malformed
    /// segments are `Validation` errors.
    pub fn validate(&self) -> Result<()> {
        self.check_pairing()?;

        check_segment("vocabulary path", &self.vocabulary_path)?;
        if let Some(term) = &self.term {
            check_segment("term", term)?;
        }

        Ok(())
    }

    /// Only the term/term type pairing rule
    ///
    /// Enough for looking up records that already exist, whatever their origin.
    pub fn check_pairing(&self) -> Result<()> {
        if self.term.is_some() && self.term_type.is_none() {
            return Err(Error::ConstraintViolation(
                "Must supply a term type if supplying a term".to_string(),
            ));
        }
        Ok(())
    }

    /// Rules for components produced by [`decompose_address_lenient`]
    ///
    /// The vocabulary path may hold up to [`MAX_PATH_SEGMENTS`] non-empty
    /// segments and at most [`MAX_SEGMENT_LEN`] characters overall.
    pub fn validate_imported(&self) -> Result<()> {
        self.check_pairing()?;

        let path = &self.vocabulary_path;
        if path.split(SEPARATOR).any(|segment| segment.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "vocabulary path '{}' has an empty segment",
                path
            )));
        }
        if path.split(SEPARATOR).count() > MAX_PATH_SEGMENTS {
            return Err(Error::Validation(format!(
                "vocabulary path '{}' has more than {} segments",
                path, MAX_PATH_SEGMENTS
            )));
        }
        check_length("vocabulary path", path)?;
        if let Some(term) = &self.term {
            check_segment("term", term)?;
        }

        Ok(())
    }

    /// Stored form of the term type
    pub fn term_type_str(&self) -> &'static str {
        TermType::choice_str(self.term_type)
    }

    /// Stored form of the term
    pub fn term_str(&self) -> &str {
        self.term.as_deref().unwrap_or("")
    }
}

fn check_segment(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", name)));
    }
    if value.contains(SEPARATOR) {
        return Err(Error::Validation(format!(
            "{} '{}' must not contain '{}'",
            name, value, SEPARATOR
        )));
    }
    check_length(name, value)
}

fn check_length(name: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_SEGMENT_LEN {
        return Err(Error::Validation(format!(
            "{} '{}' is longer than {} characters",
            name, value, MAX_SEGMENT_LEN
        )));
    }
    Ok(())
}

/// Join the non-empty segments under the domain prefix
pub fn compose_address(
    domain: &str,
    vocabulary_path: &str,
    term_type: Option<TermType>,
    term: Option<&str>,
) -> String {
    let mut segments = vec![vocabulary_path];
    if let Some(term_type) = term_type {
        segments.push(term_type.as_str());
        if let Some(term) = term.filter(|t| !t.is_empty()) {
            segments.push(term);
        }
    }

    format!("{}{}", domain, segments.join("/"))
}

/// Compose the address of a set of components
pub fn components_address(domain: &str, components: &IriComponents) -> String {
    compose_address(
        domain,
        &components.vocabulary_path,
        components.term_type,
        components.term.as_deref(),
    )
}

/// Split an address back into components
///
/// Fails with `Format` if the address is outside the domain and with
/// `Validation` if the second segment is not a known term type.
pub fn decompose_address(domain: &str, address: &str) -> Result<IriComponents> {
    let path = address.strip_prefix(domain).ok_or_else(|| {
        Error::Format(format!("IRI '{}' does not begin with {}", address, domain))
    })?;

    let mut parts = path.split(SEPARATOR);
    let vocabulary_path = parts.next().unwrap_or_default();
    if vocabulary_path.is_empty() {
        return Err(Error::Format(format!(
            "IRI '{}' has no vocabulary path",
            address
        )));
    }

    let term_type = match parts.next() {
        Some(segment) => Some(segment.parse::<TermType>().map_err(|_| {
            Error::Validation(format!(
                "Must supply a valid term type ('{}' in '{}')",
                segment, address
            ))
        })?),
        None => None,
    };

    let term = parts.next().map(str::to_string);

    if parts.next().is_some() {
        return Err(Error::Validation(format!(
            "IRI '{}' has more than {} path segments",
            address, MAX_PATH_SEGMENTS
        )));
    }

    Ok(IriComponents::new(vocabulary_path, term_type, term))
}

/// Reject an address that is not the composition of its own components
///
/// Each identity has exactly one stored address; a trailing separator is a
/// `Format` error.
pub fn require_canonical(domain: &str, address: &str, components: &IriComponents) -> Result<String> {
    let canonical = components_address(domain, components);
    if canonical != address {
        return Err(Error::Format(format!(
            "IRI '{}' is not in canonical form, expected '{}'",
            address, canonical
        )));
    }
    Ok(canonical)
}

/// Decompose an address, treating the whole remainder as the vocabulary path
/// when it does not follow the `path/termType/term` layout.
///
/// Used for metadata imports, which describe arbitrary addresses under the domain.
pub fn decompose_address_lenient(domain: &str, address: &str) -> Result<IriComponents> {
    match decompose_address(domain, address) {
        Ok(components) => Ok(components),
        Err(Error::Validation(_)) => {
            let path = address.strip_prefix(domain).unwrap_or(address);
            Ok(IriComponents::new(path, None, None))
        }
        Err(e) => Err(e),
    }
}
