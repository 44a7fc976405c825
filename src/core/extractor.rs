//! Recovers the Flickr photo a Commons file was copied from.
//!
//! Two sources of evidence are consulted: the structured data already on
//! the file, and the page markup. If both name a photo and they disagree we
//! stop; a human has to decide which one is right.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{properties, ExistingClaims};
use crate::flickr_url::{find_flickr_urls, parse_flickr_url};

/// Where a recovered identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    StructuredData,
    PageMarkup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMatch {
    pub photo_id: String,

    /// The URL the id was read from
    pub source_url: String,

    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error(
        "structured data points to photo {} ({}) but the page markup points to photo {} ({})",
        structured.photo_id,
        structured.source_url,
        markup.photo_id,
        markup.source_url
    )]
    IdentifierConflict {
        structured: IdentifierMatch,
        markup: IdentifierMatch,
    },

    #[error("no Flickr photo id in structured data or page markup")]
    NotFound,
}

/// Find the source photo for a file
pub fn extract(
    existing: &ExistingClaims,
    page_markup: Option<&str>,
) -> Result<IdentifierMatch, ExtractError> {
    let structured = from_structured_data(existing);
    let markup = page_markup.and_then(from_markup);

    match (structured, markup) {
        (Some(structured), Some(markup)) if structured.photo_id != markup.photo_id => {
            Err(ExtractError::IdentifierConflict { structured, markup })
        }
        (Some(structured), _) => Ok(structured),
        (None, Some(markup)) => Ok(markup),
        (None, None) => Err(ExtractError::NotFound),
    }
}

/// First non-empty "described at URL" qualifier that resolves to a photo
pub fn from_structured_data(existing: &ExistingClaims) -> Option<IdentifierMatch> {
    [properties::SOURCE_OF_FILE, properties::FLICKR_PHOTO_ID]
        .into_iter()
        .flat_map(|property| existing.get(property))
        .flat_map(|statement| statement.qualifiers_for(properties::DESCRIBED_AT_URL))
        .filter_map(|snak| snak.datavalue.as_ref()?.as_str())
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .find_map(|url| photo_match(url, Provenance::StructuredData))
}

/// Photo URL from the page markup.
///
/// URLs in a template's `source` parameter win over URLs anywhere else on
/// the page, since descriptions often link to other photos.
pub fn from_markup(markup: &str) -> Option<IdentifierMatch> {
    source_fields(markup)
        .flat_map(find_flickr_urls)
        .chain(find_flickr_urls(markup))
        .find_map(|url| photo_match(url, Provenance::PageMarkup))
}

/// Values of every `source=` template parameter, on one line or many
fn source_fields(markup: &str) -> impl Iterator<Item = &str> {
    markup.split('|').skip(1).filter_map(|parameter| {
        let (name, value) = parameter.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("source") {
            return None;
        }

        Some(value.split("}}").next().unwrap_or(value))
    })
}

fn photo_match(url: &str, provenance: Provenance) -> Option<IdentifierMatch> {
    let resource = parse_flickr_url(url).ok()?;

    Some(IdentifierMatch {
        photo_id: resource.photo_id()?.to_string(),
        source_url: url.to_string(),
        provenance,
    })
}
