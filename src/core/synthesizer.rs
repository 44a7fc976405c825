//! Builds the desired structured-data claims for a Flickr photo.
//!
//! There are two modes:
//!
//! - **New photo**: a fresh upload. We know exactly when we fetched the
//!   photo and which file we copied, so the source statement gets the
//!   original-file URL and a "retrieved" date, and license/copyright
//!   statements are included.
//! - **Existing photo**: a file that was copied to Commons some time ago.
//!   The photo may since have gone private or been deleted, so this mode
//!   accepts partial evidence. It never writes "retrieved" (that would be
//!   the bot's clock, not the upload time), never writes the original-file
//!   URL (the Flickr file may have been replaced), and never writes
//!   license/copyright statements (licenses change after copying).

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{
    entities, properties, CopyrightStatus, DesiredClaims, PhotoFacts, Snak, Statement, UserFacts,
    Vocabulary,
};

use super::codec::{
    coordinate_value, date_value, entity_value, license_value, monolingual_value,
    precision_for_accuracy, string_value, DatePrecision,
};

/// License that asks for the title and author to be attributed
const ATTRIBUTED_LICENSE: &str = "cc-by-sa-2.0";

/// Partial evidence about a photo we can no longer fetch.
///
/// At least one of user, id or URL is always present; [`PartialFacts::new`]
/// refuses to build an empty one.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialFacts {
    user: Option<UserFacts>,
    photo_id: Option<String>,
    photo_url: Option<String>,
}

impl PartialFacts {
    /// Returns `None` when all three pieces are missing
    pub fn new(
        user: Option<UserFacts>,
        photo_id: Option<String>,
        photo_url: Option<String>,
    ) -> Option<Self> {
        if user.is_none() && photo_id.is_none() && photo_url.is_none() {
            return None;
        }

        Some(Self {
            user,
            photo_id,
            photo_url,
        })
    }

    pub fn user(&self) -> Option<&UserFacts> {
        self.user.as_ref()
    }

    pub fn photo_id(&self) -> Option<&str> {
        self.photo_id.as_deref()
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }
}

/// What we know about an already-copied photo
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoEvidence {
    Full(PhotoFacts),
    Partial(PartialFacts),
}

/// Input to [`ClaimSynthesizer::synthesize`]
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    NewPhoto {
        photo: PhotoFacts,
        retrieved_at: DateTime<Utc>,
    },
    ExistingPhoto(PhotoEvidence),
}

/// Turns photo and user facts into an ordered list of statements
#[derive(Debug, Clone, Default)]
pub struct ClaimSynthesizer {
    vocabulary: Vocabulary,
}

impl ClaimSynthesizer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn synthesize(&self, request: &Synthesis) -> DesiredClaims {
        match request {
            Synthesis::NewPhoto {
                photo,
                retrieved_at,
            } => self.for_new_photo(photo, *retrieved_at),
            Synthesis::ExistingPhoto(evidence) => self.for_existing_photo(evidence),
        }
    }

    /// Claims for a photo being uploaded right now.
    ///
    /// Order: id, creator, source, license, copyright status, location,
    /// date taken, page id, published in.
    pub fn for_new_photo(&self, photo: &PhotoFacts, retrieved_at: DateTime<Utc>) -> DesiredClaims {
        let mut claims = vec![
            id_statement(&photo.id),
            creator_statement(&photo.owner),
            source_statement(
                &photo.url,
                photo.original_url.as_deref(),
                Some(retrieved_at),
            ),
        ];

        match self.license_statements(photo) {
            Some((license, copyright)) => claims.extend([license, copyright]),
            None => debug!(
                photo_id = %photo.id,
                license = %photo.license_id,
                "No license mapping, skipping license and copyright statements"
            ),
        }

        claims.extend(self.descriptive_statements(photo));
        claims.push(published_in_statement(Some(photo.date_posted)));

        DesiredClaims { claims }
    }

    /// Claims for a photo that is already on Commons.
    ///
    /// Order: id, creator, source, location, date taken, page id,
    /// published in; each only when the evidence supports it.
    pub fn for_existing_photo(&self, evidence: &PhotoEvidence) -> DesiredClaims {
        let mut claims = Vec::new();

        match evidence {
            PhotoEvidence::Full(photo) => {
                claims.push(id_statement(&photo.id));
                claims.push(creator_statement(&photo.owner));
                claims.push(source_statement(&photo.url, None, None));
                claims.extend(self.descriptive_statements(photo));
                claims.push(published_in_statement(Some(photo.date_posted)));
            }
            PhotoEvidence::Partial(partial) => {
                if let Some(photo_id) = partial.photo_id() {
                    claims.push(id_statement(photo_id));
                }
                if let Some(user) = partial.user() {
                    claims.push(creator_statement(user));
                }
                if let Some(url) = partial.photo_url() {
                    claims.push(source_statement(url, None, None));
                }
            }
        }

        DesiredClaims { claims }
    }

    fn license_statements(&self, photo: &PhotoFacts) -> Option<(Statement, Statement)> {
        let entry = self.vocabulary.licenses.get(&photo.license_id)?;
        let license = license_value(&self.vocabulary.licenses, &photo.license_id).ok()?;

        let mut license_statement =
            Statement::new(Snak::value(properties::COPYRIGHT_LICENSE, license));

        if photo.license_id == ATTRIBUTED_LICENSE {
            if let Some(title) = photo.title.as_deref().filter(|t| !t.trim().is_empty()) {
                license_statement.push_qualifier(Snak::value(
                    properties::TITLE,
                    monolingual_value(title, "en"),
                ));
            }
            license_statement.push_qualifier(Snak::value(
                properties::AUTHOR_NAME_STRING,
                string_value(photo.owner.display_name()),
            ));
        }

        let copyright_statement = match &entry.status {
            CopyrightStatus::Copyrighted => Statement::new(Snak::value(
                properties::COPYRIGHT_STATUS,
                entity_value(entities::COPYRIGHTED),
            )),
            CopyrightStatus::PublicDomain {
                determination_method,
            } => Statement::new(Snak::value(
                properties::COPYRIGHT_STATUS,
                entity_value(entities::PUBLIC_DOMAIN),
            ))
            .with_qualifier(Snak::value(
                properties::DETERMINATION_METHOD,
                entity_value(determination_method),
            )),
        };

        Some((license_statement, copyright_statement))
    }

    /// Location, date taken and institutional page id, in that order
    fn descriptive_statements(&self, photo: &PhotoFacts) -> Vec<Statement> {
        let mut statements = Vec::new();

        if let Some(location) = &photo.location {
            statements.push(Statement::new(Snak::value(
                properties::COORDINATES_OF_POINT_OF_VIEW,
                coordinate_value(
                    location.latitude,
                    location.longitude,
                    location.altitude,
                    Some(precision_for_accuracy(location.accuracy)),
                    location.datum.as_deref(),
                ),
            )));
        }

        if let Some(date_taken) = photo.date_taken {
            statements.push(Statement::new(Snak::value(
                properties::INCEPTION,
                date_value(date_taken, DatePrecision::Day),
            )));
        }

        if let Some(source) = self.vocabulary.page_id_source_for(&photo.owner.id) {
            if let Some(page_id) = source.page_id(&photo.machine_tags) {
                statements.push(Statement::new(Snak::value(
                    source.property.as_str(),
                    string_value(page_id),
                )));
            }
        }

        statements
    }
}

fn id_statement(photo_id: &str) -> Statement {
    Statement::new(Snak::value(
        properties::FLICKR_PHOTO_ID,
        string_value(photo_id),
    ))
}

/// The Flickr user isn't a knowledge-graph entity, so the creator is
/// "some value" identified by its qualifiers.
fn creator_statement(user: &UserFacts) -> Statement {
    Statement::new(Snak::some_value(properties::CREATOR))
        .with_qualifier(Snak::value(
            properties::AUTHOR_NAME_STRING,
            string_value(user.display_name()),
        ))
        .with_qualifier(Snak::value(
            properties::URL,
            string_value(user.profile_url.as_str()),
        ))
        .with_qualifier(Snak::value(
            properties::FLICKR_USER_ID,
            string_value(user.id.as_str()),
        ))
}

fn source_statement(
    described_at_url: &str,
    original_url: Option<&str>,
    retrieved_at: Option<DateTime<Utc>>,
) -> Statement {
    let mut statement = Statement::new(Snak::value(
        properties::SOURCE_OF_FILE,
        entity_value(entities::FILE_AVAILABLE_ON_INTERNET),
    ))
    .with_qualifier(Snak::value(
        properties::DESCRIBED_AT_URL,
        string_value(described_at_url),
    ))
    .with_qualifier(Snak::value(
        properties::OPERATOR,
        entity_value(entities::FLICKR),
    ));

    if let Some(original_url) = original_url {
        statement.push_qualifier(Snak::value(properties::URL, string_value(original_url)));
    }

    if let Some(retrieved_at) = retrieved_at {
        statement.push_qualifier(Snak::value(
            properties::RETRIEVED,
            date_value(retrieved_at.date_naive(), DatePrecision::Day),
        ));
    }

    statement
}

fn published_in_statement(date_posted: Option<DateTime<Utc>>) -> Statement {
    let mut statement = Statement::new(Snak::value(
        properties::PUBLISHED_IN,
        entity_value(entities::FLICKR),
    ));

    if let Some(date_posted) = date_posted {
        statement.push_qualifier(Snak::value(
            properties::PUBLICATION_DATE,
            date_value(date_posted.date_naive(), DatePrecision::Day),
        ));
    }

    statement
}
