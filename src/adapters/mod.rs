//! Adapter interfaces for external systems.
//!
//! Two collaborators sit behind traits so the reconciliation core never
//! talks HTTP directly:
//! - `PhotoSource`: the photo-hosting service (Flickr)
//! - `ClaimStore`: the structured-data store (Wikimedia Commons)

pub mod commons;
pub mod flickr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ExistingClaims, PhotoFacts, Statement, UserFacts};

pub use commons::CommonsClient;
pub use flickr::FlickrClient;

/// Why a photo or user couldn't be fetched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("photo {0} is private")]
    PhotoPrivate(String),

    #[error("photo {0} was not found")]
    PhotoNotFound(String),

    #[error("user {0} was not found")]
    UserNotFound(String),

    /// Network trouble or an unexpected response; worth retrying
    #[error("transient upstream failure: {0}")]
    Transient(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// The photo is gone for good, but the file can still be partially described
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FetchError::PhotoPrivate(_) | FetchError::PhotoNotFound(_))
    }
}

/// Read access to the photo-hosting service
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Facts about a single photo
    async fn fetch_photo(&self, photo_id: &str) -> Result<PhotoFacts, FetchError>;

    /// Facts about a user, from a profile URL or a user id
    async fn fetch_user(&self, url_or_id: &str) -> Result<UserFacts, FetchError>;
}

/// A file returned by the candidate search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePage {
    /// Media id, `M<pageid>`
    pub mid: String,

    /// Page title including the `File:` namespace
    pub title: String,
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub pages: Vec<CandidatePage>,

    /// Offset to pass to get the next page, if there is one
    pub next_offset: Option<u64>,
}

/// Read/write access to the structured-data store
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Statements currently on the file, keyed by property
    async fn read_claims(&self, mid: &str) -> Result<ExistingClaims>;

    /// Current wikitext of the file page, if it has any
    async fn read_markup(&self, mid: &str) -> Result<Option<String>>;

    /// Category titles, including the `Category:` namespace
    async fn read_categories(&self, mid: &str) -> Result<Vec<String>>;

    /// Account that uploaded the first revision
    async fn read_uploader(&self, mid: &str) -> Result<Option<String>>;

    /// Files matching a search query
    async fn search(&self, query: &str, offset: Option<u64>) -> Result<SearchResults>;

    /// Write statements to the file in a single edit
    async fn submit(&self, mid: &str, claims: &[Statement], summary: &str) -> Result<()>;
}
