//! backfillr - Backfill Wikimedia Commons structured data from Flickr
//!
//! Files copied from Flickr to Commons often carry little or no structured
//! data about where they came from. backfillr works out which Flickr photo
//! a file was copied from, builds the claims that describe it, and plans
//! the smallest edit that brings the file in line.
//!
//! # Pipeline
//!
//! For each file:
//! - extract: find the Flickr photo id in existing claims or page markup
//! - synthesize: build the desired claims from what Flickr knows
//! - plan: diff desired against existing claims, one action per property
//!
//! Anything the planner can't decide safely is marked `unknown` and left
//! for a human.
//!
//! # Modules
//!
//! - `adapters`: Flickr and Commons clients behind `PhotoSource` / `ClaimStore`
//! - `core`: codec, synthesizer, extractor, comparator, planner, runner
//! - `domain`: statements, photo facts, vocabulary, edit plans, run events
//! - `flickr_url`: Flickr URL canonicalization
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Plan one file
//! backfillr plan M76
//!
//! # Run the bot without writing
//! backfillr run --dry-run --limit 20
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod flickr_url;

// Re-export main types at crate root for convenience
pub use crate::core::{
    equivalent, extract, plan, synthesize, Backfiller, ClaimSynthesizer, ExtractError,
    IdentifierMatch, PartialFacts, PhotoEvidence, Synthesis,
};
pub use adapters::{ClaimStore, FetchError, PhotoSource};
pub use domain::{
    Action, DesiredClaims, EditPlan, ExistingClaims, PhotoFacts, Snak, Statement, UserFacts,
    Vocabulary,
};
pub use flickr_url::{are_equivalent_flickr_urls, parse_flickr_url, FlickrResource, UrlError};
