//! Domain types for the backfiller.
//!
//! This module contains the core data structures:
//! - Statements: snaks, statements and claim sets in Wikibase shape
//! - Photo: facts about a Flickr photo and its owner
//! - Vocabulary: property/entity ids and configured lookup tables
//! - Action: edit plans
//! - Events: run log entries

pub mod action;
pub mod events;
pub mod photo;
pub mod statement;
pub mod vocabulary;

// Re-export commonly used types
pub use action::{Action, EditPlan, PlannedAction};
pub use events::{RunEvent, RunEventType};
pub use photo::{Location, PhotoFacts, UserFacts};
pub use statement::{
    DataValue, DesiredClaims, EntityId, ExistingClaims, GlobeCoordinate,
    MonolingualText, Snak, SnakType, Statement, TimeValue,
};
pub use vocabulary::{
    entities, properties, CopyrightStatus, LicenseEntry, LicenseTable, PageIdSource, Vocabulary,
};
