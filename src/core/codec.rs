//! Conversion of primitive facts into typed datavalues.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::domain::{
    entities, DataValue, EntityId, GlobeCoordinate, LicenseTable, MonolingualText, TimeValue,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Unrecognised license ID: {0}")]
    UnrecognizedLicense(String),
}

/// Precision of a date value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

impl DatePrecision {
    /// Wikibase precision code
    pub fn code(self) -> u8 {
        match self {
            DatePrecision::Year => 9,
            DatePrecision::Month => 10,
            DatePrecision::Day => 11,
        }
    }
}

pub fn string_value(value: impl Into<String>) -> DataValue {
    DataValue::String(value.into())
}

pub fn monolingual_value(text: impl Into<String>, language: impl Into<String>) -> DataValue {
    DataValue::MonolingualText(MonolingualText {
        text: text.into(),
        language: language.into(),
    })
}

/// Entity reference from an item id like `Q103204`
pub fn entity_value(entity_id: &str) -> DataValue {
    let numeric_id = entity_id
        .strip_prefix('Q')
        .and_then(|n| n.parse::<u64>().ok());

    DataValue::Entity(EntityId {
        entity_type: "item".to_string(),
        numeric_id,
        id: entity_id.to_string(),
    })
}

/// Entity reference for a license, via the license table
pub fn license_value(licenses: &LicenseTable, license_id: &str) -> Result<DataValue, CodecError> {
    licenses
        .get(license_id)
        .map(|entry| entity_value(&entry.entity))
        .ok_or_else(|| CodecError::UnrecognizedLicense(license_id.to_string()))
}

/// Gregorian date value; finer fields are zeroed below the precision
pub fn date_value(date: NaiveDate, precision: DatePrecision) -> DataValue {
    let (month, day) = match precision {
        DatePrecision::Year => (0, 0),
        DatePrecision::Month => (date.month(), 0),
        DatePrecision::Day => (date.month(), date.day()),
    };

    DataValue::Time(TimeValue {
        time: format!("+{:04}-{:02}-{:02}T00:00:00Z", date.year(), month, day),
        precision: precision.code(),
        timezone: 0,
        before: 0,
        after: 0,
        calendarmodel: entities::GREGORIAN_CALENDAR.to_string(),
    })
}

/// Globe-coordinate value; altitude defaults to zero and the globe to Earth
pub fn coordinate_value(
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    precision: Option<f64>,
    globe: Option<&str>,
) -> DataValue {
    DataValue::GlobeCoordinate(GlobeCoordinate {
        latitude,
        longitude,
        altitude: Some(altitude.unwrap_or(0.0)),
        precision,
        globe: globe.unwrap_or(entities::EARTH).to_string(),
    })
}

/// Coordinate precision (degrees) for a Flickr accuracy level
pub fn precision_for_accuracy(accuracy: Option<u8>) -> f64 {
    match accuracy {
        Some(level) if level >= 16 => 1.0 / 3600.0,
        Some(11..=15) => 0.001,
        Some(6..=10) => 0.01,
        Some(_) => 0.1,
        None => 1.0 / 3600.0,
    }
}
