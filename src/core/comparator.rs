//! Decides whether an existing statement already says what we want to say.
//!
//! Equivalent means "definitely nothing to do". Not equivalent means we
//! *might* need to do something; what exactly is the planner's call.

use crate::domain::{properties, DataValue, Snak, Statement};
use crate::flickr_url::are_equivalent_flickr_urls;

/// Whether `existing` and `desired` represent the same fact.
///
/// Any qualifiers on either side make the pair non-equivalent, even when
/// the qualifiers match; the planner looks at those cases itself.
pub fn equivalent(existing: &Statement, desired: &Statement) -> bool {
    if existing.has_qualifiers() || desired.has_qualifiers() {
        return false;
    }

    equivalent_snaks(&existing.mainsnak, &desired.mainsnak)
}

/// Whether two snaks assert the same thing
pub fn equivalent_snaks(existing: &Snak, desired: &Snak) -> bool {
    if existing.property != desired.property || existing.snaktype != desired.snaktype {
        return false;
    }

    match (&existing.datavalue, &desired.datavalue) {
        // Same property and kind, nothing else to compare
        (None, None) => true,
        (Some(existing_value), Some(desired_value)) => {
            equivalent_values(&existing.property, existing_value, desired_value)
        }
        _ => false,
    }
}

fn equivalent_values(property: &str, existing: &DataValue, desired: &DataValue) -> bool {
    match (existing, desired) {
        // Precision is deliberately ignored
        (DataValue::GlobeCoordinate(a), DataValue::GlobeCoordinate(b)) => {
            a.latitude == b.latitude
                && a.longitude == b.longitude
                && a.altitude.unwrap_or(0.0) == b.altitude.unwrap_or(0.0)
                && a.globe == b.globe
        }
        (DataValue::String(a), DataValue::String(b)) if is_url_property(property) => {
            are_equivalent_flickr_urls(a, b)
        }
        (DataValue::Entity(_), _)
        | (DataValue::String(_), _)
        | (DataValue::MonolingualText(_), _)
        | (DataValue::Time(_), _)
        | (DataValue::GlobeCoordinate(_), _)
        | (DataValue::Quantity(_), _) => existing == desired,
    }
}

fn is_url_property(property: &str) -> bool {
    property == properties::DESCRIBED_AT_URL || property == properties::URL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{coordinate_value, entity_value, string_value};

    fn url_snak(property: &str, url: &str) -> Snak {
        Snak::value(property, string_value(url))
    }

    #[test]
    fn test_some_value_snaks_are_equivalent() {
        assert!(equivalent_snaks(
            &Snak::some_value("P170"),
            &Snak::some_value("P170")
        ));
        assert!(!equivalent_snaks(
            &Snak::some_value("P170"),
            &Snak::no_value("P170")
        ));
    }

    #[test]
    fn test_value_and_missing_datavalue_differ() {
        let mut bare = Snak::value("P275", entity_value("Q19125117"));
        bare.datavalue = None;

        assert!(!equivalent_snaks(
            &bare,
            &Snak::value("P275", entity_value("Q19125117"))
        ));
    }

    #[test]
    fn test_url_properties_compare_by_resource() {
        for property in ["P973", "P2699"] {
            assert!(equivalent_snaks(
                &url_snak(property, "https://www.flickr.com/photos/a/42/"),
                &url_snak(property, "http://flickr.com/photos/a/42"),
            ));
        }
    }

    #[test]
    fn test_other_string_properties_compare_exactly() {
        assert!(!equivalent_snaks(
            &url_snak("P12120", "https://www.flickr.com/photos/a/42/"),
            &url_snak("P12120", "http://flickr.com/photos/a/42"),
        ));
    }

    #[test]
    fn test_unparseable_urls_are_not_equivalent() {
        assert!(!equivalent_snaks(
            &url_snak("P973", "https://example.com/a"),
            &url_snak("P973", "https://example.com/a"),
        ));
    }

    #[test]
    fn test_mismatched_types_are_not_equivalent() {
        assert!(!equivalent_snaks(
            &Snak::value("P1259", coordinate_value(1.0, 2.0, None, None, None)),
            &Snak::value("P1259", string_value("1,2")),
        ));
    }

    #[test]
    fn test_null_altitude_matches_zero() {
        let mut existing = Snak::value("P1259", coordinate_value(1.0, 2.0, None, None, None));
        if let Some(DataValue::GlobeCoordinate(coord)) = &mut existing.datavalue {
            coord.altitude = None;
        }

        assert!(equivalent_snaks(
            &existing,
            &Snak::value("P1259", coordinate_value(1.0, 2.0, Some(0.0), None, None)),
        ));
    }
}
