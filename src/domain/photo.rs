//! Canonical facts about a Flickr photo and its owner.
//!
//! Built once per reconciliation pass from whatever the Flickr client
//! returned, then only read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A Flickr member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFacts {
    /// NSID, e.g. `61021753@N02`
    pub id: String,

    pub username: String,

    /// Real name; Flickr sends an empty string when unset
    #[serde(default)]
    pub realname: Option<String>,

    /// Vanity path segment (`/photos/<path_alias>/`), if the user chose one
    #[serde(default)]
    pub path_alias: Option<String>,

    pub profile_url: String,
}

impl UserFacts {
    /// Real name if set, otherwise the username
    pub fn display_name(&self) -> &str {
        match self.realname.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

/// Where a photo was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,

    #[serde(default)]
    pub altitude: Option<f64>,

    /// Flickr accuracy level, 1 (world) to 16 (street)
    #[serde(default)]
    pub accuracy: Option<u8>,

    /// Globe/datum the coordinates refer to; Earth when absent
    #[serde(default)]
    pub datum: Option<String>,
}

/// Everything the claim synthesizer needs to know about one photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoFacts {
    pub id: String,

    pub owner: UserFacts,

    /// Textual license id, e.g. `cc-by-2.0`
    pub license_id: String,

    #[serde(default)]
    pub location: Option<Location>,

    #[serde(default)]
    pub date_taken: Option<NaiveDate>,

    pub date_posted: DateTime<Utc>,

    /// Raw machine tags (`namespace:predicate=value`)
    #[serde(default)]
    pub machine_tags: Vec<String>,

    /// URL of the "Original" size; not every photo allows downloads
    #[serde(default)]
    pub original_url: Option<String>,

    /// Canonical photo page URL
    pub url: String,

    #[serde(default)]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(realname: Option<&str>) -> UserFacts {
        UserFacts {
            id: "12345678@N00".to_string(),
            username: "shutterbug".to_string(),
            realname: realname.map(str::to_string),
            path_alias: None,
            profile_url: "https://www.flickr.com/photos/12345678@N00/".to_string(),
        }
    }

    #[test]
    fn test_display_name_prefers_realname() {
        assert_eq!(user(Some("Jane Doe")).display_name(), "Jane Doe");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(user(None).display_name(), "shutterbug");
        assert_eq!(user(Some("")).display_name(), "shutterbug");
        assert_eq!(user(Some("   ")).display_name(), "shutterbug");
    }
}
