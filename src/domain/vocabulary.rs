//! Property ids, entity ids and the lookup tables the synthesizer is
//! configured with.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Wikidata properties used on Commons files
pub mod properties {
    pub const FLICKR_PHOTO_ID: &str = "P12120";
    pub const CREATOR: &str = "P170";
    pub const AUTHOR_NAME_STRING: &str = "P2093";
    pub const URL: &str = "P2699";
    pub const FLICKR_USER_ID: &str = "P3267";
    pub const SOURCE_OF_FILE: &str = "P7482";
    pub const DESCRIBED_AT_URL: &str = "P973";
    pub const OPERATOR: &str = "P137";
    pub const RETRIEVED: &str = "P813";
    pub const COPYRIGHT_LICENSE: &str = "P275";
    pub const COPYRIGHT_STATUS: &str = "P6216";
    pub const DETERMINATION_METHOD: &str = "P459";
    pub const TITLE: &str = "P1476";
    pub const COORDINATES_OF_POINT_OF_VIEW: &str = "P1259";
    pub const INCEPTION: &str = "P571";
    pub const BHL_PAGE_ID: &str = "P687";
    pub const PUBLISHED_IN: &str = "P1433";
    pub const PUBLICATION_DATE: &str = "P577";
}

/// Wikidata items and concept URIs
pub mod entities {
    pub const FILE_AVAILABLE_ON_INTERNET: &str = "Q74228490";
    pub const FLICKR: &str = "Q103204";
    pub const COPYRIGHTED: &str = "Q50423863";
    pub const PUBLIC_DOMAIN: &str = "Q19652";
    pub const EARTH: &str = "http://www.wikidata.org/entity/Q2";
    pub const GREGORIAN_CALENDAR: &str = "http://www.wikidata.org/entity/Q1985727";
}

/// Copyright status implied by a license
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyrightStatus {
    Copyrighted,
    PublicDomain { determination_method: String },
}

/// How one Flickr license maps onto the knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseEntry {
    /// Item for the license itself
    pub entity: String,
    pub status: CopyrightStatus,
}

/// Closed license-id → entity table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseTable(HashMap<String, LicenseEntry>);

impl Default for LicenseTable {
    fn default() -> Self {
        let copyrighted = |entity: &str| LicenseEntry {
            entity: entity.to_string(),
            status: CopyrightStatus::Copyrighted,
        };
        let public_domain = |entity: &str, method: &str| LicenseEntry {
            entity: entity.to_string(),
            status: CopyrightStatus::PublicDomain {
                determination_method: method.to_string(),
            },
        };

        Self(
            [
                ("cc-by-2.0", copyrighted("Q19125117")),
                ("cc-by-sa-2.0", copyrighted("Q19068220")),
                ("cc-by-4.0", copyrighted("Q20007257")),
                ("cc-by-sa-4.0", copyrighted("Q18199165")),
                ("cc0-1.0", public_domain("Q6938433", "Q88088423")),
                ("usgov", public_domain("Q60671452", "Q60671452")),
                ("pdm", public_domain("Q7257361", "Q7257361")),
            ]
            .into_iter()
            .map(|(id, entry)| (id.to_string(), entry))
            .collect(),
        )
    }
}

impl LicenseTable {
    pub fn get(&self, license_id: &str) -> Option<&LicenseEntry> {
        self.0.get(license_id)
    }

    pub fn contains(&self, license_id: &str) -> bool {
        self.0.contains_key(license_id)
    }

    /// Add or override entries (config file additions win)
    pub fn extend(&mut self, entries: impl IntoIterator<Item = (String, LicenseEntry)>) {
        self.0.extend(entries);
    }
}

/// An allow-listed institutional account whose machine tags carry an
/// external page identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIdSource {
    /// Flickr NSID of the institution
    pub user_id: String,

    /// Machine tag prefix, e.g. `bhl:page=`
    pub machine_tag_prefix: String,

    /// Property the page id is written to
    pub property: String,
}

impl PageIdSource {
    /// Biodiversity Heritage Library
    pub fn biodiversity_heritage_library() -> Self {
        Self {
            user_id: "61021753@N02".to_string(),
            machine_tag_prefix: "bhl:page=".to_string(),
            property: properties::BHL_PAGE_ID.to_string(),
        }
    }

    /// First machine tag with our prefix and an all-digit value
    pub fn page_id<'a>(&self, machine_tags: &'a [String]) -> Option<&'a str> {
        machine_tags.iter().find_map(|tag| {
            tag.strip_prefix(self.machine_tag_prefix.as_str())
                .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        })
    }
}

/// Immutable lookup data injected into the claim synthesizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub licenses: LicenseTable,
    pub page_id_sources: Vec<PageIdSource>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            licenses: LicenseTable::default(),
            page_id_sources: vec![PageIdSource::biodiversity_heritage_library()],
        }
    }
}

impl Vocabulary {
    /// Allow-listed page id source for a Flickr user, if any
    pub fn page_id_source_for(&self, user_id: &str) -> Option<&PageIdSource> {
        self.page_id_sources.iter().find(|s| s.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_license_table() {
        let table = LicenseTable::default();

        assert_eq!(table.get("cc-by-2.0").unwrap().entity, "Q19125117");
        assert_eq!(
            table.get("cc-by-sa-2.0").unwrap().status,
            CopyrightStatus::Copyrighted
        );
        assert!(matches!(
            table.get("cc0-1.0").unwrap().status,
            CopyrightStatus::PublicDomain { .. }
        ));
        assert!(!table.contains("all-rights-reserved"));
        assert!(!table.contains("cc-by-nc-2.0"));
    }

    #[test]
    fn test_license_table_yaml() {
        let yaml = r#"
cc-by-3.0:
  entity: Q14947546
  status: copyrighted
nkcr:
  entity: Q99263261
  status:
    public_domain:
      determination_method: Q99263261
"#;
        let table: LicenseTable = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(table.get("cc-by-3.0").unwrap().entity, "Q14947546");
        assert_eq!(
            table.get("nkcr").unwrap().status,
            CopyrightStatus::PublicDomain {
                determination_method: "Q99263261".to_string()
            }
        );
    }

    #[test]
    fn test_page_id_from_machine_tags() {
        let source = PageIdSource::biodiversity_heritage_library();
        let tags = vec![
            "taxonomy:binomial=Pica pica".to_string(),
            "bhl:page=".to_string(),
            "bhl:page=abc".to_string(),
            "bhl:page=33665645".to_string(),
        ];

        assert_eq!(source.page_id(&tags), Some("33665645"));
        assert_eq!(source.page_id(&[]), None);
    }

    #[test]
    fn test_page_id_source_lookup() {
        let vocabulary = Vocabulary::default();

        assert!(vocabulary.page_id_source_for("61021753@N02").is_some());
        assert!(vocabulary.page_id_source_for("12345678@N00").is_none());
    }
}
