//! Flickr REST API client.
//!
//! Only the handful of read-only methods the backfiller needs:
//! `flickr.photos.getInfo`, `flickr.photos.getSizes`,
//! `flickr.people.getInfo` and `flickr.urls.lookupUser`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::{FetchError, PhotoSource};
use crate::domain::{Location, PhotoFacts, UserFacts};

pub const DEFAULT_API_URL: &str = "https://api.flickr.com/services/rest/";

/// Flickr's numeric license codes, by position
const LICENSE_CODES: [&str; 17] = [
    "all-rights-reserved",
    "cc-by-nc-sa-2.0",
    "cc-by-nc-2.0",
    "cc-by-nc-nd-2.0",
    "cc-by-2.0",
    "cc-by-sa-2.0",
    "cc-by-nd-2.0",
    "nkcr",
    "usgov",
    "cc0-1.0",
    "pdm",
    "cc-by-4.0",
    "cc-by-sa-4.0",
    "cc-by-nd-4.0",
    "cc-by-nc-4.0",
    "cc-by-nc-sa-4.0",
    "cc-by-nc-nd-4.0",
];

/// Textual license id for a Flickr license code; unknown codes pass through
pub fn license_id_for_code(code: &str) -> String {
    code.trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| LICENSE_CODES.get(n))
        .map(|id| id.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Flickr API client
pub struct FlickrClient {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
}

/// Failure of a single API call, before it's given a meaning
#[derive(Debug)]
enum ApiError {
    Flickr { code: u32, message: String },
    Transport(String),
}

impl ApiError {
    fn into_fetch_error(self, subject: &str, on_code: impl Fn(u32) -> Option<FetchError>) -> FetchError {
        match self {
            ApiError::Flickr { code, message } => on_code(code).unwrap_or_else(|| {
                FetchError::Transient(format!("{} (code {}) for {}", message, code, subject))
            }),
            ApiError::Transport(message) => FetchError::Transient(message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    stat: String,
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl FlickrClient {
    pub fn new(api_key: String, api_url: String, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            api_key,
            api_url,
            client,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        debug!(method, "Calling Flickr API");

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("method", method),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .query(params)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("{} request failed: {}", method, e)))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Transport(format!("{} returned invalid JSON: {}", method, e)))?;

        let envelope: Envelope = serde_json::from_value(body.clone())
            .map_err(|e| ApiError::Transport(format!("{} returned no status: {}", method, e)))?;

        if envelope.stat != "ok" {
            return Err(ApiError::Flickr {
                code: envelope.code.unwrap_or(0),
                message: envelope.message.unwrap_or_default(),
            });
        }

        serde_json::from_value(body)
            .map_err(|e| ApiError::Transport(format!("{} returned an unexpected shape: {}", method, e)))
    }

    async fn original_url(&self, photo_id: &str) -> Option<String> {
        match self
            .call::<SizesResponse>("flickr.photos.getSizes", &[("photo_id", photo_id)])
            .await
        {
            Ok(response) => original_size(response.sizes.size),
            Err(e) => {
                debug!(photo_id, error = ?e, "No sizes for photo");
                None
            }
        }
    }

    async fn lookup_user_id(&self, url: &str) -> Result<String, FetchError> {
        let response: LookupUserResponse = self
            .call("flickr.urls.lookupUser", &[("url", url)])
            .await
            .map_err(|e| {
                e.into_fetch_error(url, |code| {
                    (code == 1).then(|| FetchError::UserNotFound(url.to_string()))
                })
            })?;

        Ok(response.user.id)
    }
}

#[async_trait]
impl PhotoSource for FlickrClient {
    async fn fetch_photo(&self, photo_id: &str) -> Result<PhotoFacts, FetchError> {
        let response: PhotoInfoResponse = self
            .call("flickr.photos.getInfo", &[("photo_id", photo_id)])
            .await
            .map_err(|e| {
                e.into_fetch_error(photo_id, |code| match code {
                    1 => Some(FetchError::PhotoNotFound(photo_id.to_string())),
                    2 => Some(FetchError::PhotoPrivate(photo_id.to_string())),
                    _ => None,
                })
            })?;

        let original_url = self.original_url(photo_id).await;

        photo_from_info(response.photo, original_url)
    }

    async fn fetch_user(&self, url_or_id: &str) -> Result<UserFacts, FetchError> {
        let user_id = if url_or_id.contains('/') {
            self.lookup_user_id(url_or_id).await?
        } else {
            url_or_id.to_string()
        };

        let response: PersonResponse = self
            .call("flickr.people.getInfo", &[("user_id", user_id.as_str())])
            .await
            .map_err(|e| {
                e.into_fetch_error(&user_id, |code| {
                    (code == 1).then(|| FetchError::UserNotFound(user_id.clone()))
                })
            })?;

        Ok(user_from_person(response.person))
    }
}

// ============================================================================
// Response shapes
// ============================================================================

/// Flickr wraps most strings as `{"_content": "..."}`
#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(rename = "_content", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PhotoInfoResponse {
    photo: PhotoInfo,
}

#[derive(Debug, Deserialize)]
struct PhotoInfo {
    id: String,
    #[serde(deserialize_with = "string_or_number")]
    license: String,
    owner: Owner,
    #[serde(default)]
    title: Content,
    dates: Dates,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    tags: Tags,
    #[serde(default)]
    urls: Urls,
}

#[derive(Debug, Deserialize)]
struct Owner {
    nsid: String,
    username: String,
    #[serde(default)]
    realname: Option<String>,
    #[serde(default)]
    path_alias: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Dates {
    #[serde(deserialize_with = "string_or_number")]
    posted: String,
    #[serde(default)]
    taken: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    takenunknown: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(deserialize_with = "string_or_number")]
    latitude: String,
    #[serde(deserialize_with = "string_or_number")]
    longitude: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    accuracy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Tags {
    #[serde(default)]
    tag: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    raw: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    machine_tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Urls {
    #[serde(default)]
    url: Vec<TypedUrl>,
}

#[derive(Debug, Deserialize)]
struct TypedUrl {
    #[serde(rename = "type")]
    url_type: String,
    #[serde(rename = "_content")]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SizesResponse {
    sizes: Sizes,
}

#[derive(Debug, Deserialize)]
struct Sizes {
    #[serde(default)]
    size: Vec<Size>,
}

#[derive(Debug, Deserialize)]
struct Size {
    label: String,
    source: String,
}

#[derive(Debug, Deserialize)]
struct LookupUserResponse {
    user: LookedUpUser,
}

#[derive(Debug, Deserialize)]
struct LookedUpUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PersonResponse {
    person: Person,
}

#[derive(Debug, Deserialize)]
struct Person {
    nsid: String,
    #[serde(default)]
    path_alias: Option<String>,
    #[serde(default)]
    username: Content,
    #[serde(default)]
    realname: Option<Content>,
}

/// Flickr sends numbers as strings or numbers depending on the method
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(if b { "1" } else { "0" }.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

// ============================================================================
// Conversion
// ============================================================================

fn profile_url(nsid: &str, path_alias: Option<&str>) -> String {
    let slug = path_alias.filter(|alias| !alias.is_empty()).unwrap_or(nsid);
    format!("https://www.flickr.com/people/{}/", slug)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn user_from_person(person: Person) -> UserFacts {
    let path_alias = non_empty(person.path_alias);

    UserFacts {
        profile_url: profile_url(&person.nsid, path_alias.as_deref()),
        id: person.nsid,
        username: person.username.content,
        realname: non_empty(person.realname.map(|r| r.content)),
        path_alias,
    }
}

fn photo_from_info(info: PhotoInfo, original_url: Option<String>) -> Result<PhotoFacts, FetchError> {
    let date_posted = info
        .dates
        .posted
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| {
            FetchError::Transient(format!(
                "photo {} has an unreadable post date: {}",
                info.id, info.dates.posted
            ))
        })?;

    let url = info
        .urls
        .url
        .into_iter()
        .find(|u| u.url_type == "photopage")
        .map(|u| u.content)
        .unwrap_or_else(|| format!("https://www.flickr.com/photos/{}/{}/", info.owner.nsid, info.id));

    let path_alias = non_empty(info.owner.path_alias);
    let owner = UserFacts {
        profile_url: profile_url(&info.owner.nsid, path_alias.as_deref()),
        id: info.owner.nsid,
        username: info.owner.username,
        realname: non_empty(info.owner.realname),
        path_alias,
    };

    Ok(PhotoFacts {
        license_id: license_id_for_code(&info.license),
        location: info.location.and_then(location_from_raw),
        date_taken: date_taken(&info.dates),
        machine_tags: info
            .tags
            .tag
            .into_iter()
            .filter(|t| matches!(t.machine_tag.as_deref(), Some(flag) if flag != "0"))
            .map(|t| t.raw)
            .collect(),
        title: non_empty(Some(info.title.content)),
        id: info.id,
        owner,
        date_posted,
        original_url,
        url,
    })
}

fn date_taken(dates: &Dates) -> Option<NaiveDate> {
    if dates.takenunknown.as_deref() == Some("1") {
        return None;
    }

    let taken = dates.taken.as_deref()?;
    NaiveDateTime::parse_from_str(taken, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(taken, "%Y-%m-%d"))
        .ok()
}

/// Flickr reports "no location" as zeroes
fn location_from_raw(raw: RawLocation) -> Option<Location> {
    let latitude: f64 = raw.latitude.parse().ok()?;
    let longitude: f64 = raw.longitude.parse().ok()?;

    if latitude == 0.0 && longitude == 0.0 {
        return None;
    }

    Some(Location {
        latitude,
        longitude,
        altitude: None,
        accuracy: raw.accuracy.and_then(|a| a.parse().ok()),
        datum: None,
    })
}

/// Only a true "Original" counts; photos without downloads have none
fn original_size(sizes: Vec<Size>) -> Option<String> {
    sizes
        .into_iter()
        .find(|s| s.label == "Original")
        .map(|s| s.source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHOTO_INFO: &str = r#"{
        "photo": {
            "id": "53208249252",
            "license": "5",
            "owner": {
                "nsid": "12403504@N02",
                "username": "The Library of Congress",
                "realname": "",
                "path_alias": "library_of_congress"
            },
            "title": {"_content": "Lighthouse at dusk"},
            "dates": {
                "posted": "1696690800",
                "taken": "2023-10-07 14:03:11",
                "takenunknown": "0"
            },
            "location": {"latitude": "51.5", "longitude": -0.12, "accuracy": "16"},
            "tags": {"tag": [
                {"raw": "lighthouse", "machine_tag": 0},
                {"raw": "bhl:page=33665645", "machine_tag": 1}
            ]},
            "urls": {"url": [
                {"type": "photopage", "_content": "https://www.flickr.com/photos/library_of_congress/53208249252/"}
            ]}
        },
        "stat": "ok"
    }"#;

    #[test]
    fn test_license_codes() {
        assert_eq!(license_id_for_code("4"), "cc-by-2.0");
        assert_eq!(license_id_for_code("10"), "pdm");
        assert_eq!(license_id_for_code("16"), "cc-by-nc-nd-4.0");
        assert_eq!(license_id_for_code("99"), "99");
    }

    #[test]
    fn test_photo_from_info() {
        let response: PhotoInfoResponse = serde_json::from_str(PHOTO_INFO).unwrap();
        let photo = photo_from_info(response.photo, Some("https://live.staticflickr.com/o.jpg".into()))
            .unwrap();

        assert_eq!(photo.id, "53208249252");
        assert_eq!(photo.license_id, "cc-by-sa-2.0");
        assert_eq!(photo.owner.realname, None);
        assert_eq!(photo.owner.display_name(), "The Library of Congress");
        assert_eq!(
            photo.owner.profile_url,
            "https://www.flickr.com/people/library_of_congress/"
        );
        assert_eq!(photo.date_taken, NaiveDate::from_ymd_opt(2023, 10, 7));
        assert_eq!(photo.date_posted.timestamp(), 1696690800);
        assert_eq!(photo.machine_tags, vec!["bhl:page=33665645".to_string()]);
        assert_eq!(photo.title.as_deref(), Some("Lighthouse at dusk"));

        let location = photo.location.unwrap();
        assert_eq!(location.latitude, 51.5);
        assert_eq!(location.longitude, -0.12);
        assert_eq!(location.accuracy, Some(16));
    }

    #[test]
    fn test_unknown_date_taken_and_zero_location() {
        let json = PHOTO_INFO
            .replace(r#""takenunknown": "0""#, r#""takenunknown": "1""#)
            .replace(r#""latitude": "51.5", "longitude": -0.12"#, r#""latitude": 0, "longitude": 0"#);
        let response: PhotoInfoResponse = serde_json::from_str(&json).unwrap();

        let photo = photo_from_info(response.photo, None).unwrap();

        assert_eq!(photo.date_taken, None);
        assert!(photo.location.is_none());
    }

    #[test]
    fn test_user_from_person() {
        let person: PersonResponse = serde_json::from_str(
            r#"{"person": {
                "nsid": "61021753@N02",
                "username": {"_content": "BioDivLibrary"},
                "realname": {"_content": "Biodiversity Heritage Library"}
            }}"#,
        )
        .unwrap();

        let user = user_from_person(person.person);

        assert_eq!(user.display_name(), "Biodiversity Heritage Library");
        assert_eq!(user.profile_url, "https://www.flickr.com/people/61021753@N02/");
    }

    #[test]
    fn test_original_size_only_from_original_label() {
        let sizes = vec![
            Size { label: "Large".into(), source: "l.jpg".into() },
            Size { label: "Original".into(), source: "o.jpg".into() },
            Size { label: "X-Large".into(), source: "xl.jpg".into() },
        ];
        assert_eq!(original_size(sizes), Some("o.jpg".to_string()));

        let sizes = vec![
            Size { label: "Large".into(), source: "l.jpg".into() },
            Size { label: "X-Large".into(), source: "xl.jpg".into() },
        ];
        assert_eq!(original_size(sizes), None);
    }

    #[test]
    fn test_error_code_mapping() {
        let error = ApiError::Flickr { code: 2, message: "Permission denied".into() };
        let mapped = error.into_fetch_error("42", |code| {
            (code == 2).then(|| FetchError::PhotoPrivate("42".into()))
        });
        assert_eq!(mapped, FetchError::PhotoPrivate("42".into()));

        let error = ApiError::Flickr { code: 105, message: "Service unavailable".into() };
        assert!(error.into_fetch_error("42", |_| None).is_transient());
    }
}
