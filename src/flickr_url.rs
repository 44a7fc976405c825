//! Flickr URL canonicalization.
//!
//! Maps the many surface forms of a Flickr URL (host aliases, short links,
//! static image URLs, trailing slashes, query strings) onto the resource
//! they identify, so two URLs can be compared by what they point at.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Alphabet used by flic.kr short links
const BASE58_ALPHABET: &str = "123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// A Flickr resource, independent of how its URL was spelled
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlickrResource {
    Homepage,

    /// Photo ids are globally unique, so the owner path is not kept
    Photo { photo_id: String },

    User { user_url: String },

    Album { user_url: String, album_id: String },

    Gallery { user_url: String, gallery_id: String },

    Group { group_url: String },

    Tag { tag: String },
}

impl FlickrResource {
    pub fn photo_id(&self) -> Option<&str> {
        match self {
            FlickrResource::Photo { photo_id } => Some(photo_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("not a Flickr URL: {0}")]
    NotAFlickrUrl(String),

    #[error("unrecognised Flickr URL: {0}")]
    UnrecognisedUrl(String),
}

/// Parse a URL and work out which Flickr resource it identifies
pub fn parse_flickr_url(input: &str) -> Result<FlickrResource, UrlError> {
    let url = parse_lenient(input)?;
    let host = url
        .host_str()
        .ok_or_else(|| UrlError::NotAFlickrUrl(input.to_string()))?
        .to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let resource = if is_flickr_host(&host) {
        parse_flickr_path(&url, &segments)
    } else if is_short_host(&host) {
        parse_short_path(&segments)
    } else if is_static_host(&host) {
        parse_static_path(&segments)
    } else {
        return Err(UrlError::NotAFlickrUrl(input.to_string()));
    };

    resource.ok_or_else(|| UrlError::UnrecognisedUrl(input.to_string()))
}

/// True iff both URLs parse and identify the same resource
pub fn are_equivalent_flickr_urls(url1: &str, url2: &str) -> bool {
    match (parse_flickr_url(url1), parse_flickr_url(url2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Owner profile URL for a `/photos/<user>/<id>` page URL
pub fn user_url_from_photo_url(input: &str) -> Option<String> {
    let url = parse_lenient(input).ok()?;
    if !is_flickr_host(&url.host_str()?.to_ascii_lowercase()) {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["photos", user, photo_id, ..] if is_digits(photo_id) => Some(user_url(user)),
        _ => None,
    }
}

/// Every Flickr-looking URL in a block of text, in order of appearance
pub fn find_flickr_urls(text: &str) -> Vec<&str> {
    flickr_url_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')', ';', ':', '!', '?']))
        .collect()
}

fn flickr_url_regex() -> &'static Regex {
    static FLICKR_URL: OnceLock<Regex> = OnceLock::new();
    FLICKR_URL.get_or_init(|| {
        Regex::new(
            r#"(?i)\b(?:https?://)?(?:[a-z0-9-]+\.)*(?:staticflickr\.com|flickr\.com|flic\.kr)/[^\s\[\]|<>"'{}]*"#,
        )
        .expect("flickr url pattern is valid")
    })
}

/// Accepts URLs with or without a scheme
fn parse_lenient(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();

    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(UrlError::NotAFlickrUrl(input.to_string()));
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    Url::parse(&candidate).map_err(|_| UrlError::NotAFlickrUrl(input.to_string()))
}

fn is_flickr_host(host: &str) -> bool {
    matches!(
        host,
        "flickr.com" | "www.flickr.com" | "m.flickr.com" | "secure.flickr.com"
    )
}

fn is_short_host(host: &str) -> bool {
    matches!(host, "flic.kr" | "www.flic.kr")
}

fn is_static_host(host: &str) -> bool {
    host == "staticflickr.com"
        || host.ends_with(".staticflickr.com")
        || host == "static.flickr.com"
        || host.ends_with(".static.flickr.com")
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn user_url(user: &str) -> String {
    format!("https://www.flickr.com/photos/{}/", user)
}

fn parse_flickr_path(url: &Url, segments: &[&str]) -> Option<FlickrResource> {
    let resource = match segments {
        [] => FlickrResource::Homepage,
        ["photo.gne"] => {
            let photo_id = url
                .query_pairs()
                .find(|(key, _)| key == "id")
                .map(|(_, value)| value.into_owned())
                .filter(|id| is_digits(id))?;
            FlickrResource::Photo { photo_id }
        }
        ["photos", "tags", tag, ..] => FlickrResource::Tag {
            tag: tag.to_string(),
        },
        ["photos", user, "albums" | "sets", album_id, ..] if is_digits(album_id) => {
            FlickrResource::Album {
                user_url: user_url(user),
                album_id: album_id.to_string(),
            }
        }
        ["photos", user, "galleries", gallery_id, ..] => FlickrResource::Gallery {
            user_url: user_url(user),
            gallery_id: gallery_id.to_string(),
        },
        ["photos", _, photo_id, ..] if is_digits(photo_id) => FlickrResource::Photo {
            photo_id: photo_id.to_string(),
        },
        ["photos", user] | ["people", user, ..] => FlickrResource::User {
            user_url: user_url(user),
        },
        ["photos", user, page]
            if page
                .strip_prefix("page")
                .map(is_digits)
                .unwrap_or(false) =>
        {
            FlickrResource::User {
                user_url: user_url(user),
            }
        }
        ["groups", group, ..] => FlickrResource::Group {
            group_url: format!("https://www.flickr.com/groups/{}/", group),
        },
        _ => return None,
    };

    Some(resource)
}

fn parse_short_path(segments: &[&str]) -> Option<FlickrResource> {
    match segments {
        ["p", code] => decode_base58(code).map(|id| FlickrResource::Photo {
            photo_id: id.to_string(),
        }),
        _ => None,
    }
}

/// `.../<photo_id>_<secret>[_<size>].<ext>`
fn parse_static_path(segments: &[&str]) -> Option<FlickrResource> {
    let filename = segments.last()?;
    let stem = filename.split('.').next()?;
    let photo_id = stem.split('_').next()?;

    if is_digits(photo_id) && stem.contains('_') {
        Some(FlickrResource::Photo {
            photo_id: photo_id.to_string(),
        })
    } else {
        None
    }
}

fn decode_base58(code: &str) -> Option<u64> {
    if code.is_empty() {
        return None;
    }

    code.chars().try_fold(0u64, |acc, c| {
        let digit = BASE58_ALPHABET.find(c)? as u64;
        acc.checked_mul(58)?.checked_add(digit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(id: &str) -> FlickrResource {
        FlickrResource::Photo {
            photo_id: id.to_string(),
        }
    }

    #[test]
    fn test_photo_page_forms() {
        let forms = [
            "https://www.flickr.com/photos/coast_guard/53208249252/",
            "https://www.flickr.com/photos/coast_guard/53208249252",
            "http://flickr.com/photos/coast_guard/53208249252/in/photostream/",
            "https://m.flickr.com/photos/coast_guard/53208249252/sizes/o/",
            "flickr.com/photos/coast_guard/53208249252?utm_source=x&ref=y",
            "  https://secure.flickr.com/photos/12345678@N00/53208249252/  ",
            "https://www.flickr.com/photo.gne?id=53208249252",
            "https://flic.kr/p/2p4QbKN",
            "https://live.staticflickr.com/65535/53208249252_cab6fb5b4b_o.jpg",
            "https://farm5.static.flickr.com/4586/53208249252_bb4ecff5f4.jpg",
        ];

        for form in forms {
            assert_eq!(parse_flickr_url(form), Ok(photo("53208249252")), "{}", form);
        }
    }

    #[test]
    fn test_other_resources() {
        assert_eq!(
            parse_flickr_url("https://www.flickr.com/photos/coast_guard/"),
            Ok(FlickrResource::User {
                user_url: "https://www.flickr.com/photos/coast_guard/".to_string()
            })
        );
        assert_eq!(
            parse_flickr_url("https://www.flickr.com/photos/coast_guard/page3"),
            parse_flickr_url("https://www.flickr.com/photos/coast_guard")
        );
        assert_eq!(
            parse_flickr_url("https://www.flickr.com/photos/coast_guard/albums/72157"),
            Ok(FlickrResource::Album {
                user_url: "https://www.flickr.com/photos/coast_guard/".to_string(),
                album_id: "72157".to_string(),
            })
        );
        assert_eq!(
            parse_flickr_url("https://www.flickr.com/photos/tags/sunset"),
            Ok(FlickrResource::Tag {
                tag: "sunset".to_string()
            })
        );
        assert_eq!(
            parse_flickr_url("https://www.flickr.com/"),
            Ok(FlickrResource::Homepage)
        );
    }

    #[test]
    fn test_not_flickr() {
        assert!(matches!(
            parse_flickr_url("https://example.com/photos/a/123"),
            Err(UrlError::NotAFlickrUrl(_))
        ));
        assert!(matches!(
            parse_flickr_url("ftp://flickr.com/photos/a/123"),
            Err(UrlError::NotAFlickrUrl(_))
        ));
        assert!(matches!(
            parse_flickr_url(""),
            Err(UrlError::NotAFlickrUrl(_))
        ));
    }

    #[test]
    fn test_unrecognised() {
        assert!(matches!(
            parse_flickr_url("https://www.flickr.com/help/terms"),
            Err(UrlError::UnrecognisedUrl(_))
        ));
        assert!(matches!(
            parse_flickr_url("https://flic.kr/p/0OIl"),
            Err(UrlError::UnrecognisedUrl(_))
        ));
    }

    #[test]
    fn test_equivalence() {
        assert!(are_equivalent_flickr_urls(
            "https://www.flickr.com/photos/a/42/",
            "https://flickr.com/photos/a/42"
        ));
        assert!(!are_equivalent_flickr_urls(
            "https://www.flickr.com/photos/a/42/",
            "https://www.flickr.com/photos/a/43/"
        ));
        assert!(!are_equivalent_flickr_urls(
            "https://www.flickr.com/photos/a/42/",
            "not a url at all"
        ));
    }

    #[test]
    fn test_decode_base58() {
        assert_eq!(decode_base58("2p4QbKN"), Some(53208249252));
        assert_eq!(decode_base58("frGo1L"), Some(9479785684));
        assert_eq!(decode_base58("0"), None);
    }

    #[test]
    fn test_user_url_from_photo_url() {
        assert_eq!(
            user_url_from_photo_url("https://www.flickr.com/photos/coast_guard/53208249252/"),
            Some("https://www.flickr.com/photos/coast_guard/".to_string())
        );
        assert_eq!(user_url_from_photo_url("https://flic.kr/p/2p4QbKN"), None);
    }

    #[test]
    fn test_find_flickr_urls() {
        let text = "See [https://www.flickr.com/photos/a/42/ the original]. \
                    Also www.flickr.com/photos/b/43, and https://example.com/x.";

        assert_eq!(
            find_flickr_urls(text),
            vec!["https://www.flickr.com/photos/a/42/", "www.flickr.com/photos/b/43"]
        );
        assert!(find_flickr_urls("notflickr.com/photos/a/1").is_empty());
    }
}
