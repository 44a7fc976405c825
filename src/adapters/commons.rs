//! Wikimedia Commons client over the MediaWiki Action API.
//!
//! Reads go through `wbgetentities` and `action=query`; writes through
//! `wbeditentity` with a CSRF token. Authentication is an optional OAuth 2
//! bearer token.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{CandidatePage, ClaimStore, SearchResults};
use crate::domain::{ExistingClaims, Statement};

pub const DEFAULT_API_URL: &str = "https://commons.wikimedia.org/w/api.php";

/// Results per search request
const SEARCH_BATCH: &str = "50";

/// Commons API client
pub struct CommonsClient {
    api_url: String,
    access_token: Option<String>,
    tags: Vec<String>,
    client: reqwest::Client,
}

impl CommonsClient {
    pub fn new(
        api_url: String,
        user_agent: &str,
        access_token: Option<String>,
        tags: Vec<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_url,
            access_token,
            tags,
            client,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET with the common parameters; API-level errors become `Err`
    async fn get(&self, params: &[(&str, &str)]) -> Result<Value> {
        let request = self
            .client
            .get(&self.api_url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params);

        let response = self
            .authorize(request)
            .send()
            .await
            .context("Failed to reach the Commons API")?;

        let body: Value = response
            .json()
            .await
            .context("Failed to parse Commons API response")?;

        check_api_error(&body)?;
        Ok(body)
    }

    async fn csrf_token(&self) -> Result<String> {
        let body = self
            .get(&[("action", "query"), ("meta", "tokens"), ("type", "csrf")])
            .await?;

        body.pointer("/query/tokens/csrftoken")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("Commons API returned no CSRF token")
    }

    /// The single page in a `pageids=` query
    async fn query_page(&self, mid: &str, params: &[(&str, &str)]) -> Result<Value> {
        let page_id = page_id(mid)?;

        let mut all_params = vec![("action", "query"), ("pageids", page_id)];
        all_params.extend_from_slice(params);

        let body = self.get(&all_params).await?;
        single_page(body, mid)
    }
}

#[async_trait]
impl ClaimStore for CommonsClient {
    async fn read_claims(&self, mid: &str) -> Result<ExistingClaims> {
        let body = self
            .get(&[("action", "wbgetentities"), ("ids", mid)])
            .await
            .with_context(|| format!("Failed to read structured data for {}", mid))?;

        claims_from_entities(&body, mid)
    }

    async fn read_markup(&self, mid: &str) -> Result<Option<String>> {
        let page = self
            .query_page(
                mid,
                &[
                    ("prop", "revisions"),
                    ("rvprop", "content"),
                    ("rvslots", "main"),
                ],
            )
            .await
            .with_context(|| format!("Failed to read wikitext for {}", mid))?;

        Ok(page
            .pointer("/revisions/0/slots/main/content")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn read_categories(&self, mid: &str) -> Result<Vec<String>> {
        let page = self
            .query_page(mid, &[("prop", "categories"), ("cllimit", "max")])
            .await
            .with_context(|| format!("Failed to read categories for {}", mid))?;

        Ok(categories_from_page(&page))
    }

    async fn read_uploader(&self, mid: &str) -> Result<Option<String>> {
        let page = self
            .query_page(
                mid,
                &[
                    ("prop", "revisions"),
                    ("rvprop", "user"),
                    ("rvdir", "newer"),
                    ("rvlimit", "1"),
                ],
            )
            .await
            .with_context(|| format!("Failed to read upload history for {}", mid))?;

        Ok(page
            .pointer("/revisions/0/user")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn search(&self, query: &str, offset: Option<u64>) -> Result<SearchResults> {
        let offset = offset.unwrap_or(0).to_string();

        let body = self
            .get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srnamespace", "6"),
                ("srlimit", SEARCH_BATCH),
                ("sroffset", offset.as_str()),
            ])
            .await
            .context("Failed to search Commons")?;

        Ok(search_results(&body))
    }

    async fn submit(&self, mid: &str, claims: &[Statement], summary: &str) -> Result<()> {
        let token = self.csrf_token().await?;
        let data = serde_json::to_string(&serde_json::json!({ "claims": claims }))
            .context("Failed to serialize claims")?;
        let tags = self.tags.join("|");

        let mut form = vec![
            ("action", "wbeditentity"),
            ("format", "json"),
            ("formatversion", "2"),
            ("id", mid),
            ("data", data.as_str()),
            ("summary", summary),
            ("bot", "1"),
            ("token", token.as_str()),
        ];
        if !tags.is_empty() {
            form.push(("tags", tags.as_str()));
        }

        let request = self.client.post(&self.api_url).form(&form);
        let response = self
            .authorize(request)
            .send()
            .await
            .with_context(|| format!("Failed to submit edit for {}", mid))?;

        let body: Value = response
            .json()
            .await
            .context("Failed to parse edit response")?;

        check_api_error(&body).with_context(|| format!("Edit to {} was rejected", mid))?;

        info!(mid, claims = claims.len(), "Submitted structured data edit");
        Ok(())
    }
}

/// `M123` -> `123`
fn page_id(mid: &str) -> Result<&str> {
    match mid.strip_prefix('M') {
        Some(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => Ok(id),
        _ => bail!("Not a media id: {}", mid),
    }
}

fn check_api_error(body: &Value) -> Result<()> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
        let info = error.get("info").and_then(Value::as_str).unwrap_or_default();
        bail!("Commons API error {}: {}", code, info);
    }
    Ok(())
}

fn single_page(body: Value, mid: &str) -> Result<Value> {
    let page = body
        .pointer("/query/pages/0")
        .cloned()
        .with_context(|| format!("No page in response for {}", mid))?;

    if page.get("missing").is_some() || page.get("invalid").is_some() {
        bail!("Page for {} does not exist", mid);
    }

    Ok(page)
}

/// Statements of one entity from a `wbgetentities` response.
///
/// An entity with no statements comes back as `"statements": []`.
fn claims_from_entities(body: &Value, mid: &str) -> Result<ExistingClaims> {
    let entity = body
        .pointer(&format!("/entities/{}", mid))
        .with_context(|| format!("No entity {} in response", mid))?;

    if entity.get("missing").is_some() {
        debug!(mid, "Entity has no structured data yet");
        return Ok(ExistingClaims::new());
    }

    match entity.get("statements") {
        None | Some(Value::Null) => Ok(ExistingClaims::new()),
        Some(Value::Array(statements)) if statements.is_empty() => Ok(ExistingClaims::new()),
        Some(statements) => serde_json::from_value(statements.clone())
            .with_context(|| format!("Failed to parse statements of {}", mid)),
    }
}

fn categories_from_page(page: &Value) -> Vec<String> {
    page.get("categories")
        .and_then(Value::as_array)
        .map(|categories| {
            categories
                .iter()
                .filter_map(|c| c.get("title").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn search_results(body: &Value) -> SearchResults {
    let pages = body
        .pointer("/query/search")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| {
                    Some(CandidatePage {
                        mid: format!("M{}", hit.get("pageid")?.as_u64()?),
                        title: hit.get("title")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    SearchResults {
        pages,
        next_offset: body.pointer("/continue/sroffset").and_then(Value::as_u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_id() {
        assert_eq!(page_id("M76").unwrap(), "76");
        assert!(page_id("76").is_err());
        assert!(page_id("M").is_err());
        assert!(page_id("Mx1").is_err());
    }

    #[test]
    fn test_empty_statements_are_an_array() {
        let body = json!({"entities": {"M76": {"id": "M76", "statements": []}}});

        let claims = claims_from_entities(&body, "M76").unwrap();

        assert!(claims.is_empty());
    }

    #[test]
    fn test_missing_entity_has_no_claims() {
        let body = json!({"entities": {"M76": {"id": "M76", "missing": true}}});

        assert!(claims_from_entities(&body, "M76").unwrap().is_empty());
    }

    #[test]
    fn test_claims_from_entities() {
        let body = json!({"entities": {"M76": {"statements": {
            "P12120": [{
                "mainsnak": {
                    "snaktype": "value",
                    "property": "P12120",
                    "datavalue": {"type": "string", "value": "42"}
                },
                "type": "statement",
                "id": "M76$abc",
                "rank": "normal"
            }],
            "P170": [{
                "mainsnak": {"snaktype": "somevalue", "property": "P170"},
                "type": "statement",
                "id": "M76$def"
            }]
        }}}});

        let claims = claims_from_entities(&body, "M76").unwrap();

        assert_eq!(claims.get("P12120")[0].id.as_deref(), Some("M76$abc"));
        assert_eq!(claims.get("P170").len(), 1);
        assert!(claims.get("P275").is_empty());
    }

    #[test]
    fn test_api_error() {
        let body = json!({"error": {"code": "badtoken", "info": "Invalid CSRF token."}});

        let error = check_api_error(&body).unwrap_err();

        assert!(error.to_string().contains("badtoken"));
    }

    #[test]
    fn test_single_page_missing() {
        let body = json!({"query": {"pages": [{"pageid": 76, "missing": true}]}});

        assert!(single_page(body, "M76").is_err());
    }

    #[test]
    fn test_categories_and_search() {
        let page = json!({"pageid": 76, "categories": [
            {"ns": 14, "title": "Category:Flickr images reviewed by FlickreviewR 2"},
            {"ns": 14, "title": "Category:Lighthouses"}
        ]});
        assert_eq!(categories_from_page(&page).len(), 2);

        let body = json!({
            "continue": {"sroffset": 50, "continue": "-||"},
            "query": {"search": [{"ns": 6, "title": "File:A.jpg", "pageid": 76}]}
        });
        let results = search_results(&body);
        assert_eq!(
            results.pages,
            vec![CandidatePage { mid: "M76".into(), title: "File:A.jpg".into() }]
        );
        assert_eq!(results.next_offset, Some(50));
    }
}
