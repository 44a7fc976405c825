//! Reconciles Commons files against the Flickr photos they came from.
//!
//! `update_file` does one file: read what is there, work out which photo it
//! is, fetch what Flickr knows, and plan the edit. `run` drives it over the
//! candidate search, writing a run log as it goes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{ClaimStore, FetchError, PhotoSource};
use crate::domain::{properties, EditPlan, RunEventType, Statement, UserFacts};
use crate::flickr_url::user_url_from_photo_url;

use super::extractor::{extract, IdentifierMatch};
use super::planner::plan;
use super::retry::RetryPolicy;
use super::run_log::{generate_idempotency_key, RunLog};
use super::synthesizer::{ClaimSynthesizer, PartialFacts, PhotoEvidence, Synthesis};

/// Whether the writer may overwrite existing statements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// Replacements are always left for manual review
    #[default]
    Never,

    Always,

    /// Only on files the acting account uploaded itself
    WhenUploader,
}

/// Result of reconciling one file
#[derive(Debug, Clone, Serialize)]
pub struct FileUpdate {
    pub mid: String,

    pub identifier: IdentifierMatch,

    /// True when the photo could not be fetched and only partial claims were built
    pub partial: bool,

    pub plan: EditPlan,

    /// What would be sent to the store
    pub claims: Vec<Statement>,
}

/// Options for a batch run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub search_query: String,

    /// Skip candidates until this media id comes up, then process from it
    pub skip_until: Option<String>,

    /// Stop after examining this many candidates
    pub limit: Option<usize>,

    /// Plan only, never submit
    pub dry_run: bool,

    pub edit_summary: String,

    /// Accepted category prefixes, without the `Category:` namespace
    pub category_prefixes: Vec<String>,

    /// The search excludes files that have a photo id statement, so each
    /// edit adding one shifts later results up by one
    pub edits_leave_search: bool,
}

impl RunOptions {
    /// Whether `query` filters out files that already carry a photo id
    pub fn query_excludes_edited(query: &str) -> bool {
        query.contains(&format!("-haswbstatement:{}", properties::FLICKR_PHOTO_ID))
    }
}

/// What happened to one candidate
enum Outcome {
    Done,

    /// An edit went in; `identifier_added` when it wrote the photo id
    Submitted { identifier_added: bool },

    /// The run must stop
    Abort,
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub examined: usize,
    pub skipped: usize,
    pub planned: usize,
    pub submitted: usize,
    pub aborted: bool,
}

/// Reconciliation engine wired to its collaborators
pub struct Backfiller {
    photos: Box<dyn PhotoSource>,
    store: Box<dyn ClaimStore>,
    synthesizer: ClaimSynthesizer,
    retry: RetryPolicy,
    replace_policy: ReplacePolicy,

    /// Account the edits are made as
    acting_user: Option<String>,
}

impl Backfiller {
    pub fn new(
        photos: Box<dyn PhotoSource>,
        store: Box<dyn ClaimStore>,
        synthesizer: ClaimSynthesizer,
    ) -> Self {
        Self {
            photos,
            store,
            synthesizer,
            retry: RetryPolicy::default(),
            replace_policy: ReplacePolicy::default(),
            acting_user: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_replace_policy(mut self, policy: ReplacePolicy, acting_user: Option<String>) -> Self {
        self.replace_policy = policy;
        self.acting_user = acting_user;
        self
    }

    /// Plan the edit for a single file without writing anything
    #[instrument(skip(self))]
    pub async fn update_file(&self, mid: &str) -> Result<FileUpdate> {
        let existing = self.store.read_claims(mid).await?;
        let markup = self.store.read_markup(mid).await?;

        let identifier = extract(&existing, markup.as_deref())?;
        debug!(photo_id = %identifier.photo_id, provenance = ?identifier.provenance, "Found source photo");

        let evidence = self.gather_evidence(&identifier).await?;
        let partial = matches!(evidence, PhotoEvidence::Partial(_));

        let desired = self.synthesizer.synthesize(&Synthesis::ExistingPhoto(evidence));
        let mut plan = plan(&existing, &desired);

        if plan.has_replacements() {
            self.apply_replace_policy(mid, &mut plan).await?;
        }

        let claims = plan.claims_to_submit();
        info!(summary = %plan.summary(), partial, "Planned edit");

        Ok(FileUpdate {
            mid: mid.to_string(),
            identifier,
            partial,
            plan,
            claims,
        })
    }

    async fn gather_evidence(&self, identifier: &IdentifierMatch) -> Result<PhotoEvidence> {
        let photo_id = identifier.photo_id.as_str();

        let fetched = self
            .retry
            .run("fetch photo", FetchError::is_transient, || {
                self.photos.fetch_photo(photo_id)
            })
            .await;

        match fetched {
            Ok(photo) => Ok(PhotoEvidence::Full(photo)),
            Err(e) if e.is_unavailable() => {
                warn!(photo_id, error = %e, "Photo unavailable, falling back to partial claims");
                self.partial_evidence(identifier).await
            }
            Err(e) => Err(e).with_context(|| format!("Failed to fetch photo {}", photo_id)),
        }
    }

    /// Whatever can still be said about a photo that has gone away
    async fn partial_evidence(&self, identifier: &IdentifierMatch) -> Result<PhotoEvidence> {
        let user_url = user_url_from_photo_url(&identifier.source_url);

        let user = match &user_url {
            Some(url) => self.fetch_user_if_possible(url).await?,
            None => None,
        };

        let photo_url = match &user_url {
            Some(url) => format!("{}{}/", url, identifier.photo_id),
            None => identifier.source_url.clone(),
        };

        PartialFacts::new(user, Some(identifier.photo_id.clone()), Some(photo_url))
            .map(PhotoEvidence::Partial)
            .context("No partial evidence for photo")
    }

    async fn fetch_user_if_possible(&self, url: &str) -> Result<Option<UserFacts>> {
        let fetched = self
            .retry
            .run("fetch user", FetchError::is_transient, || {
                self.photos.fetch_user(url)
            })
            .await;

        match fetched {
            Ok(user) => Ok(Some(user)),
            Err(FetchError::UserNotFound(_)) => {
                debug!(url, "Photo owner not found");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to fetch user {}", url)),
        }
    }

    async fn apply_replace_policy(&self, mid: &str, plan: &mut EditPlan) -> Result<()> {
        match self.replace_policy {
            ReplacePolicy::Always => {}
            ReplacePolicy::Never => plan.withhold_replacements("replacing statements is disabled"),
            ReplacePolicy::WhenUploader => {
                let uploader = self.store.read_uploader(mid).await?;
                let is_uploader = match (&self.acting_user, &uploader) {
                    (Some(acting), Some(uploader)) => acting == uploader,
                    _ => false,
                };

                if !is_uploader {
                    debug!(?uploader, acting_user = ?self.acting_user, "Not the uploader");
                    plan.withhold_replacements("not the original uploader");
                }
            }
        }

        Ok(())
    }

    /// Walk the candidate search, reconciling and writing each file
    #[instrument(skip(self, options, log), fields(run_id = %log.run_id()))]
    pub async fn run(&self, options: &RunOptions, log: &RunLog) -> Result<RunSummary> {
        let run_id = log.run_id();
        let mut summary = RunSummary::default();
        let mut skipping = options.skip_until.is_some();

        info!(query = %options.search_query, dry_run = options.dry_run, "Starting run");
        log.record(
            None,
            RunEventType::RunStarted,
            format!("{}:start", run_id),
            format!("search: {}", options.search_query),
            None,
        )
        .await?;

        let mut offset = None;
        'pages: loop {
            let results = self.store.search(&options.search_query, offset).await?;
            let mut left_search = 0;

            for page in &results.pages {
                if skipping {
                    if Some(&page.mid) != options.skip_until.as_ref() {
                        debug!(mid = %page.mid, "Skipping until start point");
                        continue;
                    }
                    skipping = false;
                }

                if options.limit.is_some_and(|limit| summary.examined >= limit) {
                    break 'pages;
                }
                summary.examined += 1;

                match self.process(&page.mid, options, log, &mut summary).await? {
                    Outcome::Abort => {
                        summary.aborted = true;
                        break 'pages;
                    }
                    Outcome::Submitted {
                        identifier_added: true,
                    } if options.edits_leave_search => left_search += 1,
                    _ => {}
                }
            }

            // Offsets count the live result set, which just lost the files
            // edited on this page
            match results.next_offset {
                Some(next) if !results.pages.is_empty() => {
                    offset = Some(next.saturating_sub(left_search))
                }
                _ => break,
            }
        }

        let (event_type, message) = if summary.aborted {
            (RunEventType::RunAborted, "Run aborted on a failed edit")
        } else {
            (RunEventType::RunCompleted, "Run completed")
        };
        log.record(
            None,
            event_type,
            format!("{}:end", run_id),
            format!(
                "{}: examined={} skipped={} planned={} submitted={}",
                message, summary.examined, summary.skipped, summary.planned, summary.submitted
            ),
            None,
        )
        .await?;

        info!(?summary, "{}", message);
        Ok(summary)
    }

    /// One candidate
    async fn process(
        &self,
        mid: &str,
        options: &RunOptions,
        log: &RunLog,
        summary: &mut RunSummary,
    ) -> Result<Outcome> {
        let run_id = log.run_id();
        let record_key = format!("{}:{}", run_id, mid);

        let categories = match self.store.read_categories(mid).await {
            Ok(categories) => categories,
            Err(e) => {
                warn!(mid, error = %e, "Failed to read categories, skipping");
                summary.skipped += 1;
                log.record(Some(mid), RunEventType::RecordSkipped, record_key, "categories unavailable", Some(format!("{:#}", e)))
                    .await?;
                return Ok(Outcome::Done);
            }
        };

        if !has_accepted_category(&categories, &options.category_prefixes) {
            info!(mid, ?categories, "Not categorised as a Flickr file, skipping");
            summary.skipped += 1;
            log.record(Some(mid), RunEventType::RecordSkipped, record_key, "not categorised as a Flickr file", None)
                .await?;
            return Ok(Outcome::Done);
        }

        let update = match self.update_file(mid).await {
            Ok(update) => update,
            Err(e) => {
                warn!(mid, error = %format!("{:#}", e), "Failed to reconcile, skipping");
                summary.skipped += 1;
                log.record(Some(mid), RunEventType::RecordSkipped, record_key, "reconciliation failed", Some(format!("{:#}", e)))
                    .await?;
                return Ok(Outcome::Done);
            }
        };

        let key = generate_idempotency_key(mid, &update.claims);
        let plan_summary = update.plan.summary();

        if update.claims.is_empty() || options.dry_run {
            summary.planned += 1;
            log.record(Some(mid), RunEventType::RecordPlanned, key, plan_summary, None)
                .await?;
            return Ok(Outcome::Done);
        }

        if log.is_submitted(&key) {
            info!(mid, "Same edit already submitted, skipping");
            summary.skipped += 1;
            log.record(Some(mid), RunEventType::RecordSkipped, key, "edit already submitted", None)
                .await?;
            return Ok(Outcome::Done);
        }

        match self
            .store
            .submit(mid, &update.claims, &options.edit_summary)
            .await
        {
            Ok(()) => {
                summary.submitted += 1;
                log.record(Some(mid), RunEventType::EditSubmitted, key, plan_summary, None)
                    .await?;
                Ok(Outcome::Submitted {
                    identifier_added: update
                        .claims
                        .iter()
                        .any(|s| s.property() == properties::FLICKR_PHOTO_ID && s.id.is_none()),
                })
            }
            Err(e) => {
                error!(mid, error = %format!("{:#}", e), "Failed to submit edit");
                log.record(Some(mid), RunEventType::EditFailed, key, plan_summary, Some(format!("{:#}", e)))
                    .await?;
                Ok(Outcome::Abort)
            }
        }
    }
}

/// Whether any category starts with an accepted prefix
pub fn has_accepted_category(categories: &[String], prefixes: &[String]) -> bool {
    categories.iter().any(|category| {
        let name = category.strip_prefix("Category:").unwrap_or(category);
        prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    })
}
