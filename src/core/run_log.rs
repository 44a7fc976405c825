//! Append-only run log with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL) under
//! `$BACKFILLR_HOME/runs/<run_id>/events.jsonl`, one file per run.
//! Opening a log reads the submitted edits of every run under the same
//! directory once, so a repeat edit is caught across runs without
//! rereading any file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{RunEvent, RunEventType, Statement};

/// File-based run log using JSONL format
pub struct RunLog {
    run_id: Uuid,

    /// Directory containing the run
    run_dir: PathBuf,

    /// Path to the events.jsonl file
    events_path: PathBuf,

    /// Idempotency keys of submitted edits, from this run and earlier ones
    submitted: Mutex<HashSet<String>>,
}

impl RunLog {
    /// Create or open the log for a run under the configured runs directory
    pub async fn open(run_id: Uuid) -> Result<Self> {
        Self::open_in(&Self::base_directory()?, run_id).await
    }

    /// Create or open the log for a run under `base_dir`
    pub async fn open_in(base_dir: &Path, run_id: Uuid) -> Result<Self> {
        let submitted = submitted_keys(base_dir).await?;
        debug!(count = submitted.len(), "Loaded submitted edits from earlier runs");

        let run_dir = base_dir.join(run_id.to_string());

        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        let events_path = run_dir.join("events.jsonl");

        Ok(Self {
            run_id,
            run_dir,
            events_path,
            submitted: Mutex::new(submitted),
        })
    }

    /// Get the base directory for all runs (~/.backfillr/runs or $BACKFILLR_HOME/runs)
    pub fn base_directory() -> Result<PathBuf> {
        crate::config::runs_dir()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Get the path to the events file
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Get the run directory
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Append an event to the log
    pub async fn append(&self, event: &RunEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open events file: {}",
                    self.events_path.display()
                )
            })?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        if event.event_type == RunEventType::EditSubmitted {
            self.submitted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(event.idempotency_key.clone());
        }

        Ok(())
    }

    /// Build and append an event for this run
    pub async fn record(
        &self,
        mid: Option<&str>,
        event_type: RunEventType,
        idempotency_key: String,
        summary: impl Into<String>,
        error: Option<String>,
    ) -> Result<()> {
        let mut event = RunEvent::new(
            self.run_id,
            mid.map(str::to_string),
            event_type,
            idempotency_key,
            summary.into(),
        );
        if let Some(error) = error {
            event = event.with_error(error);
        }

        self.append(&event).await
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<RunEvent>> {
        read_events(&self.events_path).await
    }

    /// Whether an edit with this key was submitted by this or an earlier run
    pub fn is_submitted(&self, idempotency_key: &str) -> bool {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(idempotency_key)
    }

    /// The last media id this run touched, where `--resume` picks up
    pub async fn last_mid(&self) -> Result<Option<String>> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find_map(|e| e.mid))
    }

    /// List all run IDs in the base directory
    pub async fn list_runs(base_dir: &Path) -> Result<Vec<Uuid>> {
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}

async fn read_events(path: &Path) -> Result<Vec<RunEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open events file: {}", path.display()))?;

    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut events = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: RunEvent = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse event: {}", line))?;
        events.push(event);
    }

    Ok(events)
}

/// Keys of every edit submitted by any run under `base_dir`
async fn submitted_keys(base_dir: &Path) -> Result<HashSet<String>> {
    let mut keys = HashSet::new();

    for run_id in RunLog::list_runs(base_dir).await? {
        let path = base_dir.join(run_id.to_string()).join("events.jsonl");
        keys.extend(
            read_events(&path)
                .await?
                .into_iter()
                .filter(|e| e.event_type == RunEventType::EditSubmitted)
                .map(|e| e.idempotency_key),
        );
    }

    Ok(keys)
}

/// Idempotency key for a record's edit: `{mid}:{plan_hash}`.
///
/// Independent of the run, so the same edit to the same file is only
/// ever submitted once.
pub fn generate_idempotency_key(mid: &str, claims: &[Statement]) -> String {
    format!("{}:{}", mid, plan_hash(claims))
}

/// First 16 hex chars of the SHA-256 of the serialized claims
pub fn plan_hash(claims: &[Statement]) -> String {
    // Serializing plain data types can't fail
    let serialized = serde_json::to_string(claims).unwrap_or_default();
    hash_input(&serialized)
}

/// Hash input content (first 16 chars of SHA256)
pub fn hash_input(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8]) // First 16 hex chars (8 bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::string_value;
    use crate::domain::Snak;
    use tempfile::TempDir;

    async fn create_test_log() -> (RunLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = RunLog::open_in(temp_dir.path(), Uuid::new_v4())
            .await
            .unwrap();

        (log, temp_dir)
    }

    #[tokio::test]
    async fn test_event_append_and_replay() {
        let (log, _temp) = create_test_log().await;

        log.record(None, RunEventType::RunStarted, format!("{}:start", log.run_id()), "Run started", None)
            .await
            .unwrap();
        log.record(
            Some("M1"),
            RunEventType::RecordSkipped,
            format!("{}:M1", log.run_id()),
            "not a Flickr file",
            None,
        )
        .await
        .unwrap();

        let events = log.replay().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, RunEventType::RunStarted);
        assert_eq!(events[1].event_type, RunEventType::RecordSkipped);
        assert_eq!(events[1].run_id, log.run_id());
        assert_eq!(log.last_mid().await.unwrap(), Some("M1".to_string()));
    }

    #[tokio::test]
    async fn test_is_submitted() {
        let (log, _temp) = create_test_log().await;
        let key = generate_idempotency_key("M1", &[]);

        assert!(!log.is_submitted(&key));

        log.record(Some("M1"), RunEventType::EditFailed, key.clone(), "failed", Some("badtoken".into()))
            .await
            .unwrap();
        assert!(!log.is_submitted(&key));

        log.record(Some("M1"), RunEventType::EditSubmitted, key.clone(), "add_missing=1", None)
            .await
            .unwrap();
        assert!(log.is_submitted(&key));
    }

    #[tokio::test]
    async fn test_submitted_edits_carry_across_runs() {
        let temp_dir = TempDir::new().unwrap();
        let key = generate_idempotency_key("M1", &[]);

        let first = RunLog::open_in(temp_dir.path(), Uuid::new_v4()).await.unwrap();
        first
            .record(Some("M1"), RunEventType::EditSubmitted, key.clone(), "add_missing=1", None)
            .await
            .unwrap();

        let second = RunLog::open_in(temp_dir.path(), Uuid::new_v4()).await.unwrap();

        assert!(second.is_submitted(&key));
        assert!(second.replay().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_runs() {
        let temp_dir = TempDir::new().unwrap();
        let first = RunLog::open_in(temp_dir.path(), Uuid::new_v4()).await.unwrap();
        std::fs::create_dir_all(temp_dir.path().join("not-a-run")).unwrap();

        let runs = RunLog::list_runs(temp_dir.path()).await.unwrap();

        assert_eq!(runs, vec![first.run_id()]);
    }

    #[test]
    fn test_idempotency_key_format() {
        let claims = vec![Statement::new(Snak::value("P12120", string_value("42")))];

        let key = generate_idempotency_key("M76", &claims);

        let parts: Vec<&str> = key.split(':').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "M76");
        assert_eq!(parts[1].len(), 16);
    }

    #[test]
    fn test_plan_hash_depends_on_claims() {
        let a = vec![Statement::new(Snak::value("P12120", string_value("42")))];
        let b = vec![Statement::new(Snak::value("P12120", string_value("43")))];

        assert_eq!(plan_hash(&a), plan_hash(&a));
        assert_ne!(plan_hash(&a), plan_hash(&b));
    }
}
