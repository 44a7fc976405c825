//! Run Log Integration Tests

use backfillr::core::codec::string_value;
use backfillr::core::{generate_idempotency_key, RunLog};
use backfillr::domain::RunEventType;
use backfillr::{Snak, Statement};
use tempfile::TempDir;
use uuid::Uuid;

fn claims(photo_id: &str) -> Vec<Statement> {
    vec![Statement::new(Snak::value("P12120", string_value(photo_id)))]
}

#[tokio::test]
async fn test_events_replay_in_order() {
    let dir = TempDir::new().unwrap();
    let run_id = Uuid::new_v4();
    let log = RunLog::open_in(dir.path(), run_id).await.unwrap();

    log.record(None, RunEventType::RunStarted, format!("{}:start", run_id), "search: x", None)
        .await
        .unwrap();
    log.record(
        Some("M7"),
        RunEventType::RecordSkipped,
        format!("{}:M7", run_id),
        "not categorised as a Flickr file",
        None,
    )
    .await
    .unwrap();
    log.record(
        Some("M8"),
        RunEventType::EditFailed,
        generate_idempotency_key("M8", &claims("42")),
        "add_missing=1",
        Some("badtoken".to_string()),
    )
    .await
    .unwrap();

    let events = log.replay().await.unwrap();
    let types: Vec<RunEventType> = events.iter().map(|e| e.event_type).collect();

    assert_eq!(
        types,
        vec![
            RunEventType::RunStarted,
            RunEventType::RecordSkipped,
            RunEventType::EditFailed
        ]
    );
    assert!(events.iter().all(|e| e.run_id == run_id));
    assert_eq!(events[2].error.as_deref(), Some("badtoken"));
    assert_eq!(log.last_mid().await.unwrap().as_deref(), Some("M8"));
}

#[tokio::test]
async fn test_later_runs_see_submitted_edits() {
    let dir = TempDir::new().unwrap();
    let key = generate_idempotency_key("M1", &claims("42"));

    {
        let log = RunLog::open_in(dir.path(), Uuid::new_v4()).await.unwrap();
        log.record(Some("M1"), RunEventType::EditSubmitted, key.clone(), "add_missing=1", None)
            .await
            .unwrap();
    }

    let log = RunLog::open_in(dir.path(), Uuid::new_v4()).await.unwrap();
    assert!(log.is_submitted(&key));

    let other = generate_idempotency_key("M1", &claims("43"));
    assert!(!log.is_submitted(&other));
}

#[tokio::test]
async fn test_list_runs() {
    let dir = TempDir::new().unwrap();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    RunLog::open_in(dir.path(), first).await.unwrap();
    RunLog::open_in(dir.path(), second).await.unwrap();
    std::fs::create_dir(dir.path().join("not-a-run")).unwrap();

    let mut runs = RunLog::list_runs(dir.path()).await.unwrap();
    runs.sort();
    let mut expected = vec![first, second];
    expected.sort();

    assert_eq!(runs, expected);
}

#[test]
fn test_idempotency_key_depends_on_claims() {
    let a = generate_idempotency_key("M1", &claims("42"));
    let b = generate_idempotency_key("M1", &claims("42"));
    let c = generate_idempotency_key("M1", &claims("43"));

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("M1:"));
}
