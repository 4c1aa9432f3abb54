use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::json;
use settingsdoc_engine::{SaveOutcome, SaveRequest};
use settingsdoc_harness::{SharedDatabase, doc};
use settingsdoc_storage::DocumentStore;

const PATH: &str = "settings/main";

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Run one save per site from the same base version, all released together.
fn race(db: &SharedDatabase, writers: usize, base_version: u64) -> Result<Vec<SaveOutcome>, Box<dyn std::error::Error>> {
    let sites = db.connect_many(writers)?;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = sites
        .into_iter()
        .enumerate()
        .map(|(i, mut site)| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                site.save(PATH, json!({"writer": i}), base_version)
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        let outcome = handle.join().map_err(|_| "writer thread panicked")??;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[test]
fn two_writers_same_base_exactly_one_commits() -> TestResult {
    let db = SharedDatabase::new()?;
    let mut seed = db.connect()?;
    seed.seed(PATH, json!({"version": 3, "siteName": "Acme"}))?;

    let outcomes = race(&db, 2, 3)?;
    let committed = outcomes.iter().filter(|o| o.is_committed()).count();
    let conflicts: Vec<u64> = outcomes
        .iter()
        .filter_map(|o| match o {
            SaveOutcome::Conflict { current_version, .. } => Some(*current_version),
            _ => None,
        })
        .collect();

    assert_eq!(committed, 1, "outcomes: {outcomes:?}");
    assert_eq!(conflicts, vec![4]);
    assert_eq!(seed.version(PATH)?, 4);
    Ok(())
}

#[test]
fn many_writers_one_transition_per_version() -> TestResult {
    let db = SharedDatabase::new()?;
    let mut seed = db.connect()?;
    seed.seed(PATH, json!({"version": 1}))?;

    let outcomes = race(&db, 4, 1)?;
    assert_eq!(outcomes.iter().filter(|o| o.is_committed()).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_conflict()).count(), 3);

    let records = seed.service.store().audit_records(PATH)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].version, 2);
    Ok(())
}

#[test]
fn loser_succeeds_after_rebasing() -> TestResult {
    let db = SharedDatabase::new()?;
    let mut seed = db.connect()?;
    seed.seed(PATH, json!({"version": 3}))?;

    let outcomes = race(&db, 2, 3)?;
    let current_version = outcomes
        .iter()
        .find_map(|o| match o {
            SaveOutcome::Conflict { current_version, .. } => Some(*current_version),
            _ => None,
        })
        .ok_or("expected a conflict")?;

    let mut retry = db.connect()?;
    let request = SaveRequest::new(PATH, doc(json!({"retried": true})), current_version, "loser");
    let outcome = retry.service.save(request)?;
    assert_eq!(outcome.committed_version(), Some(5));
    Ok(())
}
