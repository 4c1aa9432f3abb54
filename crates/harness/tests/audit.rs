use serde_json::json;
use settingsdoc_core::AuditKind;
use settingsdoc_engine::{EngineConfig, audit::is_truncated};
use settingsdoc_harness::TestSite;
use settingsdoc_storage::DocumentStore;

const PATH: &str = "settings/main";

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn every_real_change_is_recorded_in_order() -> TestResult {
    let mut site = TestSite::new()?;
    site.save(PATH, json!({"siteName": "Acme"}), 0)?;
    site.save(PATH, json!({"siteName": "Acme Inc"}), 1)?;
    site.save(PATH, json!({"tagline": "Consulting"}), 2)?;

    let records = site.service.store().audit_records(PATH)?;
    let versions: Vec<u64> = records.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert!(records.iter().all(|r| r.kind == AuditKind::Save));
    assert_eq!(records[1].diff["changed"]["siteName"], json!({"before": "Acme", "after": "Acme Inc"}));
    assert_eq!(records[2].diff["added"]["tagline"], json!("Consulting"));
    Ok(())
}

#[test]
fn no_op_save_commits_without_a_record() -> TestResult {
    let mut site = TestSite::new()?;
    site.save(PATH, json!({"siteName": "Acme"}), 0)?;
    let outcome = site.save(PATH, json!({"siteName": "Acme"}), 1)?;

    assert_eq!(outcome.committed_version(), Some(2));
    assert_eq!(site.service.store().audit_records(PATH)?.len(), 1);
    Ok(())
}

#[test]
fn record_holds_diff_not_documents() -> TestResult {
    let mut site = TestSite::new()?;
    site.seed(PATH, json!({"version": 1, "bigUnrelated": "x".repeat(256)}))?;
    site.save(PATH, json!({"siteName": "Acme"}), 1)?;

    let record = &site.service.store().audit_records(PATH)?[0];
    assert!(record.diff.get("added").is_some());
    assert!(!record.diff.to_string().contains(&"x".repeat(256)));
    assert!(record.size > 256, "size reflects the whole after-document");
    Ok(())
}

#[test]
fn oversized_diff_is_truncated() -> TestResult {
    let config = EngineConfig {
        audit_max_diff_bytes: 128,
        ..EngineConfig::default()
    };
    let mut site = TestSite::with_config(config)?;
    site.save(PATH, json!({"essay": "y".repeat(1000), "siteName": "Acme"}), 0)?;

    let record = &site.service.store().audit_records(PATH)?[0];
    assert!(is_truncated(&record.diff));
    assert_eq!(record.diff["keys"], json!(["essay", "siteName"]));
    Ok(())
}

#[test]
fn audit_failure_does_not_fail_the_save() -> TestResult {
    let mut site = TestSite::new()?;
    site.service
        .store()
        .conn()
        .execute_batch("DROP TABLE audit_log")?;

    let outcome = site.save(PATH, json!({"siteName": "Acme"}), 0)?;
    assert_eq!(outcome.committed_version(), Some(1));
    assert_eq!(site.version(PATH)?, 1);
    Ok(())
}

#[test]
fn disabled_audit_writes_nothing() -> TestResult {
    let config = EngineConfig {
        audit_enabled: false,
        ..EngineConfig::default()
    };
    let mut site = TestSite::with_config(config)?;
    site.save(PATH, json!({"siteName": "Acme"}), 0)?;
    assert!(site.service.store().audit_records(PATH)?.is_empty());
    Ok(())
}
