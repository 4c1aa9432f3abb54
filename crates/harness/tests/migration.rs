use serde_json::{Value, json};
use settingsdoc_core::{AuditKind, HeaderAppearance, color::HslColor};
use settingsdoc_engine::{EngineConfig, migration};
use settingsdoc_harness::{FIXED_NOW, TestSite};
use settingsdoc_storage::DocumentStore;

const PATH: &str = "settings/main";

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn border_only_legacy_document_migrates() -> TestResult {
    let mut site = TestSite::new()?;
    site.seed(
        PATH,
        json!({
            "headerHeight": 80,
            "headerTopBorderEnabled": true,
            "headerTopBorderColor": {"h": 0, "s": 0, "l": 0},
        }),
    )?;

    let report = site.service.migrate_legacy(PATH)?;
    assert!(report.changed);
    assert_eq!(report.reason, None);
    assert_eq!(
        report.moved_keys,
        vec!["headerHeight", "headerTopBorderEnabled", "headerTopBorderColor"]
    );

    let stored = site.document(PATH)?.unwrap();
    assert_eq!(
        Value::Object(stored),
        json!({
            "header": {
                "height": 80,
                "border": {"enabled": true, "width": 1, "color": {"h": 0, "s": 0, "l": 0}},
            },
            "updatedAt": FIXED_NOW,
            "updatedBy": "migration:DF-246",
        })
    );

    let second = site.service.migrate_legacy(PATH)?;
    assert!(!second.changed);
    assert_eq!(second.reason.as_deref(), Some(migration::REASON_NO_LEGACY_KEYS));
    Ok(())
}

#[test]
fn second_run_leaves_stored_bytes_identical() -> TestResult {
    let mut site = TestSite::new()?;
    site.seed(
        PATH,
        json!({
            "version": 6,
            "headerCtaLabel": "Book a call",
            "headerScrolledBackgroundColor": "#112233",
            "headerScrolledBackgroundOpacity": 0.8,
            "header": {"logo": {"url": "/logo.svg"}},
        }),
    )?;
    site.service.migrate_legacy(PATH)?;

    let read_body = |site: &TestSite| -> rusqlite::Result<Vec<u8>> {
        site.service.store().conn().query_row(
            "SELECT body FROM documents WHERE path = ?1",
            [PATH],
            |row| row.get(0),
        )
    };
    let first = read_body(&site)?;
    site.service.migrate_legacy(PATH)?;
    assert_eq!(read_body(&site)?, first);
    Ok(())
}

#[test]
fn migration_keeps_version_and_unrelated_fields() -> TestResult {
    let mut site = TestSite::new()?;
    site.seed(
        PATH,
        json!({
            "version": 6,
            "siteName": "Acme",
            "headerLogoAlt": "Acme logo",
            "header": {"logo": {"url": "/logo.svg"}, "height": 64},
        }),
    )?;
    site.service.migrate_legacy(PATH)?;

    let stored = site.document(PATH)?.unwrap();
    assert_eq!(stored["version"], json!(6));
    assert_eq!(stored["siteName"], json!("Acme"));
    assert_eq!(stored["header"]["height"], json!(64));
    assert_eq!(stored["header"]["logo"], json!({"url": "/logo.svg", "alt": "Acme logo"}));
    assert!(stored.get("headerLogoAlt").is_none());
    Ok(())
}

#[test]
fn legacy_value_overrides_nested_value() -> TestResult {
    let mut site = TestSite::new()?;
    site.seed(PATH, json!({"headerHeight": 96, "header": {"height": 64}}))?;
    site.service.migrate_legacy(PATH)?;
    assert_eq!(site.document(PATH)?.unwrap()["header"]["height"], json!(96));
    Ok(())
}

#[test]
fn missing_document_is_reported_not_created() -> TestResult {
    let mut site = TestSite::new()?;
    let report = site.service.migrate_legacy(PATH)?;
    assert!(!report.changed);
    assert_eq!(report.reason.as_deref(), Some(migration::REASON_NOT_FOUND));
    assert!(site.document(PATH)?.is_none());
    Ok(())
}

#[test]
fn migration_is_audited() -> TestResult {
    let mut site = TestSite::new()?;
    site.seed(PATH, json!({"version": 2, "headerSticky": false}))?;
    site.service.migrate_legacy(PATH)?;

    let records = site.service.store().audit_records(PATH)?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.kind, AuditKind::Migrate);
    assert_eq!(record.by, "migration:DF-246");
    assert_eq!(record.version, 2);
    assert_eq!(record.diff["removed"]["headerSticky"], json!(false));
    assert_eq!(record.diff["added"]["header"], json!({"sticky": false}));
    Ok(())
}

#[test]
fn configured_author_is_stamped() -> TestResult {
    let config = EngineConfig {
        migration_author: "ops:backfill".into(),
        ..EngineConfig::default()
    };
    let mut site = TestSite::with_config(config)?;
    site.seed(PATH, json!({"headerOverlay": true}))?;
    site.service.migrate_legacy(PATH)?;
    assert_eq!(site.document(PATH)?.unwrap()["updatedBy"], json!("ops:backfill"));
    Ok(())
}

#[test]
fn migrated_document_reads_the_same_as_before() -> TestResult {
    let mut site = TestSite::new()?;
    site.seed(
        PATH,
        json!({
            "headerHeight": 120,
            "headerLinkColor": "#ff0000",
            "headerInitialBackgroundColor": {"h": 210, "s": 30, "l": 10},
            "headerInitialBackgroundOpacity": 40,
            "headerTopBorderEnabled": true,
            "headerTopBorderColor": {"h": 0, "s": 0, "l": 0},
            "mobileFloatingCtaEnabled": true,
            "mobileFloatingCtaOffsetX": 24,
        }),
    )?;
    let before: HeaderAppearance = site.service.read_header_appearance(PATH)?;
    site.service.migrate_legacy(PATH)?;
    let after = site.service.read_header_appearance(PATH)?;

    assert_eq!(after, before);
    assert_eq!(after.height, 120);
    assert_eq!(after.border.color.hsl, HslColor::new(0, 0, 0));
    assert_eq!(after.mobile_floating.offset_x, 24);
    Ok(())
}
