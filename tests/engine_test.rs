use std::fs;
use std::path::Path;
use tech_stack_backend::ingestion::store::{self, StoreKey};
use tech_stack_backend::ingestion::{
    Category, ColumnType, Engine, EngineConfig, EngineError, Filter, RawSource,
    ReconciliationReport, Value,
};
use tempfile::TempDir;

fn setup(files: &[(&str, &str)]) -> (TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("rawData");
    fs::create_dir_all(&raw).unwrap();
    for (relative, contents) in files {
        write_raw(&raw, relative, contents);
    }

    let config = EngineConfig::new(raw, dir.path().join("orderedData"));
    (dir, Engine::new(config))
}

fn write_raw(raw: &Path, relative: &str, contents: &str) {
    let path = raw.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

const CONTACTS: &str = "Name, Score\nAnn,10\nBo,7\n";

#[tokio::test]
async fn test_ingest_then_query_all_round_trips() {
    let (dir, engine) = setup(&[("hubSpot/hubSpot-contacts.csv", CONTACTS)]);
    let source = RawSource::new("hubSpot", "contacts");

    let stats = engine.ingest(&source, Category::Crm).await.unwrap();
    assert_eq!(stats.rows, 2);
    assert_eq!(stats.columns, 2);

    let key = StoreKey::new(Category::Crm, "hubSpot");
    let mut conn = store::open_read_only(&key.file(&dir.path().join("orderedData")))
        .await
        .unwrap();
    let schema = store::table_schema(&mut conn, "contacts")
        .await
        .unwrap()
        .unwrap();
    let types: Vec<_> = schema
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.column_type))
        .collect();
    assert_eq!(
        types,
        vec![("Name", ColumnType::Text), ("Score", ColumnType::Integer)]
    );

    let rows = engine
        .query_all("contacts", "hubSpot", Category::Crm, vec![])
        .await
        .unwrap();
    assert_eq!(rows.columns, vec!["Name", "Score"]);
    assert_eq!(
        rows.rows,
        vec![
            vec![Value::Text("Ann".to_string()), Value::Integer(10)],
            vec![Value::Text("Bo".to_string()), Value::Integer(7)],
        ]
    );
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let (_dir, engine) = setup(&[("hubSpot/hubSpot-contacts.csv", CONTACTS)]);
    let source = RawSource::new("hubSpot", "contacts");

    engine.ingest(&source, Category::Crm).await.unwrap();
    let first = engine
        .query_all("contacts", "hubSpot", Category::Crm, vec![])
        .await
        .unwrap();

    engine.ingest(&source, Category::Crm).await.unwrap();
    let second = engine
        .query_all("contacts", "hubSpot", Category::Crm, vec![])
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.list_ordered().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reconcile_reports_drift_until_integrated() {
    let (_dir, engine) = setup(&[
        ("hubSpot/hubSpot-contacts.csv", CONTACTS),
        ("ga4/ga4-traffic.csv", "Page,Views\n/home,120\n"),
    ]);

    engine
        .ingest(&RawSource::new("hubSpot", "contacts"), Category::Crm)
        .await
        .unwrap();

    let report = engine.reconcile().await.unwrap();
    assert_eq!(
        report,
        ReconciliationReport::Missing(vec![RawSource::new("ga4", "traffic")])
    );
    // no integration in between: same answer
    assert_eq!(engine.reconcile().await.unwrap(), report);

    engine
        .ingest(&RawSource::new("ga4", "traffic"), Category::Analytics)
        .await
        .unwrap();
    assert_eq!(
        engine.reconcile().await.unwrap(),
        ReconciliationReport::FullyIntegrated
    );
}

#[tokio::test]
async fn test_project_with_equality_filter() {
    let (_dir, engine) = setup(&[("hubSpot/hubSpot-contacts.csv", CONTACTS)]);
    engine
        .ingest(&RawSource::new("hubSpot", "contacts"), Category::Crm)
        .await
        .unwrap();

    let rows = engine
        .query(
            "contacts",
            "hubSpot",
            Category::Crm,
            &["Name".to_string(), "Score".to_string()],
            &[None, Some("7".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(
        rows.rows,
        vec![vec![Value::Text("Bo".to_string()), Value::Integer(7)]]
    );
}

#[tokio::test]
async fn test_project_with_mismatched_filters_is_bad_request() {
    let (_dir, engine) = setup(&[("hubSpot/hubSpot-contacts.csv", CONTACTS)]);
    engine
        .ingest(&RawSource::new("hubSpot", "contacts"), Category::Crm)
        .await
        .unwrap();

    let err = engine
        .query(
            "contacts",
            "hubSpot",
            Category::Crm,
            &["Name".to_string()],
            &[None, Some("7".to_string())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BadRequest(_)));
}

#[tokio::test]
async fn test_query_errors() {
    let (_dir, engine) = setup(&[("hubSpot/hubSpot-contacts.csv", CONTACTS)]);

    let err = engine
        .query_all("contacts", "hubSpot", Category::Crm, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    engine
        .ingest(&RawSource::new("hubSpot", "contacts"), Category::Crm)
        .await
        .unwrap();

    let err = engine
        .query_all("deals", "hubSpot", Category::Crm, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine
        .query_all(
            "contacts",
            "hubSpot",
            Category::Crm,
            vec![Filter::eq("Email", Value::Text("a@b.c".to_string()))],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Query(_)));
}

#[tokio::test]
async fn test_text_with_quotes_is_stored_verbatim() {
    let (_dir, engine) = setup(&[(
        "hubSpot/hubSpot-notes.csv",
        "Author,Body\nAnn,\"it's \"\"fine\"\"; DROP TABLE notes;--\"\n",
    )]);
    engine
        .ingest(&RawSource::new("hubSpot", "notes"), Category::Crm)
        .await
        .unwrap();

    let rows = engine
        .query_all(
            "notes",
            "hubSpot",
            Category::Crm,
            vec![Filter::eq("Author", Value::Text("Ann".to_string()))],
        )
        .await
        .unwrap();
    assert_eq!(
        rows.rows[0][1],
        Value::Text("it's \"fine\"; DROP TABLE notes;--".to_string())
    );
}

#[tokio::test]
async fn test_header_only_file_creates_empty_text_table() {
    let (_dir, engine) = setup(&[("ga4/ga4-events.csv", "Event,Count\n")]);
    let stats = engine
        .ingest(&RawSource::new("ga4", "events"), Category::Analytics)
        .await
        .unwrap();
    assert_eq!(stats.rows, 0);

    let rows = engine
        .query_all("events", "ga4", Category::Analytics, vec![])
        .await
        .unwrap();
    assert_eq!(rows.columns, vec!["Event", "Count"]);
    assert!(rows.rows.is_empty());
}

#[tokio::test]
async fn test_failed_ingest_names_source_and_keeps_previous_table() {
    let (dir, engine) = setup(&[("hubSpot/hubSpot-contacts.csv", CONTACTS)]);
    let source = RawSource::new("hubSpot", "contacts");
    engine.ingest(&source, Category::Crm).await.unwrap();

    // a ragged export replaces the good one on disk
    write_raw(
        &dir.path().join("rawData"),
        "hubSpot/hubSpot-contacts.csv",
        "Name,Score\nCy,3\nDee\n",
    );
    let err = engine.ingest(&source, Category::Crm).await.unwrap_err();
    match &err {
        EngineError::Integration { source_ref, .. } => assert_eq!(source_ref, &source),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), EngineError::SchemaMismatch { .. }));

    let rows = engine
        .query_all("contacts", "hubSpot", Category::Crm, vec![])
        .await
        .unwrap();
    assert_eq!(rows.rows.len(), 2);
}

#[tokio::test]
async fn test_missing_raw_file_is_not_found() {
    let (_dir, engine) = setup(&[]);
    let err = engine
        .ingest(&RawSource::new("ga4", "traffic"), Category::Analytics)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_stores_are_separated_by_category() {
    let (_dir, engine) = setup(&[("hubSpot/hubSpot-contacts.csv", CONTACTS)]);
    engine
        .ingest(&RawSource::new("hubSpot", "contacts"), Category::Crm)
        .await
        .unwrap();

    let err = engine
        .query_all("contacts", "hubSpot", Category::Analytics, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_raw_names_outside_the_path_alphabet_are_reported_missing() {
    let (_dir, engine) = setup(&[
        ("hubSpot/hubSpot-deal stages.csv", "Stage\nWon\n"),
        ("ga4/ga4-page.views.csv", "Page\n/home\n"),
    ]);

    assert_eq!(
        engine.reconcile().await.unwrap(),
        ReconciliationReport::Missing(vec![
            RawSource::new("ga4", "page.views"),
            RawSource::new("hubSpot", "deal stages"),
        ])
    );

    let err = engine
        .ingest(&RawSource::new("hubSpot", "deal stages"), Category::Crm)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::InvalidIdentifier(_)));
}

#[tokio::test]
async fn test_tables_differing_only_in_case_do_not_overwrite_each_other() {
    let (_dir, engine) = setup(&[
        ("hubSpot/hubSpot-Contacts.csv", CONTACTS),
        ("hubSpot/hubSpot-contacts.csv", "Name\nCy\n"),
    ]);
    let upper = RawSource::new("hubSpot", "Contacts");
    let lower = RawSource::new("hubSpot", "contacts");

    engine.ingest(&upper, Category::Crm).await.unwrap();
    let err = engine.ingest(&lower, Category::Crm).await.unwrap_err();
    match &err {
        EngineError::Integration { source_ref, .. } => assert_eq!(source_ref, &lower),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), EngineError::TableConflict { .. }));
    assert!(err.to_string().contains("Contacts"));

    // the first table survives and only the rejected source is still missing
    let rows = engine
        .query_all("Contacts", "hubSpot", Category::Crm, vec![])
        .await
        .unwrap();
    assert_eq!(rows.rows.len(), 2);
    assert_eq!(
        engine.reconcile().await.unwrap(),
        ReconciliationReport::Missing(vec![lower])
    );
}

#[tokio::test]
async fn test_parent_directory_tech_stack_is_rejected_before_reading() {
    let (dir, engine) = setup(&[]);
    // parses to a SchemaMismatch if anything opens it
    fs::write(dir.path().join("..-contacts.csv"), "Name,Score\nAnn\n").unwrap();

    let err = engine
        .ingest(&RawSource::new("..", "contacts"), Category::Crm)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::InvalidIdentifier(name) if name == ".."));
    assert!(engine.list_ordered().await.unwrap().is_empty());
}
