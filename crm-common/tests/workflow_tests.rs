//! End-to-end flows against the in-memory backend
//!
//! - Export → re-parse reproduces field values (commas, quotes and all-empty rows included)
//! - Import with per-row backend rejections keeps going and caps error detail
//! - Pipeline drop persists only the stage; a failed drop rolls back via refetch
//! - Segment counts over fetched subscribers

use chrono::{NaiveDate, TimeZone, Utc};
use crm_common::backend::{fetch_all, Backend, MemoryBackend, Operation, Query};
use crm_common::csv;
use crm_common::export::{export_csv, ExportEntity, EXPORT_ROW_LIMIT};
use crm_common::import::{ImportEntity, ImportStep, ImportWizard};
use crm_common::model::{DealStage, Table};
use crm_common::pipeline::{DropTarget, PipelineBoard};
use crm_common::segment::{count_matches, Condition, MatchType, Operator, SegmentRules};
use serde_json::{json, Value};
use uuid::Uuid;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[tokio::test]
async fn test_export_then_parse_round_trip() {
    let backend = MemoryBackend::new();
    backend
        .seed(
            Table::Companies,
            vec![
                json!({"id": Uuid::new_v4().to_string(), "name": "Acme, Inc.", "industry": "Say \"hi\"", "city": "Line\nBreak", "created_at": "2024-05-02T00:00:00Z"}),
                json!({"id": Uuid::new_v4().to_string(), "name": "Globex", "industry": "Energy", "city": "", "created_at": "2024-05-01T00:00:00Z"}),
            ],
        )
        .await;

    let export = export_csv(&backend, ExportEntity::Companies, &["name", "industry", "city"], today(), EXPORT_ROW_LIMIT)
        .await
        .unwrap();
    assert_eq!(export.filename, "companies-export-2024-06-01.csv");
    assert_eq!(export.row_count, 2);

    let table = csv::parse(&export.content).unwrap();
    assert_eq!(table.headers, vec!["Company Name", "Industry", "City"]);
    // Newest first
    assert_eq!(table.rows[0], vec!["Acme, Inc.", "Say \"hi\"", "Line\nBreak"]);
    assert_eq!(table.rows[1], vec!["Globex", "Energy", ""]);
}

#[tokio::test]
async fn test_export_round_trip_keeps_rows_without_values() {
    let backend = MemoryBackend::new();
    backend
        .seed(
            Table::Companies,
            vec![
                json!({"id": Uuid::new_v4().to_string(), "name": "Acme", "industry": "X", "city": "Denver", "created_at": "2024-05-02T00:00:00Z"}),
                json!({"id": Uuid::new_v4().to_string(), "name": "Blank", "industry": "", "city": null, "created_at": "2024-05-01T00:00:00Z"}),
            ],
        )
        .await;

    let export = export_csv(&backend, ExportEntity::Companies, &["city", "industry"], today(), EXPORT_ROW_LIMIT)
        .await
        .unwrap();
    assert_eq!(export.row_count, 2);

    let table = csv::parse(&export.content).unwrap();
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0], vec!["Denver", "X"]);
    assert_eq!(table.rows[1], vec!["", ""]);
}

#[tokio::test]
async fn test_export_respects_limit() {
    let backend = MemoryBackend::new();
    let rows: Vec<Value> = (0..25)
        .map(|i| json!({"first_name": format!("Lead {}", i), "created_at": format!("2024-05-{:02}T00:00:00Z", i + 1)}))
        .collect();
    backend.seed(Table::Leads, rows).await;

    let export = export_csv(&backend, ExportEntity::Leads, &[], today(), 10).await.unwrap();
    assert_eq!(export.row_count, 10);
    let table = csv::parse(&export.content).unwrap();
    assert_eq!(table.headers.len(), ExportEntity::Leads.fields().len());
    assert_eq!(table.rows[0][0], "Lead 24");
}

#[tokio::test]
async fn test_import_with_rejected_rows() {
    let backend = MemoryBackend::new();
    backend
        .reject(Table::Leads, Operation::Insert, "email", "lead3@example.com", "duplicate key value violates unique constraint")
        .await;
    backend
        .reject(Table::Leads, Operation::Insert, "email", "lead7@example.com", "duplicate key value violates unique constraint")
        .await;

    let mut text = String::from("First Name,Last Name,Email,Lead Score\n");
    for i in 1..=10 {
        text.push_str(&format!("Lead,{},lead{}@example.com,{}\n", i, i, i * 10));
    }

    let mut wizard = ImportWizard::new(ImportEntity::Leads);
    wizard.upload(&text).unwrap();
    assert_eq!(wizard.mapping().target(3), Some("score"));
    wizard.confirm_mapping().unwrap();

    let summary = wizard.commit(&backend).await.unwrap();
    assert_eq!(summary.success, 8);
    assert_eq!(summary.failed, 2);
    assert!(summary.errors.len() <= 5);
    assert!(summary.errors[0].starts_with("Row 3: "));
    assert!(summary.errors[1].starts_with("Row 7: "));
    assert_eq!(wizard.step(), ImportStep::Done);

    let stored = backend.rows(Table::Leads).await;
    assert_eq!(stored.len(), 8);
    assert_eq!(stored[0]["score"], 10);
}

#[tokio::test]
async fn test_import_error_detail_is_capped() {
    let backend = MemoryBackend::new();
    let mut text = String::from("first_name,email\n");
    for _ in 0..8 {
        text.push_str(",missing-name@example.com\n");
    }
    text.push_str("Ada,ada@example.com\n");

    let mut wizard = ImportWizard::new(ImportEntity::Contacts);
    wizard.upload(&text).unwrap();
    wizard.confirm_mapping().unwrap();
    let summary = wizard.commit(&backend).await.unwrap();

    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 8);
    assert_eq!(summary.errors.len(), 5);
    assert_eq!(summary.errors[4], "Row 5: First Name is required");
}

async fn seed_deals(backend: &MemoryBackend) -> (Uuid, Uuid) {
    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    backend
        .seed(
            Table::Deals,
            vec![
                json!({"id": x.to_string(), "title": "X", "value": 100, "stage": "lead", "created_at": "2024-05-01T00:00:00Z"}),
                json!({"id": y.to_string(), "title": "Y", "value": 200, "stage": "negotiation", "created_at": "2024-05-02T00:00:00Z"}),
            ],
        )
        .await;
    (x, y)
}

#[tokio::test]
async fn test_drop_on_card_persists_card_stage() {
    let backend = MemoryBackend::new();
    let (x, y) = seed_deals(&backend).await;

    let mut board = PipelineBoard::load(&backend).await.unwrap();
    let moved = board.commit_drop(&backend, x, DropTarget::Card(y)).await.unwrap();
    assert_eq!(moved.from, DealStage::Lead);
    assert_eq!(moved.to, DealStage::Negotiation);

    let stored = backend.rows(Table::Deals).await;
    let row = stored.iter().find(|r| r["id"] == x.to_string()).unwrap();
    assert_eq!(row["stage"], "negotiation");
    // Only the stage changed
    assert_eq!(row["title"], "X");
    assert_eq!(row["value"], 100);
}

#[tokio::test]
async fn test_failed_drop_rolls_back_via_refetch() {
    let backend = MemoryBackend::new();
    let (x, _) = seed_deals(&backend).await;
    backend
        .reject(Table::Deals, Operation::Update, "stage", "closed_won", "permission denied for table deals")
        .await;

    let mut board = PipelineBoard::load(&backend).await.unwrap();
    let result = board
        .commit_drop(&backend, x, DropTarget::Column(DealStage::ClosedWon))
        .await;
    assert!(result.is_err());
    assert_eq!(board.deal(x).unwrap().stage, DealStage::Lead);
    assert_eq!(board.columns()[0].count, 1);
}

#[tokio::test]
async fn test_segment_count_over_fetched_subscribers() {
    let backend = MemoryBackend::new();
    backend
        .seed(
            Table::Subscribers,
            vec![
                json!({"email": "a@acme.com", "status": "active", "tags": ["vip"]}),
                json!({"email": "b@acme.com", "status": "unsubscribed", "tags": ["vip"]}),
                json!({"email": "c@globex.com", "status": "active", "tags": []}),
            ],
        )
        .await;

    let subscribers: Vec<Value> = fetch_all(&backend, Table::Subscribers, &Query::new()).await.unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    let mut rules = SegmentRules {
        match_type: MatchType::All,
        conditions: vec![
            Condition::new("email", Operator::EndsWith, "@acme.com"),
            Condition::new("status", Operator::Equals, "active"),
        ],
    };
    assert_eq!(count_matches(&rules, &subscribers, now), 1);

    rules.match_type = MatchType::Any;
    assert_eq!(count_matches(&rules, &subscribers, now), 3);

    let count = backend
        .count(Table::Subscribers, &Query::new().eq("status", "active"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(count, Some(2));
}
