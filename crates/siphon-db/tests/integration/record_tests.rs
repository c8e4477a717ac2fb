use std::collections::BTreeMap;

use serde_json::{Value, json};
use siphon_core::error::AppError;
use siphon_core::models::Record;
use siphon_core::scheduler::TracingTickReporter;
use siphon_core::traits::{Fetcher, RecordStore};
use siphon_core::{ConfigFile, MappingResolver, Scheduler, SchedulerConfig, SourceJob};
use siphon_db::{Database, RecordRepository};

use crate::integration::common::setup_test_db;

fn record(table: &str, fields: &[(&str, Value)]) -> Record {
    Record {
        database: "siphon_test".into(),
        table: table.into(),
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[tokio::test]
async fn insert_returns_generated_id_and_stores_values() {
    let (pool, _container) = setup_test_db().await;
    let repo = RecordRepository::new(pool.clone(), "id");

    let id = repo
        .persist(&record(
            "prices",
            &[
                ("symbol", json!("USD")),
                ("buy", json!(27000.12)),
                ("volume", json!(123456789)),
                ("active", json!(true)),
                ("note", Value::Null),
                ("raw", json!({"bid": 1, "ask": [2, 3]})),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(id.0, "1");

    let row: (String, f64, i64, bool, Option<String>, Value) = sqlx::query_as(
        "SELECT symbol, buy, volume, active, note, raw FROM prices WHERE id = 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(row.0, "USD");
    assert_eq!(row.1, 27000.12);
    assert_eq!(row.2, 123456789);
    assert!(row.3);
    assert_eq!(row.4, None);
    assert_eq!(row.5, json!({"bid": 1, "ask": [2, 3]}));
}

#[tokio::test]
async fn quoted_identifiers_reach_awkward_tables() {
    let (pool, _container) = setup_test_db().await;
    let repo = RecordRepository::new(pool.clone(), "row_id");

    let id = repo
        .persist(&record(
            "ingest.odd \"name\"",
            &[("select", json!("reserved word column"))],
        ))
        .await
        .unwrap();
    assert_eq!(id.0.len(), 36, "expected a UUID, got {id}");

    let (value,): (String,) = sqlx::query_as(r#"SELECT "select" FROM ingest."odd ""name""""#)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(value, "reserved word column");
}

#[tokio::test]
async fn table_without_id_column_still_takes_the_row() {
    let (pool, _container) = setup_test_db().await;
    let repo = RecordRepository::new(pool.clone(), "id");

    let id = repo
        .persist(&record("events", &[("name", json!("deploy"))]))
        .await
        .unwrap();
    assert_eq!(id.0, "null");

    let keyed = RecordRepository::new(pool.clone(), "event_id")
        .persist(&record("events", &[("name", json!("rollback"))]))
        .await
        .unwrap();
    assert_eq!(keyed.0, "2");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn empty_record_inserts_default_row() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);
    let repo = db.record_repo("id");

    let first = repo.persist(&record("heartbeats", &[])).await.unwrap();
    let second = repo.persist(&record("heartbeats", &[])).await.unwrap();

    assert_eq!(first.0, "1");
    assert_eq!(second.0, "2");
}

#[tokio::test]
async fn database_errors_become_persistence_failed() {
    let (pool, _container) = setup_test_db().await;
    let repo = RecordRepository::new(pool, "id");

    let missing_table = repo
        .persist(&record("no_such_table", &[("a", json!(1))]))
        .await
        .unwrap_err();
    assert!(matches!(missing_table, AppError::PersistenceFailed(_)));

    repo.persist(&record("strict_rows", &[("code", json!("A"))]))
        .await
        .unwrap();
    let duplicate = repo
        .persist(&record("strict_rows", &[("code", json!("A"))]))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, AppError::PersistenceFailed(_)));
}

#[tokio::test]
async fn concurrent_inserts_share_the_pool() {
    let (pool, _container) = setup_test_db().await;
    let repo = RecordRepository::new(pool.clone(), "id");

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let repo = repo.clone();
        tasks.spawn(async move {
            repo.persist(&record("strict_rows", &[("code", json!(format!("c{i}")))]))
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM strict_rows")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 20);
}

#[tokio::test]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;
    Database::from_pool(pool).health_check().await.unwrap();
}

/// Serves fixed documents by URL; anything else is unreachable.
#[derive(Clone)]
struct FixtureFetcher;

impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        match url {
            "http://feeds.test/ticker" => {
                Ok(r#"{"USD": {"buy": 27000.5, "symbol": "$"}, "volume": 10}"#.to_string())
            }
            _ => Err(AppError::FetchFailed(format!("Connection to {url} failed"))),
        }
    }
}

#[tokio::test]
async fn tick_persists_only_the_healthy_source() {
    let (pool, _container) = setup_test_db().await;
    let tmp = tempfile::TempDir::new().unwrap();

    std::fs::write(
        tmp.path().join("ticker.json"),
        r#"{"url": "http://feeds.test/ticker", "table": "prices", "buy": "USD/buy", "symbol": "USD/symbol", "volume": "volume"}"#,
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("offline.json"),
        r#"{"url": "http://offline.test/", "table": "prices", "buy": "buy"}"#,
    )
    .unwrap();
    let config_path = tmp.path().join("config.txt");
    std::fs::write(
        &config_path,
        "driver: postgres\nhost: localhost\nport: 5432\nusername: postgres\npassword: postgres\ndatabase: siphon_test\n\
         file: ticker.json\nfile: offline.json\nfile: missing.json\n",
    )
    .unwrap();

    let job = SourceJob::new(
        MappingResolver::new(tmp.path()),
        FixtureFetcher,
        RecordRepository::new(pool.clone(), "id"),
        "siphon_test",
    );
    let scheduler = Scheduler::new(
        ConfigFile::new(&config_path),
        job,
        SchedulerConfig::default(),
    );

    let summary = scheduler.run_tick(1, &TracingTickReporter).await;

    assert_eq!(summary.outcomes.len(), 3);
    assert_eq!(summary.persisted(), 1);
    assert_eq!(summary.failed(), 2);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prices")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let (symbol, buy, volume): (String, f64, i64) =
        sqlx::query_as("SELECT symbol, buy, volume FROM prices")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(symbol, "$");
    assert_eq!(buy, 27000.5);
    assert_eq!(volume, 10);
}
