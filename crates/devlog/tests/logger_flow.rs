//! End-to-end flows through the public `DebugLogger` API.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use devlog::{
    Category, DEFAULT_CACHE_KEY, DebugLogger, EntryId, Event, JsonDirStore, JsonFileCache,
    LocalCache, LoggerConfig, MemorySink, MemoryStore, PipelineStatus, SecurityScanReport, ScanStatus, Severity, SinkEvent, Status,
    Table, Vulnerability, VulnerabilitySeverity,
};
use tempfile::TempDir;

fn no_ci() -> Arc<HashMap<String, String>> {
    Arc::new(HashMap::new())
}

fn logger_in(dir: &TempDir, store: Arc<MemoryStore>) -> DebugLogger {
    let config = LoggerConfig::default()
        .with_user_id("dev")
        .with_cache_dir(dir.path())
        .with_store_timeout(Duration::from_millis(200));
    DebugLogger::builder(store)
        .config(config)
        .env(no_ci())
        .build()
        .expect("logger")
}

#[tokio::test]
async fn every_log_call_creates_one_tagged_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = logger_in(&dir, Arc::new(MemoryStore::new()));

    let info = logger
        .log_info(Event::new(Category::Runtime, "Worker started", "pool of 4"))
        .await
        .expect("info");
    let warning = logger
        .log_warning(Event::new(Category::Api, "Slow upstream", "p99 above 2s"))
        .await
        .expect("warning");
    let error = logger
        .log_error(Event::new(Category::Database, "Query failed", "deadlock"))
        .await
        .expect("error");

    let ids: BTreeSet<EntryId> = [&info, &warning, &error]
        .iter()
        .map(|logged| logged.entry.id)
        .collect();
    assert_eq!(ids.len(), 3);

    assert_eq!(info.entry.severity, Severity::Info);
    assert_eq!(warning.entry.severity, Severity::Warning);
    assert_eq!(error.entry.severity, Severity::Error);
    assert!(info.entry.tags.contains("runtime"));
    assert!(warning.entry.tags.contains("api"));
    assert!(error.entry.tags.contains("database"));
    assert_eq!(logger.entries().await.len(), 3);
}

#[tokio::test]
async fn build_error_is_tagged_and_unresolved() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = logger_in(&dir, Arc::new(MemoryStore::new()));

    let category: Category = "build".parse().expect("category");
    let logged = logger
        .log_error(
            Event::new(category, "Build failed", "Missing dependency")
                .error_message("Cannot resolve module lodash"),
        )
        .await
        .expect("log");

    let entry = &logged.entry;
    assert_eq!(entry.severity, Severity::Error);
    assert_eq!(entry.category, Category::Build);
    assert!(entry.tags.contains("build"));
    assert!(
        ["missing", "dependency", "module", "lodash"]
            .iter()
            .any(|kw| entry.tags.contains(*kw))
    );

    let unresolved = logger.unresolved_issues().await;
    assert!(unresolved.iter().any(|e| e.id == entry.id));
}

#[tokio::test]
async fn related_issues_are_found_by_shared_vocabulary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = logger_in(&dir, Arc::new(MemoryStore::new()));

    let existing = logger
        .log_error(Event::new(
            Category::Build,
            "Build failed: missing dependency lodash",
            "",
        ))
        .await
        .expect("existing");
    let unrelated = logger
        .log_info(Event::new(Category::Runtime, "Icons rendered", "sprite sheet ok"))
        .await
        .expect("unrelated");

    let new = logger
        .log_warning(Event::new(
            Category::Dependency,
            "Install warning",
            "lodash dependency missing during build",
        ))
        .await
        .expect("new");

    assert!(new.entry.related_issues.contains(&existing.entry.id));
    assert!(!new.entry.related_issues.contains(&unrelated.entry.id));
    assert!(!new.entry.related_issues.contains(&new.entry.id));

    let similar = logger.find_similar("lodash", "").await;
    let ids: Vec<EntryId> = similar.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![existing.entry.id, new.entry.id]);
}

#[tokio::test]
async fn resolve_issue_records_solution() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    let logger = logger_in(&dir, store.clone());

    let logged = logger
        .log_error(Event::new(Category::Build, "Build failed", "bad webpack config"))
        .await
        .expect("log");

    let updated = logger
        .resolve_issue(logged.entry.id, "fixed config", None)
        .await
        .expect("resolve")
        .expect("known id");
    assert_eq!(updated.entry.status, Status::Resolved);
    assert!(updated.entry.resolution_date.is_some());
    assert_eq!(updated.entry.solution.as_deref(), Some("fixed config"));

    let unknown = logger
        .resolve_issue(EntryId::generate(), "fixed config", None)
        .await
        .expect("unknown id is not an error");
    assert!(unknown.is_none());
    assert_eq!(store.update_calls(), 1);
}

#[tokio::test]
async fn concurrent_resolutions_settle_on_one_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(20)));
    let logger = Arc::new(logger_in(&dir, store.clone()));

    let id = logger
        .log_error(Event::new(Category::Database, "Connection pool exhausted", ""))
        .await
        .expect("log")
        .entry
        .id;

    let handles: Vec<_> = ["raised pool size", "closed leaked connections"]
        .into_iter()
        .map(|solution| {
            let logger = Arc::clone(&logger);
            tokio::spawn(async move { logger.resolve_issue(id, solution, None).await })
        })
        .collect();
    for handle in handles {
        let updated = handle.await.expect("join").expect("resolve");
        assert!(updated.is_some());
    }

    let buffered = logger.get(id).await.expect("buffered");
    assert_eq!(buffered.status, Status::Resolved);
    let winner = buffered.solution.clone().expect("solution");
    assert!(winner == "raised pool size" || winner == "closed leaked connections");

    let cached = JsonFileCache::new(dir.path(), DEFAULT_CACHE_KEY)
        .load()
        .expect("cache");
    let cached = cached.iter().find(|e| e.id == id).expect("cached entry");
    assert_eq!(cached.solution.as_deref(), Some(winner.as_str()));

    let records = store.records(Table::DebugLogs);
    let stored = records
        .iter()
        .find(|r| r.get("id") == Some(&serde_json::json!(id.to_string())))
        .expect("stored record");
    assert_eq!(stored.get("solution"), Some(&serde_json::json!(winner)));
    assert_eq!(store.update_calls(), 2);
}

#[tokio::test]
async fn entries_survive_restart_when_primary_is_down() {
    let dir = tempfile::tempdir().expect("tempdir");

    let first_ids: Vec<EntryId> = {
        let store = Arc::new(MemoryStore::unavailable());
        let logger = logger_in(&dir, store.clone());
        logger.initialize().await;

        let mut ids = Vec::new();
        for title in ["Timeout calling billing", "Retry exhausted", "Circuit open"] {
            let logged = logger
                .log_error(Event::new(Category::Api, title, "billing service"))
                .await
                .expect("log");
            assert!(!logged.persisted.primary);
            assert!(logged.persisted.fallback);
            ids.push(logged.entry.id);
        }
        logger.shutdown().await.expect("shutdown");
        assert_eq!(store.create_calls(), 3);
        assert!(store.records(Table::DebugLogs).is_empty());
        ids
    };

    let cache = JsonFileCache::new(dir.path(), devlog::DEFAULT_CACHE_KEY);
    assert!(cache.path().exists());

    let restarted = logger_in(&dir, Arc::new(MemoryStore::unavailable()));
    restarted.initialize().await;
    assert!(restarted.is_initialized());

    let loaded: Vec<EntryId> = restarted.entries().await.iter().map(|e| e.id).collect();
    assert_eq!(loaded, first_ids);
}

#[tokio::test]
async fn primary_store_wins_on_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store_dir = tempfile::tempdir().expect("store dir");

    let id = {
        let store = Arc::new(JsonDirStore::open(store_dir.path()).expect("store"));
        let logger = DebugLogger::builder(store)
            .config(
                LoggerConfig::default()
                    .with_user_id("dev")
                    .with_cache_dir(dir.path()),
            )
            .env(no_ci())
            .build()
            .expect("logger");
        let logged = logger
            .log_error(Event::new(Category::Runtime, "Crash on save", "null pointer"))
            .await
            .expect("log");
        logger
            .resolve_issue(logged.entry.id, "guard against empty doc", None)
            .await
            .expect("resolve");
        logged.entry.id
    };

    let store = Arc::new(JsonDirStore::open(store_dir.path()).expect("store"));
    let logger = DebugLogger::builder(store)
        .config(
            LoggerConfig::default()
                .with_user_id("dev")
                .with_cache_dir(dir.path()),
        )
        .env(no_ci())
        .build()
        .expect("logger");

    let entry = logger.get(id).await.expect("entry");
    assert_eq!(entry.status, Status::Resolved);
    assert_eq!(entry.solution.as_deref(), Some("guard against empty doc"));
    assert!(entry.environment.runtime_version.starts_with("rust "));
    assert_eq!(logger.entries().await.len(), 1);
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    let logger = Arc::new(logger_in(&dir, store.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let logger = Arc::clone(&logger);
        handles.push(tokio::spawn(async move { logger.initialize().await }));
    }
    for handle in handles {
        handle.await.expect("join");
    }
    logger.initialize().await;
    logger
        .log_info(Event::new(Category::Runtime, "Ready", ""))
        .await
        .expect("log");

    assert_eq!(store.query_calls(), 1);
}

#[tokio::test]
async fn concurrent_callers_all_land_in_buffer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = Arc::new(logger_in(&dir, Arc::new(MemoryStore::new())));

    let mut handles = Vec::new();
    for i in 0..16 {
        let logger = Arc::clone(&logger);
        handles.push(tokio::spawn(async move {
            logger
                .log_info(Event::new(Category::Runtime, format!("Event {i}"), ""))
                .await
                .map(|logged| logged.entry.id)
        }));
    }

    let mut ids = BTreeSet::new();
    for handle in handles {
        ids.insert(handle.await.expect("join").expect("log"));
    }

    let buffered: BTreeSet<EntryId> = logger.entries().await.iter().map(|e| e.id).collect();
    assert_eq!(buffered, ids);
    assert_eq!(logger.stats().await.total, 16);
}

#[tokio::test]
async fn cicd_event_in_pipeline_writes_run_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    let env: HashMap<String, String> = [
        ("CI", "true"),
        ("CI_PIPELINE_ID", "1234"),
        ("CI_COMMIT_REF_NAME", "main"),
        ("CI_COMMIT_SHA", "0badc0de"),
        ("CI_JOB_ID", "77"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let logger = DebugLogger::builder(store.clone())
        .config(LoggerConfig::default().with_cache_dir(dir.path()))
        .env(Arc::new(env))
        .build()
        .expect("logger");

    let emitted = logger
        .log_cicd_event("deploy", PipelineStatus::Failed, "Deployment to production failed")
        .await
        .expect("emit");

    assert_eq!(emitted.logged.entry.category, Category::CiCd);
    assert_eq!(emitted.logged.entry.severity, Severity::Info);
    assert!(emitted.record_written);

    let runs = store.records(Table::PipelineRuns);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].get("status"), Some(&serde_json::json!("failed")));
    assert_eq!(runs[0].get("pipeline_id"), Some(&serde_json::json!("1234")));
    assert_eq!(runs[0].get("commit_sha"), Some(&serde_json::json!("0badc0de")));
}

#[tokio::test]
async fn security_scan_forwards_breadcrumb_and_writes_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let logger = DebugLogger::builder(store.clone())
        .config(LoggerConfig::default().with_cache_dir(dir.path()))
        .sink(sink.clone())
        .env(no_ci())
        .build()
        .expect("logger");

    let emitted = logger
        .log_security_scan(SecurityScanReport {
            scan_type: "dependency-audit".to_string(),
            status: ScanStatus::Warning,
            vulnerabilities: vec![Vulnerability {
                id: "GHSA-xxxx".to_string(),
                package: "minimist".to_string(),
                severity: VulnerabilitySeverity::Medium,
                title: "Prototype pollution".to_string(),
                fixed_in: Some("1.2.6".to_string()),
            }],
        })
        .await
        .expect("emit");

    assert!(emitted.record_written);
    assert!(emitted.logged.forwarded);
    assert_eq!(emitted.logged.entry.category, Category::Security);
    assert!(matches!(sink.events().as_slice(), [SinkEvent::Breadcrumb(_)]));

    let scans = store.records(Table::SecurityScans);
    assert_eq!(
        scans[0].get("severity_counts"),
        Some(&serde_json::json!({"critical": 0, "high": 0, "medium": 1, "low": 0}))
    );
}

#[tokio::test]
async fn slow_primary_store_degrades_to_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(10)));
    let logger = DebugLogger::builder(store)
        .config(
            LoggerConfig::default()
                .with_cache_dir(dir.path())
                .with_store_timeout(Duration::from_millis(25)),
        )
        .env(no_ci())
        .build()
        .expect("logger");

    let logged = logger
        .log_warning(Event::new(Category::Api, "Slow", "upstream"))
        .await
        .expect("log");
    assert!(logged.persisted.is_degraded());
    assert!(logged.persisted.is_durable());
}
