use std::sync::Arc;
use std::time::Duration;

use placelog_core::host::MemoryHost;
use placelog_core::store::MemoryStore;
use placelog_core::{HostEnvironment, LoggerConfig, ManualClock, Position, SessionInfo};
use placelog_events::{log_entry, Batch, EventRecord, Value};
use placelog_runner::{ChatMessage, LogSink, LoggerRuntime, SessionEvent};

fn alice() -> SessionInfo {
    SessionInfo {
        id: 1,
        user_id: 100,
        display_name: "Alice".to_string(),
    }
}

fn config() -> LoggerConfig {
    LoggerConfig {
        world_id: "world-1".to_string(),
        ..LoggerConfig::default()
    }
}

fn records_in(store: &MemoryStore) -> Vec<EventRecord> {
    store
        .blob_keys("Logging")
        .iter()
        .filter_map(|key| store.blob("Logging", key))
        .flat_map(|blob| Batch::from_json(blob).unwrap().records().to_vec())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_production_runtime_flushes_every_interval() {
    let host = Arc::new(MemoryHost::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_000));
    host.connect(alice());
    host.set_region(1, "DE");

    let runtime = LoggerRuntime::builder()
        .with_config(config())
        .environment(HostEnvironment::production())
        .with_store(store.clone())
        .with_host(host.clone())
        .with_clock(clock.clone())
        .run_id("run-7f3a")
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));

    runtime.sessions().send(SessionEvent::Joined(alice())).unwrap();
    runtime
        .chat()
        .unwrap()
        .send(ChatMessage::new(1, "hi"))
        .unwrap();
    runtime.client(1).log(log_entry!("shop", "sword"));

    clock.set(61_000);
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(store.blob_keys("Logging"), vec!["61000.7f3a".to_string()]);
    let blob = store.blob("Logging", "61000.7f3a").unwrap();
    assert_eq!(blob[0], serde_json::json!(["world-1", "run-7f3a"]));

    // Each relay is its own task, so only the set of kinds is fixed
    let mut kinds: Vec<_> = records_in(&store)
        .iter()
        .map(|r| r.kind().to_string())
        .collect();
    kinds.sort();
    assert_eq!(kinds, vec!["chat", "joined", "shop"]);

    let stats = runtime.shutdown().await;
    assert_eq!(stats.batches_written, 1);
    assert_eq!(stats.records_written, 3);
    assert_eq!(store.index_entries("LoggingIndex").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_remaining_records() {
    let host = Arc::new(MemoryHost::new());
    let store = Arc::new(MemoryStore::new());
    host.connect(alice());
    host.set_position(1, Some(Position::new(1.2, 2.5, -3.0)));

    let runtime = LoggerRuntime::builder()
        .with_config(config())
        .environment(HostEnvironment::production())
        .with_store(store.clone())
        .with_host(host)
        .with_clock(Arc::new(ManualClock::new(5_000)))
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));

    // Three position samples, no scheduled flush yet
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert!(store.blob_keys("Logging").is_empty());
    runtime.logger().log_as("Alice", log_entry!("left"));

    let stats = runtime.shutdown().await;
    assert_eq!(stats.batches_written, 1);

    let records = records_in(&store);
    assert_eq!(records.len(), 4);
    assert!(records[..3].iter().all(|r| r.kind() == "positions"));
    assert_eq!(records[3].payload(), &[Value::from("Alice")]);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_is_logged_not_raised() {
    let host = Arc::new(MemoryHost::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));

    let runtime = LoggerRuntime::builder()
        .with_config(config())
        .environment(HostEnvironment::production())
        .with_store(store.clone())
        .with_host(host)
        .with_clock(clock.clone())
        .run_id("run-7f3a")
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));

    store.fail_next_blob_writes(1);
    runtime.logger().log(log_entry!("joined", "Alice"));

    clock.set(60_000);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(store.blob_keys("Logging").is_empty());
    assert_eq!(runtime.queue().len(), 1);

    clock.set(120_000);
    let stats = runtime.shutdown().await;
    assert_eq!(stats.blob_failures, 1);
    assert_eq!(stats.batches_written, 1);

    let records = records_in(&store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind(), "error");
    assert_eq!(records[0].payload()[0], Value::from("Logging"));
}

#[tokio::test(start_paused = true)]
async fn test_pretending_runs_pipeline_without_store() {
    let host = Arc::new(MemoryHost::new());
    let config = LoggerConfig {
        pretend_its_deployed: true,
        ..config()
    };

    let runtime = LoggerRuntime::builder()
        .with_config(config)
        .environment(HostEnvironment::local())
        .with_host(host)
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));

    assert!(runtime.is_live());
    assert!(runtime.chat().is_some());
    runtime.logger().log(log_entry!("joined", "Alice"));

    let stats = runtime.shutdown().await;
    assert_eq!(stats.batches_written, 1);
    assert_eq!(stats.records_written, 1);
}

#[tokio::test]
async fn test_local_runtime_prints_instead_of_queueing() {
    let runtime = LoggerRuntime::builder()
        .with_config(config())
        .with_host(Arc::new(MemoryHost::new()))
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"));

    runtime.logger().log(log_entry!("joined", "Alice"));
    runtime.errors().report("ShopScript", "oops");
    assert!(runtime.queue().is_empty());

    runtime.shutdown().await;
}
