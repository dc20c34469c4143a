//! Debounce, flush and re-queue behaviour of the write coalescer.

use chatmem_rs_config::ArchiveConfig;
use chatmem_rs_memory::{ArchiveError, HandleStore, WriteCoalescer};
use chatmem_rs_test_utils::{
    DAY_ONE_MS, DAY_TWO_MS, MemoryDirectory, MemoryHandleStore, StubResolver, message,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn active_coalescer(dir: Arc<MemoryDirectory>, config: &ArchiveConfig) -> WriteCoalescer {
    let handles = Arc::new(HandleStore::new(
        Arc::new(MemoryHandleStore::new()),
        Arc::new(StubResolver::new(dir.clone())),
    ));
    handles.persist(dir).await.expect("persist");
    WriteCoalescer::new(handles, config)
}

/// A burst of enqueues collapses into one flush after the last one.
#[tokio::test(start_paused = true)]
async fn burst_collapses_into_single_flush() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let coalescer = active_coalescer(dir.clone(), &ArchiveConfig::default()).await;

    for order in 0..5 {
        assert!(coalescer.enqueue(message("c1", order, DAY_ONE_MS)));
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    // Last enqueue was 500ms ago; the quiet period has not elapsed.
    assert_eq!(dir.writes(), 0);
    assert_eq!(coalescer.pending_len(), 5);
    assert!(coalescer.is_armed());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(dir.writes(), 1);
    assert_eq!(dir.line_count(), 5);
    assert_eq!(coalescer.pending_len(), 0);
    assert!(!coalescer.is_armed());
}

#[tokio::test(start_paused = true)]
async fn respects_configured_quiet_period() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let config = ArchiveConfig {
        debounce_ms: 50,
        ..ArchiveConfig::default()
    };
    let coalescer = active_coalescer(dir.clone(), &config).await;

    coalescer.enqueue(message("c1", 0, DAY_ONE_MS));
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(dir.writes(), 0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dir.writes(), 1);
}

/// A forced flush cancels the armed timer so nothing fires later.
#[tokio::test(start_paused = true)]
async fn force_flush_disarms_timer() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let coalescer = active_coalescer(dir.clone(), &ArchiveConfig::default()).await;

    coalescer.enqueue(message("c1", 0, DAY_ONE_MS));
    coalescer.enqueue(message("c1", 1, DAY_TWO_MS));
    assert!(coalescer.is_armed());

    assert_eq!(coalescer.force_flush().await.expect("flush"), 2);
    assert!(!coalescer.is_armed());
    let opens = dir.opens();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(dir.opens(), opens);
    assert_eq!(
        dir.file_names(),
        vec!["2024-05-01.jsonl".to_string(), "2024-05-02.jsonl".to_string()]
    );
}

/// A failed write puts the whole batch back ahead of newer messages.
#[tokio::test]
async fn failed_flush_requeues_entire_batch() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let coalescer = active_coalescer(dir.clone(), &ArchiveConfig::default()).await;

    coalescer.enqueue(message("c1", 0, DAY_ONE_MS));
    coalescer.enqueue(message("c1", 1, DAY_TWO_MS));
    coalescer.enqueue(message("c2", 0, DAY_ONE_MS));
    dir.fail_next_writes(1);

    let err = coalescer.force_flush().await.unwrap_err();
    match err {
        ArchiveError::Flush { date, requeued, .. } => {
            assert_eq!(date, "2024-05-01");
            assert_eq!(requeued, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(coalescer.pending_len(), 3);
    assert_eq!(dir.line_count(), 0);

    coalescer.enqueue(message("c3", 0, DAY_ONE_MS));
    assert_eq!(coalescer.force_flush().await.expect("retry"), 4);
    let day_one = dir.file("2024-05-01.jsonl").expect("day one");
    let ids: Vec<&str> = day_one
        .lines()
        .map(|line| line.split('"').nth(3).expect("id"))
        .collect();
    assert_eq!(ids, vec!["c1-0", "c2-0", "c3-0"]);
}

/// A failing timer flush keeps the batch; the next quiet period writes it.
#[tokio::test(start_paused = true)]
async fn scheduled_flush_failure_requeues_until_next_quiet_period() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let coalescer = active_coalescer(dir.clone(), &ArchiveConfig::default()).await;
    dir.fail_next_writes(1);

    coalescer.enqueue(message("c1", 0, DAY_ONE_MS));
    coalescer.enqueue(message("c1", 1, DAY_ONE_MS));
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(coalescer.pending_len(), 2);
    assert_eq!(dir.line_count(), 0);
    assert!(!coalescer.is_armed());

    coalescer.enqueue(message("c1", 2, DAY_ONE_MS));
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(coalescer.pending_len(), 0);
    assert_eq!(dir.writes(), 1);
    let day_one = dir.file("2024-05-01.jsonl").expect("day one");
    let ids: Vec<&str> = day_one
        .lines()
        .map(|line| line.split('"').nth(3).expect("id"))
        .collect();
    assert_eq!(ids, vec!["c1-0", "c1-1", "c1-2"]);
}

/// Existing lines, including a torn tail, are respected by the merge.
#[tokio::test]
async fn flush_merges_into_file_with_torn_tail() {
    let seeded = "{\"id\":\"c1-0\",\"chatId\":\"c1\"}\n{\"id\":\"c1-1\",\"cha";
    let dir = Arc::new(MemoryDirectory::new("memory").with_file("2024-05-01.jsonl", seeded));
    let coalescer = active_coalescer(dir.clone(), &ArchiveConfig::default()).await;

    for order in 0..3 {
        coalescer.enqueue(message("c1", order, DAY_ONE_MS));
    }
    assert_eq!(coalescer.force_flush().await.expect("flush"), 2);

    let content = dir.file("2024-05-01.jsonl").expect("file");
    assert!(content.starts_with(seeded));
    let appended: Vec<&str> = content[seeded.len()..]
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split('"').nth(3).expect("id"))
        .collect();
    assert_eq!(appended, vec!["c1-1", "c1-2"]);
    assert!(content.ends_with('\n'));
}

/// Groups written before a failure are deduplicated on retry.
#[tokio::test]
async fn partial_failure_retry_is_idempotent() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let coalescer = active_coalescer(dir.clone(), &ArchiveConfig::default()).await;

    coalescer.enqueue(message("c1", 0, DAY_ONE_MS));
    coalescer.enqueue(message("c1", 1, DAY_ONE_MS));
    coalescer.enqueue(message("c1", 2, DAY_TWO_MS));
    dir.fail_writes_after(1, 1);

    assert!(coalescer.force_flush().await.is_err());
    assert_eq!(dir.line_count(), 2);
    assert_eq!(coalescer.pending_len(), 3);

    assert_eq!(coalescer.force_flush().await.expect("retry"), 1);
    assert_eq!(dir.line_count(), 3);
    assert_eq!(coalescer.pending_len(), 0);
}

#[tokio::test]
async fn inactive_or_disabled_coalescer_ignores_messages() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let handles = Arc::new(HandleStore::new(
        Arc::new(MemoryHandleStore::new()),
        Arc::new(StubResolver::new(dir.clone())),
    ));
    let coalescer = WriteCoalescer::new(handles, &ArchiveConfig::default());
    assert!(!coalescer.enqueue(message("c1", 0, DAY_ONE_MS)));
    assert_eq!(coalescer.force_flush().await.expect("flush"), 0);
    assert_eq!(dir.opens(), 0);

    let disabled = ArchiveConfig {
        enabled: false,
        ..ArchiveConfig::default()
    };
    let coalescer = active_coalescer(dir.clone(), &disabled).await;
    assert!(!coalescer.is_accepting());
    assert!(!coalescer.enqueue(message("c1", 0, DAY_ONE_MS)));
    assert_eq!(coalescer.pending_len(), 0);
    assert!(!coalescer.is_armed());
}

#[tokio::test]
async fn rejects_unrepresentable_timestamps() {
    let dir = Arc::new(MemoryDirectory::new("memory"));
    let coalescer = active_coalescer(dir, &ArchiveConfig::default()).await;
    assert!(!coalescer.enqueue(message("c1", 0, i64::MAX)));
    assert_eq!(coalescer.pending_len(), 0);
}
