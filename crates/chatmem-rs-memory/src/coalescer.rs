//! Debounced batching of message writes.

use crate::error::ArchiveError;
use crate::handle_store::HandleStore;
use crate::model::{DateKey, MessageRecord};
use crate::writer::AppendMergeWriter;
use chatmem_rs_config::ArchiveConfig;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Collects messages and flushes them once writes go quiet.
///
/// Cloning yields another handle onto the same queue.
#[derive(Clone)]
pub struct WriteCoalescer {
    inner: Arc<CoalescerInner>,
}

struct CoalescerInner {
    handles: Arc<HandleStore>,
    writer: AppendMergeWriter,
    quiet_period: Duration,
    enabled: bool,
    pending: Mutex<VecDeque<MessageRecord>>,
    timer: Mutex<TimerSlot>,
    flush_gate: tokio::sync::Mutex<()>,
}

/// At most one scheduled flush; `generation` lets a woken timer detect that
/// it was superseded.
#[derive(Default)]
struct TimerSlot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl WriteCoalescer {
    pub fn new(handles: Arc<HandleStore>, config: &ArchiveConfig) -> Self {
        Self {
            inner: Arc::new(CoalescerInner {
                handles,
                writer: AppendMergeWriter::new(config.file_extension.clone()),
                quiet_period: Duration::from_millis(config.debounce_ms),
                enabled: config.enabled,
                pending: Mutex::new(VecDeque::new()),
                timer: Mutex::new(TimerSlot::default()),
                flush_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Whether enqueued messages will be accepted.
    pub fn is_accepting(&self) -> bool {
        self.inner.enabled && self.inner.handles.is_active()
    }

    /// Queue a message and restart the quiet period.
    ///
    /// Returns `false` without side effects when the archive is disabled or
    /// no directory is active.
    pub fn enqueue(&self, message: MessageRecord) -> bool {
        if !self.is_accepting() {
            return false;
        }
        if let Err(err) = message.date_key() {
            warn!("dropping message with unusable timestamp (id={}): {err}", message.id);
            return false;
        }
        self.inner.pending.lock().push_back(message);
        self.arm();
        true
    }

    /// Cancel any scheduled flush and flush now.
    pub async fn force_flush(&self) -> Result<usize, ArchiveError> {
        self.inner.disarm_any();
        self.inner.flush().await
    }

    /// Messages waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Whether a flush is scheduled.
    pub fn is_armed(&self) -> bool {
        self.inner.timer.lock().task.is_some()
    }

    fn arm(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime; queued messages wait for force_flush");
            return;
        };
        let mut slot = self.inner.timer.lock();
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        if let Some(previous) = slot.task.take() {
            previous.abort();
        }
        let inner = Arc::clone(&self.inner);
        slot.task = Some(runtime.spawn(async move {
            tokio::time::sleep(inner.quiet_period).await;
            if !inner.disarm(generation) {
                return;
            }
            if let Err(err) = inner.flush().await {
                error!("scheduled flush failed: {err}");
            }
        }));
    }
}

impl CoalescerInner {
    /// Clear the slot if it still belongs to `generation`.
    fn disarm(&self, generation: u64) -> bool {
        let mut slot = self.timer.lock();
        if slot.generation != generation {
            return false;
        }
        slot.task = None;
        true
    }

    fn disarm_any(&self) {
        let mut slot = self.timer.lock();
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(task) = slot.task.take() {
            task.abort();
        }
    }

    /// Drain the queue and write it out grouped by date.
    ///
    /// On the first failing group the whole drained batch goes back to the
    /// front of the queue.
    async fn flush(&self) -> Result<usize, ArchiveError> {
        let _gate = self.flush_gate.lock().await;
        let Some(directory) = self.handles.active() else {
            return Ok(0);
        };
        let batch: Vec<MessageRecord> = self.pending.lock().drain(..).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let groups = group_by_date(&batch);
        let mut written = 0;
        for (key, messages) in &groups {
            match self
                .writer
                .append(directory.as_ref(), key, messages)
                .await
            {
                Ok(count) => written += count,
                Err(err) => {
                    let requeued = batch.len();
                    self.requeue(batch);
                    return Err(ArchiveError::Flush {
                        date: key.to_string(),
                        requeued,
                        source: Box::new(err),
                    });
                }
            }
        }
        info!(
            "flushed messages (submitted={}, written={}, files={})",
            batch.len(),
            written,
            groups.len()
        );
        Ok(written)
    }

    fn requeue(&self, batch: Vec<MessageRecord>) {
        let mut pending = self.pending.lock();
        for message in batch.into_iter().rev() {
            pending.push_front(message);
        }
        debug!("re-queued failed batch (pending={})", pending.len());
    }
}

/// Partition records by UTC date, preserving arrival order within a date.
pub fn group_by_date(messages: &[MessageRecord]) -> BTreeMap<DateKey, Vec<MessageRecord>> {
    let mut groups: BTreeMap<DateKey, Vec<MessageRecord>> = BTreeMap::new();
    for message in messages {
        // enqueue rejects records without a valid key
        if let Ok(key) = message.date_key() {
            groups.entry(key).or_default().push(message.clone());
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::group_by_date;
    use crate::model::{MessageRecord, Role};
    use pretty_assertions::assert_eq;

    fn message(id: &str, timestamp: i64) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            chat_id: "c".to_string(),
            chat_title: "t".to_string(),
            order: 0,
            role: Role::User,
            content: String::new(),
            timestamp,
        }
    }

    #[test]
    fn grouping_depends_only_on_timestamp() {
        let day_one = 1_714_564_800_000;
        let day_two = 1_714_636_800_000;
        let forward = vec![
            message("a", day_one),
            message("b", day_two),
            message("c", day_one + 1),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let groups = group_by_date(&forward);
        let keys: Vec<String> = groups.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["2024-05-01", "2024-05-02"]);
        let ids: Vec<&str> = groups
            .values()
            .next()
            .expect("first group")
            .iter()
            .map(|message| message.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let reversed_groups = group_by_date(&reversed);
        for (key, messages) in &groups {
            let mut left: Vec<_> = messages.iter().map(|m| m.id.clone()).collect();
            let mut right: Vec<_> = reversed_groups[key].iter().map(|m| m.id.clone()).collect();
            left.sort();
            right.sort();
            assert_eq!(left, right);
        }
    }
}
