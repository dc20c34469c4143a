//! Bulk backfill of whole conversations.

use crate::coalescer::WriteCoalescer;
use crate::error::ArchiveError;
use crate::model::Conversation;
use chrono::Utc;
use log::info;

/// Queue one conversation's messages, returning how many were accepted.
pub fn enqueue_conversation(
    coalescer: &WriteCoalescer,
    conversation: &Conversation,
    default_title: &str,
) -> usize {
    if !coalescer.is_accepting() || conversation.messages.is_empty() {
        return 0;
    }
    let now = Utc::now().timestamp_millis();
    conversation
        .to_records(default_title, now)
        .into_iter()
        .map(|record| coalescer.enqueue(record))
        .filter(|accepted| *accepted)
        .count()
}

/// Queue every conversation, force a flush, and return the number of
/// messages submitted.
///
/// The count includes messages that were already on disk; the number of
/// lines actually appended is logged. Returns 0 without touching storage
/// when the archive is not accepting writes.
pub async fn sync_all<'a, I>(
    coalescer: &WriteCoalescer,
    conversations: I,
    default_title: &str,
) -> Result<usize, ArchiveError>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    if !coalescer.is_accepting() {
        return Ok(0);
    }
    let mut submitted = 0;
    let mut synced = 0;
    for conversation in conversations {
        let count = enqueue_conversation(coalescer, conversation, default_title);
        if count > 0 {
            synced += 1;
        }
        submitted += count;
    }
    let written = coalescer.force_flush().await?;
    info!(
        "sync complete (conversations={synced}, submitted={submitted}, written={written})"
    );
    Ok(submitted)
}
