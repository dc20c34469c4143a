//! Idempotent append of message records into date files.

use crate::capability::DirectoryCapability;
use crate::error::ArchiveError;
use crate::model::{DateKey, MessageRecord};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;

/// Appends records to `{date}.{extension}` files, skipping identities that
/// are already present.
#[derive(Debug, Clone)]
pub struct AppendMergeWriter {
    extension: String,
}

impl AppendMergeWriter {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// File name for a partition.
    pub fn file_name(&self, key: &DateKey) -> String {
        format!("{key}.{}", self.extension)
    }

    /// Merge `messages` into the file for `key`, returning how many lines
    /// were written.
    ///
    /// Existing bytes are never rewritten. When nothing is new the file is
    /// left untouched.
    pub async fn append(
        &self,
        directory: &dyn DirectoryCapability,
        key: &DateKey,
        messages: &[MessageRecord],
    ) -> Result<usize, ArchiveError> {
        let name = self.file_name(key);
        let file = directory.open_file(&name, true).await?;
        let existing = directory.read_text(&file).await?;
        let mut seen = existing_ids(&existing);

        let fresh: Vec<&MessageRecord> = messages
            .iter()
            .filter(|message| seen.insert(message.id.clone()))
            .collect();
        if fresh.is_empty() {
            debug!(
                "nothing new to append (file={name}, candidates={})",
                messages.len()
            );
            return Ok(0);
        }

        let mut block = String::new();
        // Keep a torn trailing line on its own line.
        if !existing.is_empty() && !existing.ends_with('\n') {
            block.push('\n');
        }
        for message in &fresh {
            block.push_str(&serde_json::to_string(message)?);
            block.push('\n');
        }

        directory
            .write_at(&file, file.size, block.as_bytes())
            .await?;
        info!("appended messages (file={name}, count={})", fresh.len());
        Ok(fresh.len())
    }
}

/// Identities found in line-delimited JSON content.
///
/// Blank lines, unparseable lines and records without a string `id` are
/// skipped.
pub fn existing_ids(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| match value.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{AppendMergeWriter, existing_ids};
    use crate::capability::DirectoryCapability;
    use crate::local::LocalDirectory;
    use crate::model::{DateKey, MessageRecord, Role};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tempfile::tempdir;

    const DAY_MS: i64 = 1_714_564_800_000;

    fn message(id: &str) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            chat_id: "c1".to_string(),
            chat_title: "Untitled".to_string(),
            order: 0,
            role: Role::User,
            content: format!("body of {id}"),
            timestamp: DAY_MS,
        }
    }

    fn key() -> DateKey {
        DateKey::from_millis(DAY_MS).expect("key")
    }

    #[test]
    fn existing_ids_skips_garbage() {
        let content = concat!(
            "{\"id\":\"a\"}\n",
            "\n",
            "not json\n",
            "{\"content\":\"no id\"}\n",
            "{\"id\":7}\n",
            "{\"id\":\"\"}\n",
            "  {\"id\":\"b\"}  \n",
            "{\"id\":\"c\""
        );
        let expected: HashSet<String> = ["a", "b"].iter().map(|id| id.to_string()).collect();
        assert_eq!(existing_ids(content), expected);
    }

    #[tokio::test]
    async fn append_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let dir = LocalDirectory::new(temp.path());
        let writer = AppendMergeWriter::new("jsonl");
        let batch = vec![message("c1-0"), message("c1-1")];

        assert_eq!(writer.append(&dir, &key(), &batch).await.expect("first"), 2);
        let path = temp.path().join("2024-05-01.jsonl");
        let after_first = std::fs::read_to_string(&path).expect("read");

        assert_eq!(writer.append(&dir, &key(), &batch).await.expect("again"), 0);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), after_first);

        let lines: Vec<MessageRecord> = after_first
            .lines()
            .map(|line| serde_json::from_str(line).expect("line"))
            .collect();
        assert_eq!(lines, batch);
    }

    #[tokio::test]
    async fn append_only_adds_new_and_preserves_prefix() {
        let temp = tempdir().expect("tempdir");
        let dir = LocalDirectory::new(temp.path());
        let writer = AppendMergeWriter::new("jsonl");
        writer
            .append(&dir, &key(), &[message("c1-0")])
            .await
            .expect("seed");
        let path = temp.path().join("2024-05-01.jsonl");
        let before = std::fs::read_to_string(&path).expect("read");

        let written = writer
            .append(
                &dir,
                &key(),
                &[message("c1-0"), message("c1-1"), message("c1-1")],
            )
            .await
            .expect("merge");
        assert_eq!(written, 1);
        let after = std::fs::read_to_string(&path).expect("read");
        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), 2);
    }

    #[tokio::test]
    async fn torn_trailing_line_is_isolated() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("2024-05-01.jsonl");
        std::fs::write(&path, "{\"id\":\"c1-0\"}\n{\"id\":\"c1-").expect("seed");
        let dir = LocalDirectory::new(temp.path());
        let writer = AppendMergeWriter::new("jsonl");

        let written = writer
            .append(&dir, &key(), &[message("c1-0"), message("c1-1")])
            .await
            .expect("append");
        assert_eq!(written, 1);
        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "{\"id\":\"c1-");
        assert!(existing_ids(&content).contains("c1-1"));
    }

    #[tokio::test]
    async fn empty_batch_does_not_create_content() {
        let temp = tempdir().expect("tempdir");
        let dir = LocalDirectory::new(temp.path());
        let writer = AppendMergeWriter::new("log");
        assert_eq!(writer.file_name(&key()), "2024-05-01.log");
        assert_eq!(writer.append(&dir, &key(), &[]).await.expect("empty"), 0);
        let file = dir.open_file("2024-05-01.log", false).await.expect("open");
        assert_eq!(file.size, 0);
    }
}
