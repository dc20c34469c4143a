//! Conversation export files accepted by `chatmem sync`.

use anyhow::{Context, bail};
use chatmem_rs_memory::Conversation;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Either an object keyed by conversation id or a plain array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConversationExport {
    Keyed(BTreeMap<String, Conversation>),
    List(Vec<Conversation>),
}

/// Parse an export into conversations keyed by id.
///
/// In the keyed form the map key wins over the embedded `id`, which may be
/// omitted. List entries must carry a non-empty `id`.
pub fn parse_conversations(contents: &str) -> anyhow::Result<BTreeMap<String, Conversation>> {
    let export: ConversationExport =
        serde_json::from_str(contents).context("conversation export is not valid JSON")?;
    let conversations = match export {
        ConversationExport::Keyed(map) => map
            .into_iter()
            .map(|(id, mut conversation)| {
                conversation.id = id.clone();
                (id, conversation)
            })
            .collect(),
        ConversationExport::List(list) => {
            let mut conversations = BTreeMap::new();
            for (index, conversation) in list.into_iter().enumerate() {
                if conversation.id.trim().is_empty() {
                    bail!("conversation at index {index} has no id");
                }
                conversations.insert(conversation.id.clone(), conversation);
            }
            conversations
        }
    };
    Ok(conversations)
}

pub fn load_conversations(path: &Path) -> anyhow::Result<BTreeMap<String, Conversation>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_conversations(&contents).with_context(|| format!("failed to parse {}", path.display()))
}
