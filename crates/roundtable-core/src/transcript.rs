//! Conversation transcript model shared by the driver and the extractor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Speaker role in the group conversation. Closed set: matching is
/// exhaustive everywhere, so an added role is a compile error rather than a
/// silently unhandled speaker name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "user_proxy")]
    UserProxy,
    #[serde(rename = "research_agent")]
    Research,
    #[serde(rename = "synthesis_agent")]
    Synthesis,
    #[serde(rename = "critique_agent")]
    Critique,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::UserProxy => "user_proxy",
            AgentRole::Research => "research_agent",
            AgentRole::Synthesis => "synthesis_agent",
            AgentRole::Critique => "critique_agent",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation. Immutable once appended to a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub speaker: AgentRole,
    pub content: String,
}

impl Message {
    pub fn new(speaker: AgentRole, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
        }
    }
}

/// Ordered, append-only record of a single group conversation.
pub type Transcript = Vec<Message>;

/// Count how many turns each role contributed. Total over any transcript;
/// the values always sum to the transcript length.
pub fn contribution_counts(transcript: &Transcript) -> BTreeMap<AgentRole, usize> {
    let mut counts = BTreeMap::new();
    for message in transcript {
        *counts.entry(message.speaker).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_empty_transcript() {
        assert!(contribution_counts(&Vec::new()).is_empty());
    }

    #[test]
    fn counts_by_role() {
        let transcript = vec![
            Message::new(AgentRole::Research, "a"),
            Message::new(AgentRole::Research, "b"),
            Message::new(AgentRole::Synthesis, "c"),
        ];

        let counts = contribution_counts(&transcript);
        assert_eq!(counts.get(&AgentRole::Research), Some(&2));
        assert_eq!(counts.get(&AgentRole::Synthesis), Some(&1));
        assert_eq!(counts.get(&AgentRole::Critique), None);
        assert_eq!(counts.values().sum::<usize>(), transcript.len());
    }

    #[test]
    fn roles_serialize_with_wire_names() {
        let json = serde_json::to_string(&AgentRole::Research).unwrap();
        assert_eq!(json, "\"research_agent\"");
    }
}
