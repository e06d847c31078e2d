//! Scrapes structured research results out of a finished transcript.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::transcript::{AgentRole, Message, Transcript};

/// Research messages at or below this length are skipped as findings.
/// Their URLs are still harvested.
const MIN_FINDING_LEN: usize = 50;

/// Synthesis and critique messages must exceed this length to be kept.
const MIN_SECTION_LEN: usize = 100;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"http[s]?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+")
        .expect("invalid url regex")
});

/// One substantive research-agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub content: String,
    pub agent: AgentRole,
}

/// Structured fields derived from a transcript. Always recomputed in full;
/// never updated incrementally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedResults {
    pub findings: Vec<Finding>,
    pub sources: BTreeSet<String>,
    pub synthesis: String,
    pub critique: String,
}

/// Single ordered pass over the transcript.
///
/// Research turns contribute URLs and (when long enough) findings.
/// Synthesis and critique keep only the last qualifying message: plain
/// overwrite, not aggregation. User-proxy turns are never inspected.
pub fn extract_results(transcript: &Transcript) -> ExtractedResults {
    let mut results = ExtractedResults::default();

    for Message { speaker, content } in transcript {
        match speaker {
            AgentRole::Research => {
                for url in URL_PATTERN.find_iter(content) {
                    results.sources.insert(url.as_str().to_string());
                }
                if content.chars().count() > MIN_FINDING_LEN {
                    results.findings.push(Finding {
                        content: content.clone(),
                        agent: AgentRole::Research,
                    });
                }
            }
            AgentRole::Synthesis => {
                if content.chars().count() > MIN_SECTION_LEN {
                    results.synthesis = content.clone();
                }
            }
            AgentRole::Critique => {
                if content.chars().count() > MIN_SECTION_LEN {
                    results.critique = content.clone();
                }
            }
            AgentRole::UserProxy => {}
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Message;

    fn long_text(prefix: &str, len: usize) -> String {
        let mut text = prefix.to_string();
        while text.chars().count() <= len {
            text.push('x');
        }
        text
    }

    #[test]
    fn empty_transcript_yields_empty_results() {
        let results = extract_results(&Vec::new());
        assert!(results.findings.is_empty());
        assert!(results.sources.is_empty());
        assert!(results.synthesis.is_empty());
        assert!(results.critique.is_empty());
    }

    #[test]
    fn short_research_message_contributes_urls_but_no_finding() {
        // 46 chars, at most the threshold: no finding, URLs still harvested.
        let transcript = vec![Message::new(
            AgentRole::Research,
            "At https://example.com/a https://example.com/a",
        )];

        let results = extract_results(&transcript);
        assert_eq!(results.sources.len(), 1);
        assert!(results.sources.contains("https://example.com/a"));
        assert!(results.findings.is_empty());
    }

    #[test]
    fn long_research_message_becomes_a_finding() {
        let content = long_text("See https://example.com/report for details. ", MIN_FINDING_LEN);
        let transcript = vec![Message::new(AgentRole::Research, content.clone())];

        let results = extract_results(&transcript);
        assert_eq!(results.findings.len(), 1);
        assert_eq!(results.findings[0].content, content);
        assert_eq!(results.findings[0].agent, AgentRole::Research);
        assert!(results.sources.contains("https://example.com/report"));
    }

    #[test]
    fn later_synthesis_overwrites_earlier() {
        let first = long_text("first synthesis ", MIN_SECTION_LEN);
        let second = long_text("second synthesis ", MIN_SECTION_LEN);
        let transcript = vec![
            Message::new(AgentRole::Synthesis, first),
            Message::new(AgentRole::Synthesis, second.clone()),
        ];

        let results = extract_results(&transcript);
        assert_eq!(results.synthesis, second);
    }

    #[test]
    fn short_synthesis_is_ignored() {
        let transcript = vec![Message::new(AgentRole::Synthesis, "too short")];
        assert!(extract_results(&transcript).synthesis.is_empty());
    }

    #[test]
    fn user_proxy_urls_are_not_harvested() {
        let transcript = vec![Message::new(
            AgentRole::UserProxy,
            "Please look at https://example.com/ignored",
        )];
        assert!(extract_results(&transcript).sources.is_empty());
    }

    #[test]
    fn findings_never_exceed_research_turns() {
        let transcript = vec![
            Message::new(AgentRole::Research, "short"),
            Message::new(AgentRole::Research, long_text("long ", MIN_FINDING_LEN)),
            Message::new(AgentRole::Critique, long_text("critique ", MIN_SECTION_LEN)),
        ];

        let results = extract_results(&transcript);
        let research_turns = transcript
            .iter()
            .filter(|m| m.speaker == AgentRole::Research)
            .count();
        assert!(results.findings.len() <= research_turns);
        for finding in &results.findings {
            assert!(finding.content.chars().count() > MIN_FINDING_LEN);
        }
    }
}
