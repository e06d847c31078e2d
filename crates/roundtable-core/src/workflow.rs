//! Research workflow orchestration: one bounded conversation per topic,
//! result extraction, and the in-process session store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::RoundtableError;
use crate::config::RoundtableConfig;
use crate::driver::ConversationDriver;
use crate::extract::{ExtractedResults, extract_results};
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::logging;
use crate::report;
use crate::search::WebSearcher;
use crate::transcript::{AgentRole, Transcript, contribution_counts};

/// Outcome of one research run. `Failed` is a distinct shape, not a
/// `Completed` with holes: callers match instead of probing for an error
/// field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResearchRecord {
    Completed(CompletedResearch),
    Failed(FailedResearch),
}

impl ResearchRecord {
    pub fn topic(&self) -> &str {
        match self {
            ResearchRecord::Completed(record) => &record.topic,
            ResearchRecord::Failed(record) => &record.topic,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ResearchRecord::Completed(record) => record.timestamp,
            ResearchRecord::Failed(record) => record.timestamp,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResearchRecord::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedResearch {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub messages: Transcript,
    pub results: ExtractedResults,
    pub agent_contributions: BTreeMap<AgentRole, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedResearch {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

/// Compact view of a stored record for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchSummary {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub total_messages: usize,
    pub agent_contributions: BTreeMap<AgentRole, usize>,
    pub sources_count: usize,
    pub has_synthesis: bool,
    pub has_critique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResearchSummary {
    pub fn from_record(record: &ResearchRecord) -> Self {
        match record {
            ResearchRecord::Completed(record) => Self {
                topic: record.topic.clone(),
                timestamp: record.timestamp,
                duration_seconds: record.duration_seconds,
                total_messages: record.messages.len(),
                agent_contributions: record.agent_contributions.clone(),
                sources_count: record.results.sources.len(),
                has_synthesis: !record.results.synthesis.is_empty(),
                has_critique: !record.results.critique.is_empty(),
                error: None,
            },
            ResearchRecord::Failed(record) => Self {
                topic: record.topic.clone(),
                timestamp: record.timestamp,
                duration_seconds: 0.0,
                total_messages: 0,
                agent_contributions: BTreeMap::new(),
                sources_count: 0,
                has_synthesis: false,
                has_critique: false,
                error: Some(record.error.clone()),
            },
        }
    }
}

/// Drives research sessions and owns the session store.
///
/// Configuration is an explicit constructor value; the LLM credential is
/// resolved before any run can start. One run at a time: `conduct_research`
/// borrows the workflow mutably for its full duration.
pub struct ResearchWorkflow {
    config: RoundtableConfig,
    driver: ConversationDriver,
    history: Vec<ResearchRecord>,
}

impl ResearchWorkflow {
    pub fn new(config: RoundtableConfig) -> Result<Self, RoundtableError> {
        let api_key = config.llm_api_key()?;
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            config.llm.temperature,
            api_key,
        ));
        Ok(Self::with_model(config, model))
    }

    /// Build with a caller-supplied model (tests, alternative providers).
    pub fn with_model(config: RoundtableConfig, model: Arc<dyn ChatModel>) -> Self {
        let searcher = Arc::new(WebSearcher::new(config.search.max_results));
        let driver = ConversationDriver::new(model, searcher, config.conversation.max_rounds);
        Self {
            config,
            driver,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &RoundtableConfig {
        &self.config
    }

    /// Clear driver session state so the next run starts with an empty
    /// transcript. Call before starting a new topic.
    pub fn reset(&mut self) {
        self.driver.reset();
    }

    /// Run the full multi-agent conversation for a topic and store the
    /// outcome. Driver failures are caught here, once, and become a
    /// `Failed` record; they are never retried and never propagate.
    pub async fn conduct_research(&mut self, topic: &str, instructions: &str) -> ResearchRecord {
        let started = Utc::now();
        let clock = Instant::now();
        let prompt = initial_prompt(topic, instructions);

        info!(%topic, "starting research conversation");

        let record = match self.driver.run(&prompt).await {
            Ok(transcript) => {
                let results = extract_results(&transcript);
                let agent_contributions = contribution_counts(&transcript);
                info!(
                    %topic,
                    messages = transcript.len(),
                    sources = results.sources.len(),
                    "research conversation completed"
                );
                ResearchRecord::Completed(CompletedResearch {
                    topic: topic.to_string(),
                    timestamp: started,
                    duration_seconds: clock.elapsed().as_secs_f64(),
                    messages: transcript,
                    results,
                    agent_contributions,
                })
            }
            Err(err) => {
                error!(%topic, error = %err, "research conversation failed");
                ResearchRecord::Failed(FailedResearch {
                    topic: topic.to_string(),
                    timestamp: started,
                    error: err.to_string(),
                })
            }
        };

        if let Err(err) = logging::log_run_completion(&record) {
            warn!(error = %err, "failed to append run log");
        }

        self.history.push(record.clone());
        record
    }

    pub fn history(&self) -> &[ResearchRecord] {
        &self.history
    }

    /// Summary of a stored session. Python-style indexing: negative values
    /// count back from the most recent run.
    pub fn get_research_summary(&self, index: isize) -> Option<ResearchSummary> {
        self.record_at(index).map(ResearchSummary::from_record)
    }

    /// Render a stored session as a Markdown report. Out-of-range indices
    /// and the empty store degrade to a literal placeholder, not an error.
    pub fn export_research_report(&self, index: isize) -> String {
        match self.record_at(index) {
            Some(record) => report::render_report(record),
            None => report::NO_RESEARCH_FOUND.to_string(),
        }
    }

    /// The verbatim stored record as pretty JSON.
    pub fn export_research_data(&self, index: isize) -> Option<String> {
        self.record_at(index)
            .and_then(|record| serde_json::to_string_pretty(record).ok())
    }

    fn record_at(&self, index: isize) -> Option<&ResearchRecord> {
        resolve_index(self.history.len(), index).map(|idx| &self.history[idx])
    }
}

fn resolve_index(len: usize, index: isize) -> Option<usize> {
    if index < 0 {
        let back = index.unsigned_abs();
        if back <= len { Some(len - back) } else { None }
    } else {
        let idx = index as usize;
        (idx < len).then_some(idx)
    }
}

fn initial_prompt(topic: &str, instructions: &str) -> String {
    format!(
        "Please conduct comprehensive research on the following topic:\n\
         \n\
         **Topic**: {topic}\n\
         \n\
         {instructions}\n\
         \n\
         **Research Process**:\n\
         1. The Research Agent should search for relevant information from credible sources\n\
         2. The Synthesis Agent should aggregate and synthesize the findings\n\
         3. The Critique Agent should fact-check and evaluate the quality of the research\n\
         4. Continue the discussion until a comprehensive research deliverable is ready\n\
         \n\
         Please begin the research process."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_index_python_style() {
        assert_eq!(resolve_index(3, -1), Some(2));
        assert_eq!(resolve_index(3, -3), Some(0));
        assert_eq!(resolve_index(3, -4), None);
        assert_eq!(resolve_index(3, 0), Some(0));
        assert_eq!(resolve_index(3, 2), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(0, -1), None);
        assert_eq!(resolve_index(0, 0), None);
    }

    #[test]
    fn prompt_embeds_topic_and_instructions() {
        let prompt = initial_prompt("ocean acidification", "focus on coral reefs");
        assert!(prompt.contains("**Topic**: ocean acidification"));
        assert!(prompt.contains("focus on coral reefs"));
        assert!(prompt.contains("**Research Process**"));
    }

    #[test]
    fn failed_record_summary_carries_the_error() {
        let record = ResearchRecord::Failed(FailedResearch {
            topic: "t".into(),
            timestamp: Utc::now(),
            error: "boom".into(),
        });

        let summary = ResearchSummary::from_record(&record);
        assert_eq!(summary.error.as_deref(), Some("boom"));
        assert_eq!(summary.total_messages, 0);
    }
}
