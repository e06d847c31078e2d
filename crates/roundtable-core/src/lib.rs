//! Roundtable core abstractions built directly on top of `graph_flow`.
//!
//! This crate wires four preconfigured chat agents (user-proxy, research,
//! synthesis, critique) into a bounded group conversation, scrapes the
//! finished transcript into structured results, and keeps an in-process
//! store of completed runs for reporting and export.

mod agents;
mod config;
mod driver;
mod error;
mod extract;
mod llm;
mod logging;
mod report;
mod search;
mod security;
mod transcript;
mod workflow;

pub use agents::{AgentSpec, critique_agent, research_agent, synthesis_agent};
pub use config::{
    ConfigLoader, ConversationConfig, LlmConfig, LoggingConfig, RoundtableConfig, SearchConfig,
};
pub use driver::ConversationDriver;
pub use error::RoundtableError;
pub use extract::{ExtractedResults, Finding, extract_results};
pub use llm::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatRole, FunctionCall, OpenAiChatModel,
    ScriptedChatModel, ToolCall, ToolSpec,
};
pub use logging::log_run_completion;
pub use report::{NO_RESEARCH_FOUND, render_report};
pub use search::{ExtractedArticle, SearchResult, WebSearcher};
pub use security::{SecretValue, require_env};
pub use transcript::{AgentRole, Message, Transcript, contribution_counts};
pub use workflow::{
    CompletedResearch, FailedResearch, ResearchRecord, ResearchSummary, ResearchWorkflow,
};
