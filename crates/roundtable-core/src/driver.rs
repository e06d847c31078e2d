//! Conversation driver built directly on top of `graph_flow`.
//!
//! The group chat runs as a task graph with a fixed topology
//! (user_proxy, research, synthesis, critique), with a conditional edge
//! looping back to research until the round budget is spent or an agent
//! closes the discussion. The framework owns turn-taking and session state;
//! each task appends exactly one message to the shared transcript.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use graph_flow::{
    Context, ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, NextAction,
    Session, SessionStorage, Task, TaskResult,
};
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::agents::{
    AgentSpec, EXTRACT_CONTENT_TOOL, SEARCH_WEB_TOOL, critique_agent, research_agent,
    synthesis_agent,
};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, FunctionCall};
use crate::search::WebSearcher;
use crate::transcript::{AgentRole, Message, Transcript};

const PROMPT_KEY: &str = "conversation.prompt";
const TRANSCRIPT_KEY: &str = "conversation.transcript";
const ROUND_KEY: &str = "conversation.round";
const MAX_ROUNDS_KEY: &str = "conversation.max_rounds";
const DONE_KEY: &str = "conversation.done";
const ERROR_KEY: &str = "conversation.error";

/// Agents may end the discussion early by closing a message with this marker.
const TERMINATE_MARKER: &str = "TERMINATE";

/// Upper bound on tool round-trips within a single research turn.
const MAX_TOOL_ITERATIONS: usize = 10;

struct ConversationTasks {
    user_proxy: Arc<UserProxyTask>,
    research: Arc<ResearchTurn>,
    synthesis: Arc<SynthesisTurn>,
    critique: Arc<CritiqueTurn>,
    wrap_up: Arc<WrapUpTask>,
}

impl ConversationTasks {
    fn new(model: Arc<dyn ChatModel>, searcher: Arc<WebSearcher>) -> Self {
        Self {
            user_proxy: Arc::new(UserProxyTask),
            research: Arc::new(ResearchTurn {
                model: model.clone(),
                searcher,
                spec: research_agent(),
            }),
            synthesis: Arc::new(SynthesisTurn {
                model: model.clone(),
                spec: synthesis_agent(),
            }),
            critique: Arc::new(CritiqueTurn {
                model,
                spec: critique_agent(),
            }),
            wrap_up: Arc::new(WrapUpTask),
        }
    }
}

fn build_graph(model: Arc<dyn ChatModel>, searcher: Arc<WebSearcher>) -> Arc<graph_flow::Graph> {
    let tasks = ConversationTasks::new(model, searcher);

    let builder = GraphBuilder::new("roundtable_conversation")
        .add_task(tasks.user_proxy.clone())
        .add_task(tasks.research.clone())
        .add_task(tasks.synthesis.clone())
        .add_task(tasks.critique.clone())
        .add_task(tasks.wrap_up.clone())
        .add_edge(tasks.user_proxy.id(), tasks.research.id())
        .add_edge(tasks.research.id(), tasks.synthesis.id())
        .add_edge(tasks.synthesis.id(), tasks.critique.id())
        .add_conditional_edge(
            tasks.critique.id(),
            |ctx| ctx.get_sync::<bool>(DONE_KEY).unwrap_or(false),
            tasks.wrap_up.id(),
            tasks.research.id(),
        )
        .set_start_task(tasks.user_proxy.id());

    Arc::new(builder.build())
}

/// Owns one conversation session lifecycle: build once, run per topic,
/// reset before the next topic so no prior messages carry over.
pub struct ConversationDriver {
    graph: Arc<graph_flow::Graph>,
    storage: Arc<InMemorySessionStorage>,
    max_rounds: u32,
}

impl ConversationDriver {
    pub fn new(model: Arc<dyn ChatModel>, searcher: Arc<WebSearcher>, max_rounds: u32) -> Self {
        Self {
            graph: build_graph(model, searcher),
            storage: Arc::new(InMemorySessionStorage::new()),
            max_rounds,
        }
    }

    /// Drop all prior session state. The next run starts from an empty
    /// transcript.
    pub fn reset(&mut self) {
        self.storage = Arc::new(InMemorySessionStorage::new());
        info!("conversation driver has been reset");
    }

    /// Run the bounded group conversation to completion and return the
    /// finished transcript.
    pub async fn run(&self, prompt: &str) -> Result<Transcript> {
        let session_id = format!("conversation-{}", Uuid::new_v4());
        let session = Session::new_from_task(session_id.clone(), "user_proxy");

        session.context.set(PROMPT_KEY, prompt.to_string()).await;
        session
            .context
            .set(TRANSCRIPT_KEY, Transcript::new())
            .await;
        session.context.set(ROUND_KEY, 0u32).await;
        session.context.set(MAX_ROUNDS_KEY, self.max_rounds).await;

        self.storage
            .save(session)
            .await
            .map_err(|err| anyhow!("failed to persist conversation session: {err}"))?;

        let runner = FlowRunner::new(self.graph.clone(), self.storage.clone());

        loop {
            let result = runner
                .run(&session_id)
                .await
                .map_err(|err| anyhow!("conversation execution failure: {err}"))?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::WaitingForInput => continue,
                ExecutionStatus::Error(message) => return Err(anyhow!(message)),
            }
        }

        let session = self
            .storage
            .get(&session_id)
            .await
            .map_err(|err| anyhow!("failed to reload conversation session: {err}"))?
            .ok_or_else(|| anyhow!("conversation session missing after execution"))?;

        if let Some(error) = session.context.get::<String>(ERROR_KEY).await {
            return Err(anyhow!(error));
        }

        let transcript: Transcript = session.context.get(TRANSCRIPT_KEY).await.unwrap_or_default();
        Ok(transcript)
    }
}

/// The user proxy never auto-replies; its only contribution is the opening
/// prompt.
struct UserProxyTask;

#[async_trait]
impl Task for UserProxyTask {
    fn id(&self) -> &str {
        "user_proxy"
    }

    #[instrument(name = "turn.user_proxy", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let prompt: String = context.get(PROMPT_KEY).await.unwrap_or_default();

        let mut transcript: Transcript = context.get(TRANSCRIPT_KEY).await.unwrap_or_default();
        transcript.push(Message::new(AgentRole::UserProxy, prompt));
        context.set(TRANSCRIPT_KEY, &transcript).await;

        Ok(TaskResult::new(
            Some("research request posted".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}

struct ResearchTurn {
    model: Arc<dyn ChatModel>,
    searcher: Arc<WebSearcher>,
    spec: AgentSpec,
}

#[async_trait]
impl Task for ResearchTurn {
    fn id(&self) -> &str {
        "research_agent"
    }

    #[instrument(name = "turn.research", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let round: u32 = context.get(ROUND_KEY).await.unwrap_or(0) + 1;
        context.set(ROUND_KEY, round).await;

        let mut transcript: Transcript = context.get(TRANSCRIPT_KEY).await.unwrap_or_default();

        let reply = match self.reply_with_tools(&transcript).await {
            Ok(reply) => reply,
            Err(err) => return abort_conversation(&context, self.spec.role, err).await,
        };

        info!(round, chars = reply.len(), "research agent replied");
        transcript.push(Message::new(self.spec.role, reply));
        context.set(TRANSCRIPT_KEY, &transcript).await;

        Ok(TaskResult::new(
            Some(format!("research turn {round} complete")),
            NextAction::ContinueAndExecute,
        ))
    }
}

impl ResearchTurn {
    /// One model turn, resolving tool calls until the model produces text.
    async fn reply_with_tools(&self, transcript: &Transcript) -> Result<String> {
        let mut messages = chat_messages_for(&self.spec, transcript);

        for _ in 0..MAX_TOOL_ITERATIONS {
            let request =
                ChatRequest::new(messages.clone()).with_tools(self.spec.tools.clone());
            let response = self.model.complete(request).await?;

            if response.tool_calls.is_empty() {
                return Ok(response.content.unwrap_or_default());
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let payload = dispatch_tool(&self.searcher, &call.function).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), payload));
            }
        }

        Err(anyhow!(
            "research agent exceeded {MAX_TOOL_ITERATIONS} tool iterations"
        ))
    }
}

struct SynthesisTurn {
    model: Arc<dyn ChatModel>,
    spec: AgentSpec,
}

#[async_trait]
impl Task for SynthesisTurn {
    fn id(&self) -> &str {
        "synthesis_agent"
    }

    #[instrument(name = "turn.synthesis", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        take_plain_turn(&context, self.model.as_ref(), &self.spec).await
    }
}

struct CritiqueTurn {
    model: Arc<dyn ChatModel>,
    spec: AgentSpec,
}

#[async_trait]
impl Task for CritiqueTurn {
    fn id(&self) -> &str {
        "critique_agent"
    }

    #[instrument(name = "turn.critique", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let result = take_plain_turn(&context, self.model.as_ref(), &self.spec).await?;

        let transcript: Transcript = context.get(TRANSCRIPT_KEY).await.unwrap_or_default();
        let round: u32 = context.get(ROUND_KEY).await.unwrap_or(0);
        let max_rounds: u32 = context.get(MAX_ROUNDS_KEY).await.unwrap_or(1);

        // One cycle is research/synthesis/critique; any of the three may
        // close the discussion with the marker.
        let terminated = transcript
            .iter()
            .rev()
            .take(3)
            .any(|message| message.content.trim_end().ends_with(TERMINATE_MARKER));
        let done = terminated || round >= max_rounds;

        context.set_sync(DONE_KEY, done);
        debug!(round, max_rounds, terminated, done, "critique turn evaluated");

        Ok(result)
    }
}

/// Terminal task; the conversation ends here.
struct WrapUpTask;

#[async_trait]
impl Task for WrapUpTask {
    fn id(&self) -> &str {
        "wrap_up"
    }

    #[instrument(name = "turn.wrap_up", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let transcript: Transcript = context.get(TRANSCRIPT_KEY).await.unwrap_or_default();
        info!(messages = transcript.len(), "conversation complete");

        Ok(TaskResult::new(
            Some("conversation complete".to_string()),
            NextAction::End,
        ))
    }
}

async fn take_plain_turn(
    context: &Context,
    model: &dyn ChatModel,
    spec: &AgentSpec,
) -> graph_flow::Result<TaskResult> {
    let mut transcript: Transcript = context.get(TRANSCRIPT_KEY).await.unwrap_or_default();

    let request = ChatRequest::new(chat_messages_for(spec, &transcript));
    let reply = match model.complete(request).await {
        Ok(response) => response.content.unwrap_or_default(),
        Err(err) => return abort_conversation(context, spec.role, err).await,
    };

    info!(role = %spec.role, chars = reply.len(), "agent replied");
    transcript.push(Message::new(spec.role, reply));
    context.set(TRANSCRIPT_KEY, &transcript).await;

    Ok(TaskResult::new(
        Some(format!("{} turn complete", spec.role)),
        NextAction::ContinueAndExecute,
    ))
}

/// Record the failure and end the graph run; the driver surfaces it as a
/// single error after execution.
async fn abort_conversation(
    context: &Context,
    role: AgentRole,
    err: anyhow::Error,
) -> graph_flow::Result<TaskResult> {
    let message = format!("{role} turn failed: {err}");
    tracing::error!(%role, error = %err, "conversation aborted");
    context.set(ERROR_KEY, message.clone()).await;

    Ok(TaskResult::new(Some(message), NextAction::End))
}

/// Render the shared transcript from one agent's point of view: its own
/// turns as assistant messages, everyone else prefixed by speaker.
fn chat_messages_for(spec: &AgentSpec, transcript: &Transcript) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(spec.instructions)];
    for entry in transcript {
        if entry.speaker == spec.role {
            messages.push(ChatMessage::assistant(entry.content.clone()));
        } else {
            messages.push(ChatMessage::user(format!(
                "{}: {}",
                entry.speaker, entry.content
            )));
        }
    }
    messages
}

async fn dispatch_tool(searcher: &WebSearcher, call: &FunctionCall) -> String {
    let args: serde_json::Value = serde_json::from_str(&call.arguments).unwrap_or_default();

    match call.name.as_str() {
        SEARCH_WEB_TOOL => {
            let query = args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
            let results = searcher.search(query).await;
            serde_json::to_string(&results).unwrap_or_else(|_| "[]".to_string())
        }
        EXTRACT_CONTENT_TOOL => {
            let url = args.get("url").and_then(|v| v.as_str()).unwrap_or_default();
            let article = searcher.extract(url).await;
            serde_json::to_string(&article).unwrap_or_else(|_| "{}".to_string())
        }
        other => {
            tracing::warn!(tool = other, "research agent requested an unknown tool");
            json!({ "error": format!("unknown tool: {other}") }).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, ScriptedChatModel};

    fn driver_with(responses: Vec<ChatResponse>, max_rounds: u32) -> ConversationDriver {
        let model = Arc::new(ScriptedChatModel::new(responses));
        let searcher = Arc::new(WebSearcher::new(3));
        ConversationDriver::new(model, searcher, max_rounds)
    }

    fn long_reply(prefix: &str) -> String {
        format!("{prefix} {}", "detail ".repeat(30))
    }

    #[tokio::test]
    async fn single_round_conversation_produces_four_messages() {
        let driver = driver_with(
            vec![
                ChatResponse::text(long_reply("Research notes https://example.com/a.")),
                ChatResponse::text(long_reply("Synthesis of the findings.")),
                ChatResponse::text(format!("{} TERMINATE", long_reply("Critique."))),
            ],
            5,
        );

        let transcript = driver.run("investigate the topic").await.unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].speaker, AgentRole::UserProxy);
        assert_eq!(transcript[1].speaker, AgentRole::Research);
        assert_eq!(transcript[2].speaker, AgentRole::Synthesis);
        assert_eq!(transcript[3].speaker, AgentRole::Critique);
    }

    #[tokio::test]
    async fn round_budget_bounds_the_conversation() {
        // Two rounds scripted, budget of two: six agent turns plus the prompt.
        let responses = (0..6)
            .map(|i| ChatResponse::text(long_reply(&format!("turn {i}"))))
            .collect();
        let driver = driver_with(responses, 2);

        let transcript = driver.run("bounded run").await.unwrap();
        assert_eq!(transcript.len(), 7);
    }

    #[tokio::test]
    async fn model_failure_surfaces_as_driver_error() {
        // Scripted model exhausted immediately: the research turn fails.
        let driver = driver_with(Vec::new(), 3);
        let err = driver.run("failing run").await.unwrap_err();
        assert!(err.to_string().contains("research_agent turn failed"));
    }

    #[tokio::test]
    async fn unknown_tool_requests_degrade_to_error_payloads() {
        let searcher = WebSearcher::new(3);
        let call = FunctionCall {
            name: "launch_rockets".to_string(),
            arguments: "{}".to_string(),
        };

        let payload = dispatch_tool(&searcher, &call).await;
        assert!(payload.contains("unknown tool"));
    }
}
