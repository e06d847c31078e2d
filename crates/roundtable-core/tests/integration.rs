use std::sync::Arc;

use roundtable_core::{
    AgentRole, ChatResponse, Message, NO_RESEARCH_FOUND, ResearchRecord, ResearchWorkflow,
    RoundtableConfig, ScriptedChatModel, contribution_counts, extract_results,
};

fn workflow_with(responses: Vec<ChatResponse>) -> ResearchWorkflow {
    // Keep run logs out of the working tree.
    let log_dir = std::env::temp_dir().join("roundtable-integration-logs");
    unsafe { std::env::set_var("ROUNDTABLE_LOG_DIR", &log_dir) };

    let mut config = RoundtableConfig::default();
    config.conversation.max_rounds = 3;
    ResearchWorkflow::with_model(config, Arc::new(ScriptedChatModel::new(responses)))
}

fn long_reply(prefix: &str) -> String {
    format!("{prefix} {}", "evidence and analysis ".repeat(10))
}

#[tokio::test]
async fn completed_run_extracts_results_and_counts() {
    let mut workflow = workflow_with(vec![
        ChatResponse::text(long_reply(
            "Key driver found at https://example.com/market-report.",
        )),
        ChatResponse::text(long_reply("Synthesized view of the market.")),
        ChatResponse::text(format!("{} TERMINATE", long_reply("Verified the claims."))),
    ]);

    let record = workflow
        .conduct_research("lithium battery market", "focus on 2024 drivers")
        .await;

    let ResearchRecord::Completed(record) = record else {
        panic!("expected a completed record");
    };

    assert_eq!(record.topic, "lithium battery market");
    assert_eq!(record.messages.len(), 4);
    assert!(record.results.sources.contains("https://example.com/market-report."));
    assert!(!record.results.synthesis.is_empty());
    assert!(!record.results.critique.is_empty());

    let total: usize = record.agent_contributions.values().sum();
    assert_eq!(total, record.messages.len());
}

#[tokio::test]
async fn driver_failure_degrades_to_failed_record() {
    // An exhausted scripted model fails the first research turn.
    let mut workflow = workflow_with(Vec::new());

    let record = workflow.conduct_research("doomed topic", "").await;

    let ResearchRecord::Failed(record) = record else {
        panic!("expected a failed record");
    };
    assert_eq!(record.topic, "doomed topic");
    assert!(!record.error.is_empty());

    // The degraded record is stored and summarised like any other.
    let summary = workflow.get_research_summary(-1).expect("summary");
    assert!(summary.error.is_some());
}

#[tokio::test]
async fn report_on_empty_store_is_the_literal_placeholder() {
    let workflow = workflow_with(Vec::new());
    assert_eq!(workflow.export_research_report(-1), NO_RESEARCH_FOUND);
    assert_eq!(workflow.export_research_report(0), NO_RESEARCH_FOUND);
    assert_eq!(workflow.export_research_report(7), NO_RESEARCH_FOUND);
}

#[tokio::test]
async fn negative_indices_count_from_most_recent() {
    let mut workflow = workflow_with(vec![
        ChatResponse::text(format!("{} TERMINATE", long_reply("first run"))),
        ChatResponse::text(long_reply("first synthesis")),
        ChatResponse::text(long_reply("first critique")),
        ChatResponse::text(format!("{} TERMINATE", long_reply("second run"))),
        ChatResponse::text(long_reply("second synthesis")),
        ChatResponse::text(long_reply("second critique")),
    ]);

    workflow.conduct_research("first topic", "").await;
    workflow.reset();
    workflow.conduct_research("second topic", "").await;

    let latest = workflow.get_research_summary(-1).expect("latest");
    assert_eq!(latest.topic, "second topic");

    let earliest = workflow.get_research_summary(0).expect("earliest");
    assert_eq!(earliest.topic, "first topic");

    let report = workflow.export_research_report(-2);
    assert!(report.contains("**Topic**: first topic"));

    let raw = workflow.export_research_data(-1).expect("raw export");
    assert!(raw.contains("\"second topic\""));
}

#[test]
fn short_url_only_research_turn_end_to_end() {
    let synthesis_text = "S".repeat(120);
    let transcript = vec![
        // 46 chars: below the finding threshold, URLs still harvested.
        Message::new(
            AgentRole::Research,
            "At https://example.com/a https://example.com/a",
        ),
        Message::new(AgentRole::Synthesis, synthesis_text.clone()),
    ];

    let results = extract_results(&transcript);
    assert_eq!(results.sources.len(), 1);
    assert!(results.sources.contains("https://example.com/a"));
    assert!(results.findings.is_empty());
    assert_eq!(results.synthesis, synthesis_text);

    let counts = contribution_counts(&transcript);
    assert_eq!(counts.get(&AgentRole::Research), Some(&1));
    assert_eq!(counts.get(&AgentRole::Synthesis), Some(&1));
}
