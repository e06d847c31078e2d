//! Markdown rendering of stored research records.

use std::fmt::Write as _;

use crate::workflow::{CompletedResearch, FailedResearch, ResearchRecord};

/// Returned for an empty store or an out-of-range index.
pub const NO_RESEARCH_FOUND: &str = "No research found.";

const NO_SYNTHESIS: &str = "No synthesis available.";

/// Fixed section order: metadata, executive summary, findings, sources,
/// critical analysis, methodology.
pub fn render_report(record: &ResearchRecord) -> String {
    match record {
        ResearchRecord::Completed(record) => render_completed(record),
        ResearchRecord::Failed(record) => render_failed(record),
    }
}

fn render_completed(record: &CompletedResearch) -> String {
    let mut report = format!(
        "# Research Report\n\
         \n\
         **Topic**: {}\n\
         **Date**: {}\n\
         **Duration**: {:.1} seconds\n\
         \n\
         ## Executive Summary\n\
         \n\
         {}\n\
         \n\
         ## Detailed Findings\n\
         \n",
        record.topic,
        record.timestamp.to_rfc3339(),
        record.duration_seconds,
        if record.results.synthesis.is_empty() {
            NO_SYNTHESIS
        } else {
            &record.results.synthesis
        },
    );

    for (idx, finding) in record.results.findings.iter().enumerate() {
        let _ = write!(report, "### Finding {}\n\n{}\n\n", idx + 1, finding.content);
    }

    if !record.results.sources.is_empty() {
        report.push_str("## Sources\n\n");
        for source in &record.results.sources {
            let _ = writeln!(report, "- {source}");
        }
    }

    if !record.results.critique.is_empty() {
        let _ = write!(
            report,
            "\n## Critical Analysis\n\n{}\n",
            record.results.critique
        );
    }

    let _ = write!(
        report,
        "\n## Methodology\n\nThis research was conducted using a multi-agent system with {} participating agents.\n",
        record.agent_contributions.len()
    );

    report
}

fn render_failed(record: &FailedResearch) -> String {
    format!(
        "# Research Report\n\
         \n\
         **Topic**: {}\n\
         **Date**: {}\n\
         \n\
         Research failed: {}\n",
        record.topic,
        record.timestamp.to_rfc3339(),
        record.error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractedResults, Finding};
    use crate::transcript::AgentRole;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn completed(results: ExtractedResults, agents: usize) -> CompletedResearch {
        let mut contributions = BTreeMap::new();
        for role in [AgentRole::UserProxy, AgentRole::Research, AgentRole::Synthesis]
            .into_iter()
            .take(agents)
        {
            contributions.insert(role, 1);
        }

        CompletedResearch {
            topic: "quantum batteries".into(),
            timestamp: Utc::now(),
            duration_seconds: 12.34,
            messages: Vec::new(),
            results,
            agent_contributions: contributions,
        }
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let mut sources = BTreeSet::new();
        sources.insert("https://example.com/a".to_string());

        let results = ExtractedResults {
            findings: vec![Finding {
                content: "a substantive finding".into(),
                agent: AgentRole::Research,
            }],
            sources,
            synthesis: "the synthesis".into(),
            critique: "the critique".into(),
        };

        let report = render_report(&ResearchRecord::Completed(completed(results, 3)));

        let summary_at = report.find("## Executive Summary").unwrap();
        let findings_at = report.find("## Detailed Findings").unwrap();
        let sources_at = report.find("## Sources").unwrap();
        let critique_at = report.find("## Critical Analysis").unwrap();
        let methodology_at = report.find("## Methodology").unwrap();

        assert!(summary_at < findings_at);
        assert!(findings_at < sources_at);
        assert!(sources_at < critique_at);
        assert!(critique_at < methodology_at);
        assert!(report.contains("**Duration**: 12.3 seconds"));
        assert!(report.contains("### Finding 1"));
        assert!(report.contains("- https://example.com/a"));
        assert!(report.contains("with 3 participating agents"));
    }

    #[test]
    fn empty_sections_are_omitted_and_summary_placeholder_used() {
        let report = render_report(&ResearchRecord::Completed(completed(
            ExtractedResults::default(),
            1,
        )));

        assert!(report.contains(NO_SYNTHESIS));
        assert!(!report.contains("## Sources"));
        assert!(!report.contains("## Critical Analysis"));
        assert!(report.contains("## Methodology"));
    }

    #[test]
    fn failed_record_renders_error_report() {
        let record = ResearchRecord::Failed(FailedResearch {
            topic: "doomed".into(),
            timestamp: Utc::now(),
            error: "driver exploded".into(),
        });

        let report = render_report(&record);
        assert!(report.contains("**Topic**: doomed"));
        assert!(report.contains("Research failed: driver exploded"));
    }
}
