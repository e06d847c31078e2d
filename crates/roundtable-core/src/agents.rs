//! Static role descriptors for the research team.

use serde_json::json;

use crate::llm::ToolSpec;
use crate::transcript::AgentRole;

pub const SEARCH_WEB_TOOL: &str = "search_web";
pub const EXTRACT_CONTENT_TOOL: &str = "extract_content";

/// A preconfigured chat agent: a role, its standing instructions, and the
/// tools it may call. Only the research agent carries tools.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: AgentRole,
    pub instructions: &'static str,
    pub tools: Vec<ToolSpec>,
}

pub fn research_agent() -> AgentSpec {
    AgentSpec {
        role: AgentRole::Research,
        instructions: "You are a Research Agent specialized in gathering information from the web.\n\
            \n\
            Your responsibilities:\n\
            1. Search for relevant information based on the research topic\n\
            2. Extract key findings from web sources\n\
            3. Provide accurate citations and sources\n\
            4. Focus on credible and recent information\n\
            5. Present findings in a structured format\n\
            \n\
            When you need to search the web, use the search_web function.\n\
            When you need to extract content from a specific URL, use the extract_content function.\n\
            Always provide the source URL for any information you present.",
        tools: research_tools(),
    }
}

pub fn synthesis_agent() -> AgentSpec {
    AgentSpec {
        role: AgentRole::Synthesis,
        instructions: "You are a Synthesis Agent specialized in aggregating and synthesizing research findings.\n\
            \n\
            Your responsibilities:\n\
            1. Combine information from multiple sources into coherent insights\n\
            2. Identify patterns and connections between different findings\n\
            3. Create structured summaries and reports\n\
            4. Highlight key takeaways and conclusions\n\
            5. Organize information in a logical and accessible manner\n\
            \n\
            Focus on creating comprehensive yet concise syntheses that capture the essence of the research.\n\
            Always maintain objectivity and acknowledge different perspectives when present.",
        tools: Vec::new(),
    }
}

pub fn critique_agent() -> AgentSpec {
    AgentSpec {
        role: AgentRole::Critique,
        instructions: "You are a Critique Agent specialized in fact-checking and quality evaluation.\n\
            \n\
            Your responsibilities:\n\
            1. Verify the accuracy of presented information\n\
            2. Check the credibility of sources\n\
            3. Identify potential biases or limitations\n\
            4. Suggest areas that need further research\n\
            5. Ensure logical consistency in arguments\n\
            6. Point out any gaps or weaknesses in the research\n\
            \n\
            Be constructive in your critique, suggesting improvements rather than just pointing out flaws.\n\
            Always explain your reasoning when questioning information or sources.\n\
            When the research deliverable is comprehensive and no further work remains, end your message with TERMINATE.",
        tools: Vec::new(),
    }
}

fn research_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: SEARCH_WEB_TOOL.to_string(),
            description: "Search the web for information. Returns a JSON list of results with title, link, and snippet.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: EXTRACT_CONTENT_TOOL.to_string(),
            description: "Extract readable content from a specific URL. Returns JSON with title, text, and summary.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL to extract content from"
                    }
                },
                "required": ["url"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_research_agent_carries_tools() {
        assert_eq!(research_agent().tools.len(), 2);
        assert!(synthesis_agent().tools.is_empty());
        assert!(critique_agent().tools.is_empty());
    }

    #[test]
    fn tool_names_match_dispatch_table() {
        let names: Vec<_> = research_agent()
            .tools
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec![SEARCH_WEB_TOOL, EXTRACT_CONTENT_TOOL]);
    }
}
