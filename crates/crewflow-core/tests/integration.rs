use std::io::Write as _;
use std::sync::Arc;

use crewflow_core::{
    AgentsConfig, DEEP_SEARCH, DynSearchTool, SessionOptions, StaticSearchTool, ToolRegistry,
    WEB_SEARCH, run_research_session_with_options,
};
use tempfile::NamedTempFile;

const CREW_YAML: &str = r#"
agents:
  - name: coordinator
    role: Research Coordinator
    goal: Break research questions into actionable plans
    backstory: A veteran research director who has scoped hundreds of studies.
  - name: search_agent
    role: Search Specialist
    goal: Find authoritative sources for any topic
    backstory: A reference librarian who knows where reliable information lives.
    tools:
      - name: Web Search
      - name: Deep Search
  - name: content_extractor
    role: Content Analyst
    goal: Pull the key findings out of primary sources
    backstory: A close reader with an eye for methodology.
    tools:
      - name: Web Search
  - name: analyst
    role: Research Analyst
    goal: Synthesize evidence into clear answers
    backstory: Writes the reports decision makers actually read.
    tools:
      - name: Web Search
"#;

fn offline_registry(deep_response: &str, web_response: &str) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.insert(
        DEEP_SEARCH.to_string(),
        Arc::new(StaticSearchTool::new(DEEP_SEARCH, deep_response)) as DynSearchTool,
    );
    registry.insert(
        WEB_SEARCH.to_string(),
        Arc::new(StaticSearchTool::new(WEB_SEARCH, web_response)) as DynSearchTool,
    );
    registry
}

#[tokio::test]
async fn full_pipeline_produces_report_offline() {
    let mut config_file = NamedTempFile::new().expect("temp file");
    config_file
        .write_all(CREW_YAML.as_bytes())
        .expect("write config");

    let question = "What are the latest developments in quantum computing?";
    let deep_response = "Source: https://www.nature.com/articles/q1\n\
                         Title: Qubit counts keep climbing\n\
                         Snippet: Hardware teams reported larger stable qubit arrays this year.\n\
                         \n\
                         Source: https://energy.gov/quantum/report\n\
                         Title: National quantum program update\n\
                         Snippet: Funding shifted toward error correction research.";
    let web_response = "Independent coverage confirms the reported qubit array results.";

    let options = SessionOptions::new(question)
        .with_session_id("itest-session")
        .with_config_path(config_file.path())
        .with_registry(offline_registry(deep_response, web_response));

    let outcome = run_research_session_with_options(options)
        .await
        .expect("pipeline should succeed");

    assert_eq!(outcome.session_id, "itest-session");
    assert!(
        outcome.report.contains(question),
        "report should restate the question: {}",
        outcome.report
    );
    assert!(
        outcome.report.contains("Sources:"),
        "report should list sources: {}",
        outcome.report
    );
    assert!(outcome.report.contains("https://www.nature.com/articles/q1"));
    assert_eq!(outcome.sources.len(), 2);

    let ids: Vec<&str> = outcome
        .trace_events
        .iter()
        .map(|event| event.task_id.as_str())
        .collect();
    assert_eq!(ids, ["plan", "find_sources", "extract", "analyze"]);

    let markdown = outcome.trace_summary().render_markdown();
    assert!(markdown.contains("1. plan:"));
}

#[tokio::test]
async fn report_degrades_when_search_returns_nothing_structured() {
    let config: AgentsConfig = serde_yaml::from_str(CREW_YAML).expect("crew config parses");

    let options = SessionOptions::new("Is graphene commercially viable?")
        .with_config(config)
        .with_registry(offline_registry(
            "nothing useful surfaced",
            "nothing useful surfaced",
        ));

    let outcome = run_research_session_with_options(options)
        .await
        .expect("pipeline should succeed");

    assert!(outcome.report.contains("No verifiable findings"));
    assert!(outcome.report.contains("(none recorded)"));
    assert!(outcome.sources.is_empty());
    assert_eq!(outcome.trace_events.len(), 4);
}
