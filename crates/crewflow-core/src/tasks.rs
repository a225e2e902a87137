use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use tracing::{debug, info, instrument, warn};

use crate::agents::Agent;
use crate::error::CrewflowError;
use crate::search::{SearchHit, parse_deep_results};
use crate::tools::{DEEP_SEARCH, WEB_SEARCH};
use crate::trace::record_trace;

pub(crate) const QUERY_KEY: &str = "query";
pub(crate) const SOURCE_RECORDS_KEY: &str = "sources.records";
pub(crate) const FINAL_REPORT_KEY: &str = "final.report";

/// Extraction goes deep on at most this many sources.
const MAX_EXTRACT_SOURCES: usize = 3;

/// Instructions and output contract bound to a task at creation time.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
}

/// The four research tasks in pipeline order.
pub struct CrewTasks {
    pub plan: Arc<PlanTask>,
    pub sources: Arc<SourceTask>,
    pub extract: Arc<ExtractTask>,
    pub analyze: Arc<AnalyzeTask>,
}

impl std::fmt::Debug for CrewTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrewTasks").finish_non_exhaustive()
    }
}

/// Bind the research question into the fixed four-step pipeline. Fails when
/// the agent map is missing one of the required crew members.
pub fn create_tasks(
    agent_map: &HashMap<String, Arc<Agent>>,
    research_question: &str,
) -> Result<CrewTasks, CrewflowError> {
    let coordinator = require_agent(agent_map, "coordinator")?;
    let search_agent = require_agent(agent_map, "search_agent")?;
    let content_extractor = require_agent(agent_map, "content_extractor")?;
    let analyst = require_agent(agent_map, "analyst")?;

    let plan = Arc::new(PlanTask {
        agent: coordinator,
        spec: TaskSpec {
            description: format!(
                "Research Question: {research_question}\n\nAnalyze this research question and \
                 create a detailed plan. Break it down into specific areas to investigate and \
                 create a structured approach. Consider what types of sources would be most \
                 valuable."
            ),
            expected_output: "A structured research plan including: 1) Key areas to \
                              investigate, 2) Types of sources to prioritize, 3) Specific \
                              questions to answer"
                .to_string(),
        },
        question: research_question.to_string(),
    });

    let sources = Arc::new(SourceTask {
        agent: search_agent,
        spec: TaskSpec {
            description: format!(
                "Find relevant and reliable sources about: {research_question}\nUse your web \
                 search tools to find authoritative sources that directly address the research \
                 areas."
            ),
            expected_output: "A curated list of sources with: 1) Full citations, 2) Brief \
                              description of relevance, 3) Initial assessment of reliability"
                .to_string(),
        },
        question: research_question.to_string(),
    });

    let extract = Arc::new(ExtractTask {
        agent: content_extractor,
        spec: TaskSpec {
            description: "Use your web search tools to verify and extract key information \
                          from the identified sources. Focus on findings, methodologies, and \
                          conclusions."
                .to_string(),
            expected_output: "Organized notes containing: 1) Key findings, 2) Relevant quotes \
                              or statistics, 3) Summary of main arguments"
                .to_string(),
        },
    });

    let analyze = Arc::new(AnalyzeTask {
        agent: analyst,
        spec: TaskSpec {
            description: format!(
                "Using your web search tools to fact-check and validate, analyze the extracted \
                 information to answer: {research_question}\nIdentify patterns, evaluate \
                 evidence, and synthesize findings."
            ),
            expected_output: "Analysis report highlighting: 1) Key findings and their \
                              significance, 2) Evidence quality, 3) Patterns and trends"
                .to_string(),
        },
        question: research_question.to_string(),
    });

    Ok(CrewTasks {
        plan,
        sources,
        extract,
        analyze,
    })
}

fn require_agent(
    agent_map: &HashMap<String, Arc<Agent>>,
    name: &str,
) -> Result<Arc<Agent>, CrewflowError> {
    agent_map
        .get(name)
        .cloned()
        .ok_or_else(|| CrewflowError::UnknownAgent(name.to_string()))
}

pub struct PlanTask {
    agent: Arc<Agent>,
    spec: TaskSpec,
    question: String,
}

impl PlanTask {
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }
}

#[async_trait]
impl Task for PlanTask {
    fn id(&self) -> &str {
        "plan"
    }

    #[instrument(name = "task.plan", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let areas = focus_areas(&self.question);

        info!(
            agent = %self.agent.name,
            areas = areas.len(),
            "coordinator drafting research plan"
        );

        let mut outline = format!(
            "Research plan for: {}\n\nKey areas to investigate:\n",
            self.question
        );
        for (idx, area) in areas.iter().enumerate() {
            let _ = writeln!(outline, "{}. {}", idx + 1, area);
        }
        outline.push_str(
            "\nSources to prioritize: peer-reviewed publications, primary announcements, and \
             established technology press.\n",
        );
        outline.push_str(
            "\nQuestions to answer:\n- What changed most recently in each area?\n- Which \
             claims are corroborated by more than one source?\n",
        );

        context.set("plan.outline", outline).await;
        context.set("plan.areas", &areas).await;
        record_trace(
            &context,
            self.id(),
            format!("plan prepared with {} focus areas", areas.len()),
        )
        .await;

        debug!(areas = ?areas, "plan task populated context");

        Ok(TaskResult::new(
            Some(format!("Research plan prepared for \"{}\"", self.question)),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct SourceTask {
    agent: Arc<Agent>,
    spec: TaskSpec,
    question: String,
}

impl SourceTask {
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }
}

#[async_trait]
impl Task for SourceTask {
    fn id(&self) -> &str {
        "find_sources"
    }

    #[instrument(name = "task.find_sources", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        // Prefer the deep adapter; any configured tool beats none.
        let selected = self
            .agent
            .tool(DEEP_SEARCH)
            .or_else(|| self.agent.tools().first());

        let observation = match selected {
            Some(tool) => match tool.call(&self.question).await {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        agent = %self.agent.name,
                        tool = tool.name(),
                        %error,
                        "search tool failed; recording the error as an observation"
                    );
                    format!("Tool error: {error}")
                }
            },
            None => {
                warn!(agent = %self.agent.name, "agent has no search tool configured");
                String::from("No search tool available to this agent.")
            }
        };

        let records = parse_deep_results(&observation);
        let report = source_report(&records, &observation);

        info!(
            agent = %self.agent.name,
            sources = records.len(),
            "search agent curated sources"
        );

        context.set(SOURCE_RECORDS_KEY, &records).await;
        context.set("sources.report", report).await;
        record_trace(
            &context,
            self.id(),
            format!("located {} candidate sources", records.len()),
        )
        .await;

        Ok(TaskResult::new(
            Some(format!(
                "Collected {} sources for \"{}\"",
                records.len(),
                self.question
            )),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct ExtractTask {
    agent: Arc<Agent>,
    spec: TaskSpec,
}

impl ExtractTask {
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }
}

#[async_trait]
impl Task for ExtractTask {
    fn id(&self) -> &str {
        "extract"
    }

    #[instrument(name = "task.extract", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let records: Vec<SearchHit> = context.get(SOURCE_RECORDS_KEY).await.unwrap_or_default();
        let examined = records.len().min(MAX_EXTRACT_SOURCES);

        let mut notes = String::from("Extraction notes:\n");
        let mut corroborated = 0usize;

        for hit in records.iter().take(MAX_EXTRACT_SOURCES) {
            let _ = writeln!(notes, "\n## {}", hit.title);
            let _ = writeln!(notes, "Source: {}", hit.url);
            let _ = writeln!(notes, "Key finding: {}", truncate(&hit.snippet, 240));

            let verifier = self
                .agent
                .tool(WEB_SEARCH)
                .or_else(|| self.agent.tools().first());

            match verifier {
                Some(tool) => match tool.call(&hit.title).await {
                    Ok(text) if !text.is_empty() => {
                        corroborated += 1;
                        let _ = writeln!(notes, "Corroboration: {}", truncate(&text, 240));
                    }
                    Ok(_) => {
                        let _ = writeln!(notes, "Corroboration: no additional coverage found.");
                    }
                    Err(error) => {
                        warn!(
                            agent = %self.agent.name,
                            tool = tool.name(),
                            %error,
                            "verification search failed; recording the error as an observation"
                        );
                        let _ = writeln!(notes, "Corroboration: tool error: {error}");
                    }
                },
                None => {
                    let _ = writeln!(notes, "Corroboration: skipped, agent has no search tool.");
                }
            }
        }

        if records.is_empty() {
            notes.push_str("\nNo sources were handed over; nothing to extract.\n");
        }

        info!(
            agent = %self.agent.name,
            examined,
            corroborated,
            "content extractor compiled notes"
        );

        context.set("extract.notes", notes).await;
        record_trace(
            &context,
            self.id(),
            format!("extracted notes from {examined} sources"),
        )
        .await;

        Ok(TaskResult::new(
            Some(format!("Extraction notes compiled for {examined} sources")),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct AnalyzeTask {
    agent: Arc<Agent>,
    spec: TaskSpec,
    question: String,
}

impl AnalyzeTask {
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }
}

#[async_trait]
impl Task for AnalyzeTask {
    fn id(&self) -> &str {
        "analyze"
    }

    #[instrument(name = "task.analyze", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let records: Vec<SearchHit> = context.get(SOURCE_RECORDS_KEY).await.unwrap_or_default();
        let notes: String = context.get("extract.notes").await.unwrap_or_default();
        let areas: Vec<String> = context.get("plan.areas").await.unwrap_or_default();

        let validator = self
            .agent
            .tool(WEB_SEARCH)
            .or_else(|| self.agent.tools().first());

        let validation = match validator {
            Some(tool) => match tool.call(&self.question).await {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        agent = %self.agent.name,
                        tool = tool.name(),
                        %error,
                        "validation search failed; recording the error as an observation"
                    );
                    format!("Tool error: {error}")
                }
            },
            None => String::new(),
        };

        let report = compose_report(&self.question, &records, &notes, &areas, &validation);

        info!(
            agent = %self.agent.name,
            sources = records.len(),
            report_len = report.len(),
            "analyst assembled final report"
        );

        context.set(FINAL_REPORT_KEY, report.clone()).await;
        record_trace(&context, self.id(), "analysis report assembled").await;

        Ok(TaskResult::new(Some(report), NextAction::End))
    }
}

const LEAD_INS: [&str; 8] = [
    "what are the latest developments in ",
    "what is the current state of ",
    "what do we know about ",
    "what are ",
    "what is ",
    "how does ",
    "how do ",
    "why is ",
];

/// Strip a leading interrogative so focus areas read as topics, not questions.
fn topic_of(question: &str) -> String {
    let normalized = question.trim().trim_end_matches(['?', '.', '!']).trim_end();
    for lead in LEAD_INS {
        if normalized.len() > lead.len()
            && normalized.is_char_boundary(lead.len())
            && normalized[..lead.len()].eq_ignore_ascii_case(lead)
        {
            return normalized[lead.len()..].trim().to_string();
        }
    }
    normalized.to_string()
}

fn focus_areas(question: &str) -> Vec<String> {
    let topic = topic_of(question);
    vec![
        format!("Background and current state of {topic}"),
        format!("Recent announcements and publications on {topic}"),
        format!("Expert assessments and open problems around {topic}"),
    ]
}

fn source_report(records: &[SearchHit], raw_observation: &str) -> String {
    if records.is_empty() {
        return format!(
            "No structured sources were identified. Raw observation:\n{raw_observation}"
        );
    }

    let mut report = String::from("Curated sources:\n");
    for (idx, hit) in records.iter().enumerate() {
        let _ = writeln!(report, "{}. {} ({})", idx + 1, hit.title, hit.url);
        let _ = writeln!(report, "   Relevance: {}", truncate(&hit.snippet, 160));
        let _ = writeln!(
            report,
            "   Reliability: {}",
            reliability_note(&domain_of(&hit.url))
        );
    }
    report
}

fn reliability_note(domain: &str) -> &'static str {
    if domain.ends_with(".gov") || domain.ends_with(".edu") {
        "institutional source, high reliability"
    } else if domain.ends_with(".org") {
        "organizational source, generally reliable"
    } else if domain.is_empty() {
        "origin unknown, verify before citing"
    } else {
        "general web source, cross-check recommended"
    }
}

fn domain_of(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = stripped.split(['/', '?', '#']).next().unwrap_or_default();
    host.trim_start_matches("www.").to_ascii_lowercase()
}

fn distinct_domains(records: &[SearchHit]) -> Vec<String> {
    let mut domains: Vec<String> = records
        .iter()
        .map(|hit| domain_of(&hit.url))
        .filter(|domain| !domain.is_empty())
        .collect();
    domains.sort();
    domains.dedup();
    domains
}

fn compose_report(
    question: &str,
    records: &[SearchHit],
    notes: &str,
    areas: &[String],
    validation: &str,
) -> String {
    let mut report = format!("Research question: {question}\n");

    report.push_str("\nKey Findings:\n");
    if records.is_empty() {
        report.push_str("No verifiable findings; the searches returned no usable sources.\n");
    } else {
        for (idx, hit) in records.iter().enumerate() {
            let _ = writeln!(
                report,
                "{}. {}: {}",
                idx + 1,
                hit.title,
                truncate(&hit.snippet, 200)
            );
        }
    }

    report.push_str("\nEvidence Quality:\n");
    let domains = distinct_domains(records);
    let _ = writeln!(
        report,
        "{} sources across {} distinct domains were examined.",
        records.len(),
        domains.len()
    );
    let depth = notes.matches("\n## ").count();
    if depth > 0 {
        let _ = writeln!(report, "{depth} sources were extracted in depth.");
    }
    for domain in &domains {
        let _ = writeln!(report, "- {}: {}", domain, reliability_note(domain));
    }

    report.push_str("\nPatterns and Trends:\n");
    if areas.is_empty() {
        report.push_str("No focus areas were recorded during planning.\n");
    } else {
        let _ = writeln!(report, "Focus areas covered: {}.", areas.join("; "));
    }
    if !validation.is_empty() {
        let _ = writeln!(report, "Cross-check: {}", truncate(validation, 300));
    }

    report.push_str("\nSources:\n");
    if records.is_empty() {
        report.push_str("(none recorded)\n");
    } else {
        for (idx, hit) in records.iter().enumerate() {
            let _ = writeln!(report, "{}. {}", idx + 1, hit.url);
        }
    }

    report
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
