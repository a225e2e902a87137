use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
    Task,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::agents::build_agents;
use crate::config::{AgentsConfig, ConfigLoader};
use crate::search::SearchHit;
use crate::tasks::{CrewTasks, FINAL_REPORT_KEY, QUERY_KEY, SOURCE_RECORDS_KEY, create_tasks};
use crate::tools::{ToolRegistry, default_tool_registry};
use crate::trace::{TRACE_EVENTS_KEY, TraceEvent, TraceSummary};

/// Options for running a research session.
pub struct SessionOptions<'a> {
    pub question: &'a str,
    pub session_id: Option<String>,
    pub config_path: Option<PathBuf>,
    pub config: Option<AgentsConfig>,
    pub registry: Option<ToolRegistry>,
}

impl<'a> SessionOptions<'a> {
    pub fn new(question: &'a str) -> Self {
        Self {
            question,
            session_id: None,
            config_path: None,
            config: None,
            registry: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use an in-memory crew definition instead of reading the YAML file.
    pub fn with_config(mut self, config: AgentsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Swap the live search adapters, e.g. for offline runs.
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }
}

/// Everything a completed session leaves behind.
pub struct SessionOutcome {
    pub session_id: String,
    pub report: String,
    pub trace_events: Vec<TraceEvent>,
    pub sources: Vec<String>,
}

impl SessionOutcome {
    pub fn trace_summary(&self) -> TraceSummary {
        TraceSummary::from_events(&self.trace_events)
    }
}

fn build_graph(tasks: &CrewTasks) -> Arc<graph_flow::Graph> {
    let builder = GraphBuilder::new("crewflow_research")
        .add_task(tasks.plan.clone())
        .add_task(tasks.sources.clone())
        .add_task(tasks.extract.clone())
        .add_task(tasks.analyze.clone())
        .add_edge(tasks.plan.id(), tasks.sources.id())
        .add_edge(tasks.sources.id(), tasks.extract.id())
        .add_edge(tasks.extract.id(), tasks.analyze.id())
        .set_start_task(tasks.plan.id());

    Arc::new(builder.build())
}

fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}

/// Run the research pipeline end-to-end for the provided question using
/// default settings, returning the final report text.
pub async fn run_research_session(question: &str) -> Result<String> {
    let outcome = run_research_session_with_options(SessionOptions::new(question)).await?;
    Ok(outcome.report)
}

/// Run the research pipeline with custom options (session ID, crew config,
/// tool registry).
pub async fn run_research_session_with_options(
    options: SessionOptions<'_>,
) -> Result<SessionOutcome> {
    let config = match options.config {
        Some(config) => config,
        None => ConfigLoader::load(options.config_path.clone())?,
    };
    let registry = match options.registry {
        Some(registry) => registry,
        None => default_tool_registry()?,
    };

    let (agents, agent_map) = build_agents(&config, &registry);
    info!(agents = agents.len(), "crew assembled from configuration");

    let tasks = create_tasks(&agent_map, options.question)?;
    let graph = build_graph(&tasks);

    let storage = Arc::new(InMemorySessionStorage::new());
    let runner = FlowRunner::new(graph, storage.clone());

    let session_id = options.session_id.unwrap_or_else(new_session_id);
    let session = Session::new_from_task(session_id.clone(), tasks.plan.id());
    session
        .context
        .set(QUERY_KEY, options.question.to_string())
        .await;

    storage
        .save(session)
        .await
        .map_err(|err| anyhow!("failed to persist session: {err}"))?;

    loop {
        let result = runner
            .run(&session_id)
            .await
            .map_err(|err| anyhow!("graph execution failure: {err}"))?;

        match result.status {
            ExecutionStatus::Completed => break,
            ExecutionStatus::WaitingForInput => continue,
            ExecutionStatus::Error(message) => return Err(anyhow!(message)),
        }
    }

    let session = storage
        .get(&session_id)
        .await
        .map_err(|err| anyhow!("failed to reload session: {err}"))?
        .ok_or_else(|| anyhow!("session missing after execution"))?;

    let report: String = session
        .context
        .get(FINAL_REPORT_KEY)
        .await
        .unwrap_or_else(|| "No report recorded".to_string());
    let trace_events: Vec<TraceEvent> = session
        .context
        .get(TRACE_EVENTS_KEY)
        .await
        .unwrap_or_default();
    let records: Vec<SearchHit> = session
        .context
        .get(SOURCE_RECORDS_KEY)
        .await
        .unwrap_or_default();
    let sources = records.into_iter().map(|hit| hit.url).collect();

    debug!(
        session_id = %session_id,
        steps = trace_events.len(),
        "session artifacts collected"
    );

    Ok(SessionOutcome {
        session_id,
        report,
        trace_events,
        sources,
    })
}
