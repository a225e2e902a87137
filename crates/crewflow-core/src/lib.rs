//! Config-driven research crew orchestration built directly on `graph_flow`.
//!
//! This crate wires YAML-defined agents and their web search tools into a
//! fixed four-step research pipeline: plan, find sources, extract, analyze.

mod agents;
mod config;
mod error;
mod logging;
mod search;
mod tasks;
mod tools;
mod trace;
mod workflow;

pub use agents::{Agent, build_agents};
pub use config::{AgentEntry, AgentsConfig, ConfigLoader, ToolRef};
pub use error::CrewflowError;
pub use logging::{SessionLogInput, log_session_completion, log_session_completion_to};
pub use search::{SearchClient, SearchHit, format_deep_results, parse_deep_results};
pub use tasks::{
    AnalyzeTask, CrewTasks, ExtractTask, PlanTask, SourceTask, TaskSpec, create_tasks,
};
pub use tools::{
    DEEP_SEARCH, DeepSearchTool, DynSearchTool, SearchTool, StaticSearchTool, ToolRegistry,
    WEB_SEARCH, WebSearchTool, default_tool_registry,
};
pub use trace::{TraceEvent, TraceStep, TraceSummary, persist_trace, record_trace};
pub use workflow::{
    SessionOptions, SessionOutcome, run_research_session, run_research_session_with_options,
};
