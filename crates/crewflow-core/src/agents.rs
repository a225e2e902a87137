use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AgentsConfig;
use crate::tools::{DynSearchTool, ToolRegistry};

/// A named role/goal/backstory bundle with its attached tools.
///
/// The orchestration engine decides *when* an agent's task runs; the agent
/// itself only carries identity and capabilities.
pub struct Agent {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    tools: Vec<DynSearchTool>,
}

impl Agent {
    pub fn tools(&self) -> &[DynSearchTool] {
        &self.tools
    }

    /// Look up an attached tool by its display name.
    pub fn tool(&self, name: &str) -> Option<&DynSearchTool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Build one agent per config entry, in config order, plus a name-to-agent
/// map for task wiring.
///
/// Tool references are resolved against the registry; a reference to an
/// unknown tool name is skipped with a warning rather than failing the run.
pub fn build_agents(
    config: &AgentsConfig,
    registry: &ToolRegistry,
) -> (Vec<Arc<Agent>>, HashMap<String, Arc<Agent>>) {
    let mut agents = Vec::with_capacity(config.agents.len());
    let mut agent_map = HashMap::with_capacity(config.agents.len());

    for entry in &config.agents {
        let mut tools = Vec::new();
        for tool_ref in entry.tool_refs() {
            match registry.get(&tool_ref.name) {
                Some(tool) => tools.push(tool.clone()),
                None => warn!(
                    agent = %entry.name,
                    tool = %tool_ref.name,
                    "config references unknown tool; skipping"
                ),
            }
        }

        debug!(
            agent = %entry.name,
            role = %entry.role,
            tools = tools.len(),
            "agent assembled"
        );

        let agent = Arc::new(Agent {
            name: entry.name.clone(),
            role: entry.role.clone(),
            goal: entry.goal.clone(),
            backstory: entry.backstory.clone(),
            tools,
        });
        agents.push(agent.clone());
        agent_map.insert(entry.name.clone(), agent);
    }

    (agents, agent_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::StaticSearchTool;

    fn sample_config() -> AgentsConfig {
        serde_yaml::from_str(
            r#"
agents:
  - name: coordinator
    role: Research Coordinator
    goal: Plan the investigation
    backstory: Veteran research director.
  - name: search_agent
    role: Web Search Specialist
    goal: Locate sources
    backstory: Knows where to look.
    tools:
      - name: Web Search
      - name: Crystal Ball
"#,
        )
        .expect("sample config parses")
    }

    fn stub_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.insert(
            "Web Search".to_string(),
            Arc::new(StaticSearchTool::new("Web Search", "stub")) as DynSearchTool,
        );
        registry
    }

    #[test]
    fn one_agent_per_entry_with_resolved_tools() {
        let (agents, agent_map) = build_agents(&sample_config(), &stub_registry());

        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].name, "coordinator");
        assert!(!agents[0].has_tools());

        let searcher = agent_map.get("search_agent").expect("search_agent mapped");
        assert_eq!(searcher.role, "Web Search Specialist");
        // "Crystal Ball" is unknown and skipped.
        assert_eq!(searcher.tools().len(), 1);
        assert!(searcher.tool("Web Search").is_some());
        assert!(searcher.tool("Crystal Ball").is_none());
    }

    #[test]
    fn map_and_list_share_the_same_agents() {
        let (agents, agent_map) = build_agents(&sample_config(), &stub_registry());
        for agent in &agents {
            let mapped = agent_map.get(&agent.name).expect("agent mapped by name");
            assert!(Arc::ptr_eq(agent, mapped));
        }
    }
}
