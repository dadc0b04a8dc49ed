use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
}

// The shape of one catalog entry (matches the agents JSON file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub status: AgentStatus,
    pub capabilities: Vec<String>, // Ordered, shown as-is
}

impl AgentDescriptor {
    fn active(name: &str, capabilities: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            status: AgentStatus::Active,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Read-only list of agents reported by `GET /agents/status`.
/// Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AgentCatalog {
    agents: Vec<AgentDescriptor>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentDescriptor>) -> Result<Self> {
        if agents.is_empty() {
            anyhow::bail!("Agent catalog must list at least one agent");
        }

        // Sanity check, same spirit as a registry with missing binaries: warn, don't fail
        for agent in &agents {
            if agent.status == AgentStatus::Inactive {
                tracing::warn!("Agent '{}' is registered but inactive", agent.name);
            }
            if agent.capabilities.is_empty() {
                tracing::warn!("Agent '{}' declares no capabilities", agent.name);
            }
        }

        Ok(Self { agents })
    }

    pub fn builtin() -> Self {
        Self {
            agents: vec![
                AgentDescriptor::active(
                    "Financial Analysis Agent",
                    &["market analysis", "stock prices", "portfolio management"],
                ),
                AgentDescriptor::active(
                    "Investment Strategy Agent",
                    &["investment advice", "risk analysis", "diversification"],
                ),
                AgentDescriptor::active(
                    "Market Data Agent",
                    &["real-time data", "historical trends", "market news"],
                ),
            ],
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let agents: Vec<AgentDescriptor> = serde_json::from_str(content)?;
        Self::new(agents)
    }

    // Reads a JSON array of agents from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read agent catalog at '{}': {}", path.display(), e))?;

        Self::from_json(&content)
            .map_err(|e| anyhow::anyhow!("Invalid agent catalog at '{}': {}", path.display(), e))
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
