use serde::Serialize;

use crate::registry::AgentCatalog;

// Output: what each route sends back (serialized into the response body)

#[derive(Debug, Serialize)]
pub struct HealthReport<'a> {
    pub status: &'static str,
    pub service: &'a str,
    pub timestamp: String,
    pub version: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AgentStatusReport<'a> {
    #[serde(flatten)]
    pub health: HealthReport<'a>,
    pub available_agents: &'a AgentCatalog,
}

#[derive(Debug, Serialize)]
pub struct QueryAnswer {
    pub response: String,
    pub confidence: f64,
    pub timestamp: String,
    pub model: &'static str,
    pub query_type: &'static str,
    pub voice_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct VoiceAnswer {
    pub response: String,
    pub confidence: f64,
    pub timestamp: String,
    pub model: &'static str,
    pub query_type: &'static str,
    pub limitation: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChatAnswer<'a> {
    pub response: &'a str,
    pub confidence: f64,
    pub timestamp: String,
    pub model: &'static str,
}
