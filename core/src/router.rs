use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::classifier::Classifier;
use crate::env::{Clock, RandomSource, SystemClock, ThreadRandom};
use crate::payload::{AgentStatusReport, ChatAnswer, HealthReport, QueryAnswer, VoiceAnswer};
use crate::registry::AgentCatalog;

const QUERY_REQUIRED: &str = "Query is required";
const MESSAGE_REQUIRED: &str = "Message is required";

const VOICE_NOTICE: &str = "Voice processing is currently limited in serverless environments. For full voice capabilities, please use the Streamlit app. This query has been processed as text: ";
const VOICE_LIMITATION: &str = "Serverless voice processing is limited";
const NO_QUERY: &str = "No query provided";

const VOICE_CONFIDENCE: f64 = 0.75;
const CHAT_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other(String),
}

impl From<&str> for Method {
    fn from(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("GET") {
            Method::Get
        } else if raw.eq_ignore_ascii_case("POST") {
            Method::Post
        } else if raw.eq_ignore_ascii_case("OPTIONS") {
            Method::Options
        } else {
            Method::Other(raw.to_ascii_uppercase())
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
            Method::Options => f.write_str("OPTIONS"),
            Method::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    /// Missing required field.
    #[error("{0}")]
    Validation(&'static str),
    #[error("Endpoint not found")]
    NotFound,
    /// Anything unanticipated: malformed body, wrong field type.
    #[error("{0}")]
    Internal(String),
}

impl RouteError {
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::Validation(_) => 400,
            RouteError::NotFound => 404,
            RouteError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(e: serde_json::Error) -> Self {
        RouteError::Internal(e.to_string())
    }
}

/// Status plus JSON payload. `payload` is `None` only for preflight.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub status_code: u16,
    pub payload: Option<Value>,
}

impl RouteOutcome {
    fn ok(payload: Value) -> Self {
        Self { status_code: 200, payload: Some(payload) }
    }

    fn preflight() -> Self {
        Self { status_code: 200, payload: None }
    }

    /// Serialized body; empty for preflight.
    pub fn body(&self) -> String {
        self.payload.as_ref().map(Value::to_string).unwrap_or_default()
    }
}

/// Parsed JSON object body. An empty raw body reads as `{}`.
#[derive(Debug, Default)]
pub struct RequestBody(Map<String, Value>);

impl RequestBody {
    /// Arrays, numbers, strings and booleans carry no named fields, so they
    /// read as `{}`. Only `null` and unparseable bytes fail.
    pub fn parse(raw: &[u8]) -> Result<Self, RouteError> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_slice::<Value>(raw)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(RouteError::Internal("request body must not be null".to_string())),
            _ => Ok(Self::default()),
        }
    }

    /// The field, unless it is absent or falsy (`null`, `false`, `0`, `""`).
    pub fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| truthy(v))
    }

    pub fn flag(&self, key: &str) -> bool {
        self.present(key).is_some()
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// String form used when a field is spliced into text: array items joined by
/// commas (null items empty), objects as `[object Object]`.
fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(as_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, RouteError> {
    Ok(serde_json::to_value(value)?)
}

/// Static facts about the service, handed to the dispatcher at startup.
#[derive(Debug, Clone)]
pub struct ServiceProfile {
    pub service: String,
    pub version: String,
    pub chat_responses: Vec<String>,
    pub available_endpoints: Vec<String>,
}

impl Default for ServiceProfile {
    fn default() -> Self {
        Self {
            service: "AI Financial Assistant Orchestrator".to_string(),
            version: "1.0.0".to_string(),
            chat_responses: [
                "I'm here to help with your financial questions. As a demo response, I can assist with market analysis, investment strategies, and financial planning.",
                "Based on current market trends, here are some insights for your financial portfolio...",
                "Let me analyze that financial data for you. This is a sample response from the AI assistant.",
                "For your investment query, I recommend considering diversified portfolio strategies...",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            available_endpoints: [
                "GET /api/agents/status",
                "GET /api/health",
                "POST /api/intelligent/query",
                "POST /api/intelligent/voice",
                "POST /api/chat",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Maps a normalized `(method, path, body)` triple to a `RouteOutcome`.
///
/// Holds no mutable state, so one instance can be shared across every
/// in-flight request. The clock and random source are the only inputs that
/// vary between otherwise identical calls.
pub struct Dispatcher {
    profile: ServiceProfile,
    classifier: Classifier,
    catalog: AgentCatalog,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl Dispatcher {
    pub fn new(profile: ServiceProfile, classifier: Classifier, catalog: AgentCatalog) -> Self {
        Self {
            profile,
            classifier,
            catalog,
            clock: Arc::new(SystemClock),
            random: Arc::new(ThreadRandom),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Arc::new(random);
        self
    }

    pub fn profile(&self) -> &ServiceProfile {
        &self.profile
    }

    pub fn route(&self, method: &Method, path: &str, raw_body: &[u8]) -> RouteOutcome {
        // Preflight answers before anything else looks at the path
        if *method == Method::Options {
            debug!("Preflight for {}", path);
            return RouteOutcome::preflight();
        }

        let result = match (method, path) {
            (Method::Get, "/agents/status") => self.agent_status(),
            (Method::Get, "/health") => self.health(),
            (Method::Post, "/intelligent/query") => {
                RequestBody::parse(raw_body).and_then(|body| self.intelligent_query(&body))
            }
            (Method::Post, "/intelligent/voice") => {
                RequestBody::parse(raw_body).and_then(|body| self.intelligent_voice(&body))
            }
            (Method::Post, "/chat") => RequestBody::parse(raw_body).and_then(|body| self.chat(&body)),
            _ => Err(RouteError::NotFound),
        };

        let outcome = match result {
            Ok(payload) => RouteOutcome::ok(payload),
            Err(e) => self.reject(e),
        };
        debug!("{} {} -> {}", method, path, outcome.status_code);
        outcome
    }

    /// Turns a route error into its response. Internal failures only expose
    /// their message, never debug output.
    pub fn reject(&self, err: RouteError) -> RouteOutcome {
        let status_code = err.status_code();
        let payload = match err {
            RouteError::Validation(msg) => json!({ "error": msg }),
            RouteError::NotFound => json!({
                "error": "Endpoint not found",
                "available_endpoints": self.profile.available_endpoints,
            }),
            RouteError::Internal(message) => {
                error!("Request failed: {}", message);
                json!({ "error": "Internal server error", "message": message })
            }
        };
        RouteOutcome { status_code, payload: Some(payload) }
    }

    // --- HANDLERS ---

    fn health_report(&self) -> HealthReport<'_> {
        HealthReport {
            status: "healthy",
            service: &self.profile.service,
            timestamp: self.clock.timestamp(),
            version: &self.profile.version,
        }
    }

    fn health(&self) -> Result<Value, RouteError> {
        to_payload(&self.health_report())
    }

    fn agent_status(&self) -> Result<Value, RouteError> {
        to_payload(&AgentStatusReport {
            health: self.health_report(),
            available_agents: &self.catalog,
        })
    }

    fn intelligent_query(&self, body: &RequestBody) -> Result<Value, RouteError> {
        let query = match body.present("query") {
            Some(Value::String(q)) => q,
            Some(other) => {
                return Err(RouteError::Internal(format!("query must be a string, got {}", kind(other))))
            }
            None => return Err(RouteError::Validation(QUERY_REQUIRED)),
        };
        if query.trim().is_empty() {
            return Err(RouteError::Validation(QUERY_REQUIRED));
        }

        let result = self.classifier.classify(query);

        to_payload(&QueryAnswer {
            response: result.response,
            confidence: result.confidence,
            timestamp: self.clock.timestamp(),
            model: "demo-financial-assistant",
            query_type: "intelligent",
            voice_mode: body.flag("voice_mode"),
        })
    }

    // audio_data is accepted and ignored
    fn intelligent_voice(&self, body: &RequestBody) -> Result<Value, RouteError> {
        let echoed = body
            .present("query")
            .map(as_text)
            .unwrap_or_else(|| NO_QUERY.to_string());

        to_payload(&VoiceAnswer {
            response: format!("{VOICE_NOTICE}{echoed}"),
            confidence: VOICE_CONFIDENCE,
            timestamp: self.clock.timestamp(),
            model: "demo-voice-assistant",
            query_type: "voice",
            limitation: VOICE_LIMITATION,
        })
    }

    // history is accepted and ignored
    fn chat(&self, body: &RequestBody) -> Result<Value, RouteError> {
        if body.present("message").is_none() {
            return Err(RouteError::Validation(MESSAGE_REQUIRED));
        }

        let pool = &self.profile.chat_responses;
        if pool.is_empty() {
            return Err(RouteError::Internal("chat response pool is empty".to_string()));
        }
        let response = &pool[self.random.pick(pool.len()) % pool.len()];

        to_payload(&ChatAnswer {
            response,
            confidence: CHAT_CONFIDENCE,
            timestamp: self.clock.timestamp(),
            model: "demo-mode",
        })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(ServiceProfile::default(), Classifier::default(), AgentCatalog::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{GENERAL_TEMPLATE, STOCK_TEMPLATE};
    use crate::env::{FixedClock, SequenceRandom};
    use chrono::{TimeZone, Utc};

    const NOW: &str = "2024-05-01T12:00:00.000Z";

    fn dispatcher() -> Dispatcher {
        Dispatcher::default()
            .with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
            .with_random(SequenceRandom::default())
    }

    fn post(d: &Dispatcher, path: &str, body: &str) -> RouteOutcome {
        d.route(&Method::Post, path, body.as_bytes())
    }

    fn payload(outcome: &RouteOutcome) -> &Value {
        outcome.payload.as_ref().unwrap()
    }

    #[test]
    fn method_parsing_ignores_case() {
        assert_eq!(Method::from("get"), Method::Get);
        assert_eq!(Method::from("Post"), Method::Post);
        assert_eq!(Method::from("OPTIONS"), Method::Options);
        assert_eq!(Method::from("delete"), Method::Other("DELETE".to_string()));
        assert_eq!(Method::Other("PUT".to_string()).to_string(), "PUT");
    }

    #[test]
    fn truthiness_matches_loose_presence() {
        let body = RequestBody::parse(
            br#"{"a":null,"b":false,"c":0,"d":"","e":"x","f":1,"g":[],"h":{},"i":true}"#,
        )
        .unwrap();
        for key in ["a", "b", "c", "d", "missing"] {
            assert!(body.present(key).is_none(), "{key}");
        }
        for key in ["e", "f", "g", "h", "i"] {
            assert!(body.present(key).is_some(), "{key}");
        }
    }

    #[test]
    fn options_short_circuits_any_path() {
        let d = dispatcher();
        for path in ["/agents/status", "/chat", "/nowhere", ""] {
            let outcome = d.route(&Method::Options, path, b"not json");
            assert_eq!(outcome.status_code, 200);
            assert!(outcome.payload.is_none());
            assert_eq!(outcome.body(), "");
        }
    }

    #[test]
    fn agents_status_reports_catalog() {
        let outcome = dispatcher().route(&Method::Get, "/agents/status", b"");
        assert_eq!(outcome.status_code, 200);

        let body = payload(&outcome);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "AI Financial Assistant Orchestrator");
        assert_eq!(body["version"], "1.0.0");
        assert_eq!(body["timestamp"], NOW);
        let agents = body["available_agents"].as_array().unwrap();
        assert_eq!(agents.len(), 3);
        assert!(agents.iter().all(|a| a["status"] == "active"));
    }

    #[test]
    fn health_omits_agents() {
        let outcome = dispatcher().route(&Method::Get, "/health", b"");
        assert_eq!(outcome.status_code, 200);
        assert_eq!(
            payload(&outcome),
            &json!({
                "status": "healthy",
                "service": "AI Financial Assistant Orchestrator",
                "timestamp": NOW,
                "version": "1.0.0",
            })
        );
    }

    #[test]
    fn get_routes_ignore_body() {
        let outcome = dispatcher().route(&Method::Get, "/health", b"{{{");
        assert_eq!(outcome.status_code, 200);
    }

    #[test]
    fn intelligent_query_classifies() {
        let outcome = post(&dispatcher(), "/intelligent/query", r#"{"query":"AAPL price?"}"#);
        assert_eq!(outcome.status_code, 200);
        assert_eq!(
            payload(&outcome),
            &json!({
                "response": STOCK_TEMPLATE,
                "confidence": 0.92,
                "timestamp": NOW,
                "model": "demo-financial-assistant",
                "query_type": "intelligent",
                "voice_mode": false,
            })
        );
    }

    #[test]
    fn intelligent_query_echoes_voice_mode() {
        let outcome = post(&dispatcher(), "/intelligent/query", r#"{"query":"hello","voice_mode":true}"#);
        assert_eq!(payload(&outcome)["voice_mode"], true);
        assert_eq!(payload(&outcome)["response"], GENERAL_TEMPLATE);
    }

    #[test]
    fn intelligent_query_requires_query() {
        let d = dispatcher();
        for body in ["{}", "", r#"{"query":""}"#, r#"{"query":"   "}"#, r#"{"query":null}"#] {
            let outcome = post(&d, "/intelligent/query", body);
            assert_eq!(outcome.status_code, 400, "{body}");
            assert_eq!(payload(&outcome), &json!({ "error": "Query is required" }));
        }
    }

    #[test]
    fn intelligent_query_rejects_non_string_query() {
        let outcome = post(&dispatcher(), "/intelligent/query", r#"{"query":42}"#);
        assert_eq!(outcome.status_code, 500);
        assert_eq!(payload(&outcome)["error"], "Internal server error");
        assert_eq!(payload(&outcome)["message"], "query must be a string, got a number");
    }

    #[test]
    fn voice_echoes_query_or_placeholder() {
        let d = dispatcher();

        let outcome = post(&d, "/intelligent/voice", r#"{"query":"market news","audio_data":"AAAA"}"#);
        assert_eq!(outcome.status_code, 200);
        let body = payload(&outcome);
        assert_eq!(body["response"], format!("{VOICE_NOTICE}market news"));
        assert_eq!(body["confidence"], 0.75);
        assert_eq!(body["model"], "demo-voice-assistant");
        assert_eq!(body["query_type"], "voice");
        assert_eq!(body["limitation"], VOICE_LIMITATION);

        let outcome = post(&d, "/intelligent/voice", "");
        assert_eq!(payload(&outcome)["response"], format!("{VOICE_NOTICE}No query provided"));
    }

    #[test]
    fn chat_walks_the_whole_pool() {
        let d = dispatcher();
        let pool = d.profile().chat_responses.clone();

        let seen: Vec<String> = (0..pool.len())
            .map(|_| {
                let outcome = post(&d, "/chat", r#"{"message":"hi","history":[]}"#);
                assert_eq!(outcome.status_code, 200);
                assert_eq!(payload(&outcome)["confidence"], 0.85);
                assert_eq!(payload(&outcome)["model"], "demo-mode");
                payload(&outcome)["response"].as_str().unwrap().to_string()
            })
            .collect();

        assert_eq!(seen, pool);
    }

    #[test]
    fn chat_with_thread_random_stays_in_pool() {
        let d = Dispatcher::default();
        for _ in 0..20 {
            let outcome = post(&d, "/chat", r#"{"message":"hi"}"#);
            let response = payload(&outcome)["response"].as_str().unwrap().to_string();
            assert!(d.profile().chat_responses.contains(&response));
        }
    }

    #[test]
    fn chat_requires_message() {
        let outcome = post(&dispatcher(), "/chat", r#"{"history":["x"]}"#);
        assert_eq!(outcome.status_code, 400);
        assert_eq!(payload(&outcome), &json!({ "error": "Message is required" }));
    }

    #[test]
    fn chat_with_empty_pool_is_internal_error() {
        let profile = ServiceProfile { chat_responses: Vec::new(), ..ServiceProfile::default() };
        let d = Dispatcher::new(profile, Classifier::default(), AgentCatalog::builtin());
        let outcome = post(&d, "/chat", r#"{"message":"hi"}"#);
        assert_eq!(outcome.status_code, 500);
    }

    #[test]
    fn unknown_routes_list_endpoints() {
        let d = dispatcher();
        let cases = [
            (Method::Get, "/nonexistent"),
            (Method::Post, "/health"),
            (Method::Get, "/chat"),
            (Method::Other("DELETE".to_string()), "/agents/status"),
            (Method::Get, "/agents/status/"),
        ];
        for (method, path) in cases {
            let outcome = d.route(&method, path, b"");
            assert_eq!(outcome.status_code, 404, "{method} {path}");
            let body = payload(&outcome);
            assert_eq!(body["error"], "Endpoint not found");
            assert_eq!(body["available_endpoints"].as_array().unwrap().len(), 5);
        }
    }

    #[test]
    fn malformed_json_is_internal_error() {
        let d = dispatcher();
        for path in ["/intelligent/query", "/intelligent/voice", "/chat"] {
            let outcome = post(&d, path, "{not json");
            assert_eq!(outcome.status_code, 500, "{path}");
            let body = payload(&outcome);
            assert_eq!(body["error"], "Internal server error");
            assert!(!body["message"].as_str().unwrap().is_empty());
        }
    }

    #[test]
    fn non_object_body_reads_as_empty() {
        let d = dispatcher();

        let outcome = post(&d, "/intelligent/query", "[]");
        assert_eq!(outcome.status_code, 400);
        assert_eq!(payload(&outcome), &json!({ "error": "Query is required" }));

        let outcome = post(&d, "/chat", "5");
        assert_eq!(outcome.status_code, 400);
        assert_eq!(payload(&outcome), &json!({ "error": "Message is required" }));

        let outcome = post(&d, "/chat", r#""hi""#);
        assert_eq!(outcome.status_code, 400);

        let outcome = post(&d, "/intelligent/voice", "[]");
        assert_eq!(outcome.status_code, 200);
        assert_eq!(payload(&outcome)["response"], format!("{VOICE_NOTICE}No query provided"));
    }

    #[test]
    fn null_body_is_internal_error() {
        for path in ["/intelligent/query", "/intelligent/voice", "/chat"] {
            let outcome = post(&dispatcher(), path, "null");
            assert_eq!(outcome.status_code, 500, "{path}");
            assert_eq!(payload(&outcome)["error"], "Internal server error");
            assert_eq!(payload(&outcome)["message"], "request body must not be null");
        }
    }

    #[test]
    fn voice_splices_non_string_query_as_text() {
        let d = dispatcher();
        let cases = [
            (r#"{"query":["a","b"]}"#, "a,b"),
            (r#"{"query":[1,null,true]}"#, "1,,true"),
            (r#"{"query":{"k":"v"}}"#, "[object Object]"),
            (r#"{"query":42}"#, "42"),
            (r#"{"query":true}"#, "true"),
        ];
        for (body, echoed) in cases {
            let outcome = post(&d, "/intelligent/voice", body);
            assert_eq!(outcome.status_code, 200, "{body}");
            assert_eq!(payload(&outcome)["response"], format!("{VOICE_NOTICE}{echoed}"));
        }
    }

    #[test]
    fn reject_maps_status_codes() {
        let d = dispatcher();
        assert_eq!(d.reject(RouteError::Validation("x")).status_code, 400);
        assert_eq!(d.reject(RouteError::NotFound).status_code, 404);
        assert_eq!(d.reject(RouteError::Internal("boom".into())).status_code, 500);
    }
}
