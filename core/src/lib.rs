//! Routing and intent classification for the demo financial assistant.
//!
//! Everything here is synchronous and free of I/O except
//! [`registry::AgentCatalog::load`]. The HTTP layer lives in the `gateway`
//! crate and only hands [`router::Dispatcher::route`] a method, a path with
//! the mount prefix already stripped, and the raw body bytes.

pub mod classifier;
pub mod env;
pub mod payload;
pub mod registry;
pub mod router;

pub use classifier::{ClassificationResult, Classifier, ClassifierRules, Intent, IntentRule};
pub use registry::{AgentCatalog, AgentDescriptor, AgentStatus};
pub use router::{Dispatcher, Method, RouteError, RouteOutcome, ServiceProfile};
