use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_MOUNT_PREFIXES: &str = "/.netlify/functions/orchestrator,/api";
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    /// Stripped from the front of every request path, first match wins.
    pub mount_prefixes: Vec<String>,
    /// Overrides the built-in agent catalog when set.
    pub catalog_path: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl GatewayConfig {
    // Reads the process environment (call dotenvy first so .env is honored)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_raw = lookup("GATEWAY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("GATEWAY_BIND '{}' is not a socket address", bind_raw))?;

        let prefixes_raw =
            lookup("GATEWAY_MOUNT_PREFIXES").unwrap_or_else(|| DEFAULT_MOUNT_PREFIXES.to_string());
        let mount_prefixes = prefixes_raw
            .split(',')
            .map(|p| p.trim().trim_end_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| {
                if p.starts_with('/') {
                    p.to_string()
                } else {
                    format!("/{p}")
                }
            })
            .collect();

        let catalog_path = lookup("AGENT_CATALOG_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let max_body_bytes = match lookup("GATEWAY_MAX_BODY_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("GATEWAY_MAX_BODY_BYTES '{}' is not a byte count", raw))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            bind,
            mount_prefixes,
            catalog_path,
            max_body_bytes,
        })
    }
}
