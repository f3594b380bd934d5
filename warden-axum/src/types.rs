use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client address and user agent of the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ConnectionInfo {
    /// Address used for accounting when the client address is unknown
    pub const UNKNOWN_ADDRESS: &'static str = "unknown";

    pub fn address(&self) -> &str {
        self.ip.as_deref().unwrap_or(Self::UNKNOWN_ADDRESS)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAddressRequest {
    #[serde(default = "default_block_reason")]
    pub reason: String,
    pub duration_secs: u64,
}

fn default_block_reason() -> String {
    "manual block".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAddressResponse {
    pub address: String,
    pub reason: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnblockAddressResponse {
    pub address: String,
    pub was_blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
