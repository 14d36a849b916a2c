use serde::Deserialize;
use serde::Serialize;

use crate::BackoffPolicy;
use crate::Error;
use crate::Result;
use crate::ServiceUrl;

/// Where the coordination service lives.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Registry url, e.g. `zookeeper://127.0.0.1:2181?group=dubbo&backup=10.0.0.2:2181`
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

impl ConnectionConfig {
    /// Parses the address and rejects any-host urls.
    pub fn registry_url(&self) -> Result<ServiceUrl> {
        let url: ServiceUrl = self
            .address
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("registry address {:?}: {}", self.address, e)))?;

        if url.host().is_empty() || url.is_any_host() {
            return Err(Error::InvalidConfig(format!(
                "registry address == null or any host: {}",
                self.address
            )));
        }
        Ok(url)
    }
}

/// Retry policy applied when re-applying bookkeeping after a reconnect.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryConfig {
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct WildcardConfig {
    /// Only names containing this text are expanded from the initial
    /// child list of a wildcard subscription.
    #[serde(default)]
    pub service_filter: Option<String>,
}

fn default_address() -> String {
    "zookeeper://127.0.0.1:2181".to_string()
}
