use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;

use super::RecordingListener;
use crate::BackoffPolicy;
use crate::ListenerHandle;
use crate::MemoryTransporter;
use crate::MemoryTree;
use crate::MemoryWatchClient;
use crate::Registry;
use crate::RegistryBuilder;
use crate::RegistryConfig;
use crate::ServiceUrl;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

pub fn url(raw: &str) -> ServiceUrl {
    raw.parse().expect("test url should parse")
}

pub fn provider_url(
    interface: &str,
    host: &str,
) -> ServiceUrl {
    url(&format!("dubbo://{}:20880/{}?application=demo-provider", host, interface))
}

pub fn consumer_url(interface: &str) -> ServiceUrl {
    url(&format!("consumer://10.20.30.40/{}?application=demo-consumer", interface))
}

/// Retry policy that keeps recovery tests fast.
pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 3,
        timeout_ms: 500,
        base_delay_ms: 5,
        max_delay_ms: 20,
    }
}

pub fn test_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.recovery.backoff = fast_backoff();
    config
}

/// Registry over a fresh [`MemoryTree`], plus the session behind it.
pub struct MemoryRegistry {
    pub registry: Registry,
    pub tree: Arc<MemoryTree>,
    pub client: Arc<MemoryWatchClient>,
}

pub async fn memory_registry() -> MemoryRegistry {
    memory_registry_with(RegistryBuilder::new(test_config())).await
}

pub async fn memory_registry_with(builder: RegistryBuilder) -> MemoryRegistry {
    let tree = MemoryTree::new();
    let transporter = Arc::new(MemoryTransporter::new(tree.clone()));
    let registry = builder
        .transporter(transporter.clone())
        .build()
        .await
        .expect("memory registry should build");
    let client = transporter.last_client().expect("transporter should hold a session");
    MemoryRegistry {
        registry,
        tree,
        client,
    }
}

pub fn handle(listener: &Arc<RecordingListener>) -> ListenerHandle {
    ListenerHandle::from_arc(listener.clone())
}

/// Polls `condition` until it holds or [`WAIT_TIMEOUT`] passes.
pub async fn eventually<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}
