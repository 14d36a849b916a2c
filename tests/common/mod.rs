use std::sync::Arc;
use std::time::Duration;

use dregistry::BackoffPolicy;
use dregistry::ListenerHandle;
use dregistry::MemoryTransporter;
use dregistry::MemoryTree;
use dregistry::MemoryWatchClient;
use dregistry::NotifyListener;
use dregistry::Registry;
use dregistry::RegistryBuilder;
use dregistry::RegistryConfig;
use dregistry::ServiceUrl;
use parking_lot::Mutex;
use tokio::time::sleep;
use tokio::time::Instant;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

pub fn url(raw: &str) -> ServiceUrl {
    raw.parse().expect("test url should parse")
}

pub fn provider(
    interface: &str,
    host: &str,
) -> ServiceUrl {
    url(&format!(
        "dubbo://{}:20880/{}?application=provider&side=provider",
        host, interface
    ))
}

pub fn consumer(interface: &str) -> ServiceUrl {
    url(&format!("consumer://192.168.0.7/{}?application=consumer&side=consumer", interface))
}

pub fn config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.recovery.backoff = BackoffPolicy {
        max_retries: 5,
        timeout_ms: 500,
        base_delay_ms: 5,
        max_delay_ms: 50,
    };
    config
}

/// One application process: a registry with its own session on the shared
/// tree.
pub struct Node {
    pub registry: Registry,
    pub client: Arc<MemoryWatchClient>,
}

pub async fn start_node(tree: &Arc<MemoryTree>) -> Node {
    let transporter = Arc::new(MemoryTransporter::new(tree.clone()));
    let registry = RegistryBuilder::new(config())
        .transporter(transporter.clone())
        .build()
        .await
        .expect("registry should start");
    let client = transporter.last_client().expect("session should be open");
    Node { registry, client }
}

#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Vec<ServiceUrl>>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handle(self: &Arc<Self>) -> ListenerHandle {
        ListenerHandle::from_arc(self.clone())
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last(&self) -> Vec<ServiceUrl> {
        self.calls.lock().last().cloned().unwrap_or_default()
    }

    pub fn all(&self) -> Vec<ServiceUrl> {
        self.calls.lock().iter().flatten().cloned().collect()
    }

    /// Hosts of the real (non-placeholder) urls in the latest notification.
    pub fn last_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .last()
            .iter()
            .filter(|u| u.protocol() != "empty")
            .map(|u| u.host().to_string())
            .collect();
        hosts.sort();
        hosts
    }
}

impl NotifyListener for Recorder {
    fn notify(
        &self,
        urls: Vec<ServiceUrl>,
    ) {
        self.calls.lock().push(urls);
    }
}

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
