use std::sync::Arc;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::ChildListener;
use crate::ClientResult;
use crate::ConnectionState;
use crate::MemoryWatchClient;
use crate::NotifyListener;
use crate::ServiceUrl;
use crate::StateListener;
use crate::WatchClient;

/// Forwards child-change deliveries into a channel.
pub struct ChannelChildListener {
    tx: mpsc::UnboundedSender<(String, Vec<String>)>,
}

impl ChannelChildListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, Vec<String>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl ChildListener for ChannelChildListener {
    async fn child_changed(
        &self,
        parent_path: &str,
        children: Vec<String>,
    ) {
        let _ = self.tx.send((parent_path.to_string(), children));
    }
}

/// Forwards connection-state transitions into a channel.
pub struct ChannelStateListener {
    tx: mpsc::UnboundedSender<ConnectionState>,
}

impl ChannelStateListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectionState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl StateListener for ChannelStateListener {
    async fn state_changed(
        &self,
        state: ConnectionState,
    ) {
        let _ = self.tx.send(state);
    }
}

/// Keeps every url list it is notified with.
#[derive(Default)]
pub struct RecordingListener {
    calls: Mutex<Vec<Vec<ServiceUrl>>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Vec<ServiceUrl>> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last(&self) -> Option<Vec<ServiceUrl>> {
        self.calls.lock().last().cloned()
    }

    /// Every url delivered so far, flattened.
    pub fn all_urls(&self) -> Vec<ServiceUrl> {
        self.calls.lock().iter().flatten().cloned().collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl NotifyListener for RecordingListener {
    fn notify(
        &self,
        urls: Vec<ServiceUrl>,
    ) {
        self.calls.lock().push(urls);
    }
}

/// Wraps a [`MemoryWatchClient`] and, while armed, parks the next
/// `add_child_listener` call until [`GatedWatchClient::release`].
pub struct GatedWatchClient {
    inner: Arc<MemoryWatchClient>,
    armed: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl GatedWatchClient {
    pub fn new(inner: Arc<MemoryWatchClient>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            released: Notify::new(),
        })
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once a gated call is parked.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl WatchClient for GatedWatchClient {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn create(
        &self,
        path: &str,
        ephemeral: bool,
    ) -> ClientResult<()> {
        self.inner.create(path, ephemeral).await
    }

    async fn delete(
        &self,
        path: &str,
    ) -> ClientResult<()> {
        self.inner.delete(path).await
    }

    async fn add_child_listener(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> ClientResult<Vec<String>> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.inner.add_child_listener(path, listener).await
    }

    async fn remove_child_listener(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> ClientResult<()> {
        self.inner.remove_child_listener(path, listener).await
    }

    async fn get_children(
        &self,
        path: &str,
    ) -> ClientResult<Vec<String>> {
        self.inner.get_children(path).await
    }

    fn add_state_listener(
        &self,
        listener: Arc<dyn StateListener>,
    ) {
        self.inner.add_state_listener(listener)
    }

    async fn close(&self) -> ClientResult<()> {
        self.inner.close().await
    }
}
