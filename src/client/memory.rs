//! In-process coordination tree.
//!
//! [`MemoryTree`] plays the server: a map of absolute node paths, some of them
//! ephemeral and owned by a client session. [`MemoryWatchClient`] plays the
//! client: every tree change is queued to each connected client, and a single
//! delivery task per client drains the queue, so deliveries for one path
//! arrive in order. Children are read at delivery time, which gives the usual
//! "watch fired, re-read the current list" semantics.
//!
//! Connection loss can be simulated with [`MemoryWatchClient::disconnect`],
//! [`MemoryWatchClient::expire_session`] and [`MemoryWatchClient::reconnect`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::same_listener;
use super::ChildListener;
use super::ClientResult;
use super::ConnectionState;
use super::StateListener;
use super::Transporter;
use super::WatchClient;
use crate::utils::net::connect_addresses;
use crate::ClientError;
use crate::Result;
use crate::ServiceUrl;

#[derive(Debug, Clone)]
enum ClientEvent {
    ChildrenChanged(String),
    StateChanged(ConnectionState),
}

/// Shared in-memory node tree.
#[derive(Default)]
pub struct MemoryTree {
    // path -> ephemeral owner session
    nodes: Mutex<BTreeMap<String, Option<u64>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ClientEvent>>>,
    next_session: AtomicU64,
}

impl MemoryTree {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn exists(
        &self,
        path: &str,
    ) -> bool {
        path == "/" || self.nodes.lock().contains_key(path)
    }

    /// Current child names of `path`, sorted.
    pub fn children(
        &self,
        path: &str,
    ) -> ClientResult<Vec<String>> {
        validate_path(path)?;
        let nodes = self.nodes.lock();
        if path != "/" && !nodes.contains_key(path) {
            return Err(ClientError::NoNode(path.to_string()));
        }
        Ok(child_names(&nodes, path))
    }

    fn new_session(&self) -> u64 {
        self.next_session.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn subscribe(
        &self,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) {
        self.subscribers.lock().push(events);
    }

    fn create(
        &self,
        path: &str,
        owner: Option<u64>,
    ) -> ClientResult<Vec<String>> {
        validate_path(path)?;
        let mut changed = Vec::new();
        {
            let mut nodes = self.nodes.lock();
            let mut current = String::new();
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            for (i, segment) in segments.iter().enumerate() {
                let parent = if current.is_empty() { "/".to_string() } else { current.clone() };
                current.push('/');
                current.push_str(segment);
                if nodes.contains_key(&current) {
                    continue;
                }
                let node_owner = if i + 1 == segments.len() { owner } else { None };
                nodes.insert(current.clone(), node_owner);
                changed.push(parent);
            }
        }
        self.publish(&changed);
        Ok(changed)
    }

    fn delete(
        &self,
        path: &str,
    ) -> ClientResult<()> {
        validate_path(path)?;
        {
            let mut nodes = self.nodes.lock();
            if !nodes.contains_key(path) {
                return Ok(());
            }
            if !child_names(&nodes, path).is_empty() {
                return Err(ClientError::NotEmpty(path.to_string()));
            }
            nodes.remove(path);
        }
        self.publish(&[parent_of(path)]);
        Ok(())
    }

    /// Drops every ephemeral node owned by `session`.
    fn expire(
        &self,
        session: u64,
    ) {
        let changed: BTreeSet<String> = {
            let mut nodes = self.nodes.lock();
            let owned: Vec<String> = nodes
                .iter()
                .filter(|(_, owner)| **owner == Some(session))
                .map(|(path, _)| path.clone())
                .collect();
            for path in &owned {
                nodes.remove(path);
            }
            owned.iter().map(|p| parent_of(p)).collect()
        };
        if !changed.is_empty() {
            debug!(session, count = changed.len(), "ephemeral nodes expired");
            self.publish(&changed.into_iter().collect::<Vec<_>>());
        }
    }

    fn publish(
        &self,
        changed: &[String],
    ) {
        if changed.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        for tx in subscribers.iter() {
            for path in changed {
                let _ = tx.send(ClientEvent::ChildrenChanged(path.clone()));
            }
        }
    }
}

fn validate_path(path: &str) -> ClientResult<()> {
    if !path.starts_with('/') || (path.len() > 1 && (path.ends_with('/') || path.contains("//"))) {
        return Err(ClientError::BadPath(path.to_string()));
    }
    Ok(())
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn child_names(
    nodes: &BTreeMap<String, Option<u64>>,
    path: &str,
) -> Vec<String> {
    let prefix = if path == "/" { "/".to_string() } else { format!("{}/", path) };
    nodes
        .range(prefix.clone()..)
        .take_while(|(k, _)| k.starts_with(&prefix))
        .map(|(k, _)| &k[prefix.len()..])
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        .map(str::to_string)
        .collect()
}

/// Client session against a [`MemoryTree`].
pub struct MemoryWatchClient {
    tree: Arc<MemoryTree>,
    session: AtomicU64,
    connected: AtomicBool,
    closed: AtomicBool,
    child_listeners: DashMap<String, Vec<Arc<dyn ChildListener>>>,
    state_listeners: ArcSwap<Vec<Arc<dyn StateListener>>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    shutdown: CancellationToken,
}

impl MemoryWatchClient {
    /// Opens a session and spawns its delivery task on the current runtime.
    pub fn connect(tree: Arc<MemoryTree>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        tree.subscribe(tx.clone());

        let client = Arc::new(Self {
            session: AtomicU64::new(tree.new_session()),
            tree,
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            child_listeners: DashMap::new(),
            state_listeners: ArcSwap::from_pointee(Vec::new()),
            events: tx,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Self::deliver(Arc::downgrade(&client), rx, client.shutdown.clone()));
        client
    }

    pub fn session_id(&self) -> u64 {
        self.session.load(Ordering::Acquire)
    }

    /// Drops the connection but keeps the session and its ephemeral nodes.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            info!(session = self.session_id(), "memory client disconnected");
            let _ = self.events.send(ClientEvent::StateChanged(ConnectionState::Disconnected));
        }
    }

    /// Drops the connection and the session: ephemeral nodes vanish.
    pub fn expire_session(&self) {
        self.disconnect();
        let old = self.session.swap(self.tree.new_session(), Ordering::AcqRel);
        info!(session = old, "memory client session expired");
        self.tree.expire(old);
    }

    pub fn reconnect(&self) {
        if !self.connected.swap(true, Ordering::AcqRel) {
            info!(session = self.session_id(), "memory client reconnected");
            let _ = self.events.send(ClientEvent::StateChanged(ConnectionState::Reconnected));
        }
    }

    pub fn child_listener_count(
        &self,
        path: &str,
    ) -> usize {
        self.child_listeners.get(path).map(|l| l.len()).unwrap_or(0)
    }

    fn ensure_usable(&self) -> ClientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        if !self.connected.load(Ordering::Acquire) {
            return Err(ClientError::ConnectionLoss);
        }
        Ok(())
    }

    async fn deliver(
        client: Weak<Self>,
        mut rx: mpsc::UnboundedReceiver<ClientEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let Some(this) = client.upgrade() else {
                break;
            };

            match event {
                ClientEvent::ChildrenChanged(path) => {
                    if !this.connected.load(Ordering::Acquire) {
                        trace!(%path, "dropping child event while disconnected");
                        continue;
                    }
                    let listeners = match this.child_listeners.get(&path) {
                        Some(l) => l.clone(),
                        None => continue,
                    };
                    let children = this.tree.children(&path).unwrap_or_default();
                    trace!(%path, ?children, listeners = listeners.len(), "delivering child event");
                    join_all(listeners.iter().map(|l| l.child_changed(&path, children.clone()))).await;
                }
                ClientEvent::StateChanged(state) => {
                    let listeners = this.state_listeners.load_full();
                    for listener in listeners.iter() {
                        listener.state_changed(state).await;
                    }
                }
            }
        }
        debug!("memory client delivery task stopped");
    }
}

impl Drop for MemoryWatchClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl WatchClient for MemoryWatchClient {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.connected.load(Ordering::Acquire)
    }

    async fn create(
        &self,
        path: &str,
        ephemeral: bool,
    ) -> ClientResult<()> {
        self.ensure_usable()?;
        let owner = if ephemeral { Some(self.session_id()) } else { None };
        self.tree.create(path, owner).map(|_| ())
    }

    async fn delete(
        &self,
        path: &str,
    ) -> ClientResult<()> {
        self.ensure_usable()?;
        self.tree.delete(path)
    }

    async fn add_child_listener(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> ClientResult<Vec<String>> {
        self.ensure_usable()?;
        {
            let mut listeners = self.child_listeners.entry(path.to_string()).or_default();
            if !listeners.iter().any(|l| same_listener(l, &listener)) {
                listeners.push(listener);
            }
        }
        self.tree.children(path)
    }

    async fn remove_child_listener(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> ClientResult<()> {
        if let Some(mut listeners) = self.child_listeners.get_mut(path) {
            listeners.retain(|l| !same_listener(l, &listener));
        }
        Ok(())
    }

    async fn get_children(
        &self,
        path: &str,
    ) -> ClientResult<Vec<String>> {
        self.ensure_usable()?;
        self.tree.children(path)
    }

    fn add_state_listener(
        &self,
        listener: Arc<dyn StateListener>,
    ) {
        self.state_listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(listener.clone());
            next
        });
    }

    async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.cancel();
        self.tree.expire(self.session_id());
        Ok(())
    }
}

/// Hands out [`MemoryWatchClient`] sessions on a shared tree.
pub struct MemoryTransporter {
    tree: Arc<MemoryTree>,
    last_client: Mutex<Option<Arc<MemoryWatchClient>>>,
}

impl MemoryTransporter {
    pub fn new(tree: Arc<MemoryTree>) -> Self {
        Self {
            tree,
            last_client: Mutex::new(None),
        }
    }

    pub fn tree(&self) -> &Arc<MemoryTree> {
        &self.tree
    }

    /// Most recently opened session, for driving connection-state changes.
    pub fn last_client(&self) -> Option<Arc<MemoryWatchClient>> {
        self.last_client.lock().clone()
    }
}

#[async_trait]
impl Transporter for MemoryTransporter {
    async fn connect(
        &self,
        registry_url: &ServiceUrl,
    ) -> Result<Arc<dyn WatchClient>> {
        debug!(addresses = ?connect_addresses(registry_url), "opening memory session");
        let client = MemoryWatchClient::connect(self.tree.clone());
        *self.last_client.lock() = Some(client.clone());
        Ok(client as Arc<dyn WatchClient>)
    }
}
