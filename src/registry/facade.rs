use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::DashSet;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::AnyServicesSet;
use super::CallbackMode;
use super::ListenerHandle;
use super::ListenerKey;
use super::ListenerMultiplexer;
use super::NotificationSynthesizer;
use super::PathCodec;
use super::RecoveryHook;
use super::ServiceNameFilter;
use super::WatchCallback;
use super::WildcardExpander;
use crate::metrics::NOTIFY_COUNTER;
use crate::metrics::RECOVERY_COUNTER;
use crate::metrics::REMOTE_FAILURE_COUNTER;
use crate::metrics::WILDCARD_EXPANSION_COUNTER;
use crate::ChildListener;
use crate::ClientError;
use crate::ConnectionState;
use crate::Error;
use crate::Result;
use crate::ServiceUrl;
use crate::StateListener;
use crate::WatchClient;

/// Registry adapter over a [`WatchClient`].
///
/// Cheap to clone; clones share state. Built with
/// [`crate::RegistryBuilder`].
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    registry_url: ServiceUrl,
    paths: PathCodec,
    client: Arc<dyn WatchClient>,
    multiplexer: ListenerMultiplexer<ListenerKey, WatchCallback>,
    any_services: AnyServicesSet,
    service_filter: Option<ServiceNameFilter>,
    synthesizer: NotificationSynthesizer,
    recovery: Arc<dyn RecoveryHook>,

    // what the caller asked for, re-applied on reconnect
    registered: DashSet<ServiceUrl>,
    subscribed: DashMap<ServiceUrl, HashSet<ListenerHandle>>,

    destroyed: AtomicBool,
}

impl Registry {
    pub(crate) fn assemble(
        registry_url: ServiceUrl,
        client: Arc<dyn WatchClient>,
        synthesizer: NotificationSynthesizer,
        recovery: Arc<dyn RecoveryHook>,
        service_filter: Option<ServiceNameFilter>,
    ) -> Self {
        let inner = Arc::new(RegistryInner {
            paths: PathCodec::from_registry_url(&registry_url),
            registry_url,
            client,
            multiplexer: ListenerMultiplexer::new(),
            any_services: AnyServicesSet::new(),
            service_filter,
            synthesizer,
            recovery,
            registered: DashSet::new(),
            subscribed: DashMap::new(),
            destroyed: AtomicBool::new(false),
        });

        inner.client.add_state_listener(Arc::new(ReconnectListener {
            registry: Arc::downgrade(&inner),
        }));
        info!(registry = %inner.registry_url, root = inner.paths.root_path(), "registry ready");

        Self { inner }
    }

    pub fn url(&self) -> &ServiceUrl {
        &self.inner.registry_url
    }

    pub fn root_path(&self) -> &str {
        self.inner.paths.root_path()
    }

    /// Connected and not destroyed.
    pub fn is_available(&self) -> bool {
        !self.inner.is_destroyed() && self.inner.client.is_connected()
    }

    /// Publishes `url` under its category node: ephemeral unless
    /// `dynamic=false`.
    pub async fn register(
        &self,
        url: &ServiceUrl,
    ) -> Result<()> {
        self.inner.ensure_alive()?;
        self.inner.registered.insert(url.clone());
        self.inner.do_register(url).await
    }

    pub async fn unregister(
        &self,
        url: &ServiceUrl,
    ) -> Result<()> {
        self.inner.ensure_alive()?;
        self.inner.registered.remove(url);
        self.inner.do_unregister(url).await
    }

    /// Watches `url`'s categories (or, for interface `*`, every service) and
    /// delivers the current list to `listener` once before returning.
    pub async fn subscribe(
        &self,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) -> Result<()> {
        self.inner.ensure_alive()?;
        self.inner.track_subscription(url, listener);
        self.inner.do_subscribe(url, listener).await
    }

    /// After this returns, `listener` receives nothing more for `url`.
    pub async fn unsubscribe(
        &self,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) -> Result<()> {
        self.inner.ensure_alive()?;
        self.inner.untrack_subscription(url, listener);
        self.inner.do_unsubscribe(url, listener).await
    }

    /// One-shot read of the matching urls across `url`'s categories. No
    /// watch is installed and no placeholder is synthesized.
    pub async fn lookup(
        &self,
        url: Option<&ServiceUrl>,
    ) -> Result<Vec<ServiceUrl>> {
        let url = url.ok_or_else(|| Error::IllegalArgument("lookup url == null".to_string()))?;
        self.inner.ensure_alive()?;
        self.inner.do_lookup(url).await
    }

    /// Withdraws dynamic registrations, drops all subscriptions and closes
    /// the client. Later calls are no-ops.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(registry = %self.inner.registry_url, "destroying registry");

        for url in self.registered() {
            if !url.is_dynamic() {
                continue;
            }
            if let Err(e) = self.inner.do_unregister(&url).await {
                warn!(%url, %e, "failed to unregister on destroy");
            }
        }
        for (url, listeners) in self.subscribed() {
            for listener in listeners {
                if let Err(e) = self.inner.do_unsubscribe(&url, &listener).await {
                    warn!(%url, %e, "failed to unsubscribe on destroy");
                }
            }
        }
        self.inner.registered.clear();
        self.inner.subscribed.clear();

        if let Err(e) = self.inner.client.close().await {
            warn!(registry = %self.inner.registry_url, %e, "failed to close registry client");
        }
    }

    /// Urls registered through this registry and not unregistered since.
    pub fn registered(&self) -> Vec<ServiceUrl> {
        let mut urls: Vec<ServiceUrl> = self.inner.registered.iter().map(|u| u.key().clone()).collect();
        urls.sort();
        urls
    }

    /// Active subscriptions, derived wildcard expansions included.
    pub fn subscribed(&self) -> Vec<(ServiceUrl, Vec<ListenerHandle>)> {
        let mut entries: Vec<(ServiceUrl, Vec<ListenerHandle>)> = self
            .inner
            .subscribed
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().iter().cloned().collect()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Service names expanded so far by wildcard subscriptions.
    pub fn discovered_services(&self) -> Vec<String> {
        self.inner.any_services.names()
    }

    /// Re-creates the node for `url` without touching bookkeeping.
    pub async fn reapply_register(
        &self,
        url: &ServiceUrl,
    ) -> Result<()> {
        self.inner.do_register(url).await
    }

    /// Re-installs the watches for (`url`, `listener`) without touching
    /// bookkeeping. The subscriber receives a fresh full list.
    pub async fn reapply_subscribe(
        &self,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) -> Result<()> {
        self.inner.do_subscribe(url, listener).await
    }
}

impl RegistryInner {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.registry_url.full_string()));
        }
        Ok(())
    }

    fn remote_error(
        &self,
        operation: &'static str,
        url: &ServiceUrl,
        source: ClientError,
    ) -> Error {
        REMOTE_FAILURE_COUNTER.with_label_values(&[operation]).inc();
        Error::RemoteOperation {
            operation,
            url: url.full_string(),
            registry: self.registry_url.full_string(),
            source,
        }
    }

    fn track_subscription(
        &self,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) {
        self.subscribed.entry(url.clone()).or_default().insert(listener.clone());
    }

    fn untrack_subscription(
        &self,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) {
        {
            if let Some(mut listeners) = self.subscribed.get_mut(url) {
                listeners.remove(listener);
            }
        }
        self.subscribed.remove_if(url, |_, listeners| listeners.is_empty());
    }

    async fn do_register(
        &self,
        url: &ServiceUrl,
    ) -> Result<()> {
        let path = self.paths.url_path(url);
        debug!(%path, ephemeral = url.is_dynamic(), "register");
        self.client
            .create(&path, url.is_dynamic())
            .await
            .map_err(|e| self.remote_error("register", url, e))
    }

    async fn do_unregister(
        &self,
        url: &ServiceUrl,
    ) -> Result<()> {
        let path = self.paths.url_path(url);
        debug!(%path, "unregister");
        self.client
            .delete(&path)
            .await
            .map_err(|e| self.remote_error("unregister", url, e))
    }

    async fn do_subscribe(
        self: &Arc<Self>,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) -> Result<()> {
        if url.is_wildcard() {
            self.subscribe_wildcard(url, listener).await
        } else {
            self.subscribe_concrete(url, listener).await
        }
    }

    fn attach(
        self: &Arc<Self>,
        url: &ServiceUrl,
        listener: &ListenerHandle,
        mode: CallbackMode,
    ) -> Arc<WatchCallback> {
        let registry = Arc::downgrade(self);
        self.multiplexer.attach(&url.full_string(), &listener.key(), || {
            WatchCallback::new(url.clone(), listener.clone(), mode, registry)
        })
    }

    async fn subscribe_wildcard(
        self: &Arc<Self>,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) -> Result<()> {
        let root = self.paths.root_path().to_string();
        let callback = self.attach(url, listener, CallbackMode::Wildcard);

        self.client
            .create(&root, false)
            .await
            .map_err(|e| self.remote_error("subscribe", url, e))?;
        let services = self
            .client
            .add_child_listener(&root, callback.clone() as Arc<dyn ChildListener>)
            .await
            .map_err(|e| self.remote_error("subscribe", url, e))?;
        if !callback.is_active() {
            self.withdraw(url, &callback, &[root]).await;
            return Ok(());
        }

        let names = WildcardExpander::new(&self.any_services, self.service_filter.as_ref()).expand_initial(&services);
        debug!(%root, total = services.len(), new = names.len(), "wildcard subscription installed");
        self.subscribe_expanded(url, listener, names).await;
        Ok(())
    }

    /// Subscribes `listener` to each derived service. Failures are logged:
    /// one bad service must not block the rest.
    async fn subscribe_expanded(
        self: &Arc<Self>,
        pattern: &ServiceUrl,
        listener: &ListenerHandle,
        names: Vec<String>,
    ) {
        for name in names {
            let derived = WildcardExpander::derive_subscription(pattern, &name);
            WILDCARD_EXPANSION_COUNTER.inc();
            self.track_subscription(&derived, listener);
            if let Err(e) = self.subscribe_concrete(&derived, listener).await {
                warn!(service = %name, %e, "derived subscription failed");
            }
        }
    }

    async fn subscribe_concrete(
        self: &Arc<Self>,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) -> Result<()> {
        let callback = self.attach(url, listener, CallbackMode::Concrete);

        let mut urls = Vec::new();
        let mut installed = Vec::new();
        for path in self.paths.category_paths(url) {
            self.client
                .create(&path, false)
                .await
                .map_err(|e| self.remote_error("subscribe", url, e))?;
            let children = self
                .client
                .add_child_listener(&path, callback.clone() as Arc<dyn ChildListener>)
                .await
                .map_err(|e| self.remote_error("subscribe", url, e))?;
            urls.extend(self.synthesizer.to_urls_with_empty(url, &path, &children));
            installed.push(path);
            if !callback.is_active() {
                self.withdraw(url, &callback, &installed).await;
                return Ok(());
            }
        }

        debug!(subscription = %url, count = urls.len(), "initial notify");
        if callback.notify(urls) {
            NOTIFY_COUNTER.with_label_values(&["subscribe"]).inc();
        }
        Ok(())
    }

    /// Takes `callback` off `paths` when an unsubscribe detached it while
    /// its watches were still being installed.
    async fn withdraw(
        &self,
        url: &ServiceUrl,
        callback: &Arc<WatchCallback>,
        paths: &[String],
    ) {
        debug!(subscription = %url, "unsubscribed while installing, withdrawing watches");
        for path in paths {
            if let Err(e) = self
                .client
                .remove_child_listener(path, callback.clone() as Arc<dyn ChildListener>)
                .await
            {
                warn!(%path, %e, "failed to withdraw watch");
            }
        }
    }

    async fn do_unsubscribe(
        &self,
        url: &ServiceUrl,
        listener: &ListenerHandle,
    ) -> Result<()> {
        let Some(callback) = self.multiplexer.detach(&url.full_string(), &listener.key()) else {
            debug!(subscription = %url, "unsubscribe without matching subscribe");
            return Ok(());
        };
        callback.deactivate();

        for path in self.paths.watched_paths(url) {
            self.client
                .remove_child_listener(&path, callback.clone() as Arc<dyn ChildListener>)
                .await
                .map_err(|e| self.remote_error("unsubscribe", url, e))?;
        }
        Ok(())
    }

    async fn do_lookup(
        &self,
        url: &ServiceUrl,
    ) -> Result<Vec<ServiceUrl>> {
        let mut raw = Vec::new();
        for path in self.paths.category_paths(url) {
            match self.client.get_children(&path).await {
                Ok(children) => raw.extend(children),
                Err(ClientError::NoNode(_)) => {}
                Err(e) => return Err(self.remote_error("lookup", url, e)),
            }
        }
        Ok(self.synthesizer.to_urls_without_empty(url, &raw))
    }

    /// Entry point for watch deliveries.
    pub(crate) async fn dispatch(
        self: &Arc<Self>,
        callback: &WatchCallback,
        parent_path: &str,
        children: Vec<String>,
    ) {
        match callback.mode() {
            CallbackMode::Concrete => {
                let urls = self
                    .synthesizer
                    .to_urls_with_empty(callback.subscription(), parent_path, &children);
                if callback.notify(urls) {
                    NOTIFY_COUNTER.with_label_values(&["watch"]).inc();
                }
            }
            CallbackMode::Wildcard => {
                if !callback.is_active() {
                    return;
                }
                let names = WildcardExpander::new(&self.any_services, None).expand(&children);
                if names.is_empty() {
                    return;
                }
                debug!(%parent_path, new = names.len(), "new services under wildcard root");
                self.subscribe_expanded(callback.subscription(), callback.listener(), names)
                    .await;
            }
        }
    }
}

/// Runs the recovery hook when the client reconnects.
struct ReconnectListener {
    registry: Weak<RegistryInner>,
}

#[async_trait]
impl StateListener for ReconnectListener {
    async fn state_changed(
        &self,
        state: ConnectionState,
    ) {
        if state != ConnectionState::Reconnected {
            debug!(?state, "connection state changed");
            return;
        }
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        if inner.is_destroyed() {
            return;
        }

        let hook = inner.recovery.clone();
        let registry = Registry { inner };
        match hook.recover(&registry).await {
            Ok(()) => {
                RECOVERY_COUNTER.with_label_values(&["success"]).inc();
                info!(registry = %registry.url(), "recovery completed");
            }
            Err(e) => {
                RECOVERY_COUNTER.with_label_values(&["failure"]).inc();
                error!(registry = %registry.url(), %e, "recovery failed");
            }
        }
    }
}
