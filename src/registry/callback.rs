use std::sync::Weak;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::facade::RegistryInner;
use super::ListenerHandle;
use crate::ChildListener;
use crate::ServiceUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackMode {
    /// Installed on category paths; forwards url lists
    Concrete,
    /// Installed on the root; expands new service names
    Wildcard,
}

/// Child listener bound to one (subscription, subscriber) pair.
///
/// Once deactivated it never notifies again. Deactivation takes the write
/// side of `active`, so it also waits for a notify already in progress.
pub(crate) struct WatchCallback {
    subscription: ServiceUrl,
    listener: ListenerHandle,
    mode: CallbackMode,
    active: RwLock<bool>,
    registry: Weak<RegistryInner>,
}

impl WatchCallback {
    pub(crate) fn new(
        subscription: ServiceUrl,
        listener: ListenerHandle,
        mode: CallbackMode,
        registry: Weak<RegistryInner>,
    ) -> Self {
        Self {
            subscription,
            listener,
            mode,
            active: RwLock::new(true),
            registry,
        }
    }

    pub(crate) fn subscription(&self) -> &ServiceUrl {
        &self.subscription
    }

    pub(crate) fn listener(&self) -> &ListenerHandle {
        &self.listener
    }

    pub(crate) fn mode(&self) -> CallbackMode {
        self.mode
    }

    pub(crate) fn is_active(&self) -> bool {
        *self.active.read()
    }

    pub(crate) fn deactivate(&self) {
        *self.active.write() = false;
    }

    /// Forwards `urls` unless deactivated. Returns whether the subscriber was
    /// called.
    pub(crate) fn notify(
        &self,
        urls: Vec<ServiceUrl>,
    ) -> bool {
        let active = self.active.read();
        if !*active {
            return false;
        }
        self.listener.notify(urls);
        true
    }
}

#[async_trait]
impl ChildListener for WatchCallback {
    async fn child_changed(
        &self,
        parent_path: &str,
        children: Vec<String>,
    ) {
        if let Some(registry) = self.registry.upgrade() {
            registry.dispatch(self, parent_path, children).await;
        }
    }
}
