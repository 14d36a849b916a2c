use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Two-level map `subscription key -> listener key -> callback`.
///
/// Gives every (subscription, listener) pair exactly one callback object, so
/// the watch client sees the same identity on repeated subscribes and on the
/// final detach.
pub struct ListenerMultiplexer<K, C> {
    bindings: DashMap<String, Arc<DashMap<K, Arc<C>>>>,
}

impl<K, C> Default for ListenerMultiplexer<K, C>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }
}

impl<K, C> ListenerMultiplexer<K, C>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the callback for the pair, building it with `factory` only when
    /// none exists. Concurrent attaches for the same pair observe one callback.
    pub fn attach<F>(
        &self,
        subscription: &str,
        listener: &K,
        factory: F,
    ) -> Arc<C>
    where
        F: FnOnce() -> C,
    {
        let inner = self
            .bindings
            .entry(subscription.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();

        let callback = inner
            .entry(listener.clone())
            .or_insert_with(|| Arc::new(factory()))
            .clone();
        callback
    }

    #[cfg(test)]
    pub(crate) fn get(
        &self,
        subscription: &str,
        listener: &K,
    ) -> Option<Arc<C>> {
        let inner = self.bindings.get(subscription)?.clone();
        let callback = inner.get(listener).map(|c| c.clone());
        callback
    }

    /// Removes and returns the pair's callback. The per-subscription map
    /// stays in place.
    pub fn detach(
        &self,
        subscription: &str,
        listener: &K,
    ) -> Option<Arc<C>> {
        let inner = self.bindings.get(subscription)?.clone();
        let removed = inner.remove(listener).map(|(_, callback)| callback);
        removed
    }

    #[cfg(test)]
    pub(crate) fn listener_count(
        &self,
        subscription: &str,
    ) -> usize {
        self.bindings.get(subscription).map(|inner| inner.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        self.bindings.len()
    }
}
