use std::sync::Arc;

use dashmap::DashSet;
use tracing::debug;
use tracing::warn;

use super::path_codec::decode;
use crate::constants::ANY_VALUE;
use crate::ServiceUrl;

/// Predicate applied to service names on the first expansion of a wildcard
/// subscription.
pub type ServiceNameFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Substring filter, as configured through `wildcard.service_filter`.
pub fn substring_filter(needle: impl Into<String>) -> ServiceNameFilter {
    let needle = needle.into();
    Arc::new(move |name: &str| name.contains(needle.as_str()))
}

/// Service names already expanded by a wildcard subscription. Grows only.
#[derive(Debug, Default)]
pub struct AnyServicesSet {
    names: DashSet<String>,
}

impl AnyServicesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `name` was not recorded before.
    pub fn record(
        &self,
        name: &str,
    ) -> bool {
        self.names.insert(name.to_string())
    }

    #[cfg(test)]
    pub(crate) fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.names.contains(name)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Sorted snapshot.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().map(|n| n.key().clone()).collect();
        names.sort();
        names
    }
}

/// Turns the root's child list into the service names a wildcard
/// subscription has not seen yet.
pub struct WildcardExpander<'a> {
    seen: &'a AnyServicesSet,
    filter: Option<&'a ServiceNameFilter>,
}

impl<'a> WildcardExpander<'a> {
    pub fn new(
        seen: &'a AnyServicesSet,
        filter: Option<&'a ServiceNameFilter>,
    ) -> Self {
        Self { seen, filter }
    }

    /// Expansion of the child list read when the wildcard subscription is
    /// installed. The name filter applies here only.
    pub fn expand_initial(
        &self,
        raw: &[String],
    ) -> Vec<String> {
        self.expand_with(raw, self.filter)
    }

    /// Expansion of a later child-change notification.
    pub fn expand(
        &self,
        raw: &[String],
    ) -> Vec<String> {
        self.expand_with(raw, None)
    }

    fn expand_with(
        &self,
        raw: &[String],
        filter: Option<&ServiceNameFilter>,
    ) -> Vec<String> {
        let mut fresh = Vec::new();
        for segment in raw {
            let name = match decode(segment) {
                Ok(name) => name,
                Err(e) => {
                    warn!(%segment, %e, "skipping undecodable service name");
                    continue;
                }
            };
            if name == ANY_VALUE {
                continue;
            }
            if let Some(filter) = filter {
                if !filter(&name) {
                    debug!(%name, "service filtered out of wildcard expansion");
                    continue;
                }
            }
            if self.seen.record(&name) {
                fresh.push(name);
            }
        }
        fresh
    }

    /// Concrete subscription for `name` derived from the wildcard `pattern`.
    /// Derived subscriptions never fail startup checks.
    pub fn derive_subscription(
        pattern: &ServiceUrl,
        name: &str,
    ) -> ServiceUrl {
        pattern.with_path(name).with_interface(name).with_check(false)
    }
}
