#[cfg(test)]
use mockall::automock;

use crate::constants::ANY_VALUE;
use crate::constants::CATEGORY_KEY;
use crate::constants::CLASSIFIER_KEY;
use crate::constants::DEFAULT_CATEGORY;
use crate::constants::ENABLED_KEY;
use crate::constants::GROUP_KEY;
use crate::constants::REMOVE_VALUE_PREFIX;
use crate::constants::VERSION_KEY;
use crate::ServiceUrl;

/// Decides whether a registered url is visible to a subscribing consumer.
#[cfg_attr(test, automock)]
pub trait UrlMatcher: Send + Sync + 'static {
    fn is_match(
        &self,
        consumer: &ServiceUrl,
        provider: &ServiceUrl,
    ) -> bool;
}

/// Interface, category, enabled flag, group, version and classifier rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultUrlMatcher;

impl UrlMatcher for DefaultUrlMatcher {
    fn is_match(
        &self,
        consumer: &ServiceUrl,
        provider: &ServiceUrl,
    ) -> bool {
        let consumer_interface = consumer.service_interface();
        if consumer_interface != ANY_VALUE && consumer_interface != provider.service_interface() {
            return false;
        }

        let consumer_categories = consumer.parameter(CATEGORY_KEY).unwrap_or_default();
        if !is_match_category(provider.category(), &consumer_categories) {
            return false;
        }

        let provider_enabled = provider
            .parameter(ENABLED_KEY)
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        if !provider_enabled && consumer.parameter(ENABLED_KEY).as_deref() != Some(ANY_VALUE) {
            return false;
        }

        let consumer_group = non_empty(consumer.parameter(GROUP_KEY));
        let provider_group = non_empty(provider.parameter(GROUP_KEY));
        let group_ok = consumer_group.as_deref() == Some(ANY_VALUE)
            || consumer_group == provider_group
            || match (&consumer_group, &provider_group) {
                (Some(list), Some(group)) => contains_item(list, group),
                _ => false,
            };

        let consumer_version = non_empty(consumer.parameter(VERSION_KEY));
        let provider_version = non_empty(provider.parameter(VERSION_KEY));
        let version_ok = consumer_version.as_deref() == Some(ANY_VALUE) || consumer_version == provider_version;

        let consumer_classifier = consumer.parameter_or(CLASSIFIER_KEY, ANY_VALUE);
        let provider_classifier = provider.parameter_or(CLASSIFIER_KEY, ANY_VALUE);
        let classifier_ok = consumer_classifier == ANY_VALUE || consumer_classifier == provider_classifier;

        group_ok && version_ok && classifier_ok
    }
}

/// `categories` is the consumer's comma list; `category` the provider's own.
pub(crate) fn is_match_category(
    category: &str,
    categories: &str,
) -> bool {
    if categories.is_empty() {
        return category == DEFAULT_CATEGORY;
    }

    let items: Vec<&str> = categories.split(',').map(str::trim).collect();
    if items.contains(&ANY_VALUE) {
        true
    } else if items.iter().any(|c| c.starts_with(REMOVE_VALUE_PREFIX)) {
        !items
            .iter()
            .any(|c| c.strip_prefix(REMOVE_VALUE_PREFIX) == Some(category))
    } else {
        items.contains(&category)
    }
}

fn contains_item(
    list: &str,
    value: &str,
) -> bool {
    list.split(',').map(str::trim).any(|item| item == value)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
