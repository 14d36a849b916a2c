use std::sync::Arc;

use tracing::debug;
use tracing::trace;

use super::path_codec::decode;
use super::path_codec::last_segment;
use crate::constants::EMPTY_PROTOCOL;
use crate::metrics::EMPTY_PLACEHOLDER_COUNTER;
use crate::DefaultUrlMatcher;
use crate::ServiceUrl;
use crate::UrlMatcher;

/// Turns raw child names into the url lists handed to subscribers.
#[derive(Clone)]
pub struct NotificationSynthesizer {
    matcher: Arc<dyn UrlMatcher>,
}

impl Default for NotificationSynthesizer {
    fn default() -> Self {
        Self::new(Arc::new(DefaultUrlMatcher))
    }
}

impl NotificationSynthesizer {
    pub fn new(matcher: Arc<dyn UrlMatcher>) -> Self {
        Self { matcher }
    }

    /// Decodes, parses and matches `raw` against `consumer`. Entries that do
    /// not decode or parse are skipped; input order is kept.
    pub fn to_urls_without_empty(
        &self,
        consumer: &ServiceUrl,
        raw: &[String],
    ) -> Vec<ServiceUrl> {
        raw.iter()
            .filter_map(|segment| match decode(segment) {
                Ok(decoded) => match decoded.parse::<ServiceUrl>() {
                    Ok(url) => Some(url),
                    Err(e) => {
                        trace!(%segment, %e, "skipping child that is not a url");
                        None
                    }
                },
                Err(e) => {
                    debug!(%segment, %e, "skipping undecodable child");
                    None
                }
            })
            .filter(|provider| self.matcher.is_match(consumer, provider))
            .collect()
    }

    /// Like [`Self::to_urls_without_empty`], but never empty: a category
    /// with no matching entries yields the placeholder from
    /// [`Self::empty_placeholder`].
    pub fn to_urls_with_empty(
        &self,
        consumer: &ServiceUrl,
        path: &str,
        raw: &[String],
    ) -> Vec<ServiceUrl> {
        let urls = self.to_urls_without_empty(consumer, raw);
        if !urls.is_empty() {
            return urls;
        }
        EMPTY_PLACEHOLDER_COUNTER.inc();
        vec![Self::empty_placeholder(consumer, path)]
    }

    /// `consumer` with protocol `empty` and `category` set to the last
    /// segment of `path`.
    pub fn empty_placeholder(
        consumer: &ServiceUrl,
        path: &str,
    ) -> ServiceUrl {
        consumer
            .with_protocol(EMPTY_PROTOCOL)
            .with_category(last_segment(path))
    }
}
