//! Mapping between service urls and node paths.
//!
//! ```text
//! /{root}/{encode(interface)}/{category}/{encode(full url)}
//! ```

use crate::constants::ALL_CATEGORIES;
use crate::constants::ANY_VALUE;
use crate::constants::CATEGORY_KEY;
use crate::constants::DEFAULT_CATEGORY;
use crate::constants::DEFAULT_ROOT;
use crate::constants::GROUP_KEY;
use crate::constants::REMOVE_VALUE_PREFIX;
use crate::ServiceUrl;
use crate::UrlError;

/// Percent-encodes `value` into a single path segment.
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Inverse of [`encode`]. Rejects bad escapes instead of passing them
/// through.
pub fn decode(segment: &str) -> Result<String, UrlError> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = i + 2 < bytes.len()
                &&bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(UrlError::Decode(segment.to_string()));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|_| UrlError::Decode(segment.to_string()))
}

/// Text after the last `/`, or the whole path when there is none.
pub fn last_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCodec {
    root: String,
}

impl PathCodec {
    /// `group` becomes the root node; a missing or empty group means
    /// `/dubbo`.
    pub fn new(group: Option<&str>) -> Self {
        let group = match group {
            Some(g) if !g.is_empty() => g,
            _ => DEFAULT_ROOT,
        };
        let root = if group.starts_with('/') {
            group.to_string()
        } else {
            format!("/{}", group)
        };
        Self { root }
    }

    pub fn from_registry_url(registry_url: &ServiceUrl) -> Self {
        Self::new(registry_url.parameter(GROUP_KEY).as_deref())
    }

    pub fn root_path(&self) -> &str {
        &self.root
    }

    fn root_dir(&self) -> String {
        if self.root == "/" {
            self.root.clone()
        } else {
            format!("{}/", self.root)
        }
    }

    pub fn service_path(
        &self,
        url: &ServiceUrl,
    ) -> String {
        let name = url.service_interface();
        if name == ANY_VALUE {
            self.root.clone()
        } else {
            format!("{}{}", self.root_dir(), encode(name))
        }
    }

    /// Categories a subscription watches, in order.
    pub fn categories(url: &ServiceUrl) -> Vec<String> {
        let raw = url.parameter(CATEGORY_KEY).unwrap_or_default();
        if raw.trim() == ANY_VALUE {
            return ALL_CATEGORIES.iter().map(|c| c.to_string()).collect();
        }

        // removal markers only narrow matching, they are not nodes
        let categories: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.starts_with(REMOVE_VALUE_PREFIX))
            .map(str::to_string)
            .collect();
        if categories.is_empty() {
            vec![DEFAULT_CATEGORY.to_string()]
        } else {
            categories
        }
    }

    pub fn category_paths(
        &self,
        url: &ServiceUrl,
    ) -> Vec<String> {
        let service_path = self.service_path(url);
        Self::categories(url)
            .into_iter()
            .map(|category| format!("{}/{}", service_path, category))
            .collect()
    }

    pub fn category_path(
        &self,
        url: &ServiceUrl,
    ) -> String {
        format!("{}/{}", self.service_path(url), url.category())
    }

    pub fn url_path(
        &self,
        url: &ServiceUrl,
    ) -> String {
        format!("{}/{}", self.category_path(url), encode(&url.full_string()))
    }

    /// Paths a subscription installs its callback on: the root for a
    /// wildcard, the category paths otherwise.
    pub fn watched_paths(
        &self,
        url: &ServiceUrl,
    ) -> Vec<String> {
        if url.is_wildcard() {
            vec![self.root.clone()]
        } else {
            self.category_paths(url)
        }
    }
}
