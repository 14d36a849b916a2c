use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::ANYHOST_KEY;
use crate::constants::ANYHOST_VALUE;
use crate::constants::ANY_VALUE;
use crate::constants::CATEGORY_KEY;
use crate::constants::CHECK_KEY;
use crate::constants::DEFAULT_CATEGORY;
use crate::constants::DYNAMIC_KEY;
use crate::constants::GROUP_KEY;
use crate::constants::INTERFACE_KEY;
use crate::constants::PROTOCOL_SEPARATOR;
use crate::UrlError;

/// URL parameters.
///
/// The keys the registry interprets are kept as named fields; everything else
/// is carried untouched in `extensions`. A `dynamic` or `check` value other
/// than `true`/`false` is read as `false` and its text is kept in
/// `extensions`, so the url prints back as it was parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlParameters {
    pub group: Option<String>,
    pub category: Option<String>,
    pub dynamic: Option<bool>,
    pub check: Option<bool>,
    pub interface: Option<String>,
    pub extensions: BTreeMap<String, String>,
}

impl UrlParameters {
    /// Raw string value of `key`, recognized or not.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<String> {
        match key {
            GROUP_KEY => self.group.clone(),
            CATEGORY_KEY => self.category.clone(),
            DYNAMIC_KEY => self.flag_text(key, self.dynamic),
            CHECK_KEY => self.flag_text(key, self.check),
            INTERFACE_KEY => self.interface.clone(),
            _ => self.extensions.get(key).cloned(),
        }
    }

    pub fn set(
        &mut self,
        key: &str,
        value: &str,
    ) {
        match key {
            GROUP_KEY => self.group = Some(value.to_string()),
            CATEGORY_KEY => self.category = Some(value.to_string()),
            DYNAMIC_KEY => self.dynamic = self.set_flag(key, value),
            CHECK_KEY => self.check = self.set_flag(key, value),
            INTERFACE_KEY => self.interface = Some(value.to_string()),
            _ => {
                self.extensions.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn remove(
        &mut self,
        key: &str,
    ) {
        match key {
            GROUP_KEY => self.group = None,
            CATEGORY_KEY => self.category = None,
            DYNAMIC_KEY => {
                self.dynamic = None;
                self.extensions.remove(key);
            }
            CHECK_KEY => {
                self.check = None;
                self.extensions.remove(key);
            }
            INTERFACE_KEY => self.interface = None,
            _ => {
                self.extensions.remove(key);
            }
        }
    }

    fn flag_text(
        &self,
        key: &str,
        value: Option<bool>,
    ) -> Option<String> {
        self.extensions
            .get(key)
            .cloned()
            .or_else(|| value.map(|b| b.to_string()))
    }

    fn set_flag(
        &mut self,
        key: &str,
        value: &str,
    ) -> Option<bool> {
        let flag = parse_flag(value);
        if value.is_empty() || value == "true" || value == "false" {
            self.extensions.remove(key);
        } else {
            self.extensions.insert(key.to_string(), value.to_string());
        }
        flag
    }

    pub fn is_empty(&self) -> bool {
        self.to_sorted().is_empty()
    }

    /// All parameters, recognized keys included, ordered by key.
    pub fn to_sorted(&self) -> BTreeMap<&str, String> {
        let mut all: BTreeMap<&str, String> = self
            .extensions
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        for key in [GROUP_KEY, CATEGORY_KEY, DYNAMIC_KEY, CHECK_KEY, INTERFACE_KEY] {
            if let Some(v) = self.get(key) {
                all.insert(key, v);
            }
        }
        all
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    if value.is_empty() {
        None
    } else {
        Some(value.trim().eq_ignore_ascii_case("true"))
    }
}

/// Immutable service descriptor: `protocol://host[:port]/path?k=v&...`.
///
/// The canonical string returned by [`ServiceUrl::full_string`] is the
/// identity of a url; two urls are equal exactly when their canonical strings
/// are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceUrl {
    protocol: String,
    host: String,
    port: u16,
    path: String,
    parameters: UrlParameters,
}

impl ServiceUrl {
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            path: path.into().trim_start_matches('/').to_string(),
            parameters: UrlParameters::default(),
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parameters(&self) -> &UrlParameters {
        &self.parameters
    }

    /// `host:port`, or just the host when no port is set.
    pub fn address(&self) -> String {
        if self.port == 0 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn parameter(
        &self,
        key: &str,
    ) -> Option<String> {
        self.parameters.get(key)
    }

    /// Parameter value, with `default` standing in for a missing or empty one.
    pub fn parameter_or(
        &self,
        key: &str,
        default: &str,
    ) -> String {
        match self.parameters.get(key) {
            Some(v) if !v.is_empty() => v,
            _ => default.to_string(),
        }
    }

    /// The `interface` parameter, falling back to the path.
    pub fn service_interface(&self) -> &str {
        match self.parameters.interface.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.path,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.service_interface() == ANY_VALUE
    }

    pub fn category(&self) -> &str {
        match self.parameters.category.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => DEFAULT_CATEGORY,
        }
    }

    /// Ephemeral registration unless `dynamic=false`.
    pub fn is_dynamic(&self) -> bool {
        self.parameters.dynamic.unwrap_or(true)
    }

    pub fn check(&self) -> bool {
        self.parameters.check.unwrap_or(true)
    }

    pub fn is_any_host(&self) -> bool {
        self.host == ANYHOST_VALUE
            || self
                .parameters
                .get(ANYHOST_KEY)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
    }

    /// Canonical string form; parameters are emitted sorted by key.
    pub fn full_string(&self) -> String {
        let mut buf = String::with_capacity(64);
        buf.push_str(&self.protocol);
        buf.push_str(PROTOCOL_SEPARATOR);
        buf.push_str(&self.host);
        if self.port != 0 {
            buf.push(':');
            buf.push_str(&self.port.to_string());
        }
        if !self.path.is_empty() {
            buf.push('/');
            buf.push_str(&self.path);
        }
        let params = self.parameters.to_sorted();
        if !params.is_empty() {
            buf.push('?');
            let pairs: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            buf.push_str(&pairs.join("&"));
        }
        buf
    }

    pub fn with_protocol(
        &self,
        protocol: &str,
    ) -> Self {
        let mut url = self.clone();
        url.protocol = protocol.to_string();
        url
    }

    pub fn with_path(
        &self,
        path: &str,
    ) -> Self {
        let mut url = self.clone();
        url.path = path.trim_start_matches('/').to_string();
        url
    }

    pub fn with_parameter(
        &self,
        key: &str,
        value: &str,
    ) -> Self {
        let mut url = self.clone();
        url.parameters.set(key, value);
        url
    }

    pub fn without_parameter(
        &self,
        key: &str,
    ) -> Self {
        let mut url = self.clone();
        url.parameters.remove(key);
        url
    }

    pub fn with_interface(
        &self,
        interface: &str,
    ) -> Self {
        self.with_parameter(INTERFACE_KEY, interface)
    }

    pub fn with_category(
        &self,
        category: &str,
    ) -> Self {
        self.with_parameter(CATEGORY_KEY, category)
    }

    pub fn with_check(
        &self,
        check: bool,
    ) -> Self {
        let mut url = self.clone();
        url.parameters.check = Some(check);
        url.parameters.extensions.remove(CHECK_KEY);
        url
    }

    pub fn with_dynamic(
        &self,
        dynamic: bool,
    ) -> Self {
        let mut url = self.clone();
        url.parameters.dynamic = Some(dynamic);
        url.parameters.extensions.remove(DYNAMIC_KEY);
        url
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.full_string())
    }
}

impl FromStr for ServiceUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UrlError::Empty);
        }

        let (protocol, rest) = s
            .split_once(PROTOCOL_SEPARATOR)
            .ok_or_else(|| UrlError::MissingProtocol(s.to_string()))?;
        if protocol.is_empty() {
            return Err(UrlError::MissingProtocol(s.to_string()));
        }

        let (rest, query) = match rest.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };
        let (host, port) = split_host_port(authority).ok_or_else(|| UrlError::InvalidPort(s.to_string()))?;

        let mut url = ServiceUrl::new(protocol, host, port, path);
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                if key.is_empty() {
                    continue;
                }
                url.parameters.set(key, value);
            }
        }
        Ok(url)
    }
}

/// Splits `host[:port]`, accepting bracketed IPv6 hosts.
fn split_host_port(authority: &str) -> Option<(String, u16)> {
    if let Some(stripped) = authority.strip_prefix('[') {
        let (host, rest) = stripped.split_once(']')?;
        let port = match rest.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None if rest.is_empty() => 0,
            None => return None,
        };
        return Some((format!("[{}]", host), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), 0)),
    }
}
