//! Fluent construction of a [`Registry`].
//!
//! ```ignore
//! let registry = RegistryBuilder::new(RegistryConfig::new()?)
//!     .transporter(Arc::new(my_transporter))
//!     .build()
//!     .await?;
//! ```
//!
//! Only the transporter is mandatory. Matching defaults to
//! [`crate::DefaultUrlMatcher`], recovery to [`ReapplyRecovery`] with the
//! configured backoff, and the wildcard filter to `wildcard.service_filter`.

use std::sync::Arc;

use tracing::info;

use super::substring_filter;
use super::NotificationSynthesizer;
use super::ReapplyRecovery;
use super::RecoveryHook;
use super::Registry;
use super::ServiceNameFilter;
use crate::Error;
use crate::RegistryConfig;
use crate::Result;
use crate::Transporter;
use crate::UrlMatcher;

pub struct RegistryBuilder {
    pub(super) config: RegistryConfig,
    pub(super) transporter: Option<Arc<dyn Transporter>>,
    pub(super) matcher: Option<Arc<dyn UrlMatcher>>,
    pub(super) recovery: Option<Arc<dyn RecoveryHook>>,
    pub(super) service_filter: Option<ServiceNameFilter>,
}

impl RegistryBuilder {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            transporter: None,
            matcher: None,
            recovery: None,
            service_filter: None,
        }
    }

    /// Loads configuration from the usual sources, then merges
    /// `override_path` when given.
    pub fn from_sources(override_path: Option<&str>) -> Result<Self> {
        let mut config = RegistryConfig::new()?;
        if let Some(path) = override_path {
            info!("with_override_config from: {}", path);
            config = config.with_override_config(path)?;
        }
        Ok(Self::new(config))
    }

    pub fn transporter(
        mut self,
        transporter: Arc<dyn Transporter>,
    ) -> Self {
        self.transporter = Some(transporter);
        self
    }

    pub fn matcher(
        mut self,
        matcher: Arc<dyn UrlMatcher>,
    ) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn recovery(
        mut self,
        recovery: Arc<dyn RecoveryHook>,
    ) -> Self {
        self.recovery = Some(recovery);
        self
    }

    /// Overrides `wildcard.service_filter` with an arbitrary predicate.
    pub fn service_filter<F>(
        mut self,
        filter: F,
    ) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.service_filter = Some(Arc::new(filter));
        self
    }

    /// Validates the registry address, opens the client and wires the
    /// reconnect listener.
    pub async fn build(self) -> Result<Registry> {
        let registry_url = self.config.validate()?;
        let transporter = self
            .transporter
            .ok_or_else(|| Error::InvalidConfig("no transporter configured".to_string()))?;

        let client = transporter.connect(&registry_url).await?;

        let synthesizer = match self.matcher {
            Some(matcher) => NotificationSynthesizer::new(matcher),
            None => NotificationSynthesizer::default(),
        };
        let recovery = self
            .recovery
            .unwrap_or_else(|| Arc::new(ReapplyRecovery::new(self.config.recovery.backoff)) as Arc<dyn RecoveryHook>);
        let service_filter = self.service_filter.or_else(|| {
            self.config
                .wildcard
                .service_filter
                .clone()
                .filter(|needle| !needle.is_empty())
                .map(substring_filter)
        });

        Ok(Registry::assemble(
            registry_url,
            client,
            synthesizer,
            recovery,
            service_filter,
        ))
    }
}
