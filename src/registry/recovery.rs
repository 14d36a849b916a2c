use async_trait::async_trait;
use tracing::info;
use tracing::warn;

use super::Registry;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Runs when the watch client reports a reconnect.
#[async_trait]
pub trait RecoveryHook: Send + Sync + 'static {
    async fn recover(
        &self,
        registry: &Registry,
    ) -> Result<()>;
}

/// Re-applies every tracked registration, then every tracked subscription,
/// each retried under `policy`. One failing entry does not stop the others.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReapplyRecovery {
    policy: BackoffPolicy,
}

impl ReapplyRecovery {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl RecoveryHook for ReapplyRecovery {
    async fn recover(
        &self,
        registry: &Registry,
    ) -> Result<()> {
        let registered = registry.registered();
        let subscribed = registry.subscribed();
        info!(
            registered = registered.len(),
            subscribed = subscribed.len(),
            "recovering registry state after reconnect"
        );

        let mut failed = Vec::new();
        for url in &registered {
            if let Err(e) =
                task_with_timeout_and_exponential_backoff(|| registry.reapply_register(url), self.policy).await
            {
                warn!(%url, ?e, "re-register failed");
                failed.push(format!("register {}", url));
            }
        }

        for (url, listeners) in &subscribed {
            for listener in listeners {
                if let Err(e) =
                    task_with_timeout_and_exponential_backoff(|| registry.reapply_subscribe(url, listener), self.policy)
                        .await
                {
                    warn!(%url, ?e, "re-subscribe failed");
                    failed.push(format!("subscribe {}", url));
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Recovery(failed.join(", ")))
        }
    }
}
