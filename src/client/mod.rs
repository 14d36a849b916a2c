//! Contract between the registry and the coordination-service client.
//!
//! The registry never talks to a coordination service directly. It consumes a
//! [`WatchClient`] obtained from a [`Transporter`], and receives child-list
//! changes and connection-state transitions through [`ChildListener`] and
//! [`StateListener`] callbacks. Watch delivery is at-least-once and ordered
//! per path; nothing is ordered across paths.

mod memory;
pub use memory::*;


use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::ClientError;
use crate::Result;
use crate::ServiceUrl;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Connection-state transitions delivered to [`StateListener`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// Connection re-established after a loss; triggers recovery
    Reconnected,
}

/// Receives the current child names of a watched path.
#[async_trait]
pub trait ChildListener: Send + Sync + 'static {
    async fn child_changed(
        &self,
        parent_path: &str,
        children: Vec<String>,
    );
}

#[async_trait]
pub trait StateListener: Send + Sync + 'static {
    async fn state_changed(
        &self,
        state: ConnectionState,
    );
}

/// Identity comparison for shared listener handles.
pub fn same_listener(
    a: &Arc<dyn ChildListener>,
    b: &Arc<dyn ChildListener>,
) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait WatchClient: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Creates `path` and any missing parents. An existing node is not an
    /// error.
    async fn create(
        &self,
        path: &str,
        ephemeral: bool,
    ) -> ClientResult<()>;

    /// Deletes `path`. A missing node is not an error.
    async fn delete(
        &self,
        path: &str,
    ) -> ClientResult<()>;

    /// Installs `listener` for future child changes of `path` and returns the
    /// current children. Installing the same listener twice is a no-op.
    async fn add_child_listener(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> ClientResult<Vec<String>>;

    async fn remove_child_listener(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> ClientResult<()>;

    /// One-shot read, no watch installed.
    async fn get_children(
        &self,
        path: &str,
    ) -> ClientResult<Vec<String>>;

    fn add_state_listener(
        &self,
        listener: Arc<dyn StateListener>,
    );

    async fn close(&self) -> ClientResult<()>;
}

/// Opens a [`WatchClient`] for a registry url.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transporter: Send + Sync + 'static {
    async fn connect(
        &self,
        registry_url: &ServiceUrl,
    ) -> Result<Arc<dyn WatchClient>>;
}
