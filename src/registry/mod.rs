//! Service registry over a hierarchical watchable key space.
//!
//! Registrations are stored as nodes
//! `/{root}/{service}/{category}/{encoded url}`. Subscriptions install child
//! listeners on the category nodes (or on the root for a wildcard
//! subscription) and turn every change into a full url list for the
//! subscriber, using an `empty://` placeholder for categories that have no
//! entries.

mod builder;
mod callback;
mod facade;
mod listener_multiplexer;
mod notification;
mod path_codec;
mod recovery;
mod wildcard;

pub use builder::*;
pub(crate) use callback::*;
pub use facade::*;
pub use listener_multiplexer::*;
pub use notification::*;
pub use path_codec::*;
pub use recovery::*;
pub use wildcard::*;


use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use crate::ServiceUrl;

/// Receives the full current url list of a subscription.
///
/// Called from watch delivery; implementations must not block.
pub trait NotifyListener: Send + Sync + 'static {
    fn notify(
        &self,
        urls: Vec<ServiceUrl>,
    );
}

/// Identity of a subscriber, independent of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(usize);

/// Shared subscriber handle. Two handles are equal when they wrap the same
/// listener allocation.
#[derive(Clone)]
pub struct ListenerHandle {
    listener: Arc<dyn NotifyListener>,
}

impl ListenerHandle {
    pub fn new(listener: impl NotifyListener) -> Self {
        Self {
            listener: Arc::new(listener),
        }
    }

    pub fn from_arc(listener: Arc<dyn NotifyListener>) -> Self {
        Self { listener }
    }

    pub fn key(&self) -> ListenerKey {
        ListenerKey(Arc::as_ptr(&self.listener) as *const () as usize)
    }

    pub fn notify(
        &self,
        urls: Vec<ServiceUrl>,
    ) {
        self.listener.notify(urls)
    }
}

impl PartialEq for ListenerHandle {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ListenerHandle {}

impl Hash for ListenerHandle {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.key().hash(state)
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("ListenerHandle").field(&self.key().0).finish()
    }
}
