//! Servant factory trait.
//!
//! The factory is the evictor's only way into the backing store. It turns an
//! identity into an in-memory servant on a cache miss, and takes the servant
//! back when the evictor drops it.

use servitor_core::{Identity, ServitorResult};
use std::sync::Arc;

/// Backing-store down-calls made by an [`Evictor`](crate::Evictor).
///
/// Implementations must be thread-safe: depending on the
/// [`CallOutPolicy`](servitor_core::CallOutPolicy) the evictor either calls
/// them while holding its lock, or calls them concurrently for different
/// identities. The evictor never calls `create` twice concurrently for the
/// same identity, and never overlaps `create` and `evict` for one identity.
///
/// # Errors
///
/// Whatever error a down-call returns reaches the evictor's caller unchanged.
/// Factories usually report failures as
/// [`BackingStoreError`](servitor_core::BackingStoreError).
pub trait ServantFactory: Send + Sync {
    /// The in-memory representation of an object.
    type Servant: Send + Sync;

    /// Opaque data kept alongside a servant and handed back on eviction.
    type Cookie: Send;

    /// Materialize the servant for `identity`.
    ///
    /// Returns `Ok(None)` when no such object exists in the backing store.
    fn create(
        &self,
        identity: &Identity,
    ) -> ServitorResult<Option<(Self::Servant, Self::Cookie)>>;

    /// Take back an idle servant the evictor no longer retains.
    ///
    /// Ownership of the servant and cookie passes to the factory; the entry
    /// is gone from the cache whether or not this succeeds.
    fn evict(
        &self,
        identity: &Identity,
        servant: Arc<Self::Servant>,
        cookie: Self::Cookie,
    ) -> ServitorResult<()>;
}

impl<F: ServantFactory + ?Sized> ServantFactory for Arc<F> {
    type Servant = F::Servant;
    type Cookie = F::Cookie;

    fn create(
        &self,
        identity: &Identity,
    ) -> ServitorResult<Option<(Self::Servant, Self::Cookie)>> {
        (**self).create(identity)
    }

    fn evict(
        &self,
        identity: &Identity,
        servant: Arc<Self::Servant>,
        cookie: Self::Cookie,
    ) -> ServitorResult<()> {
        (**self).evict(identity, servant, cookie)
    }
}
