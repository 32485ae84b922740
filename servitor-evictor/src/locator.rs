//! Servant locator seam and the RAII guard built on it.
//!
//! A request dispatcher talks to servant caches through [`ServantLocator`]:
//! `locate` before an invocation, `finished` after it, `deactivate` when the
//! locator's category is torn down. [`ServantGuard`] pairs the first two so a
//! located servant cannot be leaked without its `finished` call.

use servitor_core::{EvictorError, Identity, ServitorResult};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::evictor::LocateCookie;

/// Per-request servant lookup used by a dispatcher.
pub trait ServantLocator<S>: Send + Sync {
    /// Find or materialize the servant for `identity`.
    ///
    /// `Ok(None)` means the object does not exist.
    fn locate(&self, identity: &Identity) -> ServitorResult<Option<(Arc<S>, LocateCookie)>>;

    /// Report that the request started by the matching `locate` is done.
    fn finished(&self, identity: &Identity, cookie: LocateCookie) -> ServitorResult<()>;

    /// The locator's category is being removed or the adapter is shutting down.
    fn deactivate(&self, category: &str) -> ServitorResult<()>;
}

/// Locate `identity` and wrap the result in a guard.
///
/// A missing object becomes [`EvictorError::NotFound`].
pub fn checkout<'a, S>(
    locator: &'a dyn ServantLocator<S>,
    identity: &Identity,
) -> ServitorResult<ServantGuard<'a, S>> {
    match locator.locate(identity)? {
        Some((servant, cookie)) => Ok(ServantGuard {
            locator,
            identity: identity.clone(),
            servant,
            cookie: Some(cookie),
        }),
        None => Err(EvictorError::NotFound {
            identity: identity.clone(),
        }
        .into()),
    }
}

/// A located servant that reports `finished` when dropped.
///
/// Prefer [`ServantGuard::finish`] when the caller wants to see a failing
/// eviction; `Drop` can only log it.
pub struct ServantGuard<'a, S> {
    locator: &'a dyn ServantLocator<S>,
    identity: Identity,
    servant: Arc<S>,
    cookie: Option<LocateCookie>,
}

impl<S> ServantGuard<'_, S> {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Shared handle to the servant.
    pub fn servant(&self) -> &Arc<S> {
        &self.servant
    }

    /// Call `finished` now and return its outcome.
    pub fn finish(mut self) -> ServitorResult<()> {
        match self.cookie.take() {
            Some(cookie) => self.locator.finished(&self.identity, cookie),
            None => Ok(()),
        }
    }
}

impl<S> Deref for ServantGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.servant
    }
}

impl<S> Drop for ServantGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(cookie) = self.cookie.take() {
            if let Err(e) = self.locator.finished(&self.identity, cookie) {
                tracing::error!(identity = %self.identity, error = %e, "finished failed while dropping servant guard");
            }
        }
    }
}

impl<S> fmt::Debug for ServantGuard<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServantGuard")
            .field("identity", &self.identity)
            .field("finished", &self.cookie.is_none())
            .finish()
    }
}
