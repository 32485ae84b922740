//! Category-keyed locator registry.
//!
//! The dispatcher side of the evictor contract: requests are routed to the
//! locator registered for their identity's category, falling back to the
//! default (empty) category. Removing a category deactivates its locator.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use servitor_core::{DispatchError, EvictorError, Identity, ServitorResult};

use crate::locator::{self, ServantLocator};

/// Registry of servant locators keyed by identity category.
pub struct LocatorRegistry<S> {
    locators: RwLock<HashMap<String, Arc<dyn ServantLocator<S>>>>,
}

impl<S> LocatorRegistry<S> {
    pub fn new() -> Self {
        Self {
            locators: RwLock::new(HashMap::new()),
        }
    }

    /// Register `locator` for `category`. The empty category is the default.
    pub fn add(
        &self,
        category: impl Into<String>,
        locator: Arc<dyn ServantLocator<S>>,
    ) -> ServitorResult<()> {
        let category = category.into();
        let mut locators = self
            .locators
            .write()
            .map_err(|_| EvictorError::LockPoisoned)?;
        if locators.contains_key(&category) {
            return Err(DispatchError::CategoryAlreadyRegistered { category }.into());
        }
        tracing::debug!(category = %category, "servant locator registered");
        locators.insert(category, locator);
        Ok(())
    }

    /// Unregister the locator for `category` and deactivate it.
    ///
    /// The locator is unregistered even if its deactivation fails.
    pub fn remove(&self, category: &str) -> ServitorResult<Arc<dyn ServantLocator<S>>> {
        let removed = self
            .locators
            .write()
            .map_err(|_| EvictorError::LockPoisoned)?
            .remove(category)
            .ok_or_else(|| DispatchError::NoLocator {
                category: category.to_string(),
            })?;
        tracing::info!(category = %category, "servant locator removed");
        removed.deactivate(category)?;
        Ok(removed)
    }

    /// Locator for `category`, or the default locator if none is registered.
    pub fn find(&self, category: &str) -> ServitorResult<Option<Arc<dyn ServantLocator<S>>>> {
        let locators = self
            .locators
            .read()
            .map_err(|_| EvictorError::LockPoisoned)?;
        Ok(locators
            .get(category)
            .or_else(|| locators.get(""))
            .cloned())
    }

    /// Dispatch one request: locate, run `op` on the servant, then finish.
    ///
    /// A missing locator is [`DispatchError::NoLocator`]; a missing object is
    /// [`EvictorError::NotFound`]. `finished` runs even if `op` panics.
    pub fn invoke<R>(&self, identity: &Identity, op: impl FnOnce(&S) -> R) -> ServitorResult<R> {
        let target = self
            .find(identity.category())?
            .ok_or_else(|| DispatchError::NoLocator {
                category: identity.category().to_string(),
            })?;
        let guard = locator::checkout(target.as_ref(), identity)?;
        let result = op(guard.servant().as_ref());
        guard.finish()?;
        Ok(result)
    }

    /// Unregister and deactivate every locator, as at adapter shutdown.
    ///
    /// Every locator is deactivated; the first failure is returned.
    pub fn deactivate_all(&self) -> ServitorResult<()> {
        let drained: Vec<(String, Arc<dyn ServantLocator<S>>)> = self
            .locators
            .write()
            .map_err(|_| EvictorError::LockPoisoned)?
            .drain()
            .collect();

        let mut first_error = None;
        for (category, locator) in drained {
            if let Err(e) = locator.deactivate(&category) {
                tracing::warn!(category = %category, error = %e, "locator deactivation failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn categories(&self) -> ServitorResult<Vec<String>> {
        let locators = self
            .locators
            .read()
            .map_err(|_| EvictorError::LockPoisoned)?;
        let mut categories: Vec<String> = locators.keys().cloned().collect();
        categories.sort();
        Ok(categories)
    }
}

impl<S> Default for LocatorRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for LocatorRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorRegistry")
            .field("categories", &self.categories().unwrap_or_default())
            .finish()
    }
}
