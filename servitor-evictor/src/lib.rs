//! Servitor Evictor - Bounded Servant Cache
//!
//! Keeps the number of in-memory servants bounded while a much larger
//! persistent object population stays reachable under unique identities.
//! Servants are created on demand by a [`ServantFactory`], never evicted
//! while a request is using them, and handed back to the factory in
//! least-recently-used order once the cache grows past its capacity.
//!
//! # Example
//!
//! ```ignore
//! let evictor = Evictor::new(factory, EvictorConfig::from_env());
//!
//! // Dispatcher side: one locate/finished pair per request
//! if let Some((servant, cookie)) = evictor.locate(&identity)? {
//!     servant.handle(request);
//!     evictor.finished(&identity, cookie)?;
//! }
//!
//! // Or let a guard do the bookkeeping
//! let guard = evictor.checkout(&identity)?;
//! guard.handle(request);
//! guard.finish()?;
//!
//! // Shutdown
//! evictor.deactivate()?;
//! ```

pub mod evictor;
pub mod factory;
pub mod locator;
mod recency;
pub mod registry;
pub mod stats;

pub use evictor::{Evictor, LocateCookie};
pub use factory::ServantFactory;
pub use locator::{checkout, ServantGuard, ServantLocator};
pub use registry::LocatorRegistry;
pub use stats::EvictorStats;

// Re-export core types so dependents need only this crate
pub use servitor_core::{
    BackingStoreError, CallOutPolicy, ConfigError, DispatchError, EvictorConfig, EvictorError,
    Identity, ServitorError, ServitorResult, DEFAULT_CAPACITY,
};
