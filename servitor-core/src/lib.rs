//! Servitor Core - Identity, Error and Configuration Types
//!
//! Plain data shared by the evictor and its callers. This crate contains
//! no cache logic.

pub mod config;
pub mod error;
pub mod identity;

pub use config::{
    CallOutPolicy, EvictorConfig, DEFAULT_CAPACITY, ENV_EVICTOR_CALL_OUT, ENV_EVICTOR_SIZE,
};
pub use error::{
    BackingStoreError, ConfigError, DispatchError, EvictorError, ServitorError, ServitorResult,
};
pub use identity::{Identity, IdentityParseError};
