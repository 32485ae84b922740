//! Configuration types

use crate::{ConfigError, ServitorError, ServitorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capacity used when none is configured or a negative one is given.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Environment variable holding the evictor capacity.
pub const ENV_EVICTOR_SIZE: &str = "SERVITOR_EVICTOR_SIZE";

/// Environment variable holding the down-call policy.
pub const ENV_EVICTOR_CALL_OUT: &str = "SERVITOR_EVICTOR_CALL_OUT";

// ============================================================================
// CALL-OUT POLICY
// ============================================================================

/// How the evictor treats its lock while calling into the servant factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutPolicy {
    /// `create` and `evict` run while the cache lock is held. All cache
    /// traffic waits behind a slow backing store.
    #[default]
    Serialized,
    /// The lock is released around `create` and `evict`. An in-flight marker
    /// per identity makes other callers for that identity wait instead of
    /// creating a second servant.
    Concurrent,
}

impl CallOutPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutPolicy::Serialized => "serialized",
            CallOutPolicy::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for CallOutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CallOutPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serialized" => Ok(CallOutPolicy::Serialized),
            "concurrent" => Ok(CallOutPolicy::Concurrent),
            _ => Err(ConfigError::InvalidValue {
                field: "call_out".to_string(),
                value: s.to_string(),
                reason: "expected serialized or concurrent".to_string(),
            }),
        }
    }
}

// ============================================================================
// EVICTOR CONFIG
// ============================================================================

/// Configuration for an evictor.
///
/// Serialized form is `{ size, call_out }`, where `size` is signed so that
/// configuration sources can express "unset" with a negative number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEvictorConfig", into = "RawEvictorConfig")]
pub struct EvictorConfig {
    /// Number of idle servants to retain. Zero retains none.
    pub capacity: usize,
    /// Lock behavior around factory down-calls.
    pub call_out: CallOutPolicy,
}

impl Default for EvictorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            call_out: CallOutPolicy::default(),
        }
    }
}

impl EvictorConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the down-call policy.
    pub fn with_call_out(mut self, call_out: CallOutPolicy) -> Self {
        self.call_out = call_out;
        self
    }

    /// Map a raw signed size onto a capacity: unset or negative means
    /// [`DEFAULT_CAPACITY`].
    pub fn capacity_from_signed(size: Option<i64>) -> usize {
        match size {
            Some(size) if size >= 0 => usize::try_from(size).unwrap_or(usize::MAX),
            _ => DEFAULT_CAPACITY,
        }
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SERVITOR_EVICTOR_SIZE`: capacity (default: 1000, negative means default)
    /// - `SERVITOR_EVICTOR_CALL_OUT`: `serialized` or `concurrent` (default: serialized)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EvictorConfig::from_env`] over an arbitrary key lookup.
    /// Unparsable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let size = lookup(ENV_EVICTOR_SIZE).and_then(|s| s.trim().parse::<i64>().ok());
        let call_out = lookup(ENV_EVICTOR_CALL_OUT)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            capacity: Self::capacity_from_signed(size),
            call_out,
        }
    }

    /// Parse a flat TOML document with optional `size` and `call_out` keys.
    pub fn from_toml_str(input: &str) -> ServitorResult<Self> {
        let raw: RawEvictorConfig = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        Self::try_from(raw).map_err(ServitorError::from)
    }
}

/// Wire shape of [`EvictorConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvictorConfig {
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    call_out: Option<String>,
}

impl TryFrom<RawEvictorConfig> for EvictorConfig {
    type Error = ConfigError;

    fn try_from(raw: RawEvictorConfig) -> Result<Self, Self::Error> {
        let call_out = match raw.call_out {
            Some(value) => value.parse()?,
            None => CallOutPolicy::default(),
        };
        Ok(Self {
            capacity: Self::capacity_from_signed(raw.size),
            call_out,
        })
    }
}

impl From<EvictorConfig> for RawEvictorConfig {
    fn from(config: EvictorConfig) -> Self {
        Self {
            size: Some(i64::try_from(config.capacity).unwrap_or(i64::MAX)),
            call_out: Some(config.call_out.as_str().to_string()),
        }
    }
}
