//! Error types for servitor operations

use crate::Identity;
use thiserror::Error;

/// Evictor errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvictorError {
    #[error("Object not found: {identity}")]
    NotFound { identity: Identity },

    /// `finished` was called with a cookie that does not belong to a live,
    /// in-use entry. Indicates a bug in the calling dispatcher.
    #[error("Contract violation for {identity}: {reason}")]
    ContractViolation { identity: Identity, reason: String },

    #[error("Evictor lock poisoned")]
    LockPoisoned,
}

/// Failures raised by a servant factory's down-calls.
///
/// The evictor never constructs these itself; it hands them back to its
/// caller exactly as the factory produced them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackingStoreError {
    #[error("Create failed for {identity}: {reason}")]
    CreateFailed { identity: Identity, reason: String },

    #[error("Evict failed for {identity}: {reason}")]
    EvictFailed { identity: Identity, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Dispatch (locator registry) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("A locator is already registered for category {category:?}")]
    CategoryAlreadyRegistered { category: String },

    #[error("No locator registered for category {category:?}")]
    NoLocator { category: String },
}

/// Master error type for all servitor errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServitorError {
    #[error("Evictor error: {0}")]
    Evictor(#[from] EvictorError),

    #[error("Backing store error: {0}")]
    BackingStore(#[from] BackingStoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl ServitorError {
    /// True when the error means the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServitorError::Evictor(EvictorError::NotFound { .. }))
    }
}

/// Result type alias for servitor operations.
pub type ServitorResult<T> = Result<T, ServitorError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evictor_error_display_not_found() {
        let err = EvictorError::NotFound {
            identity: Identity::new("alice", "phonebook"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Object not found"));
        assert!(msg.contains("phonebook/alice"));
    }

    #[test]
    fn test_evictor_error_display_contract_violation() {
        let err = EvictorError::ContractViolation {
            identity: Identity::named("bob"),
            reason: "use count already zero".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Contract violation"));
        assert!(msg.contains("bob"));
        assert!(msg.contains("use count already zero"));
    }

    #[test]
    fn test_backing_store_error_display() {
        let err = BackingStoreError::EvictFailed {
            identity: Identity::named("carol"),
            reason: "disk full".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Evict failed"));
        assert!(msg.contains("carol"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "call_out".to_string(),
            value: "sometimes".to_string(),
            reason: "expected serialized or concurrent".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("call_out"));
        assert!(msg.contains("sometimes"));
        assert!(msg.contains("expected serialized or concurrent"));
    }

    #[test]
    fn test_servitor_error_from_variants() {
        let evictor = ServitorError::from(EvictorError::LockPoisoned);
        assert!(matches!(evictor, ServitorError::Evictor(_)));

        let store = ServitorError::from(BackingStoreError::CreateFailed {
            identity: Identity::named("x"),
            reason: "io".to_string(),
        });
        assert!(matches!(store, ServitorError::BackingStore(_)));

        let config = ServitorError::from(ConfigError::Parse {
            reason: "bad toml".to_string(),
        });
        assert!(matches!(config, ServitorError::Config(_)));

        let dispatch = ServitorError::from(DispatchError::NoLocator {
            category: "files".to_string(),
        });
        assert!(matches!(dispatch, ServitorError::Dispatch(_)));
    }

    #[test]
    fn test_is_not_found() {
        let not_found = ServitorError::from(EvictorError::NotFound {
            identity: Identity::named("x"),
        });
        assert!(not_found.is_not_found());
        assert!(!ServitorError::from(EvictorError::LockPoisoned).is_not_found());
    }
}
