//! Servitor Test Utilities
//!
//! Centralized test infrastructure for the servitor workspace:
//! - A recording mock servant factory with failure injection
//! - Proptest generators for identities and operation sequences
//! - An operation interpreter shared by property tests and the fuzzer
//! - Invariant assertions

// Re-export core types for convenience
pub use servitor_core::{
    BackingStoreError, CallOutPolicy, EvictorConfig, EvictorError, Identity, ServitorError,
    ServitorResult,
};
pub use servitor_evictor::{Evictor, LocateCookie, ServantFactory};

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

// ============================================================================
// MOCK SERVANT FACTORY
// ============================================================================

/// Servant produced by [`MockServantFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServant {
    identity: Identity,
    incarnation: u64,
}

impl MockServant {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Serial number of the `create` call that produced this servant.
    pub fn incarnation(&self) -> u64 {
        self.incarnation
    }
}

/// A down-call observed by [`MockServantFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryCall {
    Create(Identity),
    Evict {
        identity: Identity,
        incarnation: u64,
        cookie: u64,
    },
}

/// In-memory servant factory that records every down-call.
///
/// Every identity exists unless marked missing. The user cookie handed to
/// the evictor is the servant's incarnation number, so tests can check that
/// `evict` receives the cookie `create` produced.
#[derive(Debug, Default)]
pub struct MockServantFactory {
    missing: RwLock<HashSet<Identity>>,
    failing_creates: RwLock<HashSet<Identity>>,
    failing_evicts: RwLock<HashSet<Identity>>,
    create_delay: Option<Duration>,
    next_incarnation: AtomicU64,
    calls: Mutex<Vec<FactoryCall>>,
}

impl MockServantFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `create`, to widen race windows.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Make `create` report the identity as nonexistent.
    pub fn mark_missing(&self, identity: Identity) {
        self.missing.write().unwrap().insert(identity);
    }

    /// Make `create` fail for the identity.
    pub fn fail_create(&self, identity: Identity) {
        self.failing_creates.write().unwrap().insert(identity);
    }

    /// Make `evict` fail for the identity.
    pub fn fail_evict(&self, identity: Identity) {
        self.failing_evicts.write().unwrap().insert(identity);
    }

    pub fn calls(&self) -> Vec<FactoryCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Identities passed to `create`, in call order.
    pub fn created(&self) -> Vec<Identity> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FactoryCall::Create(identity) => Some(identity),
                FactoryCall::Evict { .. } => None,
            })
            .collect()
    }

    /// Identities passed to `evict`, in call order.
    pub fn evicted(&self) -> Vec<Identity> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FactoryCall::Evict { identity, .. } => Some(identity),
                FactoryCall::Create(_) => None,
            })
            .collect()
    }

    pub fn create_count(&self, identity: &Identity) -> usize {
        self.created().iter().filter(|id| *id == identity).count()
    }

    pub fn evict_count(&self, identity: &Identity) -> usize {
        self.evicted().iter().filter(|id| *id == identity).count()
    }
}

impl ServantFactory for MockServantFactory {
    type Servant = MockServant;
    type Cookie = u64;

    fn create(&self, identity: &Identity) -> ServitorResult<Option<(MockServant, u64)>> {
        self.calls
            .lock()
            .unwrap()
            .push(FactoryCall::Create(identity.clone()));
        if let Some(delay) = self.create_delay {
            std::thread::sleep(delay);
        }
        if self.failing_creates.read().unwrap().contains(identity) {
            return Err(BackingStoreError::CreateFailed {
                identity: identity.clone(),
                reason: "injected create failure".to_string(),
            }
            .into());
        }
        if self.missing.read().unwrap().contains(identity) {
            return Ok(None);
        }
        let incarnation = self.next_incarnation.fetch_add(1, Ordering::SeqCst);
        Ok(Some((
            MockServant {
                identity: identity.clone(),
                incarnation,
            },
            incarnation,
        )))
    }

    fn evict(
        &self,
        identity: &Identity,
        servant: Arc<MockServant>,
        cookie: u64,
    ) -> ServitorResult<()> {
        self.calls.lock().unwrap().push(FactoryCall::Evict {
            identity: identity.clone(),
            incarnation: servant.incarnation,
            cookie,
        });
        if self.failing_evicts.read().unwrap().contains(identity) {
            return Err(BackingStoreError::EvictFailed {
                identity: identity.clone(),
                reason: "injected evict failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Identity in the default category.
pub fn id(name: &str) -> Identity {
    Identity::named(name)
}

/// Evictor over a shared mock factory, so the test keeps a handle to it.
pub fn mock_evictor(
    capacity: usize,
    call_out: CallOutPolicy,
) -> (Evictor<Arc<MockServantFactory>>, Arc<MockServantFactory>) {
    let factory = Arc::new(MockServantFactory::new());
    let config = EvictorConfig::new()
        .with_capacity(capacity)
        .with_call_out(call_out);
    (Evictor::new(Arc::clone(&factory), config), factory)
}

/// `locate` immediately followed by `finished`.
pub fn touch<F: ServantFactory>(evictor: &Evictor<F>, identity: &Identity) -> ServitorResult<bool> {
    match evictor.locate(identity)? {
        Some((_, cookie)) => {
            evictor.finished(identity, cookie)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

// ============================================================================
// OPERATION SEQUENCES
// ============================================================================

/// One step of a generated evictor workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Locate and keep the cookie.
    Locate(Identity),
    /// Finish the held cookie at this position (modulo the number held).
    Finish(usize),
    Deactivate,
    SetCapacity(usize),
}

/// Drives an evictor through [`Op`]s, keeping the cookies of requests that
/// are still in flight.
pub struct OpRunner<'a, F: ServantFactory> {
    evictor: &'a Evictor<F>,
    held: Vec<(Identity, LocateCookie)>,
}

impl<'a, F: ServantFactory> OpRunner<'a, F> {
    pub fn new(evictor: &'a Evictor<F>) -> Self {
        Self {
            evictor,
            held: Vec::new(),
        }
    }

    /// Identities with a request in flight, one element per request.
    pub fn held(&self) -> Vec<Identity> {
        self.held.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Apply one op. Backing-store errors are returned but leave the runner
    /// consistent; contract violations cannot happen through this API.
    pub fn apply(&mut self, op: &Op) -> ServitorResult<()> {
        match op {
            Op::Locate(identity) => {
                if let Some((_, cookie)) = self.evictor.locate(identity)? {
                    self.held.push((identity.clone(), cookie));
                }
                Ok(())
            }
            Op::Finish(position) => {
                if self.held.is_empty() {
                    return Ok(());
                }
                let (identity, cookie) = self.held.remove(position % self.held.len());
                self.evictor.finished(&identity, cookie)
            }
            Op::Deactivate => self.evictor.deactivate(),
            Op::SetCapacity(capacity) => self.evictor.set_capacity(*capacity),
        }
    }

    /// Finish everything still held.
    pub fn drain(&mut self) -> ServitorResult<()> {
        let mut first_error = None;
        for (identity, cookie) in self.held.drain(..) {
            if let Err(e) = self.evictor.finished(&identity, cookie) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Identity drawn from a small pool so that sequences revisit identities.
pub fn arb_identity() -> impl Strategy<Value = Identity> {
    ("[a-f]", prop::sample::select(vec!["", "files"]))
        .prop_map(|(name, category)| Identity::new(name, category))
}

pub fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => arb_identity().prop_map(Op::Locate),
        5 => any::<usize>().prop_map(Op::Finish),
        1 => Just(Op::Deactivate),
        1 => (0usize..6).prop_map(Op::SetCapacity),
    ]
}

pub fn arb_ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 0..max_len)
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// The recency sequence and the index name exactly the same identities.
pub fn assert_bijection<F: ServantFactory>(evictor: &Evictor<F>) {
    let mut queued = evictor.recency_snapshot().unwrap();
    let mut indexed = evictor.indexed_identities().unwrap();
    let queued_len = queued.len();
    queued.sort();
    queued.dedup();
    assert_eq!(queued.len(), queued_len, "recency sequence holds a duplicate");
    indexed.sort();
    assert_eq!(queued, indexed, "recency sequence and index disagree");
    assert_eq!(evictor.len().unwrap(), indexed.len());
}
