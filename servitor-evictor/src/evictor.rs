//! Bounded LRU servant cache.
//!
//! The evictor sits between a request dispatcher and a [`ServantFactory`].
//! Every request's identity lookup goes through [`Evictor::locate`], which
//! returns a resident servant or asks the factory to create one. When the
//! request completes, [`Evictor::finished`] drops the entry's use count and
//! runs an eviction sweep.
//!
//! # Eviction sweep
//!
//! With `excess = resident - capacity`, the sweep looks at exactly `excess`
//! entries from the least-recently-used end. Idle ones are handed to the
//! factory's `evict`; in-use ones are skipped but still count as looked at,
//! so a single sweep can leave the cache above capacity. Entries are only
//! ever removed by a sweep.
//!
//! # Locking
//!
//! All bookkeeping sits behind one mutex. Under
//! [`CallOutPolicy::Serialized`] the factory is called with that mutex held.
//! Under [`CallOutPolicy::Concurrent`] the identity is marked in flight, the
//! mutex is released for the down-call, and other callers for that identity
//! wait on a condition variable until the marker clears.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use servitor_core::{
    CallOutPolicy, EvictorConfig, EvictorError, Identity, ServitorError, ServitorResult,
};

use crate::factory::ServantFactory;
use crate::locator::{self, ServantGuard, ServantLocator};
use crate::recency::{RecencyList, Slot};
use crate::stats::EvictorStats;

/// Proof of a successful [`Evictor::locate`], consumed by
/// [`Evictor::finished`].
///
/// Neither `Clone` nor `Copy`, so a cookie can be presented once. It points
/// straight at the entry's slot, and its generation detects cookies that
/// outlived their entry.
#[derive(Debug, PartialEq, Eq)]
pub struct LocateCookie {
    slot: Slot,
    generation: u64,
}

struct CacheEntry<S, C> {
    identity: Identity,
    servant: Arc<S>,
    user_cookie: C,
    use_count: usize,
    generation: u64,
}

enum Residency {
    Resident(Slot),
    /// A `create` or `evict` down-call for this identity is running
    /// outside the lock.
    InFlight,
}

struct EvictorState<S, C> {
    index: HashMap<Identity, Residency>,
    queue: RecencyList<CacheEntry<S, C>>,
    capacity: usize,
    next_generation: u64,
    stats: EvictorStats,
}

impl<S, C> EvictorState<S, C> {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::new(),
            queue: RecencyList::new(),
            capacity,
            next_generation: 0,
            stats: EvictorStats::default(),
        }
    }

    /// Hit path: bump the use count and requeue at the front.
    fn touch(&mut self, identity: &Identity, slot: Slot) -> ServitorResult<(Arc<S>, LocateCookie)> {
        let entry = self.queue.get_mut(slot).ok_or_else(|| EvictorError::ContractViolation {
            identity: identity.clone(),
            reason: "index points at a vacant slot".to_string(),
        })?;
        entry.use_count += 1;
        let located = (
            Arc::clone(&entry.servant),
            LocateCookie {
                slot,
                generation: entry.generation,
            },
        );
        self.queue.move_to_front(slot);
        self.stats.hits += 1;
        Ok(located)
    }

    /// Insert a freshly created servant, already in use by the caller.
    fn admit(&mut self, identity: &Identity, servant: S, user_cookie: C) -> (Arc<S>, LocateCookie) {
        let generation = self.next_generation;
        self.next_generation += 1;
        let servant = Arc::new(servant);
        let slot = self.queue.push_front(CacheEntry {
            identity: identity.clone(),
            servant: Arc::clone(&servant),
            user_cookie,
            use_count: 1,
            generation,
        });
        self.index.insert(identity.clone(), Residency::Resident(slot));
        (servant, LocateCookie { slot, generation })
    }

    /// Pick this sweep's victims and unlink them from the queue.
    fn take_victims(&mut self) -> Vec<CacheEntry<S, C>> {
        let excess = self.queue.len().saturating_sub(self.capacity);
        if excess == 0 {
            return Vec::new();
        }
        let slots: Vec<Slot> = self
            .queue
            .iter_lru()
            .take(excess)
            .filter(|(_, entry)| entry.use_count == 0)
            .map(|(slot, _)| slot)
            .collect();
        slots
            .into_iter()
            .filter_map(|slot| self.queue.remove(slot))
            .collect()
    }
}

/// Bounded LRU cache of servants. See the module docs.
pub struct Evictor<F: ServantFactory> {
    factory: F,
    call_out: CallOutPolicy,
    state: Mutex<EvictorState<F::Servant, F::Cookie>>,
    settled: Condvar,
}

impl<F: ServantFactory> Evictor<F> {
    /// Create an evictor over `factory`.
    pub fn new(factory: F, config: EvictorConfig) -> Self {
        Self {
            factory,
            call_out: config.call_out,
            state: Mutex::new(EvictorState::new(config.capacity)),
            settled: Condvar::new(),
        }
    }

    /// Create a serialized evictor with the given capacity.
    pub fn with_capacity(factory: F, capacity: usize) -> Self {
        Self::new(factory, EvictorConfig::new().with_capacity(capacity))
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn call_out(&self) -> CallOutPolicy {
        self.call_out
    }

    /// Find or create the servant for `identity` and mark it in use.
    ///
    /// Returns `Ok(None)` when the factory reports that the object does not
    /// exist; no entry is created in that case. Every `Some` must be paired
    /// with exactly one [`Evictor::finished`].
    pub fn locate(
        &self,
        identity: &Identity,
    ) -> ServitorResult<Option<(Arc<F::Servant>, LocateCookie)>> {
        let mut state = self.lock()?;
        loop {
            let residency = state.index.get(identity).map(|r| match r {
                Residency::Resident(slot) => Some(*slot),
                Residency::InFlight => None,
            });
            match residency {
                Some(Some(slot)) => {
                    let located = state.touch(identity, slot)?;
                    tracing::trace!(identity = %identity, "evictor hit");
                    return Ok(Some(located));
                }
                Some(None) => {
                    state = self
                        .settled
                        .wait(state)
                        .map_err(|_| EvictorError::LockPoisoned)?;
                }
                None => break,
            }
        }

        state.stats.misses += 1;
        match self.call_out {
            CallOutPolicy::Serialized => {
                tracing::debug!(identity = %identity, "creating servant");
                let created = self.factory.create(identity)?;
                Ok(self.settle_create(&mut state, identity, created))
            }
            CallOutPolicy::Concurrent => {
                state.index.insert(identity.clone(), Residency::InFlight);
                let in_flight = InFlight::new(self, vec![identity.clone()]);
                drop(state);

                tracing::debug!(identity = %identity, "creating servant outside lock");
                let created = self.factory.create(identity);

                let mut state = match self.lock() {
                    Ok(state) => state,
                    Err(e) => {
                        // The cache cannot take the servant; return it to the factory.
                        if let Ok(Some((servant, user_cookie))) = created {
                            if let Err(evict_err) =
                                self.factory.evict(identity, Arc::new(servant), user_cookie)
                            {
                                tracing::warn!(identity = %identity, error = %evict_err, "evict of orphaned servant failed");
                            }
                        }
                        return Err(e);
                    }
                };
                let located = match created {
                    Ok(created) => Ok(self.settle_create(&mut state, identity, created)),
                    Err(e) => Err(e),
                };
                drop(state);
                drop(in_flight);
                located
            }
        }
    }

    fn settle_create(
        &self,
        state: &mut EvictorState<F::Servant, F::Cookie>,
        identity: &Identity,
        created: Option<(F::Servant, F::Cookie)>,
    ) -> Option<(Arc<F::Servant>, LocateCookie)> {
        match created {
            Some((servant, user_cookie)) => Some(state.admit(identity, servant, user_cookie)),
            None => {
                tracing::debug!(identity = %identity, "factory reported object not found");
                state.stats.not_found += 1;
                None
            }
        }
    }

    /// Release one use of the entry named by `cookie`, then sweep.
    ///
    /// A cookie that does not match a live, in-use entry for `identity` is a
    /// [`EvictorError::ContractViolation`]; the use count is left untouched.
    /// An eviction failure from the sweep is returned after the sweep has
    /// finished looking at every candidate.
    pub fn finished(&self, identity: &Identity, cookie: LocateCookie) -> ServitorResult<()> {
        let mut state = self.lock()?;
        let violation = match state.queue.get_mut(cookie.slot) {
            Some(entry) if entry.generation != cookie.generation => {
                Some("cookie belongs to an entry that no longer exists".to_string())
            }
            Some(entry) if entry.identity != *identity => {
                Some(format!("cookie was issued for {}", entry.identity))
            }
            Some(entry) if entry.use_count == 0 => Some("use count is already zero".to_string()),
            Some(entry) => {
                entry.use_count -= 1;
                None
            }
            None => Some("cookie does not name a resident entry".to_string()),
        };
        if let Some(reason) = violation {
            tracing::warn!(identity = %identity, reason = %reason, "finished called with a bad cookie");
            return Err(EvictorError::ContractViolation {
                identity: identity.clone(),
                reason,
            }
            .into());
        }
        self.sweep(state)
    }

    /// Evict every idle entry and keep the capacity at zero.
    ///
    /// Entries still in use stay resident; they go on the sweep after their
    /// last `finished`. Calling this again without intervening traffic is a
    /// no-op.
    pub fn deactivate(&self) -> ServitorResult<()> {
        let mut state = self.lock()?;
        state.capacity = 0;
        tracing::info!(resident = state.queue.len(), "deactivating evictor");
        self.sweep(state)
    }

    /// Change the capacity and sweep down towards it.
    pub fn set_capacity(&self, capacity: usize) -> ServitorResult<()> {
        let mut state = self.lock()?;
        tracing::info!(from = state.capacity, to = capacity, "evictor capacity changed");
        state.capacity = capacity;
        self.sweep(state)
    }

    /// Locate `identity` and return a guard that calls `finished` on drop.
    pub fn checkout(&self, identity: &Identity) -> ServitorResult<ServantGuard<'_, F::Servant>> {
        locator::checkout(self, identity)
    }

    pub fn capacity(&self) -> ServitorResult<usize> {
        Ok(self.lock()?.capacity)
    }

    /// Number of resident entries.
    pub fn len(&self) -> ServitorResult<usize> {
        Ok(self.lock()?.queue.len())
    }

    pub fn is_empty(&self) -> ServitorResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, identity: &Identity) -> ServitorResult<bool> {
        Ok(matches!(
            self.lock()?.index.get(identity),
            Some(Residency::Resident(_))
        ))
    }

    /// In-flight request count for a resident entry.
    pub fn use_count(&self, identity: &Identity) -> ServitorResult<Option<usize>> {
        let state = self.lock()?;
        let count = match state.index.get(identity) {
            Some(Residency::Resident(slot)) => state.queue.get(*slot).map(|e| e.use_count),
            _ => None,
        };
        Ok(count)
    }

    /// Resident identities from most to least recently used.
    pub fn recency_snapshot(&self) -> ServitorResult<Vec<Identity>> {
        let state = self.lock()?;
        Ok(state
            .queue
            .iter_mru()
            .map(|(_, entry)| entry.identity.clone())
            .collect())
    }

    /// Identities the index maps to resident entries, in no particular order.
    pub fn indexed_identities(&self) -> ServitorResult<Vec<Identity>> {
        let state = self.lock()?;
        Ok(state
            .index
            .iter()
            .filter(|(_, residency)| matches!(residency, Residency::Resident(_)))
            .map(|(identity, _)| identity.clone())
            .collect())
    }

    pub fn stats(&self) -> ServitorResult<EvictorStats> {
        let state = self.lock()?;
        let mut stats = state.stats.clone();
        stats.resident = state.queue.len();
        stats.in_use = state
            .queue
            .iter_mru()
            .filter(|(_, entry)| entry.use_count > 0)
            .count();
        Ok(stats)
    }

    fn lock(&self) -> ServitorResult<MutexGuard<'_, EvictorState<F::Servant, F::Cookie>>> {
        self.state
            .lock()
            .map_err(|_| EvictorError::LockPoisoned.into())
    }

    /// Run one eviction sweep, consuming the lock guard.
    fn sweep(
        &self,
        mut state: MutexGuard<'_, EvictorState<F::Servant, F::Cookie>>,
    ) -> ServitorResult<()> {
        let victims = state.take_victims();
        if victims.is_empty() {
            return Ok(());
        }

        match self.call_out {
            CallOutPolicy::Serialized => {
                for victim in &victims {
                    state.index.remove(&victim.identity);
                }
                let outcome = self.evict_all(victims);
                outcome.record(&mut state.stats);
                outcome.into_result()
            }
            CallOutPolicy::Concurrent => {
                let identities: Vec<Identity> =
                    victims.iter().map(|v| v.identity.clone()).collect();
                for identity in &identities {
                    state.index.insert(identity.clone(), Residency::InFlight);
                }
                let in_flight = InFlight::new(self, identities);
                drop(state);

                let outcome = self.evict_all(victims);

                let mut state = self.lock()?;
                outcome.record(&mut state.stats);
                drop(state);
                drop(in_flight);
                outcome.into_result()
            }
        }
    }

    /// Hand every victim to the factory, continuing past failures.
    fn evict_all(&self, victims: Vec<CacheEntry<F::Servant, F::Cookie>>) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        for victim in victims {
            tracing::debug!(identity = %victim.identity, "evicting servant");
            match self
                .factory
                .evict(&victim.identity, victim.servant, victim.user_cookie)
            {
                Ok(()) => outcome.evicted += 1,
                Err(e) => {
                    tracing::warn!(identity = %victim.identity, error = %e, "evict failed");
                    outcome.failed += 1;
                    outcome.first_error.get_or_insert(e);
                }
            }
        }
        outcome
    }
}

#[derive(Default)]
struct SweepOutcome {
    evicted: u64,
    failed: u64,
    first_error: Option<ServitorError>,
}

impl SweepOutcome {
    fn record(&self, stats: &mut EvictorStats) {
        stats.evictions += self.evicted + self.failed;
        stats.eviction_failures += self.failed;
    }

    fn into_result(self) -> ServitorResult<()> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Clears in-flight markers and wakes waiters when dropped, including on
/// unwind out of a panicking down-call.
struct InFlight<'a, F: ServantFactory> {
    evictor: &'a Evictor<F>,
    identities: Vec<Identity>,
}

impl<'a, F: ServantFactory> InFlight<'a, F> {
    fn new(evictor: &'a Evictor<F>, identities: Vec<Identity>) -> Self {
        Self {
            evictor,
            identities,
        }
    }
}

impl<F: ServantFactory> Drop for InFlight<'_, F> {
    fn drop(&mut self) {
        let mut state = self
            .evictor
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for identity in &self.identities {
            if matches!(state.index.get(identity), Some(Residency::InFlight)) {
                state.index.remove(identity);
            }
        }
        drop(state);
        self.evictor.settled.notify_all();
    }
}

impl<F: ServantFactory> ServantLocator<F::Servant> for Evictor<F> {
    fn locate(
        &self,
        identity: &Identity,
    ) -> ServitorResult<Option<(Arc<F::Servant>, LocateCookie)>> {
        Evictor::locate(self, identity)
    }

    fn finished(&self, identity: &Identity, cookie: LocateCookie) -> ServitorResult<()> {
        Evictor::finished(self, identity, cookie)
    }

    fn deactivate(&self, category: &str) -> ServitorResult<()> {
        tracing::debug!(category = %category, "locator deactivated");
        Evictor::deactivate(self)
    }
}

impl<F: ServantFactory> fmt::Debug for Evictor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Evictor");
        out.field("call_out", &self.call_out);
        match self.state.try_lock() {
            Ok(state) => out
                .field("capacity", &state.capacity)
                .field("resident", &state.queue.len()),
            Err(_) => out.field("state", &"<locked>"),
        };
        out.finish()
    }
}
