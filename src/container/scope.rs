//! Singleton scope with cycle-detecting per-key locks.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::container::types::Instance;
use crate::key::Key;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Why [`SingletonScope::get_or_create`] returned without an instance.
pub enum ScopeFailure<E> {
    /// `create` failed; the error is returned exactly as produced.
    Create(E),
    /// Waiting for `key` would close a cycle of threads each holding a key
    /// another one needs. Lists the keys held along that cycle.
    Cycle(Vec<Key>),
}

#[derive(Default)]
struct Slot {
    instance: Option<Instance>,
    owner: Option<ThreadId>,
    holds: usize,
}

#[derive(Default)]
struct ScopeState {
    slots: HashMap<Key, Slot>,
    /// Key each blocked thread is waiting for.
    waiting: HashMap<ThreadId, Key>,
}

impl ScopeState {
    /// Follows owner -> awaited key -> owner starting at `key`; returns the
    /// keys passed if the chain leads back to `me`.
    fn cycle_from(&self, key: &Key, me: ThreadId) -> Option<Vec<Key>> {
        let mut held = vec![key.clone()];
        let mut current = key;
        loop {
            let owner = self.slots.get(current)?.owner?;
            if owner == me {
                return Some(held);
            }
            current = self.waiting.get(&owner)?;
            if held.contains(current) {
                return None;
            }
            held.push(current.clone());
        }
    }
}

#[derive(Default)]
/// Caches one instance per key; concurrent first requests for the same key
/// are serialized, different keys never wait on each other.
///
/// Only successes are cached. A failure is returned to the caller exactly as
/// `create` produced it, with no frame of its own. A thread about to wait on
/// a key whose owner is, directly or transitively, waiting on this thread
/// gets [`ScopeFailure::Cycle`] instead of blocking.
pub struct SingletonScope {
    state: Mutex<ScopeState>,
    released: Condvar,
}

/// Gives up ownership of a key when creation finishes or unwinds.
struct Hold<'a> {
    scope: &'a SingletonScope,
    key: &'a Key,
}

impl Hold<'_> {
    fn finish(self, instance: Option<&Instance>) {
        if let Some(instance) = instance {
            if let Some(slot) = self.scope.state.lock().slots.get_mut(self.key) {
                slot.instance = Some(instance.clone());
            }
        }
    }
}

impl Drop for Hold<'_> {
    fn drop(&mut self) {
        let mut state = self.scope.state.lock();
        if let Some(slot) = state.slots.get_mut(self.key) {
            slot.holds = slot.holds.saturating_sub(1);
            if slot.holds == 0 {
                slot.owner = None;
            }
        }
        drop(state);
        self.scope.released.notify_all();
    }
}

impl SingletonScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<E>(
        &self,
        key: &Key,
        create: impl FnOnce() -> Result<Instance, E>,
    ) -> Result<Instance, ScopeFailure<E>> {
        let me = thread::current().id();
        {
            let mut state = self.state.lock();
            loop {
                let slot = state.slots.entry(key.clone()).or_default();
                if let Some(instance) = &slot.instance {
                    return Ok(instance.clone());
                }
                let owner = slot.owner;
                match owner {
                    None => {
                        slot.owner = Some(me);
                        slot.holds = 1;
                        break;
                    }
                    Some(owner) if owner == me => {
                        slot.holds += 1;
                        break;
                    }
                    Some(_) => {
                        if let Some(cycle) = state.cycle_from(key, me) {
                            debug!(%key, held = cycle.len(), "singleton lock cycle detected");
                            return Err(ScopeFailure::Cycle(cycle));
                        }
                        state.waiting.insert(me, key.clone());
                        self.released.wait(&mut state);
                        state.waiting.remove(&me);
                    }
                }
            }
        }

        let hold = Hold { scope: self, key };
        trace!(%key, "constructing singleton");
        match create() {
            Ok(instance) => {
                hold.finish(Some(&instance));
                Ok(instance)
            }
            Err(err) => {
                hold.finish(None);
                Err(ScopeFailure::Create(err))
            }
        }
    }

    pub fn is_cached(&self, key: &Key) -> bool {
        let state = self.state.lock();
        state
            .slots
            .get(key)
            .is_some_and(|slot| slot.instance.is_some())
    }
}
