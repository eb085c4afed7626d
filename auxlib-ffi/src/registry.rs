//! Handle registry: slot table, FIFO free list and per-slot result cache.
//!
//! Handles are slot indices. Creating reuses the oldest freed index before
//! growing the table; destroying drops the engine and queues the index. Each
//! slot also carries a generation counter, bumped whenever the slot's cached
//! result is replaced or its occupant goes away, so stale views of a cached
//! buffer can be told apart from live ones.

use std::collections::VecDeque;

use auxlib_core::Signals;
use auxlib_engine::SignalEngine;

use crate::error::AuxError;

/// Host-facing instance identifier. Never negative when valid.
pub type Handle = i32;

/// Most recent computed result of one handle, folded for the host.
#[derive(Debug, Default)]
pub struct ResultCache {
    signal: Signals,
    channels: usize,
}

impl ResultCache {
    /// Replace the cached value with a fresh engine result.
    pub fn store(&mut self, sig: Signals) {
        self.signal = sig;
        self.channels = 0;
    }

    /// Flatten the cached result into planar blocks.
    ///
    /// Returns `(channels, len)`; `(0, 0)` when the first channel is empty,
    /// in which case nothing is folded.
    pub fn fold(&mut self) -> (usize, usize) {
        self.signal.make_chainless();
        let len = self.signal.len();
        if len == 0 {
            self.channels = 0;
            return (0, 0);
        }
        let mut channels = 1;
        if let Some(chain) = self.signal.detach_next_chan() {
            for link in chain.links() {
                self.signal.append_channel(link);
                channels += 1;
            }
        }
        self.channels = channels;
        (channels, len)
    }

    /// Planar samples of the last fold, `channels * len` long.
    pub fn buffer(&self) -> Option<&[f64]> {
        if self.channels == 0 {
            return None;
        }
        self.signal.buffer()
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[derive(Debug)]
struct Active<E> {
    engine: E,
    cache: ResultCache,
}

#[derive(Debug)]
struct Slot<E> {
    active: Option<Active<E>>,
    generation: u64,
}

/// Live engine instances keyed by handle.
#[derive(Debug)]
pub struct Registry<E> {
    slots: Vec<Slot<E>>,
    free: VecDeque<usize>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self { slots: Vec::new(), free: VecDeque::new() }
    }
}

impl<E: SignalEngine> Registry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `engine` and hand out its handle.
    pub fn insert(&mut self, engine: E) -> Result<Handle, AuxError> {
        let active = Active { engine, cache: ResultCache::default() };
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index];
            slot.active = Some(active);
            slot.generation += 1;
            return to_handle(index);
        }
        let handle = to_handle(self.slots.len())?;
        self.slots.push(Slot { active: Some(active), generation: 0 });
        Ok(handle)
    }

    /// Drop the instance behind `handle`. Unknown or freed handles are ignored.
    pub fn remove(&mut self, handle: Handle) -> bool {
        let Some(index) = self.index(handle) else { return false };
        let slot = &mut self.slots[index];
        if slot.active.take().is_none() {
            return false;
        }
        slot.generation += 1;
        self.free.push_back(index);
        true
    }

    fn index(&self, handle: Handle) -> Option<usize> {
        usize::try_from(handle).ok().filter(|&i| i < self.slots.len())
    }

    fn slot(&self, handle: Handle) -> Result<&Slot<E>, AuxError> {
        let index = self.index(handle).ok_or(AuxError::InvalidHandle)?;
        Ok(&self.slots[index])
    }

    fn active(&self, handle: Handle) -> Result<&Active<E>, AuxError> {
        self.slot(handle)?.active.as_ref().ok_or(AuxError::DeletedHandle)
    }

    fn active_mut(&mut self, handle: Handle) -> Result<(&mut Active<E>, &mut u64), AuxError> {
        let index = self.index(handle).ok_or(AuxError::InvalidHandle)?;
        let slot = &mut self.slots[index];
        let active = slot.active.as_mut().ok_or(AuxError::DeletedHandle)?;
        Ok((active, &mut slot.generation))
    }

    pub fn get(&self, handle: Handle) -> Result<&E, AuxError> {
        self.active(handle).map(|a| &a.engine)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut E, AuxError> {
        self.active_mut(handle).map(|(a, _)| &mut a.engine)
    }

    /// Engine and cache of `handle` for a new evaluation. The slot's
    /// generation is bumped first, so earlier views go stale even when the
    /// evaluation then fails. Returns the new generation.
    pub fn begin_evaluation(&mut self, handle: Handle) -> Result<(&mut E, &mut ResultCache, u64), AuxError> {
        let (active, generation) = self.active_mut(handle)?;
        *generation += 1;
        Ok((&mut active.engine, &mut active.cache, *generation))
    }

    /// Cached result of `handle`, if the slot is still at `generation`.
    pub fn cache_at(&self, handle: Handle, generation: u64) -> Option<&ResultCache> {
        let slot = self.slot(handle).ok()?;
        if slot.generation != generation {
            return None;
        }
        slot.active.as_ref().map(|a| &a.cache)
    }

    /// Number of slots ever allocated, live or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live instances.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

fn to_handle(index: usize) -> Result<Handle, AuxError> {
    Handle::try_from(index).map_err(|_| AuxError::HandlesExhausted)
}
