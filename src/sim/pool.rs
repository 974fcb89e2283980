//! Per-kind object recycling
//!
//! Deactivated entities are parked in a bounded bucket per kind and handed
//! back out on the next spawn instead of being reallocated. Instances that
//! arrive at a full bucket are dropped.

use std::collections::BTreeMap;
use std::fmt::Debug;

/// Capability to return to a clean, inactive state before being pooled
pub trait Resettable {
    /// Clear activity, visibility and any trail buffer
    fn reset(&mut self);
}

/// An instance the pool can park. `pool_id` must be unique per instance.
pub trait Poolable: Resettable {
    fn pool_id(&self) -> u32;
}

/// What `release` did with an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Reset and parked in the bucket
    Pooled,
    /// Bucket was full; instance dropped without reset
    Discarded,
    /// An instance with the same id is already parked; ignored
    Duplicate,
}

/// Diagnostic snapshot of bucket sizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats<K: Ord> {
    pub per_kind: BTreeMap<K, usize>,
    pub total: usize,
    /// Instances dropped on overflow since creation
    pub discarded: u64,
    /// Double releases rejected since creation
    pub duplicates: u64,
}

impl<K: Ord> PoolStats<K> {
    /// Parked instances for a kind (0 if the kind was never seen)
    pub fn count(&self, kind: &K) -> usize {
        self.per_kind.get(kind).copied().unwrap_or(0)
    }
}

/// Bounded per-kind buckets of inactive instances
#[derive(Debug)]
pub struct EntityPool<K, T> {
    buckets: BTreeMap<K, Vec<T>>,
    max_pool_size: usize,
    discarded: u64,
    duplicates: u64,
}

impl<K, T> EntityPool<K, T>
where
    K: Ord + Copy + Debug,
    T: Poolable,
{
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            buckets: BTreeMap::new(),
            max_pool_size,
            discarded: 0,
            duplicates: 0,
        }
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    fn bucket(&mut self, kind: K) -> &mut Vec<T> {
        self.buckets.entry(kind).or_default()
    }

    /// Take a parked instance, or build one with `factory` if the bucket is empty.
    ///
    /// The instance's game state is not touched here; callers initialize it.
    pub fn acquire(&mut self, kind: K, factory: impl FnOnce() -> T) -> T {
        match self.bucket(kind).pop() {
            Some(instance) => instance,
            None => factory(),
        }
    }

    /// Reset and park an instance. Never fails.
    pub fn release(&mut self, kind: K, mut instance: T) -> Release {
        let max = self.max_pool_size;
        let id = instance.pool_id();
        let bucket = self.buckets.entry(kind).or_default();

        if bucket.iter().any(|parked| parked.pool_id() == id) {
            self.duplicates += 1;
            log::debug!("Pool {:?}: instance {} already parked, ignoring release", kind, id);
            return Release::Duplicate;
        }

        if bucket.len() >= max {
            self.discarded += 1;
            log::debug!("Pool {:?} is full ({}), discarding instance {}", kind, max, id);
            return Release::Discarded;
        }

        instance.reset();
        bucket.push(instance);
        Release::Pooled
    }

    /// Halve every bucket holding more than half the cap. Returns instances dropped.
    pub fn force_compact(&mut self) -> usize {
        let half = self.max_pool_size / 2;
        let mut dropped = 0;
        for bucket in self.buckets.values_mut() {
            if bucket.len() > half {
                // Oldest parked instances sit at the front
                let remove = bucket.len() / 2;
                bucket.drain(..remove);
                dropped += remove;
            }
        }
        if dropped > 0 {
            log::debug!("Pool compaction dropped {} instances", dropped);
        }
        dropped
    }

    /// Empty every bucket
    pub fn clear(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
    }

    pub fn bucket_len(&self, kind: K) -> usize {
        self.buckets.get(&kind).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> PoolStats<K> {
        let per_kind: BTreeMap<K, usize> =
            self.buckets.iter().map(|(kind, bucket)| (*kind, bucket.len())).collect();
        let total = per_kind.values().sum();
        PoolStats {
            per_kind,
            total,
            discarded: self.discarded,
            duplicates: self.duplicates,
        }
    }
}
