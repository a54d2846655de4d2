//! Per-file-system POSIX identity allocation.
//!
//! Every backing file system gets its own ledger of allocated integers. An
//! integer doubles as uid and gid for the volume it was allocated for.
//! Ledgers live in memory for the lifetime of the process; a restart forgets
//! them, and later requests simply allocate again from the lowest free value.
//!
//! Ledgers are sharded by file system id so unrelated file systems never
//! contend on the same lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use efsprov_common::{ProvError, ProvResult};
use parking_lot::Mutex;

/// Lower bound used when a request names no range.
pub const DEFAULT_GID_MIN: u32 = 50_000;
/// Upper bound used when a request names no range.
pub const DEFAULT_GID_MAX: u32 = 7_000_000;

type Ledger = Arc<Mutex<BTreeSet<u32>>>;

/// Hands out the lowest free integer of a caller-supplied range.
#[derive(Debug, Default)]
pub struct GidAllocator {
    ledgers: DashMap<String, Ledger>,
}

impl GidAllocator {
    /// Create an allocator with no ledgers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the smallest free integer in `[min, max]` for a file system.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::RangeExhausted`] when every integer in the range
    /// is already allocated, or the range is empty.
    pub fn acquire(&self, file_system_id: &str, min: u32, max: u32) -> ProvResult<u32> {
        let ledger = self.ledger(file_system_id);
        let mut held = ledger.lock();

        let Some(id) = lowest_free(&held, min, max) else {
            tracing::warn!(
                file_system_id,
                min,
                max,
                allocated = held.len(),
                "Identity range exhausted"
            );
            return Err(ProvError::RangeExhausted {
                file_system_id: file_system_id.to_string(),
                min,
                max,
            });
        };

        held.insert(id);
        tracing::debug!(file_system_id, id, "Allocated identity");
        Ok(id)
    }

    /// Mark `id` free again. Unknown file systems and ids are ignored.
    pub fn release(&self, file_system_id: &str, id: u32) {
        let Some(ledger) = self
            .ledgers
            .get(file_system_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return;
        };

        if ledger.lock().remove(&id) {
            tracing::debug!(file_system_id, id, "Released identity");
        }
    }

    /// Allocate an identity that is released again when the lease drops.
    ///
    /// Call [`IdentityLease::keep`] once the identity is committed to a
    /// created resource.
    ///
    /// # Errors
    ///
    /// Same as [`GidAllocator::acquire`].
    pub fn lease(&self, file_system_id: &str, min: u32, max: u32) -> ProvResult<IdentityLease<'_>> {
        let id = self.acquire(file_system_id, min, max)?;
        Ok(IdentityLease {
            allocator: self,
            file_system_id: file_system_id.to_string(),
            id,
            kept: false,
        })
    }

    /// Snapshot of the allocated ids for a file system, ascending.
    #[must_use]
    pub fn allocated(&self, file_system_id: &str) -> Vec<u32> {
        self.ledgers
            .get(file_system_id)
            .map(|entry| entry.value().lock().iter().copied().collect())
            .unwrap_or_default()
    }

    fn ledger(&self, file_system_id: &str) -> Ledger {
        if let Some(entry) = self.ledgers.get(file_system_id) {
            return Arc::clone(entry.value());
        }
        Arc::clone(self.ledgers.entry(file_system_id.to_string()).or_default().value())
    }
}

fn lowest_free(held: &BTreeSet<u32>, min: u32, max: u32) -> Option<u32> {
    if min > max {
        return None;
    }
    let mut candidate = min;
    for &used in held.range(min..=max) {
        if used != candidate {
            break;
        }
        candidate = candidate.checked_add(1)?;
    }
    (candidate <= max).then_some(candidate)
}

/// An allocated identity that returns itself to the ledger on drop.
#[derive(Debug)]
pub struct IdentityLease<'a> {
    allocator: &'a GidAllocator,
    file_system_id: String,
    id: u32,
    kept: bool,
}

impl IdentityLease<'_> {
    /// The allocated integer.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Keep the identity allocated past the end of the lease.
    pub fn keep(mut self) -> u32 {
        self.kept = true;
        self.id
    }
}

impl Drop for IdentityLease<'_> {
    fn drop(&mut self) {
        if !self.kept {
            tracing::debug!(
                file_system_id = %self.file_system_id,
                id = self.id,
                "Returning unused identity"
            );
            self.allocator.release(&self.file_system_id, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn allocates_lowest_first() {
        let alloc = GidAllocator::new();
        assert_eq!(alloc.acquire("fs-1", 1000, 2000).unwrap(), 1000);
        assert_eq!(alloc.acquire("fs-1", 1000, 2000).unwrap(), 1001);
        assert_eq!(alloc.acquire("fs-1", 1000, 2000).unwrap(), 1002);

        alloc.release("fs-1", 1001);
        assert_eq!(alloc.acquire("fs-1", 1000, 2000).unwrap(), 1001);
        assert_eq!(alloc.acquire("fs-1", 1000, 2000).unwrap(), 1003);
    }

    #[test]
    fn exhausts_after_range_size_acquires() {
        let alloc = GidAllocator::new();
        for expected in 10..=14 {
            assert_eq!(alloc.acquire("fs-1", 10, 14).unwrap(), expected);
        }
        let err = alloc.acquire("fs-1", 10, 14).unwrap_err();
        assert!(matches!(err, ProvError::RangeExhausted { min: 10, max: 14, .. }));
    }

    #[test]
    fn empty_range_is_exhausted() {
        let alloc = GidAllocator::new();
        assert!(alloc.acquire("fs-1", 5, 4).is_err());
    }

    #[test]
    fn range_ending_at_u32_max() {
        let alloc = GidAllocator::new();
        assert_eq!(alloc.acquire("fs-1", u32::MAX, u32::MAX).unwrap(), u32::MAX);
        assert!(alloc.acquire("fs-1", u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn ranges_are_per_call() {
        let alloc = GidAllocator::new();
        assert_eq!(alloc.acquire("fs-1", 1, 100).unwrap(), 1);
        assert_eq!(alloc.acquire("fs-1", 50, 60).unwrap(), 50);
        assert_eq!(alloc.acquire("fs-1", 1, 100).unwrap(), 2);
    }

    #[test]
    fn release_of_unknown_is_noop() {
        let alloc = GidAllocator::new();
        alloc.release("never-seen", 7);
        alloc.release("fs-1", 1000);
        assert_eq!(alloc.acquire("fs-1", 1000, 1000).unwrap(), 1000);
        alloc.release("fs-1", 1234);
        assert_eq!(alloc.allocated("fs-1"), vec![1000]);
    }

    #[test]
    fn file_systems_are_independent() {
        let alloc = GidAllocator::new();
        assert_eq!(alloc.acquire("fs-1", 1, 1).unwrap(), 1);
        assert_eq!(alloc.acquire("fs-2", 1, 1).unwrap(), 1);
        assert!(alloc.acquire("fs-1", 1, 1).is_err());
    }

    #[test]
    fn dropped_lease_releases() {
        let alloc = GidAllocator::new();
        {
            let lease = alloc.lease("fs-1", 1, 10).unwrap();
            assert_eq!(lease.id(), 1);
            assert_eq!(alloc.allocated("fs-1"), vec![1]);
        }
        assert!(alloc.allocated("fs-1").is_empty());
    }

    #[test]
    fn kept_lease_stays_allocated() {
        let alloc = GidAllocator::new();
        let id = alloc.lease("fs-1", 1, 10).unwrap().keep();
        assert_eq!(id, 1);
        assert_eq!(alloc.allocated("fs-1"), vec![1]);
    }

    #[test]
    fn concurrent_acquires_never_collide() {
        let alloc = Arc::new(GidAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| alloc.acquire("fs-1", 1, 1000).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "identity {id} handed out twice");
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(alloc.allocated("fs-1"), (1..=400).collect::<Vec<_>>());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire,
        Release(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Acquire), (0u32..30).prop_map(Op::Release)]
    }

    proptest! {
        #[test]
        fn held_ids_stay_in_range_without_duplicates(ops in proptest::collection::vec(op(), 0..80)) {
            let (min, max) = (5u32, 20u32);
            let alloc = GidAllocator::new();
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Acquire => match alloc.acquire("fs", min, max) {
                        Ok(id) => {
                            prop_assert!((min..=max).contains(&id));
                            prop_assert!(model.insert(id));
                        }
                        Err(_) => prop_assert_eq!(model.len() as u32, max - min + 1),
                    },
                    Op::Release(id) => {
                        alloc.release("fs", id);
                        model.remove(&id);
                    }
                }
                prop_assert_eq!(alloc.allocated("fs"), model.iter().copied().collect::<Vec<_>>());
            }
        }
    }
}
