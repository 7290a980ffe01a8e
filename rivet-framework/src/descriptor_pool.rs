use rivet_api::{RivetDescriptor, RivetDescriptorTable, RivetError, RivetResult};
use std::sync::{Arc, Mutex, MutexGuard};

/// A fixed-capacity pool of descriptor slots handed out as a bump allocator. Reservations are
/// contiguous and never split. When the cursor cannot satisfy a reservation the pool rolls over,
/// the cursor returns to zero and the generation advances, which invalidates every table handed
/// out under earlier generations. Frame pacing must guarantee the GPU has retired work that
/// references the old generation before its slots are overwritten, that is the caller's problem.
pub struct DescriptorPool {
    descriptors: Vec<RivetDescriptor>,
    next_slot: u32,
    generation: u64,
}

impl DescriptorPool {
    pub fn new(capacity: u32) -> Self {
        DescriptorPool {
            descriptors: vec![RivetDescriptor::Null; capacity as usize],
            next_slot: 0,
            generation: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.descriptors.len() as u32
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn next_slot(&self) -> u32 {
        self.next_slot
    }

    /// Whether `count` slots can be reserved without rolling over. A count of zero always fits.
    pub fn can_reserve(
        &self,
        count: u32,
    ) -> bool {
        count <= self.capacity() - self.next_slot
    }

    /// Reserve `count` contiguous slots and return the first. Callers check `can_reserve` first
    /// and roll over when it fails, `reserve` itself never rolls over.
    pub fn reserve(
        &mut self,
        count: u32,
    ) -> RivetResult<u32> {
        if count > self.capacity() {
            return Err(RivetError::CapacityExceeded {
                required: count,
                capacity: self.capacity(),
            });
        }

        debug_assert!(
            self.can_reserve(count),
            "reserve() requires a successful can_reserve() call"
        );
        if !self.can_reserve(count) {
            return Err(RivetError::StringError(format!(
                "reserve({}) called with only {} slots remaining",
                count,
                self.capacity() - self.next_slot
            )));
        }

        let first_slot = self.next_slot;
        self.next_slot += count;
        Ok(first_slot)
    }

    /// Return unused slots at the end of the most recent reservation. `slot` becomes the next
    /// slot handed out. Only ever moves the cursor backwards.
    pub fn set_next_slot(
        &mut self,
        slot: u32,
    ) {
        debug_assert!(slot <= self.next_slot);
        self.next_slot = slot.min(self.next_slot);
    }

    pub fn roll_over(&mut self) {
        log::trace!(
            "descriptor pool rollover at slot {}/{}, generation {} -> {}",
            self.next_slot,
            self.capacity(),
            self.generation,
            self.generation + 1
        );
        self.next_slot = 0;
        self.generation += 1;
    }

    pub fn write(
        &mut self,
        first_slot: u32,
        descriptors: &[RivetDescriptor],
    ) {
        let first_slot = first_slot as usize;
        self.descriptors[first_slot..first_slot + descriptors.len()].copy_from_slice(descriptors);
    }

    pub fn descriptor(
        &self,
        slot: u32,
    ) -> RivetDescriptor {
        self.descriptors[slot as usize]
    }

    /// Stamp a slot range with the current generation
    pub fn table(
        &self,
        first_slot: u32,
        count: u32,
    ) -> RivetDescriptorTable {
        debug_assert!(first_slot + count <= self.next_slot);
        RivetDescriptorTable {
            generation: self.generation,
            first_slot,
            count,
        }
    }

    /// Validate that a table still refers to live slots. Tables from earlier generations were
    /// invalidated by a rollover.
    pub fn resolve(
        &self,
        table: &RivetDescriptorTable,
    ) -> RivetResult<u32> {
        if table.generation != self.generation {
            debug_assert!(
                false,
                "descriptor table from generation {} resolved at generation {}",
                table.generation, self.generation
            );
            return Err(RivetError::StaleHandle {
                table_generation: table.generation,
                pool_generation: self.generation,
            });
        }

        Ok(table.first_slot)
    }
}

/// A pool shared between recording contexts, typically the sampler pool. Samplers are heavily
/// interned so a single modest pool serves every context.
#[derive(Clone)]
pub struct SharedDescriptorPool {
    inner: Arc<Mutex<DescriptorPool>>,
}

impl SharedDescriptorPool {
    pub fn new(capacity: u32) -> Self {
        SharedDescriptorPool {
            inner: Arc::new(Mutex::new(DescriptorPool::new(capacity))),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().unwrap().generation()
    }

    /// Lock the pool for a reserve/write/intern sequence that must not interleave with other
    /// contexts
    pub fn lock(&self) -> MutexGuard<DescriptorPool> {
        self.inner.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_advances_cursor() {
        let mut pool = DescriptorPool::new(10);
        assert!(pool.can_reserve(8));
        let first = pool.reserve(8).unwrap();
        assert_eq!(first, 0);
        assert_eq!(pool.next_slot(), 8);
        assert!(pool.can_reserve(2));
        assert!(!pool.can_reserve(3));
    }

    #[test]
    fn zero_reservation_always_fits() {
        let mut pool = DescriptorPool::new(4);
        pool.reserve(4).unwrap();
        assert!(pool.can_reserve(0));
        assert_eq!(pool.reserve(0).unwrap(), 4);
    }

    #[test]
    fn rollover_resets_cursor_and_bumps_generation() {
        let mut pool = DescriptorPool::new(10);
        pool.reserve(8).unwrap();

        // 5 more slots do not fit, the caller is expected to roll over
        assert!(!pool.can_reserve(5));
        pool.roll_over();
        assert_eq!(pool.generation(), 1);

        let first = pool.reserve(5).unwrap();
        assert_eq!(first, 0);
        assert_eq!(pool.next_slot(), 5);
    }

    #[test]
    fn rollover_invalidates_tables() {
        let mut pool = DescriptorPool::new(10);
        pool.reserve(4).unwrap();
        let table = pool.table(0, 4);
        assert_eq!(pool.resolve(&table).unwrap(), 0);

        pool.roll_over();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pool.resolve(&table)
        }));
        // Release builds report the error, debug builds assert
        if let Ok(resolved) = result {
            assert!(matches!(
                resolved,
                Err(RivetError::StaleHandle {
                    table_generation: 0,
                    pool_generation: 1,
                })
            ));
        }
    }

    #[test]
    fn oversized_reservation_is_capacity_exceeded() {
        let mut pool = DescriptorPool::new(10);
        let result = pool.reserve(11);
        assert!(matches!(
            result,
            Err(RivetError::CapacityExceeded {
                required: 11,
                capacity: 10,
            })
        ));
        // The failed reservation did not consume anything
        assert_eq!(pool.next_slot(), 0);
    }

    #[test]
    fn set_next_slot_returns_unused_slots() {
        let mut pool = DescriptorPool::new(16);
        let first = pool.reserve(8).unwrap();
        // Only 3 of the 8 slots were actually used
        pool.set_next_slot(first + 3);
        assert_eq!(pool.next_slot(), 3);
        assert_eq!(pool.reserve(5).unwrap(), 3);
    }

    #[test]
    fn write_and_read_back() {
        let mut pool = DescriptorPool::new(8);
        let first = pool.reserve(2).unwrap();
        pool.write(
            first,
            &[
                RivetDescriptor::Sampler(rivet_api::RivetSamplerId(3)),
                RivetDescriptor::Null,
            ],
        );
        assert_eq!(
            pool.descriptor(first),
            RivetDescriptor::Sampler(rivet_api::RivetSamplerId(3))
        );
        assert_eq!(pool.descriptor(first + 1), RivetDescriptor::Null);
    }
}
