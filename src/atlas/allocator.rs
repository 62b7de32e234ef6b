#[allow(unused_imports)]
use log::{debug, trace};

use crate::error::{AtlasError, Result};

/// Hands out slot ids in `[0, capacity)`.
///
/// Fresh ids come from a monotonic counter. Released ids go onto a free list and are
/// handed back most-recently-released first, before the counter advances again.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    capacity: u32,
    next_counter: u32,
    free_list: Vec<u32>,
    // Indexed by id for every id below next_counter
    live: Vec<bool>,
    live_count: u32,
}

impl SlotAllocator {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next_counter: 0,
            free_list: Vec::new(),
            live: Vec::new(),
            live_count: 0,
        }
    }

    pub fn acquire(&mut self) -> Result<u32> {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None => {
                if self.next_counter >= self.capacity {
                    return Err(AtlasError::AtlasFull {
                        capacity: self.capacity,
                    });
                }
                let id = self.next_counter;
                self.next_counter += 1;
                self.live.push(false);
                id
            }
        };

        self.live[id as usize] = true;
        self.live_count += 1;
        trace!("SlotAllocator: acquired {id} ({} live)", self.live_count);
        Ok(id)
    }

    pub fn release(&mut self, id: u32) -> Result<()> {
        if id >= self.next_counter {
            return Err(AtlasError::InvalidSlot(id));
        }
        if !self.live[id as usize] {
            return Err(AtlasError::DoubleRelease(id));
        }

        self.live[id as usize] = false;
        self.live_count -= 1;
        self.free_list.push(id);
        trace!("SlotAllocator: released {id} ({} live)", self.live_count);
        Ok(())
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.live.get(id as usize).copied().unwrap_or(false)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn live_count(&self) -> u32 {
        self.live_count
    }

    /// Highest id ever issued + 1
    pub fn high_water_mark(&self) -> u32 {
        self.next_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut alloc = SlotAllocator::new(4);
        let ids: Vec<u32> = (0..4).map(|_| alloc.acquire().unwrap()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(alloc.live_count(), 4);
    }

    #[test]
    fn test_full_on_capacity_plus_one() {
        let mut alloc = SlotAllocator::new(3);
        for _ in 0..3 {
            assert!(alloc.acquire().is_ok());
        }
        assert!(matches!(
            alloc.acquire(),
            Err(AtlasError::AtlasFull { capacity: 3 })
        ));
    }

    #[test]
    fn test_release_then_acquire_reuses_id() {
        let mut alloc = SlotAllocator::new(8);
        for _ in 0..5 {
            alloc.acquire().unwrap();
        }
        alloc.release(2).unwrap();
        assert_eq!(alloc.acquire().unwrap(), 2);
    }

    #[test]
    fn test_reuse_is_lifo() {
        let mut alloc = SlotAllocator::new(8);
        for _ in 0..4 {
            alloc.acquire().unwrap();
        }
        alloc.release(0).unwrap();
        alloc.release(3).unwrap();
        alloc.release(1).unwrap();

        assert_eq!(alloc.acquire().unwrap(), 1);
        assert_eq!(alloc.acquire().unwrap(), 3);
        assert_eq!(alloc.acquire().unwrap(), 0);
        assert_eq!(alloc.acquire().unwrap(), 4);
    }

    #[test]
    fn test_full_atlas_recovers_after_release() {
        let mut alloc = SlotAllocator::new(2);
        alloc.acquire().unwrap();
        alloc.acquire().unwrap();
        assert!(alloc.acquire().is_err());

        alloc.release(0).unwrap();
        assert_eq!(alloc.acquire().unwrap(), 0);
    }

    #[test]
    fn test_double_release() {
        let mut alloc = SlotAllocator::new(4);
        let id = alloc.acquire().unwrap();
        alloc.release(id).unwrap();
        assert!(matches!(alloc.release(id), Err(AtlasError::DoubleRelease(0))));

        // the failed release must not have pushed a second copy
        assert_eq!(alloc.acquire().unwrap(), 0);
        assert_eq!(alloc.acquire().unwrap(), 1);
    }

    #[test]
    fn test_release_never_issued() {
        let mut alloc = SlotAllocator::new(4);
        alloc.acquire().unwrap();
        assert!(matches!(alloc.release(1), Err(AtlasError::InvalidSlot(1))));
        assert!(matches!(alloc.release(99), Err(AtlasError::InvalidSlot(99))));
    }

    #[test]
    fn test_live_ids_stay_unique_under_churn() {
        let mut alloc = SlotAllocator::new(6);
        let mut live: Vec<u32> = Vec::new();

        // deterministic acquire/release pattern
        for step in 0..200u32 {
            if step % 3 == 2 && !live.is_empty() {
                let victim = live.remove((step as usize * 7) % live.len());
                alloc.release(victim).unwrap();
            } else if let Ok(id) = alloc.acquire() {
                assert!(id < 6);
                assert!(!live.contains(&id));
                live.push(id);
            } else {
                assert_eq!(live.len(), 6);
            }
            assert_eq!(alloc.live_count() as usize, live.len());
        }
    }
}
