//! The audio thread's allocator: a Treiber-stack free-list over node
//! indices `[0, split)`, built entirely from a single CAS'd header word.
//!
//! The free-list head is packed as `(generation << 16) | index`, exactly as
//! a lock-free free-list over an array (rather than over owned boxed nodes)
//! must be: since freed slots are reused in place, a plain index is
//! vulnerable to the ABA problem if a thread is preempted between reading
//! the head and CAS-ing it back — the 16-bit generation counter bumped on
//! every push makes a stale index visible as a CAS failure instead of a
//! silent corruption.

use std::sync::atomic::Ordering;

use synapse_core::error::EngineError;

use crate::{constants::*, node::NodeRef, region::Region};

const INDEX_BITS: u32 = 16;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

#[inline]
fn pack(generation: u32, index: u32) -> u32 {
    debug_assert!(index <= INDEX_MASK, "zone-A capacity exceeds 16-bit index range");
    (generation << INDEX_BITS) | (index & INDEX_MASK)
}

#[inline]
fn unpack(word: u32) -> (u32, u32) {
    (word >> INDEX_BITS, word & INDEX_MASK)
}

/// Audio-thread-only handle onto Zone A's free-list.
///
/// Holding a `ZoneA` does not grant exclusive access by itself — the
/// invariant that only the audio thread ever calls `alloc`/`free` is
/// enforced by convention, the same way the region's ordering contract is:
/// see the module docs on [`crate::region::Region`].
pub struct ZoneA<'a> {
    region: &'a Region,
}

impl<'a> ZoneA<'a> {
    pub fn new(region: &'a Region) -> Self {
        Self { region }
    }

    /// Pop a node index off the free-list, or [`EngineError::AllocExhausted`]
    /// if Zone A has nothing free.
    pub fn alloc(&self) -> Result<u32, EngineError> {
        loop {
            let head_word = self.region.zone_a_free_head(Ordering::Acquire);
            let (generation, index) = unpack(head_word);
            if index == NULL {
                return Err(EngineError::AllocExhausted);
            }
            let next = NodeRef::new(self.region, index).next();
            let new_head = pack(generation.wrapping_add(1), next);
            match self.region.cas_zone_a_free_head(
                head_word,
                new_head,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(index),
                Err(_) => continue,
            }
        }
    }

    /// Push a node index back onto the free-list. The node's payload should
    /// already have been cleared by the caller.
    pub fn free(&self, index: u32) {
        debug_assert_ne!(index, NULL);
        loop {
            let head_word = self.region.zone_a_free_head(Ordering::Acquire);
            let (generation, head_index) = unpack(head_word);
            NodeRef::new(self.region, index).set_next(head_index);
            let new_head = pack(generation.wrapping_add(1), index);
            match self.region.cas_zone_a_free_head(
                head_word,
                new_head,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn region() -> std::sync::Arc<Region> {
        Region::new(&EngineConfig { node_capacity: 16, zone_a_capacity: 8, ..EngineConfig::default() })
    }

    #[test]
    fn alloc_drains_every_free_slot_exactly_once() {
        let region = region();
        let zone_a = ZoneA::new(&region);
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(zone_a.alloc().unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..8).collect::<Vec<u32>>());
        assert_eq!(zone_a.alloc(), Err(EngineError::AllocExhausted));
    }

    #[test]
    fn freed_node_is_reallocated() {
        let region = region();
        let zone_a = ZoneA::new(&region);
        let first = zone_a.alloc().unwrap();
        zone_a.free(first);
        let second = zone_a.alloc().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn generation_counter_advances_on_every_push() {
        let region = region();
        let zone_a = ZoneA::new(&region);
        let ptr = zone_a.alloc().unwrap();
        let head_before = region.zone_a_free_head(Ordering::Acquire);
        zone_a.free(ptr);
        let head_after = region.zone_a_free_head(Ordering::Acquire);
        let (gen_before, _) = unpack(head_before);
        let (gen_after, _) = unpack(head_after);
        assert_ne!(gen_before, gen_after);
    }
}
