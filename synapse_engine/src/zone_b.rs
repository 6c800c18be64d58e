//! The UI thread's allocator: a bump pointer over node indices
//! `[split, capacity)`.
//!
//! Single-writer, so the bump word needs no CAS — only the UI thread ever
//! calls [`ZoneB::alloc`] or [`ZoneB::reset`], the same way only the UI
//! thread ever calls [`crate::bridge::Bridge`] methods.

use synapse_core::error::EngineError;

use crate::region::Region;

/// UI-thread-only handle onto Zone B's bump allocator.
pub struct ZoneB<'a> {
    region: &'a Region,
}

impl<'a> ZoneB<'a> {
    pub fn new(region: &'a Region) -> Self {
        Self { region }
    }

    /// Bump-allocate the next free Zone-B node index.
    pub fn alloc(&self) -> Result<u32, EngineError> {
        let index = self.region.zone_b_bump();
        if index as usize >= self.region.node_capacity() {
            return Err(EngineError::AllocExhausted);
        }
        self.region.set_zone_b_bump(index + 1);
        Ok(index)
    }

    /// Rewind the bump pointer back to the Zone-A/Zone-B split.
    ///
    /// Only legal when the audio thread is known to hold no live Zone-B
    /// references — in practice, only during a `HARD_RESET` handshake
    /// where the audio thread has already cleared the node list.
    pub fn reset(&self) {
        self.region.set_zone_b_bump(self.region.heap_split_index());
    }

    /// Fraction of Zone-B capacity currently allocated, in `0.0..=1.0`.
    pub fn utilization(&self) -> f64 {
        let split = self.region.heap_split_index() as f64;
        let capacity = self.region.node_capacity() as f64;
        if capacity <= split {
            return 1.0;
        }
        let used = self.region.zone_b_bump() as f64 - split;
        used / (capacity - split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn region() -> std::sync::Arc<Region> {
        Region::new(&EngineConfig { node_capacity: 10, zone_a_capacity: 8, ..EngineConfig::default() })
    }

    #[test]
    fn alloc_bumps_from_split_and_exhausts_at_capacity() {
        let region = region();
        let zone_b = ZoneB::new(&region);
        assert_eq!(zone_b.alloc().unwrap(), 8);
        assert_eq!(zone_b.alloc().unwrap(), 9);
        assert_eq!(zone_b.alloc(), Err(EngineError::AllocExhausted));
    }

    #[test]
    fn reset_rewinds_to_split() {
        let region = region();
        let zone_b = ZoneB::new(&region);
        zone_b.alloc().unwrap();
        zone_b.alloc().unwrap();
        zone_b.reset();
        assert_eq!(zone_b.alloc().unwrap(), 8);
    }

    #[test]
    fn utilization_tracks_allocations() {
        let region = region();
        let zone_b = ZoneB::new(&region);
        assert_eq!(zone_b.utilization(), 0.0);
        zone_b.alloc().unwrap();
        assert_eq!(zone_b.utilization(), 0.5);
        zone_b.alloc().unwrap();
        assert_eq!(zone_b.utilization(), 1.0);
    }
}
