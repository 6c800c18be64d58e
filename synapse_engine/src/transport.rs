//! Tempo derivation and the per-block drive loop.
//!
//! [`Transport`] is the audio thread's single entry point: one call per
//! render block drains the command ring, applies whatever it finds, walks
//! the [`crate::cursor::Cursor`] across the resulting window, and advances
//! the playhead. Everything here runs on the realtime thread and must
//! stay allocation-free and wait-free — the only contention is the ring's
//! head/tail and Zone A's free-list head, both already bounded-CAS.

use std::sync::Arc;

use synapse_core::error::EngineError;

use crate::{
    command::Command,
    cursor::{Cursor, NodeEvent},
    id_table::IdTable,
    node::NodeRef,
    node_list,
    region::Region,
    ring::RingConsumer,
    synapse_table::SynapseTable,
    zone_a::ZoneA,
};

/// Whole-number samples per tick at the given sample rate, BPM, and PPQ.
/// Recompute whenever any of the three changes; see §4.8.
#[inline]
pub fn samples_per_tick(sample_rate: f64, bpm: f64, ppq: u32) -> u32 {
    ((sample_rate * 60.0) / (bpm * ppq as f64)) as u32
}

/// Ticks elapsed over `samples` samples, truncated toward zero.
#[inline]
pub fn ticks_for_samples(samples: u32, samples_per_tick: u32) -> u32 {
    if samples_per_tick == 0 {
        0
    } else {
        samples / samples_per_tick
    }
}

/// Sample offset within a block of an event at `event_tick`, relative to
/// `block_start_tick`.
#[inline]
pub fn sample_offset(event_tick: u32, block_start_tick: u32, samples_per_tick: u32) -> u32 {
    event_tick.saturating_sub(block_start_tick).saturating_mul(samples_per_tick)
}

/// The audio thread's handle onto the engine: owns the traversal cursor
/// and drives one block at a time.
pub struct Transport {
    region: Arc<Region>,
    cursor: Cursor,
    max_drain_per_block: u32,
    rng_seed: u32,
}

impl Transport {
    pub fn new(region: Arc<Region>, rng_seed: u32, quota: u32, max_drain_per_block: u32) -> Self {
        let cursor = Cursor::new(rng_seed, quota);
        Self { region, cursor, max_drain_per_block, rng_seed }
    }

    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    /// Drain and apply pending commands, then walk the cursor across
    /// `block_samples` worth of ticks, invoking `on_event` for every
    /// note-on/note-off, and finally advance the playhead.
    pub fn process_block(&mut self, block_samples: u32, mut on_event: impl FnMut(NodeEvent)) {
        let consumer = RingConsumer::new(&self.region);
        let region = Arc::clone(&self.region);
        let mut saw_hard_reset = false;
        consumer.drain(self.max_drain_per_block, |command, seq| {
            if apply_command(&region, command, seq) {
                saw_hard_reset = true;
            }
        });
        if saw_hard_reset {
            // `HARD_RESET` tombstones every node and clears the synapse/ID
            // tables out from under whatever the cursor was pointing at;
            // without this it would keep walking a stale physical-chain
            // position (possibly a Zone-A slot already handed back out to a
            // fresh INSERT) and consulting a synapse table that no longer
            // has the entries its last resolution depended on.
            self.cursor.reset(self.rng_seed);
        }

        let sr = self.region.sample_rate();
        let bpm = self.region.bpm();
        let ppq = self.region.ppq();
        let spt = samples_per_tick(sr, bpm, ppq).max(1);

        let block_start_tick = self.region.playhead_tick();
        let tick_delta = ticks_for_samples(block_samples, spt);
        let block_end_tick = block_start_tick.saturating_add(tick_delta);

        let table = SynapseTable::new(&self.region);
        let (fires, quota_exhausted) =
            self.cursor.process_block(&self.region, &table, block_start_tick, block_end_tick, &mut on_event);
        for _ in 0..fires {
            self.region.increment_fire_counter();
        }
        if quota_exhausted {
            // Starvation, not an Integrity fault (§7): a pathological or
            // merely dense self-loop graph trips the quota routinely, so
            // this is surfaced only through the stall counter, never the
            // header error flag.
            self.region.increment_stall_counter();
        }

        self.region.set_playhead_tick(block_end_tick);
    }
}

/// Apply a single drained command to the region. Any node-graph mutation
/// funnels through here, keeping `Transport::process_block` focused on the
/// per-block schedule. Returns `true` for `HARD_RESET`, so the caller knows
/// to reset its own traversal state alongside the region's.
fn apply_command(region: &Region, command: Command, seq: u32) -> bool {
    let zone_a = ZoneA::new(region);
    let ids = IdTable::new(region);
    let table = SynapseTable::new(region);

    match command {
        Command::Insert { ptr, source_id, after_ptr } => {
            // The node itself (opcode/pitch/velocity/.../seq) was already
            // written by the UI into its Zone-B allocation before this
            // command was enqueued; the ring's release/acquire makes those
            // writes visible here. Linking, registration, and flags are
            // the only things left for the audio thread to do.
            NodeRef::new(region, ptr).set_flag(crate::constants::FLAG_ACTIVE);
            node_list::insert(region, ptr, after_ptr);
            if ids.register(source_id, ptr).is_err() {
                region.set_error_flag(EngineError::InvalidPointer.code());
            }
            false
        }
        Command::Patch { source_id, field, value } => {
            let Some(ptr) = ids.resolve(source_id) else {
                region.set_error_flag(EngineError::InvalidPointer.code());
                return false;
            };
            let node = NodeRef::new(region, ptr);
            use crate::command::PatchField;
            match field {
                PatchField::Pitch => node.set_pitch(value as u8),
                PatchField::Velocity => node.set_velocity(value as u8),
                PatchField::Duration => node.set_duration(value),
                PatchField::Flags => node.set_flags(value),
                PatchField::BaseTick => {
                    node_list::unlink(region, ptr);
                    node.set_base_tick(value);
                    node_list::insert(region, ptr, crate::constants::NULL);
                }
            }
            false
        }
        Command::Delete { ptr } => {
            if !node_list::unlink(region, ptr) {
                region.set_error_flag(EngineError::InvalidPointer.code());
                return false;
            }
            let node = NodeRef::new(region, ptr);
            let source_id = node.source_id();
            table.disconnect_all_from(ptr);
            table.disconnect_all_to(ptr);
            ids.unregister(source_id);
            if region.is_zone_a(ptr) {
                node.clear();
                zone_a.free(ptr);
            } else {
                node.set_flag(crate::constants::FLAG_TOMBSTONE);
                node.clear_flag(crate::constants::FLAG_ACTIVE);
            }
            false
        }
        Command::Connect { source, target, weight, jitter } => {
            if let Err(err) = table.connect(source, target, weight, jitter) {
                region.set_error_flag(err.code());
            }
            false
        }
        Command::Disconnect { source, target } => {
            table.disconnect(source, target);
            false
        }
        Command::SetBpm { bpm_fixed } => {
            region.set_bpm_fixed(bpm_fixed);
            false
        }
        Command::SetPlayhead { tick } => {
            region.set_playhead_tick(tick);
            false
        }
        Command::HardReset => {
            let mut cursor = region.head_pointer();
            while cursor != crate::constants::NULL {
                let node = NodeRef::new(region, cursor);
                let next = node.next();
                if region.is_zone_a(cursor) {
                    node.clear();
                    zone_a.free(cursor);
                }
                cursor = next;
            }
            region.set_head_pointer(crate::constants::NULL);
            table.clear();
            ids.clear();
            region.increment_reset_generation();
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bridge::Bridge, config::EngineConfig};

    #[test]
    fn samples_per_tick_matches_known_value() {
        assert_eq!(samples_per_tick(44_100.0, 120.0, 960), 22);
        assert_eq!(samples_per_tick(48_000.0, 120.0, 960), 25);
    }

    #[test]
    fn single_note_scenario_matches_spec_example() {
        let config = EngineConfig {
            node_capacity: 1000,
            zone_a_capacity: 500,
            sample_rate: 44_100.0,
            bpm: 120.0,
            ppq: 960,
            ..EngineConfig::default()
        };
        let region = Region::new(&config);
        let bridge = Bridge::new(Arc::clone(&region));
        bridge
            .insert(crate::constants::OPCODE_NOTE, 69, 100, 100, 0, false, 1, crate::constants::NULL)
            .unwrap();

        let mut transport = Transport::new(Arc::clone(&region), 1, crate::constants::DEFAULT_QUOTA, 64);
        let mut events = Vec::new();
        transport.process_block(128, |e| events.push(e));

        assert_eq!(region.playhead_tick(), 5);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], NodeEvent::NoteOn { pitch: 69, velocity: 100, .. }));
    }

    #[test]
    fn ring_overflow_scenario_applies_only_what_fit() {
        let config = EngineConfig { ring_capacity: 64, ..EngineConfig::default() };
        let region = Region::new(&config);
        let bridge = Bridge::new(Arc::clone(&region));

        let mut last_result = Ok(());
        for i in 0..65u32 {
            last_result = bridge.insert(crate::constants::OPCODE_NOTE, 60, 100, 10, i, false, 0, crate::constants::NULL);
        }
        assert!(last_result.is_err());

        let mut transport = Transport::new(Arc::clone(&region), 1, crate::constants::DEFAULT_QUOTA, 128);
        transport.process_block(128, |_| {});
        assert_eq!(node_list::collect(&region).len(), 64);
    }

    #[test]
    fn quota_stop_scenario_halts_after_exactly_quota_fires() {
        let config = EngineConfig { node_capacity: 16, zone_a_capacity: 8, ..EngineConfig::default() };
        let region = Region::new(&config);
        let bridge = Bridge::new(Arc::clone(&region));
        let ptr = bridge
            .insert(crate::constants::OPCODE_NOTE, 60, 100, 1, 0, false, 1, crate::constants::NULL)
            .unwrap();

        let mut transport = Transport::new(Arc::clone(&region), 1, 256, 64);
        transport.process_block(128, |_| {});

        let table = SynapseTable::new(&region);
        table.connect(ptr, ptr, crate::constants::MAX_WEIGHT, 0).unwrap();

        let before = region.fire_counter();
        transport.process_block(128, |_| {});
        assert_eq!(region.fire_counter() - before, 256);
        assert_eq!(region.stall_counter(), 1);
        assert!(region.playhead_tick() > 0);
    }

    #[test]
    fn hard_reset_clears_list_synapses_and_ids_then_lets_zone_b_reclaim() {
        let config = EngineConfig { node_capacity: 16, zone_a_capacity: 8, ..EngineConfig::default() };
        let region = Region::new(&config);
        let bridge = Bridge::new(Arc::clone(&region));
        let zone_a_ptr = {
            let zone_a = crate::zone_a::ZoneA::new(&region);
            let ptr = zone_a.alloc().unwrap();
            NodeRef::new(&region, ptr).init(crate::constants::OPCODE_NOTE, 60, 100, 1, 0, crate::constants::FLAG_ACTIVE, 0, 0);
            node_list::insert(&region, ptr, crate::constants::NULL);
            ptr
        };
        let zone_b_ptr = bridge
            .insert(crate::constants::OPCODE_NOTE, 64, 100, 1, 1, false, 3, crate::constants::NULL)
            .unwrap();
        let table = SynapseTable::new(&region);
        table.connect(zone_a_ptr, zone_b_ptr, 500, 0).unwrap();

        let mut transport = Transport::new(Arc::clone(&region), 1, crate::constants::DEFAULT_QUOTA, 64);
        transport.process_block(0, |_| {});
        assert_eq!(node_list::collect(&region).len(), 2);

        bridge.hard_reset().unwrap();
        assert!(!bridge.try_reclaim_zone_b());
        transport.process_block(0, |_| {});

        assert_eq!(region.head_pointer(), crate::constants::NULL);
        assert!(node_list::collect(&region).is_empty());
        assert!(table.candidates(zone_a_ptr).is_empty());
        assert!(bridge.try_reclaim_zone_b());
        assert_eq!(bridge.zone_b_utilization(), 0.0);

        let zone_a = crate::zone_a::ZoneA::new(&region);
        assert_eq!(zone_a.alloc().unwrap(), zone_a_ptr);
    }

    /// `HARD_RESET` must reset the cursor's own traversal state, not just
    /// the region: otherwise its `current` pointer would keep referencing a
    /// Zone-A slot that HARD_RESET just freed and a later INSERT could
    /// reuse for something unrelated, and a stale `jitter_target` could
    /// silently delay a same-numbered fresh node that never asked for it.
    #[test]
    fn hard_reset_clears_stale_cursor_state_before_the_next_block() {
        let config = EngineConfig { node_capacity: 16, zone_a_capacity: 8, ..EngineConfig::default() };
        let region = Region::new(&config);
        let bridge = Bridge::new(Arc::clone(&region));
        let ptr = bridge
            .insert(crate::constants::OPCODE_NOTE, 60, 100, 1, 0, false, 1, crate::constants::NULL)
            .unwrap();
        let table = SynapseTable::new(&region);
        table.connect(ptr, ptr, crate::constants::MAX_WEIGHT, 0).unwrap();

        let mut transport = Transport::new(Arc::clone(&region), 1, 4, 64);
        transport.process_block(128, |_| {});
        // The self-loop has run the cursor's `current` several hops deep
        // into the (now about-to-be-freed) node `ptr`.
        assert_ne!(transport.cursor.current(), crate::constants::NULL);

        bridge.hard_reset().unwrap();
        transport.process_block(0, |_| {});
        assert_eq!(transport.cursor.current(), crate::constants::NULL);

        // A fresh insert after the reset must be scheduled on its own
        // terms, not filtered through any leftover jitter/loop-offset state.
        // `base_tick` is pinned to the playhead so it falls inside the very
        // next block's window regardless of how far HARD_RESET left it.
        let fresh = bridge
            .insert(crate::constants::OPCODE_NOTE, 72, 100, 1, region.playhead_tick(), false, 9, crate::constants::NULL)
            .unwrap();
        let mut events = Vec::new();
        transport.process_block(128, |e| events.push(e));
        assert!(events.iter().any(|e| matches!(e, NodeEvent::NoteOn { ptr: p, pitch: 72, .. } if *p == fresh)));
    }
}
