//! The audio-thread traversal cursor: scans the node list each render block
//! to emit note events, and separately walks forward through the explicit
//! chain to resolve synapses once it runs out.
//!
//! Note emission (§4.9 step 4) and synapse resolution (§4.9 step 5) are two
//! different operations over two different relations (§4, "Design notes"):
//! the list never grows or rewires itself to express a loop, so emission
//! must re-scan from head every block rather than resume from wherever a
//! prior block's traversal left off — a node's `note_off` can fall in a
//! later block than its `note_on` even after the cursor has already moved
//! past it while resolving synapses. `current` therefore tracks only the
//! physical-chain position used for step 5; it plays no part in deciding
//! what gets emitted.
//!
//! The cursor tracks a `loop_offset`, accumulated every time a synapse fire
//! sends it back to an earlier node, and adds that offset to every node's
//! stored `base_tick` before comparing it against the current block
//! window. A barrier node's `duration` is the loop's cycle length (see the
//! glossary), so jumping across a barrier advances the offset by exactly
//! one cycle and the pattern repeats with the same period forever.
//!
//! This keeps every node's `base_tick` literal and loop-invariant while
//! still producing an absolute, monotonically advancing schedule, which is
//! what makes `P4` (deterministic replay for a fixed seed) hold even
//! across an arbitrary number of loop iterations.

use synapse_core::random::XorShift32;

use crate::{constants::*, node::NodeRef, region::Region, synapse_table::SynapseTable};

/// A single emitted note event, passed to the caller's realtime callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    NoteOn { ptr: u32, pitch: u8, velocity: u8, duration: u32, base_tick: u32, flags: u32, source_id: u32, seq: u32, tick_offset: u32 },
    NoteOff { ptr: u32, pitch: u8, tick_offset: u32 },
}

/// Per-block traversal state carried by the audio thread between calls to
/// [`crate::transport::Transport::process_block`].
pub struct Cursor {
    /// Physical-chain position for step 5 (synapse resolution) only.
    current: u32,
    loop_offset: u32,
    /// A single outstanding delay (§4.9 step 5e): the node it applies to,
    /// the `loop_offset` value in effect when it was set (so a later lap
    /// around the same physical node doesn't inherit a stale delay), and
    /// the number of ticks to add before that one occurrence is scheduled.
    jitter_target: u32,
    jitter_loop_offset: u32,
    pending_jitter: u32,
    rng: XorShift32,
    quota: u32,
}

impl Cursor {
    pub fn new(seed: u32, quota: u32) -> Self {
        Self {
            current: NULL,
            loop_offset: 0,
            jitter_target: NULL,
            jitter_loop_offset: 0,
            pending_jitter: 0,
            rng: XorShift32::new(seed),
            quota,
        }
    }

    /// Run one render block: scan the whole list from head for note-on/off
    /// emission, then advance the physical-chain cursor and resolve
    /// synapses as needed to keep it from running dry.
    ///
    /// Returns the number of synapse fires performed this block, and
    /// whether the cursor hit the per-block quota (§4.9 step 5a) rather
    /// than running out of candidates naturally. A quota hit is not an
    /// error (§7 "Starvation") — it is this design's only loop guard, since
    /// nothing else distinguishes a pathological cycle from a graph that is
    /// simply still producing candidates — so `fires` always reflects every
    /// fire actually performed, even on the block that trips the quota.
    pub fn process_block(
        &mut self,
        region: &Region,
        table: &SynapseTable,
        block_start_tick: u32,
        block_end_tick: u32,
        mut on_event: impl FnMut(NodeEvent),
    ) -> (u32, bool) {
        self.emit_from_head(region, block_start_tick, block_end_tick, &mut on_event);

        if self.current == NULL {
            self.current = region.head_pointer();
        }
        self.resolve(region, table, block_end_tick)
    }

    /// The effective schedule tick of `ptr`: its literal `base_tick` plus
    /// the loop offset, plus any outstanding jitter delay if `ptr` is the
    /// one node it currently applies to.
    fn effective_tick(&self, node: &NodeRef) -> u32 {
        let mut tick = node.base_tick().saturating_add(self.loop_offset);
        if node.ptr() == self.jitter_target && self.loop_offset == self.jitter_loop_offset {
            tick = tick.saturating_add(self.pending_jitter);
        }
        tick
    }

    /// §4.9 step 4: walk the node list from head, emitting `note_on` for
    /// every active, unmuted node whose effective tick falls in this
    /// block's window, and `note_off` for every such node whose effective
    /// tick plus duration does.
    fn emit_from_head(
        &self,
        region: &Region,
        block_start_tick: u32,
        block_end_tick: u32,
        on_event: &mut impl FnMut(NodeEvent),
    ) {
        let mut ptr = region.head_pointer();
        while ptr != NULL {
            let node = NodeRef::new(region, ptr);
            if node.is_active() && !node.is_tombstoned() {
                let tick = self.effective_tick(&node);
                if !node.is_muted() && tick >= block_start_tick && tick < block_end_tick {
                    on_event(NodeEvent::NoteOn {
                        ptr: node.ptr(),
                        pitch: node.pitch(),
                        velocity: node.velocity(),
                        duration: node.duration(),
                        base_tick: node.base_tick(),
                        flags: node.flags(),
                        source_id: node.source_id(),
                        seq: node.seq(),
                        tick_offset: tick - block_start_tick,
                    });
                }
                let off_tick = tick.saturating_add(node.duration());
                if !node.is_muted() && off_tick >= block_start_tick && off_tick < block_end_tick {
                    on_event(NodeEvent::NoteOff { ptr: node.ptr(), pitch: node.pitch(), tick_offset: off_tick - block_start_tick });
                }
            }
            ptr = node.next();
        }
    }

    /// §4.9 step 5: advance `current` along the explicit chain as far as
    /// this block's window reaches, resolving a synapse (and jumping to the
    /// chosen target) every time the chain runs out before the window does.
    fn resolve(&mut self, region: &Region, table: &SynapseTable, block_end_tick: u32) -> (u32, bool) {
        let mut fires = 0u32;

        loop {
            if self.current == NULL {
                return (fires, false);
            }

            let node = NodeRef::new(region, self.current);
            let tick = node.base_tick().saturating_add(self.loop_offset);
            if tick >= block_end_tick {
                return (fires, false);
            }

            let next = node.next();
            if next != NULL {
                self.current = next;
                continue;
            }

            if fires >= self.quota {
                return (fires, true);
            }

            let candidates = table.candidates(self.current);
            if candidates.is_empty() {
                return (fires, false);
            }

            let total_weight: u32 = candidates.as_slice().iter().map(|c| c.weight).sum();
            let choice = if total_weight == 0 { 0 } else { self.rng.next_below(total_weight) };
            let mut accumulator = 0u32;
            let mut chosen = candidates[0];
            for candidate in candidates.as_slice() {
                accumulator += candidate.weight;
                if choice < accumulator {
                    chosen = *candidate;
                    break;
                }
            }

            if node.opcode() == OPCODE_BARRIER {
                self.loop_offset = self.loop_offset.saturating_add(node.duration());
            }
            self.jitter_target = chosen.target;
            self.jitter_loop_offset = self.loop_offset;
            self.pending_jitter = chosen.jitter;
            self.current = chosen.target;
            fires += 1;
        }
    }

    /// Reset all traversal state, e.g. on `HARD_RESET`.
    pub fn reset(&mut self, seed: u32) {
        self.current = NULL;
        self.loop_offset = 0;
        self.jitter_target = NULL;
        self.jitter_loop_offset = 0;
        self.pending_jitter = 0;
        self.rng = XorShift32::new(seed);
    }

    pub fn current(&self) -> u32 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::node_list;

    fn setup() -> (std::sync::Arc<Region>, ) {
        (Region::new(&EngineConfig { node_capacity: 16, zone_a_capacity: 8, ..EngineConfig::default() }),)
    }

    #[test]
    fn single_note_emits_note_on_once() {
        let (region,) = setup();
        NodeRef::new(&region, 1).init(OPCODE_NOTE, 69, 100, 100, 0, FLAG_ACTIVE, 1, 1);
        node_list::insert(&region, 1, NULL);

        let table = SynapseTable::new(&region);
        let mut cursor = Cursor::new(1, DEFAULT_QUOTA);
        let mut events = Vec::new();
        let (fires, quota_exhausted) = cursor.process_block(&region, &table, 0, 5, |e| events.push(e));

        assert_eq!(fires, 0);
        assert!(!quota_exhausted);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], NodeEvent::NoteOn { pitch: 69, velocity: 100, .. }));
    }

    #[test]
    fn muted_node_emits_nothing() {
        let (region,) = setup();
        NodeRef::new(&region, 1).init(OPCODE_NOTE, 69, 100, 100, 0, FLAG_ACTIVE | FLAG_MUTED, 1, 1);
        node_list::insert(&region, 1, NULL);

        let table = SynapseTable::new(&region);
        let mut cursor = Cursor::new(1, DEFAULT_QUOTA);
        let mut events = Vec::new();
        cursor.process_block(&region, &table, 0, 5, |e| events.push(e));
        assert!(events.is_empty());
    }

    /// A(base_tick=0, duration=480) -> B(base_tick=480) linked directly (no
    /// synapse involved). The first block only reaches tick 5, so it must
    /// emit A's `note_on` and nothing else; a later block spanning tick 480
    /// must still emit A's `note_off` even though the cursor walked past A
    /// to resolve synapses long before that block runs.
    #[test]
    fn note_off_fires_in_a_later_block_after_the_cursor_has_moved_on() {
        let (region,) = setup();
        NodeRef::new(&region, 1).init(OPCODE_NOTE, 60, 100, 480, 0, FLAG_ACTIVE, 1, 1);
        NodeRef::new(&region, 2).init(OPCODE_NOTE, 64, 100, 10, 480, FLAG_ACTIVE, 2, 2);
        node_list::insert(&region, 1, NULL);
        node_list::insert(&region, 2, NULL);

        let table = SynapseTable::new(&region);
        let mut cursor = Cursor::new(1, DEFAULT_QUOTA);

        let mut events = Vec::new();
        cursor.process_block(&region, &table, 0, 5, |e| events.push(e));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], NodeEvent::NoteOn { ptr: 1, .. }));

        let mut events = Vec::new();
        cursor.process_block(&region, &table, 475, 485, |e| events.push(e));
        assert!(events.iter().any(|e| matches!(e, NodeEvent::NoteOff { ptr: 1, .. })));
        assert!(events.iter().any(|e| matches!(e, NodeEvent::NoteOn { ptr: 2, .. })));
    }

    /// A self-loop with a jitter of 10 must re-fire the node 10 ticks after
    /// its loop-back, not immediately: a block covering only
    /// `[loop_tick, loop_tick + jitter)` must stay silent, and the
    /// `note_on` must appear once the window reaches `loop_tick + jitter`.
    /// Subtracting jitter instead of adding it would have folded the
    /// re-fire back to tick 0, where it would already have fallen out of
    /// every later block's window.
    #[test]
    fn jitter_delays_the_refire_rather_than_advancing_it() {
        let (region,) = setup();
        NodeRef::new(&region, 1).init(OPCODE_NOTE, 60, 100, 1, 0, FLAG_ACTIVE, 0, 1);
        node_list::insert(&region, 1, NULL);

        let table = SynapseTable::new(&region);
        table.connect(1, 1, MAX_WEIGHT, 10).unwrap();

        let mut cursor = Cursor::new(1, 1);
        let mut events = Vec::new();
        cursor.process_block(&region, &table, 0, 1, |e| events.push(e));
        assert!(events.iter().any(|e| matches!(e, NodeEvent::NoteOn { ptr: 1, .. })));

        let mut events = Vec::new();
        cursor.process_block(&region, &table, 1, 11, |e| events.push(e));
        assert!(events.iter().any(|e| matches!(e, NodeEvent::NoteOn { ptr: 1, .. })));
    }

    #[test]
    fn stochastic_choice_respects_weight_ratio() {
        let mut y_count = 0u32;
        let mut z_count = 0u32;
        let mut rng = XorShift32::new(42);
        for _ in 0..10_000 {
            let total = 1000u32;
            let choice = rng.next_below(total);
            if choice < 250 {
                y_count += 1;
            } else {
                z_count += 1;
            }
        }
        let ratio = y_count as f64 / z_count as f64;
        assert!((ratio - (1.0 / 3.0)).abs() < 0.03);
    }
}
