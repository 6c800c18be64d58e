//! UI-thread submission helpers (C10).
//!
//! [`Bridge`] is the only thing on the UI side that is allowed to touch the
//! region directly: it turns a high-level authoring call into a Zone-B
//! allocation (for INSERT) plus a single command pushed onto the ring. It
//! never links a node into the list, writes a synapse slot, or touches the
//! ID table itself — all of that is exclusively the audio thread's job (see
//! [`crate::transport::Transport`]), reached only through the commands
//! Bridge encodes.
//!
//! The design notes (§9) call out an "ad-hoc pointer-vs-id duality" in the
//! original program: some calls take a raw node pointer, others a stable
//! source id. Here that is unified at this one seam: [`NodeHandle`] lets a
//! caller name a node either way, and Bridge resolves a `SourceId` against a
//! local cache it fills in at INSERT time — not against the region's ID
//! table, which is audio-thread-owned and not meant to be read from the UI
//! side (§5).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    command::{Command, PatchField},
    constants::*,
    error::{EngineError, Result},
    node::NodeRef,
    region::Region,
    ring::RingProducer,
    zone_b::ZoneB,
};

/// A way to name a node from the UI side: either its raw pointer (e.g. one
/// just returned by [`Bridge::insert`]) or the stable source id it was
/// registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeHandle {
    Pointer(u32),
    SourceId(u32),
}

/// The UI thread's entry point onto a [`Region`].
///
/// Holds no state that the audio thread reads: `seq` is a private counter
/// for command sequence numbers, and `local_ids` is a cache kept purely for
/// this thread's own convenience when callers prefer to address nodes by
/// source id. Submission itself is synchronous and non-blocking; whether an
/// INSERT's node is actually linked into the list happens on the audio
/// thread's next block (see `P3`).
pub struct Bridge {
    region: Arc<Region>,
    seq: Cell<u32>,
    local_ids: RefCell<HashMap<u32, u32>>,
    pending_reset_generation: Cell<Option<u32>>,
}

/// Sequence numbers are strictly increasing modulo 2^31 (invariant 7).
const SEQ_MODULUS: u32 = 1 << 31;

/// A full ring is the one core-level fault a UI caller is expected to
/// handle directly (retry submission); everything else is a lower-level
/// allocator or traversal fault surfaced as-is.
fn from_core_error(err: crate::error::CoreError) -> EngineError {
    match err {
        crate::error::CoreError::RingFull => EngineError::RingFull,
        other => EngineError::Core(other),
    }
}

impl Bridge {
    pub fn new(region: Arc<Region>) -> Self {
        Self {
            region,
            seq: Cell::new(0),
            local_ids: RefCell::new(HashMap::new()),
            pending_reset_generation: Cell::new(None),
        }
    }

    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    fn next_seq(&self) -> u32 {
        let seq = self.seq.get();
        self.seq.set((seq + 1) % SEQ_MODULUS);
        seq
    }

    fn push(&self, command: Command) -> Result<()> {
        let seq = self.next_seq();
        RingProducer::new(&self.region).try_push(command, seq).map_err(from_core_error).inspect_err(|err| {
            log::warn!("command dropped, ring full: {err}");
        })
    }

    /// Resolve a [`NodeHandle`] to a raw pointer, consulting the local cache
    /// for a `SourceId`.
    fn resolve(&self, handle: NodeHandle) -> Result<u32> {
        match handle {
            NodeHandle::Pointer(ptr) => Ok(ptr),
            NodeHandle::SourceId(id) => self
                .local_ids
                .borrow()
                .get(&id)
                .copied()
                .ok_or(EngineError::SourceIdOutOfRange(id)),
        }
    }

    /// INSERT: allocate a node in Zone B, populate its fields, and enqueue
    /// the command that links it into the list on the audio thread's next
    /// block.
    ///
    /// `after_ptr`, if nonzero, is the splice-point hint described in §4.7;
    /// pass [`crate::constants::NULL`] to let the audio thread place the
    /// node by tick order instead. Returns the node's pointer immediately —
    /// Zone B's bump allocation is synchronous — even though the node is not
    /// yet reachable from head until the command is drained.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &self,
        opcode: u32,
        pitch: u8,
        velocity: u8,
        duration: u32,
        base_tick: u32,
        muted: bool,
        source_id: u32,
        after_ptr: u32,
    ) -> Result<u32> {
        let zone_b = ZoneB::new(&self.region);
        let ptr = zone_b.alloc().map_err(from_core_error)?;

        let mut flags = FLAG_ACTIVE;
        if muted {
            flags |= FLAG_MUTED;
        }

        let seq = self.next_seq();
        NodeRef::new(&self.region, ptr).init(opcode, pitch, velocity, duration, base_tick, flags, source_id, seq);

        RingProducer::new(&self.region)
            .try_push(Command::Insert { ptr, source_id, after_ptr }, seq)
            .map_err(from_core_error)?;

        if source_id != NULL {
            self.local_ids.borrow_mut().insert(source_id, ptr);
        }

        Ok(ptr)
    }

    /// PATCH: update one field of the node currently registered under
    /// `source_id`. Resolution against the ID table happens on the audio
    /// thread (§4.7) — Bridge just forwards the id.
    pub fn patch(&self, source_id: u32, field: PatchField, value: u32) -> Result<()> {
        self.push(Command::Patch { source_id, field, value })
    }

    /// DELETE: unlink, disconnect, and unregister the node named by
    /// `node`.
    pub fn delete(&self, node: NodeHandle) -> Result<()> {
        let ptr = self.resolve(node)?;
        self.push(Command::Delete { ptr })?;
        self.local_ids.borrow_mut().retain(|_, cached_ptr| *cached_ptr != ptr);
        Ok(())
    }

    /// CONNECT: add a weighted synapse from `source` to `target`.
    pub fn connect(&self, source: NodeHandle, target: NodeHandle, weight: u32, jitter: u32) -> Result<()> {
        if weight > MAX_WEIGHT {
            log::warn!("rejected synapse weight {weight}, maximum is {MAX_WEIGHT}");
            return Err(EngineError::WeightOutOfRange(weight, MAX_WEIGHT));
        }
        let source = self.resolve(source)?;
        let target = self.resolve(target)?;
        self.push(Command::Connect { source, target, weight, jitter })
    }

    /// DISCONNECT: tombstone the synapse from `source` to `target`, if any.
    pub fn disconnect(&self, source: NodeHandle, target: NodeHandle) -> Result<()> {
        let source = self.resolve(source)?;
        let target = self.resolve(target)?;
        self.push(Command::Disconnect { source, target })
    }

    /// SET_BPM.
    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        let bpm_fixed = (bpm * BPM_FIXED_POINT_SCALE as f64).round() as u32;
        self.push(Command::SetBpm { bpm_fixed })
    }

    /// SET_PLAYHEAD.
    pub fn set_playhead(&self, tick: u32) -> Result<()> {
        self.push(Command::SetPlayhead { tick })
    }

    /// HARD_RESET: clear the list, synapse table, and ID table.
    ///
    /// This only enqueues the command and drops Bridge's own id cache; Zone
    /// B itself is *not* rewound here, because the audio thread may still be
    /// mid-block against the old list when this call returns. Poll
    /// [`Bridge::try_reclaim_zone_b`] afterward — once the audio thread has
    /// processed the reset and bumped its generation counter, it is safe to
    /// rewind the bump pointer (§4.2).
    pub fn hard_reset(&self) -> Result<()> {
        let generation_before = self.region.reset_generation();
        self.push(Command::HardReset)?;
        self.local_ids.borrow_mut().clear();
        self.pending_reset_generation.set(Some(generation_before));
        log::info!("HARD_RESET submitted, awaiting generation {}", generation_before.wrapping_add(1));
        Ok(())
    }

    /// If a [`Bridge::hard_reset`] is pending and the audio thread has since
    /// processed it, rewind Zone B's bump pointer and return `true`.
    /// Otherwise a no-op that returns `false`.
    pub fn try_reclaim_zone_b(&self) -> bool {
        let Some(generation_before) = self.pending_reset_generation.get() else {
            return false;
        };
        if self.region.reset_generation() == generation_before {
            return false;
        }
        ZoneB::new(&self.region).reset();
        self.pending_reset_generation.set(None);
        true
    }

    /// Read and clear the header's error flag (§7).
    pub fn poll_error(&self) -> i32 {
        let code = self.region.error_flag();
        self.region.set_error_flag(0);
        code
    }

    /// Fraction of Zone B currently allocated, for telemetry.
    pub fn zone_b_utilization(&self) -> f64 {
        ZoneB::new(&self.region).utilization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn bridge() -> (Arc<Region>, Bridge) {
        let region = Region::new(&EngineConfig { node_capacity: 32, zone_a_capacity: 16, ..EngineConfig::default() });
        let bridge = Bridge::new(Arc::clone(&region));
        (region, bridge)
    }

    #[test]
    fn insert_returns_a_usable_pointer() {
        let (_region, bridge) = bridge();
        let ptr = bridge.insert(OPCODE_NOTE, 60, 100, 480, 0, false, 7, NULL).unwrap();
        assert_ne!(ptr, NULL);
    }

    #[test]
    fn connect_by_source_id_resolves_through_local_cache() {
        let (_region, bridge) = bridge();
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 0, false, 1, NULL).unwrap();
        bridge.insert(OPCODE_NOTE, 64, 100, 10, 10, false, 2, NULL).unwrap();
        bridge
            .connect(NodeHandle::SourceId(1), NodeHandle::SourceId(2), 500, 0)
            .unwrap();
    }

    #[test]
    fn connect_rejects_out_of_range_weight() {
        let (_region, bridge) = bridge();
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 0, false, 1, NULL).unwrap();
        bridge.insert(OPCODE_NOTE, 64, 100, 10, 10, false, 2, NULL).unwrap();
        let err = bridge
            .connect(NodeHandle::SourceId(1), NodeHandle::SourceId(2), 1001, 0)
            .unwrap_err();
        assert_eq!(err, EngineError::WeightOutOfRange(1001, MAX_WEIGHT));
    }

    #[test]
    fn unknown_source_id_is_rejected_locally_without_touching_the_ring() {
        let (_region, bridge) = bridge();
        let err = bridge.delete(NodeHandle::SourceId(99)).unwrap_err();
        assert_eq!(err, EngineError::SourceIdOutOfRange(99));
    }

    #[test]
    fn delete_forgets_the_local_cache_entry() {
        let (_region, bridge) = bridge();
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 0, false, 5, NULL).unwrap();
        bridge.delete(NodeHandle::SourceId(5)).unwrap();
        assert_eq!(
            bridge.delete(NodeHandle::SourceId(5)).unwrap_err(),
            EngineError::SourceIdOutOfRange(5)
        );
    }

    #[test]
    fn ring_full_surfaces_as_an_error() {
        let region = Region::new(&EngineConfig { ring_capacity: 2, ..EngineConfig::default() });
        let bridge = Bridge::new(Arc::clone(&region));
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 0, false, 0, NULL).unwrap();
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 1, false, 0, NULL).unwrap();
        let err = bridge.insert(OPCODE_NOTE, 60, 100, 10, 2, false, 0, NULL).unwrap_err();
        assert_eq!(err, EngineError::RingFull);
    }

    #[test]
    fn poll_error_clears_the_header_flag() {
        let region = Region::new(&EngineConfig { ring_capacity: 2, ..EngineConfig::default() });
        let bridge = Bridge::new(Arc::clone(&region));
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 0, false, 0, NULL).unwrap();
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 1, false, 0, NULL).unwrap();
        let _ = bridge.insert(OPCODE_NOTE, 60, 100, 10, 2, false, 0, NULL);
        assert_eq!(bridge.poll_error(), EngineError::RingFull.code());
        assert_eq!(bridge.poll_error(), 0);
    }

    #[test]
    fn hard_reset_does_not_reclaim_zone_b_until_the_audio_thread_settles() {
        let (region, bridge) = bridge();
        bridge.insert(OPCODE_NOTE, 60, 100, 10, 0, false, 1, NULL).unwrap();
        let utilization_before = bridge.zone_b_utilization();
        bridge.hard_reset().unwrap();
        assert!(!bridge.try_reclaim_zone_b());
        assert_eq!(bridge.zone_b_utilization(), utilization_before);

        // Simulate the audio thread having processed the HARD_RESET.
        region.increment_reset_generation();
        assert!(bridge.try_reclaim_zone_b());
        assert_eq!(bridge.zone_b_utilization(), 0.0);
    }
}
