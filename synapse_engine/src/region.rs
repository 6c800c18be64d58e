//! The shared-memory region: one contiguous array of 32-bit words that holds
//! the header, the node heap, the synapse table, the command ring, and the
//! source-ID table.
//!
//! A [`Region`] is allocated exactly once, by [`Region::new`], and then
//! shared (via [`Arc`]) between the UI thread and the audio thread for the
//! lifetime of the engine. No further heap allocation happens against it:
//! both threads only ever read and write words that already exist.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crate::{
    config::EngineConfig,
    constants::*,
};

/// A contiguous, word-addressed region shared between the UI and audio
/// threads.
///
/// All fields are stored as [`AtomicU32`] so that the region can be handed
/// out as a plain `Arc<Region>` to both threads: the atomics, not a lock,
/// are what make concurrent access sound. Which orderings are appropriate
/// for a given field follows from its role in §5 of the design — see the
/// accessor doc comments below.
pub struct Region {
    words: Box<[AtomicU32]>,
}

impl Region {
    /// Allocate and initialize a new region from an [`EngineConfig`].
    ///
    /// This is the factory described in §6: the returned region has its
    /// header populated, an empty Zone-A free-list threaded through the
    /// lower heap half, the Zone-B bump pointer parked at the split index,
    /// an empty command ring, a `NULL` head pointer, and the configured
    /// tempo.
    pub fn new(config: &EngineConfig) -> Arc<Region> {
        let heap_base = HEADER_WORDS;
        let heap_words = config.node_capacity * NODE_WORDS;
        let synapse_base = heap_base + heap_words;
        let synapse_words = config.synapse_slot_count * SLOT_WORDS;
        let ring_base = synapse_base + synapse_words;
        let ring_words = config.ring_capacity * CMD_WORDS;
        let id_table_base = ring_base + ring_words;
        let id_table_words = config.id_table_capacity;

        let total_words = id_table_base + id_table_words;

        let words: Box<[AtomicU32]> = (0..total_words).map(|_| AtomicU32::new(0)).collect();
        let region = Region { words };

        region.store(HEADER_MAGIC, MAGIC, Ordering::Relaxed);
        region.store(HEADER_VERSION, VERSION, Ordering::Relaxed);
        region.store(HEADER_NODE_CAPACITY, config.node_capacity as u32, Ordering::Relaxed);
        region.store(HEADER_HEAP_BASE_OFFSET, heap_base as u32, Ordering::Relaxed);
        region.store(HEADER_HEAP_SPLIT_INDEX, config.zone_a_capacity as u32, Ordering::Relaxed);
        region.store(HEADER_SYNAPSE_BASE_OFFSET, synapse_base as u32, Ordering::Relaxed);
        region.store(HEADER_SYNAPSE_SLOT_COUNT, config.synapse_slot_count as u32, Ordering::Relaxed);
        region.store(HEADER_RING_BASE_OFFSET, ring_base as u32, Ordering::Relaxed);
        region.store(HEADER_RING_CAPACITY, config.ring_capacity as u32, Ordering::Relaxed);
        region.store(HEADER_ID_TABLE_BASE_OFFSET, id_table_base as u32, Ordering::Relaxed);
        region.store(HEADER_ID_TABLE_CAPACITY, config.id_table_capacity as u32, Ordering::Relaxed);
        region.store(HEADER_HEAD_POINTER, NULL, Ordering::Relaxed);
        region.store(HEADER_PLAYHEAD_TICK, 0, Ordering::Relaxed);
        region.store(
            HEADER_BPM_FIXED,
            (config.bpm * BPM_FIXED_POINT_SCALE as f64).round() as u32,
            Ordering::Relaxed,
        );
        region.store(HEADER_PPQ, config.ppq, Ordering::Relaxed);
        region.store(HEADER_RING_HEAD, 0, Ordering::Release);
        region.store(HEADER_RING_TAIL, 0, Ordering::Release);
        region.store(HEADER_ERROR_FLAG, 0, Ordering::Relaxed);
        region.store(HEADER_SAFE_ZONE_TICKS, config.safe_zone_ticks, Ordering::Relaxed);
        region.store(HEADER_SAMPLE_RATE, config.sample_rate as u32, Ordering::Relaxed);
        region.store(HEADER_ZONE_B_BUMP, config.zone_a_capacity as u32, Ordering::Relaxed);
        region.store(HEADER_STALL_COUNTER, 0, Ordering::Relaxed);
        region.store(HEADER_FIRE_COUNTER, 0, Ordering::Relaxed);

        // Thread the Zone-A free-list through every node's `next` word:
        // 0 -> 1 -> 2 -> ... -> (split - 1) -> NULL. Node index 0 is never
        // used as a live node pointer would collide with NULL, so the
        // free-list (and all node addressing) is 1-based: index 0 is a
        // permanently reserved dummy node.
        let split = config.zone_a_capacity;
        for index in 1..split {
            let ptr = index as u32;
            let next = if index + 1 < split { (index + 1) as u32 } else { NULL };
            region.set_node_field(ptr, NODE_NEXT, next);
        }
        let free_head = if split > 1 { 1 } else { NULL };
        region.store(HEADER_ZONE_A_FREE_HEAD, free_head, Ordering::Release);

        Arc::new(region)
    }

    #[inline]
    fn word(&self, index: usize) -> &AtomicU32 {
        &self.words[index]
    }

    #[inline]
    pub(crate) fn load(&self, index: usize, order: Ordering) -> u32 {
        self.word(index).load(order)
    }

    #[inline]
    pub(crate) fn store(&self, index: usize, value: u32, order: Ordering) {
        self.word(index).store(value, order);
    }

    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        index: usize,
        current: u32,
        new: u32,
        success: Ordering,
        failure: Ordering,
    ) -> Result<u32, u32> {
        self.word(index).compare_exchange_weak(current, new, success, failure)
    }

    #[inline]
    pub(crate) fn fetch_add(&self, index: usize, delta: u32, order: Ordering) -> u32 {
        self.word(index).fetch_add(delta, order)
    }

    // -- Named header accessors -------------------------------------------------

    #[inline]
    pub fn magic(&self) -> u32 {
        self.load(HEADER_MAGIC, Ordering::Relaxed)
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.load(HEADER_VERSION, Ordering::Relaxed)
    }

    #[inline]
    pub fn node_capacity(&self) -> usize {
        self.load(HEADER_NODE_CAPACITY, Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn heap_base_offset(&self) -> usize {
        self.load(HEADER_HEAP_BASE_OFFSET, Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn heap_split_index(&self) -> u32 {
        self.load(HEADER_HEAP_SPLIT_INDEX, Ordering::Relaxed)
    }

    #[inline]
    pub fn synapse_base_offset(&self) -> usize {
        self.load(HEADER_SYNAPSE_BASE_OFFSET, Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn synapse_slot_count(&self) -> usize {
        self.load(HEADER_SYNAPSE_SLOT_COUNT, Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn ring_base_offset(&self) -> usize {
        self.load(HEADER_RING_BASE_OFFSET, Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn ring_capacity(&self) -> usize {
        self.load(HEADER_RING_CAPACITY, Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn id_table_base_offset(&self) -> usize {
        self.load(HEADER_ID_TABLE_BASE_OFFSET, Ordering::Relaxed) as usize
    }

    #[inline]
    pub fn id_table_capacity(&self) -> usize {
        self.load(HEADER_ID_TABLE_CAPACITY, Ordering::Relaxed) as usize
    }

    /// Head pointer of the node list. Only the audio thread writes this.
    #[inline]
    pub fn head_pointer(&self) -> u32 {
        self.load(HEADER_HEAD_POINTER, Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_head_pointer(&self, ptr: u32) {
        self.store(HEADER_HEAD_POINTER, ptr, Ordering::Release);
    }

    /// The playhead, in ticks. The UI may poll this at any time; the audio
    /// thread is the sole writer.
    #[inline]
    pub fn playhead_tick(&self) -> u32 {
        self.load(HEADER_PLAYHEAD_TICK, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_playhead_tick(&self, tick: u32) {
        self.store(HEADER_PLAYHEAD_TICK, tick, Ordering::Relaxed);
    }

    /// Current tempo in BPM, decoded from the fixed-point header word.
    #[inline]
    pub fn bpm(&self) -> f64 {
        self.load(HEADER_BPM_FIXED, Ordering::Relaxed) as f64 / BPM_FIXED_POINT_SCALE as f64
    }

    #[inline]
    pub(crate) fn set_bpm(&self, bpm: f64) {
        let fixed = (bpm * BPM_FIXED_POINT_SCALE as f64).round() as u32;
        self.set_bpm_fixed(fixed);
    }

    #[inline]
    pub(crate) fn set_bpm_fixed(&self, fixed: u32) {
        self.store(HEADER_BPM_FIXED, fixed, Ordering::Relaxed);
    }

    #[inline]
    pub fn ppq(&self) -> u32 {
        self.load(HEADER_PPQ, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_ppq(&self, ppq: u32) {
        self.store(HEADER_PPQ, ppq, Ordering::Relaxed);
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.load(HEADER_SAMPLE_RATE, Ordering::Relaxed) as f64
    }

    /// Ring write index, owned by the producer (UI thread). Published with
    /// `Release` so the consumer's `Acquire` load happens-after every
    /// payload word write below it.
    #[inline]
    pub(crate) fn ring_tail(&self, order: Ordering) -> u32 {
        self.load(HEADER_RING_TAIL, order)
    }

    #[inline]
    pub(crate) fn set_ring_tail(&self, value: u32, order: Ordering) {
        self.store(HEADER_RING_TAIL, value, order);
    }

    /// Ring read index, owned by the consumer (audio thread).
    #[inline]
    pub(crate) fn ring_head(&self, order: Ordering) -> u32 {
        self.load(HEADER_RING_HEAD, order)
    }

    #[inline]
    pub(crate) fn set_ring_head(&self, value: u32, order: Ordering) {
        self.store(HEADER_RING_HEAD, value, order);
    }

    /// The last error code observed by the engine. Non-zero values persist
    /// until the UI calls [`crate::bridge::Bridge::poll_error`], which
    /// clears it back to `0`.
    #[inline]
    pub fn error_flag(&self) -> i32 {
        self.load(HEADER_ERROR_FLAG, Ordering::Relaxed) as i32
    }

    #[inline]
    pub(crate) fn set_error_flag(&self, code: i32) {
        self.store(HEADER_ERROR_FLAG, code as u32, Ordering::Relaxed);
    }

    #[inline]
    pub fn safe_zone_ticks(&self) -> u32 {
        self.load(HEADER_SAFE_ZONE_TICKS, Ordering::Relaxed)
    }

    /// Number of blocks in which the per-block synapse quota was exhausted.
    #[inline]
    pub fn stall_counter(&self) -> u32 {
        self.load(HEADER_STALL_COUNTER, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn increment_stall_counter(&self) {
        self.fetch_add(HEADER_STALL_COUNTER, 1, Ordering::Relaxed);
    }

    /// Lifetime count of synapse fires across all blocks.
    #[inline]
    pub fn fire_counter(&self) -> u32 {
        self.load(HEADER_FIRE_COUNTER, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn increment_fire_counter(&self) {
        self.fetch_add(HEADER_FIRE_COUNTER, 1, Ordering::Relaxed);
    }

    /// Generation counter for the `HARD_RESET` handshake (§4.2, §4.7): the
    /// audio thread bumps this after it has finished clearing the list,
    /// synapse table, and ID table, so the UI knows it is safe to reclaim
    /// Zone B.
    #[inline]
    pub fn reset_generation(&self) -> u32 {
        self.load(HEADER_RESET_GENERATION, Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn increment_reset_generation(&self) {
        self.fetch_add(HEADER_RESET_GENERATION, 1, Ordering::Release);
    }

    #[inline]
    pub(crate) fn zone_a_free_head(&self, order: Ordering) -> u32 {
        self.load(HEADER_ZONE_A_FREE_HEAD, order)
    }

    #[inline]
    pub(crate) fn cas_zone_a_free_head(
        &self,
        current: u32,
        new: u32,
        success: Ordering,
        failure: Ordering,
    ) -> Result<u32, u32> {
        self.compare_exchange(HEADER_ZONE_A_FREE_HEAD, current, new, success, failure)
    }

    #[inline]
    pub(crate) fn zone_b_bump(&self) -> u32 {
        self.load(HEADER_ZONE_B_BUMP, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_zone_b_bump(&self, value: u32) {
        self.store(HEADER_ZONE_B_BUMP, value, Ordering::Relaxed);
    }

    // -- Node field access --------------------------------------------------

    /// Word index of a given field within the node at `ptr`.
    #[inline]
    fn node_word_index(&self, ptr: u32, field: usize) -> usize {
        debug_assert_ne!(ptr, NULL, "NULL node pointer dereferenced");
        self.heap_base_offset() + (ptr as usize) * NODE_WORDS + field
    }

    #[inline]
    pub(crate) fn node_field(&self, ptr: u32, field: usize) -> u32 {
        self.load(self.node_word_index(ptr, field), Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_node_field(&self, ptr: u32, field: usize, value: u32) {
        self.store(self.node_word_index(ptr, field), value, Ordering::Release);
    }

    /// Returns `true` if `ptr` indexes a node below the Zone-A/Zone-B split.
    #[inline]
    pub fn is_zone_a(&self, ptr: u32) -> bool {
        ptr != NULL && ptr < self.heap_split_index()
    }

    // -- Synapse slot access --------------------------------------------------

    #[inline]
    fn slot_word_index(&self, slot: u32, field: usize) -> usize {
        self.synapse_base_offset() + (slot as usize) * SLOT_WORDS + field
    }

    #[inline]
    pub(crate) fn slot_field(&self, slot: u32, field: usize) -> u32 {
        self.load(self.slot_word_index(slot, field), Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_slot_field(&self, slot: u32, field: usize, value: u32) {
        self.store(self.slot_word_index(slot, field), value, Ordering::Release);
    }

    // -- ID table access --------------------------------------------------

    #[inline]
    fn id_table_word_index(&self, source_id: u32) -> usize {
        self.id_table_base_offset() + source_id as usize
    }

    #[inline]
    pub(crate) fn id_table_entry(&self, source_id: u32) -> u32 {
        self.load(self.id_table_word_index(source_id), Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_id_table_entry(&self, source_id: u32, ptr: u32) {
        self.store(self.id_table_word_index(source_id), ptr, Ordering::Release);
    }

    // -- Command ring record access --------------------------------------------------

    #[inline]
    pub(crate) fn ring_word_index(&self, slot: u32, field: usize) -> usize {
        self.ring_base_offset() + (slot as usize) * CMD_WORDS + field
    }

    #[inline]
    pub(crate) fn ring_field(&self, slot: u32, field: usize) -> u32 {
        self.load(self.ring_word_index(slot, field), Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_ring_field(&self, slot: u32, field: usize, value: u32) {
        self.store(self.ring_word_index(slot, field), value, Ordering::Relaxed);
    }
}
