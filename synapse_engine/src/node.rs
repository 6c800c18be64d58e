//! Typed view over a node record in the heap.
//!
//! A [`NodeRef`] is just a pointer (word offset) plus a reference to the
//! [`Region`] it lives in; it never owns data. All reads and writes go
//! straight through to the region's atomics via [`Region::node_field`] /
//! [`Region::set_node_field`].

use crate::{constants::*, region::Region};

/// A pointer to a node record, plus the region it lives in.
///
/// Word offset `0` is reserved for `NULL`; a [`NodeRef`] is never
/// constructed over it.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    region: &'a Region,
    ptr: u32,
}

impl<'a> NodeRef<'a> {
    /// Wrap `ptr` as a node reference. `ptr` must not be `NULL`.
    pub fn new(region: &'a Region, ptr: u32) -> Self {
        debug_assert_ne!(ptr, NULL);
        Self { region, ptr }
    }

    #[inline]
    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    #[inline]
    pub fn opcode(&self) -> u32 {
        self.region.node_field(self.ptr, NODE_OPCODE)
    }

    #[inline]
    pub fn set_opcode(&self, value: u32) {
        self.region.set_node_field(self.ptr, NODE_OPCODE, value);
    }

    #[inline]
    pub fn pitch(&self) -> u8 {
        self.region.node_field(self.ptr, NODE_PITCH) as u8
    }

    #[inline]
    pub fn set_pitch(&self, value: u8) {
        self.region.set_node_field(self.ptr, NODE_PITCH, value as u32);
    }

    #[inline]
    pub fn velocity(&self) -> u8 {
        self.region.node_field(self.ptr, NODE_VELOCITY) as u8
    }

    #[inline]
    pub fn set_velocity(&self, value: u8) {
        self.region.set_node_field(self.ptr, NODE_VELOCITY, value as u32);
    }

    #[inline]
    pub fn duration(&self) -> u32 {
        self.region.node_field(self.ptr, NODE_DURATION)
    }

    #[inline]
    pub fn set_duration(&self, value: u32) {
        self.region.set_node_field(self.ptr, NODE_DURATION, value);
    }

    #[inline]
    pub fn base_tick(&self) -> u32 {
        self.region.node_field(self.ptr, NODE_BASE_TICK)
    }

    #[inline]
    pub fn set_base_tick(&self, value: u32) {
        self.region.set_node_field(self.ptr, NODE_BASE_TICK, value);
    }

    #[inline]
    pub fn flags(&self) -> u32 {
        self.region.node_field(self.ptr, NODE_FLAGS)
    }

    #[inline]
    pub fn set_flags(&self, value: u32) {
        self.region.set_node_field(self.ptr, NODE_FLAGS, value);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags() & FLAG_ACTIVE != 0
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.flags() & FLAG_MUTED != 0
    }

    #[inline]
    pub fn is_tombstoned(&self) -> bool {
        self.flags() & FLAG_TOMBSTONE != 0
    }

    #[inline]
    pub fn set_flag(&self, flag: u32) {
        self.set_flags(self.flags() | flag);
    }

    #[inline]
    pub fn clear_flag(&self, flag: u32) {
        self.set_flags(self.flags() & !flag);
    }

    #[inline]
    pub fn source_id(&self) -> u32 {
        self.region.node_field(self.ptr, NODE_SOURCE_ID)
    }

    #[inline]
    pub fn set_source_id(&self, value: u32) {
        self.region.set_node_field(self.ptr, NODE_SOURCE_ID, value);
    }

    #[inline]
    pub fn next(&self) -> u32 {
        self.region.node_field(self.ptr, NODE_NEXT)
    }

    #[inline]
    pub fn set_next(&self, value: u32) {
        self.region.set_node_field(self.ptr, NODE_NEXT, value);
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.region.node_field(self.ptr, NODE_SEQ)
    }

    #[inline]
    pub fn set_seq(&self, value: u32) {
        self.region.set_node_field(self.ptr, NODE_SEQ, value);
    }

    /// Initialize every field of this node in one pass. Used when a node is
    /// first taken out of an allocator and populated for an INSERT.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &self,
        opcode: u32,
        pitch: u8,
        velocity: u8,
        duration: u32,
        base_tick: u32,
        flags: u32,
        source_id: u32,
        seq: u32,
    ) {
        self.set_opcode(opcode);
        self.set_pitch(pitch);
        self.set_velocity(velocity);
        self.set_duration(duration);
        self.set_base_tick(base_tick);
        self.set_flags(flags);
        self.set_source_id(source_id);
        self.set_next(NULL);
        self.set_seq(seq);
    }

    /// Reset a node to its inactive, reclaimable state before returning it
    /// to Zone A's free-list.
    pub fn clear(&self) {
        self.set_opcode(OPCODE_NONE);
        self.set_pitch(0);
        self.set_velocity(0);
        self.set_duration(0);
        self.set_base_tick(0);
        self.set_flags(0);
        self.set_source_id(0);
        self.set_next(NULL);
    }
}
