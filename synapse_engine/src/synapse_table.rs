//! The synapse table: an open-addressed hash table keyed by source-node
//! pointer, with a per-slot chain-next word collecting every outgoing
//! synapse from the same source into a singly-linked chain.
//!
//! A slot is addressed two ways at once: linear probing resolves hash
//! collisions between *different* sources competing for the same bucket,
//! while `meta_next` threads together the *several* synapses that share one
//! source once a bucket for that source exists. Disconnecting a synapse
//! tombstones its slot (`target = NULL`) rather than unlinking it from the
//! chain, since unlinking would require rewriting the previous link's
//! `meta_next` — which may itself be mid-traversal on the audio thread —
//! so stale tombstones are simply skipped by chain walks and reclaimed only
//! on a full table clear.

use synapse_core::{stack_vec::StackVec, error::EngineError};

use crate::{constants::*, region::Region};

/// Knuth's multiplicative hash, reduced to the table's slot count.
#[inline]
fn hash(source: u32, slot_count: usize) -> usize {
    (source.wrapping_mul(2654435761) as usize) % slot_count
}

/// One resolved synapse candidate: its target, weight, jitter, and the slot
/// it lives in (for plasticity callbacks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub target: u32,
    pub weight: u32,
    pub jitter: u32,
    pub slot: u32,
}

/// Audio-thread-only handle onto the synapse table.
pub struct SynapseTable<'a> {
    region: &'a Region,
}

impl<'a> SynapseTable<'a> {
    pub fn new(region: &'a Region) -> Self {
        Self { region }
    }

    fn slot_count(&self) -> usize {
        self.region.synapse_slot_count()
    }

    fn is_free(&self, slot: u32) -> bool {
        self.region.slot_field(slot, SLOT_SOURCE) == NULL
    }

    /// Add a synapse from `source` to `target`. Appends to the existing
    /// chain if `source` already has one, otherwise claims a fresh bucket.
    pub fn connect(&self, source: u32, target: u32, weight: u32, jitter: u32) -> Result<(), EngineError> {
        let slot_count = self.slot_count();
        let start = hash(source, slot_count);

        for offset in 0..slot_count {
            let slot = ((start + offset) % slot_count) as u32;
            let existing_source = self.region.slot_field(slot, SLOT_SOURCE);

            if existing_source == NULL {
                self.init_slot(slot, source, target, weight, jitter, CHAIN_END);
                return Ok(());
            }

            if existing_source == source {
                let tail = self.chain_tail(slot);
                let new_slot = self.find_free_slot(slot_count, start)?;
                self.init_slot(new_slot, source, target, weight, jitter, CHAIN_END);
                self.region.set_slot_field(tail, SLOT_META_NEXT, new_slot);
                return Ok(());
            }
        }

        Err(EngineError::AllocExhausted)
    }

    fn find_free_slot(&self, slot_count: usize, start: usize) -> Result<u32, EngineError> {
        for offset in 0..slot_count {
            let slot = ((start + offset) % slot_count) as u32;
            if self.is_free(slot) {
                return Ok(slot);
            }
        }
        Err(EngineError::AllocExhausted)
    }

    fn chain_tail(&self, head: u32) -> u32 {
        let mut cursor = head;
        loop {
            let next = self.region.slot_field(cursor, SLOT_META_NEXT);
            if next == CHAIN_END {
                return cursor;
            }
            cursor = next;
        }
    }

    fn init_slot(&self, slot: u32, source: u32, target: u32, weight: u32, jitter: u32, meta_next: u32) {
        self.region.set_slot_field(slot, SLOT_SOURCE, source);
        self.region.set_slot_field(slot, SLOT_TARGET, target);
        self.region.set_slot_field(slot, SLOT_WEIGHT, weight);
        self.region.set_slot_field(slot, SLOT_JITTER, jitter);
        self.region.set_slot_field(slot, SLOT_META_NEXT, meta_next);
        let generation = self.region.slot_field(slot, SLOT_GENERATION);
        self.region.set_slot_field(slot, SLOT_GENERATION, generation.wrapping_add(1));
    }

    /// Tombstone the slot carrying the `source -> target` synapse, if any.
    /// Returns `true` if a matching, non-tombstoned slot was found.
    pub fn disconnect(&self, source: u32, target: u32) -> bool {
        let slot_count = self.slot_count();
        let start = hash(source, slot_count);

        for offset in 0..slot_count {
            let slot = ((start + offset) % slot_count) as u32;
            let existing_source = self.region.slot_field(slot, SLOT_SOURCE);
            if existing_source == NULL {
                return false;
            }
            if existing_source == source {
                let mut cursor = slot;
                loop {
                    if self.region.slot_field(cursor, SLOT_TARGET) == target {
                        self.region.set_slot_field(cursor, SLOT_TARGET, NULL);
                        return true;
                    }
                    let next = self.region.slot_field(cursor, SLOT_META_NEXT);
                    if next == CHAIN_END {
                        break;
                    }
                    cursor = next;
                }
                return false;
            }
        }
        false
    }

    /// Remove every slot naming `source` as the source (used when `source`
    /// itself is deleted).
    pub fn disconnect_all_from(&self, source: u32) {
        let slot_count = self.slot_count();
        let start = hash(source, slot_count);
        for offset in 0..slot_count {
            let slot = ((start + offset) % slot_count) as u32;
            let existing_source = self.region.slot_field(slot, SLOT_SOURCE);
            if existing_source == NULL {
                return;
            }
            if existing_source == source {
                let mut cursor = slot;
                loop {
                    self.region.set_slot_field(cursor, SLOT_TARGET, NULL);
                    let next = self.region.slot_field(cursor, SLOT_META_NEXT);
                    if next == CHAIN_END {
                        break;
                    }
                    cursor = next;
                }
                return;
            }
        }
    }

    /// Remove every slot naming `target` as the target, wherever it occurs
    /// in the table (used when `target` itself is deleted).
    pub fn disconnect_all_to(&self, target: u32) {
        for slot in 0..self.slot_count() as u32 {
            if self.region.slot_field(slot, SLOT_SOURCE) != NULL
                && self.region.slot_field(slot, SLOT_TARGET) == target
            {
                self.region.set_slot_field(slot, SLOT_TARGET, NULL);
            }
        }
    }

    /// Wipe every slot back to its unused state. Used by `HARD_RESET`.
    pub fn clear(&self) {
        for slot in 0..self.slot_count() as u32 {
            self.region.set_slot_field(slot, SLOT_SOURCE, NULL);
            self.region.set_slot_field(slot, SLOT_TARGET, NULL);
            self.region.set_slot_field(slot, SLOT_META_NEXT, CHAIN_END);
        }
    }

    /// Collect every non-tombstoned candidate for `source`, capped at
    /// [`MAX_SYNAPSE_CANDIDATES`].
    pub fn candidates(&self, source: u32) -> StackVec<Candidate, MAX_SYNAPSE_CANDIDATES> {
        let mut out = StackVec::new();
        let slot_count = self.slot_count();
        let start = hash(source, slot_count);

        for offset in 0..slot_count {
            let slot = ((start + offset) % slot_count) as u32;
            let existing_source = self.region.slot_field(slot, SLOT_SOURCE);
            if existing_source == NULL {
                return out;
            }
            if existing_source == source {
                let mut cursor = slot;
                let mut hops = 0usize;
                loop {
                    let target = self.region.slot_field(cursor, SLOT_TARGET);
                    if target != NULL {
                        let candidate = Candidate {
                            target,
                            weight: self.region.slot_field(cursor, SLOT_WEIGHT),
                            jitter: self.region.slot_field(cursor, SLOT_JITTER),
                            slot: cursor,
                        };
                        if out.push(candidate).is_err() {
                            break;
                        }
                    }
                    let next = self.region.slot_field(cursor, SLOT_META_NEXT);
                    if next == CHAIN_END {
                        break;
                    }
                    // A well-formed chain visits at most `slot_count` distinct
                    // slots before hitting CHAIN_END (connect() only ever
                    // prepends a freshly claimed slot). More hops than that
                    // means `meta_next` has looped back on itself (invariant
                    // 5) rather than terminating, which would otherwise spin
                    // this audio-thread walk forever.
                    hops += 1;
                    if hops > slot_count {
                        self.region.set_error_flag(EngineError::ChainLoop.code());
                        break;
                    }
                    cursor = next;
                }
                return out;
            }
        }
        out
    }
}
