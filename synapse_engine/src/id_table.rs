//! The source-ID table: a direct-indexed array mapping a UI-assigned,
//! stable logical ID to the node's current pointer.
//!
//! Source-id `0` is reserved to mean "no id; do not register" — nodes
//! created for purely internal use (e.g. barrier nodes spliced in by the
//! audio thread itself) can skip registration entirely and pay no
//! ID-table cost.

use synapse_core::error::EngineError;

use crate::{constants::NULL, region::Region};

/// Audio-thread-writer, both-thread-reader handle onto the ID table.
pub struct IdTable<'a> {
    region: &'a Region,
}

impl<'a> IdTable<'a> {
    pub fn new(region: &'a Region) -> Self {
        Self { region }
    }

    /// Register `source_id -> ptr`. A no-op if `source_id` is `0`.
    pub fn register(&self, source_id: u32, ptr: u32) -> Result<(), EngineError> {
        if source_id == NULL {
            return Ok(());
        }
        if source_id as usize >= self.region.id_table_capacity() {
            return Err(EngineError::InvalidPointer);
        }
        self.region.set_id_table_entry(source_id, ptr);
        Ok(())
    }

    /// Clear the entry for `source_id`, if any.
    pub fn unregister(&self, source_id: u32) {
        if source_id == NULL {
            return;
        }
        if (source_id as usize) < self.region.id_table_capacity() {
            self.region.set_id_table_entry(source_id, NULL);
        }
    }

    /// Null out every entry. Used by `HARD_RESET`.
    pub fn clear(&self) {
        for source_id in 1..self.region.id_table_capacity() as u32 {
            self.region.set_id_table_entry(source_id, NULL);
        }
    }

    /// Resolve `source_id` to its current node pointer, or `None` if the
    /// id is unregistered, out of range, or has been deleted.
    pub fn resolve(&self, source_id: u32) -> Option<u32> {
        if source_id == NULL || source_id as usize >= self.region.id_table_capacity() {
            return None;
        }
        let ptr = self.region.id_table_entry(source_id);
        if ptr == NULL {
            None
        } else {
            Some(ptr)
        }
    }
}
