//! The intrusive, singly-linked, tick-ordered list of event nodes.
//!
//! The list owns no storage of its own — every node lives in the region's
//! heap, and "the list" is just the head pointer plus each node's `next`
//! field. Only the audio thread ever calls these functions; see
//! [`crate::region::Region`]'s concurrency notes.

use crate::{constants::NULL, node::NodeRef, region::Region};

/// Splice `ptr` into the list in ascending base-tick order, breaking ties
/// by sequence number so that two nodes scheduled for the same tick keep a
/// stable relative order.
///
/// If `after_hint` is nonzero and currently linked into the list, `ptr` is
/// spliced immediately after it instead — used by the UI to assert order
/// explicitly rather than relying on tick comparison.
pub fn insert(region: &Region, ptr: u32, after_hint: u32) {
    if after_hint != NULL && is_linked(region, after_hint) {
        let after = NodeRef::new(region, after_hint);
        let new_node = NodeRef::new(region, ptr);
        new_node.set_next(after.next());
        after.set_next(ptr);
        return;
    }

    let new_node = NodeRef::new(region, ptr);
    let (new_tick, new_seq) = (new_node.base_tick(), new_node.seq());

    let head = region.head_pointer();
    if head == NULL || precedes(region, new_tick, new_seq, head) {
        new_node.set_next(head);
        region.set_head_pointer(ptr);
        return;
    }

    let mut prev = head;
    loop {
        let next = NodeRef::new(region, prev).next();
        if next == NULL || precedes(region, new_tick, new_seq, next) {
            new_node.set_next(next);
            NodeRef::new(region, prev).set_next(ptr);
            return;
        }
        prev = next;
    }
}

/// `true` iff `(tick, seq)` sorts strictly before the node at `other`.
fn precedes(region: &Region, tick: u32, seq: u32, other: u32) -> bool {
    let other_node = NodeRef::new(region, other);
    (tick, seq) < (other_node.base_tick(), other_node.seq())
}

/// Unlink `ptr` from the list. Returns `true` if `ptr` was found and
/// removed, `false` if it was not linked in the first place.
///
/// Does not reclaim or tombstone the node itself — the caller decides that
/// based on which zone `ptr` originated from (see `DESIGN.md`).
pub fn unlink(region: &Region, ptr: u32) -> bool {
    let head = region.head_pointer();
    if head == ptr {
        let next = NodeRef::new(region, ptr).next();
        region.set_head_pointer(next);
        return true;
    }

    let mut prev = head;
    while prev != NULL {
        let next = NodeRef::new(region, prev).next();
        if next == ptr {
            let after = NodeRef::new(region, ptr).next();
            NodeRef::new(region, prev).set_next(after);
            return true;
        }
        prev = next;
    }
    false
}

/// `true` iff `ptr` is currently reachable by walking from the head.
pub fn is_linked(region: &Region, ptr: u32) -> bool {
    let mut cursor = region.head_pointer();
    while cursor != NULL {
        if cursor == ptr {
            return true;
        }
        cursor = NodeRef::new(region, cursor).next();
    }
    false
}

/// Collect every pointer reachable from head, in list order. Intended for
/// tests and telemetry, not the realtime path (it allocates).
pub fn collect(region: &Region) -> Vec<u32> {
    let mut out = Vec::new();
    let mut cursor = region.head_pointer();
    while cursor != NULL {
        out.push(cursor);
        cursor = NodeRef::new(region, cursor).next();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::constants::{FLAG_ACTIVE, OPCODE_NOTE};

    fn region() -> std::sync::Arc<Region> {
        Region::new(&EngineConfig { node_capacity: 16, zone_a_capacity: 8, ..EngineConfig::default() })
    }

    fn make_node(region: &Region, ptr: u32, base_tick: u32, seq: u32) {
        NodeRef::new(region, ptr).init(OPCODE_NOTE, 60, 100, 10, base_tick, FLAG_ACTIVE, 0, seq);
    }

    #[test]
    fn inserts_stay_sorted_by_base_tick() {
        let region = region();
        make_node(&region, 1, 100, 1);
        make_node(&region, 2, 50, 2);
        make_node(&region, 3, 200, 3);
        insert(&region, 1, NULL);
        insert(&region, 2, NULL);
        insert(&region, 3, NULL);
        assert_eq!(collect(&region), vec![2, 1, 3]);
    }

    #[test]
    fn ties_break_by_sequence_number() {
        let region = region();
        make_node(&region, 1, 100, 5);
        make_node(&region, 2, 100, 2);
        insert(&region, 1, NULL);
        insert(&region, 2, NULL);
        assert_eq!(collect(&region), vec![2, 1]);
    }

    #[test]
    fn after_hint_splices_immediately_following() {
        let region = region();
        make_node(&region, 1, 100, 1);
        make_node(&region, 2, 500, 2);
        make_node(&region, 3, 200, 3);
        insert(&region, 1, NULL);
        insert(&region, 2, NULL);
        insert(&region, 3, 1);
        assert_eq!(collect(&region), vec![1, 3, 2]);
    }

    #[test]
    fn unlink_removes_head_and_mid_list_nodes() {
        let region = region();
        make_node(&region, 1, 100, 1);
        make_node(&region, 2, 200, 2);
        make_node(&region, 3, 300, 3);
        insert(&region, 1, NULL);
        insert(&region, 2, NULL);
        insert(&region, 3, NULL);

        assert!(unlink(&region, 2));
        assert_eq!(collect(&region), vec![1, 3]);

        assert!(unlink(&region, 1));
        assert_eq!(collect(&region), vec![3]);

        assert!(!unlink(&region, 99));
    }
}
