//! Fixed layout constants for the shared-memory region.
//!
//! Every number in this module is part of the wire format shared between the
//! UI thread and the audio thread: changing one changes what a previously
//! initialized region means, so treat them as persisted values, not
//! implementation details.
//!
//! The region is a single contiguous array of 32-bit words (see
//! [`crate::region::Region`]). Pointers into it — to nodes, synapse slots,
//! ring entries, or ID-table entries — are expressed as **word offsets** from
//! the start of the region, with `0` reserved as `NULL`. This is the
//! word-granular analogue of the byte-offset pointers described informally in
//! the design notes; since the region itself is defined as an array of
//! 32-bit cells rather than bytes, addressing it in words keeps every index
//! computation a plain multiply-and-add with no byte/word conversion anywhere
//! in the hot path.

/// Magic value written by [`crate::region::Region::new`] so a mapped region
/// can be sanity-checked before use.
pub const MAGIC: u32 = 0x5359_4E41; // "SYNA"

/// Layout version. Bumped whenever the header or record layouts change.
pub const VERSION: u32 = 1;

/// Sentinel pointer value meaning "no node" / "no synapse" / "no chain link".
pub const NULL: u32 = 0;

/// Sentinel used in a synapse slot's `meta_next` chain link to mean "end of
/// chain". Distinct from `NULL` because slot index `0` is itself a valid
/// slot, unlike node pointer `0`.
pub const CHAIN_END: u32 = u32::MAX;

// ---------------------------------------------------------------------
// Header layout. One word per field, in the order the header is declared.
// ---------------------------------------------------------------------

pub const HEADER_MAGIC: usize = 0;
pub const HEADER_VERSION: usize = 1;
pub const HEADER_NODE_CAPACITY: usize = 2;
pub const HEADER_HEAP_BASE_OFFSET: usize = 3;
pub const HEADER_HEAP_SPLIT_INDEX: usize = 4;
pub const HEADER_SYNAPSE_BASE_OFFSET: usize = 5;
pub const HEADER_SYNAPSE_SLOT_COUNT: usize = 6;
pub const HEADER_RING_BASE_OFFSET: usize = 7;
pub const HEADER_RING_CAPACITY: usize = 8;
pub const HEADER_ID_TABLE_BASE_OFFSET: usize = 9;
pub const HEADER_ID_TABLE_CAPACITY: usize = 10;
pub const HEADER_HEAD_POINTER: usize = 11;
pub const HEADER_PLAYHEAD_TICK: usize = 12;
/// BPM stored as a fixed-point value with [`BPM_FIXED_POINT_SCALE`] subdivisions.
pub const HEADER_BPM_FIXED: usize = 13;
pub const HEADER_PPQ: usize = 14;
pub const HEADER_RING_HEAD: usize = 15;
pub const HEADER_RING_TAIL: usize = 16;
pub const HEADER_ERROR_FLAG: usize = 17;
pub const HEADER_SAFE_ZONE_TICKS: usize = 18;
/// Sample rate in Hz. Not named explicitly in the header field list but
/// required to derive `samples_per_tick`; see `DESIGN.md`.
pub const HEADER_SAMPLE_RATE: usize = 19;
/// Zone-A free-list head, packed as `(generation << 16) | index`, CAS'd by
/// the audio thread. See [`crate::zone_a::ZoneA`].
pub const HEADER_ZONE_A_FREE_HEAD: usize = 20;
/// Zone-B bump pointer: the next unallocated Zone-B node index.
pub const HEADER_ZONE_B_BUMP: usize = 21;
/// Count of blocks in which the synapse quota was exhausted ("cursor stalled
/// this block"); §7 Starvation telemetry.
pub const HEADER_STALL_COUNTER: usize = 22;
/// Lifetime count of synapse fires, exposed for debug/telemetry reads.
pub const HEADER_FIRE_COUNTER: usize = 23;
/// Bumped by the audio thread every time it finishes applying a
/// `HARD_RESET`. The UI side of the handshake (see
/// [`crate::bridge::Bridge::hard_reset`]) polls this to know when it is
/// safe to rewind Zone B's bump pointer.
pub const HEADER_RESET_GENERATION: usize = 24;

/// Total number of words in the header.
pub const HEADER_WORDS: usize = 25;

// ---------------------------------------------------------------------
// Node record layout (C1, §3 "Node").
// ---------------------------------------------------------------------

pub const NODE_OPCODE: usize = 0;
pub const NODE_PITCH: usize = 1;
pub const NODE_VELOCITY: usize = 2;
pub const NODE_DURATION: usize = 3;
pub const NODE_BASE_TICK: usize = 4;
pub const NODE_FLAGS: usize = 5;
pub const NODE_SOURCE_ID: usize = 6;
/// Byte-offset — here, word-offset, see module docs — of the next node in
/// the intrusive list, or of the next free node while parked on Zone A's
/// free-list.
pub const NODE_NEXT: usize = 7;
pub const NODE_SEQ: usize = 8;

/// Words per node record.
pub const NODE_WORDS: usize = 9;

/// Opcode: reserved, an inactive/free slot.
pub const OPCODE_NONE: u32 = 0x00;
/// Opcode: a scheduled note event.
pub const OPCODE_NOTE: u32 = 0x01;
/// Opcode: a loop-closure barrier node.
pub const OPCODE_BARRIER: u32 = 0x05;

/// Flag: the node is linked into the list and should be traversed.
pub const FLAG_ACTIVE: u32 = 0x01;
/// Flag: suppress note-on/note-off emission without unlinking the node.
pub const FLAG_MUTED: u32 = 0x02;
/// Flag: the node has been logically deleted; Zone-B nodes carry this
/// forever since Zone B never reclaims.
pub const FLAG_TOMBSTONE: u32 = 0x04;

// ---------------------------------------------------------------------
// Synapse slot layout (C6, §3 "Synapse slot").
// ---------------------------------------------------------------------

pub const SLOT_SOURCE: usize = 0;
pub const SLOT_TARGET: usize = 1;
pub const SLOT_WEIGHT: usize = 2;
pub const SLOT_JITTER: usize = 3;
pub const SLOT_META_NEXT: usize = 4;
pub const SLOT_GENERATION: usize = 5;

/// Words per synapse slot.
pub const SLOT_WORDS: usize = 6;

/// Maximum synapse weight (inclusive); weights are integers in `0..=1000`.
pub const MAX_WEIGHT: u32 = 1000;

/// Maximum number of candidates collected from one source's synapse chain
/// during resolution (§4.9 step 5c).
pub const MAX_SYNAPSE_CANDIDATES: usize = 64;

// ---------------------------------------------------------------------
// Command record layout (C4, §3 "Command record").
// ---------------------------------------------------------------------

pub const CMD_OP: usize = 0;
pub const CMD_PAYLOAD_0: usize = 1;
pub const CMD_PAYLOAD_1: usize = 2;
pub const CMD_PAYLOAD_2: usize = 3;
pub const CMD_PAYLOAD_3: usize = 4;
pub const CMD_PAYLOAD_4: usize = 5;
pub const CMD_PAYLOAD_5: usize = 6;
pub const CMD_SEQ: usize = 7;

/// Words per command record.
pub const CMD_WORDS: usize = 8;
/// Number of payload words available to a command.
pub const CMD_PAYLOAD_WORDS: usize = 6;

// ---------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------

/// `BPM_FIXED` subdivisions per whole BPM unit (three decimal digits of
/// precision, e.g. `120.500` BPM is stored as `120_500`).
pub const BPM_FIXED_POINT_SCALE: u32 = 1000;

/// Default pulses-per-quarter-note.
pub const DEFAULT_PPQ: u32 = 960;

/// Default tempo in BPM.
pub const DEFAULT_BPM: f64 = 120.0;

/// Default per-block upper bound on synapse fires (§4.9 "Quota").
pub const DEFAULT_QUOTA: u32 = 256;

/// Default maximum commands drained from the ring per audio block (§4.9 step 1).
pub const DEFAULT_MAX_DRAIN_PER_BLOCK: u32 = 64;
