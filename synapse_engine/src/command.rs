//! Command records: the fixed-width messages the UI thread enqueues and the
//! audio thread drains and applies.
//!
//! Each record is [`crate::constants::CMD_WORDS`] words: an op tag, six
//! payload words, and a sequence number. [`Command`] is the typed,
//! in-memory form; [`Command::encode`]/[`Command::decode`] convert to and
//! from the packed payload words stored in the ring (see [`crate::ring`]).

use crate::constants::*;

/// Field selector for [`Command::Patch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PatchField {
    Pitch = 0,
    Velocity = 1,
    Duration = 2,
    BaseTick = 3,
    Flags = 4,
}

impl PatchField {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(PatchField::Pitch),
            1 => Some(PatchField::Velocity),
            2 => Some(PatchField::Duration),
            3 => Some(PatchField::BaseTick),
            4 => Some(PatchField::Flags),
            _ => None,
        }
    }
}

/// A decoded command, ready for the audio thread to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Link a node the UI has already allocated and populated (in Zone B)
    /// into the list. `after_ptr`, if nonzero, is a splice-point hint;
    /// otherwise the node is inserted in tick order. The audio thread
    /// never writes node payload fields for an INSERT — only `next` — so
    /// the ring's release/acquire on `tail` is what makes the UI's earlier
    /// writes to `ptr`'s fields visible before this command is applied.
    Insert { ptr: u32, source_id: u32, after_ptr: u32 },
    /// Patch one field of the node currently registered under `source_id`.
    Patch { source_id: u32, field: PatchField, value: u32 },
    /// Remove the node at `ptr` from the list, synapse table, and ID table.
    Delete { ptr: u32 },
    /// Add a synapse slot from `source` to `target`.
    Connect { source: u32, target: u32, weight: u32, jitter: u32 },
    /// Tombstone the synapse slot from `source` to `target`.
    Disconnect { source: u32, target: u32 },
    /// Set the tempo, as a fixed-point BPM value.
    SetBpm { bpm_fixed: u32 },
    /// Set the playhead tick directly.
    SetPlayhead { tick: u32 },
    /// Clear the list, both zones, the synapse table, and the ID table.
    HardReset,
}

const OP_INSERT: u32 = 1;
const OP_PATCH: u32 = 2;
const OP_DELETE: u32 = 3;
const OP_CONNECT: u32 = 4;
const OP_DISCONNECT: u32 = 5;
const OP_SET_BPM: u32 = 6;
const OP_SET_PLAYHEAD: u32 = 7;
const OP_HARD_RESET: u32 = 8;

impl Command {
    /// Encode into `(op, payload)`, ready to be written into a ring slot.
    pub fn encode(&self) -> (u32, [u32; CMD_PAYLOAD_WORDS]) {
        let mut payload = [0u32; CMD_PAYLOAD_WORDS];
        let op = match *self {
            Command::Insert { ptr, source_id, after_ptr } => {
                payload[0] = ptr;
                payload[1] = source_id;
                payload[2] = after_ptr;
                OP_INSERT
            }
            Command::Patch { source_id, field, value } => {
                payload[0] = source_id;
                payload[1] = field as u32;
                payload[2] = value;
                OP_PATCH
            }
            Command::Delete { ptr } => {
                payload[0] = ptr;
                OP_DELETE
            }
            Command::Connect { source, target, weight, jitter } => {
                payload[0] = source;
                payload[1] = target;
                payload[2] = weight;
                payload[3] = jitter;
                OP_CONNECT
            }
            Command::Disconnect { source, target } => {
                payload[0] = source;
                payload[1] = target;
                OP_DISCONNECT
            }
            Command::SetBpm { bpm_fixed } => {
                payload[0] = bpm_fixed;
                OP_SET_BPM
            }
            Command::SetPlayhead { tick } => {
                payload[0] = tick;
                OP_SET_PLAYHEAD
            }
            Command::HardReset => OP_HARD_RESET,
        };
        (op, payload)
    }

    /// Decode from `(op, payload)` as stored in a ring slot. Returns `None`
    /// for an unrecognized op tag or patch field (a corrupted or
    /// version-mismatched record).
    pub fn decode(op: u32, payload: [u32; CMD_PAYLOAD_WORDS]) -> Option<Command> {
        match op {
            OP_INSERT => Some(Command::Insert {
                ptr: payload[0],
                source_id: payload[1],
                after_ptr: payload[2],
            }),
            OP_PATCH => Some(Command::Patch {
                source_id: payload[0],
                field: PatchField::from_u32(payload[1])?,
                value: payload[2],
            }),
            OP_DELETE => Some(Command::Delete { ptr: payload[0] }),
            OP_CONNECT => Some(Command::Connect {
                source: payload[0],
                target: payload[1],
                weight: payload[2],
                jitter: payload[3],
            }),
            OP_DISCONNECT => Some(Command::Disconnect { source: payload[0], target: payload[1] }),
            OP_SET_BPM => Some(Command::SetBpm { bpm_fixed: payload[0] }),
            OP_SET_PLAYHEAD => Some(Command::SetPlayhead { tick: payload[0] }),
            OP_HARD_RESET => Some(Command::HardReset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(command: Command) {
        let (op, payload) = command.encode();
        assert_eq!(Command::decode(op, payload), Some(command));
    }

    #[test]
    fn insert_round_trips() {
        round_trip(Command::Insert { ptr: 2, source_id: 7, after_ptr: NULL });
        round_trip(Command::Insert { ptr: 9, source_id: 0, after_ptr: 3 });
    }

    #[test]
    fn every_other_variant_round_trips() {
        round_trip(Command::Patch { source_id: 3, field: PatchField::BaseTick, value: 960 });
        round_trip(Command::Delete { ptr: 5 });
        round_trip(Command::Connect { source: 1, target: 2, weight: 500, jitter: 10 });
        round_trip(Command::Disconnect { source: 1, target: 2 });
        round_trip(Command::SetBpm { bpm_fixed: 140_000 });
        round_trip(Command::SetPlayhead { tick: 1024 });
        round_trip(Command::HardReset);
    }

    #[test]
    fn unknown_op_fails_to_decode() {
        assert_eq!(Command::decode(99, [0; CMD_PAYLOAD_WORDS]), None);
    }

    #[test]
    fn unknown_patch_field_fails_to_decode() {
        let mut payload = [0u32; CMD_PAYLOAD_WORDS];
        payload[1] = 99;
        assert_eq!(Command::decode(OP_PATCH, payload), None);
    }
}
