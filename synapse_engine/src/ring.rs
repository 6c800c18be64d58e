//! The UI-to-audio command ring: a single-producer/single-consumer ring of
//! fixed-size [`Command`] records, stored directly in the shared region.
//!
//! This mirrors [`synapse_core::spsc`]'s ring buffer protocol — the
//! producer publishes new entries with a `Release` store to `tail`, the
//! consumer observes them with an `Acquire` load — but here the backing
//! storage and the head/tail indices live in the shared region rather than
//! in a locally-owned `Box<[Cell<T>]>`, since both producer and consumer
//! are different processes' worth of logical ownership over the *same*
//! memory, not a `Producer<T>`/`Consumer<T>` pair created together from one
//! factory.

use std::sync::atomic::Ordering;

use synapse_core::error::EngineError;

use crate::{command::Command, constants::CMD_PAYLOAD_WORDS, region::Region};

/// UI-thread-only handle for submitting commands into the ring.
pub struct RingProducer<'a> {
    region: &'a Region,
}

impl<'a> RingProducer<'a> {
    pub fn new(region: &'a Region) -> Self {
        Self { region }
    }

    /// Attempt to enqueue `command`. Fails with [`EngineError::RingFull`]
    /// when the ring has no free slots; the caller must retry later.
    pub fn try_push(&self, command: Command, seq: u32) -> Result<(), EngineError> {
        let capacity = self.region.ring_capacity() as u32;
        let tail = self.region.ring_tail(Ordering::Relaxed);
        let head = self.region.ring_head(Ordering::Acquire);
        if tail.wrapping_sub(head) >= capacity {
            self.region.set_error_flag(EngineError::RingFull.code());
            return Err(EngineError::RingFull);
        }

        let slot = tail % capacity;
        let (op, payload) = command.encode();
        self.region.set_ring_field(slot, crate::constants::CMD_OP, op);
        for (index, word) in payload.iter().enumerate() {
            self.region.set_ring_field(slot, crate::constants::CMD_PAYLOAD_0 + index, *word);
        }
        self.region.set_ring_field(slot, crate::constants::CMD_SEQ, seq);

        self.region.set_ring_tail(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }
}

/// Audio-thread-only handle for draining commands from the ring.
pub struct RingConsumer<'a> {
    region: &'a Region,
}

impl<'a> RingConsumer<'a> {
    pub fn new(region: &'a Region) -> Self {
        Self { region }
    }

    /// Pop the next command, if any is pending. The acquire load of `tail`
    /// is what makes every payload word write by the producer
    /// happen-before this read.
    pub fn try_pop(&self) -> Option<(Command, u32)> {
        let head = self.region.ring_head(Ordering::Relaxed);
        let tail = self.region.ring_tail(Ordering::Acquire);
        if head == tail {
            return None;
        }

        let capacity = self.region.ring_capacity() as u32;
        let slot = head % capacity;
        let op = self.region.ring_field(slot, crate::constants::CMD_OP);
        let mut payload = [0u32; CMD_PAYLOAD_WORDS];
        for (index, word) in payload.iter_mut().enumerate() {
            *word = self.region.ring_field(slot, crate::constants::CMD_PAYLOAD_0 + index);
        }
        let seq = self.region.ring_field(slot, crate::constants::CMD_SEQ);

        self.region.set_ring_head(head.wrapping_add(1), Ordering::Release);

        Command::decode(op, payload).map(|command| (command, seq))
    }

    /// Drain up to `max` commands, applying `handler` to each in FIFO
    /// order. Returns the number of commands drained (including any that
    /// failed to decode and were skipped).
    pub fn drain<F: FnMut(Command, u32)>(&self, max: u32, mut handler: F) -> u32 {
        let mut drained = 0;
        while drained < max {
            match self.try_pop() {
                Some((command, seq)) => {
                    handler(command, seq);
                    drained += 1;
                }
                None => break,
            }
        }
        drained
    }
}
