//! In-memory transport with fault injection.
//!
//! Every participant gets a FIFO mailbox. Tests play the network adversary
//! by scheduling faults against a mailbox, or by intercepting a payload and
//! injecting a replacement.

use std::collections::{HashMap, VecDeque};

use keyward_core::{ExchangeError, ParticipantId, Transport};

/// Something the simulated network does to a payload in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Flip bit `bit % 8` of byte `byte % len`
    FlipBit {
        /// Byte position, wrapped to the payload length
        byte: usize,
        /// Bit within the byte
        bit: u8,
    },
    /// Lose the payload
    Drop,
    /// Deliver the payload twice
    Duplicate,
    /// Deliver these bytes instead
    Replace(Vec<u8>),
}

/// Mailbox-per-participant transport.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    mailboxes: HashMap<ParticipantId, VecDeque<Vec<u8>>>,
    /// Faults applied in order to the next sends to each participant
    faults: HashMap<ParticipantId, VecDeque<Fault>>,
    /// Count of payloads accepted by `send`
    sent: u64,
    /// When set, every `send` fails
    partitioned: bool,
}

impl MemoryTransport {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `fault` to the next payload sent to `to`.
    pub fn schedule_fault(&mut self, to: ParticipantId, fault: Fault) {
        self.faults.entry(to).or_default().push_back(fault);
    }

    /// Remove and return the oldest payload waiting for `to` without
    /// delivering it.
    pub fn intercept(&mut self, to: ParticipantId) -> Option<Vec<u8>> {
        self.mailboxes.get_mut(&to).and_then(VecDeque::pop_front)
    }

    /// Place `payload` at the front of `to`'s mailbox, as if it had just
    /// arrived.
    pub fn inject(&mut self, to: ParticipantId, payload: Vec<u8>) {
        self.mailboxes.entry(to).or_default().push_front(payload);
    }

    /// Make every subsequent `send` fail until healed.
    pub fn partition(&mut self) {
        self.partitioned = true;
    }

    /// Undo [`partition`](Self::partition).
    pub fn heal(&mut self) {
        self.partitioned = false;
    }

    /// Payloads waiting for `to`.
    pub fn pending(&self, to: ParticipantId) -> usize {
        self.mailboxes.get(&to).map_or(0, VecDeque::len)
    }

    /// Payloads accepted by `send` so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn deliver(&mut self, to: ParticipantId, payload: Vec<u8>) {
        self.mailboxes.entry(to).or_default().push_back(payload);
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, to: ParticipantId, mut payload: Vec<u8>) -> Result<(), ExchangeError> {
        if self.partitioned {
            return Err(ExchangeError::Transport(format!("{to} unreachable")));
        }
        self.sent += 1;

        let fault = self.faults.get_mut(&to).and_then(VecDeque::pop_front);
        if let Some(fault) = &fault {
            tracing::debug!(%to, ?fault, "applying fault");
        }

        match fault {
            None => self.deliver(to, payload),
            Some(Fault::FlipBit { byte, bit }) => {
                if !payload.is_empty() {
                    let index = byte % payload.len();
                    payload[index] ^= 1 << (bit % 8);
                }
                self.deliver(to, payload);
            },
            Some(Fault::Drop) => {},
            Some(Fault::Duplicate) => {
                self.deliver(to, payload.clone());
                self.deliver(to, payload);
            },
            Some(Fault::Replace(bytes)) => self.deliver(to, bytes),
        }
        Ok(())
    }

    fn receive(&mut self, me: ParticipantId) -> Result<Option<Vec<u8>>, ExchangeError> {
        Ok(self.mailboxes.get_mut(&me).and_then(VecDeque::pop_front))
    }
}
