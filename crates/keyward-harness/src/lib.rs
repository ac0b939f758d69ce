//! Deterministic harness for Keyward exchange testing.
//!
//! Seeded implementations of the randomness and transport seams, so whole
//! handshakes run in memory and replay exactly from a seed.
//!
//! - [`SimEntropy`]: ChaCha20 stream behind [`keyward_crypto::RandomSource`]
//! - [`MemoryTransport`]: mailboxes with scheduled faults, interception and
//!   injection
//! - [`Scenario`]: a two-party handshake with an optional in-flight rewrite

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory_transport;
pub mod scenario;
pub mod sim_entropy;

pub use memory_transport::{Fault, MemoryTransport};
pub use scenario::{ALICE, BOB, Outcome, Scenario, relay};
pub use sim_entropy::{SimEntropy, UnavailableEntropy};
