// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// First IEEE 802.15.4 channel number in the 2.4 GHz O-QPSK band.
pub const CHANNEL_BASE_2_4GHZ: u8 = 11;

/// Upper bound on either table dimension (slots or channels).
pub const MAX_TABLE_DIM: usize = 512;

/// Default learning rate.
pub const DEFAULT_ALPHA: f64 = 0.1;

/// Default discount factor.
pub const DEFAULT_GAMMA: f64 = 0.95;

/// Default exploration rate.
pub const DEFAULT_EPSILON: f64 = 0.1;

/// Default per-epoch decay of the collision-peaking score.
pub const DEFAULT_SIGMA: f64 = 0.8;

pub const DEFAULT_SUCCESS_REWARD: f64 = 1.0;
pub const DEFAULT_FAILURE_REWARD: f64 = -1.0;

/// Annealing: epsilon = min(cap, k / asn).
pub const DEFAULT_EPSILON_CAP: f64 = 0.5;
pub const DEFAULT_EPSILON_ANNEAL_K: f64 = 10_000.0;

/// Slotframe length used by the slot-selection scenarios.
pub const DEFAULT_SLOTFRAME_SIZE: usize = 15;

/// Probability that a sender queues a packet in a given slotframe.
pub const DEFAULT_PACKET_PROBABILITY: f64 = 0.03;

/// MSDU payload size in bytes.
pub const DEFAULT_PACKET_SIZE: u32 = 50;

/// Standard TSCH timeslot length (µs).
pub const DEFAULT_SLOT_DURATION_US: u64 = 10_000;

/// Epochs spent settling before learning starts.
pub const DEFAULT_DEACTIVATION_THRESHOLD: u32 = 3;

/// Per-epoch telemetry history length.
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 256;
