// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — MAC Interface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Narrow contract between the schedulers and a TSCH MAC.
//!
//! The MAC drives a scheduler through [`SlotEventSink`] and receives
//! schedules through [`ScheduleMac`]. Events are delivered serially and
//! every handler runs to completion before the next event.

use tsch_types::error::TschResult;

/// Schedule edits accepted by the MAC.
pub trait ScheduleMac {
    /// Replace the whole slotframe; `channels[slot]` is a channel index.
    fn set_hopping_sequence(&mut self, channels: &[usize]) -> TschResult<()>;

    fn delete_link(&mut self, slot: usize) -> TschResult<()>;

    fn add_link(&mut self, slot: usize, channel: usize) -> TschResult<()>;
}

/// Traffic generation hook used by the slot-selection agent.
pub trait TrafficMac {
    fn request_transmission(&mut self, destination: u16, payload_size: u32) -> TschResult<()>;
}

/// One completed transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub slot: usize,
    pub channel: usize,
    pub success: bool,
}

impl TxOutcome {
    pub fn new(slot: usize, channel: usize, success: bool) -> Self {
        TxOutcome {
            slot,
            channel,
            success,
        }
    }
}

/// Inbound events from the MAC.
pub trait SlotEventSink {
    /// Fired once per slot with the absolute slot number.
    /// Errors are recoverable deployment failures; the sink stays usable.
    fn on_slot_boundary(&mut self, asn: u64) -> TschResult<()>;

    fn on_transmission_outcome(&mut self, outcome: TxOutcome);

    /// Traffic from another node was overheard in `slot`.
    fn on_overheard_activity(&mut self, _slot: usize) {}
}
