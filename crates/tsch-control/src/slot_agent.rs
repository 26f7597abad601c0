// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Slot-Selection Agent
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-device agent that learns which timeslot to transmit in.
//!
//! Every sender keeps a value per slot and a decaying score of traffic
//! overheard in each slot. Exploration moves to the quietest slot; the
//! exploration rate anneals with the absolute slot number.

use crate::learning::LearningEngine;
use crate::mac::{ScheduleMac, SlotEventSink, TrafficMac, TxOutcome};
use crate::policy::ActionSelector;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};
use tsch_types::config::SlotSelectionConfig;
use tsch_types::error::TschResult;
use tsch_types::state::PeakingTable;

/// Short address of the PAN sink.
pub const SINK_ADDRESS: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRole {
    Sender,
    Sink,
}

/// Delivery counters for one sender.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub success_count: u32,
    pub total_count: u32,
    /// Sum over confirmed packets of (confirm ASN − request ASN).
    pub total_delay_slots: u64,
    pub confirmed: u32,
}

impl DeliveryStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_count as f64
    }

    pub fn mean_delay_slots(&self) -> f64 {
        if self.confirmed == 0 {
            return 0.0;
        }
        self.total_delay_slots as f64 / self.confirmed as f64
    }

    pub fn mean_delay_us(&self, slot_duration_us: u64) -> f64 {
        self.mean_delay_slots() * slot_duration_us as f64
    }
}

pub struct SlotSelectionAgent<M, R = StdRng> {
    node_id: u16,
    role: DeviceRole,
    config: SlotSelectionConfig,
    q: Array1<f64>,
    peaking: PeakingTable,
    current_slot: usize,
    link_installed: bool,
    epsilon: f64,
    selector: ActionSelector<R>,
    engine: LearningEngine,
    mac: M,
    stats: DeliveryStats,
    /// Request ASNs not yet confirmed, oldest first.
    requested_at: VecDeque<u64>,
    last_asn: u64,
}

impl<M: ScheduleMac + TrafficMac> SlotSelectionAgent<M, StdRng> {
    pub fn new(
        node_id: u16,
        role: DeviceRole,
        config: SlotSelectionConfig,
        mac: M,
    ) -> TschResult<Self> {
        // decorrelate per-device streams under a shared scenario seed
        let seed = config.seed.map(|s| s.wrapping_add(u64::from(node_id)));
        Self::with_selector(node_id, role, config, mac, ActionSelector::from_seed(seed))
    }
}

impl<M: ScheduleMac + TrafficMac, R: Rng> SlotSelectionAgent<M, R> {
    pub fn with_selector(
        node_id: u16,
        role: DeviceRole,
        config: SlotSelectionConfig,
        mac: M,
        mut selector: ActionSelector<R>,
    ) -> TschResult<Self> {
        config.validate()?;
        let s = config.slotframe_size;
        let current_slot = selector.uniform_index(s);
        let epsilon = config.epsilon_schedule.epsilon_at(config.learning.epsilon, 0);
        Ok(SlotSelectionAgent {
            node_id,
            role,
            q: Array1::zeros(s),
            peaking: PeakingTable::new(s),
            current_slot,
            link_installed: false,
            epsilon,
            selector,
            engine: LearningEngine::new(config.learning),
            mac,
            stats: DeliveryStats::default(),
            requested_at: VecDeque::new(),
            last_asn: 0,
            config,
        })
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    pub fn is_sink(&self) -> bool {
        self.role == DeviceRole::Sink
    }

    /// Slot this device transmits in.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.q
    }

    pub fn peaking(&self) -> &PeakingTable {
        &self.peaking
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    pub fn has_pending_packet(&self) -> bool {
        !self.requested_at.is_empty()
    }

    /// Requests issued but not yet confirmed.
    pub fn pending_requests(&self) -> usize {
        self.requested_at.len()
    }

    pub fn mac(&self) -> &M {
        &self.mac
    }

    pub fn mac_mut(&mut self) -> &mut M {
        &mut self.mac
    }

    /// Move this device's link to `slot`. On failure the previous link
    /// stays in place.
    fn relink(&mut self, slot: usize) -> TschResult<()> {
        if self.link_installed {
            if slot == self.current_slot {
                return Ok(());
            }
            self.mac.delete_link(self.current_slot)?;
        }
        if let Err(e) = self.mac.add_link(slot, 0) {
            if self.link_installed {
                if let Err(restore) = self.mac.add_link(self.current_slot, 0) {
                    warn!(node = self.node_id, error = %restore, "could not restore link");
                    self.link_installed = false;
                }
            }
            return Err(e);
        }
        self.current_slot = slot;
        self.link_installed = true;
        Ok(())
    }

    fn start_slotframe(&mut self, asn: u64) -> TschResult<()> {
        self.peaking.decay(self.config.learning.sigma);
        let decision = self
            .selector
            .choose_slot(self.q.view(), &self.peaking, self.epsilon);
        debug!(
            node = self.node_id,
            slot = decision.action,
            explored = decision.explored,
            epsilon = self.epsilon,
            "slot chosen"
        );
        let relinked = self.relink(decision.action);
        if let Err(e) = &relinked {
            warn!(node = self.node_id, error = %e, "link update rejected, keeping previous slot");
        }

        if self.selector.chance(self.config.packet_probability) {
            self.mac.request_transmission(SINK_ADDRESS, self.config.packet_size)?;
            self.stats.total_count += 1;
            self.requested_at.push_back(asn);
        }
        relinked
    }
}

impl<M: ScheduleMac + TrafficMac, R: Rng> SlotEventSink for SlotSelectionAgent<M, R> {
    fn on_slot_boundary(&mut self, asn: u64) -> TschResult<()> {
        self.last_asn = asn;
        self.epsilon = self
            .config
            .epsilon_schedule
            .epsilon_at(self.config.learning.epsilon, asn);
        if self.is_sink() || asn % self.config.slotframe_size as u64 != 0 {
            return Ok(());
        }
        self.start_slotframe(asn)
    }

    /// Data confirm for this sender's oldest outstanding request.
    fn on_transmission_outcome(&mut self, outcome: TxOutcome) {
        assert!(
            !self.is_sink(),
            "sink {} received a data confirm",
            self.node_id
        );
        let slot = outcome.slot;
        assert!(
            slot < self.config.slotframe_size,
            "slot {slot} out of range [0, {})",
            self.config.slotframe_size
        );
        if let Some(sent) = self.requested_at.pop_front() {
            self.stats.total_delay_slots += self.last_asn.saturating_sub(sent);
            self.stats.confirmed += 1;
        }
        let value = self.engine.update_slot_choice(&mut self.q, slot, outcome.success);
        if outcome.success {
            self.stats.success_count += 1;
        }
        debug!(node = self.node_id, slot, success = outcome.success, value, "data confirm");
    }

    fn on_overheard_activity(&mut self, slot: usize) {
        if self.is_sink() {
            return;
        }
        self.peaking.bump(slot);
    }
}

impl<M, R> SlotSelectionAgent<M, R> {
    /// One-line delivery summary.
    pub fn summary(&self) -> String {
        format!(
            "Node {} success rate: {:.3} ({}/{})",
            self.node_id,
            self.stats.success_rate(),
            self.stats.success_count,
            self.stats.total_count
        )
    }
}
