// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — In-Memory Network Simulator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Slot-accurate toy network for exercising the schedulers without a
//! radio stack.
//!
//! The hopping scenario models a PAN whose channels each deliver with a
//! fixed probability (jammed channels deliver never). The slot-selection
//! scenario models senders sharing one slotframe towards a sink: two
//! senders in the same slot collide, and everyone else in range
//! overhears the slot as busy.

use crate::activation::ActivationState;
use crate::hopping::HoppingController;
use crate::mac::{ScheduleMac, SlotEventSink, TrafficMac, TxOutcome};
use crate::slot_agent::{DeliveryStats, DeviceRole, SlotSelectionAgent};
use crate::telemetry::ScheduleTelemetry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::info;
use tsch_types::config::{HoppingConfig, SlotSelectionConfig};
use tsch_types::error::{TschError, TschResult};
use tsch_types::state::ValueTable;

/// Calls accepted by a [`SimulatedMac`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacCall {
    SetHoppingSequence(Vec<usize>),
    DeleteLink(usize),
    AddLink(usize, usize),
    RequestTransmission { destination: u16, payload_size: u32 },
}

/// MAC double that stores whatever it is told and can be made to reject
/// edits.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMac {
    sequence: Option<Vec<usize>>,
    links: BTreeMap<usize, usize>,
    pending: Vec<(u16, u32)>,
    calls: Vec<MacCall>,
    /// Schedule edits attempted so far, rejected ones included.
    attempts: usize,
    reject_at: Option<usize>,
    offline: bool,
}

impl SimulatedMac {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`-th schedule edit (0-based, counting every attempt).
    pub fn reject_call(&mut self, n: usize) {
        self.reject_at = Some(n);
    }

    /// While offline every schedule edit is rejected.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn hopping_sequence(&self) -> Option<&[usize]> {
        self.sequence.as_deref()
    }

    pub fn links(&self) -> &BTreeMap<usize, usize> {
        &self.links
    }

    /// Channel the radio would use in `slot`.
    pub fn channel_for(&self, slot: usize) -> Option<usize> {
        match &self.sequence {
            Some(seq) => seq.get(slot).copied(),
            None => self.links.get(&slot).copied(),
        }
    }

    pub fn calls(&self) -> &[MacCall] {
        &self.calls
    }

    pub fn pending(&self) -> &[(u16, u32)] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<(u16, u32)> {
        std::mem::take(&mut self.pending)
    }

    fn admit(&mut self, slot: Option<usize>) -> TschResult<()> {
        let n = self.attempts;
        self.attempts += 1;
        if self.offline {
            return Err(TschError::DeployRejected {
                slot,
                reason: "MAC offline".to_string(),
            });
        }
        if self.reject_at == Some(n) {
            return Err(TschError::DeployRejected {
                slot,
                reason: format!("edit #{n} rejected"),
            });
        }
        Ok(())
    }
}

impl ScheduleMac for SimulatedMac {
    fn set_hopping_sequence(&mut self, channels: &[usize]) -> TschResult<()> {
        self.admit(None)?;
        self.sequence = Some(channels.to_vec());
        self.calls.push(MacCall::SetHoppingSequence(channels.to_vec()));
        Ok(())
    }

    fn delete_link(&mut self, slot: usize) -> TschResult<()> {
        self.admit(Some(slot))?;
        if self.links.remove(&slot).is_none() {
            return Err(TschError::DeployRejected {
                slot: Some(slot),
                reason: "no link in slot".to_string(),
            });
        }
        self.calls.push(MacCall::DeleteLink(slot));
        Ok(())
    }

    fn add_link(&mut self, slot: usize, channel: usize) -> TschResult<()> {
        self.admit(Some(slot))?;
        self.links.insert(slot, channel);
        self.calls.push(MacCall::AddLink(slot, channel));
        Ok(())
    }
}

impl TrafficMac for SimulatedMac {
    fn request_transmission(&mut self, destination: u16, payload_size: u32) -> TschResult<()> {
        self.pending.push((destination, payload_size));
        self.calls.push(MacCall::RequestTransmission {
            destination,
            payload_size,
        });
        Ok(())
    }
}

/// Result of a hopping scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub epochs: usize,
    /// Delivered / attempted per slotframe.
    pub success_ratio_per_epoch: Vec<f64>,
    /// Epoch index at which learning switched on.
    pub activated_at: Option<u64>,
    pub final_state: ActivationState,
    pub value_table: ValueTable,
    pub telemetry: ScheduleTelemetry,
}

impl ScenarioReport {
    /// Mean success ratio over the last `window` epochs.
    pub fn tail_success_ratio(&self, window: usize) -> f64 {
        let n = window.min(self.success_ratio_per_epoch.len());
        if n == 0 {
            return 0.0;
        }
        let tail = &self.success_ratio_per_epoch[self.success_ratio_per_epoch.len() - n..];
        tail.iter().sum::<f64>() / n as f64
    }
}

/// Drive a [`HoppingController`] for `epochs` slotframes on a PAN where
/// channel `c` delivers with probability `channel_success[c]`. One
/// transmission is attempted per slot.
pub fn run_hopping_scenario(
    config: &HoppingConfig,
    channel_success: &[f64],
    epochs: usize,
) -> TschResult<ScenarioReport> {
    if channel_success.len() != config.channel_count {
        return Err(TschError::ConfigError(format!(
            "channel_success has {} entries, expected {}",
            channel_success.len(),
            config.channel_count
        )));
    }
    if channel_success
        .iter()
        .any(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
    {
        return Err(TschError::ConfigError(
            "channel success probabilities must be in [0, 1]".to_string(),
        ));
    }
    if epochs == 0 {
        return Err(TschError::ConfigError("epochs must be > 0".to_string()));
    }

    let mut channel_rng = StdRng::seed_from_u64(config.seed.unwrap_or(0) ^ 0x7dc5_11f0);
    let mut controller = HoppingController::new(config.clone(), SimulatedMac::new())?;
    let s = config.slot_count as u64;
    let mut ratios = Vec::with_capacity(epochs);
    let mut activated_at = None;

    for asn in 0..=epochs as u64 * s {
        let was_active = controller.activation_state() == ActivationState::Active;
        controller.on_slot_boundary(asn)?;
        if asn > 0 && asn % s == 0 {
            if let Some(report) = controller.last_report() {
                ratios.push(report.success_ratio());
                if !was_active && report.state == ActivationState::Active {
                    activated_at = Some(report.epoch);
                }
            }
        }
        if asn == epochs as u64 * s {
            break;
        }

        let slot = (asn % s) as usize;
        let channel = controller
            .mac()
            .channel_for(slot)
            .ok_or_else(|| TschError::DeployRejected {
                slot: Some(slot),
                reason: "no channel scheduled".to_string(),
            })?;
        let success = channel_rng.gen::<f64>() < channel_success[channel];
        controller.on_transmission_outcome(TxOutcome::new(slot, channel, success));
    }

    info!(
        epochs,
        tail_success = ratios.last().copied().unwrap_or(0.0),
        "hopping scenario finished"
    );
    Ok(ScenarioReport {
        epochs,
        success_ratio_per_epoch: ratios,
        activated_at,
        final_state: controller.activation_state(),
        value_table: controller.value_table().clone(),
        telemetry: controller.telemetry().clone(),
    })
}

/// Per-node outcome of a slot-selection run.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub node_id: u16,
    pub role: DeviceRole,
    pub final_slot: usize,
    pub stats: DeliveryStats,
    /// Mean request-to-confirm delay in microseconds.
    pub mean_delay_us: f64,
}

#[derive(Debug, Clone)]
pub struct SlotSelectionReport {
    pub epochs: usize,
    pub nodes: Vec<NodeReport>,
    pub collisions: usize,
}

impl SlotSelectionReport {
    /// Delivered / requested over all senders.
    pub fn overall_success_rate(&self) -> f64 {
        let (ok, total) = self
            .nodes
            .iter()
            .filter(|n| n.role == DeviceRole::Sender)
            .fold((0u32, 0u32), |(ok, total), n| {
                (ok + n.stats.success_count, total + n.stats.total_count)
            });
        if total == 0 {
            return 0.0;
        }
        ok as f64 / total as f64
    }
}

/// Node 0 is the sink (short address 1); nodes 1.. are senders. A sender
/// transmits one queued packet per slotframe in its current slot; it is
/// delivered when no other sender uses that slot.
pub fn run_slot_selection_scenario(
    config: &SlotSelectionConfig,
    epochs: usize,
) -> TschResult<SlotSelectionReport> {
    if epochs == 0 {
        return Err(TschError::ConfigError("epochs must be > 0".to_string()));
    }
    config.validate()?;

    let mut agents = Vec::with_capacity(config.node_count);
    for i in 0..config.node_count {
        let role = if i == 0 {
            DeviceRole::Sink
        } else {
            DeviceRole::Sender
        };
        agents.push(SlotSelectionAgent::new(
            i as u16,
            role,
            config.clone(),
            SimulatedMac::new(),
        )?);
    }

    let s = config.slotframe_size as u64;
    // packets handed to each sender's MAC and not yet sent
    let mut queued = vec![0usize; agents.len()];
    let mut collisions = 0;

    for asn in 0..epochs as u64 * s {
        for agent in agents.iter_mut() {
            agent.on_slot_boundary(asn)?;
        }
        if asn % s == 0 {
            for (i, agent) in agents.iter_mut().enumerate() {
                queued[i] += agent.mac_mut().take_pending().len();
            }
        }

        let slot = (asn % s) as usize;
        let transmitters: Vec<usize> = (0..agents.len())
            .filter(|&i| queued[i] > 0 && agents[i].current_slot() == slot)
            .collect();
        if transmitters.is_empty() {
            continue;
        }
        let delivered = transmitters.len() == 1;
        if !delivered {
            collisions += 1;
        }
        for (i, agent) in agents.iter_mut().enumerate() {
            if agent.is_sink() {
                continue;
            }
            if transmitters.contains(&i) {
                agent.on_transmission_outcome(TxOutcome::new(slot, 0, delivered));
                queued[i] -= 1;
            } else {
                agent.on_overheard_activity(slot);
            }
        }
    }

    let nodes = agents
        .iter()
        .map(|a| NodeReport {
            node_id: a.node_id(),
            role: a.role(),
            final_slot: a.current_slot(),
            stats: *a.stats(),
            mean_delay_us: a.stats().mean_delay_us(config.slot_duration_us),
        })
        .collect();
    Ok(SlotSelectionReport {
        epochs,
        nodes,
        collisions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsch_types::config::{DeployMode, EpsilonSchedule};

    fn jammed_config() -> HoppingConfig {
        HoppingConfig {
            seed: Some(42),
            deactivation_threshold: 3,
            ..HoppingConfig::new(8, 4)
        }
    }

    #[test]
    fn test_simulated_mac_rejects_missing_link() {
        let mut mac = SimulatedMac::new();
        assert!(mac.delete_link(3).is_err());
        mac.add_link(3, 1).unwrap();
        assert_eq!(mac.channel_for(3), Some(1));
        mac.delete_link(3).unwrap();
        assert_eq!(mac.channel_for(3), None);
    }

    #[test]
    fn test_hopping_learns_to_avoid_jammed_channels() {
        let report = run_hopping_scenario(&jammed_config(), &[0.0, 0.0, 1.0, 1.0], 60).unwrap();
        assert_eq!(report.success_ratio_per_epoch.len(), 60);
        assert_eq!(report.activated_at, Some(2));
        assert_eq!(report.final_state, ActivationState::Active);
        // settling epochs hop on channel 0 only
        assert_eq!(report.success_ratio_per_epoch[1], 0.0);
        assert!(
            report.tail_success_ratio(20) > 0.8,
            "tail success {}",
            report.tail_success_ratio(20)
        );
        for slot in 0..8 {
            let best = report.value_table.best_channel(slot);
            assert!(best >= 2, "slot {slot} prefers jammed channel {best}");
        }
        assert_eq!(report.telemetry.epochs_recorded(), 60);
    }

    #[test]
    fn test_hopping_with_link_edits() {
        let mut cfg = jammed_config();
        cfg.deploy_mode = DeployMode::LinkEdits;
        let report = run_hopping_scenario(&cfg, &[0.0, 1.0, 0.0, 0.0], 40).unwrap();
        assert!(report.tail_success_ratio(10) > 0.8);
    }

    #[test]
    fn test_hopping_rejects_bad_channel_model() {
        assert!(run_hopping_scenario(&jammed_config(), &[1.0, 1.0], 5).is_err());
        assert!(run_hopping_scenario(&jammed_config(), &[1.0, 1.0, 2.0, 1.0], 5).is_err());
        assert!(run_hopping_scenario(&jammed_config(), &[1.0; 4], 0).is_err());
    }

    #[test]
    fn test_single_sender_always_delivers() {
        let cfg = SlotSelectionConfig {
            packet_probability: 1.0,
            seed: Some(3),
            ..SlotSelectionConfig::new(5, 2)
        };
        let report = run_slot_selection_scenario(&cfg, 50).unwrap();
        assert_eq!(report.collisions, 0);
        let sender = &report.nodes[1];
        assert_eq!(sender.stats.total_count, 50);
        assert_eq!(sender.stats.success_count, 50);
        assert!((report.overall_success_rate() - 1.0).abs() < 1e-12);
        let expected_us = sender.stats.mean_delay_slots() * 10_000.0;
        assert!((sender.mean_delay_us - expected_us).abs() < 1e-9);
        assert!(sender.mean_delay_us < 5.0 * 10_000.0);
        assert_eq!(report.nodes[0].stats, DeliveryStats::default());
    }

    #[test]
    fn test_contention_accounting() {
        let cfg = SlotSelectionConfig {
            packet_probability: 1.0,
            epsilon_schedule: EpsilonSchedule::Fixed,
            seed: Some(19),
            ..SlotSelectionConfig::new(4, 4)
        };
        let report = run_slot_selection_scenario(&cfg, 100).unwrap();
        let mut delivered = 0;
        for node in report.nodes.iter().filter(|n| n.role == DeviceRole::Sender) {
            assert_eq!(node.stats.total_count, 100);
            assert_eq!(node.stats.confirmed, 100);
            assert!(node.stats.success_count <= node.stats.total_count);
            assert!(node.final_slot < 4);
            delivered += node.stats.success_count as usize;
        }
        let failed = 300 - delivered;
        // every failure is a collision victim, each collision has 2-3 victims
        assert!(report.collisions * 2 <= failed && failed <= report.collisions * 3);
    }
}
