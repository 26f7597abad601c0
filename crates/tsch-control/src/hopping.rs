// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — PAN Hopping Controller
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! PAN-wide channel-hopping controller.
//!
//! Learns, for every timeslot of the slotframe, which channel to hop to.
//! Each slotframe closes an epoch:
//!
//! ```text
//! boundary → update (Active only) → reset outcomes → choose channels
//!          → deploy → activation check
//! ```

use crate::activation::{ActivationGate, ActivationState};
use crate::deploy::ScheduleDeployer;
use crate::learning::{EpochUpdate, LearningEngine};
use crate::mac::{ScheduleMac, SlotEventSink, TxOutcome};
use crate::policy::{ActionSelector, Decision};
use crate::telemetry::ScheduleTelemetry;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};
use tsch_types::config::HoppingConfig;
use tsch_types::error::{TschError, TschResult};
use tsch_types::state::{HoppingSequence, OutcomeTracker, ValueTable};

/// What happened at one epoch boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: u64,
    pub asn: u64,
    /// State after the boundary.
    pub state: ActivationState,
    /// `None` while settling.
    pub update: Option<EpochUpdate>,
    pub attempts: usize,
    pub successes: usize,
    pub explored_slots: usize,
    pub deployed: bool,
    /// IEEE 802.15.4 channel numbers in force after the boundary.
    pub physical_channels: Vec<u8>,
}

impl EpochReport {
    pub fn success_ratio(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64
    }
}

pub struct HoppingController<M, R = StdRng> {
    config: HoppingConfig,
    table: ValueTable,
    outcomes: OutcomeTracker,
    current: HoppingSequence,
    selector: ActionSelector<R>,
    engine: LearningEngine,
    gate: ActivationGate,
    deployer: ScheduleDeployer<M>,
    telemetry: ScheduleTelemetry,
    epoch: u64,
    epoch_attempts: usize,
    epoch_successes: usize,
    last_report: Option<EpochReport>,
}

impl<M: ScheduleMac> HoppingController<M, StdRng> {
    /// Validate `config`, draw a random starting schedule and push it.
    pub fn new(config: HoppingConfig, mac: M) -> TschResult<Self> {
        let selector = ActionSelector::from_seed(config.seed);
        Self::with_selector(config, mac, selector)
    }
}

impl<M: ScheduleMac, R: Rng> HoppingController<M, R> {
    pub fn with_selector(
        config: HoppingConfig,
        mac: M,
        mut selector: ActionSelector<R>,
    ) -> TschResult<Self> {
        config.validate()?;
        let (s, c) = (config.slot_count, config.channel_count);
        let initial = HoppingSequence::new((0..s).map(|_| selector.uniform_index(c)).collect());

        let mut deployer = ScheduleDeployer::new(mac, config.deploy_mode);
        deployer.deploy(&initial)?;
        info!(
            slots = s,
            channels = c,
            threshold = config.deactivation_threshold,
            "hopping controller started"
        );

        Ok(HoppingController {
            table: ValueTable::new(s, c),
            outcomes: OutcomeTracker::new(s, c),
            current: initial,
            selector,
            engine: LearningEngine::new(config.learning),
            gate: ActivationGate::new(config.deactivation_threshold),
            deployer,
            telemetry: ScheduleTelemetry::new(config.telemetry_capacity),
            epoch: 0,
            epoch_attempts: 0,
            epoch_successes: 0,
            last_report: None,
            config,
        })
    }

    pub fn config(&self) -> &HoppingConfig {
        &self.config
    }

    pub fn value_table(&self) -> &ValueTable {
        &self.table
    }

    pub fn outcomes(&self) -> &OutcomeTracker {
        &self.outcomes
    }

    /// Schedule currently in force at the MAC.
    pub fn current_configuration(&self) -> &HoppingSequence {
        &self.current
    }

    pub fn activation_state(&self) -> ActivationState {
        self.gate.state()
    }

    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }

    pub fn deployer(&self) -> &ScheduleDeployer<M> {
        &self.deployer
    }

    pub fn mac(&self) -> &M {
        self.deployer.mac()
    }

    pub fn mac_mut(&mut self) -> &mut M {
        self.deployer.mac_mut()
    }

    pub fn telemetry(&self) -> &ScheduleTelemetry {
        &self.telemetry
    }

    /// Completed epochs.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_report(&self) -> Option<&EpochReport> {
        self.last_report.as_ref()
    }

    /// The current configuration as IEEE channel numbers, offset by
    /// `channel_base`.
    pub fn physical_configuration(&self) -> Vec<u8> {
        self.current.physical_channels(self.config.channel_base)
    }

    /// Exploration rate in force: zero until the gate opens.
    pub fn effective_epsilon(&self) -> f64 {
        if self.gate.is_active() {
            self.config.learning.epsilon
        } else {
            0.0
        }
    }

    /// Channel for `slot` under the current policy.
    pub fn choose_action(&mut self, slot: usize) -> usize {
        self.decide(slot).action
    }

    fn decide(&mut self, slot: usize) -> Decision {
        let epsilon = self.effective_epsilon();
        self.selector.choose_channel(&self.table, slot, epsilon)
    }

    /// Push a caller-supplied schedule, e.g. one carried over from a
    /// previous run. The table and gate are untouched.
    pub fn install_schedule(&mut self, sequence: HoppingSequence) -> TschResult<()> {
        if sequence.len() != self.config.slot_count {
            return Err(TschError::ConfigError(format!(
                "schedule has {} slots, slotframe has {}",
                sequence.len(),
                self.config.slot_count
            )));
        }
        if !sequence.fits(self.config.channel_count) {
            return Err(TschError::ConfigError(format!(
                "schedule uses a channel index >= {}",
                self.config.channel_count
            )));
        }
        self.deployer.deploy(&sequence)?;
        self.current = sequence;
        Ok(())
    }

    fn plan_schedule(&mut self) -> (HoppingSequence, usize) {
        let mut explored = 0;
        let channels = (0..self.config.slot_count)
            .map(|slot| {
                let d = self.decide(slot);
                explored += usize::from(d.explored);
                d.action
            })
            .collect();
        (HoppingSequence::new(channels), explored)
    }

    fn close_epoch(&mut self, asn: u64) -> TschResult<()> {
        let update = if self.gate.begin_epoch() {
            Some(self.engine.update_epoch(&mut self.table, &self.outcomes, &self.current))
        } else {
            debug!(
                count = self.gate.deactivation_count(),
                threshold = self.gate.threshold(),
                "settling, learning suppressed"
            );
            None
        };
        self.outcomes.reset_epoch();

        let (next, explored_slots) = self.plan_schedule();
        let deployed = self.deployer.deploy(&next);
        if deployed.is_ok() {
            self.current = next;
        }
        let physical_channels = self.physical_configuration();

        if let Some(state) = self.gate.finish_epoch() {
            info!(epoch = self.epoch, asn, ?state, "schedule learning now active");
        }

        let report = EpochReport {
            epoch: self.epoch,
            asn,
            state: self.gate.state(),
            update,
            attempts: self.epoch_attempts,
            successes: self.epoch_successes,
            explored_slots,
            deployed: deployed.is_ok(),
            physical_channels,
        };
        self.telemetry.record(
            report.success_ratio(),
            update.map(|u| u.mean_reward()).unwrap_or(0.0),
            explored_slots as f64 / self.config.slot_count as f64,
        );
        debug!(
            epoch = report.epoch,
            success_ratio = report.success_ratio(),
            explored = explored_slots,
            deployed = report.deployed,
            channels = ?report.physical_channels,
            "epoch closed"
        );

        self.last_report = Some(report);
        self.epoch += 1;
        self.epoch_attempts = 0;
        self.epoch_successes = 0;
        deployed
    }
}

impl<M: ScheduleMac, R: Rng> SlotEventSink for HoppingController<M, R> {
    /// ASN 0 opens the first slotframe; every later multiple of the
    /// slotframe length closes one.
    fn on_slot_boundary(&mut self, asn: u64) -> TschResult<()> {
        let s = self.config.slot_count as u64;
        if asn == 0 || asn % s != 0 {
            return Ok(());
        }
        self.close_epoch(asn)
    }

    fn on_transmission_outcome(&mut self, outcome: TxOutcome) {
        let TxOutcome {
            slot,
            channel,
            success,
        } = outcome;
        assert!(
            slot < self.config.slot_count && channel < self.config.channel_count,
            "outcome ({slot}, {channel}) outside {} slots x {} channels",
            self.config.slot_count,
            self.config.channel_count
        );
        self.epoch_attempts += 1;
        self.epoch_successes += usize::from(success);

        if !self.gate.accepts_outcomes() {
            debug!(slot, channel, success, "settling, outcome discarded");
            return;
        }
        self.outcomes.record_outcome(slot, channel, success);
        debug!(slot, channel, success, "transmission outcome recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedMac;
    use tsch_types::config::{DeployMode, LearningParams};

    fn config(s: usize, c: usize, threshold: u32) -> HoppingConfig {
        HoppingConfig {
            deactivation_threshold: threshold,
            seed: Some(11),
            ..HoppingConfig::new(s, c)
        }
    }

    #[test]
    fn test_construction_shapes_and_initial_push() {
        let ctrl = HoppingController::new(config(7, 3, 2), SimulatedMac::new()).unwrap();
        assert_eq!(ctrl.value_table().len(), 21);
        assert!(ctrl.value_table().values().iter().all(|&v| v == 0.0));
        assert_eq!(ctrl.current_configuration().len(), 7);
        assert!(ctrl.current_configuration().fits(3));
        assert_eq!(
            ctrl.mac().hopping_sequence(),
            Some(ctrl.current_configuration().channels())
        );
        assert_eq!(ctrl.activation_state(), ActivationState::Settling);
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(HoppingController::new(config(0, 3, 2), SimulatedMac::new()).is_err());
    }

    #[test]
    fn test_settling_then_active() {
        let mut ctrl = HoppingController::new(config(4, 2, 3), SimulatedMac::new()).unwrap();
        for epoch in 1..=3u64 {
            for asn in (epoch - 1) * 4 + 1..epoch * 4 {
                ctrl.on_slot_boundary(asn).unwrap();
            }
            assert_eq!(ctrl.activation_state(), ActivationState::Settling);
            ctrl.on_slot_boundary(epoch * 4).unwrap();
            assert!(ctrl.last_report().unwrap().update.is_none());
        }
        assert_eq!(ctrl.activation_state(), ActivationState::Active);
        assert_eq!(ctrl.gate().deactivation_count(), 0);
        assert!(ctrl.value_table().values().iter().all(|&v| v == 0.0));

        ctrl.on_slot_boundary(16).unwrap();
        assert_eq!(ctrl.activation_state(), ActivationState::Active);
        assert_eq!(ctrl.gate().deactivation_count(), 0);
        assert!(ctrl.last_report().unwrap().update.is_some());
    }

    #[test]
    fn test_settling_discards_outcomes() {
        let mut ctrl = HoppingController::new(config(4, 2, 1), SimulatedMac::new()).unwrap();
        ctrl.on_transmission_outcome(TxOutcome::new(0, 1, true));
        assert_eq!(ctrl.outcomes().success_count(), 0);
        ctrl.on_slot_boundary(4).unwrap();
        assert_eq!(ctrl.activation_state(), ActivationState::Active);
        ctrl.on_transmission_outcome(TxOutcome::new(0, 1, true));
        assert!(ctrl.outcomes().succeeded(0, 1));
    }

    #[test]
    fn test_settling_deploys_greedy_schedule() {
        let mut ctrl = HoppingController::new(config(6, 4, 5), SimulatedMac::new()).unwrap();
        ctrl.on_slot_boundary(6).unwrap();
        // zero table, no exploration → first channel everywhere
        assert_eq!(ctrl.current_configuration().channels(), &[0; 6]);
        assert_eq!(ctrl.last_report().unwrap().explored_slots, 0);
    }

    #[test]
    fn test_scenario_update_values() {
        let mut cfg = config(4, 2, 0);
        cfg.learning = LearningParams {
            alpha: 0.5,
            gamma: 0.9,
            epsilon: 0.0,
            ..LearningParams::default()
        };
        let mut ctrl = HoppingController::new(cfg, SimulatedMac::new()).unwrap();
        ctrl.install_schedule(HoppingSequence::new(vec![0, 1, 0, 1])).unwrap();
        for asn in 1..4 {
            ctrl.on_slot_boundary(asn).unwrap();
        }
        ctrl.on_transmission_outcome(TxOutcome::new(0, 0, true));
        ctrl.on_transmission_outcome(TxOutcome::new(1, 1, false));
        ctrl.on_transmission_outcome(TxOutcome::new(2, 0, true));
        ctrl.on_transmission_outcome(TxOutcome::new(3, 1, false));
        ctrl.on_slot_boundary(4).unwrap();

        let v = ctrl.value_table();
        assert!((v.get(3, 1) - -0.5).abs() < 1e-12);
        assert!((v.get(2, 0) - 0.5).abs() < 1e-12);
        assert!((v.get(1, 1) - -0.5).abs() < 1e-12);
        assert!((v.get(0, 0) - 0.5).abs() < 1e-12);
        assert_eq!(ctrl.outcomes().success_count(), 0);

        let report = ctrl.last_report().unwrap();
        assert_eq!(report.attempts, 4);
        assert_eq!(report.successes, 2);
        // greedy redeploy: slots 0 and 2 keep channel 0, slots 1 and 3 move to 0
        assert_eq!(ctrl.current_configuration().channels(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_asn_zero_opens_first_frame() {
        let mut ctrl = HoppingController::new(config(4, 2, 1), SimulatedMac::new()).unwrap();
        ctrl.on_slot_boundary(0).unwrap();
        assert_eq!(ctrl.epoch(), 0);
        assert!(ctrl.last_report().is_none());
        assert_eq!(ctrl.activation_state(), ActivationState::Settling);
        ctrl.on_slot_boundary(4).unwrap();
        assert_eq!(ctrl.epoch(), 1);
        assert_eq!(ctrl.activation_state(), ActivationState::Active);
    }

    #[test]
    fn test_choose_action_follows_gate() {
        let mut ctrl = HoppingController::new(config(3, 4, 1), SimulatedMac::new()).unwrap();
        // settling: greedy on a zero row
        assert_eq!(ctrl.effective_epsilon(), 0.0);
        assert!((0..20).all(|_| ctrl.choose_action(1) == 0));

        ctrl.on_slot_boundary(3).unwrap();
        assert_eq!(ctrl.activation_state(), ActivationState::Active);
        assert!((ctrl.effective_epsilon() - 0.1).abs() < 1e-12);
        assert!((0..20).all(|_| ctrl.choose_action(1) < 4));
    }

    #[test]
    fn test_report_carries_physical_channels() {
        let mut cfg = config(3, 2, 2);
        cfg.channel_base = 20;
        let mut ctrl = HoppingController::new(cfg, SimulatedMac::new()).unwrap();
        ctrl.on_slot_boundary(3).unwrap();
        // settling greedy schedule is channel index 0 everywhere
        assert_eq!(ctrl.last_report().unwrap().physical_channels, vec![20, 20, 20]);
        assert_eq!(ctrl.physical_configuration(), vec![20, 20, 20]);
    }

    #[test]
    fn test_install_schedule_validates() {
        let mut ctrl = HoppingController::new(config(4, 2, 0), SimulatedMac::new()).unwrap();
        assert!(ctrl.install_schedule(HoppingSequence::new(vec![0, 1])).is_err());
        assert!(ctrl
            .install_schedule(HoppingSequence::new(vec![0, 1, 2, 0]))
            .is_err());
    }

    #[test]
    fn test_failed_deploy_retains_and_retries() {
        let mut ctrl = HoppingController::new(config(3, 2, 0), SimulatedMac::new()).unwrap();
        let before = ctrl.current_configuration().clone();
        ctrl.mac_mut().set_offline(true);
        assert!(ctrl.on_slot_boundary(3).is_err());
        assert_eq!(ctrl.current_configuration(), &before);
        assert!(!ctrl.last_report().unwrap().deployed);
        assert_eq!(ctrl.epoch(), 1);

        ctrl.mac_mut().set_offline(false);
        ctrl.on_slot_boundary(6).unwrap();
        assert!(ctrl.last_report().unwrap().deployed);
        assert_eq!(
            ctrl.mac().hopping_sequence(),
            Some(ctrl.current_configuration().channels())
        );
    }

    #[test]
    fn test_link_edit_mode_tracks_configuration() {
        let mut cfg = config(5, 3, 0);
        cfg.deploy_mode = DeployMode::LinkEdits;
        let mut ctrl = HoppingController::new(cfg, SimulatedMac::new()).unwrap();
        ctrl.on_slot_boundary(5).unwrap();
        for slot in 0..5 {
            assert_eq!(
                ctrl.mac().channel_for(slot),
                Some(ctrl.current_configuration().channel(slot))
            );
        }
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_out_of_range_outcome_panics() {
        let mut ctrl = HoppingController::new(config(4, 2, 0), SimulatedMac::new()).unwrap();
        ctrl.on_transmission_outcome(TxOutcome::new(4, 0, true));
    }
}
