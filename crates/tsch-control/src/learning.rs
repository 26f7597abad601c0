// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Learning Update
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Temporal-difference updates applied once per slotframe.
//!
//! The hopping rule treats the slotframe as a chain of states: the value
//! of (slot t, channel c) bootstraps from the best value of slot t+1.
//! The last slot has no successor and takes the bare reward.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tsch_types::config::LearningParams;
use tsch_types::state::{HoppingSequence, OutcomeTracker, ValueTable};

/// Summary of one epoch update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpochUpdate {
    pub slots_updated: usize,
    pub rewarded_successes: usize,
    pub total_reward: f64,
}

impl EpochUpdate {
    pub fn mean_reward(&self) -> f64 {
        if self.slots_updated == 0 {
            return 0.0;
        }
        self.total_reward / self.slots_updated as f64
    }
}

/// Applies the Q-learning rules with fixed parameters.
#[derive(Debug, Clone)]
pub struct LearningEngine {
    params: LearningParams,
}

impl LearningEngine {
    pub fn new(params: LearningParams) -> Self {
        LearningEngine { params }
    }

    pub fn params(&self) -> &LearningParams {
        &self.params
    }

    pub fn reward(&self, success: bool) -> f64 {
        if success {
            self.params.success_reward
        } else {
            self.params.failure_reward
        }
    }

    /// Update every (slot, deployed channel) pair of the slotframe.
    ///
    /// Lookahead maxima are taken from the table as it stood before this
    /// pass, so the result does not depend on iteration order.
    pub fn update_epoch(
        &self,
        table: &mut ValueTable,
        outcomes: &OutcomeTracker,
        configuration: &HoppingSequence,
    ) -> EpochUpdate {
        let slot_count = table.slot_count();
        assert_eq!(
            configuration.len(),
            slot_count,
            "configuration length must equal the slotframe length"
        );

        let next_max: Vec<f64> = (0..slot_count)
            .map(|t| {
                if t + 1 < slot_count {
                    table.row_max(t + 1)
                } else {
                    0.0
                }
            })
            .collect();

        let alpha = self.params.alpha;
        let gamma = self.params.gamma;
        let mut summary = EpochUpdate::default();

        for (t, &max_next) in next_max.iter().enumerate() {
            let c = configuration.channel(t);
            let success = outcomes.succeeded(t, c);
            let r = self.reward(success);
            let target = if t == slot_count - 1 {
                r
            } else {
                r + gamma * max_next
            };
            let value = (1.0 - alpha) * table.get(t, c) + alpha * target;
            table.set(t, c, value);

            summary.slots_updated += 1;
            summary.rewarded_successes += usize::from(success);
            summary.total_reward += r;
            debug!(slot = t, channel = c, reward = r, value, "rewarded timeslot");
        }
        summary
    }

    /// Single-device update of the slot actually used:
    /// `Q[a] = (1-α)Q[a] + α(r + γ·max(Q) - Q[a])`, with max over all slots.
    /// Returns the new value.
    pub fn update_slot_choice(&self, q: &mut Array1<f64>, action: usize, success: bool) -> f64 {
        assert!(
            action < q.len(),
            "slot {action} out of range [0, {})",
            q.len()
        );
        let r = self.reward(success);
        let max_q = q.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let old = q[action];
        let alpha = self.params.alpha;
        q[action] = (1.0 - alpha) * old + alpha * (r + self.params.gamma * max_q - old);
        q[action]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(alpha: f64, gamma: f64) -> LearningParams {
        LearningParams {
            alpha,
            gamma,
            ..LearningParams::default()
        }
    }

    #[test]
    fn test_four_slot_epoch() {
        let engine = LearningEngine::new(params(0.5, 0.9));
        let mut table = ValueTable::new(4, 2);
        let mut outcomes = OutcomeTracker::new(4, 2);
        outcomes.record_outcome(0, 0, true);
        outcomes.record_outcome(1, 1, false);
        outcomes.record_outcome(2, 0, true);
        outcomes.record_outcome(3, 1, false);
        let config = HoppingSequence::new(vec![0, 1, 0, 1]);

        let summary = engine.update_epoch(&mut table, &outcomes, &config);

        assert!((table.get(3, 1) - -0.5).abs() < 1e-12);
        assert!((table.get(2, 0) - 0.5).abs() < 1e-12);
        assert!((table.get(1, 1) - -0.5).abs() < 1e-12);
        assert!((table.get(0, 0) - 0.5).abs() < 1e-12);
        assert!((table.get(0, 1)).abs() < 1e-12);
        assert_eq!(summary.slots_updated, 4);
        assert_eq!(summary.rewarded_successes, 2);
        assert!((summary.mean_reward()).abs() < 1e-12);
    }

    #[test]
    fn test_lookahead_reads_pre_update_values() {
        let engine = LearningEngine::new(params(0.5, 1.0));
        let mut table = ValueTable::new(2, 1);
        table.set(1, 0, 2.0);
        let outcomes = OutcomeTracker::new(2, 1);
        let config = HoppingSequence::new(vec![0, 0]);

        engine.update_epoch(&mut table, &outcomes, &config);

        // slot 0 bootstraps from the old 2.0, not the new 0.5
        assert!((table.get(0, 0) - 0.5 * (-1.0 + 2.0)).abs() < 1e-12);
        assert!((table.get(1, 0) - (0.5 * 2.0 + 0.5 * -1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_last_slot_does_not_wrap() {
        let engine = LearningEngine::new(params(1.0, 1.0));
        let mut table = ValueTable::new(3, 1);
        table.set(0, 0, 10.0);
        let mut outcomes = OutcomeTracker::new(3, 1);
        outcomes.record_outcome(2, 0, true);
        let config = HoppingSequence::new(vec![0, 0, 0]);
        engine.update_epoch(&mut table, &outcomes, &config);
        assert!((table.get(2, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_slot_frame() {
        let engine = LearningEngine::new(params(0.5, 0.9));
        let mut table = ValueTable::new(1, 3);
        let mut outcomes = OutcomeTracker::new(1, 3);
        outcomes.record_outcome(0, 2, true);
        engine.update_epoch(&mut table, &outcomes, &HoppingSequence::new(vec![2]));
        assert!((table.get(0, 2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_custom_rewards() {
        let engine = LearningEngine::new(LearningParams {
            alpha: 1.0,
            gamma: 0.0,
            success_reward: 3.0,
            failure_reward: -7.0,
            ..LearningParams::default()
        });
        assert_eq!(engine.reward(true), 3.0);
        assert_eq!(engine.reward(false), -7.0);
    }

    #[test]
    fn test_slot_choice_update() {
        let engine = LearningEngine::new(params(0.1, 0.95));
        let mut q = Array1::from_vec(vec![0.0, 2.0, 0.0]);
        let v = engine.update_slot_choice(&mut q, 0, true);
        // 0.9*0 + 0.1*(1 + 0.95*2 - 0)
        assert!((v - 0.29).abs() < 1e-12);
        assert!((q[1] - 2.0).abs() < 1e-12);

        let v = engine.update_slot_choice(&mut q, 1, false);
        // 0.9*2 + 0.1*(-1 + 0.95*2 - 2)
        assert!((v - (1.8 + 0.1 * (-1.0 + 1.9 - 2.0))).abs() < 1e-12);
    }
}
