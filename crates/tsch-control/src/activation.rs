// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Activation Gate
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Settling → Active gate.
//!
//! Transmissions right after PAN setup are not a reliable reward signal,
//! so the controller sits out `deactivation_threshold` slotframes before
//! learning. The transition is one-way.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    Settling,
    Active,
}

#[derive(Debug, Clone)]
pub struct ActivationGate {
    state: ActivationState,
    deactivation_count: u32,
    threshold: u32,
}

impl ActivationGate {
    /// A zero threshold starts the gate already active.
    pub fn new(threshold: u32) -> Self {
        let state = if threshold == 0 {
            ActivationState::Active
        } else {
            ActivationState::Settling
        };
        ActivationGate {
            state,
            deactivation_count: 0,
            threshold,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    pub fn deactivation_count(&self) -> u32 {
        self.deactivation_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Outcomes are reward signal only once active.
    pub fn accepts_outcomes(&self) -> bool {
        self.is_active()
    }

    /// First half of an epoch boundary. Returns true when the learning
    /// update should run; while settling, advances the counter instead.
    pub fn begin_epoch(&mut self) -> bool {
        match self.state {
            ActivationState::Active => true,
            ActivationState::Settling => {
                self.deactivation_count += 1;
                false
            }
        }
    }

    /// Second half of an epoch boundary, after the new schedule went out.
    /// Returns the new state when the gate opened on this boundary.
    pub fn finish_epoch(&mut self) -> Option<ActivationState> {
        if self.state == ActivationState::Settling && self.deactivation_count >= self.threshold {
            self.state = ActivationState::Active;
            self.deactivation_count = 0;
            return Some(ActivationState::Active);
        }
        None
    }
}
