// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Action Selection
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Epsilon-greedy action selection.
//!
//! Multi-channel: explore picks a uniform channel, exploit picks the
//! greedy channel of the slot. Single-device: explore picks the least
//! contested slot, exploit picks the greedy slot. Greedy ties always
//! resolve to the first index.

use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tsch_types::state::{argmax_first, PeakingTable, ValueTable};

/// Chosen action and which branch produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: usize,
    pub explored: bool,
}

/// Epsilon-greedy selector owning its random stream.
#[derive(Debug, Clone)]
pub struct ActionSelector<R = StdRng> {
    rng: R,
}

impl ActionSelector<StdRng> {
    /// Seeded when `seed` is given, entropy-seeded otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        ActionSelector { rng }
    }
}

impl<R: Rng> ActionSelector<R> {
    pub fn new(rng: R) -> Self {
        ActionSelector { rng }
    }

    fn explore(&mut self, epsilon: f64) -> bool {
        self.rng.gen::<f64>() < epsilon
    }

    /// Channel for `slot` (ε-greedy).
    pub fn choose_channel(&mut self, table: &ValueTable, slot: usize, epsilon: f64) -> Decision {
        if self.explore(epsilon) {
            Decision {
                action: self.rng.gen_range(0..table.channel_count()),
                explored: true,
            }
        } else {
            Decision {
                action: table.best_channel(slot),
                explored: false,
            }
        }
    }

    /// Transmission slot for a single device. Exploration steers toward
    /// the quietest slot rather than a uniform one.
    pub fn choose_slot(
        &mut self,
        q: ArrayView1<'_, f64>,
        peaking: &PeakingTable,
        epsilon: f64,
    ) -> Decision {
        assert_eq!(
            q.len(),
            peaking.len(),
            "value vector and peaking table must cover the same slotframe"
        );
        if self.explore(epsilon) {
            Decision {
                action: peaking.quietest_slot(),
                explored: true,
            }
        } else {
            Decision {
                action: argmax_first(q.iter().copied()).unwrap_or(0),
                explored: false,
            }
        }
    }

    /// Bernoulli trial with success probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }

    /// Uniform index in `[0, n)`.
    pub fn uniform_index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}
