// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Index of the strictly largest value; ties resolve to the first index.
pub fn argmax_first<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the strictly smallest value; ties resolve to the first index.
pub fn argmin_first<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Learned value per (slot, channel). Shape `[slot_count, channel_count]`,
/// fixed at construction, all zeros initially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTable {
    values: Array2<f64>,
}

impl ValueTable {
    pub fn new(slot_count: usize, channel_count: usize) -> Self {
        ValueTable {
            values: Array2::zeros((slot_count, channel_count)),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.values.nrows()
    }

    pub fn channel_count(&self) -> usize {
        self.values.ncols()
    }

    /// Total number of entries (S × C).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, slot: usize, channel: usize) -> f64 {
        self.check_cell(slot, channel);
        self.values[[slot, channel]]
    }

    pub fn set(&mut self, slot: usize, channel: usize, value: f64) {
        self.check_cell(slot, channel);
        self.values[[slot, channel]] = value;
    }

    pub fn row(&self, slot: usize) -> ArrayView1<'_, f64> {
        self.check_slot(slot);
        self.values.row(slot)
    }

    /// Largest value of any channel in `slot`.
    pub fn row_max(&self, slot: usize) -> f64 {
        self.row(slot).fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
    }

    /// Greedy channel for `slot`, first index on ties.
    pub fn best_channel(&self, slot: usize) -> usize {
        argmax_first(self.row(slot).iter().copied()).unwrap_or(0)
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    fn check_slot(&self, slot: usize) {
        assert!(
            slot < self.slot_count(),
            "slot {slot} out of range [0, {})",
            self.slot_count()
        );
    }

    fn check_cell(&self, slot: usize, channel: usize) {
        self.check_slot(slot);
        assert!(
            channel < self.channel_count(),
            "channel {channel} out of range [0, {})",
            self.channel_count()
        );
    }
}

/// Per-epoch "at least one success" flags, same shape as the value table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTracker {
    succeeded: Array2<bool>,
}

impl OutcomeTracker {
    pub fn new(slot_count: usize, channel_count: usize) -> Self {
        OutcomeTracker {
            succeeded: Array2::from_elem((slot_count, channel_count), false),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.succeeded.nrows()
    }

    pub fn channel_count(&self) -> usize {
        self.succeeded.ncols()
    }

    /// Record one attempt. A failure never clears an earlier success.
    /// Returns the cell state after recording.
    pub fn record_outcome(&mut self, slot: usize, channel: usize, success: bool) -> bool {
        self.check_cell(slot, channel);
        let cell = &mut self.succeeded[[slot, channel]];
        *cell |= success;
        *cell
    }

    pub fn succeeded(&self, slot: usize, channel: usize) -> bool {
        self.check_cell(slot, channel);
        self.succeeded[[slot, channel]]
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.iter().filter(|&&s| s).count()
    }

    pub fn reset_epoch(&mut self) {
        self.succeeded.fill(false);
    }

    fn check_cell(&self, slot: usize, channel: usize) {
        assert!(
            slot < self.slot_count() && channel < self.channel_count(),
            "outcome cell ({slot}, {channel}) out of range [0, {}) x [0, {})",
            self.slot_count(),
            self.channel_count()
        );
    }
}

/// Decayed per-slot score of overheard contention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakingTable {
    scores: Array1<f64>,
}

impl PeakingTable {
    pub fn new(slot_count: usize) -> Self {
        PeakingTable {
            scores: Array1::zeros(slot_count),
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, slot: usize) -> f64 {
        self.scores[slot]
    }

    pub fn bump(&mut self, slot: usize) {
        assert!(
            slot < self.len(),
            "slot {slot} out of range [0, {})",
            self.len()
        );
        self.scores[slot] += 1.0;
    }

    pub fn decay(&mut self, sigma: f64) {
        self.scores.mapv_inplace(|v| v * sigma);
    }

    /// Least contested slot, first index on ties.
    pub fn quietest_slot(&self) -> usize {
        argmin_first(self.scores.iter().copied()).unwrap_or(0)
    }
}

/// Ordered slot → channel-index map pushed to the MAC for one slotframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct HoppingSequence(Vec<usize>);

impl HoppingSequence {
    pub fn new(channels: Vec<usize>) -> Self {
        HoppingSequence(channels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn channel(&self, slot: usize) -> usize {
        self.0[slot]
    }

    pub fn channels(&self) -> &[usize] {
        &self.0
    }

    /// IEEE channel numbers, `base + index`.
    pub fn physical_channels(&self, base: u8) -> Vec<u8> {
        self.0
            .iter()
            .map(|&c| {
                let channel = usize::from(base) + c;
                assert!(
                    channel <= usize::from(u8::MAX),
                    "channel index {c} with base {base} exceeds the u8 channel range"
                );
                channel as u8
            })
            .collect()
    }

    /// True when every entry is a valid index into `channel_count` channels.
    pub fn fits(&self, channel_count: usize) -> bool {
        self.0.iter().all(|&c| c < channel_count)
    }
}

impl From<Vec<usize>> for HoppingSequence {
    fn from(channels: Vec<usize>) -> Self {
        HoppingSequence(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_first_tie_break() {
        assert_eq!(argmax_first([0.0, 1.0, 1.0, -3.0]), Some(1));
        assert_eq!(argmax_first([0.0, 0.0, 0.0]), Some(0));
        assert_eq!(argmax_first(Vec::<f64>::new()), None);
    }

    #[test]
    fn test_argmin_first_tie_break() {
        assert_eq!(argmin_first([2.0, 0.5, 0.5, 3.0]), Some(1));
        assert_eq!(argmin_first([1.0]), Some(0));
    }

    #[test]
    fn test_value_table_shape() {
        let table = ValueTable::new(5, 3);
        assert_eq!(table.len(), 15);
        assert_eq!(table.slot_count(), 5);
        assert_eq!(table.channel_count(), 3);
        assert!(table.values().iter().all(|&v| v == 0.0));
        assert_eq!(table.best_channel(4), 0);
    }

    #[test]
    fn test_value_table_row_max() {
        let mut table = ValueTable::new(2, 3);
        table.set(1, 2, 0.7);
        table.set(1, 0, -0.2);
        assert!((table.row_max(1) - 0.7).abs() < 1e-12);
        assert_eq!(table.best_channel(1), 2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_value_table_rejects_out_of_range() {
        let table = ValueTable::new(2, 2);
        let _ = table.get(2, 0);
    }

    #[test]
    fn test_success_is_sticky() {
        let mut tracker = OutcomeTracker::new(2, 2);
        assert!(tracker.record_outcome(1, 1, true));
        assert!(tracker.record_outcome(1, 1, false));
        assert!(tracker.succeeded(1, 1));
        assert!(!tracker.record_outcome(0, 1, false));
        assert_eq!(tracker.success_count(), 1);
    }

    #[test]
    fn test_reset_clears_all() {
        let mut tracker = OutcomeTracker::new(3, 2);
        tracker.record_outcome(0, 0, true);
        tracker.record_outcome(2, 1, true);
        tracker.reset_epoch();
        for s in 0..3 {
            for c in 0..2 {
                assert!(!tracker.succeeded(s, c));
            }
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_tracker_rejects_out_of_range() {
        let mut tracker = OutcomeTracker::new(2, 2);
        tracker.record_outcome(0, 2, true);
    }

    #[test]
    fn test_peaking_decay_and_quietest() {
        let mut peaking = PeakingTable::new(3);
        peaking.bump(0);
        peaking.bump(0);
        peaking.bump(2);
        peaking.decay(0.5);
        assert!((peaking.score(0) - 1.0).abs() < 1e-12);
        assert!((peaking.score(2) - 0.5).abs() < 1e-12);
        assert_eq!(peaking.quietest_slot(), 1);
    }

    #[test]
    fn test_physical_channels() {
        let seq = HoppingSequence::new(vec![0, 15, 4]);
        assert_eq!(seq.physical_channels(11), vec![11, 26, 15]);
        assert!(seq.fits(16));
        assert!(!seq.fits(15));
    }

    #[test]
    fn test_physical_channels_top_of_range() {
        let seq = HoppingSequence::new(vec![0, 5]);
        assert_eq!(seq.physical_channels(250), vec![250, 255]);
    }

    #[test]
    #[should_panic(expected = "exceeds the u8 channel range")]
    fn test_physical_channels_overflow_panics() {
        HoppingSequence::new(vec![300]).physical_channels(11);
    }
}
