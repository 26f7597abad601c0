// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Epoch Telemetry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Fixed-capacity per-epoch history. Allocates once at construction so
//! long runs do not grow memory.

use serde::{Deserialize, Serialize};

/// Ring buffer for one per-epoch metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularChannel {
    data: Vec<f64>,
    head: usize,
    count: usize,
}

impl CircularChannel {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "telemetry capacity must be > 0");
        Self {
            data: vec![0.0; capacity],
            head: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn push(&mut self, value: f64) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        self.count = (self.count + 1).min(self.capacity());
    }

    /// Oldest to newest.
    pub fn history(&self) -> Vec<f64> {
        if self.count < self.capacity() {
            return self.data[..self.count].to_vec();
        }
        let mut out = Vec::with_capacity(self.count);
        out.extend_from_slice(&self.data[self.head..]);
        out.extend_from_slice(&self.data[..self.head]);
        out
    }

    pub fn latest(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let cap = self.capacity();
        Some(self.data[(self.head + cap - 1) % cap])
    }

    /// Mean over the newest `window` entries (fewer if not yet recorded).
    pub fn recent_mean(&self, window: usize) -> Option<f64> {
        let history = self.history();
        let n = window.min(history.len());
        if n == 0 {
            return None;
        }
        let tail = &history[history.len() - n..];
        Some(tail.iter().sum::<f64>() / n as f64)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }
}

/// Per-epoch metrics of a hopping controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTelemetry {
    /// Successful attempts / attempts in the epoch (0 with no traffic).
    pub success_ratio: CircularChannel,
    /// Mean reward handed out by the update (0 while settling).
    pub mean_reward: CircularChannel,
    /// Share of slots whose channel came from exploration.
    pub exploration: CircularChannel,
}

impl ScheduleTelemetry {
    pub fn new(capacity: usize) -> Self {
        Self {
            success_ratio: CircularChannel::new(capacity),
            mean_reward: CircularChannel::new(capacity),
            exploration: CircularChannel::new(capacity),
        }
    }

    pub fn record(&mut self, success_ratio: f64, mean_reward: f64, exploration: f64) {
        self.success_ratio.push(success_ratio);
        self.mean_reward.push(mean_reward);
        self.exploration.push(exploration);
    }

    pub fn epochs_recorded(&self) -> usize {
        self.success_ratio.len()
    }

    pub fn clear(&mut self) {
        self.success_ratio.clear();
        self.mean_reward.clear();
        self.exploration.clear();
    }
}
