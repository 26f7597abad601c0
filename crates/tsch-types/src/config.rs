// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::*;
use crate::error::{TschError, TschResult};
use serde::{Deserialize, Serialize};

/// Q-learning parameters shared by both controller variants.
/// Supplied once at construction and never reconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningParams {
    /// Learning rate in [0, 1].
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Discount factor in [0, 1].
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Exploration probability in [0, 1].
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Multiplicative per-epoch decay of the collision-peaking score.
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default = "default_success_reward")]
    pub success_reward: f64,
    #[serde(default = "default_failure_reward")]
    pub failure_reward: f64,
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}
fn default_gamma() -> f64 {
    DEFAULT_GAMMA
}
fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}
fn default_sigma() -> f64 {
    DEFAULT_SIGMA
}
fn default_success_reward() -> f64 {
    DEFAULT_SUCCESS_REWARD
}
fn default_failure_reward() -> f64 {
    DEFAULT_FAILURE_REWARD
}

impl Default for LearningParams {
    fn default() -> Self {
        LearningParams {
            alpha: default_alpha(),
            gamma: default_gamma(),
            epsilon: default_epsilon(),
            sigma: default_sigma(),
            success_reward: default_success_reward(),
            failure_reward: default_failure_reward(),
        }
    }
}

impl LearningParams {
    pub fn validate(&self) -> TschResult<()> {
        check_unit_interval("alpha", self.alpha)?;
        check_unit_interval("gamma", self.gamma)?;
        check_unit_interval("epsilon", self.epsilon)?;
        check_unit_interval("sigma", self.sigma)?;
        if !self.success_reward.is_finite() || !self.failure_reward.is_finite() {
            return Err(TschError::ConfigError(
                "success_reward and failure_reward must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// How epsilon evolves with the absolute slot number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// Use `LearningParams::epsilon` unchanged.
    #[default]
    Fixed,
    /// `epsilon = min(cap, k / asn)`, recomputed before every slot.
    Annealed { k: f64, cap: f64 },
}

impl EpsilonSchedule {
    pub fn annealed_default() -> Self {
        EpsilonSchedule::Annealed {
            k: DEFAULT_EPSILON_ANNEAL_K,
            cap: DEFAULT_EPSILON_CAP,
        }
    }

    /// Exploration rate in effect at `asn`. ASN 0 yields the cap.
    pub fn epsilon_at(&self, base: f64, asn: u64) -> f64 {
        match *self {
            EpsilonSchedule::Fixed => base,
            EpsilonSchedule::Annealed { k, cap } => {
                if asn == 0 {
                    cap
                } else {
                    cap.min(k / asn as f64)
                }
            }
        }
    }

    pub fn validate(&self) -> TschResult<()> {
        if let EpsilonSchedule::Annealed { k, cap } = *self {
            if !k.is_finite() || k < 0.0 {
                return Err(TschError::ConfigError(
                    "epsilon annealing constant k must be finite and >= 0".to_string(),
                ));
            }
            check_unit_interval("epsilon cap", cap)?;
        }
        Ok(())
    }
}

/// How a new schedule is pushed to the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// One `set_hopping_sequence` call per slotframe.
    #[default]
    HoppingSequence,
    /// A `delete_link` / `add_link` pair per slot.
    LinkEdits,
}

/// Multi-channel (PAN-wide) hopping controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoppingConfig {
    /// Slotframe length S.
    pub slot_count: usize,
    /// Channel set size C.
    pub channel_count: usize,
    /// IEEE channel number of channel index 0.
    #[serde(default = "default_channel_base")]
    pub channel_base: u8,
    #[serde(default)]
    pub learning: LearningParams,
    #[serde(default = "default_deactivation_threshold")]
    pub deactivation_threshold: u32,
    #[serde(default)]
    pub deploy_mode: DeployMode,
    /// RNG seed; entropy-seeded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_telemetry_capacity")]
    pub telemetry_capacity: usize,
}

fn default_channel_base() -> u8 {
    CHANNEL_BASE_2_4GHZ
}
fn default_deactivation_threshold() -> u32 {
    DEFAULT_DEACTIVATION_THRESHOLD
}
fn default_telemetry_capacity() -> usize {
    DEFAULT_TELEMETRY_CAPACITY
}

impl HoppingConfig {
    pub fn new(slot_count: usize, channel_count: usize) -> Self {
        HoppingConfig {
            slot_count,
            channel_count,
            channel_base: default_channel_base(),
            learning: LearningParams::default(),
            deactivation_threshold: default_deactivation_threshold(),
            deploy_mode: DeployMode::default(),
            seed: None,
            telemetry_capacity: default_telemetry_capacity(),
        }
    }

    pub fn validate(&self) -> TschResult<()> {
        check_table_dim("slot_count", self.slot_count)?;
        check_table_dim("channel_count", self.channel_count)?;
        if self.channel_base as usize + self.channel_count > 256 {
            return Err(TschError::ConfigError(format!(
                "channel_base {} + channel_count {} exceeds the u8 channel range",
                self.channel_base, self.channel_count
            )));
        }
        if self.telemetry_capacity == 0 {
            return Err(TschError::ConfigError(
                "telemetry_capacity must be > 0".to_string(),
            ));
        }
        self.learning.validate()
    }
}

/// Single-device slot-selection agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSelectionConfig {
    #[serde(default = "default_slotframe_size")]
    pub slotframe_size: usize,
    /// Devices in the network, sink included.
    pub node_count: usize,
    #[serde(default)]
    pub learning: LearningParams,
    #[serde(default = "EpsilonSchedule::annealed_default")]
    pub epsilon_schedule: EpsilonSchedule,
    #[serde(default = "default_packet_probability")]
    pub packet_probability: f64,
    #[serde(default = "default_packet_size")]
    pub packet_size: u32,
    #[serde(default = "default_slot_duration_us")]
    pub slot_duration_us: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_slotframe_size() -> usize {
    DEFAULT_SLOTFRAME_SIZE
}
fn default_packet_probability() -> f64 {
    DEFAULT_PACKET_PROBABILITY
}
fn default_packet_size() -> u32 {
    DEFAULT_PACKET_SIZE
}
fn default_slot_duration_us() -> u64 {
    DEFAULT_SLOT_DURATION_US
}

impl SlotSelectionConfig {
    pub fn new(slotframe_size: usize, node_count: usize) -> Self {
        SlotSelectionConfig {
            slotframe_size,
            node_count,
            learning: LearningParams::default(),
            epsilon_schedule: EpsilonSchedule::annealed_default(),
            packet_probability: default_packet_probability(),
            packet_size: default_packet_size(),
            slot_duration_us: default_slot_duration_us(),
            seed: None,
        }
    }

    pub fn validate(&self) -> TschResult<()> {
        check_table_dim("slotframe_size", self.slotframe_size)?;
        if self.node_count < 2 {
            return Err(TschError::ConfigError(format!(
                "node_count must be >= 2 (one sink plus senders), got {}",
                self.node_count
            )));
        }
        check_unit_interval("packet_probability", self.packet_probability)?;
        if self.slot_duration_us == 0 {
            return Err(TschError::ConfigError(
                "slot_duration_us must be > 0".to_string(),
            ));
        }
        self.epsilon_schedule.validate()?;
        self.learning.validate()
    }
}

/// Top-level scenario file. Either or both controller variants may be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hopping: Option<HoppingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_selection: Option<SlotSelectionConfig>,
}

fn default_epochs() -> usize {
    100
}

impl ScenarioConfig {
    /// Load and validate a JSON scenario file.
    pub fn from_file(path: &str) -> TschResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> TschResult<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TschResult<()> {
        if self.epochs == 0 {
            return Err(TschError::ConfigError("epochs must be > 0".to_string()));
        }
        if self.hopping.is_none() && self.slot_selection.is_none() {
            return Err(TschError::ConfigError(format!(
                "scenario '{}' configures no controller",
                self.name
            )));
        }
        if let Some(hopping) = &self.hopping {
            hopping.validate()?;
        }
        if let Some(slot_selection) = &self.slot_selection {
            slot_selection.validate()?;
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> TschResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(TschError::ConfigError(format!(
            "{name} must be finite and in [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_table_dim(name: &str, value: usize) -> TschResult<()> {
    if value == 0 || value > MAX_TABLE_DIM {
        return Err(TschError::ConfigError(format!(
            "{name} must be in [1, {MAX_TABLE_DIM}], got {value}"
        )));
    }
    Ok(())
}
