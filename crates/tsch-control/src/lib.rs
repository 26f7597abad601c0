// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Scheduling Control
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Learning schedulers for TSCH networks.
//!
//! Two controllers share one learning core: a PAN-wide channel-hopping
//! controller (value table over slot × channel) and a per-device
//! slot-selection agent (value vector over slots).

pub mod activation;
pub mod deploy;
pub mod hopping;
pub mod learning;
pub mod mac;
pub mod policy;
pub mod sim;
pub mod slot_agent;
pub mod telemetry;
