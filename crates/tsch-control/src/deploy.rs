// ─────────────────────────────────────────────────────────────────────
// TSCH-RL Scheduler — Schedule Deployment
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Pushes hopping sequences to the MAC.
//!
//! A deployment either replaces the previous schedule completely or
//! fails and leaves it authoritative. Partially applied link edits are
//! rolled back before the error is returned.

use crate::mac::ScheduleMac;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use tsch_types::config::DeployMode;
use tsch_types::error::TschResult;
use tsch_types::state::HoppingSequence;

#[derive(Debug)]
pub struct ScheduleDeployer<M> {
    mac: M,
    mode: DeployMode,
    last_pushed: Option<HoppingSequence>,
    deployments: usize,
    failures: usize,
}

impl<M: ScheduleMac> ScheduleDeployer<M> {
    pub fn new(mac: M, mode: DeployMode) -> Self {
        ScheduleDeployer {
            mac,
            mode,
            last_pushed: None,
            deployments: 0,
            failures: 0,
        }
    }

    pub fn mode(&self) -> DeployMode {
        self.mode
    }

    /// Sequence most recently accepted by the MAC.
    pub fn last_pushed(&self) -> Option<&HoppingSequence> {
        self.last_pushed.as_ref()
    }

    pub fn deployments(&self) -> usize {
        self.deployments
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn mac(&self) -> &M {
        &self.mac
    }

    pub fn mac_mut(&mut self) -> &mut M {
        &mut self.mac
    }

    pub fn deploy(&mut self, sequence: &HoppingSequence) -> TschResult<()> {
        let result = match self.mode {
            DeployMode::HoppingSequence => self.mac.set_hopping_sequence(sequence.channels()),
            DeployMode::LinkEdits => self.apply_link_edits(sequence),
        };
        match result {
            Ok(()) => {
                self.deployments += 1;
                self.last_pushed = Some(sequence.clone());
                debug!(slots = sequence.len(), mode = ?self.mode, "schedule deployed");
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                warn!(error = %e, "schedule deployment rejected, keeping previous configuration");
                Err(e)
            }
        }
    }

    fn apply_link_edits(&mut self, sequence: &HoppingSequence) -> TschResult<()> {
        let previous = self.last_pushed.clone();
        for slot in 0..sequence.len() {
            if previous.is_some() {
                if let Err(e) = self.mac.delete_link(slot) {
                    self.rollback_links(slot, previous.as_ref());
                    return Err(e);
                }
            }
            if let Err(e) = self.mac.add_link(slot, sequence.channel(slot)) {
                if let Some(prev) = &previous {
                    if let Err(restore) = self.mac.add_link(slot, prev.channel(slot)) {
                        warn!(slot, error = %restore, "could not restore link");
                    }
                }
                self.rollback_links(slot, previous.as_ref());
                return Err(e);
            }
        }
        Ok(())
    }

    /// Undo the edits of slots `0..edited`.
    fn rollback_links(&mut self, edited: usize, previous: Option<&HoppingSequence>) {
        for slot in 0..edited {
            if let Err(e) = self.mac.delete_link(slot) {
                warn!(slot, error = %e, "rollback delete failed");
                continue;
            }
            if let Some(prev) = previous {
                if let Err(e) = self.mac.add_link(slot, prev.channel(slot)) {
                    warn!(slot, error = %e, "rollback add failed");
                }
            }
        }
    }
}

/// Fans one schedule out to every device of a PAN. Each edit is applied
/// to all devices or to none.
#[derive(Debug)]
pub struct PanBroadcast<M> {
    devices: Vec<M>,
    sequence: Option<Vec<usize>>,
    links: BTreeMap<usize, usize>,
}

impl<M: ScheduleMac> PanBroadcast<M> {
    pub fn new(devices: Vec<M>) -> Self {
        PanBroadcast {
            devices,
            sequence: None,
            links: BTreeMap::new(),
        }
    }

    pub fn devices(&self) -> &[M] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [M] {
        &mut self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl<M: ScheduleMac> ScheduleMac for PanBroadcast<M> {
    fn set_hopping_sequence(&mut self, channels: &[usize]) -> TschResult<()> {
        for i in 0..self.devices.len() {
            if let Err(e) = self.devices[i].set_hopping_sequence(channels) {
                match &self.sequence {
                    Some(prev) => {
                        for device in &mut self.devices[..i] {
                            if let Err(restore) = device.set_hopping_sequence(prev) {
                                warn!(error = %restore, "could not restore hopping sequence");
                            }
                        }
                    }
                    None if i > 0 => {
                        warn!(devices = i, "no previous hopping sequence to restore");
                    }
                    None => {}
                }
                return Err(e);
            }
        }
        self.sequence = Some(channels.to_vec());
        Ok(())
    }

    fn delete_link(&mut self, slot: usize) -> TschResult<()> {
        let previous = self.links.get(&slot).copied();
        for i in 0..self.devices.len() {
            if let Err(e) = self.devices[i].delete_link(slot) {
                if let Some(channel) = previous {
                    for device in &mut self.devices[..i] {
                        if let Err(restore) = device.add_link(slot, channel) {
                            warn!(slot, error = %restore, "could not restore link");
                        }
                    }
                }
                return Err(e);
            }
        }
        self.links.remove(&slot);
        Ok(())
    }

    fn add_link(&mut self, slot: usize, channel: usize) -> TschResult<()> {
        for i in 0..self.devices.len() {
            if let Err(e) = self.devices[i].add_link(slot, channel) {
                for device in &mut self.devices[..i] {
                    if let Err(restore) = device.delete_link(slot) {
                        warn!(slot, error = %restore, "could not withdraw link");
                    }
                }
                return Err(e);
            }
        }
        self.links.insert(slot, channel);
        Ok(())
    }
}
