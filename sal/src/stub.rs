// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! An in-memory switch backend.
//!
//! The stub keeps the forwarding state a real switch would hold in its
//! TCAM and journals every mutating call, so a test can both check the
//! final hardware state and assert on the exact sequence of driver calls
//! that produced it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use slog::debug;

use crate::{SwitchError, SwitchOps, SwitchResult};
use common::network::MacAddr;
use common::ports::{PortId, PortMap};

/// One mutating driver call, as recorded in the journal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StubOp {
    PortmapAdd(MacAddr, PortMap),
    PortmapDel(MacAddr, PortMap),
    PortmapClear(MacAddr),
}

#[derive(Default)]
struct StubState {
    // Multicast forwarding entries, keyed by the MAC as a u64.
    portmaps: BTreeMap<u64, PortMap>,
    // Source MAC -> ingress port, as the address table would report it.
    hosts: BTreeMap<u64, PortId>,
    journal: Vec<StubOp>,
    probes: u64,
    // When set, every mutating call fails without touching state.
    broken: bool,
}

/// The in-memory switch.  Clones share state, so a test can keep a handle
/// for inspection while the cache owns another.
#[derive(Clone)]
pub struct StubSwitch {
    log: slog::Logger,
    state: Arc<Mutex<StubState>>,
}

impl StubSwitch {
    pub fn new(log: &slog::Logger) -> Self {
        let log = log.new(slog::o!("unit" => "stub_switch"));
        StubSwitch {
            log,
            state: Arc::new(Mutex::new(StubState::default())),
        }
    }

    /// Teach the address table that `ea` lives on `port`.
    pub fn set_host_port(&self, ea: MacAddr, port: PortId) {
        let mut state = self.state.lock().unwrap();
        state.hosts.insert(u64::from(ea), port);
    }

    /// Number of address-table walks performed so far.
    pub fn probe_count(&self) -> u64 {
        self.state.lock().unwrap().probes
    }

    /// The current forwarding set for `ea`, empty if no entry exists.
    pub fn portmap(&self, ea: MacAddr) -> PortMap {
        let state = self.state.lock().unwrap();
        state
            .portmaps
            .get(&u64::from(ea))
            .copied()
            .unwrap_or_else(PortMap::empty)
    }

    /// Number of forwarding entries currently present.
    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().portmaps.len()
    }

    /// Drain and return the journal of mutating calls.
    pub fn take_journal(&self) -> Vec<StubOp> {
        std::mem::take(&mut self.state.lock().unwrap().journal)
    }

    /// Make every subsequent mutating call fail with a synthetic error.
    pub fn set_broken(&self, broken: bool) {
        self.state.lock().unwrap().broken = broken;
    }

    fn check_broken(state: &StubState) -> SwitchResult<()> {
        if state.broken {
            Err(SwitchError::Synthetic("stub marked broken".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SwitchOps for StubSwitch {
    fn mac_to_port(&self, ea: MacAddr) -> SwitchResult<PortId> {
        let mut state = self.state.lock().unwrap();
        state.probes += 1;
        match state.hosts.get(&u64::from(ea)) {
            Some(port) => Ok(*port),
            None => Err(SwitchError::Missing),
        }
    }

    fn portmap_add(&self, ea: MacAddr, ports: PortMap) -> SwitchResult<()> {
        if ports.is_empty() {
            return Err(SwitchError::InvalidArg(
                "empty portmap update".to_string(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        Self::check_broken(&state)?;
        debug!(self.log, "portmap add"; "group" => %ea, "ports" => %ports);
        state.journal.push(StubOp::PortmapAdd(ea, ports));
        let entry = state
            .portmaps
            .entry(u64::from(ea))
            .or_insert_with(PortMap::empty);
        *entry |= ports;
        Ok(())
    }

    fn portmap_del(&self, ea: MacAddr, ports: PortMap) -> SwitchResult<()> {
        if ports.is_empty() {
            return Err(SwitchError::InvalidArg(
                "empty portmap update".to_string(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        Self::check_broken(&state)?;
        debug!(self.log, "portmap del"; "group" => %ea, "ports" => %ports);
        state.journal.push(StubOp::PortmapDel(ea, ports));
        let key = u64::from(ea);
        let now_empty = match state.portmaps.get_mut(&key) {
            Some(entry) => {
                *entry = *entry & !ports;
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            state.portmaps.remove(&key);
        }
        Ok(())
    }

    fn portmap_clear(&self, ea: MacAddr) -> SwitchResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_broken(&state)?;
        debug!(self.log, "portmap clear"; "group" => %ea);
        state.journal.push(StubOp::PortmapClear(ea));
        state.portmaps.remove(&u64::from(ea));
        Ok(())
    }
}
