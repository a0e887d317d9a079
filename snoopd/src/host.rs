// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Source MAC to ingress port memoization.
//!
//! Walking the hardware address table is expensive, so results are held
//! here for a short TTL.  The pool is tiny: when it fills, the entry with
//! the oldest refresh deadline loses its slot.  A probe that fails is
//! returned to the caller but never cached, so the next lookup retries
//! the hardware.

use slog::debug;

use common::network::MacAddr;
use common::ports::{PortId, PORT_MAX};
use common::ticks::{time_after_eq, time_before, Tick, TIMER_HZ};
use sal::SwitchOps;

use crate::usage::PoolUsage;
use crate::{ether_hash, Clock, Snooper, HASH_SIZE};

pub(crate) type HostHandle = u16;

pub(crate) struct HostEntry {
    pub ea: MacAddr,
    pub port: Option<PortId>,
    pub expires: Tick,
}

pub(crate) struct HostTable {
    slots: Vec<HostEntry>,
    // Handles in insertion order; reclaim scans this for the stalest
    // entry.
    order: Vec<HostHandle>,
    hash: Vec<Vec<HostHandle>>,
    capacity: usize,
    inserts: u64,
    evictions: u64,
}

impl HostTable {
    pub fn new(capacity: usize) -> Self {
        HostTable {
            slots: Vec::new(),
            order: Vec::new(),
            hash: vec![Vec::new(); HASH_SIZE],
            capacity,
            inserts: 0,
            evictions: 0,
        }
    }

    pub fn lookup(&self, ea: MacAddr) -> Option<HostHandle> {
        let bucket = ether_hash(ea) as usize % HASH_SIZE;
        self.hash[bucket]
            .iter()
            .copied()
            .find(|&h| self.slots[h as usize].ea == ea)
    }

    pub fn get(&self, handle: HostHandle) -> &HostEntry {
        &self.slots[handle as usize]
    }

    pub fn get_mut(&mut self, handle: HostHandle) -> &mut HostEntry {
        &mut self.slots[handle as usize]
    }

    /// Allocate a slot for `ea`, evicting the entry with the smallest
    /// refresh deadline when the pool is full.  Returns the new handle
    /// and the evicted MAC, if any.
    pub fn alloc(
        &mut self,
        ea: MacAddr,
        now: Tick,
    ) -> (HostHandle, Option<MacAddr>) {
        let bucket = ether_hash(ea) as usize % HASH_SIZE;
        if self.slots.len() < self.capacity {
            let handle = self.slots.len() as HostHandle;
            self.slots.push(HostEntry {
                ea,
                port: None,
                expires: now,
            });
            self.hash[bucket].push(handle);
            self.order.push(handle);
            self.inserts += 1;
            return (handle, None);
        }

        let mut victim = 0;
        for (i, &handle) in self.order.iter().enumerate() {
            let stalest = self.order[victim] as usize;
            if time_before(
                self.slots[handle as usize].expires,
                self.slots[stalest].expires,
            ) {
                victim = i;
            }
        }
        let handle = self.order.remove(victim);
        let evicted = self.slots[handle as usize].ea;
        let old_bucket = ether_hash(evicted) as usize % HASH_SIZE;
        self.hash[old_bucket].retain(|&h| h != handle);

        self.slots[handle as usize] = HostEntry {
            ea,
            port: None,
            expires: now,
        };
        self.hash[bucket].push(handle);
        self.order.push(handle);
        self.inserts += 1;
        self.evictions += 1;
        (handle, Some(evicted))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        for bucket in self.hash.iter_mut() {
            bucket.clear();
        }
    }

    pub fn usage(&self) -> PoolUsage {
        PoolUsage {
            size: self.capacity as u32,
            occupancy: self.order.len() as u32,
            inserts: self.inserts,
            deletes: 0,
            evictions: self.evictions,
            exhaustion: 0,
        }
    }
}

impl<S: SwitchOps, C: Clock> Snooper<S, C> {
    /// The ingress port on which `ea` was last seen, or None if the
    /// hardware does not know the address.  Results are served from the
    /// cache while fresh; otherwise the hardware is probed and a valid
    /// answer is memoized.
    pub fn get_port(&self, ea: MacAddr) -> Option<PortId> {
        let now = self.clock.now();
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        let handle = match state.hosts.lookup(ea) {
            Some(handle) => handle,
            None => {
                let (handle, evicted) = state.hosts.alloc(ea, now);
                if let Some(old) = evicted {
                    debug!(
                        self.log, "host reclaimed";
                        "old" => %old,
                        "new" => %ea,
                    );
                }
                handle
            }
        };

        let entry = state.hosts.get(handle);
        if let Some(port) = entry.port {
            if time_after_eq(entry.expires, now) {
                debug!(self.log, "host port"; "host" => %ea, "port" => port);
                return Some(port);
            }
        }

        match self.switch.mac_to_port(ea) {
            Ok(port) => {
                debug!(self.log, "host read"; "host" => %ea, "port" => port);
                if port <= PORT_MAX {
                    let entry = state.hosts.get_mut(handle);
                    entry.port = Some(port);
                    entry.expires =
                        now.wrapping_add(self.config.host_ttl * TIMER_HZ);
                }
                Some(port)
            }
            Err(e) => {
                debug!(
                    self.log, "host read failed";
                    "host" => %ea,
                    "error" => %e,
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HostTable;
    use common::network::MacAddr;

    fn mac(x: u8) -> MacAddr {
        MacAddr::new(0x02, 0, 0, 0, 0, x)
    }

    #[test]
    fn test_eviction_picks_stalest() {
        let mut table = HostTable::new(2);
        let (a, evicted) = table.alloc(mac(1), 0);
        assert!(evicted.is_none());
        let (b, evicted) = table.alloc(mac(2), 0);
        assert!(evicted.is_none());

        table.get_mut(a).expires = 500;
        table.get_mut(b).expires = 100;

        // The pool is full; the entry refreshed longest ago goes.
        let (c, evicted) = table.alloc(mac(3), 50);
        assert_eq!(c, b);
        assert_eq!(evicted, Some(mac(2)));
        assert!(table.lookup(mac(2)).is_none());
        assert_eq!(table.lookup(mac(3)), Some(c));
        assert_eq!(table.lookup(mac(1)), Some(a));
        assert_eq!(table.usage().evictions, 1);
        assert_eq!(table.usage().occupancy, 2);
    }

    #[test]
    fn test_fresh_entry_has_no_port() {
        let mut table = HostTable::new(2);
        let (h, _) = table.alloc(mac(1), 10);
        assert!(table.get(h).port.is_none());
        assert_eq!(table.get(h).expires, 10);
    }
}
