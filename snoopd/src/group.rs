// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The multicast group directory.
//!
//! Each entry maps a multicast MAC to the set of ports with at least one
//! live listener.  Entries live in a fixed arena, are found through a
//! small hash table, and are walked in insertion order both by the expiry
//! sweep and by the allocator when it needs to reclaim a drained entry.
//!
//! A drained group (no members left) is not removed from the directory:
//! it keeps its slot and hash linkage with an empty portmap until the
//! allocator reuses it for a new MAC.  Re-adding a member for the same
//! MAC therefore finds the old entry again at no cost.
//!
//! Expiry here is deliberately coarse.  The whole group expires on the
//! deadline of its most recent refresh; individual member timestamps are
//! maintained but only the router table (see `router.rs`) reaps at member
//! granularity.

use std::net::Ipv4Addr;

use slog::debug;

use common::network::MacAddr;
use common::ports::{PortId, PortMap, PORT_COUNT, PORT_MAX};
use common::ticks::{time_after, time_before, Tick, TIMER_HZ};
use sal::SwitchOps;

use crate::member::{MemberHandle, MemberPool};
use crate::types::{SnoopError, SnoopResult};
use crate::usage::PoolUsage;
use crate::{ether_hash, CacheState, Clock, Snooper, HASH_SIZE};

pub(crate) type GroupHandle = u16;

/// One multicast MAC and its per-port member lists.  Also used for the
/// singleton router table, which is the same shape but lives outside the
/// directory.
pub(crate) struct GroupEntry {
    pub ea: MacAddr,
    pub portmap: PortMap,
    pub expires: Tick,
    pub members: Vec<Vec<MemberHandle>>,
}

impl GroupEntry {
    pub fn new(ea: MacAddr) -> Self {
        GroupEntry {
            ea,
            portmap: PortMap::empty(),
            expires: 0,
            members: vec![Vec::new(); PORT_COUNT],
        }
    }

    /// Reinitialize a reclaimed slot for a new MAC.
    fn reset(&mut self, ea: MacAddr) {
        self.ea = ea;
        self.portmap = PortMap::empty();
        self.expires = 0;
        for list in self.members.iter_mut() {
            debug_assert!(list.is_empty());
            list.clear();
        }
    }

    /// The union of all ports with a non-empty member list.
    pub fn compute_portmap(&self) -> PortMap {
        let mut map = PortMap::empty();
        for (port, list) in self.members.iter().enumerate() {
            if !list.is_empty() {
                map.insert(port as PortId);
            }
        }
        map
    }

    /// Refresh the (addr, port) member's deadline, creating the member if
    /// it is not yet on the port list.  Creation is dropped quietly when
    /// the pool is exhausted; the next report re-learns it.
    pub fn refresh_member(
        &mut self,
        pool: &mut MemberPool,
        addr: Ipv4Addr,
        port: PortId,
        expires: Tick,
    ) {
        let list = &mut self.members[port as usize];
        if let Some(&handle) =
            list.iter().find(|&&h| pool.get(h).addr == addr)
        {
            pool.get_mut(handle).expires = expires;
        } else if let Some(handle) = pool.alloc(addr, expires) {
            list.push(handle);
        }
    }

    /// Unlink the (addr, port) member, if present, and release it.
    pub fn remove_member(
        &mut self,
        pool: &mut MemberPool,
        addr: Ipv4Addr,
        port: PortId,
    ) {
        let list = &mut self.members[port as usize];
        if let Some(pos) = list.iter().position(|&h| pool.get(h).addr == addr)
        {
            let handle = list.swap_remove(pos);
            pool.free(handle);
        }
    }

    /// Drain every member back to the pool and clear the portmap.  The
    /// entry itself stays where it is.
    pub fn consume(&mut self, pool: &mut MemberPool) {
        self.portmap = PortMap::empty();
        for list in self.members.iter_mut() {
            for handle in list.drain(..) {
                pool.free(handle);
            }
        }
    }
}

pub(crate) enum GroupAlloc {
    Fresh(GroupHandle),
    Reclaimed {
        handle: GroupHandle,
        evicted: MacAddr,
    },
    Exhausted,
}

pub(crate) struct GroupTable {
    slots: Vec<GroupEntry>,
    /// Handles in insertion order; the expiry sweep and the reclaim scan
    /// both walk this.
    pub order: Vec<GroupHandle>,
    hash: Vec<Vec<GroupHandle>>,
    capacity: usize,
    inserts: u64,
    evictions: u64,
    exhaustion: u64,
}

impl GroupTable {
    pub fn new(capacity: usize) -> Self {
        GroupTable {
            slots: Vec::new(),
            order: Vec::new(),
            hash: vec![Vec::new(); HASH_SIZE],
            capacity,
            inserts: 0,
            evictions: 0,
            exhaustion: 0,
        }
    }

    pub fn lookup(&self, ea: MacAddr) -> Option<GroupHandle> {
        let bucket = ether_hash(ea) as usize % HASH_SIZE;
        self.hash[bucket]
            .iter()
            .copied()
            .find(|&h| self.slots[h as usize].ea == ea)
    }

    pub fn get(&self, handle: GroupHandle) -> &GroupEntry {
        &self.slots[handle as usize]
    }

    pub fn get_mut(&mut self, handle: GroupHandle) -> &mut GroupEntry {
        &mut self.slots[handle as usize]
    }

    /// Allocate an entry for `ea`.  Below capacity this is a fresh slot;
    /// at capacity the first drained group in insertion order is
    /// reclaimed.  The caller must clear the hardware state of a returned
    /// `evicted` MAC.
    pub fn alloc(&mut self, ea: MacAddr) -> GroupAlloc {
        let bucket = ether_hash(ea) as usize % HASH_SIZE;
        if self.slots.len() < self.capacity {
            let handle = self.slots.len() as GroupHandle;
            self.slots.push(GroupEntry::new(ea));
            self.hash[bucket].push(handle);
            self.order.push(handle);
            self.inserts += 1;
            return GroupAlloc::Fresh(handle);
        }

        let reusable = self
            .order
            .iter()
            .position(|&h| self.slots[h as usize].portmap.is_empty());
        let Some(pos) = reusable else {
            self.exhaustion += 1;
            return GroupAlloc::Exhausted;
        };
        let handle = self.order.remove(pos);
        let evicted = self.slots[handle as usize].ea;
        let old_bucket = ether_hash(evicted) as usize % HASH_SIZE;
        self.hash[old_bucket].retain(|&h| h != handle);

        self.slots[handle as usize].reset(ea);
        self.hash[bucket].push(handle);
        self.order.push(handle);
        self.inserts += 1;
        self.evictions += 1;
        GroupAlloc::Reclaimed { handle, evicted }
    }

    /// Drain a group's members; see [`GroupEntry::consume`].
    pub fn consume(&mut self, handle: GroupHandle, pool: &mut MemberPool) {
        self.slots[handle as usize].consume(pool);
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
            exhaustion: self.exhaustion,
        }
    }
}

impl<S: SwitchOps, C: Clock> Snooper<S, C> {
    /// Record a membership report for `addr` heard on `port`, refreshing
    /// the group's deadline.  Returns the ports newly added to the
    /// group's forwarding set; a non-empty delta has been pushed to the
    /// hardware together with the current router ports.
    pub fn add_member(
        &self,
        maddr: MacAddr,
        addr: Ipv4Addr,
        port: PortId,
        timeout: Tick,
    ) -> SnoopResult<PortMap> {
        if port > PORT_MAX {
            return Err(SnoopError::InvalidPort(port));
        }
        let now = self.clock.now();
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        let handle = match state.groups.lookup(maddr) {
            Some(handle) => Some(handle),
            None => match state.groups.alloc(maddr) {
                GroupAlloc::Fresh(handle) => Some(handle),
                GroupAlloc::Reclaimed { handle, evicted } => {
                    debug!(
                        self.log, "group reclaimed";
                        "old" => %evicted,
                        "new" => %maddr,
                    );
                    self.push_clear(evicted);
                    Some(handle)
                }
                GroupAlloc::Exhausted => None,
            },
        };
        let Some(handle) = handle else {
            debug!(self.log, "group pool exhausted"; "group" => %maddr);
            return Ok(PortMap::empty());
        };

        let CacheState {
            groups,
            members,
            routers,
            group_timer,
            ..
        } = state;
        let group = groups.get_mut(handle);
        let old = group.portmap;
        let expires = now.wrapping_add(timeout);
        group.expires = expires;
        group.refresh_member(members, addr, port, expires);
        let new = group.compute_portmap();
        group.portmap = new;
        let added = (old ^ new) & new;

        group_timer.arm_no_later_than(expires);

        debug!(
            self.log, "member add";
            "group" => %maddr,
            "ports" => %added,
            "addr" => %addr,
            "expires_in" => timeout / TIMER_HZ,
        );

        if !added.is_empty() {
            self.push_add(maddr, added | routers.group.portmap);
        }
        Ok(added)
    }

    /// Drop the (addr, port) member from a group.  Returns the ports
    /// removed from the hardware forwarding set; ports kept alive by the
    /// router table are never torn down here.
    pub fn del_member(
        &self,
        maddr: MacAddr,
        addr: Ipv4Addr,
        port: PortId,
    ) -> SnoopResult<PortMap> {
        if port > PORT_MAX {
            return Err(SnoopError::InvalidPort(port));
        }
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let CacheState {
            groups,
            members,
            routers,
            ..
        } = state;

        let Some(handle) = groups.lookup(maddr) else {
            return Ok(PortMap::empty());
        };
        let group = groups.get_mut(handle);
        let old = group.portmap;
        group.remove_member(members, addr, port);
        let new = group.compute_portmap();
        group.portmap = new;
        let removed = (old ^ new) & old;
        if !removed.is_empty() && new.is_empty() {
            group.consume(members);
        }

        debug!(
            self.log, "member del";
            "group" => %maddr,
            "ports" => %removed,
            "addr" => %addr,
        );

        let removed = removed & !routers.group.portmap;
        if !removed.is_empty() {
            self.push_del(maddr, removed);
        }
        Ok(removed)
    }

    /// Fast expiry, driven by query traffic: clamp one group's deadline
    /// (or every group's) to `now + timeout` so listeners that fail to
    /// report again are reaped promptly.
    pub fn expire_members(
        &self,
        maddr: Option<MacAddr>,
        timeout: Tick,
    ) -> SnoopResult<()> {
        let now = self.clock.now();
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let deadline = now.wrapping_add(timeout);

        match maddr {
            Some(ea) => {
                let handle = state
                    .groups
                    .lookup(ea)
                    .ok_or(SnoopError::NoSuchGroup(ea))?;
                state.groups.get_mut(handle).expires = deadline;
                debug!(
                    self.log, "fast expire";
                    "group" => %ea,
                    "expires_in" => timeout / TIMER_HZ,
                );
            }
            None => {
                for i in 0..state.groups.order.len() {
                    let handle = state.groups.order[i];
                    state.groups.get_mut(handle).expires = deadline;
                }
                debug!(
                    self.log, "fast expire";
                    "group" => "all",
                    "expires_in" => timeout / TIMER_HZ,
                );
            }
        }

        state.group_timer.arm_no_later_than(deadline);
        Ok(())
    }

    /// The group timer body: reap expired groups and re-arm at the
    /// earliest remaining deadline.  Router-facing ports are masked out of
    /// the hardware teardown; the router timer owns their lifecycle.
    pub(crate) fn group_sweep(&self, state: &mut CacheState, now: Tick) {
        let CacheState {
            groups,
            members,
            routers,
            group_timer,
            ..
        } = state;

        let mut next: Option<Tick> = None;
        for i in 0..groups.order.len() {
            let handle = groups.order[i];
            let (ea, old, expires) = {
                let group = groups.get(handle);
                (group.ea, group.portmap, group.expires)
            };
            if old.is_empty() {
                continue;
            }
            if time_after(expires, now) {
                next = Some(match next {
                    Some(at) if time_before(at, expires) => at,
                    _ => expires,
                });
                continue;
            }

            groups.consume(handle, members);
            debug!(
                self.log, "group expired";
                "group" => %ea,
                "ports" => %old,
            );
            let stale = old & !routers.group.portmap;
            if !stale.is_empty() {
                self.push_del(ea, stale);
            }
        }

        if let Some(at) = next {
            group_timer.arm(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GroupAlloc, GroupTable};
    use crate::member::MemberPool;
    use common::network::MacAddr;
    use common::ports::PortMap;
    use std::net::Ipv4Addr;

    fn mac(x: u8) -> MacAddr {
        MacAddr::new(0x01, 0x00, 0x5e, 0, 0, x)
    }

    #[test]
    fn test_lookup_after_alloc() {
        let mut table = GroupTable::new(4);
        assert!(table.lookup(mac(1)).is_none());

        let GroupAlloc::Fresh(a) = table.alloc(mac(1)) else {
            panic!("expected fresh slot");
        };
        let GroupAlloc::Fresh(b) = table.alloc(mac(2)) else {
            panic!("expected fresh slot");
        };
        assert_eq!(table.lookup(mac(1)), Some(a));
        assert_eq!(table.lookup(mac(2)), Some(b));
        assert_eq!(table.usage().occupancy, 2);
    }

    #[test]
    fn test_reclaim_prefers_first_drained() {
        let mut table = GroupTable::new(2);
        let mut pool = MemberPool::new(8);
        let addr = Ipv4Addr::new(10, 0, 0, 1);

        let GroupAlloc::Fresh(a) = table.alloc(mac(1)) else {
            panic!("expected fresh slot");
        };
        let GroupAlloc::Fresh(b) = table.alloc(mac(2)) else {
            panic!("expected fresh slot");
        };
        for handle in [a, b] {
            let group = table.get_mut(handle);
            group.refresh_member(&mut pool, addr, 1, 100);
            group.portmap = group.compute_portmap();
        }

        // Both groups are live, so there is nothing to reclaim.
        assert!(matches!(table.alloc(mac(3)), GroupAlloc::Exhausted));
        assert_eq!(table.usage().exhaustion, 1);

        // Drain the second group; the allocator must pick it and rehash
        // the slot under the new MAC.
        table.consume(b, &mut pool);
        let GroupAlloc::Reclaimed { handle, evicted } = table.alloc(mac(3))
        else {
            panic!("expected reclaimed slot");
        };
        assert_eq!(handle, b);
        assert_eq!(evicted, mac(2));
        assert!(table.lookup(mac(2)).is_none());
        assert_eq!(table.lookup(mac(3)), Some(b));
        assert_eq!(table.get(b).portmap, PortMap::empty());
        assert_eq!(table.usage().occupancy, 2);
    }

    #[test]
    fn test_portmap_tracks_lists() {
        let mut table = GroupTable::new(2);
        let mut pool = MemberPool::new(8);

        let GroupAlloc::Fresh(h) = table.alloc(mac(1)) else {
            panic!("expected fresh slot");
        };
        let group = table.get_mut(h);
        group.refresh_member(&mut pool, Ipv4Addr::new(10, 0, 0, 1), 2, 10);
        group.refresh_member(&mut pool, Ipv4Addr::new(10, 0, 0, 2), 2, 10);
        group.refresh_member(&mut pool, Ipv4Addr::new(10, 0, 0, 3), 5, 10);
        assert_eq!(group.compute_portmap().bits(), (1 << 2) | (1 << 5));

        group.remove_member(&mut pool, Ipv4Addr::new(10, 0, 0, 1), 2);
        assert_eq!(group.compute_portmap().bits(), (1 << 2) | (1 << 5));
        group.remove_member(&mut pool, Ipv4Addr::new(10, 0, 0, 2), 2);
        assert_eq!(group.compute_portmap().bits(), 1 << 5);
        assert_eq!(pool.live(), 1);
    }
}
