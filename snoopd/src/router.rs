// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The router port table.
//!
//! Multicast routers announce themselves through query traffic; every
//! port where one is heard must receive every group's traffic, so the
//! router set is folded into each group's hardware entry.  The table is a
//! single group-shaped entry keyed by (router IP, port) whose portmap is
//! the set of router-facing ports.
//!
//! Unlike ordinary groups, router entries expire individually.  A group
//! that loses its last listener merely stops forwarding; a port wrongly
//! kept in the router set floods every group onto a unicast segment, so
//! each detected router is timed out on its own deadline.  There is no
//! delete operation; only expiry removes a router.

use std::net::Ipv4Addr;

use slog::debug;

use common::network::MacAddr;
use common::ports::{PortId, PortMap, PORT_MAX};
use common::ticks::{time_after, time_before, Tick, TIMER_HZ};
use sal::SwitchOps;

use crate::group::GroupEntry;
use crate::types::{SnoopError, SnoopResult};
use crate::{CacheState, Clock, Snooper};

pub(crate) struct RouterTable {
    pub group: GroupEntry,
}

impl RouterTable {
    pub fn new() -> Self {
        RouterTable {
            group: GroupEntry::new(MacAddr::ZERO),
        }
    }
}

impl<S: SwitchOps, C: Clock> Snooper<S, C> {
    /// Record a detected multicast router on `port`.  Ports new to the
    /// router set are fanned out to every tracked group's hardware entry.
    /// Returns the ports added to the router set.
    pub fn add_router(
        &self,
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
        let CacheState {
            groups,
            members,
            routers,
            router_timer,
            ..
        } = state;

        let group = &mut routers.group;
        let old = group.portmap;
        let expires = now.wrapping_add(timeout);
        group.expires = expires;
        group.refresh_member(members, addr, port, expires);
        let new = group.compute_portmap();
        group.portmap = new;
        let added = (old ^ new) & new;

        router_timer.arm_no_later_than(expires);

        debug!(
            self.log, "router add";
            "ports" => %added,
            "addr" => %addr,
            "expires_in" => timeout / TIMER_HZ,
        );

        if !added.is_empty() {
            for i in 0..groups.order.len() {
                let entry = groups.get(groups.order[i]);
                let add = added & !entry.portmap;
                if !add.is_empty() {
                    self.push_add(entry.ea, add);
                }
            }
        }
        Ok(added)
    }

    /// The router timer body: reap routers whose individual deadlines
    /// have passed and revoke their ports from every group that has no
    /// listener of its own there.
    pub(crate) fn router_sweep(&self, state: &mut CacheState, now: Tick) {
        let CacheState {
            groups,
            members,
            routers,
            router_timer,
            ..
        } = state;

        let group = &mut routers.group;
        let old = group.portmap;
        let removed;
        if time_after(group.expires, now) {
            let mut next = now.wrapping_add(Tick::MAX / 2);
            for list in group.members.iter_mut() {
                let mut i = 0;
                while i < list.len() {
                    let handle = list[i];
                    let expires = members.get(handle).expires;
                    if time_after(expires, now) {
                        if time_before(expires, next) {
                            next = expires;
                        }
                        i += 1;
                    } else {
                        list.swap_remove(i);
                        members.free(handle);
                    }
                }
            }
            group.expires = next;
            let new = group.compute_portmap();
            group.portmap = new;
            removed = (old ^ new) & old;
            if !new.is_empty() {
                router_timer.arm(next);
            }
        } else {
            // The table's own deadline passed: every router goes at once.
            group.consume(members);
            removed = old;
        }

        debug!(self.log, "router expired"; "ports" => %removed);

        if !removed.is_empty() {
            for i in 0..groups.order.len() {
                let entry = groups.get(groups.order[i]);
                let revoke = removed & !entry.portmap;
                if !revoke.is_empty() {
                    self.push_del(entry.ea, revoke);
                }
            }
        }
    }
}
