// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! IGMP snooping cache.
//!
//! This crate is the table core of the snooping daemon: it turns a stream
//! of membership events (derived from IGMP traffic by the packet layer)
//! into per-group port bitmaps and mirrors them into the switching
//! hardware, so multicast frames reach only ports with interested
//! listeners and ports facing multicast routers.
//!
//! ## Overview
//!
//! Four tables cooperate:
//!
//! - **Groups**: multicast MAC -> per-port member lists, found through a
//!   fixed hash table and bounded by a fixed pool.  A group's `portmap`
//!   is always the union of its non-empty port lists.
//!
//! - **Members**: one entry per (group, port, listener IP), allocated
//!   from a shared bounded pool with a free list.
//!
//! - **Routers**: a singleton group-shaped table of detected multicast
//!   routers.  Its portmap is folded into every group's hardware entry,
//!   since routers must receive all groups.
//!
//! - **Hosts**: a small TTL cache memoizing the expensive source MAC ->
//!   ingress port hardware walk.
//!
//! ## Hardware updates
//!
//! Every mutation computes the symmetric difference between the old and
//! new portmap and pushes only that delta to the driver.  The hardware's
//! current state is authoritative; rewriting a full map would race with
//! unrelated updates to the same entry.  The map pushed for each group
//! MAC is always `group.portmap | routers.portmap`: add paths OR the
//! router set in, delete paths mask it out, and the router expiry walks
//! all groups to revoke its bits symmetrically.
//!
//! ## Execution model
//!
//! All operations and both timer bodies run under one lock, taken at the
//! top of each call so events settle in arrival order.  Nothing blocks;
//! driver calls are synchronous.  The owning event loop asks
//! [`Snooper::next_wake`] for the earliest pending deadline and calls
//! [`Snooper::service_timers`] once it has passed.

use std::sync::Mutex;

use slog::{debug, error, info, o};

use common::network::MacAddr;
use common::ports::PortMap;
use common::ticks::{time_before, Tick};
use sal::SwitchOps;

mod clock;
mod config;
mod group;
mod host;
mod member;
mod router;
mod timer;
mod types;
mod usage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use types::{SnoopError, SnoopResult};
pub use usage::{CacheUsage, PoolUsage};

/// Number of buckets in the group and host hash tables.
pub const HASH_SIZE: usize = 64;

// FNV-1a over the six octets.
pub(crate) fn ether_hash(ea: MacAddr) -> u32 {
    let mut h: u32 = 0x811c9dc5;
    for octet in <[u8; 6]>::from(ea) {
        h ^= octet as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

pub(crate) struct CacheState {
    groups: group::GroupTable,
    members: member::MemberPool,
    hosts: host::HostTable,
    routers: router::RouterTable,
    group_timer: timer::Timer,
    router_timer: timer::Timer,
}

impl CacheState {
    fn new(config: &Config) -> Self {
        CacheState {
            groups: group::GroupTable::new(config.group_pool_size),
            members: member::MemberPool::new(config.member_pool_size),
            hosts: host::HostTable::new(config.host_pool_size),
            routers: router::RouterTable::new(),
            group_timer: timer::Timer::new(),
            router_timer: timer::Timer::new(),
        }
    }
}

/// The snooping cache.  Owns the tables, the switch driver handle, and
/// the tick source; all state sits behind a single lock.
pub struct Snooper<S, C = SystemClock> {
    log: slog::Logger,
    config: Config,
    switch: S,
    clock: C,
    state: Mutex<CacheState>,
}

impl<S: SwitchOps> Snooper<S> {
    pub fn new(log: &slog::Logger, config: Config, switch: S) -> Self {
        Self::with_clock(log, config, switch, SystemClock::new())
    }
}

impl<S: SwitchOps, C: Clock> Snooper<S, C> {
    pub fn with_clock(
        log: &slog::Logger,
        config: Config,
        switch: S,
        clock: C,
    ) -> Self {
        let log = log.new(o!("unit" => "snooper"));
        debug!(
            log, "groups";
            "buckets" => HASH_SIZE,
            "capacity" => config.group_pool_size,
        );
        debug!(log, "members"; "capacity" => config.member_pool_size);
        debug!(
            log, "hosts";
            "buckets" => HASH_SIZE,
            "capacity" => config.host_pool_size,
            "ttl_secs" => config.host_ttl,
        );
        Snooper {
            log,
            state: Mutex::new(CacheState::new(&config)),
            config,
            switch,
            clock,
        }
    }

    /// The earliest pending timer deadline, if any.  The event loop
    /// should call [`Snooper::service_timers`] once it has passed.
    pub fn next_wake(&self) -> Option<Tick> {
        let guard = self.state.lock().unwrap();
        let mut next = None;
        for timer in [&guard.group_timer, &guard.router_timer] {
            if timer.pending() {
                next = Some(match next {
                    Some(at) if time_before(at, timer.expires()) => at,
                    _ => timer.expires(),
                });
            }
        }
        next
    }

    /// Run any timer whose deadline has been reached.
    pub fn service_timers(&self) {
        let now = self.clock.now();
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if state.group_timer.fire_due(now) {
            self.group_sweep(state, now);
        }
        if state.router_timer.fire_due(now) {
            self.router_sweep(state, now);
        }
    }

    /// Tear the cache down: cancel the timers, clear every group's
    /// hardware entry, and drop all pooled state.  The cache is empty and
    /// reusable afterwards.
    pub fn purge(&self) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let CacheState {
            groups,
            members,
            hosts,
            routers,
            group_timer,
            router_timer,
        } = state;

        group_timer.disarm();
        router_timer.disarm();

        for i in 0..groups.order.len() {
            let handle = groups.order[i];
            groups.consume(handle, members);
            self.push_clear(groups.get(handle).ea);
        }
        groups.clear();
        routers.group.consume(members);
        members.clear();
        hosts.clear();

        info!(self.log, "cache purged");
    }

    /// A snapshot of pool occupancy and churn counters.
    pub fn usage(&self) -> CacheUsage {
        let guard = self.state.lock().unwrap();
        CacheUsage {
            groups: guard.groups.usage(),
            members: guard.members.usage(),
            hosts: guard.hosts.usage(),
        }
    }

    // Driver failures are not surfaced to callers: portmaps are
    // recomputed from list state on every call, so the next delta
    // resynchronizes the entry.
    pub(crate) fn push_add(&self, ea: MacAddr, ports: PortMap) {
        if let Err(e) = self.switch.portmap_add(ea, ports) {
            error!(
                self.log, "portmap add failed";
                "group" => %ea,
                "ports" => %ports,
                "error" => %e,
            );
        }
    }

    pub(crate) fn push_del(&self, ea: MacAddr, ports: PortMap) {
        if let Err(e) = self.switch.portmap_del(ea, ports) {
            error!(
                self.log, "portmap del failed";
                "group" => %ea,
                "ports" => %ports,
                "error" => %e,
            );
        }
    }

    pub(crate) fn push_clear(&self, ea: MacAddr) {
        if let Err(e) = self.switch.portmap_clear(ea) {
            error!(
                self.log, "portmap clear failed";
                "group" => %ea,
                "error" => %e,
            );
        }
    }
}
