// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Switch abstraction layer.
//!
//! The snooping cache drives the switching hardware through the
//! [`SwitchOps`] trait rather than a concrete driver, so the same cache
//! code runs against real hardware and against the in-memory [`stub`]
//! backend used by tests and development.

use thiserror::Error;

use common::network::MacAddr;
use common::ports::{PortId, PortMap};

pub mod stub;

/// A specialized Result type for switch driver operations
pub type SwitchResult<T> = Result<T, SwitchError>;

/// Error type conveying additional information about switch driver errors
#[derive(Error, Debug)]
pub enum SwitchError {
    /// The driver has no entry for the requested key.
    #[error("no matching entry")]
    Missing,
    /// An argument passed to the driver is invalid or inappropriate.  This
    /// indicates misbehavior from the caller.
    #[error("Invalid argument: {}", .0)]
    InvalidArg(String),
    /// An error derived from a purposely triggered synthetic fault for
    /// testing purposes.
    #[error("Synthetic switch error: {}", .0)]
    Synthetic(String),
}

/// The `SwitchOps` trait contains the hardware operations the snooping
/// cache requires.  All calls are synchronous and expected to return
/// promptly.
pub trait SwitchOps {
    /// Look up the ingress port on which `ea` was last seen.  This walks
    /// the hardware address table and is expensive; callers are expected
    /// to memoize the result.
    fn mac_to_port(&self, ea: MacAddr) -> SwitchResult<PortId>;

    /// Add `ports` to the forwarding set for the multicast address `ea`.
    /// Ports already present are unaffected.
    fn portmap_add(&self, ea: MacAddr, ports: PortMap) -> SwitchResult<()>;

    /// Remove `ports` from the forwarding set for the multicast address
    /// `ea`.  Ports not present are unaffected.
    fn portmap_del(&self, ea: MacAddr, ports: PortMap) -> SwitchResult<()>;

    /// Remove the forwarding entry for the multicast address `ea`
    /// entirely.
    fn portmap_clear(&self, ea: MacAddr) -> SwitchResult<()>;
}
