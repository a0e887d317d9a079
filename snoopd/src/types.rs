// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! General types used throughout the snooping cache.

use common::network::MacAddr;
use common::ports::PortId;

pub type SnoopResult<T> = Result<T, SnoopError>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SnoopError {
    /// The caller passed a port number outside the platform range.  This
    /// indicates misbehavior from the event source.
    #[error("port {0} out of range")]
    InvalidPort(PortId),
    /// A targeted fast-expire named a group the cache is not tracking.
    #[error("no such group: {0}")]
    NoSuchGroup(MacAddr),
}
