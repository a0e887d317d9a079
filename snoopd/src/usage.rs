// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

/// Basic capacity and usage statistics for one entry pool
#[derive(Clone, Debug, Default)]
pub struct PoolUsage {
    /// Maximum number of entries in the pool
    pub size: u32,
    /// Current number of entries in the pool
    pub occupancy: u32,
    /// Total number of entries inserted over time
    pub inserts: u64,
    /// Total number of entries released over time
    pub deletes: u64,
    /// Number of entries reclaimed to make room for a new one
    pub evictions: u64,
    /// Number of inserts dropped due to space exhaustion
    pub exhaustion: u64,
}

/// A snapshot of the usage of all three cache pools.
#[derive(Clone, Debug)]
pub struct CacheUsage {
    pub groups: PoolUsage,
    pub members: PoolUsage,
    pub hosts: PoolUsage,
}
