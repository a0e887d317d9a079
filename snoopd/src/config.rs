// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use serde::Deserialize;

/// Resource limits for the cache.  The defaults are sized for a small
/// access switch; tests shrink them to exercise the eviction paths.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of tracked multicast groups.
    pub group_pool_size: usize,
    /// Maximum number of live members across all groups.
    pub member_pool_size: usize,
    /// Maximum number of memoized source MAC lookups.
    pub host_pool_size: usize,
    /// Seconds a memoized source MAC lookup stays fresh.
    pub host_ttl: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            group_pool_size: 512,
            member_pool_size: 1024,
            host_pool_size: 32,
            host_ttl: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.group_pool_size, 512);
        assert_eq!(config.member_pool_size, 1024);
        assert_eq!(config.host_pool_size, 32);
        assert_eq!(config.host_ttl, 3);
    }
}
