// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Switch port identifiers and port bitmaps.

use std::fmt;
use std::ops;

use serde::Deserialize;
use serde::Serialize;

/// A physical switch port number.
pub type PortId = u16;

/// The highest valid port number on the platform.
pub const PORT_MAX: PortId = 31;

/// Number of ports addressable in a [`PortMap`].
pub const PORT_COUNT: usize = PORT_MAX as usize + 1;

/// A bitmap over switch ports: bit `p` set means port `p` is in the set.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize,
)]
pub struct PortMap(u32);

impl PortMap {
    /// The empty set of ports.
    pub const fn empty() -> Self {
        PortMap(0)
    }

    /// The set containing only `port`.
    ///
    /// # Panics
    ///
    /// Panics if `port` exceeds [`PORT_MAX`].
    pub fn single(port: PortId) -> Self {
        assert!(port <= PORT_MAX);
        PortMap(1 << port)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, port: PortId) -> bool {
        port <= PORT_MAX && self.0 & (1 << port) != 0
    }

    pub fn insert(&mut self, port: PortId) {
        assert!(port <= PORT_MAX);
        self.0 |= 1 << port;
    }

    /// Iterate over the ports in the set, in ascending order.
    pub fn ports(self) -> impl Iterator<Item = PortId> {
        (0..PORT_COUNT as PortId).filter(move |p| self.contains(*p))
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl From<u32> for PortMap {
    fn from(bits: u32) -> Self {
        PortMap(bits)
    }
}

impl ops::BitOr for PortMap {
    type Output = PortMap;
    fn bitor(self, rhs: PortMap) -> PortMap {
        PortMap(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for PortMap {
    fn bitor_assign(&mut self, rhs: PortMap) {
        self.0 |= rhs.0;
    }
}

impl ops::BitAnd for PortMap {
    type Output = PortMap;
    fn bitand(self, rhs: PortMap) -> PortMap {
        PortMap(self.0 & rhs.0)
    }
}

impl ops::BitXor for PortMap {
    type Output = PortMap;
    fn bitxor(self, rhs: PortMap) -> PortMap {
        PortMap(self.0 ^ rhs.0)
    }
}

impl ops::Not for PortMap {
    type Output = PortMap;
    fn not(self) -> PortMap {
        PortMap(!self.0)
    }
}

impl fmt::Display for PortMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for PortMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.ports()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::PortMap;
    use super::PORT_MAX;

    #[test]
    fn test_set_ops() {
        let mut a = PortMap::empty();
        assert!(a.is_empty());
        a.insert(2);
        a.insert(PORT_MAX);
        assert!(a.contains(2));
        assert!(a.contains(PORT_MAX));
        assert!(!a.contains(3));

        let b = PortMap::single(2);
        assert_eq!(a & b, b);
        assert_eq!(a | b, a);
        assert_eq!(a & !b, PortMap::single(PORT_MAX));
        assert_eq!((a ^ b) & a, PortMap::single(PORT_MAX));
        assert_eq!(a.ports().collect::<Vec<_>>(), vec![2, PORT_MAX]);
    }

    #[test]
    fn test_delta_identities() {
        // The bits turned on by a transition old -> new.
        let old = PortMap::from(0b0110);
        let new = PortMap::from(0b1100);
        assert_eq!(((old ^ new) & new).bits(), 0b1000);
        // The bits turned off by the same transition.
        assert_eq!(((old ^ new) & old).bits(), 0b0010);
    }
}
