// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Leaf types and utilities shared across the snooping daemon workspace.

pub mod logging;
pub mod network;
pub mod ports;
pub mod ticks;
