// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

/// Per-channel stall flags, latched until read.
#[derive(Clone, Copy, Debug)]
pub struct FanStallStatus(u8);

register_address!(FanStallStatus, address = 0x25, default = 0x00);

impl FanStallStatus {
    pub fn flagged(&self, channel: u8) -> bool {
        (1..=5).contains(&channel) && (self.0 >> (channel - 1)) & 0x01 != 0
    }
}
