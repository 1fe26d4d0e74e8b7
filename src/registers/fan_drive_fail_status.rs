// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

/// Per-channel drive failure flags, latched until read. A set flag means
/// the channel could not hold its target inside the drive fail band at
/// full drive, the signature of a worn-out fan.
#[derive(Clone, Copy, Debug)]
pub struct FanDriveFailStatus(u8);

register_address!(FanDriveFailStatus, address = 0x27, default = 0x00);

impl FanDriveFailStatus {
    pub fn flagged(&self, channel: u8) -> bool {
        (1..=5).contains(&channel) && (self.0 >> (channel - 1)) & 0x01 != 0
    }
}
