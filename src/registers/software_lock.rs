// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

/// One-way configuration lock. Once the locked value is written the
/// configuration registers stay read-only until a power-on reset.
#[derive(Clone, Copy, Debug)]
pub struct SoftwareLock(u8);

register_address!(SoftwareLock, address = 0xEF, default = 0x00);

impl SoftwareLock {
    pub const LOCKED: u8 = 0xFF;
    pub const UNLOCKED: u8 = 0x00;

    pub fn lock() -> Self {
        Self(Self::LOCKED)
    }

    pub fn locked(&self) -> bool {
        self.0 == Self::LOCKED
    }
}
