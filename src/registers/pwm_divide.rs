// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_offset;

/// Per-channel divider applied to the PWM base frequency.
#[derive(Clone, Copy, Debug)]
pub struct PwmDivide(u8);

register_offset!(PwmDivide, offset = 0x01, default = 0x01);

impl PwmDivide {
    pub fn divider(&self) -> u8 {
        self.0
    }
}
