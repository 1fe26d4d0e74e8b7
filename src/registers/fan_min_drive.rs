// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_offset;
use crate::convert;

/// Floor the drive output never drops below while the channel runs.
#[derive(Clone, Copy, Debug)]
pub struct FanMinimumDrive(u8);

register_offset!(FanMinimumDrive, offset = 0x08, default = 0x00);

impl FanMinimumDrive {
    pub fn from_percent(percent: f64) -> Self {
        Self(convert::percent_to_pwm_byte(percent))
    }

    pub fn percent(&self) -> f64 {
        convert::pwm_byte_to_percent(self.0)
    }
}
