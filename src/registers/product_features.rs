// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

bitfield::bitfield! {
    /// Read-only capability summary of the part.
    #[derive(Clone, Copy)]
    pub struct FeatureRegister(u8);
    impl Debug;

    /// RPM-based closed-loop control supported.
    pub rpm_control, set_rpm_control: 3;

    /// Number of fan channels the part drives.
    pub fan_count, set_fan_count: 2, 0;
}

register_address!(FeatureRegister, address = 0xFC, default = 0x0D);
