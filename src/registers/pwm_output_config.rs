// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

bitfield::bitfield! {
    /// PWM output driver type per channel. The open drain default needs an
    /// external pull-up on the PWM line.
    #[derive(Clone, Copy)]
    pub struct PwmOutputConfig(u8);
    impl Debug;

    /// Fan 5 PWM Output Type
    ///
    /// 0: Open drain output.
    ///
    /// 1: Push-pull output.
    pub pmot5, set_pmot5: 4;

    /// Fan 4 PWM Output Type
    ///
    /// 0: Open drain output.
    ///
    /// 1: Push-pull output.
    pub pmot4, set_pmot4: 3;

    /// Fan 3 PWM Output Type
    ///
    /// 0: Open drain output.
    ///
    /// 1: Push-pull output.
    pub pmot3, set_pmot3: 2;

    /// Fan 2 PWM Output Type
    ///
    /// 0: Open drain output.
    ///
    /// 1: Push-pull output.
    pub pmot2, set_pmot2: 1;

    /// Fan 1 PWM Output Type
    ///
    /// 0: Open drain output.
    ///
    /// 1: Push-pull output.
    pub pmot1, set_pmot1: 0;
}

register_address!(PwmOutputConfig, address = 0x2B, default = 0x00);
