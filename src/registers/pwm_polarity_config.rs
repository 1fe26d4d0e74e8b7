// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

bitfield::bitfield! {
    /// PWM polarity per channel.
    #[derive(Clone, Copy)]
    pub struct PwmPolarityConfig(u8);
    impl Debug;

    /// Fan 5 PWM Polarity
    ///
    /// 0: Normal polarity.
    ///
    /// 1: Inverted polarity.
    pub plrty5, set_plrty5: 4;

    /// Fan 4 PWM Polarity
    ///
    /// 0: Normal polarity.
    ///
    /// 1: Inverted polarity.
    pub plrty4, set_plrty4: 3;

    /// Fan 3 PWM Polarity
    ///
    /// 0: Normal polarity.
    ///
    /// 1: Inverted polarity.
    pub plrty3, set_plrty3: 2;

    /// Fan 2 PWM Polarity
    ///
    /// 0: Normal polarity.
    ///
    /// 1: Inverted polarity.
    pub plrty2, set_plrty2: 1;

    /// Fan 1 PWM Polarity
    ///
    /// 0: Normal polarity.
    ///
    /// 1: Inverted polarity.
    pub plrty1, set_plrty1: 0;
}

register_address!(PwmPolarityConfig, address = 0x2A, default = 0x00);
