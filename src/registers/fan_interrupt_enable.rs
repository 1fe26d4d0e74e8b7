// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

/// Gates which channels may assert the shared ALERT# line, bits 4:0.
#[derive(Clone, Copy, Debug)]
pub struct FanInterruptEnable(u8);

register_address!(FanInterruptEnable, address = 0x29, default = 0x00);

impl FanInterruptEnable {
    const ALL_FANS: u8 = 0x1F;

    /// All five channels enabled.
    pub fn all_enabled() -> Self {
        Self(Self::ALL_FANS)
    }

    pub fn enabled(&self, channel: u8) -> bool {
        (1..=5).contains(&channel) && (self.0 >> (channel - 1)) & 0x01 != 0
    }

    pub fn set_enabled(&mut self, channel: u8, enabled: bool) {
        if !(1..=5).contains(&channel) {
            return;
        }
        let bit = 1 << (channel - 1);
        if enabled {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_bits_toggle_independently() {
        let mut enable = FanInterruptEnable::all_enabled();
        enable.set_enabled(3, false);
        assert_eq!(u8::from(enable), 0x1B);
        assert!(!enable.enabled(3));

        enable.set_enabled(3, true);
        assert_eq!(u8::from(enable), 0x1F);
    }
}
