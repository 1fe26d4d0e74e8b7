// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_address;

bitfield::bitfield! {
    /// Global device configuration.
    #[derive(Clone, Copy)]
    pub struct Configuration(u8);
    impl Debug;

    /// MASK: blocks the ALERT# pin from asserting.
    pub mask, set_mask: 7;

    /// DIS_TO: disables the SMBus timeout for full I2C compliance.
    pub dis_to, set_dis_to: 6;

    /// WD_EN: enables the 4 second watchdog timer.
    pub wd_en, set_wd_en: 5;

    /// DR_EXT_CLK: drives the selected clock out on the CLK pin.
    pub dr_ext_clk, set_dr_ext_clk: 4;

    /// USE_EXT_CLK: clocks the part from an external 32.768 kHz source.
    pub use_ext_clk, set_use_ext_clk: 3;

    /// CLK_SEL: clock selection.
    pub clk_sel, set_clk_sel: 2;

    /// GLBL_EN: master enable for every PWM output. All outputs stay off
    /// while this bit is clear, whatever the per-channel settings say.
    pub glbl_en, set_glbl_en: 1;

    /// GPO: drives the ALERT# pin as a general purpose output.
    pub gpo, set_gpo: 0;
}

register_address!(Configuration, address = 0x20, default = 0x00);
