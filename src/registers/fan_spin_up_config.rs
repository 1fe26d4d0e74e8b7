// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_offset;

/// Drive level applied during spin-up, bits 7:5.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SpinUpLevel {
    P30 = 0b000,
    P35 = 0b001,
    P40 = 0b010,
    P45 = 0b011,
    P50 = 0b100,
    P55 = 0b101,
    P60 = 0b110,
    P65 = 0b111,
}

impl SpinUpLevel {
    const LEVELS: [(u8, SpinUpLevel); 8] = [
        (30, SpinUpLevel::P30),
        (35, SpinUpLevel::P35),
        (40, SpinUpLevel::P40),
        (45, SpinUpLevel::P45),
        (50, SpinUpLevel::P50),
        (55, SpinUpLevel::P55),
        (60, SpinUpLevel::P60),
        (65, SpinUpLevel::P65),
    ];

    /// Closest configurable level by absolute distance.
    pub fn closest(percent: u8) -> Self {
        let mut best = SpinUpLevel::P50;
        let mut best_distance = u8::MAX;
        for (level_percent, level) in SpinUpLevel::LEVELS {
            let distance = level_percent.abs_diff(percent);
            if distance < best_distance {
                best = level;
                best_distance = distance;
            }
        }
        best
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0b000 => SpinUpLevel::P30,
            0b001 => SpinUpLevel::P35,
            0b010 => SpinUpLevel::P40,
            0b011 => SpinUpLevel::P45,
            0b100 => SpinUpLevel::P50,
            0b101 => SpinUpLevel::P55,
            0b110 => SpinUpLevel::P60,
            _ => SpinUpLevel::P65,
        }
    }

    pub fn percent(self) -> u8 {
        match self {
            SpinUpLevel::P30 => 30,
            SpinUpLevel::P35 => 35,
            SpinUpLevel::P40 => 40,
            SpinUpLevel::P45 => 45,
            SpinUpLevel::P50 => 50,
            SpinUpLevel::P55 => 55,
            SpinUpLevel::P60 => 60,
            SpinUpLevel::P65 => 65,
        }
    }
}

bitfield::bitfield! {
    /// Spin-up drive level and duration.
    #[derive(Clone, Copy)]
    pub struct FanSpinUpConfig(u8);
    impl Debug;

    /// SPIN_LVL: drive level bits.
    pub level_bits, set_level_bits: 7, 5;

    /// SPINUP_TIME: duration in 50 ms units.
    pub time_units, set_time_units: 4, 0;
}

impl FanSpinUpConfig {
    /// Build the register from a requested level and duration. The level
    /// snaps to the closest pattern; the time quantizes to 50 ms units and
    /// clamps to the 5 bit field.
    pub fn from_settings(level_percent: u8, time_ms: u16) -> Self {
        let mut reg = Self(0);
        reg.set_level(SpinUpLevel::closest(level_percent));
        reg.set_time_units(((time_ms / 50).min(31)) as u8);
        reg
    }

    pub fn level(&self) -> SpinUpLevel {
        SpinUpLevel::from_bits(self.level_bits())
    }

    pub fn set_level(&mut self, value: SpinUpLevel) {
        self.set_level_bits(value as u8);
    }

    pub fn time_ms(&self) -> u16 {
        u16::from(self.time_units()) * 50
    }
}

register_offset!(FanSpinUpConfig, offset = 0x06, default = 0x8A);
