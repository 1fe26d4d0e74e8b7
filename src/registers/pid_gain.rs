// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_offset;

/// Proportional gain multiplier, GAIN bits 7:6. The patterns are an
/// enumeration, not a linear scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GainP {
    X1 = 0b00,
    X2 = 0b01,
    X4 = 0b10,
    X8 = 0b11,
}

impl GainP {
    /// Map a multiplier onto the field. Unmapped values fall back to 2x.
    pub fn from_multiplier(multiplier: u8) -> Self {
        match multiplier {
            1 => GainP::X1,
            2 => GainP::X2,
            4 => GainP::X4,
            8 => GainP::X8,
            _ => GainP::X2,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => GainP::X1,
            0b01 => GainP::X2,
            0b10 => GainP::X4,
            _ => GainP::X8,
        }
    }
}

/// Integral or derivative gain multiplier, GAIN bits 5:3 and 2:0. The two
/// fields share one pattern table; 0b111 is reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GainId {
    X0 = 0b000,
    X1 = 0b001,
    X2 = 0b010,
    X4 = 0b011,
    X8 = 0b100,
    X16 = 0b101,
    X32 = 0b110,
}

impl GainId {
    /// Map a multiplier onto the field. Unmapped values fall back to 1x.
    pub fn from_multiplier(multiplier: u8) -> Self {
        match multiplier {
            0 => GainId::X0,
            1 => GainId::X1,
            2 => GainId::X2,
            4 => GainId::X4,
            8 => GainId::X8,
            16 => GainId::X16,
            32 => GainId::X32,
            _ => GainId::X1,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0b000 => GainId::X0,
            0b001 => GainId::X1,
            0b010 => GainId::X2,
            0b011 => GainId::X4,
            0b100 => GainId::X8,
            0b101 => GainId::X16,
            _ => GainId::X32,
        }
    }
}

bitfield::bitfield! {
    /// Combined PID gain register for the speed control algorithm.
    #[derive(Clone, Copy)]
    pub struct PidGain(u8);
    impl Debug;

    /// GP: proportional gain bits.
    pub gpx_bits, set_gpx_bits: 7, 6;

    /// GI: integral gain bits.
    pub gix_bits, set_gix_bits: 5, 3;

    /// GD: derivative gain bits.
    pub gdx_bits, set_gdx_bits: 2, 0;
}

impl PidGain {
    pub fn gpx(&self) -> GainP {
        GainP::from_bits(self.gpx_bits())
    }

    pub fn set_gpx(&mut self, value: GainP) {
        self.set_gpx_bits(value as u8);
    }

    pub fn gix(&self) -> GainId {
        GainId::from_bits(self.gix_bits())
    }

    pub fn set_gix(&mut self, value: GainId) {
        self.set_gix_bits(value as u8);
    }

    pub fn gdx(&self) -> GainId {
        GainId::from_bits(self.gdx_bits())
    }

    pub fn set_gdx(&mut self, value: GainId) {
        self.set_gdx_bits(value as u8);
    }
}

register_offset!(PidGain, offset = 0x05, default = 0x48);
