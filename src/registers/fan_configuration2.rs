// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_offset;

/// RPM error window applied by the control algorithm, CONFIG2 bits 7:6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorRange {
    None = 0b00,
    Rpm50 = 0b01,
    Rpm100 = 0b10,
    Rpm200 = 0b11,
}

impl ErrorRange {
    /// Map an RPM window onto the field. Unmapped values fall back to no
    /// windowing.
    pub fn from_rpm(rpm: u16) -> Self {
        match rpm {
            0 => ErrorRange::None,
            50 => ErrorRange::Rpm50,
            100 => ErrorRange::Rpm100,
            200 => ErrorRange::Rpm200,
            _ => ErrorRange::None,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => ErrorRange::None,
            0b01 => ErrorRange::Rpm50,
            0b10 => ErrorRange::Rpm100,
            _ => ErrorRange::Rpm200,
        }
    }

    pub fn as_rpm(self) -> u16 {
        match self {
            ErrorRange::None => 0,
            ErrorRange::Rpm50 => 50,
            ErrorRange::Rpm100 => 100,
            ErrorRange::Rpm200 => 200,
        }
    }
}

bitfield::bitfield! {
    /// Fan Configuration 2: error window, derivative option, glitch filter
    /// and the measurable RPM range.
    #[derive(Clone, Copy)]
    pub struct FanConfiguration2(u8);
    impl Debug;

    /// ERR_RNG: error window bits.
    pub err_rng_bits, set_err_rng_bits: 7, 6;

    /// DER_OPT: derivative option used by the speed control algorithm.
    pub der_opt, set_der_opt: 5, 3;

    /// GLITCH_EN: tachometer glitch filter.
    pub glitch_en, set_glitch_en: 2;

    /// RNG: selects the 1k-32k RPM range required with the external clock.
    /// Shares bit 5 with the derivative option field.
    pub rng_32k, set_rng_32k: 5;
}

impl FanConfiguration2 {
    pub fn err_rng(&self) -> ErrorRange {
        ErrorRange::from_bits(self.err_rng_bits())
    }

    pub fn set_err_rng(&mut self, value: ErrorRange) {
        self.set_err_rng_bits(value as u8);
    }
}

register_offset!(FanConfiguration2, offset = 0x03, default = 0x00);
