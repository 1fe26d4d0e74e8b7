// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Conversions between physical units and raw register quantities.
//!
//! Both conversion pairs quantize to integers, so round trips are close but
//! not exact: duty cycles land within one 255th of the input and RPM values
//! within the tachometer's measurement tolerance.

use crate::error::Error;

/// Oscillator driving the tachometer measurement, fixed at controller
/// construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockSource {
    /// Internal oscillator, nominally 32 kHz.
    Internal,
    /// External 32.768 kHz crystal.
    External,
}

impl ClockSource {
    pub fn frequency_hz(self) -> u32 {
        match self {
            ClockSource::Internal => 32_000,
            ClockSource::External => 32_768,
        }
    }

    /// Top of the measurable RPM range for this clock.
    pub fn max_rpm(self) -> u32 {
        match self {
            ClockSource::Internal => 16_000,
            ClockSource::External => 32_000,
        }
    }
}

/// Lowest RPM the tachometer can resolve.
pub const MIN_RPM: u32 = 500;

/// Largest 13 bit tachometer count. Doubles as the "stopped" marker.
pub const TACH_COUNT_MAX: u16 = 0x1FFF;

/// Scale a duty cycle percentage onto the 0-255 drive byte, truncating.
pub fn percent_to_pwm_byte(percent: f64) -> u8 {
    (percent * 255.0 / 100.0) as u8
}

/// Scale a drive byte back to a percentage. Not an exact inverse of
/// [`percent_to_pwm_byte`] because of the truncation there.
pub fn pwm_byte_to_percent(byte: u8) -> f64 {
    f64::from(byte) / 255.0 * 100.0
}

/// Convert a target RPM to the tachometer count the device compares
/// against. An RPM of zero maps to the maximum count, meaning stopped.
pub fn rpm_to_tach_count(rpm: u32, clock: ClockSource, poles: u32) -> Result<u16, Error> {
    if rpm == 0 {
        return Ok(TACH_COUNT_MAX);
    }
    if !(MIN_RPM..=clock.max_rpm()).contains(&rpm) {
        return Err(Error::validation(
            "rpm",
            rpm,
            format!("{MIN_RPM}-{}", clock.max_rpm()),
        ));
    }

    let poles = if poles == 0 { 2 } else { poles };
    let count = u64::from(clock.frequency_hz()) * 60 / (u64::from(rpm) * u64::from(poles));
    Ok(count.min(u64::from(TACH_COUNT_MAX)) as u16)
}

/// Convert a tachometer count to RPM. A count of zero reads as 0 RPM.
pub fn tach_count_to_rpm(count: u16, edges: u8, clock: ClockSource) -> Result<u32, Error> {
    if count == 0 {
        return Ok(0);
    }
    if count > TACH_COUNT_MAX {
        return Err(Error::validation(
            "tach_count",
            count,
            format!("0-{TACH_COUNT_MAX}"),
        ));
    }
    if !matches!(edges, 3 | 5 | 7 | 9) {
        return Err(Error::validation("edges", edges, "one of 3, 5, 7, 9"));
    }

    let poles = match u64::from(edges - 1) / 2 {
        0 => 2,
        poles => poles,
    };
    Ok((u64::from(clock.frequency_hz()) * 60 / (u64::from(count) * poles)) as u32)
}
