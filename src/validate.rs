// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Input validation. Every public driver entry point runs these checks
//! before touching the bus, so malformed input never reaches the wire.

use crate::config::FanChannelConfig;
use crate::convert::{ClockSource, MIN_RPM, TACH_COUNT_MAX};
use crate::error::Error;
use crate::NUM_FAN_CHANNELS;

/// Accepts channels 1 through 5.
pub fn channel(channel: u8) -> Result<(), Error> {
    if (1..=NUM_FAN_CHANNELS).contains(&channel) {
        return Ok(());
    }
    Err(Error::validation("channel", channel, "1-5"))
}

/// Accepts duty cycle percentages 0 through 100, fractional included.
pub fn percent(percent: f64) -> Result<(), Error> {
    if (0.0..=100.0).contains(&percent) {
        return Ok(());
    }
    Err(Error::validation("percent", percent, "0-100"))
}

/// Accepts RPM values inside the given bounds.
pub fn rpm(rpm: u32, min_rpm: u32, max_rpm: u32) -> Result<(), Error> {
    if (min_rpm..=max_rpm).contains(&rpm) {
        return Ok(());
    }
    Err(Error::validation(
        "rpm",
        rpm,
        format!("{min_rpm}-{max_rpm}"),
    ))
}

fn pid_gain(field: &'static str, gain: u8, allowed: &[u8]) -> Result<(), Error> {
    if allowed.contains(&gain) {
        return Ok(());
    }
    Err(Error::validation(field, gain, format!("one of {allowed:?}")))
}

/// Checks a full channel configuration. The RPM bound ordering goes first,
/// then each field on its own; the first violation reports the field, the
/// offending value and the allowed domain.
pub fn fan_config(config: &FanChannelConfig, clock: ClockSource) -> Result<(), Error> {
    if config.min_rpm >= config.max_rpm {
        return Err(Error::validation(
            "min_rpm",
            config.min_rpm,
            format!("less than max_rpm ({})", config.max_rpm),
        ));
    }
    rpm(config.min_rpm, MIN_RPM, clock.max_rpm())?;
    rpm(config.max_rpm, MIN_RPM, clock.max_rpm())?;

    if config.min_drive_percent > 100 {
        return Err(Error::validation(
            "min_drive_percent",
            config.min_drive_percent,
            "0-100",
        ));
    }

    if config.max_step > 63 {
        return Err(Error::validation("max_step", config.max_step, "0-63"));
    }

    if !matches!(
        config.update_time_ms,
        100 | 200 | 300 | 400 | 500 | 800 | 1200 | 1600
    ) {
        return Err(Error::validation(
            "update_time_ms",
            config.update_time_ms,
            "one of 100, 200, 300, 400, 500, 800, 1200, 1600",
        ));
    }

    if !matches!(config.edges, 3 | 5 | 7 | 9) {
        return Err(Error::validation(
            "edges",
            config.edges,
            "one of 3, 5, 7, 9",
        ));
    }

    if config.spin_up_time_ms > 1550 {
        return Err(Error::validation(
            "spin_up_time_ms",
            config.spin_up_time_ms,
            "0-1550",
        ));
    }

    if !matches!(
        config.spin_up_level_percent,
        30 | 35 | 40 | 45 | 50 | 55 | 60 | 65
    ) {
        return Err(Error::validation(
            "spin_up_level_percent",
            config.spin_up_level_percent,
            "one of 30, 35, 40, 45, 50, 55, 60, 65",
        ));
    }

    pid_gain("pid_gain_p", config.pid_gain_p, &[1, 2, 4, 8])?;
    pid_gain("pid_gain_i", config.pid_gain_i, &[0, 1, 2, 4, 8, 16, 32])?;
    pid_gain("pid_gain_d", config.pid_gain_d, &[0, 1, 2, 4, 8, 16, 32])?;

    if config.pwm_divide == 0 {
        return Err(Error::validation("pwm_divide", config.pwm_divide, "1-255"));
    }

    if !matches!(config.error_range_rpm, 0 | 50 | 100 | 200) {
        return Err(Error::validation(
            "error_range_rpm",
            config.error_range_rpm,
            "one of 0, 50, 100, 200",
        ));
    }

    if config.derivative_mode > 7 {
        return Err(Error::validation(
            "derivative_mode",
            config.derivative_mode,
            "0-7",
        ));
    }

    // Checked here so the register builder can never fail a range check
    // halfway through a write sequence.
    if config.drive_fail_band_rpm != 0 {
        rpm(config.drive_fail_band_rpm, MIN_RPM, clock.max_rpm())
            .map_err(|_| Error::validation(
                "drive_fail_band_rpm",
                config.drive_fail_band_rpm,
                format!("0 (disabled) or {MIN_RPM}-{}", clock.max_rpm()),
            ))?;
    }

    if config.valid_tach_count > TACH_COUNT_MAX {
        return Err(Error::validation(
            "valid_tach_count",
            config.valid_tach_count,
            format!("0-{TACH_COUNT_MAX}"),
        ));
    }

    Ok(())
}
