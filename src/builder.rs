// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Builds the per-channel register image for a fan configuration.

use log::warn;

use crate::config::{ControlMode, FanChannelConfig};
use crate::convert::{self, ClockSource};
use crate::error::Error;
use crate::registers::{
    fan_register_address, DriveFailBandHigh, DriveFailBandLow, ErrorRange, FanConfiguration1,
    FanConfiguration2, FanMinimumDrive, FanSpinUpConfig, GainId, GainP, MaxStepSize, PidGain,
    PwmDivide, RegisterOffset, TachEdges, UpdateTime, ValidTachCount,
};

/// Divider values the device documents for standard operation. Others work
/// but are logged.
const STANDARD_PWM_DIVIDES: [u8; 6] = [1, 2, 4, 8, 16, 32];

/// Compute the `(register, byte)` writes that apply `config` to `channel`,
/// in the order the device should receive them.
///
/// Enumerated fields outside their lookup tables fall back to documented
/// defaults instead of erroring; validated configurations never take those
/// paths, but the image stays well formed either way.
pub fn channel_register_writes(
    channel: u8,
    config: &FanChannelConfig,
    clock: ClockSource,
) -> Result<Vec<(u8, u8)>, Error> {
    let base = fan_register_address(channel, 0)?;
    let mut writes = Vec::with_capacity(10);

    if !STANDARD_PWM_DIVIDES.contains(&config.pwm_divide) {
        warn!(
            "fan {channel}: PWM divide {} is not a standard value (recommended: {STANDARD_PWM_DIVIDES:?})",
            config.pwm_divide
        );
    }
    writes.push((base + PwmDivide::OFFSET, config.pwm_divide));

    let mut cfg1 = FanConfiguration1::from(0);
    cfg1.set_udtx(UpdateTime::from_ms(config.update_time_ms));
    cfg1.set_edgx(TachEdges::from_edge_count(config.edges));
    if config.control_mode == ControlMode::Fsc {
        cfg1.set_enagx(true);
        cfg1.set_rrcx(true);
    }
    writes.push((base + FanConfiguration1::OFFSET, cfg1.into()));

    let mut cfg2 = FanConfiguration2::from(0);
    cfg2.set_err_rng(ErrorRange::from_rpm(config.error_range_rpm));
    cfg2.set_der_opt(config.derivative_mode & 0x07);
    cfg2.set_glitch_en(config.glitch_filter_enabled);
    if clock == ClockSource::External {
        cfg2.set_rng_32k(true);
    }
    writes.push((base + FanConfiguration2::OFFSET, cfg2.into()));

    let mut gain = PidGain::from(0);
    gain.set_gpx(GainP::from_multiplier(config.pid_gain_p));
    gain.set_gix(GainId::from_multiplier(config.pid_gain_i));
    gain.set_gdx(GainId::from_multiplier(config.pid_gain_d));
    writes.push((base + PidGain::OFFSET, gain.into()));

    let spin_up =
        FanSpinUpConfig::from_settings(config.spin_up_level_percent, config.spin_up_time_ms);
    writes.push((base + FanSpinUpConfig::OFFSET, spin_up.into()));

    writes.push((base + MaxStepSize::OFFSET, config.max_step));

    let min_drive = FanMinimumDrive::from_percent(f64::from(config.min_drive_percent));
    writes.push((base + FanMinimumDrive::OFFSET, min_drive.into()));

    let valid_tach = ValidTachCount::from_count(config.valid_tach_count);
    writes.push((base + ValidTachCount::OFFSET, valid_tach.into()));

    let band_count = if config.drive_fail_band_rpm == 0 {
        0
    } else {
        let poles = u32::from(TachEdges::from_edge_count(config.edges).poles());
        convert::rpm_to_tach_count(config.drive_fail_band_rpm, clock, poles)?
    };
    writes.push((
        base + DriveFailBandLow::OFFSET,
        DriveFailBandLow::from_count(band_count).into(),
    ));
    writes.push((
        base + DriveFailBandHigh::OFFSET,
        DriveFailBandHigh::from_count(band_count).into(),
    ));

    Ok(writes)
}
