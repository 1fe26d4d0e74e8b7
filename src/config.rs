// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Driver-facing configuration model, plus YAML-backed settings loading.
//! The driver itself only ever consumes the parsed structs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::convert::ClockSource;

/// How a channel's drive output is decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Direct duty cycle control.
    Pwm,
    /// Closed-loop RPM control through the device's PID algorithm.
    Fsc,
}

/// Everything configurable about one fan channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanChannelConfig {
    pub enabled: bool,
    pub control_mode: ControlMode,
    pub min_rpm: u32,
    pub max_rpm: u32,
    pub min_drive_percent: u8,
    /// Largest drive change per update period, 0-63.
    pub max_step: u8,
    /// Control-loop update interval; one of the device's eight steps.
    pub update_time_ms: u16,
    /// Tachometer edges per revolution: 3, 5, 7 or 9 for 1 to 4 pole fans.
    pub edges: u8,
    pub spin_up_level_percent: u8,
    /// Spin-up duration, 0-1550 ms in 50 ms steps.
    pub spin_up_time_ms: u16,
    /// Proportional gain multiplier: 1, 2, 4 or 8.
    pub pid_gain_p: u8,
    /// Integral gain multiplier: 0, 1, 2, 4, 8, 16 or 32.
    pub pid_gain_i: u8,
    /// Derivative gain multiplier: 0, 1, 2, 4, 8, 16 or 32.
    pub pid_gain_d: u8,
    /// Divider applied to the PWM base frequency, 1-255.
    pub pwm_divide: u8,
    /// RPM error window: 0, 50, 100 or 200.
    pub error_range_rpm: u16,
    /// Derivative option, 0-7.
    pub derivative_mode: u8,
    pub glitch_filter_enabled: bool,
    /// RPM margin for aging-fan detection; 0 disables it.
    pub drive_fail_band_rpm: u32,
    /// Stall threshold count, 0-0x1FFF.
    pub valid_tach_count: u16,
}

impl Default for FanChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            control_mode: ControlMode::Pwm,
            min_rpm: 500,
            max_rpm: 16_000,
            min_drive_percent: 0,
            max_step: 31,
            update_time_ms: 200,
            edges: 5,
            spin_up_level_percent: 50,
            spin_up_time_ms: 500,
            pid_gain_p: 2,
            pid_gain_i: 1,
            pid_gain_d: 1,
            pwm_divide: 1,
            error_range_rpm: 0,
            derivative_mode: 0,
            glitch_filter_enabled: true,
            drive_fail_band_rpm: 0,
            valid_tach_count: 0x0FFF,
        }
    }
}

/// Device-level options fixed at controller construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    /// Clock from an external 32.768 kHz crystal instead of the internal
    /// oscillator. Widens the RPM range to 32k.
    pub use_external_clock: bool,
    /// Arm the 4 second watchdog timer.
    pub enable_watchdog: bool,
    /// Requested PWM base frequency; snapped to the closest supported rate.
    pub pwm_frequency_hz: u32,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            use_external_clock: false,
            enable_watchdog: false,
            pwm_frequency_hz: 26_000,
        }
    }
}

impl DeviceOptions {
    pub fn clock_source(&self) -> ClockSource {
        if self.use_external_clock {
            ClockSource::External
        } else {
            ClockSource::Internal
        }
    }
}

/// I2C bus access settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    pub bus: u8,
    pub lock_enabled: bool,
    pub lock_timeout_secs: f64,
    pub lock_path: PathBuf,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            bus: 0,
            lock_enabled: true,
            lock_timeout_secs: 5.0,
            lock_path: PathBuf::from("/var/lock"),
        }
    }
}

impl BusSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.lock_timeout_secs)
    }
}

/// Fully parsed settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub i2c: BusSettings,
    /// 7-bit device address.
    pub address: u8,
    pub device: DeviceOptions,
    /// Per-channel overrides, keyed by channel number.
    pub fans: BTreeMap<u8, FanChannelConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            i2c: BusSettings::default(),
            address: crate::DEFAULT_DEVICE_ADDRESS,
            device: DeviceOptions::default(),
            fans: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Failures while loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_yaml::Error),
}
