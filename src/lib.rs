// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Linux userspace driver for the Microchip EMC2305 five channel PWM fan
//! controller.
//!
//! The controller talks to the device through any [`I2cBus`] transport and
//! offers direct PWM control, closed-loop RPM control through the device's
//! PID algorithm, tachometer readout, fault monitoring and the one-way
//! configuration lock.
//!
//! ```no_run
//! use emc2305::{Emc2305, LinuxI2cBus, DEFAULT_DEVICE_ADDRESS};
//!
//! # fn main() -> Result<(), emc2305::Error> {
//! let bus = LinuxI2cBus::open(0).map_err(emc2305::Error::from)?;
//! let mut fans = Emc2305::new(bus, DEFAULT_DEVICE_ADDRESS)?;
//! fans.set_pwm_duty_cycle(1, 50.0)?;
//! let rpm = fans.current_rpm(1)?;
//! println!("fan 1: {rpm} RPM");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

pub use config::{BusSettings, ControlMode, DeviceOptions, FanChannelConfig, Settings};
pub use convert::ClockSource;
pub use error::Error;
#[cfg(target_os = "linux")]
pub use transport::linux::LinuxI2cBus;
pub use transport::{I2cBus, TransportError};

use registers::{
    fan_register_address, Configuration, DriveFailBandHigh, DriveFailBandLow, FanConfiguration1,
    FanConfiguration2, FanDriveFailStatus, FanDriveSetting, FanInterruptEnable, FanMinimumDrive,
    FanSpinStatus, FanSpinUpConfig, FanStallStatus, FanStatus as FanStatusRegister,
    FeatureRegister, ManufacturerId, MaxStepSize, PidGain, ProductId, PwmBase123, PwmBase45,
    PwmDivide, PwmFrequency, PwmOutputConfig, PwmPolarityConfig, RegisterAddress, RegisterOffset,
    SiliconRevision, SoftwareLock, TachReadingHigh, TachReadingLow, TachTargetHigh, TachTargetLow,
    ValidTachCount,
};

pub mod builder;
pub mod config;
pub mod convert;
mod error;
pub mod registers;
pub mod transport;
pub mod validate;

/// Default I2C address selected by the ADDR_SEL strap.
pub const DEFAULT_DEVICE_ADDRESS: u8 = 0x61;

/// Number of fan channels on the EMC2305.
pub const NUM_FAN_CHANNELS: u8 = 5;

/// Duty cycle applied to every channel during shutdown. Nonzero so fans
/// wind down instead of stopping dead.
pub const SAFE_SHUTDOWN_PERCENT: f64 = 30.0;

/// Settle time after the initialization sequence.
const INIT_SETTLE: Duration = Duration::from_millis(10);

/// Fetch a read-only register from the device
macro_rules! register_ro {
    ($get:ident, $reg_type:ty) => {
        pub fn $get(&mut self) -> Result<$reg_type, Error> {
            self.read_register::<$reg_type>(<$reg_type>::ADDRESS)
        }
    };
}

/// Fetch and set a register from the device which applies to all fans
macro_rules! register {
    ($get:ident, $set:ident, $reg_type:ty) => {
        pub fn $get(&mut self) -> Result<$reg_type, Error> {
            self.read_register::<$reg_type>(<$reg_type>::ADDRESS)
        }

        pub fn $set(&mut self, value: $reg_type) -> Result<(), Error> {
            self.write_register(<$reg_type>::ADDRESS, value.into())
        }
    };
}

/// Fetch and set a register from the device which applies to a specific fan
macro_rules! fan_register {
    ($get:ident, $set:ident, $reg_type:ty) => {
        pub fn $get(&mut self, channel: u8) -> Result<$reg_type, Error> {
            validate::channel(channel)?;
            let reg = fan_register_address(channel, <$reg_type>::OFFSET)?;
            self.read_register(reg)
        }

        pub fn $set(&mut self, channel: u8, value: $reg_type) -> Result<(), Error> {
            validate::channel(channel)?;
            let reg = fan_register_address(channel, <$reg_type>::OFFSET)?;
            self.write_register(reg, value.into())
        }
    };
}

/// Operational health of one fan channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanStatus {
    Ok,
    Stalled,
    SpinFailure,
    DriveFailure,
    /// The status registers could not be read; fault telemetry is best
    /// effort and the failure is logged instead of propagated.
    Unknown,
}

/// Point-in-time snapshot of one channel, assembled from live register
/// reads. Never cached.
#[derive(Clone, Debug)]
pub struct FanState {
    pub channel: u8,
    pub enabled: bool,
    pub control_mode: ControlMode,
    pub pwm_percent: f64,
    /// Target RPM in closed-loop mode; 0 for channels in direct PWM mode.
    pub target_rpm: u32,
    pub current_rpm: u32,
    pub status: FanStatus,
}

/// Device identity and capabilities, read once during detection.
#[derive(Clone, Copy, Debug)]
pub struct ProductFeatures {
    pub fan_channels: u8,
    pub rpm_control_supported: bool,
    pub product_id: u8,
    pub manufacturer_id: u8,
    pub revision: u8,
}

/// Driver for the EMC2305 fan controller.
///
/// Construction probes the identity registers and runs the full
/// initialization sequence; an instance that exists is ready to use.
pub struct Emc2305<B> {
    /// Byte transport to the bus. Borrow with `&mut bus` to share one bus
    /// across several devices.
    bus: B,

    /// 7-bit device address.
    address: u8,

    /// Tachometer clock, fixed for the controller's lifetime.
    clock: ClockSource,

    watchdog_enabled: bool,

    /// Requested PWM base frequency before snapping.
    pwm_frequency_hz: u32,

    /// Identity snapshot from detection.
    features: ProductFeatures,

    /// Last configuration applied per channel.
    fan_configs: BTreeMap<u8, FanChannelConfig>,

    /// Lock state from the most recent successful register read. Only used
    /// when the live read fails; enforcement always reads the hardware.
    lock_cached: bool,
}

impl<B> Debug for Emc2305<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emc2305")
            .field("address", &self.address)
            .field("clock", &self.clock)
            .field("features", &self.features)
            .finish()
    }
}

impl<B: I2cBus> Emc2305<B> {
    /// Detect and initialize a device with default options.
    pub fn new(bus: B, address: u8) -> Result<Self, Error> {
        Self::with_options(bus, address, DeviceOptions::default())
    }

    /// Detect and initialize a device.
    pub fn with_options(mut bus: B, address: u8, options: DeviceOptions) -> Result<Self, Error> {
        let features = Self::detect(&mut bus, address)?;

        let mut dev = Self {
            bus,
            address,
            clock: options.clock_source(),
            watchdog_enabled: options.enable_watchdog,
            pwm_frequency_hz: options.pwm_frequency_hz,
            features,
            fan_configs: BTreeMap::new(),
            lock_cached: false,
        };
        dev.initialize()?;

        info!(
            "EMC2305 initialized at address 0x{:02X} (product 0x{:02X}, revision 0x{:02X})",
            address, features.product_id, features.revision
        );
        Ok(dev)
    }

    /// Run `f` against a freshly initialized controller, then wind the fans
    /// down to the safe shutdown duty on the way out, error paths included.
    pub fn scoped<R>(
        bus: B,
        address: u8,
        options: DeviceOptions,
        f: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut dev = Self::with_options(bus, address, options)?;
        let result = f(&mut dev);
        dev.close();
        result
    }

    /// Probe the identity registers. Product ID first, then manufacturer
    /// ID; the revision is informational and read last.
    fn detect(bus: &mut B, address: u8) -> Result<ProductFeatures, Error> {
        let not_found = |reason: String| Error::DeviceNotFound {
            address,
            reason,
        };

        let product_id = bus
            .read_byte(address, <ProductId as RegisterAddress>::ADDRESS)
            .map_err(|err| not_found(err.to_string()))?;
        if !matches!(ProductId::try_from(product_id), Ok(ProductId::Emc2305)) {
            return Err(not_found(format!(
                "invalid product id: expected 0x{:02X}, got 0x{product_id:02X}",
                u8::from(ProductId::Emc2305)
            )));
        }

        let manufacturer_id = bus
            .read_byte(address, ManufacturerId::ADDRESS)
            .map_err(|err| not_found(err.to_string()))?;
        if manufacturer_id != ManufacturerId::SMSC {
            return Err(not_found(format!(
                "invalid manufacturer id: expected 0x{:02X}, got 0x{manufacturer_id:02X}",
                ManufacturerId::SMSC
            )));
        }

        let revision = bus
            .read_byte(address, SiliconRevision::ADDRESS)
            .map_err(|err| not_found(err.to_string()))?;

        let features = bus
            .read_byte(address, FeatureRegister::ADDRESS)
            .map(FeatureRegister::from)
            .map_err(|err| not_found(err.to_string()))?;

        debug!(
            "EMC2305 detected: product=0x{product_id:02X} manufacturer=0x{manufacturer_id:02X} \
             revision=0x{revision:02X}"
        );

        Ok(ProductFeatures {
            fan_channels: features.fan_count(),
            rpm_control_supported: features.rpm_control(),
            product_id,
            manufacturer_id,
            revision,
        })
    }

    /// Bring the device to a known state: global configuration, PWM base
    /// frequency, output defaults, per-channel defaults, interrupts, and a
    /// status read to drop any latched faults. A transport failure anywhere
    /// in here is fatal; there is no partial-init retry.
    fn initialize(&mut self) -> Result<(), Error> {
        let mut config = Configuration::from(0);
        // The device ignores every per-channel setting until GLBL_EN is on.
        config.set_dis_to(true);
        config.set_glbl_en(true);
        if self.watchdog_enabled {
            config.set_wd_en(true);
            info!("watchdog timer enabled (4 second timeout)");
        }
        if self.clock == ClockSource::External {
            config.set_use_ext_clk(true);
            info!("using external 32.768 kHz clock");
        }
        self.set_config(config)?;

        let frequency = PwmFrequency::from_hz(self.pwm_frequency_hz);
        self.set_pwm_base_f123(PwmBase123::from_frequency(frequency))?;
        self.set_pwm_base_f45(PwmBase45::from_frequency(frequency))?;
        debug!(
            "PWM base frequency set to {} Hz (requested {} Hz)",
            frequency.hz(),
            self.pwm_frequency_hz
        );

        self.set_pwm_polarity_config(PwmPolarityConfig::default())?;
        self.set_pwm_output_config(PwmOutputConfig::default())?;

        for channel in 1..=NUM_FAN_CHANNELS {
            let config = FanChannelConfig::default();
            self.apply_channel_registers(channel, &config)?;
            self.fan_configs.insert(channel, config);
        }

        self.set_interrupt_enable(FanInterruptEnable::all_enabled())?;
        self.clear_alert_status()?;

        thread::sleep(INIT_SETTLE);
        Ok(())
    }

    fn apply_channel_registers(
        &mut self,
        channel: u8,
        config: &FanChannelConfig,
    ) -> Result<(), Error> {
        for (register, value) in builder::channel_register_writes(channel, config, self.clock)? {
            self.write_register(register, value)?;
        }
        debug!(
            "fan {channel} configured: mode={:?}, min_drive={}%, spin_up={}%/{} ms",
            config.control_mode,
            config.min_drive_percent,
            config.spin_up_level_percent,
            config.spin_up_time_ms
        );
        Ok(())
    }

    /// Set the PWM duty cycle of a channel in direct mode.
    pub fn set_pwm_duty_cycle(&mut self, channel: u8, percent: f64) -> Result<(), Error> {
        validate::channel(channel)?;
        validate::percent(percent)?;

        let drive = FanDriveSetting::from_percent(percent);
        self.set_fan_setting(channel, drive)?;
        debug!(
            "fan {channel} PWM set to {percent:.1}% (0x{:02X})",
            u8::from(drive)
        );
        Ok(())
    }

    /// Read back the duty cycle a channel is driving.
    pub fn pwm_duty_cycle(&mut self, channel: u8) -> Result<f64, Error> {
        validate::channel(channel)?;
        Ok(self.fan_setting(channel)?.percent())
    }

    /// Set the duty cycle, read it back, and accept the write when the
    /// readback lands within `tolerance` percentage points. Returns the
    /// verdict together with the value the device reports.
    pub fn set_pwm_duty_cycle_verified(
        &mut self,
        channel: u8,
        percent: f64,
        tolerance: f64,
    ) -> Result<(bool, f64), Error> {
        self.set_pwm_duty_cycle(channel, percent)?;
        let actual = self.pwm_duty_cycle(channel)?;
        let accepted = (actual - percent).abs() <= tolerance;
        if !accepted {
            warn!(
                "fan {channel} PWM readback {actual:.1}% outside {tolerance:.1} points of \
                 {percent:.1}%"
            );
        }
        Ok((accepted, actual))
    }

    /// Set the RPM the closed-loop algorithm should hold. The high target
    /// byte goes first so the 13 bit value lands atomically.
    pub fn set_target_rpm(&mut self, channel: u8, rpm: u32) -> Result<(), Error> {
        validate::channel(channel)?;
        validate::rpm(rpm, convert::MIN_RPM, self.clock.max_rpm())?;

        let count = convert::rpm_to_tach_count(rpm, self.clock, self.channel_poles(channel))?;
        self.set_tach_target_high_byte(channel, TachTargetHigh::from_count(count))?;
        self.set_tach_target_low_byte(channel, TachTargetLow::from_count(count))?;
        debug!("fan {channel} target RPM set to {rpm} (tach count 0x{count:04X})");
        Ok(())
    }

    /// Read the configured RPM target.
    pub fn target_rpm(&mut self, channel: u8) -> Result<u32, Error> {
        validate::channel(channel)?;
        let high = self.tach_target_high_byte(channel)?;
        let low = self.tach_target_low_byte(channel)?;
        let count = registers::tach_count_from_pair(high.into(), low.into());
        convert::tach_count_to_rpm(count, self.channel_edges(channel), self.clock)
    }

    /// Read the measured RPM from the tachometer.
    pub fn current_rpm(&mut self, channel: u8) -> Result<u32, Error> {
        validate::channel(channel)?;
        let high = self.tach_reading_high_byte(channel)?;
        let low = self.tach_reading_low_byte(channel)?;
        let count = registers::tach_count_from_pair(high.into(), low.into());
        convert::tach_count_to_rpm(count, self.channel_edges(channel), self.clock)
    }

    /// Apply a full configuration to one channel.
    ///
    /// Validation runs before any register write; a rejected configuration
    /// leaves the device untouched. A transport failure mid-sequence leaves
    /// the channel partially configured, there is no rollback.
    pub fn configure_fan(&mut self, channel: u8, config: FanChannelConfig) -> Result<(), Error> {
        validate::channel(channel)?;
        validate::fan_config(&config, self.clock)?;
        self.ensure_unlocked()?;

        self.fan_configs.insert(channel, config.clone());
        self.apply_channel_registers(channel, &config)?;
        info!("fan {channel} configured with custom settings");
        Ok(())
    }

    /// Switch a channel between direct PWM and closed-loop control.
    pub fn set_control_mode(&mut self, channel: u8, mode: ControlMode) -> Result<(), Error> {
        validate::channel(channel)?;
        self.ensure_unlocked()?;

        let mut config = self.fan_configs.get(&channel).cloned().unwrap_or_default();
        config.control_mode = mode;
        self.fan_configs.insert(channel, config.clone());
        self.apply_channel_registers(channel, &config)?;
        info!("fan {channel} control mode set to {mode:?}");
        Ok(())
    }

    /// Health of one channel, from a single block read of the four status
    /// registers. Reading clears their latched bits. A transport failure
    /// degrades to [`FanStatus::Unknown`] rather than an error.
    pub fn fan_status(&mut self, channel: u8) -> Result<FanStatus, Error> {
        validate::channel(channel)?;

        let (_, stall, spin, drive_fail) = match self.read_status_block() {
            Ok(block) => block,
            Err(err) => {
                error!("failed to read status for fan {channel}: {err}");
                return Ok(FanStatus::Unknown);
            }
        };

        Ok(if stall.flagged(channel) {
            FanStatus::Stalled
        } else if spin.flagged(channel) {
            FanStatus::SpinFailure
        } else if drive_fail.flagged(channel) {
            FanStatus::DriveFailure
        } else {
            FanStatus::Ok
        })
    }

    /// Snapshot every channel.
    pub fn fan_states(&mut self) -> Result<BTreeMap<u8, FanState>, Error> {
        let mut states = BTreeMap::new();
        for channel in 1..=NUM_FAN_CHANNELS {
            let config = self.fan_configs.get(&channel).cloned().unwrap_or_default();
            let target_rpm = if config.control_mode == ControlMode::Fsc {
                self.target_rpm(channel)?
            } else {
                0
            };
            states.insert(
                channel,
                FanState {
                    channel,
                    enabled: config.enabled,
                    control_mode: config.control_mode,
                    pwm_percent: self.pwm_duty_cycle(channel)?,
                    target_rpm,
                    current_rpm: self.current_rpm(channel)?,
                    status: self.fan_status(channel)?,
                },
            );
        }
        Ok(states)
    }

    /// Identity and capability snapshot taken at detection.
    pub fn product_features(&self) -> ProductFeatures {
        self.features
    }

    /// Whether the watchdog timer has expired. Best effort; a failed read
    /// logs and reports false.
    pub fn check_watchdog(&mut self) -> bool {
        match self.status() {
            Ok(status) => status.watchdog_expired(),
            Err(err) => {
                error!("failed to check watchdog status: {err}");
                false
            }
        }
    }

    /// Pet the watchdog with a dummy configuration read. Call within the 4
    /// second window while the watchdog is enabled.
    pub fn reset_watchdog(&mut self) {
        if !self.watchdog_enabled {
            return;
        }
        match self.config() {
            Ok(_) => debug!("watchdog timer reset"),
            Err(err) => error!("failed to reset watchdog: {err}"),
        }
    }

    /// Lock the configuration registers until the next power-on reset.
    /// There is no software unlock.
    pub fn lock_configuration(&mut self) -> Result<(), Error> {
        self.write_register(SoftwareLock::ADDRESS, SoftwareLock::lock().into())?;
        self.lock_cached = true;
        warn!("configuration registers locked; changes disabled until hardware reset");
        Ok(())
    }

    /// Whether the hardware lock bit is set. Reads the live register and
    /// refreshes the cache; only a failed read falls back to the cache.
    pub fn is_configuration_locked(&mut self) -> bool {
        match self.software_lock() {
            Ok(lock) => {
                self.lock_cached = lock.locked();
                self.lock_cached
            }
            Err(err) => {
                error!("failed to read lock status: {err}");
                self.lock_cached
            }
        }
    }

    fn ensure_unlocked(&mut self) -> Result<(), Error> {
        if self.is_configuration_locked() {
            return Err(Error::ConfigurationLocked);
        }
        Ok(())
    }

    /// Enable or disable ALERT# assertion for one channel, as a
    /// read-modify-write of the interrupt enable register.
    pub fn configure_fan_alerts(&mut self, channel: u8, enabled: bool) -> Result<(), Error> {
        validate::channel(channel)?;

        let mut enable = self.interrupt_enable()?;
        enable.set_enabled(channel, enabled);
        self.set_interrupt_enable(enable)?;
        debug!(
            "fan {channel} alerts {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Latched fault state per channel, from one block read. Reading
    /// clears the latches; snapshot first if you need history.
    pub fn alert_status(&mut self) -> Result<BTreeMap<u8, bool>, Error> {
        let (_, stall, spin, drive_fail) = self.read_status_block()?;
        let mut alerts = BTreeMap::new();
        for channel in 1..=NUM_FAN_CHANNELS {
            alerts.insert(
                channel,
                stall.flagged(channel) || spin.flagged(channel) || drive_fail.flagged(channel),
            );
        }
        Ok(alerts)
    }

    /// Whether any channel currently reports a fault. Checks the raw fan
    /// status bits without masking by the interrupt enable register.
    pub fn is_alert_active(&mut self) -> Result<bool, Error> {
        let status = self.status()?;
        Ok(status.any_fan_flagged())
    }

    /// Clear all latched fault flags by reading the status registers.
    pub fn clear_alert_status(&mut self) -> Result<(), Error> {
        self.read_status_block()?;
        debug!("alert status cleared for all fans");
        Ok(())
    }

    /// Wind every channel down to the safe shutdown duty. Per-channel
    /// failures are logged and the remaining channels still get shut down.
    pub fn close(&mut self) {
        info!("closing EMC2305 fan controller");
        for channel in 1..=NUM_FAN_CHANNELS {
            if let Err(err) = self.set_pwm_duty_cycle(channel, SAFE_SHUTDOWN_PERCENT) {
                error!("failed to set fan {channel} to safe state: {err}");
            }
        }
    }

    /// Release the transport from the controller.
    pub fn release(self) -> B {
        self.bus
    }

    /// Log every register the driver knows about at debug level. Reading
    /// the status registers clears their latched flags.
    pub fn dump_registers(&mut self) -> Result<(), Error> {
        macro_rules! dump_register {
            ($dev:expr, $reg:tt) => {
                let value = $dev.$reg()?;
                debug!("{}: {:#04x}", stringify!($reg), u8::from(value));
            };
        }

        macro_rules! dump_fan_register {
            ($dev:expr, $reg:tt, $fan:expr) => {
                let value = $dev.$reg($fan)?;
                debug!("{}: {:#04x}", stringify!($reg), u8::from(value));
            };
        }

        debug!("address: {:#04x}", self.address);
        debug!("features: {:?}", self.features);

        dump_register!(self, software_lock);
        dump_register!(self, config);
        dump_register!(self, status);
        dump_register!(self, stall_status);
        dump_register!(self, spin_status);
        dump_register!(self, drive_fail_status);
        dump_register!(self, interrupt_enable);
        dump_register!(self, pwm_polarity_config);
        dump_register!(self, pwm_output_config);
        dump_register!(self, pwm_base_f123);
        dump_register!(self, pwm_base_f45);

        for fan in 1..=NUM_FAN_CHANNELS {
            debug!("fan {fan} ----------------------");
            dump_fan_register!(self, fan_setting, fan);
            dump_fan_register!(self, pwm_divide, fan);
            dump_fan_register!(self, fan_configuration1, fan);
            dump_fan_register!(self, fan_configuration2, fan);
            dump_fan_register!(self, gain, fan);
            dump_fan_register!(self, spin_up_configuration, fan);
            dump_fan_register!(self, max_step, fan);
            dump_fan_register!(self, minimum_drive, fan);
            dump_fan_register!(self, valid_tach_count, fan);
            dump_fan_register!(self, drive_fail_band_low_byte, fan);
            dump_fan_register!(self, drive_fail_band_high_byte, fan);
            dump_fan_register!(self, tach_target_low_byte, fan);
            dump_fan_register!(self, tach_target_high_byte, fan);
            dump_fan_register!(self, tach_reading_high_byte, fan);
            dump_fan_register!(self, tach_reading_low_byte, fan);
        }

        Ok(())
    }

    /// Poles used for target conversions, from the channel's configured
    /// edge count.
    fn channel_poles(&self, channel: u8) -> u32 {
        let edges = self.channel_edges(channel);
        u32::from(registers::TachEdges::from_edge_count(edges).poles())
    }

    fn channel_edges(&self, channel: u8) -> u8 {
        self.fan_configs
            .get(&channel)
            .map(|config| config.edges)
            .unwrap_or(5)
    }

    /// One block read covering status, stall, spin and drive-fail.
    fn read_status_block(
        &mut self,
    ) -> Result<
        (
            FanStatusRegister,
            FanStallStatus,
            FanSpinStatus,
            FanDriveFailStatus,
        ),
        Error,
    > {
        let block = self
            .bus
            .read_block(self.address, FanStatusRegister::ADDRESS, 4)?;
        if block.len() < 4 {
            return Err(Error::Communication(format!(
                "short status block read: {} bytes",
                block.len()
            )));
        }
        Ok((
            block[0].into(),
            block[1].into(),
            block[2].into(),
            block[3].into(),
        ))
    }

    /// Write a value to a register on the device
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.bus.write_byte(self.address, register, value)?;
        Ok(())
    }

    /// Read a value from a register on the device
    fn read_register<T: From<u8>>(&mut self, register: u8) -> Result<T, Error> {
        Ok(T::from(self.bus.read_byte(self.address, register)?))
    }

    // General register access
    register!(config, set_config, Configuration);
    register_ro!(status, FanStatusRegister);
    register_ro!(stall_status, FanStallStatus);
    register_ro!(spin_status, FanSpinStatus);
    register_ro!(drive_fail_status, FanDriveFailStatus);
    register!(interrupt_enable, set_interrupt_enable, FanInterruptEnable);
    register!(pwm_polarity_config, set_pwm_polarity_config, PwmPolarityConfig);
    register!(pwm_output_config, set_pwm_output_config, PwmOutputConfig);
    register!(pwm_base_f123, set_pwm_base_f123, PwmBase123);
    register!(pwm_base_f45, set_pwm_base_f45, PwmBase45);
    register_ro!(software_lock, SoftwareLock);

    // Fan specific register access
    fan_register!(fan_setting, set_fan_setting, FanDriveSetting);
    fan_register!(pwm_divide, set_pwm_divide, PwmDivide);
    fan_register!(fan_configuration1, set_fan_configuration1, FanConfiguration1);
    fan_register!(fan_configuration2, set_fan_configuration2, FanConfiguration2);
    fan_register!(gain, set_gain, PidGain);
    fan_register!(spin_up_configuration, set_spin_up_configuration, FanSpinUpConfig);
    fan_register!(max_step, set_max_step, MaxStepSize);
    fan_register!(minimum_drive, set_minimum_drive, FanMinimumDrive);
    fan_register!(valid_tach_count, set_valid_tach_count, ValidTachCount);
    fan_register!(drive_fail_band_low_byte, set_drive_fail_band_low_byte, DriveFailBandLow);
    fan_register!(drive_fail_band_high_byte, set_drive_fail_band_high_byte, DriveFailBandHigh);
    fan_register!(tach_target_low_byte, set_tach_target_low_byte, TachTargetLow);
    fan_register!(tach_target_high_byte, set_tach_target_high_byte, TachTargetHigh);
    fan_register!(tach_reading_high_byte, set_tach_reading_high_byte, TachReadingHigh);
    fan_register!(tach_reading_low_byte, set_tach_reading_low_byte, TachReadingLow);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{FaultKind, MockBus};

    const ADDR: u8 = 0x4D;

    fn new_controller() -> Emc2305<MockBus> {
        Emc2305::new(MockBus::new(ADDR), ADDR).expect("mock device should initialize")
    }

    /// Controller over a bus that never saw detection, for fault-injection
    /// paths the normal constructor cannot reach.
    fn hand_built(bus: MockBus) -> Emc2305<MockBus> {
        Emc2305 {
            bus,
            address: ADDR,
            clock: ClockSource::Internal,
            watchdog_enabled: false,
            pwm_frequency_hz: 26_000,
            features: ProductFeatures {
                fan_channels: 5,
                rpm_control_supported: true,
                product_id: 0x34,
                manufacturer_id: 0x5D,
                revision: 0x80,
            },
            fan_configs: BTreeMap::new(),
            lock_cached: false,
        }
    }

    #[test]
    fn detection_reads_the_identity_registers() {
        let dev = new_controller();
        let features = dev.product_features();
        assert_eq!(features.product_id, 0x34);
        assert_eq!(features.manufacturer_id, 0x5D);
        assert_eq!(features.revision, 0x80);
        assert_eq!(features.fan_channels, 5);
        assert!(features.rpm_control_supported);
    }

    #[test]
    fn detection_rejects_a_wrong_product_id() {
        let mut bus = MockBus::new(ADDR);
        bus.set(0xFD, 0xFF);
        let err = Emc2305::new(bus, ADDR).err().expect("detection should fail");
        assert!(matches!(err, Error::DeviceNotFound { .. }));
    }

    #[test]
    fn detection_rejects_a_wrong_manufacturer_id() {
        let mut bus = MockBus::new(ADDR);
        bus.set(0xFE, 0x00);
        let err = Emc2305::new(bus, ADDR).err().expect("detection should fail");
        assert!(matches!(err, Error::DeviceNotFound { .. }));
    }

    #[test]
    fn detection_accepts_any_revision() {
        let mut bus = MockBus::new(ADDR);
        bus.set(0xFF, 0x01);
        let dev = Emc2305::new(bus, ADDR).expect("revision must not gate detection");
        assert_eq!(dev.product_features().revision, 0x01);
    }

    #[test]
    fn detection_rejects_a_missing_device() {
        let err = Emc2305::new(MockBus::new(ADDR), 0x2F)
            .err()
            .expect("nothing listens at 0x2F");
        assert!(matches!(err, Error::DeviceNotFound { .. }));
    }

    #[test]
    fn init_always_enables_global_pwm_and_disables_the_smbus_timeout() {
        let dev = new_controller();
        let bus = dev.release();
        let config = bus.get(0x20);
        assert_ne!(config & 0x02, 0, "GLBL_EN must be set");
        assert_ne!(config & 0x40, 0, "DIS_TO must be set");
        assert_eq!(config & 0x20, 0, "watchdog stays off by default");
        assert_eq!(config & 0x08, 0, "internal clock by default");
    }

    #[test]
    fn init_applies_watchdog_and_clock_options() {
        let options = DeviceOptions {
            use_external_clock: true,
            enable_watchdog: true,
            pwm_frequency_hz: 26_000,
        };
        let dev = Emc2305::with_options(MockBus::new(ADDR), ADDR, options)
            .expect("mock device should initialize");
        let bus = dev.release();
        let config = bus.get(0x20);
        assert_ne!(config & 0x20, 0, "WD_EN follows the option");
        assert_ne!(config & 0x08, 0, "USE_EXT_CLK follows the option");
        // The wide RPM range bit lands in every channel's CONFIG2.
        assert_ne!(bus.get(0x33) & 0x20, 0);
        assert_ne!(bus.get(0x73) & 0x20, 0);
    }

    #[test]
    fn init_writes_the_default_channel_image() {
        let dev = new_controller();
        let bus = dev.release();
        for channel in 0..5u8 {
            let base = 0x30 + channel * 0x10;
            assert_eq!(bus.get(base + 0x01), 0x01);
            assert_eq!(bus.get(base + 0x02), 0x28);
            assert_eq!(bus.get(base + 0x03), 0x04);
            assert_eq!(bus.get(base + 0x05), 0x49);
            assert_eq!(bus.get(base + 0x06), 0x8A);
            assert_eq!(bus.get(base + 0x07), 31);
            assert_eq!(bus.get(base + 0x08), 0x00);
            assert_eq!(bus.get(base + 0x09), 0x0F);
            assert_eq!(bus.get(base + 0x0A), 0x00);
            assert_eq!(bus.get(base + 0x0B), 0x00);
        }
    }

    #[test]
    fn init_sets_polarity_output_type_and_interrupts() {
        let dev = new_controller();
        let bus = dev.release();
        assert_eq!(bus.get(0x2A), 0x00);
        assert_eq!(bus.get(0x2B), 0x00);
        assert_eq!(bus.get(0x29), 0x1F);
    }

    #[test]
    fn init_snaps_the_pwm_base_frequency() {
        let options = DeviceOptions {
            pwm_frequency_hz: 5_000,
            ..DeviceOptions::default()
        };
        let dev = Emc2305::with_options(MockBus::new(ADDR), ADDR, options)
            .expect("mock device should initialize");
        let bus = dev.release();
        assert_eq!(bus.get(0x2C), 0x02);
        assert_eq!(bus.get(0x2D), 0x02);
    }

    #[test]
    fn set_pwm_duty_cycle_writes_the_scaled_byte() {
        let mut dev = new_controller();
        for channel in 1..=5u8 {
            dev.set_pwm_duty_cycle(channel, 75.0).expect("set PWM");
        }
        let bus = dev.release();
        for channel in 0..5u8 {
            assert_eq!(bus.get(0x30 + channel * 0x10), 191);
        }
    }

    #[test]
    fn set_pwm_duty_cycle_rejects_bad_input_before_writing() {
        let mut dev = new_controller();
        assert!(matches!(
            dev.set_pwm_duty_cycle(0, 50.0),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            dev.set_pwm_duty_cycle(6, 50.0),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            dev.set_pwm_duty_cycle(1, -1.0),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            dev.set_pwm_duty_cycle(1, 101.0),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn pwm_duty_cycle_reads_back_the_percentage() {
        let mut dev = new_controller();
        dev.set_pwm_duty_cycle(1, 50.0).expect("set PWM");
        let percent = dev.pwm_duty_cycle(1).expect("read PWM");
        assert!((49.0..=51.0).contains(&percent), "got {percent}%");
    }

    #[test]
    fn verified_write_accepts_a_faithful_readback() {
        let mut dev = new_controller();
        let (accepted, actual) = dev
            .set_pwm_duty_cycle_verified(1, 50.0, 5.0)
            .expect("verified write");
        assert!(accepted);
        assert!((45.0..=55.0).contains(&actual));
    }

    #[test]
    fn verified_write_reports_a_mismatch() {
        let mut bus = MockBus::new(ADDR);
        // The drive setting stays at 100% no matter what gets written.
        bus.freeze(0x30);
        let mut dev = hand_built(bus);
        let (accepted, actual) = dev
            .set_pwm_duty_cycle_verified(1, 25.0, 10.0)
            .expect("verified write");
        assert!(!accepted);
        assert!(actual > 90.0);
    }

    #[test]
    fn set_target_rpm_writes_the_tach_count_pair() {
        let mut dev = new_controller();
        dev.set_target_rpm(1, 3000).expect("set target");
        let bus = dev.release();
        // floor(32000 * 60 / (3000 * 2)) = 320 = 0x140
        assert_eq!(bus.get(0x3D), 0x01);
        assert_eq!(bus.get(0x3C), 0x40);
    }

    #[test]
    fn set_target_rpm_honors_the_clock_range() {
        let mut dev = new_controller();
        assert!(matches!(
            dev.set_target_rpm(1, 400),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            dev.set_target_rpm(1, 17_000),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn target_rpm_round_trips_within_tolerance() {
        let mut dev = new_controller();
        dev.set_target_rpm(1, 3000).expect("set target");
        let rpm = dev.target_rpm(1).expect("read target");
        assert!(
            (2850..=3150).contains(&rpm),
            "3000 RPM round-tripped to {rpm}"
        );
    }

    #[test]
    fn current_rpm_converts_the_tach_reading() {
        let mut bus = MockBus::new(ADDR);
        // Count 0x140 = 320 reads as 3000 RPM on a 2-pole fan.
        bus.set(0x3E, 0x01);
        bus.set(0x3F, 0x40);
        let mut dev = hand_built(bus);
        let rpm = dev.current_rpm(1).expect("read RPM");
        assert_eq!(rpm, 3000);
    }

    #[test]
    fn configure_fan_fsc_sets_the_algorithm_and_ramp_bits() {
        let mut dev = new_controller();
        let config = FanChannelConfig {
            control_mode: ControlMode::Fsc,
            ..FanChannelConfig::default()
        };
        dev.configure_fan(1, config).expect("configure");
        let bus = dev.release();
        assert_eq!(bus.get(0x32) & 0x06, 0x06);
    }

    #[test]
    fn set_control_mode_toggles_the_bits_back() {
        let mut dev = new_controller();
        dev.set_control_mode(1, ControlMode::Fsc).expect("to FSC");
        dev.set_control_mode(1, ControlMode::Pwm).expect("to PWM");
        let bus = dev.release();
        assert_eq!(bus.get(0x32) & 0x06, 0x00);
    }

    #[test]
    fn configure_fan_rejects_before_any_write() {
        let mut dev = new_controller();
        let bad = FanChannelConfig {
            edges: 4,
            ..FanChannelConfig::default()
        };
        assert!(matches!(
            dev.configure_fan(1, bad),
            Err(Error::Validation { .. })
        ));
        let bus = dev.release();
        // The channel image is still the default one.
        assert_eq!(bus.get(0x32), 0x28);
    }

    #[test]
    fn fan_status_maps_each_fault_register() {
        let mut bus = MockBus::new(ADDR);
        bus.simulate_fault(FaultKind::Stall, 1);
        bus.simulate_fault(FaultKind::Spin, 3);
        bus.simulate_fault(FaultKind::DriveFail, 5);
        let mut dev = hand_built(bus);

        assert_eq!(dev.fan_status(1).unwrap(), FanStatus::Stalled);
        assert_eq!(dev.fan_status(2).unwrap(), FanStatus::Ok);
        assert_eq!(dev.fan_status(3).unwrap(), FanStatus::SpinFailure);
        assert_eq!(dev.fan_status(4).unwrap(), FanStatus::Ok);
        assert_eq!(dev.fan_status(5).unwrap(), FanStatus::DriveFailure);
    }

    #[test]
    fn fan_status_degrades_to_unknown_on_a_transport_failure() {
        let mut bus = MockBus::new(ADDR);
        bus.fail_reads = true;
        let mut dev = hand_built(bus);
        assert_eq!(dev.fan_status(1).unwrap(), FanStatus::Unknown);
    }

    #[test]
    fn fan_states_snapshot_every_channel() {
        let mut bus = MockBus::new(ADDR);
        bus.simulate_fault(FaultKind::Stall, 2);
        let mut dev = hand_built(bus);
        let states = dev.fan_states().expect("snapshot");

        assert_eq!(states.len(), 5);
        assert_eq!(states[&1].status, FanStatus::Ok);
        assert_eq!(states[&2].status, FanStatus::Stalled);
        assert_eq!(states[&1].control_mode, ControlMode::Pwm);
        assert_eq!(states[&1].target_rpm, 0);
        assert!(states[&1].pwm_percent > 99.0);
    }

    #[test]
    fn lock_blocks_configuration_but_not_pwm_access() {
        let mut dev = new_controller();
        dev.lock_configuration().expect("lock");
        assert!(dev.is_configuration_locked());

        assert!(matches!(
            dev.configure_fan(1, FanChannelConfig::default()),
            Err(Error::ConfigurationLocked)
        ));
        assert!(matches!(
            dev.set_control_mode(1, ControlMode::Fsc),
            Err(Error::ConfigurationLocked)
        ));

        dev.set_pwm_duty_cycle(1, 40.0).expect("PWM stays writable");
        dev.pwm_duty_cycle(1).expect("PWM stays readable");
    }

    #[test]
    fn lock_enforcement_reads_the_live_register() {
        let mut bus = MockBus::new(ADDR);
        // Lock flips behind the driver's back; the cached flag still says
        // unlocked.
        bus.set(0xEF, 0xFF);
        let mut dev = hand_built(bus);
        assert!(matches!(
            dev.configure_fan(1, FanChannelConfig::default()),
            Err(Error::ConfigurationLocked)
        ));
    }

    #[test]
    fn alert_enable_bits_are_read_modify_write() {
        let mut dev = new_controller();
        dev.configure_fan_alerts(3, false).expect("disable");
        assert_eq!(dev.bus.get(0x29), 0x1B);
        dev.configure_fan_alerts(3, true).expect("enable");
        assert_eq!(dev.bus.get(0x29), 0x1F);
    }

    #[test]
    fn alert_status_reports_per_channel_faults() {
        let mut bus = MockBus::new(ADDR);
        bus.simulate_fault(FaultKind::Spin, 2);
        let mut dev = hand_built(bus);
        let alerts = dev.alert_status().expect("alerts");
        assert!(alerts[&2]);
        assert!(!alerts[&1]);
        assert!(!alerts[&5]);
    }

    #[test]
    fn is_alert_active_ignores_the_interrupt_enable_mask() {
        let mut bus = MockBus::new(ADDR);
        bus.set(0x29, 0x00);
        bus.simulate_fault(FaultKind::Stall, 4);
        let mut dev = hand_built(bus);
        assert!(dev.is_alert_active().expect("alert check"));
    }

    #[test]
    fn check_watchdog_reads_the_status_bit() {
        let mut bus = MockBus::new(ADDR);
        bus.set(0x24, 0x80);
        let mut dev = hand_built(bus);
        assert!(dev.check_watchdog());
    }

    #[test]
    fn close_winds_every_channel_down_to_the_safe_duty() {
        let mut dev = new_controller();
        dev.close();
        let bus = dev.release();
        for channel in 0..5u8 {
            assert_eq!(bus.get(0x30 + channel * 0x10), 76);
        }
    }

    #[test]
    fn close_keeps_going_when_one_channel_fails() {
        let mut dev = new_controller();
        dev.bus.fail_writes_to = Some(0x30);
        dev.close();
        let bus = dev.release();
        for channel in 1..5u8 {
            assert_eq!(bus.get(0x30 + channel * 0x10), 76);
        }
    }

    #[test]
    fn scoped_shuts_down_on_success_and_on_error() {
        let mut bus = MockBus::new(ADDR);
        let result = Emc2305::scoped(&mut bus, ADDR, DeviceOptions::default(), |dev| {
            dev.set_pwm_duty_cycle(1, 90.0)
        });
        result.expect("scoped run");
        assert_eq!(bus.get(0x30), 76);

        let result: Result<(), Error> =
            Emc2305::scoped(&mut bus, ADDR, DeviceOptions::default(), |dev| {
                dev.set_pwm_duty_cycle(1, 90.0)?;
                Err(Error::validation("percent", 150, "0-100"))
            });
        assert!(result.is_err());
        assert_eq!(bus.get(0x30), 76);
    }

    #[test]
    fn transport_failures_surface_with_their_own_kinds() {
        let mut bus = MockBus::new(ADDR);
        bus.fail_reads = true;
        let mut dev = hand_built(bus);
        assert!(matches!(dev.pwm_duty_cycle(1), Err(Error::Communication(_))));

        let mut bus = MockBus::new(ADDR);
        bus.lock_timeout = true;
        let mut dev = hand_built(bus);
        assert!(matches!(
            dev.set_pwm_duty_cycle(1, 50.0),
            Err(Error::BusLock(_))
        ));
    }

    #[test]
    fn dump_registers_walks_the_whole_map() {
        let mut dev = new_controller();
        dev.dump_registers().expect("dump");
    }
}
