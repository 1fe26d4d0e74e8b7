// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Transport backed by the Linux `/dev/i2c-*` character devices.
//!
//! Cross-process mutual exclusion uses an advisory `flock` on a per-bus file
//! under `/var/lock`, polled until a bounded timeout. The in-kernel i2c-dev
//! interface already serializes individual transfers; the advisory lock keeps
//! multi-transfer register sequences from interleaving with other processes
//! that honor the same lock file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::debug;

use super::{I2cBus, TransportError, SMBUS_BLOCK_MAX};

/// Pacing delay applied before every transfer.
const TRANSFER_DELAY: Duration = Duration::from_millis(1);

/// Poll interval while waiting for the advisory lock.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Default advisory lock acquisition timeout.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default directory holding the per-bus lock files.
pub const DEFAULT_LOCK_DIR: &str = "/var/lock";

/// Cross-process locking options for a [`LinuxI2cBus`].
#[derive(Clone, Debug)]
pub struct LockOptions {
    /// Directory the `i2c-<bus>.lock` file lives in.
    pub directory: PathBuf,
    /// How long to wait for the lock before giving up.
    pub timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOCK_DIR),
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// An I2C bus reached through `/dev/i2c-<n>`.
pub struct LinuxI2cBus {
    path: PathBuf,
    device: Option<(u8, LinuxI2CDevice)>,
    lock: Option<BusLock>,
}

struct BusLock {
    file: File,
    timeout: Duration,
}

/// Holds the advisory lock for the duration of one transfer.
struct LockGuard<'a>(&'a File);

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.0);
    }
}

impl BusLock {
    fn acquire(lock: Option<&BusLock>) -> Result<Option<LockGuard<'_>>, TransportError> {
        let Some(lock) = lock else {
            return Ok(None);
        };
        let deadline = Instant::now() + lock.timeout;
        loop {
            match lock.file.try_lock_exclusive() {
                Ok(()) => return Ok(Some(LockGuard(&lock.file))),
                Err(_) if Instant::now() < deadline => thread::sleep(LOCK_RETRY_INTERVAL),
                Err(_) => return Err(TransportError::LockTimeout(lock.timeout)),
            }
        }
    }
}

impl LinuxI2cBus {
    /// Open bus `bus_number` with cross-process locking enabled.
    pub fn open(bus_number: u8) -> Result<Self, TransportError> {
        Self::open_with_lock(bus_number, Some(LockOptions::default()))
    }

    /// Open bus `bus_number`, optionally serialized by an advisory file lock.
    pub fn open_with_lock(
        bus_number: u8,
        lock: Option<LockOptions>,
    ) -> Result<Self, TransportError> {
        let path = PathBuf::from(format!("/dev/i2c-{bus_number}"));
        if !path.exists() {
            return Err(TransportError::Bus(format!(
                "failed to open i2c bus {bus_number}: {} does not exist",
                path.display()
            )));
        }

        let lock = match lock {
            Some(options) => {
                let lock_path = options.directory.join(format!("i2c-{bus_number}.lock"));
                fs::create_dir_all(&options.directory).map_err(|err| {
                    TransportError::Bus(format!(
                        "failed to create lock directory {}: {err}",
                        options.directory.display()
                    ))
                })?;
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(&lock_path)
                    .map_err(|err| {
                        TransportError::Bus(format!(
                            "failed to open lock file {}: {err}",
                            lock_path.display()
                        ))
                    })?;
                debug!(
                    "i2c bus {bus_number} locking enabled: {}",
                    lock_path.display()
                );
                Some(BusLock {
                    file,
                    timeout: options.timeout,
                })
            }
            None => None,
        };

        Ok(Self {
            path,
            device: None,
            lock,
        })
    }
}

fn validate_address(address: u8) -> Result<(), TransportError> {
    if address > 0x7F {
        return Err(TransportError::InvalidParameter(format!(
            "invalid i2c address 0x{address:02X} (must be 0x00-0x7F)"
        )));
    }
    Ok(())
}

fn validate_block_length(length: usize) -> Result<(), TransportError> {
    if !(1..=SMBUS_BLOCK_MAX).contains(&length) {
        return Err(TransportError::InvalidParameter(format!(
            "invalid block length {length} (must be 1-{SMBUS_BLOCK_MAX} bytes)"
        )));
    }
    Ok(())
}

/// Rebind the slave address when it differs from the cached handle.
fn bind<'a>(
    path: &Path,
    slot: &'a mut Option<(u8, LinuxI2CDevice)>,
    address: u8,
) -> Result<&'a mut LinuxI2CDevice, TransportError> {
    let stale = match slot {
        Some((bound, _)) => *bound != address,
        None => true,
    };
    if stale {
        let device = LinuxI2CDevice::new(path, u16::from(address)).map_err(|err| {
            TransportError::Bus(format!(
                "failed to open {} for 0x{address:02X}: {err}",
                path.display()
            ))
        })?;
        *slot = Some((address, device));
    }
    match slot {
        Some((_, device)) => Ok(device),
        None => Err(TransportError::Bus("i2c device handle unavailable".into())),
    }
}

impl I2cBus for LinuxI2cBus {
    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, TransportError> {
        validate_address(address)?;
        let LinuxI2cBus { path, device, lock } = self;
        let _guard = BusLock::acquire(lock.as_ref())?;
        let device = bind(path, device, address)?;
        thread::sleep(TRANSFER_DELAY);
        let value = device.smbus_read_byte_data(register).map_err(|err| {
            TransportError::Bus(format!(
                "i2c read failed: addr=0x{address:02X} reg=0x{register:02X}: {err}"
            ))
        })?;
        debug!("i2c read: addr=0x{address:02X} reg=0x{register:02X} -> 0x{value:02X}");
        Ok(value)
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), TransportError> {
        validate_address(address)?;
        let LinuxI2cBus { path, device, lock } = self;
        let _guard = BusLock::acquire(lock.as_ref())?;
        let device = bind(path, device, address)?;
        thread::sleep(TRANSFER_DELAY);
        device.smbus_write_byte_data(register, value).map_err(|err| {
            TransportError::Bus(format!(
                "i2c write failed: addr=0x{address:02X} reg=0x{register:02X}: {err}"
            ))
        })?;
        debug!("i2c write: addr=0x{address:02X} reg=0x{register:02X} <- 0x{value:02X}");
        Ok(())
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, TransportError> {
        validate_address(address)?;
        validate_block_length(length)?;
        let LinuxI2cBus { path, device, lock } = self;
        let _guard = BusLock::acquire(lock.as_ref())?;
        let device = bind(path, device, address)?;
        thread::sleep(TRANSFER_DELAY);
        let mut data = vec![0u8; length];
        device.write(&[register]).map_err(|err| {
            TransportError::Bus(format!(
                "i2c block read failed: addr=0x{address:02X} reg=0x{register:02X} len={length}: {err}"
            ))
        })?;
        device.read(&mut data).map_err(|err| {
            TransportError::Bus(format!(
                "i2c block read failed: addr=0x{address:02X} reg=0x{register:02X} len={length}: {err}"
            ))
        })?;
        debug!("i2c read block: addr=0x{address:02X} reg=0x{register:02X} len={length} -> {data:02X?}");
        Ok(data)
    }
}
