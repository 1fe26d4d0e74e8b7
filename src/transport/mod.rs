// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Byte-level SMBus transport the driver talks through.

use std::time::Duration;

use thiserror::Error;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(test)]
pub(crate) mod mock;

/// Largest transfer the SMBus block protocol allows.
pub const SMBUS_BLOCK_MAX: usize = 32;

/// Failures at the transport layer.
///
/// A lock timeout is kept separate from a transfer failure so callers can
/// tell a busy bus from a broken one.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transfer itself failed.
    #[error("i2c transfer failed: {0}")]
    Bus(String),

    /// The request was malformed before it reached the wire.
    #[error("{0}")]
    InvalidParameter(String),

    /// The cross-process advisory lock was not acquired within its timeout.
    #[error("i2c bus lock not acquired within {0:?}")]
    LockTimeout(Duration),
}

/// Register-oriented access to a device on an I2C/SMBus bus.
///
/// Addresses are 7-bit (0x00 to 0x7F); registers are 8-bit. Implementations
/// perform exactly one transaction per call and never retry.
pub trait I2cBus {
    /// Read one byte from `register` of the device at `address`.
    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, TransportError>;

    /// Write one byte to `register` of the device at `address`.
    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), TransportError>;

    /// Read `length` bytes from consecutive registers starting at `register`.
    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, TransportError>;
}

impl<T: I2cBus + ?Sized> I2cBus for &mut T {
    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, TransportError> {
        (**self).read_byte(address, register)
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), TransportError> {
        (**self).write_byte(address, register, value)
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).read_block(address, register, length)
    }
}
