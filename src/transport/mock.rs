// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Register-map simulation of an EMC2305 for driver tests.
//!
//! The map is seeded with power-on values. Latched status bits do not clear
//! on read here; tests set them explicitly through
//! [`MockBus::simulate_fault`].

use std::collections::BTreeMap;
use std::time::Duration;

use super::{I2cBus, TransportError};

/// Fault classes a test can inject.
#[derive(Clone, Copy, Debug)]
pub(crate) enum FaultKind {
    Stall,
    Spin,
    DriveFail,
}

pub(crate) struct MockBus {
    device_address: u8,
    registers: BTreeMap<u8, u8>,
    /// Every read fails with a communication error while set.
    pub(crate) fail_reads: bool,
    /// Every transfer fails with a lock timeout while set.
    pub(crate) lock_timeout: bool,
    /// Writes to these registers are silently dropped.
    frozen: Vec<u8>,
    /// Writes to this register fail with a communication error.
    pub(crate) fail_writes_to: Option<u8>,
}

impl MockBus {
    pub(crate) fn new(device_address: u8) -> Self {
        let mut registers = BTreeMap::new();

        // Identity block
        registers.insert(0xFD, 0x34);
        registers.insert(0xFE, 0x5D);
        registers.insert(0xFF, 0x80);
        registers.insert(0xFC, 0x0D);

        // Global configuration and status
        registers.insert(0x20, 0x00);
        registers.insert(0x24, 0x00);
        registers.insert(0x25, 0x00);
        registers.insert(0x26, 0x00);
        registers.insert(0x27, 0x00);
        registers.insert(0x29, 0x00);
        registers.insert(0x2A, 0x00);
        registers.insert(0x2B, 0x00);
        registers.insert(0x2C, 0x00);
        registers.insert(0x2D, 0x00);
        registers.insert(0xEF, 0x00);

        for channel in 0..5u8 {
            let base = 0x30 + channel * 0x10;
            registers.insert(base, 0xFF); // drive setting, 100%
            registers.insert(base + 0x01, 0x01); // pwm divide
            registers.insert(base + 0x02, 0x28); // config1: 200 ms, 5 edges
            registers.insert(base + 0x03, 0x00); // config2
            registers.insert(base + 0x05, 0x48); // gain: P=2x, I=1x
            registers.insert(base + 0x06, 0x8A); // spin-up: 50%, 500 ms
            registers.insert(base + 0x07, 0xFF); // max step
            registers.insert(base + 0x08, 0x00); // minimum drive
            registers.insert(base + 0x09, 0x0F); // valid tach count
            registers.insert(base + 0x0A, 0x00); // drive fail band low
            registers.insert(base + 0x0B, 0x00); // drive fail band high
            registers.insert(base + 0x0C, 0xFF); // tach target low
            registers.insert(base + 0x0D, 0xFF); // tach target high
            registers.insert(base + 0x0E, 0x00); // tach reading high
            registers.insert(base + 0x0F, 0x80); // tach reading low, ~7500 RPM
        }

        Self {
            device_address,
            registers,
            fail_reads: false,
            lock_timeout: false,
            frozen: Vec::new(),
            fail_writes_to: None,
        }
    }

    pub(crate) fn get(&self, register: u8) -> u8 {
        self.registers.get(&register).copied().unwrap_or(0x00)
    }

    pub(crate) fn set(&mut self, register: u8, value: u8) {
        self.registers.insert(register, value);
    }

    /// Drop all further writes to `register`, keeping its current value.
    pub(crate) fn freeze(&mut self, register: u8) {
        self.frozen.push(register);
    }

    pub(crate) fn simulate_fault(&mut self, kind: FaultKind, channel: u8) {
        let bit = 1u8 << (channel - 1);
        let register = match kind {
            FaultKind::Stall => 0x25,
            FaultKind::Spin => 0x26,
            FaultKind::DriveFail => 0x27,
        };
        let latched = self.get(register) | bit;
        self.set(register, latched);
        let combined = self.get(0x24) | bit;
        self.set(0x24, combined);
    }

    fn check_target(&self, address: u8) -> Result<(), TransportError> {
        if self.lock_timeout {
            return Err(TransportError::LockTimeout(Duration::from_secs(5)));
        }
        if address != self.device_address {
            return Err(TransportError::Bus(format!(
                "no device at address 0x{address:02X}"
            )));
        }
        Ok(())
    }
}

impl I2cBus for MockBus {
    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, TransportError> {
        self.check_target(address)?;
        if self.fail_reads {
            return Err(TransportError::Bus("injected read failure".into()));
        }
        Ok(self.get(register))
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), TransportError> {
        self.check_target(address)?;
        if self.fail_writes_to == Some(register) {
            return Err(TransportError::Bus("injected write failure".into()));
        }
        if !self.frozen.contains(&register) {
            self.set(register, value);
        }
        Ok(())
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, TransportError> {
        self.check_target(address)?;
        if self.fail_reads {
            return Err(TransportError::Bus("injected read failure".into()));
        }
        Ok((0..length)
            .map(|offset| self.get(register.wrapping_add(offset as u8)))
            .collect())
    }
}
