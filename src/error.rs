// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the driver.
#[derive(Debug, Error)]
pub enum Error {
    /// No EMC2305 responded at the probed address, or the identity registers
    /// did not match the expected part.
    #[error("no EMC2305 at address 0x{address:02X}: {reason}")]
    DeviceNotFound { address: u8, reason: String },

    /// An input value was outside its allowed domain. Raised before any
    /// register write takes place.
    #[error("{field} must be {allowed}, got {value}")]
    Validation {
        field: &'static str,
        value: String,
        allowed: String,
    },

    /// A mutating operation was attempted while the software lock register
    /// reads locked. The lock is one way; only a hardware reset clears it.
    #[error("configuration registers are locked until the next hardware reset")]
    ConfigurationLocked,

    /// The underlying I2C transfer failed.
    #[error("i2c communication failed: {0}")]
    Communication(String),

    /// The cross-process bus lock could not be acquired in time. The device
    /// may be healthy but busy; distinct from [`Error::Communication`].
    #[error("i2c bus lock not acquired within {0:?}")]
    BusLock(Duration),
}

impl Error {
    pub(crate) fn validation(
        field: &'static str,
        value: impl Display,
        allowed: impl Into<String>,
    ) -> Self {
        Error::Validation {
            field,
            value: value.to_string(),
            allowed: allowed.into(),
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::LockTimeout(timeout) => Error::BusLock(timeout),
            other => Error::Communication(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_maps_to_bus_lock() {
        let err = Error::from(TransportError::LockTimeout(Duration::from_secs(5)));
        assert!(matches!(err, Error::BusLock(timeout) if timeout == Duration::from_secs(5)));
    }

    #[test]
    fn bus_failure_maps_to_communication() {
        let err = Error::from(TransportError::Bus("read failed".into()));
        assert!(matches!(err, Error::Communication(_)));
    }

    #[test]
    fn validation_message_names_field_and_domain() {
        let err = Error::validation("edges", 4, "one of 3, 5, 7, 9");
        assert_eq!(err.to_string(), "edges must be one of 3, 5, 7, 9, got 4");
    }
}
