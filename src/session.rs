//! Advertising session parameters
//!
//! An `AdvertisingSession` is everything one run of the beacon needs: what
//! to advertise (`BeaconParams`) and for how long. The defaults are the
//! fixed literals the beacon has always broadcast.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ble::BleError;

/// Beacon UUID advertised when none is given.
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x14010000_0000_1000_8000_00805f9b34fb);
pub const DEFAULT_MAJOR: u16 = 1;
pub const DEFAULT_MINOR: u16 = 1;
pub const DEFAULT_TX_POWER: i8 = 1;
pub const DEFAULT_INTERVAL_MS: u32 = 200;
pub const DEFAULT_DURATION_SECS: u64 = 15;

/// Shortest advertising interval a controller accepts (0x0020 units).
pub const MIN_INTERVAL_MS: u32 = 20;
/// Longest advertising interval a controller accepts (0x4000 units).
pub const MAX_INTERVAL_MS: u32 = 10_240;

/// What gets advertised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconParams {
    /// Proximity UUID carried in the iBeacon frame.
    pub service_uuid: Uuid,
    pub major: u16,
    pub minor: u16,
    /// Calibrated power at 1 m, in dBm, as carried in the frame.
    pub tx_power: i8,
    /// Advertising interval in milliseconds.
    pub interval_ms: u32,
}

impl Default for BeaconParams {
    fn default() -> Self {
        Self {
            service_uuid: DEFAULT_SERVICE_UUID,
            major: DEFAULT_MAJOR,
            minor: DEFAULT_MINOR,
            tx_power: DEFAULT_TX_POWER,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl BeaconParams {
    /// Check the parameters against what a BLE controller will accept.
    pub fn validate(&self) -> Result<(), BleError> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(BleError::InvalidParameters(format!(
                "advertising interval {} ms outside {}..={} ms",
                self.interval_ms, MIN_INTERVAL_MS, MAX_INTERVAL_MS
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.interval_ms))
    }

    /// Interval in controller units of 0.625 ms.
    pub fn interval_units(&self) -> u16 {
        // Validated intervals top out at 10240 * 8 / 5 = 16384.
        (u64::from(self.interval_ms) * 8 / 5).min(u64::from(u16::MAX)) as u16
    }
}

/// One advertising run: parameters plus how long to hold the advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisingSession {
    pub params: BeaconParams,
    pub duration_secs: u64,
}

impl Default for AdvertisingSession {
    fn default() -> Self {
        Self {
            params: BeaconParams::default(),
            duration_secs: DEFAULT_DURATION_SECS,
        }
    }
}

impl AdvertisingSession {
    pub fn new(params: BeaconParams, duration_secs: u64) -> Self {
        Self {
            params,
            duration_secs,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}
