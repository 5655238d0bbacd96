//! BLE advertising layer
//!
//! Provides the advertiser trait the runner drives, an in-process simulated
//! advertiser for testing, the iBeacon frame codec, and (behind the `bluez`
//! feature) a BlueZ-backed advertiser for Linux hosts.

#[cfg(all(target_os = "linux", feature = "bluez"))]
pub mod bluez;
pub mod ibeacon;
pub mod simulated;
pub mod transport;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BleError {
    #[error("Advertising error: {0}")]
    AdvertisingError(String),

    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Invalid beacon parameters: {0}")]
    InvalidParameters(String),

    #[error("Already advertising")]
    AlreadyAdvertising,

    #[error("Not advertising")]
    NotAdvertising,
}
