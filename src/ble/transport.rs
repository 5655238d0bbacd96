//! BLE advertiser trait definitions and core types
//!
//! Defines the abstract advertising capability that both the simulated
//! advertiser and the BlueZ-backed advertiser conform to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BleError;
use crate::session::BeaconParams;

/// A BLE device address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BleAddress {
    /// A real 6-byte BLE MAC address.
    Real([u8; 6]),
    /// A simulated address identified by UUID.
    Simulated(Uuid),
}

/// A BLE advertisement as seen on the air.
#[derive(Debug, Clone)]
pub struct BleAdvertisement {
    /// Raw advertising data (AD structures).
    pub data: Vec<u8>,
    /// Address of the advertising device.
    pub source_address: BleAddress,
}

/// Broadcaster role: put a beacon on the air and take it off again.
///
/// Implementations hold at most one advertisement at a time. Starting while
/// already advertising fails with [`BleError::AlreadyAdvertising`] and
/// stopping while idle fails with [`BleError::NotAdvertising`].
#[async_trait]
pub trait BeaconAdvertiser: Send + Sync {
    /// Begin advertising the beacon described by `params`.
    async fn start_advertising(&self, params: &BeaconParams) -> Result<(), BleError>;

    /// Stop advertising the beacon started by `start_advertising`.
    async fn stop_advertising(&self) -> Result<(), BleError>;

    /// Whether an advertisement is currently registered.
    fn is_advertising(&self) -> bool;
}

