//! BlueZ-backed advertiser (Linux)
//!
//! Registers the iBeacon frame as an LE advertisement with the Bluetooth
//! daemon over D-Bus. The daemon owns the radio; this side only holds the
//! advertisement handle between start and stop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bluer::adv::{Advertisement, AdvertisementHandle, Type};
use bluer::{Adapter, Session};
use tokio::sync::Mutex;

use super::ibeacon::{IBeaconFrame, APPLE_COMPANY_ID};
use super::transport::{BeaconAdvertiser, BleAddress};
use super::BleError;
use crate::session::BeaconParams;

pub struct BluezAdvertiser {
    // Keeps the D-Bus connection alive for the adapter.
    _session: Session,
    adapter: Adapter,
    address: BleAddress,
    handle: Mutex<Option<AdvertisementHandle>>,
    advertising: AtomicBool,
}

impl BluezAdvertiser {
    /// Open the named adapter, or the daemon's default one, and power it on.
    pub async fn open(adapter_name: Option<&str>) -> Result<Self, BleError> {
        let session = Session::new()
            .await
            .map_err(|e| BleError::AdapterUnavailable(e.to_string()))?;
        let adapter = match adapter_name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| BleError::AdapterUnavailable(e.to_string()))?;

        adapter
            .set_powered(true)
            .await
            .map_err(|e| BleError::AdapterUnavailable(format!("{}: {}", adapter.name(), e)))?;
        let address = adapter
            .address()
            .await
            .map_err(|e| BleError::AdapterUnavailable(format!("{}: {}", adapter.name(), e)))?;

        log::info!("Using Bluetooth adapter {} ({})", adapter.name(), address);

        Ok(Self {
            _session: session,
            adapter,
            address: BleAddress::Real(address.0),
            handle: Mutex::new(None),
            advertising: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> &BleAddress {
        &self.address
    }

    fn advertisement(params: &BeaconParams) -> Advertisement {
        let frame = IBeaconFrame::from(params);
        let mut manufacturer_data = BTreeMap::new();
        manufacturer_data.insert(APPLE_COMPANY_ID, frame.manufacturer_data());

        Advertisement {
            advertisement_type: Type::Broadcast,
            manufacturer_data,
            min_interval: Some(params.interval()),
            max_interval: Some(params.interval()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BeaconAdvertiser for BluezAdvertiser {
    async fn start_advertising(&self, params: &BeaconParams) -> Result<(), BleError> {
        params.validate()?;

        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return Err(BleError::AlreadyAdvertising);
        }

        log::debug!(
            "Registering advertisement on {} ({:?}): {}",
            self.adapter.name(),
            self.address(),
            hex::encode(IBeaconFrame::from(params).advertising_data())
        );
        let registered = self
            .adapter
            .advertise(Self::advertisement(params))
            .await
            .map_err(|e| BleError::AdvertisingError(e.to_string()))?;

        *handle = Some(registered);
        self.advertising.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), BleError> {
        let registered = self
            .handle
            .lock()
            .await
            .take()
            .ok_or(BleError::NotAdvertising)?;
        // Dropping the handle asks the daemon to unregister the advertisement.
        drop(registered);
        self.advertising.store(false, Ordering::SeqCst);
        log::debug!("Advertisement on {} unregistered", self.adapter.name());
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertisement_carries_ibeacon_frame() {
        let params = BeaconParams::default();
        let adv = BluezAdvertiser::advertisement(&params);

        assert_eq!(adv.advertisement_type, Type::Broadcast);
        let data = adv.manufacturer_data.get(&APPLE_COMPANY_ID).unwrap();
        assert_eq!(
            IBeaconFrame::from_manufacturer_data(data),
            Some(IBeaconFrame::from(&params))
        );
        assert_eq!(adv.min_interval, Some(params.interval()));
        assert_eq!(adv.max_interval, Some(params.interval()));
    }
}
