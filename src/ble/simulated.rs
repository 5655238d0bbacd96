//! In-process BLE simulator
//!
//! Provides a simulated BLE "air" where devices advertise beacons and
//! scanners observe them entirely in-process. Used for testing and for
//! running the beacon on machines without a Bluetooth radio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::ibeacon::IBeaconFrame;
use super::transport::{BeaconAdvertiser, BleAddress, BleAdvertisement};
use super::BleError;
use crate::session::BeaconParams;

/// The simulated "air", a shared medium that carries every advertisement
/// sent by devices created on it.
pub struct SimBleNetwork {
    /// Broadcast channel for advertisements.
    adv_tx: broadcast::Sender<BleAdvertisement>,
}

impl SimBleNetwork {
    /// Create a new simulated BLE network.
    pub fn new() -> Arc<Self> {
        let (adv_tx, _) = broadcast::channel(256);
        Arc::new(Self { adv_tx })
    }

    /// Create a new simulated advertiser on this network.
    pub fn create_device(self: &Arc<Self>) -> SimBeaconDevice {
        SimBeaconDevice {
            address: BleAddress::Simulated(Uuid::new_v4()),
            network: Arc::clone(self),
            advertising: AtomicBool::new(false),
            rebroadcast: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            start_failure: None,
            stop_failure: None,
        }
    }

    /// Subscribe to advertisements sent on this network from now on.
    pub fn scan(&self) -> broadcast::Receiver<BleAdvertisement> {
        self.adv_tx.subscribe()
    }
}

/// A call observed by a simulated advertiser, stamped with tokio time.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvertiserEvent {
    Started { params: BeaconParams, at: Instant },
    Stopped { at: Instant },
}

/// A simulated beacon advertiser.
///
/// While advertising, the encoded frame is sent once immediately and then
/// once per advertising interval until stopped.
pub struct SimBeaconDevice {
    address: BleAddress,
    network: Arc<SimBleNetwork>,
    advertising: AtomicBool,
    /// Task re-sending the frame every interval while advertising.
    rebroadcast: Mutex<Option<JoinHandle<()>>>,
    events: Mutex<Vec<AdvertiserEvent>>,
    start_failure: Option<String>,
    stop_failure: Option<String>,
}

impl SimBeaconDevice {
    /// Get this device's BLE address.
    pub fn address(&self) -> &BleAddress {
        &self.address
    }

    /// Make every subsequent `start_advertising` fail as the platform would.
    pub fn set_start_failure(&mut self, reason: impl Into<String>) {
        self.start_failure = Some(reason.into());
    }

    /// Make every subsequent `stop_advertising` fail as the platform would.
    /// The advertisement stays on the air.
    pub fn set_stop_failure(&mut self, reason: impl Into<String>) {
        self.stop_failure = Some(reason.into());
    }

    /// Successful start/stop calls seen so far, in order.
    pub async fn events(&self) -> Vec<AdvertiserEvent> {
        self.events.lock().await.clone()
    }
}

impl Drop for SimBeaconDevice {
    fn drop(&mut self) {
        if let Some(handle) = self.rebroadcast.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl BeaconAdvertiser for SimBeaconDevice {
    async fn start_advertising(&self, params: &BeaconParams) -> Result<(), BleError> {
        if let Some(reason) = &self.start_failure {
            return Err(BleError::AdvertisingError(reason.clone()));
        }
        params.validate()?;

        let mut rebroadcast = self.rebroadcast.lock().await;
        if rebroadcast.is_some() {
            return Err(BleError::AlreadyAdvertising);
        }

        let adv = BleAdvertisement {
            data: IBeaconFrame::from(params).advertising_data(),
            source_address: self.address.clone(),
        };
        log::debug!(
            "Simulated advertiser {:?} on air: {}",
            self.address,
            hex::encode(&adv.data)
        );

        // No subscribers is fine: nobody is listening.
        let _ = self.network.adv_tx.send(adv.clone());

        let adv_tx = self.network.adv_tx.clone();
        let period = params.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        *rebroadcast = Some(tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let _ = adv_tx.send(adv.clone());
            }
        }));
        self.advertising.store(true, Ordering::SeqCst);

        self.events.lock().await.push(AdvertiserEvent::Started {
            params: params.clone(),
            at: Instant::now(),
        });
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), BleError> {
        if let Some(reason) = &self.stop_failure {
            return Err(BleError::AdvertisingError(reason.clone()));
        }

        let mut rebroadcast = self.rebroadcast.lock().await;
        let handle = rebroadcast.take().ok_or(BleError::NotAdvertising)?;
        handle.abort();
        self.advertising.store(false, Ordering::SeqCst);

        self.events
            .lock()
            .await
            .push(AdvertiserEvent::Stopped { at: Instant::now() });
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    fn drain(rx: &mut broadcast::Receiver<BleAdvertisement>) -> usize {
        let mut count = 0;
        loop {
            match rx.try_recv() {
                Ok(_) => count += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return count,
                Err(TryRecvError::Lagged(n)) => count += n as usize,
            }
        }
    }

    #[tokio::test]
    async fn test_start_broadcasts_ibeacon_frame() {
        let network = SimBleNetwork::new();
        let device = network.create_device();
        let mut rx = network.scan();

        let params = BeaconParams::default();
        device.start_advertising(&params).await.unwrap();
        assert!(device.is_advertising());

        let adv = rx.recv().await.unwrap();
        assert_eq!(adv.source_address, *device.address());
        let frame = IBeaconFrame::from_advertising_data(&adv.data).unwrap();
        assert_eq!(frame, IBeaconFrame::from(&params));
    }

    #[tokio::test]
    async fn test_single_active_advertisement() {
        let network = SimBleNetwork::new();
        let device = network.create_device();
        let params = BeaconParams::default();

        device.start_advertising(&params).await.unwrap();
        let second = device.start_advertising(&params).await;
        assert!(matches!(second, Err(BleError::AlreadyAdvertising)));

        device.stop_advertising().await.unwrap();
        assert!(!device.is_advertising());

        let again = device.stop_advertising().await;
        assert!(matches!(again, Err(BleError::NotAdvertising)));

        // Only the successful calls are recorded.
        let events = device.events().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AdvertiserEvent::Started { .. }));
        assert!(matches!(events[1], AdvertiserEvent::Stopped { .. }));
    }

    #[tokio::test]
    async fn test_invalid_interval_rejected() {
        let network = SimBleNetwork::new();
        let device = network.create_device();
        let mut rx = network.scan();

        let params = BeaconParams {
            interval_ms: 5,
            ..BeaconParams::default()
        };
        let result = device.start_advertising(&params).await;
        assert!(matches!(result, Err(BleError::InvalidParameters(_))));
        assert!(!device.is_advertising());
        assert!(device.events().await.is_empty());
        assert_eq!(drain(&mut rx), 0);
    }

    #[tokio::test]
    async fn test_injected_start_failure() {
        let network = SimBleNetwork::new();
        let mut device = network.create_device();
        device.set_start_failure("radio unavailable");

        let err = device
            .start_advertising(&BeaconParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Advertising error: radio unavailable");
        assert!(!device.is_advertising());
    }

    #[tokio::test]
    async fn test_injected_stop_failure_leaves_beacon_on_air() {
        let network = SimBleNetwork::new();
        let mut device = network.create_device();
        device.set_stop_failure("daemon went away");

        device
            .start_advertising(&BeaconParams::default())
            .await
            .unwrap();
        let result = device.stop_advertising().await;
        assert!(matches!(result, Err(BleError::AdvertisingError(_))));
        assert!(device.is_advertising());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebroadcast_each_interval_until_stopped() {
        let network = SimBleNetwork::new();
        let device = network.create_device();
        let mut rx = network.scan();

        device
            .start_advertising(&BeaconParams::default())
            .await
            .unwrap();

        // Immediate frame plus ticks at 200, 400, 600 and 800 ms.
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(drain(&mut rx), 5);

        device.stop_advertising().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut rx), 0);
    }
}
