// heartbeacon - fixed-duration BLE iBeacon advertising

pub mod ble;
pub mod runner;
pub mod session;

pub use runner::{BeaconRunner, RunnerError};
pub use session::{AdvertisingSession, BeaconParams};
