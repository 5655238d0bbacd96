//! heartbeacon CLI
//!
//! Advertises an iBeacon for a fixed duration, then prints `Done.`.
//! Every flag defaults to the beacon's fixed parameters, so a bare
//! invocation always broadcasts the same beacon for 15 seconds.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use uuid::Uuid;

use heartbeacon::ble::ibeacon::IBeaconFrame;
use heartbeacon::ble::simulated::SimBleNetwork;
use heartbeacon::ble::transport::BeaconAdvertiser;
use heartbeacon::session::{
    DEFAULT_DURATION_SECS, DEFAULT_INTERVAL_MS, DEFAULT_MAJOR, DEFAULT_MINOR,
    DEFAULT_SERVICE_UUID, DEFAULT_TX_POWER,
};
use heartbeacon::{AdvertisingSession, BeaconParams, BeaconRunner};

#[derive(Parser, Debug)]
#[command(name = "heartbeacon", version, about = "Advertise a BLE iBeacon for a fixed duration")]
struct Cli {
    /// Proximity UUID to advertise
    #[arg(long, default_value_t = DEFAULT_SERVICE_UUID)]
    uuid: Uuid,

    #[arg(long, default_value_t = DEFAULT_MAJOR)]
    major: u16,

    #[arg(long, default_value_t = DEFAULT_MINOR)]
    minor: u16,

    /// Calibrated power at 1 m in dBm, carried in the frame
    #[arg(long, default_value_t = DEFAULT_TX_POWER, allow_negative_numbers = true)]
    tx_power: i8,

    /// Advertising interval in milliseconds (20..=10240)
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
    interval_ms: u32,

    /// How long to keep advertising, in seconds
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    duration_secs: u64,

    /// Bluetooth adapter to advertise on (e.g. hci0); defaults to the
    /// daemon's default adapter
    #[arg(long)]
    adapter: Option<String>,

    /// Advertise on an in-process simulated radio instead of real hardware
    #[arg(long)]
    simulate: bool,

    /// Print the resolved session and advertising data as JSON, then exit
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn session(&self) -> AdvertisingSession {
        let params = BeaconParams {
            service_uuid: self.uuid,
            major: self.major,
            minor: self.minor,
            tx_power: self.tx_power,
            interval_ms: self.interval_ms,
        };
        AdvertisingSession::new(params, self.duration_secs)
    }
}

#[derive(Serialize)]
struct DryRunReport<'a> {
    session: &'a AdvertisingSession,
    interval_units: u16,
    advertising_data: String,
}

impl<'a> DryRunReport<'a> {
    fn new(session: &'a AdvertisingSession) -> Self {
        Self {
            session,
            interval_units: session.params.interval_units(),
            advertising_data: hex::encode(IBeaconFrame::from(&session.params).advertising_data()),
        }
    }
}

#[cfg(all(target_os = "linux", feature = "bluez"))]
async fn platform_advertiser(adapter: Option<&str>) -> anyhow::Result<Arc<dyn BeaconAdvertiser>> {
    let advertiser = heartbeacon::ble::bluez::BluezAdvertiser::open(adapter)
        .await
        .context("Failed to open Bluetooth adapter")?;
    Ok(Arc::new(advertiser))
}

#[cfg(not(all(target_os = "linux", feature = "bluez")))]
async fn platform_advertiser(_adapter: Option<&str>) -> anyhow::Result<Arc<dyn BeaconAdvertiser>> {
    anyhow::bail!("No BLE backend compiled in; rebuild with --features bluez on Linux or pass --simulate")
}

async fn open_advertiser(cli: &Cli) -> anyhow::Result<Arc<dyn BeaconAdvertiser>> {
    if cli.simulate {
        log::info!("Advertising on a simulated radio");
        let network = SimBleNetwork::new();
        return Ok(Arc::new(network.create_device()));
    }
    platform_advertiser(cli.adapter.as_deref()).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let session = cli.session();
    session.params.validate()?;

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&DryRunReport::new(&session))?);
        return Ok(());
    }

    let advertiser = open_advertiser(&cli).await?;
    BeaconRunner::new(advertiser, session)
        .run()
        .await
        .context("Beacon run failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_invocation_uses_fixed_session() {
        let cli = Cli::parse_from(["heartbeacon"]);
        assert_eq!(cli.session(), AdvertisingSession::default());
        assert!(!cli.simulate);
        assert!(!cli.dry_run);
        assert!(cli.adapter.is_none());
    }

    #[test]
    fn test_flags_override_session() {
        let cli = Cli::parse_from([
            "heartbeacon",
            "--uuid",
            "e2c56db5-dffb-48d2-b060-d0f5a71096e0",
            "--major",
            "10",
            "--minor",
            "20",
            "--tx-power",
            "-59",
            "--interval-ms",
            "100",
            "--duration-secs",
            "5",
            "--adapter",
            "hci1",
        ]);
        let session = cli.session();
        assert_eq!(
            session.params.service_uuid.to_string(),
            "e2c56db5-dffb-48d2-b060-d0f5a71096e0"
        );
        assert_eq!(session.params.major, 10);
        assert_eq!(session.params.minor, 20);
        assert_eq!(session.params.tx_power, -59);
        assert_eq!(session.params.interval_ms, 100);
        assert_eq!(session.duration_secs, 5);
        assert_eq!(cli.adapter.as_deref(), Some("hci1"));
    }

    #[test]
    fn test_rejects_malformed_uuid() {
        assert!(Cli::try_parse_from(["heartbeacon", "--uuid", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_dry_run_report() {
        let session = AdvertisingSession::default();
        let json = serde_json::to_value(DryRunReport::new(&session)).unwrap();
        assert_eq!(json["interval_units"], 320);
        assert_eq!(json["session"]["duration_secs"], 15);
        assert_eq!(
            json["advertising_data"],
            "0201061aff4c0002151401000000001000800000805f9b34fb0001000101"
        );
    }

    #[cfg(not(all(target_os = "linux", feature = "bluez")))]
    #[tokio::test]
    async fn test_without_backend_points_at_simulate() {
        let cli = Cli::parse_from(["heartbeacon"]);
        let err = match open_advertiser(&cli).await {
            Ok(_) => panic!("opened an advertiser without a backend"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("--simulate"), "unexpected error: {}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_run_completes() {
        let cli = Cli::parse_from(["heartbeacon", "--simulate", "--duration-secs", "1"]);
        let advertiser = open_advertiser(&cli).await.unwrap();
        BeaconRunner::new(advertiser.clone(), cli.session())
            .run_with_output(&mut std::io::sink())
            .await
            .unwrap();
        assert!(!advertiser.is_advertising());
    }
}
