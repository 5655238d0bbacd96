//! Beacon lifecycle
//!
//! `BeaconRunner` brackets one advertising session: start, hold for the
//! session duration, stop, then report completion. Faults from the
//! advertiser are returned as-is and never retried.

use std::io::{self, Write};
use std::sync::Arc;

use thiserror::Error;

use crate::ble::transport::BeaconAdvertiser;
use crate::ble::BleError;
use crate::session::AdvertisingSession;

/// Completion notice written after the advertisement has been stopped.
pub const DONE_NOTICE: &str = "Done.";

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Ble(#[from] BleError),

    #[error("Failed to write completion notice: {0}")]
    Output(#[from] io::Error),
}

pub struct BeaconRunner {
    advertiser: Arc<dyn BeaconAdvertiser>,
    session: AdvertisingSession,
}

impl BeaconRunner {
    pub fn new(advertiser: Arc<dyn BeaconAdvertiser>, session: AdvertisingSession) -> Self {
        Self {
            advertiser,
            session,
        }
    }

    /// Run the session and print the completion notice to stdout.
    pub async fn run(&self) -> Result<(), RunnerError> {
        self.run_with_output(&mut io::stdout()).await
    }

    /// Run the session, writing the completion notice to `out`.
    ///
    /// If starting fails nothing else happens. If stopping fails the error is
    /// returned and no notice is written.
    pub async fn run_with_output<W: Write>(&self, out: &mut W) -> Result<(), RunnerError> {
        let params = &self.session.params;

        self.advertiser.start_advertising(params).await?;
        log::info!(
            "Advertising beacon {} (major {}, minor {}, tx power {} dBm) every {} ms for {} s",
            params.service_uuid,
            params.major,
            params.minor,
            params.tx_power,
            params.interval_ms,
            self.session.duration_secs
        );

        tokio::time::sleep(self.session.duration()).await;

        if let Err(e) = self.advertiser.stop_advertising().await {
            log::error!("Failed to stop advertising, beacon may still be on air: {}", e);
            return Err(e.into());
        }
        log::info!("Advertising stopped");

        writeln!(out, "{}", DONE_NOTICE)?;
        out.flush()?;
        Ok(())
    }
}
