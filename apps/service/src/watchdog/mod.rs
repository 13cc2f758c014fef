/// Watchdog module - the check-and-reboot loop
///
/// Each sweep walks the device registry in config order and, per device:
/// - takes one status snapshot (one call to each status service)
/// - logs a status report
/// - decides whether the device is stuck and triggers a reboot if so
///
/// Devices are handled strictly one after another. A device that cannot be
/// evaluated is logged and skipped until the next sweep.


use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use madstatus::{
    DeviceError, DeviceSnapshot, RebootActuator, RebootDecision, RebootPolicy, RebootReason,
    Staleness, StatusReader, StatusTransport,
};
use tokio::time::sleep;
use tracing::{Instrument, error, info, info_span};

use crate::config::{Config, Device};

const SEPARATOR: &str = "-------------------------------------------------------------------";

/// Counters for one pass over the registry
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub rebooted: usize,
    pub skipped: usize,
}

/// What happened to a single device in a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOutcome {
    Healthy,
    Rebooted(RebootReason),
}

pub struct Watchdog<T> {
    reader: StatusReader<T>,
    actuator: Arc<dyn RebootActuator>,
    devices: Vec<Device>,
    policy: RebootPolicy,
    reboot_cooldown: Duration,
    sweep_interval: Duration,
}

impl<T: StatusTransport> Watchdog<T> {
    pub fn new(reader: StatusReader<T>, actuator: Arc<dyn RebootActuator>, config: &Config) -> Self {
        Self {
            reader,
            actuator,
            devices: config.devices.clone(),
            policy: config.reboot.policy,
            reboot_cooldown: config.timing.reboot_cooldown,
            sweep_interval: config.timing.sweep_interval,
        }
    }

    /// Sweep forever, pausing `sweep_interval` between sweeps
    pub async fn run(&self) {
        info!(devices = self.devices.len(), "Starting check and reboot loop");

        loop {
            self.sweep().await;
            sleep(self.sweep_interval).await;
        }
    }

    /// Check every device once
    pub async fn sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        for device in &self.devices {
            let span = info_span!("device", name = %device.name, origin = %device.origin);

            match self.check_device(device).instrument(span).await {
                Ok(DeviceOutcome::Healthy) => summary.checked += 1,
                Ok(DeviceOutcome::Rebooted(_)) => {
                    summary.checked += 1;
                    summary.rebooted += 1;
                }
                Err(e) => {
                    error!(origin = %device.origin, "Skipping device for this sweep: {e}");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            checked = summary.checked,
            rebooted = summary.rebooted,
            skipped = summary.skipped,
            "Sweep finished"
        );
        summary
    }

    async fn check_device(&self, device: &Device) -> Result<DeviceOutcome, DeviceError> {
        let snapshot = self.reader.snapshot(&device.origin).await?;
        let staleness = snapshot.staleness(Local::now())?;
        log_report(&snapshot, &staleness);

        match self.policy.evaluate_staleness(snapshot.injection_status, &staleness) {
            RebootDecision::Keep => Ok(DeviceOutcome::Healthy),
            RebootDecision::Reboot(reason) => {
                info!(%reason, "Device = {} will be rebooted now.", device.origin);
                self.actuator.reboot(&device.origin)?;

                info!("Waiting {}s for the device to come back", self.reboot_cooldown.as_secs());
                sleep(self.reboot_cooldown).await;
                Ok(DeviceOutcome::Rebooted(reason))
            }
        }
    }
}

fn log_report(snapshot: &DeviceSnapshot, staleness: &Staleness) {
    let init = snapshot.route_init.map_or_else(|| "unknown".to_string(), |init| init.to_string());

    info!("{SEPARATOR}");
    info!("Device:        {}", snapshot.origin);
    info!("Inject:        {}", snapshot.injection_status);
    info!("Worker:        {} (Init={init})", shown(&snapshot.route_manager));
    info!("LastData:      {} ( {} minutes ago )", staleness.data_seen, staleness.data_minutes);
    info!(
        "LastProtoDate: {} ( {} minutes ago )",
        shown(&snapshot.last_proto_date_time),
        staleness.proto_minutes
    );
    info!(
        "LastRestart:   {} ( {} minutes ago )",
        shown(&snapshot.last_restart),
        staleness.restart_minutes
    );
    info!(
        "LastReboot:    {} ( {} minutes ago )",
        shown(&snapshot.last_reboot),
        staleness.reboot_minutes
    );
}

fn shown(value: &Option<String>) -> &str {
    value.as_deref().filter(|v| !v.is_empty()).unwrap_or("unknown")
}
