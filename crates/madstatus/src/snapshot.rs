//! Per-device status snapshots.
//!
//! A [`DeviceSnapshot`] combines one read of the mitm receiver and one read
//! of madmin. The watchdog takes exactly one snapshot per device per sweep
//! and hands it to both the status report and the reboot decision.

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::client::StatusClient;
use crate::endpoint::Endpoint;
use crate::error::{DeviceError, Service};
use crate::staleness::{minutes_since_given_time, minutes_since_last_data, Staleness};
use crate::status::{find_worker, InjectionStatusPage, OriginStatus, WorkerStatus};
use crate::transport::StatusTransport;

/// Everything known about one device at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub origin: String,
    pub injection_status: bool,
    pub latest_data: Option<f64>,
    pub route_manager: Option<String>,
    pub last_reboot: Option<String>,
    pub last_restart: Option<String>,
    pub last_proto_date_time: Option<String>,
    pub route_init: Option<bool>,
}

impl DeviceSnapshot {
    pub fn from_parts(origin: &str, injection: OriginStatus, worker: WorkerStatus) -> Self {
        Self {
            origin: origin.to_string(),
            injection_status: injection.injection_status,
            latest_data: injection.latest_data,
            route_manager: worker.route_manager,
            last_reboot: worker.last_reboot,
            last_restart: worker.last_restart,
            last_proto_date_time: worker.last_proto_date_time,
            route_init: worker.route_init,
        }
    }

    /// Compute every staleness figure against the same `now`
    pub fn staleness(&self, now: DateTime<Local>) -> Result<Staleness, DeviceError> {
        let (data_minutes, data_seen) = minutes_since_last_data(self.latest_data, now);

        let minutes = |field: &'static str, value: &Option<String>| {
            minutes_since_given_time(value.as_deref(), now)
                .map_err(|source| DeviceError::Timestamp { field, source })
        };

        Ok(Staleness {
            data_minutes,
            data_seen,
            proto_minutes: minutes("lastProtoDateTime", &self.last_proto_date_time)?,
            restart_minutes: minutes("lastPogoRestart", &self.last_restart)?,
            reboot_minutes: minutes("lastPogoReboot", &self.last_reboot)?,
        })
    }
}

/// Reads both status services for a device
pub struct StatusReader<T> {
    client: StatusClient<T>,
    mitm: Endpoint,
    madmin: Endpoint,
}

impl<T: StatusTransport> StatusReader<T> {
    pub fn new(client: StatusClient<T>, mitm: Endpoint, madmin: Endpoint) -> Self {
        Self { client, mitm, madmin }
    }

    /// Injection status and last data time from the mitm receiver
    pub async fn read_device_status_values(&self, origin: &str) -> Result<OriginStatus, DeviceError> {
        let page: InjectionStatusPage = self.client.fetch_as(&self.mitm, Service::Mitm).await?;
        page.origin(origin).cloned()
    }

    /// Worker record from madmin
    pub async fn read_mad_status_values(&self, origin: &str) -> Result<WorkerStatus, DeviceError> {
        let records: Vec<Value> = self.client.fetch_as(&self.madmin, Service::Madmin).await?;
        find_worker(&records, origin)
    }

    /// One read of each service, combined
    pub async fn snapshot(&self, origin: &str) -> Result<DeviceSnapshot, DeviceError> {
        let injection = self.read_device_status_values(origin).await?;
        let worker = self.read_mad_status_values(origin).await?;
        Ok(DeviceSnapshot::from_parts(origin, injection, worker))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::staleness::{parse_local, STALE_SENTINEL_MINUTES};

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot {
            origin: "atv01".into(),
            injection_status: false,
            latest_data: None,
            route_manager: Some("mon_raids".into()),
            last_reboot: None,
            last_restart: Some("2024-01-15 11:00:00".into()),
            last_proto_date_time: Some("2024-01-15 11:45:00".into()),
            route_init: Some(true),
        }
    }

    #[test]
    fn test_staleness_uses_one_now() {
        let now = parse_local("2024-01-15 12:00:00").unwrap();
        let staleness = snapshot().staleness(now).unwrap();

        assert_eq!(staleness.data_minutes, STALE_SENTINEL_MINUTES);
        assert_eq!(staleness.data_seen, "unknown");
        assert_eq!(staleness.proto_minutes, 15);
        assert_eq!(staleness.restart_minutes, 60);
        assert_eq!(staleness.reboot_minutes, STALE_SENTINEL_MINUTES);
    }

    #[test]
    fn test_latest_data_feeds_data_minutes() {
        let now = parse_local("2024-01-15 12:00:00").unwrap();
        let mut snapshot = snapshot();
        snapshot.latest_data = Some((now - TimeDelta::seconds(300)).timestamp() as f64);

        assert_eq!(snapshot.staleness(now).unwrap().data_minutes, 5);
    }

    #[test]
    fn test_malformed_proto_time_names_the_field() {
        let now = parse_local("2024-01-15 12:00:00").unwrap();
        let mut snapshot = snapshot();
        snapshot.last_proto_date_time = Some("15.01.2024".into());

        let err = snapshot.staleness(now).unwrap_err();
        assert!(matches!(err, DeviceError::Timestamp { field: "lastProtoDateTime", .. }));
    }
}
