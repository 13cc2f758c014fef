//! Wire types for the two status pages.
//!
//! The mitm receiver answers with
//! `{"origin_status": {<origin>: {"injection_status": bool, "latest_data": epoch|null}}}`
//! and madmin with an array of worker records keyed by `origin`.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DeviceError, Service};

/// mitm receiver status page
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InjectionStatusPage {
    pub origin_status: HashMap<String, OriginStatus>,
}

/// Injection state of one origin
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OriginStatus {
    pub injection_status: bool,

    /// Epoch seconds of the last received data
    #[serde(default)]
    pub latest_data: Option<f64>,
}

impl InjectionStatusPage {
    /// Look up the entry for `origin`
    pub fn origin(&self, origin: &str) -> Result<&OriginStatus, DeviceError> {
        self.origin_status.get(origin).ok_or_else(|| DeviceError::OriginNotFound {
            service: Service::Mitm,
            origin: origin.to_string(),
        })
    }
}

/// One madmin worker record
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerStatus {
    pub origin: String,

    #[serde(rename = "routemanager", default)]
    pub route_manager: Option<String>,

    #[serde(rename = "lastPogoReboot", default)]
    pub last_reboot: Option<String>,

    #[serde(rename = "lastPogoRestart", default)]
    pub last_restart: Option<String>,

    #[serde(rename = "lastProtoDateTime", default)]
    pub last_proto_date_time: Option<String>,

    #[serde(rename = "init", default)]
    pub route_init: Option<bool>,
}

/// Linear scan of the raw madmin records for `origin`.
///
/// Only the matching record is decoded, so malformed records of other
/// workers do not affect this one.
pub fn find_worker(records: &[Value], origin: &str) -> Result<WorkerStatus, DeviceError> {
    let record = records
        .iter()
        .find(|record| record.get("origin").and_then(Value::as_str) == Some(origin))
        .ok_or_else(|| DeviceError::OriginNotFound {
            service: Service::Madmin,
            origin: origin.to_string(),
        })?;

    WorkerStatus::deserialize(record)
        .map_err(|source| DeviceError::Decode { service: Service::Madmin, source })
}
