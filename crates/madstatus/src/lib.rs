//! madstatus - status polling and reboot decisions for MAD devices
//!
//! This library reads the two status services a MAD setup exposes (the mitm
//! receiver and madmin), turns their timestamps into staleness figures and
//! decides whether a device should be rebooted.

pub mod actuator;
pub mod client;
pub mod decision;
pub mod endpoint;
pub mod error;
pub mod snapshot;
pub mod staleness;
pub mod status;
pub mod transport;

// Re-export main types
pub use actuator::{ActuatorError, CommandActuator, DryRunActuator, RebootActuator};
pub use client::{RetryPolicy, StatusClient};
pub use decision::{should_reboot, RebootDecision, RebootPolicy, RebootReason};
pub use endpoint::{Credentials, Endpoint, EndpointError};
pub use error::{DeviceError, Service};
pub use snapshot::{DeviceSnapshot, StatusReader};
pub use staleness::{Staleness, StalenessError, STALE_SENTINEL_MINUTES};
pub use status::{InjectionStatusPage, OriginStatus, WorkerStatus};
pub use transport::{FetchError, HttpTransport, StatusTransport};

/// Default reboot command used when none is configured
pub const DEFAULT_REBOOT_COMMAND: &str = "/root/adb_scripts/RebootMadDevice.py";

/// Timestamp layout used by madmin and by the status report
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
