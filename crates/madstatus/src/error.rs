use std::fmt;

use thiserror::Error;

use crate::actuator::ActuatorError;
use crate::client::StatusError;
use crate::staleness::StalenessError;

/// The two upstream status services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// mitm receiver, reports injection status
    Mitm,
    /// madmin, reports worker status
    Madmin,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Mitm => write!(f, "mitm receiver"),
            Service::Madmin => write!(f, "madmin"),
        }
    }
}

/// Anything that stops one device from being evaluated in a sweep
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Origin '{origin}' not found in {service} status")]
    OriginNotFound { service: Service, origin: String },

    #[error("Unexpected {service} status payload: {source}")]
    Decode {
        service: Service,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Bad {field} value: {source}")]
    Timestamp {
        field: &'static str,
        #[source]
        source: StalenessError,
    },

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}
