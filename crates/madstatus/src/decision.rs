//! Reboot decision.
//!
//! A device is rebooted when it is not injecting and its data is stale, or
//! when its last proto is stale regardless of injection state:
//!
//! ```text
//! (!injecting && data_minutes > 10) || proto_minutes > 30
//! ```

use std::fmt;

use crate::staleness::Staleness;

/// Thresholds, in whole minutes, above which a device counts as stuck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebootPolicy {
    pub data_stale_minutes: i64,
    pub proto_stale_minutes: i64,
}

impl Default for RebootPolicy {
    fn default() -> Self {
        Self { data_stale_minutes: 10, proto_stale_minutes: 30 }
    }
}

/// Why a reboot was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootReason {
    NoInjectionAndStaleData,
    StaleProto,
}

impl fmt::Display for RebootReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebootReason::NoInjectionAndStaleData => write!(f, "not injecting and data is stale"),
            RebootReason::StaleProto => write!(f, "last proto is stale"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootDecision {
    Keep,
    Reboot(RebootReason),
}

impl RebootDecision {
    pub fn is_reboot(&self) -> bool {
        matches!(self, RebootDecision::Reboot(_))
    }
}

impl RebootPolicy {
    /// Evaluate the reboot expression with this policy's thresholds
    pub fn evaluate(&self, injecting: bool, data_minutes: i64, proto_minutes: i64) -> RebootDecision {
        if !injecting && data_minutes > self.data_stale_minutes {
            RebootDecision::Reboot(RebootReason::NoInjectionAndStaleData)
        } else if proto_minutes > self.proto_stale_minutes {
            RebootDecision::Reboot(RebootReason::StaleProto)
        } else {
            RebootDecision::Keep
        }
    }

    /// Evaluate against a computed [`Staleness`]
    pub fn evaluate_staleness(&self, injecting: bool, staleness: &Staleness) -> RebootDecision {
        self.evaluate(injecting, staleness.data_minutes, staleness.proto_minutes)
    }
}

/// Reboot decision with the default thresholds
pub fn should_reboot(injecting: bool, data_minutes: i64, proto_minutes: i64) -> bool {
    RebootPolicy::default().evaluate(injecting, data_minutes, proto_minutes).is_reboot()
}
