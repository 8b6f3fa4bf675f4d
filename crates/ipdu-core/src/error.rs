// ── Core error types ──
//
// User-facing errors from ipdu-core. Device-client failures arrive as
// `ClientError` and are translated into domain variants here, so
// projections never see transport details.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::client::ClientError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum PduError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach PDU: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request to PDU timed out")]
    Timeout,

    /// Setup-time validation failed. Fatal to the entry being configured.
    #[error("Cannot connect to PDU at {host}")]
    CannotConnect {
        host: String,
        #[source]
        source: Arc<PduError>,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Failed to switch outlets {outlets:?} {}: {reason}", direction(.enabled))]
    Command {
        outlets: Vec<usize>,
        enabled: bool,
        reason: String,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed {field} reading: {value}")]
    MalformedData { field: &'static str, value: String },

    #[error("Unexpected response from PDU: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Coordinator has been shut down")]
    Shutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PduError {
    /// Returns `true` if the device could not be reached or answered too late.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout | Self::AuthenticationFailed { .. } => {
                true
            }
            Self::CannotConnect { source, .. } => source.is_connectivity(),
            _ => false,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn direction(enabled: &bool) -> &'static str {
    if *enabled { "on" } else { "off" }
}

// ── Conversion from device-client errors ─────────────────────────────

impl From<ClientError> for PduError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unreachable(reason) => Self::ConnectionFailed { reason },
            ClientError::Unauthorized => Self::AuthenticationFailed {
                message: "credentials rejected by PDU".into(),
            },
            ClientError::Timeout => Self::Timeout,
            ClientError::Protocol(message) => Self::Protocol { message },
        }
    }
}

// ── PollError ────────────────────────────────────────────────────────

/// Failure marker for one poll attempt.
///
/// Cheap to clone: every caller that joined the failed fetch, and every
/// observer, receives the same underlying cause.
#[derive(Debug, Clone, Error)]
#[error("Error communicating with PDU: {cause}")]
pub struct PollError {
    #[source]
    cause: Arc<PduError>,
    failed_at: DateTime<Utc>,
}

impl PollError {
    pub fn new(cause: PduError) -> Self {
        Self {
            cause: Arc::new(cause),
            failed_at: Utc::now(),
        }
    }

    pub fn cause(&self) -> &PduError {
        &self.cause
    }

    pub(crate) fn shared_cause(&self) -> Arc<PduError> {
        Arc::clone(&self.cause)
    }

    pub fn failed_at(&self) -> DateTime<Utc> {
        self.failed_at
    }

    /// `true` when both markers describe the same failed attempt.
    pub fn same_attempt(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_domain_variants() {
        assert!(matches!(
            PduError::from(ClientError::Unreachable("refused".into())),
            PduError::ConnectionFailed { .. }
        ));
        assert!(matches!(
            PduError::from(ClientError::Unauthorized),
            PduError::AuthenticationFailed { .. }
        ));
        assert!(matches!(PduError::from(ClientError::Timeout), PduError::Timeout));
        assert!(matches!(
            PduError::from(ClientError::Protocol("bad xml".into())),
            PduError::Protocol { .. }
        ));
    }

    #[test]
    fn command_error_message_names_direction() {
        let err = PduError::Command {
            outlets: vec![2],
            enabled: true,
            reason: "HTTP 500".into(),
        };
        assert_eq!(err.to_string(), "Failed to switch outlets [2] on: HTTP 500");
    }

    #[test]
    fn cannot_connect_is_connectivity() {
        let err = PduError::CannotConnect {
            host: "10.0.0.5".into(),
            source: Arc::new(PduError::Timeout),
        };
        assert!(err.is_connectivity());
        assert!(!PduError::Shutdown.is_connectivity());
    }

    #[test]
    fn poll_error_clones_share_cause() {
        let err = PollError::new(PduError::Timeout);
        let copy = err.clone();
        assert!(err.same_attempt(&copy));
        assert!(!err.same_attempt(&PollError::new(PduError::Timeout)));
        assert_eq!(
            err.to_string(),
            "Error communicating with PDU: Request to PDU timed out"
        );
    }
}
