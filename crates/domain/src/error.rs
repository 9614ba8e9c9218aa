//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts via `#[from]`.
//! Nothing in the synchronizer is fatal: these errors are logged and
//! recovered where they surface.

use crate::id::SerialNumber;

/// Top-level error for the threeway workspace.
#[derive(Debug, thiserror::Error)]
pub enum ThreeWayError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("transport error")]
    Transport(#[from] TransportError),
}

/// Invariant violations in configuration or domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("serial number must not be empty")]
    EmptySerial,

    #[error("a group needs at least 2 devices, got {members}")]
    GroupTooSmall { members: usize },

    #[error("device {serial} is already part of a group")]
    DuplicateMember { serial: SerialNumber },

    #[error("no switch groups defined")]
    NoGroups,
}

/// Failure reported by the device transport.
///
/// The variants mirror the socket-level conditions a network switch can
/// produce. [`is_noise`](Self::is_noise) and
/// [`is_unreachable`](Self::is_unreachable) drive how callers react.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection reset")]
    ConnectionReset,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("host unreachable")]
    HostUnreachable,

    #[error("timed out")]
    TimedOut,

    /// The device's notification channel or client was dropped.
    #[error("transport closed")]
    Closed,

    /// Any other failure, carrying the device or protocol error code.
    #[error("protocol error {code}")]
    Protocol { code: String },
}

impl TransportError {
    /// Expected chatter from broadcast discovery; never surfaced.
    #[must_use]
    pub fn is_noise(&self) -> bool {
        matches!(self, Self::ConnectionReset)
    }

    /// The device is gone: its refresh loop should stop.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused | Self::HostUnreachable | Self::TimedOut
        )
    }

    /// Short error code for log lines (`ECONNREFUSED`, `ETIMEDOUT`, …).
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::ConnectionReset => "ECONNRESET",
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::HostUnreachable => "EHOSTUNREACH",
            Self::TimedOut => "ETIMEDOUT",
            Self::Closed => "ECLOSED",
            Self::Protocol { code } => code,
        }
    }
}
