//! Error types for the encode pipeline.

use std::fmt;

/// Status code reported by a native encoder backend.
///
/// Backends follow the libavcodec convention: negative values are failures.
/// The raw value is kept so callers can log it or map it back to the
/// native library's own error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while opening a session or encoding a frame.
///
/// Variants map to the stage that failed:
///
/// - **Open**: [`InvalidConfig`](Self::InvalidConfig),
///   [`EncoderNotFound`](Self::EncoderNotFound),
///   [`AllocationFailed`](Self::AllocationFailed),
///   [`OpenFailed`](Self::OpenFailed). No session is created.
/// - **Prepare**: [`SessionClosed`](Self::SessionClosed),
///   [`FrameNotWritable`](Self::FrameNotWritable).
/// - **Submit**: [`SendFailed`](Self::SendFailed).
/// - **Drain**: [`DrainFailed`](Self::DrainFailed). Output gathered by the
///   failing call is dropped, never surfaced.
/// - **Cancel**: [`Cancelled`](Self::Cancelled).
///
/// Would-block and end-of-stream are not errors; see
/// [`Receive`](crate::media::Receive).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The [`EncoderConfig`](crate::EncoderConfig) violates an invariant.
    #[error("invalid encoder config: {0}")]
    InvalidConfig(ConfigErrorKind),

    /// No encoder with the requested name is registered.
    #[error("encoder not found: {0}")]
    EncoderNotFound(String),

    /// The backend returned no context for the encoder.
    #[error("cannot allocate encoder context")]
    AllocationFailed,

    /// Activating the configured context reported a negative status.
    #[error("cannot open encoder (status {code})")]
    OpenFailed { code: ErrorCode },

    /// The session no longer accepts frames: it was closed or flushed.
    #[error("encoder session is not open")]
    SessionClosed,

    /// The encoder still holds the frame and refused to hand it back.
    #[error("encoder frame is not writable (status {code})")]
    FrameNotWritable { code: ErrorCode },

    /// The encoder rejected the submitted frame.
    #[error("encoder rejected frame pts={pts} (status {code})")]
    SendFailed { code: ErrorCode, pts: i64 },

    /// Receiving a packet failed; packets already drained by this call were discarded.
    #[error("cannot drain encoder (status {code}, {discarded_packets} packets discarded)")]
    DrainFailed {
        code: ErrorCode,
        discarded_packets: usize,
    },

    /// The caller's [`CancelToken`](crate::CancelToken) fired between steps.
    #[error("encode cancelled")]
    Cancelled,
}

impl EncodeError {
    /// Pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidConfig(_)
            | Self::EncoderNotFound(_)
            | Self::AllocationFailed
            | Self::OpenFailed { .. } => Stage::Open,
            Self::SessionClosed | Self::FrameNotWritable { .. } => Stage::Prepare,
            Self::SendFailed { .. } => Stage::Submit,
            Self::DrainFailed { .. } => Stage::Drain,
            Self::Cancelled => Stage::Cancel,
        }
    }

    /// Whether the session can take the next frame after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FrameNotWritable { .. }
                | Self::SendFailed { .. }
                | Self::DrainFailed { .. }
                | Self::Cancelled
        )
    }
}

/// Pipeline stage, attached to errors for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    Prepare,
    Submit,
    Drain,
    Cancel,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Prepare => "prepare",
            Self::Submit => "submit",
            Self::Drain => "drain",
            Self::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Specific kind of configuration violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Width or height is zero.
    ZeroDimension,
    /// Time base numerator or denominator is zero.
    ZeroTimeBase,
    /// Key-frame interval was set to zero.
    ZeroKeyFrameInterval,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDimension => write!(f, "width and height must be > 0"),
            Self::ZeroTimeBase => write!(f, "time base terms must be > 0"),
            Self::ZeroKeyFrameInterval => write!(f, "key-frame interval must be >= 1"),
        }
    }
}

/// Convenience alias for `Result<T, EncodeError>`.
pub type Result<T> = std::result::Result<T, EncodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_are_fatal() {
        for err in [
            EncodeError::EncoderNotFound("libx264".into()),
            EncodeError::AllocationFailed,
            EncodeError::OpenFailed { code: ErrorCode(-22) },
            EncodeError::InvalidConfig(ConfigErrorKind::ZeroDimension),
        ] {
            assert_eq!(err.stage(), Stage::Open);
            assert!(!err.is_recoverable(), "{err} should be fatal");
        }
    }

    #[test]
    fn per_call_errors_are_recoverable() {
        let send = EncodeError::SendFailed {
            code: ErrorCode(-11),
            pts: 4,
        };
        assert_eq!(send.stage(), Stage::Submit);
        assert!(send.is_recoverable());

        let drain = EncodeError::DrainFailed {
            code: ErrorCode(-5),
            discarded_packets: 2,
        };
        assert_eq!(drain.stage(), Stage::Drain);
        assert!(drain.is_recoverable());

        assert!(EncodeError::Cancelled.is_recoverable());
        assert!(!EncodeError::SessionClosed.is_recoverable());
    }

    #[test]
    fn display_carries_context() {
        let err = EncodeError::DrainFailed {
            code: ErrorCode(-5),
            discarded_packets: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("-5"));
        assert!(msg.contains("3 packets discarded"));
        assert_eq!(Stage::Drain.to_string(), "drain");
    }
}
