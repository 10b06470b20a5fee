//! Encoder sessions.
//!
//! A session owns one native encoder context, the configuration it was
//! opened with, the presentation-timestamp counter, and the reusable frame
//! buffer that converted bitmaps are written into.
//!
//! ## Lifecycle
//!
//! ```text
//! open():  Unopened -> Configured -> Opened
//!                          |
//!                          +-- activation fails: context released, OpenFailed
//! flush(): Opened -> Flushed
//! close(): Opened | Flushed -> Closed   (idempotent, also on drop)
//! ```
//!
//! Only `Opened` sessions accept frames. A flushed encoder has seen end of
//! stream and takes no more input, but later flushes still drain it.
//!
//! The session API takes `&mut self`, so one encode call is in flight at a
//! time; independent sessions share nothing and may run on different threads.

mod config;
mod encode;

pub use config::{EncoderConfig, PixelFormat, TimeBase};

use std::fmt;
use std::sync::Arc;

use crate::error::{EncodeError, Result};
use crate::frame::FrameBuffer;
use crate::media::h264::ParameterSets;
use crate::media::{Encoder, EncoderContext, EncoderRegistry};

/// Session lifecycle state.
///
/// `Unopened` and `Configured` only exist while [`EncoderSession::open`]
/// runs and show up in its log events. A session handed to the caller
/// reports `Opened`, `Flushed`, or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Context allocated, nothing applied yet.
    Unopened,
    /// Configuration applied, context not yet activated.
    Configured,
    /// Accepting frames.
    Opened,
    /// End of stream sent; no more frames accepted.
    Flushed,
    /// Context released.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unopened => "unopened",
            Self::Configured => "configured",
            Self::Opened => "opened",
            Self::Flushed => "flushed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Running totals for a session, updated by calls that complete successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Frames whose encode call completed. A frame the encoder accepted
    /// but whose drain then failed or was cancelled is not counted.
    pub frames_submitted: u64,
    /// Packets returned to the caller.
    pub packets: u64,
    /// Payload bytes returned to the caller.
    pub bytes: u64,
    /// Packets carrying an IDR slice.
    pub key_frames: u64,
    /// Timestamp of the most recent returned packet, if it had one.
    pub last_pts: Option<i64>,
}

/// An open H.264 encoder.
pub struct EncoderSession {
    encoder: String,
    context: Option<Box<dyn EncoderContext>>,
    config: EncoderConfig,
    state: SessionState,
    next_pts: i64,
    frame: FrameBuffer,
    stats: EncoderStats,
    parameter_sets: ParameterSets,
}

impl EncoderSession {
    /// Open a session on the encoder named by `config` (or the registry
    /// default when it names none).
    pub fn open(config: EncoderConfig, registry: &EncoderRegistry) -> Result<Self> {
        config.validate()?;

        let encoder = match &config.encoder {
            Some(name) => registry
                .find(name)
                .ok_or_else(|| EncodeError::EncoderNotFound(name.clone()))?,
            None => registry
                .default_encoder()
                .ok_or_else(|| EncodeError::EncoderNotFound("h264".to_string()))?,
        };

        Self::open_with(encoder, config)
    }

    /// Open a session on a specific encoder, bypassing registry lookup.
    pub fn open_with(encoder: Arc<dyn Encoder>, config: EncoderConfig) -> Result<Self> {
        config.validate()?;

        let name = encoder.name().to_string();
        let mut context = encoder.alloc_context().ok_or(EncodeError::AllocationFailed)?;
        tracing::debug!(
            encoder = %name,
            state = %SessionState::Unopened,
            "encoder context allocated"
        );

        context.configure(&config);
        tracing::debug!(
            encoder = %name,
            state = %SessionState::Configured,
            width = config.width,
            height = config.height,
            pixel_format = %config.pixel_format,
            time_base = %config.time_base,
            key_frame_interval = ?config.key_frame_interval,
            "encoder context configured"
        );

        if let Err(code) = context.open() {
            tracing::warn!(encoder = %name, %code, "encoder failed to open");
            context.close();
            return Err(EncodeError::OpenFailed { code });
        }

        let frame =
            FrameBuffer::with_dimensions(config.width, config.height, config.subsampling());
        tracing::info!(
            encoder = %name,
            width = config.width,
            height = config.height,
            "encoder session opened"
        );

        Ok(Self {
            encoder: name,
            context: Some(context),
            config,
            state: SessionState::Opened,
            next_pts: 0,
            frame,
            stats: EncoderStats::default(),
            parameter_sets: ParameterSets::new(),
        })
    }

    /// Release the native context and frame buffer. Safe to call repeatedly.
    pub fn close(&mut self) {
        let Some(mut context) = self.context.take() else {
            return;
        };
        context.close();
        self.frame = FrameBuffer::new();
        self.state = SessionState::Closed;
        tracing::debug!(
            encoder = %self.encoder,
            frames = self.stats.frames_submitted,
            bytes = self.stats.bytes,
            "encoder session closed"
        );
    }

    pub fn encoder_name(&self) -> &str {
        &self.encoder
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Opened
    }

    /// Timestamp the next submitted frame will carry.
    pub fn next_pts(&self) -> i64 {
        self.next_pts
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    /// Latest SPS/PPS seen in this session's output.
    pub fn parameter_sets(&self) -> &ParameterSets {
        &self.parameter_sets
    }

    /// Physical bytes held by the reusable frame buffer.
    pub fn frame_capacity(&self) -> usize {
        self.frame.capacity()
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EncoderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderSession")
            .field("encoder", &self.encoder)
            .field("state", &self.state)
            .field("width", &self.config.width)
            .field("height", &self.config.height)
            .field("pixel_format", &self.config.pixel_format)
            .field("next_pts", &self.next_pts)
            .field("stats", &self.stats)
            .finish()
    }
}
